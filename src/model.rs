//! Entity types persisted in the metadata store and carried over the wire.
//!
//! Every field that is a closed set of strings in the API is a real enum
//! here; unknown values coming from stored documents collapse onto the
//! documented fallback variant instead of failing the whole record.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Placement of the slip box on the creative.
///
/// Anything unrecognized falls back to `Corner` (bottom-right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlipPosition {
    Bottom,
    Top,
    Left,
    Right,
    #[serde(other)]
    Corner,
}

/// Background/text styling of a template slip. Unknown values render as
/// `Transparent`, the least intrusive option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BgStyle {
    Light,
    Dark,
    #[serde(other)]
    Transparent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlipField {
    ShopName,
    Phone,
    Whatsapp,
    Address,
    Logo,
    Qr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlipMode {
    Template,
    DealerSlip,
    Design,
}

impl SlipMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SlipMode::Template => "template",
            SlipMode::DealerSlip => "dealer_slip",
            SlipMode::Design => "design",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QrType {
    Whatsapp,
    Maps,
    Custom,
}

impl QrType {
    pub fn as_str(self) -> &'static str {
        match self {
            QrType::Whatsapp => "whatsapp",
            QrType::Maps => "maps",
            QrType::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// A specific sized rendition of a brand creative. Immutable once uploaded;
/// renders reference it, never mutate it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreativeVariant {
    pub id: String,
    pub creative_id: String,
    pub brand_id: String,
    pub file_url: String,
    pub file_type: String,
    pub width: u32,
    pub height: u32,
    pub label: String,
    pub created_at: String,
}

/// Brand-defined rule set for programmatic slip composition. Soft-deleted via
/// `is_active` only — historic renders keep referencing it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SlipTemplate {
    pub id: String,
    pub brand_id: String,
    pub name: String,
    pub position: SlipPosition,
    pub max_w_pct: u32,
    pub max_h_pct: u32,
    pub allowed_fields: Vec<SlipField>,
    pub style_preset: String,
    pub bg_style: BgStyle,
    pub is_active: bool,
    pub created_at: String,
}

/// Dealer-uploaded custom overlay image.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DealerSlip {
    pub id: String,
    pub dealer_id: String,
    pub brand_id: String,
    pub file_url: String,
    pub name: String,
    pub status: ApprovalStatus,
    pub reviewed_by: Option<String>,
    pub created_at: String,
}

impl DealerSlip {
    /// The only legal mutation: an explicit review decision.
    pub fn review(&mut self, approve: bool, reviewer: &str) {
        self.status = if approve {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        self.reviewed_by = Some(reviewer.to_string());
    }
}

/// Dealer-built slip design; `preview_url` is the rasterized rendition the
/// compositor overlays, exactly like an uploaded slip.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SlipDesign {
    pub id: String,
    pub dealer_id: String,
    pub brand_id: String,
    pub name: String,
    pub preview_url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DealerBrandLink {
    pub brand_id: String,
    pub status: ApprovalStatus,
    pub zone_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlipKind {
    Uploaded,
    Design,
}

/// Dealer's preferred slip for one brand.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SlipSelection {
    pub slip_type: SlipKind,
    pub slip_id: String,
}

/// Dealer identity/profile used for field substitution on slips.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Dealer {
    pub id: String,
    pub name: String,
    pub owner_name: String,
    pub phone: String,
    pub whatsapp: Option<String>,
    pub address: String,
    pub pincode: String,
    pub district: String,
    pub state: String,
    pub logo_url: Option<String>,
    #[serde(default)]
    pub brand_links: Vec<DealerBrandLink>,
    /// brand_id -> default slip selection.
    #[serde(default)]
    pub default_slips: HashMap<String, SlipSelection>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BrandSettings {
    pub dealer_auto_approve: bool,
    pub slip_approval_required: bool,
    pub max_upload_size_mb: u32,
}

impl Default for BrandSettings {
    fn default() -> Self {
        Self {
            dealer_auto_approve: false,
            slip_approval_required: true,
            max_upload_size_mb: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Brand {
    pub id: String,
    pub name: String,
    pub logo: Option<String>,
    #[serde(default)]
    pub settings: BrandSettings,
    pub created_at: String,
}

/// One render call. Ephemeral — only its fingerprint survives.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RenderRequest {
    pub creative_variant_id: String,
    pub slip_mode: SlipMode,
    pub slip_template_id: Option<String>,
    pub dealer_slip_id: Option<String>,
    pub slip_design_id: Option<String>,
    pub dealer_id: String,
    pub qr_type: Option<QrType>,
    pub qr_value: Option<String>,
}

/// Durable output of one successful composition. At most one exists per
/// `hash_key`; never mutated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RenderedAsset {
    pub id: String,
    pub brand_id: String,
    pub dealer_id: String,
    pub creative_variant_id: String,
    pub slip_mode: SlipMode,
    pub slip_template_id: Option<String>,
    pub dealer_slip_id: Option<String>,
    pub slip_design_id: Option<String>,
    pub output_url: String,
    pub hash_key: String,
    pub created_at: String,
}

/// Token mapped to a rendered asset; mutated only by click increments.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShareLink {
    pub id: String,
    pub token: String,
    pub asset_id: String,
    pub brand_id: String,
    pub dealer_id: String,
    pub clicks: u64,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RenderGenerated,
    RenderCached,
    Download,
    ShareClicked,
}

/// Append-only analytics event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub brand_id: String,
    pub dealer_id: Option<String>,
    /// Name of the API key that triggered the event, when authenticated.
    pub actor: Option<String>,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub meta: serde_json::Value,
    pub created_at: String,
}

impl Event {
    pub fn new(
        kind: EventKind,
        brand_id: &str,
        dealer_id: Option<&str>,
        actor: Option<&str>,
        meta: serde_json::Value,
    ) -> Self {
        Self {
            id: crate::util::new_id(),
            brand_id: brand_id.to_string(),
            dealer_id: dealer_id.map(str::to_string),
            actor: actor.map(str::to_string),
            kind,
            meta,
            created_at: crate::util::now_iso(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_position_falls_back_to_corner() {
        let p: SlipPosition = serde_json::from_str("\"diagonal\"").unwrap();
        assert_eq!(p, SlipPosition::Corner);
        let p: SlipPosition = serde_json::from_str("\"left\"").unwrap();
        assert_eq!(p, SlipPosition::Left);
    }

    #[test]
    fn unknown_bg_style_falls_back_to_transparent() {
        let s: BgStyle = serde_json::from_str("\"neon\"").unwrap();
        assert_eq!(s, BgStyle::Transparent);
    }

    #[test]
    fn slip_mode_wire_names() {
        assert_eq!(serde_json::to_string(&SlipMode::DealerSlip).unwrap(), "\"dealer_slip\"");
        let m: SlipMode = serde_json::from_str("\"design\"").unwrap();
        assert_eq!(m, SlipMode::Design);
    }

    #[test]
    fn dealer_slip_review_transitions() {
        let mut slip = DealerSlip {
            id: "s1".into(),
            dealer_id: "d1".into(),
            brand_id: "b1".into(),
            file_url: "/files/slips/x.png".into(),
            name: "My Slip".into(),
            status: ApprovalStatus::Pending,
            reviewed_by: None,
            created_at: crate::util::now_iso(),
        };
        slip.review(true, "admin-key");
        assert_eq!(slip.status, ApprovalStatus::Approved);
        assert_eq!(slip.reviewed_by.as_deref(), Some("admin-key"));
        slip.review(false, "other");
        assert_eq!(slip.status, ApprovalStatus::Rejected);
    }

    #[test]
    fn dealer_defaults_are_optional_in_stored_docs() {
        let raw = r#"{
            "id":"d1","name":"Kumar Electronics","owner_name":"Raj Kumar",
            "phone":"+919876543212","whatsapp":null,
            "address":"Shop 12, Main Market","pincode":"110001",
            "district":"Central Delhi","state":"Delhi","logo_url":null,
            "created_at":"2024-01-01T00:00:00Z"
        }"#;
        let d: Dealer = serde_json::from_str(raw).unwrap();
        assert!(d.brand_links.is_empty());
        assert!(d.default_slips.is_empty());
    }
}
