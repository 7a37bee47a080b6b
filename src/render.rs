//! Render orchestrator: fingerprint, cache lookup, composition, persistence.
//!
//! The fingerprint memoizes finished work — once a `RenderedAsset` exists for
//! a fingerprint, identical requests return it without touching any image
//! bytes. The insert-if-absent step in the store resolves concurrent misses:
//! both racers compose, one record wins, the loser adopts it.

use image::DynamicImage;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::assets::{AssetError, AssetStore};
use crate::compose::{self, ComposeError};
use crate::model::{
    ApprovalStatus, Event, EventKind, RenderRequest, RenderedAsset, SlipMode, SlipPosition,
};
use crate::perf::{Stage, StageTimer};
use crate::qr;
use crate::store::{MetadataStore, StoreError};
use crate::util;

/// Height cap for overlaid slip images when no template drives the size.
const OVERLAY_MAX_H_PCT: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("failed to fetch source asset: {0}")]
    UpstreamFetch(String),
    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

impl From<ComposeError> for RenderError {
    fn from(e: ComposeError) -> Self {
        RenderError::Internal(e.to_string())
    }
}

impl From<AssetError> for RenderError {
    fn from(e: AssetError) -> Self {
        match e {
            AssetError::Fetch(_) | AssetError::FetchStatus(_) => {
                RenderError::UpstreamFetch(e.to_string())
            }
            AssetError::Io(ref io) if io.kind() == std::io::ErrorKind::NotFound => {
                RenderError::NotFound("source asset")
            }
            other => RenderError::Internal(other.to_string()),
        }
    }
}

/// Content-address of a render request: sha256 over the ordered identity
/// tuple, absent optionals pinned to the literal `none` so set-vs-unset
/// never collides.
pub fn fingerprint(req: &RenderRequest) -> String {
    fn part(v: Option<&str>) -> &str {
        match v {
            Some(s) => s,
            None => "none",
        }
    }

    let tuple = [
        req.creative_variant_id.as_str(),
        req.slip_mode.as_str(),
        part(req.slip_template_id.as_deref()),
        part(req.dealer_slip_id.as_deref()),
        part(req.slip_design_id.as_deref()),
        req.dealer_id.as_str(),
        part(req.qr_type.map(|t| t.as_str())),
        part(req.qr_value.as_deref()),
    ]
    .join(":");

    hex::encode(Sha256::digest(tuple.as_bytes()))
}

/// Exactly one slip-source id may be set, and it must match the mode.
fn validate(req: &RenderRequest) -> Result<(), RenderError> {
    let expect = |wanted: bool, set: bool, field: &str| -> Result<(), RenderError> {
        match (wanted, set) {
            (true, false) => Err(RenderError::Validation(format!("{field} is required"))),
            (false, true) => Err(RenderError::Validation(format!(
                "{field} does not apply to slip_mode {}",
                req.slip_mode.as_str()
            ))),
            _ => Ok(()),
        }
    };
    expect(
        req.slip_mode == SlipMode::Template,
        req.slip_template_id.is_some(),
        "slip_template_id",
    )?;
    expect(
        req.slip_mode == SlipMode::DealerSlip,
        req.dealer_slip_id.is_some(),
        "dealer_slip_id",
    )?;
    expect(
        req.slip_mode == SlipMode::Design,
        req.slip_design_id.is_some(),
        "slip_design_id",
    )?;
    Ok(())
}

/// Run one render request end to end. `actor` is the resolved API key name
/// recorded on analytics events.
pub async fn render(
    store: &MetadataStore,
    assets: &AssetStore,
    req: &RenderRequest,
    actor: Option<&str>,
) -> Result<RenderedAsset, RenderError> {
    let _timer = StageTimer::start(Stage::Request);
    validate(req)?;
    let fp = fingerprint(req);

    if let Some(existing) = store.rendered_by_fingerprint(&fp) {
        info!(fingerprint = %fp, asset_id = %existing.id, "render cache hit");
        store.append_event(Event::new(
            EventKind::RenderCached,
            &existing.brand_id,
            Some(&existing.dealer_id),
            actor,
            serde_json::json!({ "asset_id": existing.id, "fingerprint": fp }),
        ))?;
        return Ok(existing);
    }

    let variant = store
        .variant(&req.creative_variant_id)
        .ok_or(RenderError::NotFound("creative variant"))?;
    let dealer = store
        .dealer(&req.dealer_id)
        .ok_or(RenderError::NotFound("dealer"))?;
    let brand = store
        .brand(&variant.brand_id)
        .ok_or(RenderError::NotFound("brand"))?;

    let creative_bytes = {
        let _timer = StageTimer::start(Stage::FetchCreative);
        assets.get(&variant.file_url).await?
    };
    let creative = decode(&creative_bytes)?;

    let payload = qr::qr_payload(req.qr_type, req.qr_value.as_deref(), &dealer);

    let composed = {
        let _timer = StageTimer::start(Stage::Compose);
        match req.slip_mode {
            SlipMode::Template => {
                let template_id = req.slip_template_id.as_deref().unwrap_or_default();
                let template = store
                    .template(template_id)
                    .ok_or(RenderError::NotFound("slip template"))?;
                compose::compose_template(&creative, &template, &dealer, payload.as_deref())?
            }
            SlipMode::DealerSlip => {
                let slip_id = req.dealer_slip_id.as_deref().unwrap_or_default();
                let slip = store
                    .dealer_slip(slip_id)
                    .ok_or(RenderError::NotFound("dealer slip"))?;
                if brand.settings.slip_approval_required && slip.status != ApprovalStatus::Approved
                {
                    return Err(RenderError::Validation(
                        "dealer slip is not approved".to_string(),
                    ));
                }
                let slip_img = decode(&assets.get(&slip.file_url).await?)?;
                compose::compose_overlay(&creative, &slip_img, SlipPosition::Bottom, OVERLAY_MAX_H_PCT)
            }
            SlipMode::Design => {
                let design_id = req.slip_design_id.as_deref().unwrap_or_default();
                let design = store
                    .slip_design(design_id)
                    .ok_or(RenderError::NotFound("slip design"))?;
                let design_img = decode(&assets.get(&design.preview_url).await?)?;
                compose::compose_overlay(&creative, &design_img, SlipPosition::Bottom, OVERLAY_MAX_H_PCT)
            }
        }
    };

    let png = {
        let _timer = StageTimer::start(Stage::EncodePng);
        encode_png(&composed)?
    };
    let output_url = assets.put(&png, "rendered", ".png").await?;

    let asset = RenderedAsset {
        id: util::new_id(),
        brand_id: variant.brand_id.clone(),
        dealer_id: dealer.id.clone(),
        creative_variant_id: variant.id.clone(),
        slip_mode: req.slip_mode,
        slip_template_id: req.slip_template_id.clone(),
        dealer_slip_id: req.dealer_slip_id.clone(),
        slip_design_id: req.slip_design_id.clone(),
        output_url,
        hash_key: fp.clone(),
        created_at: util::now_iso(),
    };

    let (asset, inserted) = store.insert_rendered_if_absent(asset)?;
    if inserted {
        info!(fingerprint = %fp, asset_id = %asset.id, "render generated");
        store.append_event(Event::new(
            EventKind::RenderGenerated,
            &asset.brand_id,
            Some(&asset.dealer_id),
            actor,
            serde_json::json!({
                "asset_id": asset.id,
                "fingerprint": fp,
                "slip_mode": req.slip_mode.as_str(),
            }),
        ))?;
    }
    Ok(asset)
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, RenderError> {
    image::load_from_memory(bytes)
        .map_err(|e| RenderError::Internal(format!("failed to decode image: {e}")))
}

fn encode_png(img: &image::RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| RenderError::Internal(format!("failed to encode png: {e}")))?;
    Ok(out.into_inner())
}
