//! Demo data for development: one brand, two dealers, two creatives with
//! sized variants, two slip templates.
//!
//! Variant images are generated locally and stored through the asset store,
//! so a freshly seeded instance can render without network access. Seeding
//! is idempotent: a store that already has a brand is left untouched.

use image::{ImageBuffer, Rgba};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use utoipa::ToSchema;

use crate::assets::{AssetError, AssetStore};
use crate::model::{
    ApprovalStatus, BgStyle, Brand, BrandSettings, CreativeVariant, Dealer, DealerBrandLink,
    SlipField, SlipPosition, SlipTemplate,
};
use crate::store::{MetadataStore, StoreError};
use crate::util;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("asset: {0}")]
    Asset(#[from] AssetError),
    #[error("image encode: {0}")]
    Encode(String),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SeedSummary {
    pub brand_id: String,
    pub dealer_ids: Vec<String>,
    pub variant_ids: Vec<String>,
    pub template_ids: Vec<String>,
}

/// Populate demo data. Returns `None` when the store is already seeded.
pub async fn seed(
    store: &MetadataStore,
    assets: &AssetStore,
) -> Result<Option<SeedSummary>, SeedError> {
    if store.has_brands() {
        return Ok(None);
    }

    let brand = Brand {
        id: util::new_id(),
        name: "Sunrise Electronics".into(),
        logo: None,
        settings: BrandSettings::default(),
        created_at: util::now_iso(),
    };
    store.put_brand(brand.clone())?;

    let dealers = [
        (
            "Kumar Electronics",
            "Raj Kumar",
            "+919876543212",
            "Shop 12, Main Market",
            "110001",
            "Central Delhi",
            "Delhi",
        ),
        (
            "Tech World",
            "Priya Sharma",
            "+919876543213",
            "34 Mall Road",
            "560001",
            "Bangalore Urban",
            "Karnataka",
        ),
    ];
    let mut dealer_ids = Vec::new();
    for (name, owner, phone, address, pincode, district, state) in dealers {
        let dealer = Dealer {
            id: util::new_id(),
            name: name.into(),
            owner_name: owner.into(),
            phone: phone.into(),
            whatsapp: Some(phone.into()),
            address: address.into(),
            pincode: pincode.into(),
            district: district.into(),
            state: state.into(),
            logo_url: None,
            brand_links: vec![DealerBrandLink {
                brand_id: brand.id.clone(),
                status: ApprovalStatus::Approved,
                zone_id: None,
            }],
            default_slips: Default::default(),
            created_at: util::now_iso(),
        };
        dealer_ids.push(dealer.id.clone());
        store.put_dealer(dealer)?;
    }

    // Two creatives, each in a story and a square rendition.
    let mut variant_ids = Vec::new();
    for (creative_name, fill) in [
        ("Diwali Sale 2024", Rgba([235u8, 120, 40, 255])),
        ("New Year Offer", Rgba([40u8, 80, 200, 255])),
    ] {
        let creative_id = util::new_id();
        for (label, w, h) in [("WhatsApp Status", 1080, 1920), ("Instagram Post", 1080, 1080)] {
            let file_url = assets
                .put(&placeholder_png(w, h, fill)?, "creatives", ".png")
                .await?;
            let variant = CreativeVariant {
                id: util::new_id(),
                creative_id: creative_id.clone(),
                brand_id: brand.id.clone(),
                file_url,
                file_type: "image/png".into(),
                width: w,
                height: h,
                label: format!("{creative_name} — {label}"),
                created_at: util::now_iso(),
            };
            variant_ids.push(variant.id.clone());
            store.put_variant(variant)?;
        }
    }

    let templates = [
        (
            "Minimal Bottom",
            15,
            vec![SlipField::ShopName, SlipField::Phone, SlipField::Qr],
            "minimal",
            BgStyle::Light,
        ),
        (
            "Standard Footer",
            20,
            vec![SlipField::ShopName, SlipField::Phone, SlipField::Address, SlipField::Qr],
            "standard",
            BgStyle::Dark,
        ),
    ];
    let mut template_ids = Vec::new();
    for (name, max_h_pct, allowed_fields, preset, bg_style) in templates {
        let template = SlipTemplate {
            id: util::new_id(),
            brand_id: brand.id.clone(),
            name: name.into(),
            position: SlipPosition::Bottom,
            max_w_pct: 100,
            max_h_pct,
            allowed_fields,
            style_preset: preset.into(),
            bg_style,
            is_active: true,
            created_at: util::now_iso(),
        };
        template_ids.push(template.id.clone());
        store.put_template(template)?;
    }

    info!(brand_id = %brand.id, "seeded demo data");
    Ok(Some(SeedSummary {
        brand_id: brand.id,
        dealer_ids,
        variant_ids,
        template_ids,
    }))
}

fn placeholder_png(w: u32, h: u32, fill: Rgba<u8>) -> Result<Vec<u8>, SeedError> {
    let img = ImageBuffer::from_pixel(w, h, fill);
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| SeedError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}
