//! QR payload derivation and raster rendering.

use image::{imageops::FilterType, DynamicImage, ImageBuffer, Rgba, RgbaImage};
use qrcode::{EcLevel, QrCode};
use thiserror::Error;

use crate::model::{Dealer, QrType};

#[derive(Debug, Error)]
pub enum QrError {
    #[error("failed to build qr code")]
    Build,
}

/// Derive the string a QR code should encode, or `None` when no QR applies.
///
/// Priority per type:
/// - whatsapp: explicit value, else dealer.whatsapp, else dealer.phone —
///   digits only (`+` and spaces stripped) in a wa.me deep link.
/// - maps: search url from the dealer's address; no address, no QR.
/// - custom: the explicit value verbatim.
pub fn qr_payload(qr_type: Option<QrType>, qr_value: Option<&str>, dealer: &Dealer) -> Option<String> {
    match qr_type? {
        QrType::Whatsapp => {
            let number = [qr_value, dealer.whatsapp.as_deref(), Some(dealer.phone.as_str())]
                .into_iter()
                .flatten()
                .find(|s| !s.trim().is_empty())?;
            let digits: String = number.chars().filter(|c| *c != '+' && *c != ' ').collect();
            Some(format!("https://wa.me/{digits}"))
        }
        QrType::Maps => {
            if dealer.address.trim().is_empty() {
                return None;
            }
            Some(format!(
                "https://maps.google.com/?q={}, {}, {}",
                dealer.address, dealer.district, dealer.state
            ))
        }
        QrType::Custom => qr_value.filter(|v| !v.trim().is_empty()).map(str::to_string),
    }
}

/// Render a black-on-white QR square of exactly `size` pixels.
pub fn qr_image(data: &str, size: u32) -> Result<RgbaImage, QrError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::L)
        .map_err(|_| QrError::Build)?;
    Ok(render_modules(&code, size.max(1), 2))
}

fn render_modules(code: &QrCode, size: u32, margin: u32) -> RgbaImage {
    let dark = Rgba([0u8, 0, 0, 255]);
    let light = Rgba([255u8, 255, 255, 255]);

    let width_modules = code.width() as u32;
    let total_modules = width_modules + 2 * margin;
    let pixels_per_module = (size / total_modules).max(1);
    let actual_size = total_modules * pixels_per_module;

    let mut img = ImageBuffer::from_pixel(actual_size, actual_size, light);
    for y in 0..width_modules {
        for x in 0..width_modules {
            if !matches!(code[(x as usize, y as usize)], qrcode::Color::Dark) {
                continue;
            }
            let px0 = (x + margin) * pixels_per_module;
            let py0 = (y + margin) * pixels_per_module;
            for py in py0..(py0 + pixels_per_module) {
                for px in px0..(px0 + pixels_per_module) {
                    img.put_pixel(px, py, dark);
                }
            }
        }
    }

    if actual_size != size {
        DynamicImage::ImageRgba8(img)
            .resize_exact(size, size, FilterType::Lanczos3)
            .to_rgba8()
    } else {
        img
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util;

    fn dealer(phone: &str, whatsapp: Option<&str>, address: &str) -> Dealer {
        Dealer {
            id: "d1".into(),
            name: "Kumar Electronics".into(),
            owner_name: "Raj Kumar".into(),
            phone: phone.into(),
            whatsapp: whatsapp.map(str::to_string),
            address: address.into(),
            pincode: "110001".into(),
            district: "Central Delhi".into(),
            state: "Delhi".into(),
            logo_url: None,
            brand_links: vec![],
            default_slips: Default::default(),
            created_at: util::now_iso(),
        }
    }

    #[test]
    fn whatsapp_prefers_explicit_value() {
        let d = dealer("+911111111111", Some("+912222222222"), "addr");
        let payload = qr_payload(Some(QrType::Whatsapp), Some("+91 98765 43212"), &d);
        assert_eq!(payload.as_deref(), Some("https://wa.me/919876543212"));
    }

    #[test]
    fn whatsapp_falls_back_whatsapp_then_phone() {
        let d = dealer("+919876543212", Some("+911234567890"), "addr");
        assert_eq!(
            qr_payload(Some(QrType::Whatsapp), None, &d).as_deref(),
            Some("https://wa.me/911234567890")
        );

        let d = dealer("+919876543212", None, "addr");
        assert_eq!(
            qr_payload(Some(QrType::Whatsapp), None, &d).as_deref(),
            Some("https://wa.me/919876543212")
        );
    }

    #[test]
    fn whatsapp_without_any_number_yields_none() {
        let d = dealer("", None, "addr");
        assert_eq!(qr_payload(Some(QrType::Whatsapp), None, &d), None);
    }

    #[test]
    fn maps_requires_address() {
        let d = dealer("+91", None, "Shop 12, Main Market");
        assert_eq!(
            qr_payload(Some(QrType::Maps), None, &d).as_deref(),
            Some("https://maps.google.com/?q=Shop 12, Main Market, Central Delhi, Delhi")
        );

        let d = dealer("+91", None, "");
        assert_eq!(qr_payload(Some(QrType::Maps), None, &d), None);
    }

    #[test]
    fn custom_passes_value_verbatim_or_nothing() {
        let d = dealer("+91", None, "addr");
        assert_eq!(
            qr_payload(Some(QrType::Custom), Some("https://example.com/x"), &d).as_deref(),
            Some("https://example.com/x")
        );
        assert_eq!(qr_payload(Some(QrType::Custom), None, &d), None);
    }

    #[test]
    fn no_type_means_no_qr() {
        let d = dealer("+91", None, "addr");
        assert_eq!(qr_payload(None, Some("ignored"), &d), None);
    }

    #[test]
    fn qr_image_is_exactly_requested_size() {
        let img = qr_image("https://wa.me/919876543212", 150).unwrap();
        assert_eq!((img.width(), img.height()), (150, 150));
        // corners sit in the quiet zone
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }
}
