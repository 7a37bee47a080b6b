//! Slip compositor: lays dealer identity (or an uploaded slip image) onto a
//! creative.
//!
//! Template mode is split into a pure layout pass (geometry, colors, which
//! lines render where) and a paint pass (QR raster, text, alpha compositing).
//! The layout pass has no image or font dependencies, which keeps the
//! placement rules directly testable.

use image::{imageops, DynamicImage, ImageBuffer, Rgba, RgbaImage};
use rusttype::{point, Font, Scale};
use thiserror::Error;

use crate::fonts::{self, FontError};
use crate::model::{BgStyle, Dealer, SlipField, SlipPosition, SlipTemplate};
use crate::qr::{self, QrError};
use crate::util;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("font: {0}")]
    Font(#[from] FontError),
    #[error("qr: {0}")]
    Qr(#[from] QrError),
}

pub const PADDING: u32 = 15;
const HEADING_PX: f32 = 24.0;
const BODY_PX: f32 = 16.0;
const HEADING_ADVANCE: u32 = 30;
const BODY_ADVANCE: u32 = 22;
const ADDRESS_MAX_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlipBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Slip bounding box for a creative of `cw`x`ch`, floored to whole pixels.
///
/// Stored templates are not trusted: percentages above 100 are clamped so
/// the box never exceeds the creative.
pub fn slip_box(cw: u32, ch: u32, position: SlipPosition, max_w_pct: u32, max_h_pct: u32) -> SlipBox {
    let w = cw * max_w_pct.min(100) / 100;
    let h = ch * max_h_pct.min(100) / 100;
    let (x, y) = match position {
        SlipPosition::Bottom => ((cw - w) / 2, ch - h),
        SlipPosition::Top => ((cw - w) / 2, 0),
        SlipPosition::Left => (0, (ch - h) / 2),
        SlipPosition::Right => (cw - w, (ch - h) / 2),
        SlipPosition::Corner => (cw - w, ch - h),
    };
    SlipBox { x, y, w, h }
}

/// Background and text colors for a bg style. Backgrounds are translucent;
/// they get alpha-composited, never pasted opaque.
pub fn slip_colors(bg_style: BgStyle) -> (Rgba<u8>, Rgba<u8>) {
    match bg_style {
        BgStyle::Light => (Rgba([255, 255, 255, 230]), Rgba([15, 23, 42, 255])),
        BgStyle::Dark => (Rgba([15, 23, 42, 230]), Rgba([255, 255, 255, 255])),
        BgStyle::Transparent => (Rgba([255, 255, 255, 180]), Rgba([15, 23, 42, 255])),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrSpot {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

#[derive(Debug, Clone)]
pub struct TextLine {
    pub field: SlipField,
    pub text: String,
    pub heading: bool,
    pub advance: u32,
}

#[derive(Debug, Clone)]
pub struct SlipLayout {
    pub bbox: SlipBox,
    pub bg: Rgba<u8>,
    pub text_color: Rgba<u8>,
    pub qr: Option<QrSpot>,
    pub lines: Vec<TextLine>,
    /// Horizontal space text may occupy before hitting the QR reservation.
    pub max_text_px: u32,
}

/// Pure layout pass for template mode.
///
/// `has_qr_payload` reflects whether the payload builder produced anything;
/// without a payload no QR region is reserved even if the template allows one.
pub fn layout_template(
    cw: u32,
    ch: u32,
    template: &SlipTemplate,
    dealer: &Dealer,
    has_qr_payload: bool,
) -> SlipLayout {
    let bbox = slip_box(cw, ch, template.position, template.max_w_pct, template.max_h_pct);
    let (bg, text_color) = slip_colors(template.bg_style);

    let allowed = |f: SlipField| template.allowed_fields.contains(&f);

    let qr_size = bbox.h.saturating_sub(2 * PADDING);
    let qr = (has_qr_payload && allowed(SlipField::Qr) && qr_size > 0 && bbox.w > qr_size + 2 * PADDING)
        .then(|| QrSpot {
            x: bbox.w - qr_size - PADDING,
            y: PADDING,
            size: qr_size,
        });

    let max_text_px = match qr {
        Some(spot) => spot.x.saturating_sub(2 * PADDING),
        None => bbox.w.saturating_sub(2 * PADDING),
    };

    let mut lines = Vec::new();
    if allowed(SlipField::ShopName) && !dealer.name.is_empty() {
        lines.push(TextLine {
            field: SlipField::ShopName,
            text: dealer.name.clone(),
            heading: true,
            advance: HEADING_ADVANCE,
        });
    }
    if allowed(SlipField::Phone) && !dealer.phone.is_empty() {
        lines.push(TextLine {
            field: SlipField::Phone,
            text: format!("📞 {}", dealer.phone),
            heading: false,
            advance: BODY_ADVANCE,
        });
    }
    if allowed(SlipField::Whatsapp) {
        if let Some(wa) = dealer.whatsapp.as_deref().filter(|s| !s.is_empty()) {
            lines.push(TextLine {
                field: SlipField::Whatsapp,
                text: format!("💬 {wa}"),
                heading: false,
                advance: BODY_ADVANCE,
            });
        }
    }
    if allowed(SlipField::Address) && !dealer.address.is_empty() {
        lines.push(TextLine {
            field: SlipField::Address,
            text: format!("📍 {}", util::clip_with_ellipsis(&dealer.address, ADDRESS_MAX_CHARS)),
            heading: false,
            advance: BODY_ADVANCE,
        });
    }

    SlipLayout { bbox, bg, text_color, qr, lines, max_text_px }
}

/// Template mode: paint the slip band and alpha-composite it onto the
/// creative. Output is flattened to opaque.
pub fn compose_template(
    creative: &DynamicImage,
    template: &SlipTemplate,
    dealer: &Dealer,
    qr_payload: Option<&str>,
) -> Result<RgbaImage, ComposeError> {
    let (cw, ch) = (creative.width(), creative.height());
    let layout = layout_template(cw, ch, template, dealer, qr_payload.is_some());

    let mut slip = ImageBuffer::from_pixel(layout.bbox.w, layout.bbox.h, layout.bg);

    if let (Some(spot), Some(data)) = (layout.qr, qr_payload) {
        let qr_img = qr::qr_image(data, spot.size)?;
        paste(&mut slip, &qr_img, spot.x, spot.y);
    }

    if !layout.lines.is_empty() {
        let heading = fonts::heading_font()?;
        let body = fonts::body_font()?;
        let mut y = PADDING;
        for line in &layout.lines {
            let (font, px) = if line.heading {
                (heading.as_ref(), HEADING_PX)
            } else {
                (body.as_ref(), BODY_PX)
            };
            let text = truncate_to_width(font, px, &line.text, layout.max_text_px as f32);
            draw_text(&mut slip, font, px, PADDING as i32, y as i32, layout.text_color, &text);
            y += line.advance;
        }
    }

    let mut out = creative.to_rgba8();
    overlay_alpha(&mut out, &slip, layout.bbox.x, layout.bbox.y);
    flatten(&mut out);
    Ok(out)
}

/// Target dimensions for an overlaid slip image: height capped by
/// `max_h_pct` of the creative, width from the slip's own aspect ratio,
/// never wider than the creative.
pub fn overlay_target(cw: u32, ch: u32, slip_w: u32, slip_h: u32, max_h_pct: u32) -> (u32, u32) {
    let target_h = (ch * max_h_pct / 100).max(1);
    let aspect = slip_w as f32 / slip_h.max(1) as f32;
    let target_w = ((target_h as f32 * aspect).round() as u32).min(cw).max(1);
    (target_w, target_h)
}

/// Dealer-slip / design mode: scale the uploaded image and lay it over the
/// creative. The slip's own alpha channel is honored when it has one;
/// otherwise it is pasted as-is.
pub fn compose_overlay(
    creative: &DynamicImage,
    slip: &DynamicImage,
    position: SlipPosition,
    max_h_pct: u32,
) -> RgbaImage {
    let (cw, ch) = (creative.width(), creative.height());
    let (tw, th) = overlay_target(cw, ch, slip.width(), slip.height(), max_h_pct);

    let resized = imageops::resize(&slip.to_rgba8(), tw, th, imageops::FilterType::Lanczos3);

    let (x, y) = match position {
        SlipPosition::Bottom => ((cw - tw) / 2, ch.saturating_sub(th)),
        SlipPosition::Top => ((cw - tw) / 2, 0),
        _ => (cw.saturating_sub(tw), ch.saturating_sub(th)),
    };

    let mut out = creative.to_rgba8();
    if slip.color().has_alpha() {
        overlay_alpha(&mut out, &resized, x, y);
    } else {
        paste(&mut out, &resized, x, y);
    }
    flatten(&mut out);
    out
}

fn flatten(img: &mut RgbaImage) {
    for p in img.pixels_mut() {
        p.0[3] = 255;
    }
}

fn paste(base: &mut RgbaImage, over: &RgbaImage, x: u32, y: u32) {
    for oy in 0..over.height() {
        for ox in 0..over.width() {
            let bx = x + ox;
            let by = y + oy;
            if bx >= base.width() || by >= base.height() {
                continue;
            }
            base.put_pixel(bx, by, *over.get_pixel(ox, oy));
        }
    }
}

fn overlay_alpha(base: &mut RgbaImage, over: &RgbaImage, x: u32, y: u32) {
    for oy in 0..over.height() {
        for ox in 0..over.width() {
            let p = over.get_pixel(ox, oy);
            let a = p.0[3] as f32 / 255.0;
            if a <= 0.0 {
                continue;
            }
            let bx = x + ox;
            let by = y + oy;
            if bx >= base.width() || by >= base.height() {
                continue;
            }
            let dst = base.get_pixel_mut(bx, by);
            let inv = 1.0 - a;
            dst.0[0] = (p.0[0] as f32 * a + dst.0[0] as f32 * inv) as u8;
            dst.0[1] = (p.0[1] as f32 * a + dst.0[1] as f32 * inv) as u8;
            dst.0[2] = (p.0[2] as f32 * a + dst.0[2] as f32 * inv) as u8;
            dst.0[3] = 255;
        }
    }
}

fn draw_text(
    img: &mut RgbaImage,
    font: &Font<'static>,
    px: f32,
    x: i32,
    y: i32,
    color: Rgba<u8>,
    text: &str,
) {
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    let mut caret_x = x as f32;
    // y is the top of the line; rusttype positions at the baseline.
    let baseline_y = y as f32 + v_metrics.ascent;

    for ch in text.chars() {
        let glyph = font.glyph(ch).scaled(scale).positioned(point(caret_x, baseline_y));
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, v| {
                let px = gx as i32 + bb.min.x;
                let py = gy as i32 + bb.min.y;
                if px < 0 || py < 0 {
                    return;
                }
                let (px, py) = (px as u32, py as u32);
                if px >= img.width() || py >= img.height() {
                    return;
                }
                let sa = v.clamp(0.0, 1.0);
                if sa <= 0.0 {
                    return;
                }
                let dst = img.get_pixel_mut(px, py);
                let inv = 1.0 - sa;
                dst.0[0] = (color.0[0] as f32 * sa + dst.0[0] as f32 * inv) as u8;
                dst.0[1] = (color.0[1] as f32 * sa + dst.0[1] as f32 * inv) as u8;
                dst.0[2] = (color.0[2] as f32 * sa + dst.0[2] as f32 * inv) as u8;
                dst.0[3] = 255;
            });
        }
        caret_x += glyph.unpositioned().h_metrics().advance_width;
    }
}

fn text_width(font: &Font<'static>, px: f32, text: &str) -> f32 {
    let scale = Scale::uniform(px);
    text.chars()
        .map(|ch| font.glyph(ch).scaled(scale).h_metrics().advance_width)
        .sum()
}

fn truncate_to_width(font: &Font<'static>, px: f32, text: &str, max_width: f32) -> String {
    if max_width <= 0.0 || text_width(font, px, text) <= max_width {
        return text.to_string();
    }
    let ellipsis = "...";
    let mut trimmed: String = text.to_string();
    while !trimmed.is_empty() {
        trimmed.pop();
        let candidate = format!("{trimmed}{ellipsis}");
        if text_width(font, px, &candidate) <= max_width {
            return candidate;
        }
    }
    ellipsis.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ApprovalStatus, DealerBrandLink};
    use crate::util;

    fn dealer() -> Dealer {
        Dealer {
            id: "d1".into(),
            name: "Kumar Electronics".into(),
            owner_name: "Raj Kumar".into(),
            phone: "+919876543212".into(),
            whatsapp: Some("+919876543212".into()),
            address: "Shop 12, Main Market, a very long street name indeed".into(),
            pincode: "110001".into(),
            district: "Central Delhi".into(),
            state: "Delhi".into(),
            logo_url: None,
            brand_links: vec![DealerBrandLink {
                brand_id: "b1".into(),
                status: ApprovalStatus::Approved,
                zone_id: None,
            }],
            default_slips: Default::default(),
            created_at: util::now_iso(),
        }
    }

    fn template(fields: Vec<SlipField>) -> SlipTemplate {
        SlipTemplate {
            id: "t1".into(),
            brand_id: "b1".into(),
            name: "Standard Footer".into(),
            position: SlipPosition::Bottom,
            max_w_pct: 100,
            max_h_pct: 20,
            allowed_fields: fields,
            style_preset: "standard".into(),
            bg_style: BgStyle::Light,
            is_active: true,
            created_at: util::now_iso(),
        }
    }

    #[test]
    fn bottom_band_geometry() {
        let b = slip_box(1080, 1920, SlipPosition::Bottom, 100, 20);
        assert_eq!(b, SlipBox { x: 0, y: 1536, w: 1080, h: 384 });
    }

    #[test]
    fn geometry_for_all_positions() {
        let b = slip_box(1000, 500, SlipPosition::Top, 50, 10);
        assert_eq!(b, SlipBox { x: 250, y: 0, w: 500, h: 50 });
        let b = slip_box(1000, 500, SlipPosition::Left, 50, 10);
        assert_eq!(b, SlipBox { x: 0, y: 225, w: 500, h: 50 });
        let b = slip_box(1000, 500, SlipPosition::Right, 50, 10);
        assert_eq!(b, SlipBox { x: 500, y: 225, w: 500, h: 50 });
        let b = slip_box(1000, 500, SlipPosition::Corner, 50, 10);
        assert_eq!(b, SlipBox { x: 500, y: 450, w: 500, h: 50 });
    }

    #[test]
    fn oversized_percentages_are_clamped_to_creative() {
        let b = slip_box(1000, 500, SlipPosition::Bottom, 150, 20);
        assert_eq!(b, SlipBox { x: 0, y: 400, w: 1000, h: 100 });
        let b = slip_box(1000, 500, SlipPosition::Right, 100, 300);
        assert_eq!(b, SlipBox { x: 0, y: 0, w: 1000, h: 500 });
    }

    #[test]
    fn geometry_floors_odd_percentages() {
        let b = slip_box(1080, 1080, SlipPosition::Bottom, 100, 15);
        assert_eq!(b.h, 162);
        let b = slip_box(1079, 1079, SlipPosition::Bottom, 100, 20);
        assert_eq!(b.h, 215); // floor(1079 * 0.2)
    }

    #[test]
    fn field_gating_drops_disallowed_fields() {
        let layout = layout_template(1080, 1920, &template(vec![SlipField::ShopName]), &dealer(), true);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.lines[0].field, SlipField::ShopName);
        // qr not in allowed_fields, so no region even with a payload
        assert!(layout.qr.is_none());
    }

    #[test]
    fn empty_dealer_fields_are_skipped() {
        let mut d = dealer();
        d.whatsapp = None;
        let layout = layout_template(
            1080,
            1920,
            &template(vec![SlipField::ShopName, SlipField::Phone, SlipField::Whatsapp, SlipField::Address]),
            &d,
            false,
        );
        let fields: Vec<SlipField> = layout.lines.iter().map(|l| l.field).collect();
        assert_eq!(fields, vec![SlipField::ShopName, SlipField::Phone, SlipField::Address]);
    }

    #[test]
    fn address_line_is_clipped() {
        let layout = layout_template(1080, 1920, &template(vec![SlipField::Address]), &dealer(), false);
        assert!(layout.lines[0].text.ends_with("..."));
        // marker + 40 chars + ellipsis
        assert_eq!(layout.lines[0].text.chars().count(), 2 + 40 + 3);
    }

    #[test]
    fn qr_region_is_square_right_aligned() {
        let layout = layout_template(1080, 1920, &template(vec![SlipField::Qr]), &dealer(), true);
        let spot = layout.qr.unwrap();
        assert_eq!(spot.size, 384 - 2 * PADDING);
        assert_eq!(spot.x, 1080 - spot.size - PADDING);
        assert_eq!(spot.y, PADDING);
        assert!(layout.max_text_px < spot.x);
    }

    #[test]
    fn no_payload_means_no_qr_region() {
        let layout = layout_template(1080, 1920, &template(vec![SlipField::Qr]), &dealer(), false);
        assert!(layout.qr.is_none());
        assert_eq!(layout.max_text_px, 1080 - 2 * PADDING);
    }

    #[test]
    fn template_band_is_alpha_blended_not_pasted() {
        // Solid blue creative; light band at 230/255 over bottom 20%.
        let creative = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(
            100,
            200,
            Rgba([0u8, 0, 255, 255]),
        ));
        let out = compose_template(&creative, &template(vec![]), &dealer(), None).unwrap();

        let above = out.get_pixel(50, 100);
        assert_eq!(above.0, [0, 0, 255, 255]);

        let inside = out.get_pixel(50, 180);
        // 0.902 * 255 + 0.098 * channel
        assert!(inside.0[0] > 220 && inside.0[1] > 220);
        assert!(inside.0[2] > 240); // blue stays saturated under a white band
        assert!(inside.0[2] < 255 || inside.0[0] < 255);
        assert_eq!(inside.0[3], 255);
    }

    #[test]
    fn overlay_target_respects_aspect_and_width_cap() {
        assert_eq!(overlay_target(1080, 1080, 1200, 800, 20), (324, 216));
        // wide slip gets clamped to creative width
        assert_eq!(overlay_target(300, 1000, 4000, 100, 20), (300, 200));
    }

    #[test]
    fn overlay_preserves_transparency_of_uploaded_slip() {
        let creative = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(
            200,
            200,
            Rgba([10u8, 200, 10, 255]),
        ));
        // Fully transparent slip: creative must show through untouched.
        let slip = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(
            100,
            50,
            Rgba([0u8, 0, 0, 0]),
        ));
        let out = compose_overlay(&creative, &slip, SlipPosition::Bottom, 20);
        assert_eq!(out.get_pixel(100, 190).0, [10, 200, 10, 255]);
    }

    #[test]
    fn overlay_without_alpha_channel_pastes_plainly() {
        let creative = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(
            200,
            200,
            Rgba([10u8, 200, 10, 255]),
        ));
        let slip = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            100,
            50,
            image::Rgb([5u8, 5, 5]),
        ));
        let out = compose_overlay(&creative, &slip, SlipPosition::Bottom, 20);
        // target 80x40 centered at bottom: x in [60,140), y in [160,200)
        assert_eq!(out.get_pixel(100, 190).0, [5, 5, 5, 255]);
        assert_eq!(out.get_pixel(30, 190).0, [10, 200, 10, 255]);
    }

    #[test]
    fn unknown_positions_land_bottom_right() {
        let creative = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(
            200,
            200,
            Rgba([0u8, 0, 0, 255]),
        ));
        let slip = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            40,
            40,
            image::Rgb([255u8, 255, 255]),
        ));
        let out = compose_overlay(&creative, &slip, SlipPosition::Corner, 20);
        assert_eq!(out.get_pixel(199, 199).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }
}
