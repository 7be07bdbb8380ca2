//! Address + QR premium. The same arrangement serves both orientations: the
//! address leads in serif capitals, the QR fills the remaining body, and a
//! dark identity strip closes the sign.

use super::{DrawCtx, INK, Placement, SUBTLE, quiet_zone_for};
use crate::error::SignError;
use crate::font::FontRole;
use crate::identity::{Theme, draw_identity_block};
use crate::text_fit::{MAX_LINES_ADDRESS, MAX_LINES_CTA};
use crate::types::{Pt, Rect};

pub(super) fn draw(ctx: &mut DrawCtx<'_>) -> Result<Placement, SignError> {
    let (w, h, m) = (ctx.w(), ctx.h(), ctx.margin());
    let accent = ctx.data.color;
    let content_w = w - m * 2;
    let quiet = quiet_zone_for(ctx.layout);

    let strip_h = h * 0.18;
    let strip_top = h - strip_h;
    let body_h = strip_top;

    ctx.fill_band(Rect::new(Pt::ZERO, Pt::ZERO, w, h * 0.02), accent);

    let address = ctx.data.address.to_uppercase();
    let address_w = (w * 0.9).min(content_w);
    let address_rect = Rect::new((w - address_w) / 2, h * 0.05, address_w, body_h * 0.2);
    let block = ctx
        .block(&address, FontRole::Serif, address_rect.width, body_h * 0.12)
        .min_size(body_h * 0.04)
        .max_lines(MAX_LINES_ADDRESS);
    let fit = ctx.text_block(&block, INK, address_rect);
    let mut cursor = address_rect.center_y() + fit.total_height / 2;

    if let Some(city) = ctx.data.city_line() {
        let size = (fit.size * 0.4).max(ctx.layout.fonts.features * 0.5);
        let block = ctx.block(&city.to_uppercase(), FontRole::Medium, content_w, size);
        ctx.line(&block, SUBTLE, w / 2, cursor + size * 1.2);
        cursor = cursor + size * 1.5;
    }

    let license = ctx.license_text();
    let license_h = match license {
        Some(_) => ctx.layout.fonts.license * 2,
        None => Pt::ZERO,
    };
    let region_top = cursor + quiet * 2;
    let region_bottom = strip_top - license_h - h * 0.015;
    let remaining = (region_bottom - region_top).max(Pt::ZERO);
    let cta_reserve = remaining * 0.16;
    let qr_size = (w * 0.5)
        .min(remaining * 0.7)
        .min(remaining - cta_reserve - quiet * 2)
        .min(content_w - quiet * 2);
    let qr_top = region_top + (remaining - cta_reserve - qr_size).max(Pt::ZERO) / 2;
    let placement = ctx.draw_qr((w - qr_size) / 2, qr_top, qr_size)?;

    let cta = ctx.data.cta;
    let cta_size = qr_size * 0.15;
    let block = ctx
        .block(cta, FontRole::Script, content_w, cta_size)
        .min_size(cta_size * 0.4)
        .max_lines(MAX_LINES_CTA);
    let cta_top = qr_top + qr_size + quiet;
    ctx.text_block(
        &block,
        accent,
        Rect::new(m, cta_top, content_w, (region_bottom - cta_top).max(cta_size)),
    );

    if let Some(license) = license {
        let size = ctx.layout.fonts.license;
        let block = ctx.block(&license, FontRole::Medium, content_w, size);
        ctx.line(&block, SUBTLE, w / 2, strip_top - size * 0.8);
    }

    draw_identity_block(ctx, Rect::new(Pt::ZERO, strip_top, w, strip_h), Theme::Dark, None);
    Ok(placement)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{draw, request, strings};

    #[test]
    fn address_is_set_in_capitals_above_the_qr() {
        let (doc, placement, _) = draw(&request("18x24", "yard_address_qr_premium"), false);
        let texts = strings(&doc);
        assert!(texts.contains(&"123 MAIN STREET".to_string()));
        assert!(texts.contains(&"SPRINGFIELD, CA".to_string()));
        assert!(placement.qr_size.to_inches() >= 4.0);
    }

    #[test]
    fn landscape_keeps_qr_centered() {
        let (_, placement, layout) = draw(&request("36x18", "yard_address_qr_premium"), false);
        let center = placement.qr_rect.x + placement.qr_size / 2;
        let mid = layout.trim_width_pt / 2;
        assert!((center - mid).abs().to_f32() < 1.0);
        assert!(placement.qr_size.to_inches() >= 2.5);
    }
}
