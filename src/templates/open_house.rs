//! Open house: a banner headline with a gold rule, listing details, the QR,
//! and a light identity band that carries the call to action.

use super::{DrawCtx, INK, PRICE_ORANGE, Placement, SUBTLE, quiet_zone_for};
use crate::error::SignError;
use crate::font::FontRole;
use crate::identity::{Theme, draw_identity_block};
use crate::text_fit::{MAX_LINES_ADDRESS, MAX_LINES_FEATURES};
use crate::types::{Color, Pt, Rect};

const GOLD: Color = Color {
    r: 201.0 / 255.0,
    g: 162.0 / 255.0,
    b: 39.0 / 255.0,
};

fn draw_banner(ctx: &mut DrawCtx<'_>, banner_h: Pt) {
    let (w, m) = (ctx.w(), ctx.margin());
    let accent = ctx.data.color;
    ctx.fill_band(Rect::new(Pt::ZERO, Pt::ZERO, w, banner_h), accent);
    let rule_h = (banner_h * 0.06).max(Pt::from_i32(3));
    ctx.fill_band(Rect::new(Pt::ZERO, banner_h, w, rule_h), GOLD);

    let headline = ctx.data.open_house_text.to_uppercase();
    let size = banner_h * 0.55;
    let block = ctx
        .block(&headline, FontRole::Serif, w - m * 2, size)
        .min_size(size * 0.35);
    ctx.line(&block, Color::WHITE, w / 2, banner_h / 2 + size * 0.35);
}

/// Address, features and price stacked in `rect`. Returns the bottom of the
/// last line drawn.
fn draw_details(ctx: &mut DrawCtx<'_>, rect: Rect) -> Pt {
    let fonts = ctx.layout.fonts;
    let address = ctx.data.address.clone();
    let address_h = rect.height * 0.5;
    let block = ctx
        .block(&address, FontRole::Bold, rect.width, fonts.address)
        .min_size(fonts.address * 0.4)
        .max_lines(MAX_LINES_ADDRESS);
    ctx.text_block(&block, INK, Rect::new(rect.x, rect.y, rect.width, address_h));
    let mut cursor = rect.y + address_h;

    if !ctx.data.features.is_empty() {
        let features = ctx.data.features.clone();
        let size = fonts.features.min(rect.height * 0.18);
        let block = ctx
            .block(&features, FontRole::Medium, rect.width, size)
            .max_lines(MAX_LINES_FEATURES);
        ctx.line(&block, SUBTLE, rect.center_x(), cursor + size);
        cursor = cursor + size * 1.3;
    }
    if !ctx.data.price.is_empty() {
        let price = ctx.data.price.clone();
        let size = fonts.price.min((rect.bottom() - cursor).max(Pt::ZERO) * 0.8);
        let block = ctx.block(&price, FontRole::Bold, rect.width, size);
        ctx.line(&block, PRICE_ORANGE, rect.center_x(), cursor + size);
        cursor = cursor + size * 1.2;
    }
    cursor
}

pub(super) fn draw_portrait(ctx: &mut DrawCtx<'_>) -> Result<Placement, SignError> {
    let (w, h, m) = (ctx.w(), ctx.h(), ctx.margin());
    let quiet = quiet_zone_for(ctx.layout);
    let banner_h = h * 0.14;
    draw_banner(ctx, banner_h);

    let details = Rect::new(m, banner_h + h * 0.03, w - m * 2, h * 0.2);
    let details_bottom = draw_details(ctx, details).max(details.bottom());

    let identity_h = h * 0.22;
    let identity_top = h - identity_h;
    let available = identity_top - h * 0.02 - details_bottom - quiet * 2;
    let qr_size = (w * 0.5).min(available).min(w - m * 2 - quiet * 2);
    let qr_top = details_bottom + quiet + (available - qr_size).max(Pt::ZERO) / 2;
    let placement = ctx.draw_qr((w - qr_size) / 2, qr_top, qr_size)?;

    let cta = ctx.data.cta;
    draw_identity_block(ctx, Rect::new(Pt::ZERO, identity_top, w, identity_h), Theme::Light, Some(cta));
    Ok(placement)
}

pub(super) fn draw_landscape(ctx: &mut DrawCtx<'_>) -> Result<Placement, SignError> {
    let (w, h, m) = (ctx.w(), ctx.h(), ctx.margin());
    let quiet = quiet_zone_for(ctx.layout);
    let banner_h = h * 0.18;
    draw_banner(ctx, banner_h);

    let identity_h = h * 0.24;
    let identity_top = h - identity_h;
    let body_top = banner_h + h * 0.04;
    let body_bottom = identity_top - h * 0.03;

    let half = w / 2;
    let details = Rect::new(m, body_top, half - m * 2, body_bottom - body_top);
    draw_details(ctx, details);

    let right_w = w - half - m;
    let qr_size = (right_w * 0.7)
        .min(body_bottom - body_top - quiet * 2)
        .min(right_w - quiet * 2);
    let qr_x = half + (right_w - qr_size) / 2;
    let qr_top = body_top + quiet + (body_bottom - body_top - quiet * 2 - qr_size).max(Pt::ZERO) / 2;
    let placement = ctx.draw_qr(qr_x, qr_top, qr_size)?;

    let cta = ctx.data.cta;
    draw_identity_block(ctx, Rect::new(Pt::ZERO, identity_top, w, identity_h), Theme::Light, Some(cta));
    Ok(placement)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{draw, request, strings};

    #[test]
    fn headline_defaults_and_overrides() {
        let (doc, _, _) = draw(&request("24x36", "open_house"), false);
        assert_eq!(strings(&doc)[0], "OPEN HOUSE");

        let mut req = request("24x36", "yard_open_house");
        req.open_house_text = Some("Open Sat 1-4".to_string());
        let (doc, _, _) = draw(&req, false);
        assert_eq!(strings(&doc)[0], "OPEN SAT 1-4");
    }

    #[test]
    fn call_to_action_lives_in_the_identity_band() {
        let (doc, placement, layout) = draw(&request("36x24", "yard_open_house"), false);
        let texts = strings(&doc);
        assert!(texts.contains(&"SCAN FOR DETAILS".to_string()));
        assert!(placement.qr_rect.x > layout.trim_width_pt / 2);
        assert!(placement.qr_rect.bottom() < layout.trim_height_pt * 0.76);
    }
}
