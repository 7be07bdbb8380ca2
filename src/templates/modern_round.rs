//! Portrait default: status band, listing details, QR card with rounded
//! corners, dark identity band. Landscape sizes use the split layout instead.

use super::{CARD, DrawCtx, INK, PRICE_ORANGE, Placement, SUBTLE, quiet_zone_for};
use crate::error::SignError;
use crate::font::FontRole;
use crate::identity::{Theme, draw_identity_block};
use crate::text_fit::{MAX_LINES_ADDRESS, MAX_LINES_CTA, MAX_LINES_FEATURES};
use crate::types::{Color, Pt, Rect};

pub(super) fn draw(ctx: &mut DrawCtx<'_>) -> Result<Placement, SignError> {
    let (w, h, m) = (ctx.w(), ctx.h(), ctx.margin());
    let fonts = ctx.layout.fonts;
    let accent = ctx.data.color;
    let content_w = w - m * 2;

    let band_h = h * 0.11;
    ctx.fill_band(Rect::new(Pt::ZERO, Pt::ZERO, w, band_h), accent);
    let status = ctx.data.status_text.to_uppercase();
    let block = ctx
        .block(&status, FontRole::Bold, content_w, fonts.status.min(band_h * 0.6))
        .min_size(fonts.status * 0.3);
    let size = fonts.status.min(band_h * 0.6);
    ctx.line(&block, Color::WHITE, w / 2, band_h / 2 + size * 0.35);

    let address_rect = Rect::new(m, band_h + h * 0.025, content_w, h * 0.1);
    let address = ctx.data.address.clone();
    let block = ctx
        .block(&address, FontRole::Bold, content_w, fonts.address)
        .min_size(fonts.address * 0.4)
        .max_lines(MAX_LINES_ADDRESS);
    ctx.text_block(&block, INK, address_rect);
    let mut cursor = address_rect.bottom();

    if let Some(city) = ctx.data.city_line() {
        let size = fonts.features * 0.8;
        let block = ctx.block(&city, FontRole::Medium, content_w, size);
        ctx.line(&block, SUBTLE, w / 2, cursor + size * 1.2);
        cursor = cursor + size * 1.4;
    }
    if !ctx.data.features.is_empty() {
        let features = ctx.data.features.clone();
        let block = ctx
            .block(&features, FontRole::Medium, content_w, fonts.features)
            .max_lines(MAX_LINES_FEATURES);
        ctx.line(&block, SUBTLE, w / 2, cursor + fonts.features * 1.2);
        cursor = cursor + fonts.features * 1.4;
    }
    if !ctx.data.price.is_empty() {
        let price = ctx.data.price.clone();
        let block = ctx.block(&price, FontRole::Bold, content_w, fonts.price);
        ctx.line(&block, PRICE_ORANGE, w / 2, cursor + fonts.price * 1.05);
        cursor = cursor + fonts.price * 1.25;
    }

    let identity_h = h * 0.18;
    let identity_top = h - identity_h;
    let quiet = quiet_zone_for(ctx.layout);
    let cta_h = fonts.cta * 2.6;
    let card_top = cursor + h * 0.02;
    let card_bottom = identity_top - h * 0.02;
    let available = card_bottom - card_top - cta_h - quiet * 2;
    let qr_size = (w * 0.5).min(available).min(content_w - quiet * 2);

    let card_w = (qr_size + quiet * 4).min(content_w);
    let card = Rect::new(
        (w - card_w) / 2,
        card_top,
        card_w,
        card_bottom - card_top,
    );
    ctx.canvas.save_state();
    ctx.canvas.set_fill_color(CARD);
    ctx.canvas.round_rect_path(card, qr_size * 0.08);
    ctx.canvas.fill();
    ctx.canvas.restore_state();

    let qr_top = card_top + quiet + (available - qr_size).max(Pt::ZERO) / 2;
    let placement = ctx.draw_qr((w - qr_size) / 2, qr_top, qr_size)?;

    let cta = ctx.data.cta;
    let block = ctx
        .block(cta, FontRole::Bold, card_w - quiet * 2, fonts.cta)
        .min_size(fonts.cta * 0.5)
        .max_lines(MAX_LINES_CTA);
    let cta_rect = Rect::new(
        card.x + quiet,
        qr_top + qr_size + quiet,
        card_w - quiet * 2,
        (card_bottom - (qr_top + qr_size + quiet)).max(fonts.cta),
    );
    ctx.text_block(&block, accent, cta_rect);

    draw_identity_block(ctx, Rect::new(Pt::ZERO, identity_top, w, identity_h), Theme::Dark, None);
    Ok(placement)
}
