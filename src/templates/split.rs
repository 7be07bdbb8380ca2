//! Landscape split: agent and listing details on the left half, the QR and
//! call to action on the right, an accent divider and border around both.

use super::{DrawCtx, INK, PRICE_ORANGE, Placement, SUBTLE, quiet_zone_for};
use crate::error::SignError;
use crate::font::FontRole;
use crate::identity::{Theme, draw_identity_block};
use crate::text_fit::{Align, MAX_LINES_ADDRESS, MAX_LINES_CTA, MAX_LINES_FEATURES};
use crate::types::{Pt, Rect};

pub(super) fn draw(ctx: &mut DrawCtx<'_>) -> Result<Placement, SignError> {
    let (w, h) = (ctx.w(), ctx.h());
    let fonts = ctx.layout.fonts;
    let accent = ctx.data.color;
    let quiet = quiet_zone_for(ctx.layout);
    let margin_x = (w * 0.04).max(ctx.margin() / 2);
    let margin_y = (h * 0.06).max(ctx.margin());
    let mid = w / 2;

    let border = (w * 0.004).clamp(Pt::from_i32(2), Pt::from_i32(6));
    ctx.canvas.save_state();
    ctx.canvas.set_stroke_color(accent);
    ctx.canvas.set_line_width(border);
    ctx.rect_path(Rect::new(Pt::ZERO, Pt::ZERO, w, h).inset(border / 2));
    ctx.canvas.stroke();
    ctx.canvas.restore_state();

    let divider_w = (w * 0.012).clamp(Pt::from_i32(3), Pt::from_i32(8));
    ctx.canvas
        .fill_rect(Rect::new(mid - divider_w / 2, margin_y, divider_w, h - margin_y * 2), accent);

    // Left half.
    let x0 = margin_x;
    let left_w = mid - margin_x * 1.5;
    let identity = Rect::new(x0, margin_y, left_w, h * 0.26);
    draw_identity_block(ctx, identity, Theme::Light, None);

    let address_rect = Rect::new(x0, identity.bottom() + h * 0.03, left_w, h * 0.16);
    let address = ctx.data.address.clone();
    let block = ctx
        .block(&address, FontRole::Bold, left_w, fonts.address * 1.1)
        .min_size(fonts.address * 0.4)
        .max_lines(MAX_LINES_ADDRESS)
        .align(Align::Left);
    ctx.text_block(&block, INK, address_rect);
    let mut cursor = address_rect.bottom();

    if !ctx.data.price.is_empty() {
        let price = ctx.data.price.clone();
        let size = fonts.price * 1.2;
        let block = ctx
            .block(&price, FontRole::Bold, left_w, size)
            .min_size(size * 0.4)
            .align(Align::Left);
        let used = ctx.line(&block, PRICE_ORANGE, x0, cursor + size);
        cursor = cursor + size.max(used) * 1.2;
    }
    if !ctx.data.features.is_empty() {
        let features = ctx.data.features.clone();
        let size = fonts.features * 1.2;
        let block = ctx
            .block(&features, FontRole::Medium, left_w, size)
            .min_size(size * 0.4)
            .max_lines(MAX_LINES_FEATURES)
            .align(Align::Left);
        ctx.line(&block, SUBTLE, x0, cursor + size);
    }

    let bar_h = (w * 0.008).clamp(Pt::from_i32(4), Pt::from_i32(8));
    let bar = Rect::new(x0, h - margin_y / 2 - bar_h, mid - margin_x - x0, bar_h);
    ctx.canvas.fill_rect(bar, accent);

    // Right half.
    let right_x0 = mid + margin_x / 2;
    let right_w = w - margin_x - right_x0;
    let cta_h = fonts.cta * 2.5;
    let column_h = h - margin_y * 2;
    let qr_size = (right_w - quiet * 2).min(column_h - quiet * 2 - cta_h);
    let qr_x = right_x0 + (right_w - qr_size) / 2;
    let qr_top = margin_y + quiet + (column_h - quiet * 2 - cta_h - qr_size).max(Pt::ZERO) / 2;
    let placement = ctx.draw_qr(qr_x, qr_top, qr_size)?;

    let cta = ctx.data.cta;
    let block = ctx
        .block(cta, FontRole::Bold, right_w, fonts.cta)
        .min_size(fonts.cta * 0.5)
        .max_lines(MAX_LINES_CTA);
    ctx.text_block(
        &block,
        accent,
        Rect::new(right_x0, qr_top + qr_size + quiet, right_w, cta_h),
    );

    Ok(placement)
}
