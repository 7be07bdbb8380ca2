//! Phone + QR premium: serif status band, a large QR, the agent phone in the
//! accent color, identity band at the bottom.

use super::{DrawCtx, Placement, SUBTLE, quiet_zone_for};
use crate::error::SignError;
use crate::font::FontRole;
use crate::identity::{Theme, draw_identity_block};
use crate::text_fit::MAX_LINES_CTA;
use crate::types::{Color, Pt, Rect};

const SEPARATOR: Color = Color {
    r: 0.9,
    g: 0.9,
    b: 0.9,
};

pub(super) fn draw_portrait(ctx: &mut DrawCtx<'_>) -> Result<Placement, SignError> {
    let (w, h, m) = (ctx.w(), ctx.h(), ctx.margin());
    let accent = ctx.data.color;
    let content_w = w - m * 2;
    let quiet = quiet_zone_for(ctx.layout);

    let band_h = h * 0.12;
    ctx.fill_band(Rect::new(Pt::ZERO, Pt::ZERO, w, band_h), accent);
    let status = ctx.data.status_text.to_uppercase();
    let block = ctx
        .block(&status, FontRole::Serif, content_w, band_h * 0.5)
        .min_size(band_h * 0.25);
    ctx.line(&block, Color::WHITE, w / 2, band_h * 0.65);

    let identity_h = h * 0.18;
    let identity_top = h - identity_h;

    let qr_top = band_h + (quiet * 1.5).max(h * 0.03);
    let qr_size = (w * 0.55).min(h * 0.36).min(content_w - quiet * 2);
    let placement = ctx.draw_qr((w - qr_size) / 2, qr_top, qr_size)?;

    let cta_top = qr_top + qr_size + quiet;
    let cta_h = h * 0.07;
    let cta = ctx.data.cta;
    let block = ctx
        .block(cta, FontRole::Script, content_w, w * 0.08)
        .min_size(w * 0.04)
        .max_lines(MAX_LINES_CTA);
    ctx.text_block(&block, accent, Rect::new(m, cta_top, content_w, cta_h));

    let license = ctx.license_text();
    let license_h = if license.is_some() { ctx.layout.fonts.license * 2 } else { Pt::ZERO };
    let phone_top = cta_top + cta_h;
    let phone_h = (identity_top - h * 0.02 - license_h - phone_top).max(Pt::ZERO);
    if let Some(phone) = ctx.data.agent_phone.clone() {
        let max_size = (w * 0.18).min(phone_h * 0.8);
        let block = ctx
            .block(&phone, FontRole::Bold, w * 0.9, max_size)
            .min_size((w * 0.10).min(max_size));
        ctx.line(&block, accent, w / 2, phone_top + phone_h / 2 + max_size * 0.35);
    }

    if let Some(license) = license {
        let size = ctx.layout.fonts.license;
        let block = ctx.block(&license, FontRole::Medium, content_w, size);
        ctx.line(&block, SUBTLE, w / 2, identity_top - size * 0.8);
    }

    draw_identity_block(ctx, Rect::new(Pt::ZERO, identity_top, w, identity_h), Theme::Dark, None);
    Ok(placement)
}

/// Two columns over an identity band: status, phone and license on the left
/// two thirds, QR and call to action in the right third.
pub(super) fn draw_landscape(ctx: &mut DrawCtx<'_>) -> Result<Placement, SignError> {
    let (w, h, m) = (ctx.w(), ctx.h(), ctx.margin());
    let accent = ctx.data.color;
    let quiet = quiet_zone_for(ctx.layout);
    let col_w = w / 3;
    let identity_h = h * 0.2;
    let upper_h = h - identity_h;

    ctx.fill_band(Rect::new(Pt::ZERO, Pt::ZERO, w, h * 0.035), accent);

    let left_w = col_w * 2 - m * 2;
    let status = ctx.data.status_text.to_uppercase();
    let block = ctx
        .block(&status, FontRole::Serif, left_w * 0.9, h * 0.10)
        .min_size(h * 0.05);
    ctx.line(&block, accent, col_w, h * 0.22);

    if let Some(phone) = ctx.data.agent_phone.clone() {
        let block = ctx
            .block(&phone, FontRole::Bold, left_w * 0.95, h * 0.16)
            .min_size(h * 0.08);
        ctx.line(&block, accent, col_w, h * 0.46);
    }

    let name = ctx.data.agent_name.clone();
    let block = ctx
        .block(&name, FontRole::Script, left_w * 0.8, h * 0.07)
        .min_size(h * 0.035);
    ctx.line(&block, Color::BLACK, col_w, h * 0.60);

    if let Some(license) = ctx.license_text() {
        let size = ctx.layout.fonts.license;
        let block = ctx.block(&license, FontRole::Medium, left_w, size);
        ctx.line(&block, SUBTLE, col_w, upper_h - size * 1.2);
    }

    let separator_x = col_w * 2;
    ctx.stroke_line(
        (separator_x, h * 0.08),
        (separator_x, upper_h - h * 0.04),
        SEPARATOR,
        Pt::from_i32(2),
    );

    let cta_h = h * 0.08;
    let qr_size = (col_w * 0.8)
        .min(upper_h - h * 0.035 - cta_h - quiet * 4)
        .min(col_w - m - quiet * 2);
    let qr_x = separator_x + (col_w - qr_size) / 2;
    let qr_top = h * 0.035 + quiet * 2 + (upper_h - h * 0.035 - quiet * 4 - cta_h - qr_size).max(Pt::ZERO) / 2;
    let placement = ctx.draw_qr(qr_x, qr_top, qr_size)?;

    let cta = ctx.data.cta;
    let block = ctx
        .block(cta, FontRole::Script, col_w - m * 2, h * 0.06)
        .min_size(h * 0.03)
        .max_lines(MAX_LINES_CTA);
    ctx.text_block(
        &block,
        accent,
        Rect::new(separator_x + m, qr_top + qr_size + quiet, col_w - m * 2, cta_h),
    );

    draw_identity_block(ctx, Rect::new(Pt::ZERO, upper_h, w, identity_h), Theme::Dark, None);
    Ok(placement)
}
