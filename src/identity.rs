//! Agent identity block shared by every template: photo or initials, name,
//! phone, email, and the brokerage logo or name.

use crate::assets::AssetKind;
use crate::error::SignError;
use crate::fields::initials;
use crate::font::FontRole;
use crate::templates::DrawCtx;
use crate::text_fit::{Align, MAX_LINES_BROKERAGE, MAX_LINES_CTA};
use crate::types::{Color, Pt, Rect};
use image::GenericImageView;
use std::sync::Arc;

const INITIALS_FILL: &str = "#334155";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Dark,
    Light,
}

struct Palette {
    background: Color,
    primary: Color,
    secondary: Color,
    divider: Color,
    photo_ring: Color,
}

impl Theme {
    fn palette(self) -> Palette {
        let hex = |raw: &str| Color::from_hex(raw).unwrap_or(Color::BLACK);
        match self {
            Theme::Dark => Palette {
                background: hex("#0f172a"),
                primary: Color::WHITE,
                secondary: hex("#cbd5e1"),
                divider: hex("#334155"),
                photo_ring: Color::WHITE,
            },
            Theme::Light => Palette {
                background: Color::WHITE,
                primary: hex("#0f172a"),
                secondary: hex("#475569"),
                divider: hex("#e2e8f0"),
                photo_ring: Color::BLACK,
            },
        }
    }
}

/// Draws the identity band into `rect` (trim space). With `cta`, a call to
/// action row and divider sit above the agent details.
pub(crate) fn draw_identity_block(ctx: &mut DrawCtx<'_>, rect: Rect, theme: Theme, cta: Option<&str>) {
    let palette = theme.palette();
    ctx.fill_band(rect, palette.background);

    let margin = rect.height * 0.15;
    let content_top = rect.y + margin;
    let content_bottom = rect.bottom() - margin;
    let mut info_top = content_top;

    if let Some(cta) = cta.map(str::trim).filter(|v| !v.is_empty()) {
        let available = (content_bottom - content_top).max(Pt::ZERO);
        let min_info = (available * 0.55).max(Pt::from_i32(42));
        let cta_h = (available * 0.24).min((available - min_info).max(Pt::ZERO));
        if cta_h > Pt::ZERO {
            let block = ctx
                .block(cta, FontRole::Bold, rect.width - margin * 2, (cta_h * 0.55).max(Pt::from_i32(12)))
                .min_size((cta_h * 0.35).max(Pt::from_i32(10)))
                .max_lines(MAX_LINES_CTA);
            ctx.text_block(
                &block,
                palette.primary,
                Rect::new(rect.x + margin, content_top, rect.width - margin * 2, cta_h),
            );
            let divider_y = content_top + cta_h;
            ctx.stroke_line(
                (rect.x + margin, divider_y),
                (rect.right() - margin, divider_y),
                palette.divider,
                Pt::from_i32(1),
            );
            info_top = divider_y + rect.height * 0.06;
        }
    }

    let safe_h = (content_bottom - info_top).max(Pt::ZERO);
    if safe_h <= Pt::ZERO {
        return;
    }
    // Rider strips and split columns are too narrow for a separate brokerage
    // column; the brokerage then stacks under the agent details.
    let narrow = rect.width < rect.height * 2.5;
    let head = if narrow { safe_h.min(rect.width * 0.25) } else { safe_h };
    let margin_x = if narrow { margin.min(rect.width * 0.05) } else { margin };
    let head_rect = Rect::square(rect.x + margin_x, info_top, head);
    draw_portrait(ctx, head_rect, palette.photo_ring);

    let brokerage_right = rect.right() - margin_x;
    let brokerage_w = rect.width * 0.30;
    let info_x = head_rect.right() + margin_x * 1.5;
    let info_w = if narrow {
        (brokerage_right - info_x).max(Pt::ZERO)
    } else {
        (rect.width * 0.45).min((brokerage_right - brokerage_w - margin_x / 2 - info_x).max(Pt::ZERO))
    };
    let mut cursor = info_top;
    let name = ctx.data.agent_name.clone();
    let lines = [
        (Some(name), FontRole::Bold, head * 0.35, palette.primary),
        (ctx.data.agent_phone.clone(), FontRole::Bold, head * 0.22, palette.primary),
        (ctx.data.agent_email.clone(), FontRole::Medium, head * 0.18, palette.secondary),
    ];
    for (text, role, size, color) in lines {
        let Some(text) = text.filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let block = ctx
            .block(&text, role, info_w, size)
            .min_size(size * 0.7)
            .align(Align::Left);
        let used = ctx.line(&block, color, info_x, cursor + size);
        cursor = cursor + used.max(size) * 1.2;
    }

    let (slot_right, slot_w, slot_top, slot_h, align) = if narrow {
        let slot_h = (content_bottom - cursor).max(Pt::ZERO).min(head * 0.3);
        (brokerage_right, info_w, cursor, slot_h, Align::Left)
    } else {
        (brokerage_right, brokerage_w, info_top, safe_h, Align::Right)
    };
    if slot_h <= Pt::ZERO || slot_w <= Pt::ZERO {
        return;
    }
    let logo_left = if narrow { Some(info_x) } else { None };
    if !draw_brokerage_logo(ctx, slot_right, logo_left, slot_w, slot_top, slot_h) {
        if let Some(brokerage) = ctx.data.brokerage.clone() {
            let size = head * 0.22;
            let block = ctx
                .block(&brokerage, FontRole::Medium, slot_w, size)
                .min_size(size * 0.6)
                .max_lines(MAX_LINES_BROKERAGE)
                .align(align);
            let (anchor, baseline) = if narrow {
                (info_x, cursor + size)
            } else {
                (slot_right, info_top + safe_h * 0.3 + size)
            };
            ctx.line(&block, palette.secondary, anchor, baseline);
        }
    }
}

/// Headshot clipped to a circle, or the initials circle when there is no
/// usable photo.
pub(crate) fn draw_portrait(ctx: &mut DrawCtx<'_>, head: Rect, ring: Color) {
    let r = head.width / 2;
    let (cx, cy) = (head.center_x(), head.center_y());
    let photo = ctx
        .asset(AssetKind::Headshot)
        .and_then(|bytes| match square_png(&bytes) {
            Ok(png) => Some(png),
            Err(err) => {
                crate::debug::log_event(
                    ctx.logger(),
                    "asset.unavailable",
                    &[("kind", "headshot".to_string()), ("reason", err.to_string())],
                );
                None
            }
        });

    if let Some(png) = photo {
        let id = ctx.canvas.register_image(Arc::new(png));
        ctx.canvas.save_state();
        ctx.canvas.circle_path(cx, cy, r);
        ctx.canvas.clip_path();
        ctx.canvas.draw_image(head, id);
        ctx.canvas.restore_state();
        ctx.canvas.save_state();
        ctx.canvas.set_stroke_color(ring);
        ctx.canvas.set_line_width(Pt::from_i32(1));
        ctx.canvas.circle_path(cx, cy, r);
        ctx.canvas.stroke();
        ctx.canvas.restore_state();
        return;
    }

    ctx.canvas.save_state();
    ctx.canvas
        .set_fill_color(Color::from_hex(INITIALS_FILL).unwrap_or(Color::BLACK));
    ctx.canvas.set_stroke_color(ring);
    ctx.canvas.set_line_width(Pt::from_i32(1));
    ctx.canvas.circle_path(cx, cy, r);
    ctx.canvas.fill_stroke();
    ctx.canvas.restore_state();
    let letters = initials(&ctx.data.agent_name);
    if !letters.is_empty() {
        let size = head.width * 0.4;
        let block = ctx.block(&letters, FontRole::Bold, head.width * 0.8, size);
        ctx.line(&block, Color::WHITE, cx, cy + size * 0.35);
    }
}

/// Logo scaled into the slot with its aspect kept; right-aligned unless `left` is given.
fn draw_brokerage_logo(
    ctx: &mut DrawCtx<'_>,
    right: Pt,
    left: Option<Pt>,
    max_w: Pt,
    top: Pt,
    max_h: Pt,
) -> bool {
    let Some(bytes) = ctx.asset(AssetKind::BrokerageLogo) else {
        return false;
    };
    let (px_w, px_h) = match image::load_from_memory(&bytes) {
        Ok(img) => img.dimensions(),
        Err(err) => {
            crate::debug::log_event(
                ctx.logger(),
                "asset.unavailable",
                &[("kind", "brokerage_logo".to_string()), ("reason", err.to_string())],
            );
            return false;
        }
    };
    if px_w == 0 || px_h == 0 {
        return false;
    }
    let aspect = px_w as f32 / px_h as f32;
    let mut draw_h = max_h;
    let mut draw_w = max_h * aspect;
    if draw_w > max_w {
        draw_w = max_w;
        draw_h = max_w / aspect;
    }
    let id = ctx.canvas.register_image(bytes);
    let x = left.unwrap_or(right - draw_w);
    ctx.canvas
        .draw_image(Rect::new(x, top + (max_h - draw_h) / 2, draw_w, draw_h), id);
    true
}

/// Center-crops a headshot to a square and re-encodes it as PNG.
pub(crate) fn square_png(bytes: &[u8]) -> Result<Vec<u8>, SignError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| SignError::Render(format!("headshot decode failed: {e}")))?;
    let (w, h) = img.dimensions();
    let side = w.min(h);
    if side == 0 {
        return Err(SignError::Render("headshot has no pixels".to_string()));
    }
    let cropped = img.crop_imm((w - side) / 2, (h - side) / 2, side, side);
    let mut out = std::io::Cursor::new(Vec::new());
    cropped
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| SignError::Render(format!("headshot encode failed: {e}")))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryStorage;
    use crate::canvas::{Canvas, Command};
    use crate::compose::SignData;
    use crate::font::FontRegistry;
    use crate::layout::make_layout;
    use crate::templates::test_support::request;
    use image::{Rgba, RgbaImage};

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([200, 40, 40, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn render(data: &SignData, storage: Option<&MemoryStorage>, theme: Theme, cta: Option<&str>) -> Vec<Command> {
        let layout = make_layout(18.0, 24.0).unwrap();
        let fonts = FontRegistry::new();
        let mut canvas = Canvas::new(layout.page_size());
        {
            let storage = storage.map(|s| s as &dyn crate::assets::Storage);
            let mut ctx = DrawCtx::new(&mut canvas, &fonts, &layout, data).with_storage(storage);
            let band = Rect::new(Pt::ZERO, Pt::from_i32(1400), ctx.w(), Pt::from_i32(328));
            draw_identity_block(&mut ctx, band, theme, cta);
        }
        canvas.finish().pages.remove(0).commands
    }

    fn texts(commands: &[Command]) -> Vec<String> {
        commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawString { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn falls_back_to_initials_and_brokerage_text() {
        let data = SignData::from_request(&request("18x24", "yard_modern_round"), false).unwrap();
        let commands = render(&data, None, Theme::Dark, None);
        let texts = texts(&commands);
        assert_eq!(texts[0], "JQ");
        assert!(texts.contains(&"Jane Q Public".to_string()));
        assert!(texts.contains(&"(555) 123-4567".to_string()));
        assert!(texts.contains(&"Acme Realty".to_string()));
        assert!(!commands.iter().any(|c| matches!(c, Command::DrawImage { .. })));
    }

    #[test]
    fn uses_photo_and_logo_when_available() {
        let storage = MemoryStorage::new();
        storage.insert("agents/1.png", png(40, 60), "image/png");
        storage.insert("logos/1.png", png(300, 100), "image/png");
        let mut req = request("18x24", "yard_modern_round");
        req.headshot_key = Some("agents/1.png".to_string());
        req.logo_key = Some("logos/1.png".to_string());
        let data = SignData::from_request(&req, false).unwrap();
        let commands = render(&data, Some(&storage), Theme::Light, None);
        let images: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawImage { width, height, .. } => Some((*width, *height)),
                _ => None,
            })
            .collect();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].0, images[0].1);
        assert!(commands.iter().any(|c| matches!(c, Command::ClipPath)));
        let logo = images[1];
        assert!((logo.0.to_f32() / logo.1.to_f32() - 3.0).abs() < 0.01);
        assert!(!texts(&commands).contains(&"Acme Realty".to_string()));
        assert!(!texts(&commands).contains(&"JQ".to_string()));
    }

    #[test]
    fn missing_photo_key_in_storage_uses_initials() {
        let storage = MemoryStorage::new();
        let mut req = request("18x24", "yard_modern_round");
        req.headshot_key = Some("agents/gone.png".to_string());
        let data = SignData::from_request(&req, false).unwrap();
        let commands = render(&data, Some(&storage), Theme::Dark, None);
        assert_eq!(texts(&commands)[0], "JQ");
    }

    #[test]
    fn cta_row_sits_above_a_divider() {
        let data = SignData::from_request(&request("18x24", "yard_open_house"), false).unwrap();
        let commands = render(&data, None, Theme::Light, Some("SCAN FOR DETAILS"));
        let texts = texts(&commands);
        assert_eq!(texts[0], "SCAN FOR DETAILS");
        assert!(commands.iter().any(|c| matches!(c, Command::Stroke)));
    }

    #[test]
    fn square_png_crops_center() {
        let out = square_png(&png(40, 60)).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.dimensions(), (40, 40));
        assert!(square_png(b"nope").is_err());
    }
}
