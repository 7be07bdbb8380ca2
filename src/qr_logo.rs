//! Raster QR with a centered brand logo.
//!
//! A logo is only kept if the composited image decodes back to the exact
//! payload. Candidates shrink until one verifies; when none does, or no
//! decoder is compiled in, the plain QR is returned.

use crate::debug::{DebugLogger, log_event};
use crate::error::SignError;
use crate::qr_vector::{EccLevel, QrMatrix};
use image::{RgbaImage, imageops};
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Rect as SkRect, Transform};

pub const QR_RASTER_PX: u32 = 1024;
pub const LOGO_RATIOS: [f32; 4] = [0.14, 0.12, 0.10, 0.08];
pub const BACKING_SCALE: f32 = 1.15;
pub const BORDER_MODULES: usize = 4;

// Decoding a huge logo is wasted work; anything larger is rejected up front.
const MAX_LOGO_BYTES: usize = 8 * 1024 * 1024;
const MAX_LOGO_PIXELS: u64 = 16 * 1024 * 1024;
const MAX_LOGO_ASPECT: u32 = 20;

#[derive(Debug, Clone)]
pub struct LogoQr {
    pub image: RgbaImage,
    /// Ratio of the accepted logo to the image width, `None` for a plain QR.
    pub logo_ratio: Option<f32>,
    pub ecc: EccLevel,
}

impl LogoQr {
    pub fn to_png(&self) -> Result<Vec<u8>, SignError> {
        let mut out = std::io::Cursor::new(Vec::new());
        self.image
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| SignError::Render(format!("QR png encode failed: {e}")))?;
        Ok(out.into_inner())
    }
}

pub fn render_qr_with_logo(
    payload: &str,
    logo: Option<&[u8]>,
    size_px: u32,
    logger: Option<&DebugLogger>,
) -> Result<LogoQr, SignError> {
    if payload.is_empty() {
        return Err(SignError::MissingRequiredField("qr_payload"));
    }
    let size_px = size_px.max(QR_RASTER_PX);
    let Some(logo) = logo else {
        let base = render_base(payload, EccLevel::M, size_px)?;
        return Ok(plain(base, EccLevel::M));
    };

    // Occlusion needs the highest correction level whether or not the logo survives.
    let base = render_base(payload, EccLevel::H, size_px)?;
    if !decoder_available() {
        log_event(
            logger,
            "qr.logo.fallback",
            &[("reason", "decoder unavailable".to_string())],
        );
        return Ok(plain(base, EccLevel::H));
    }

    let logo_image = match decode_logo(logo) {
        Ok(image) => image,
        Err(reason) => {
            log_event(logger, "qr.logo.fallback", &[("reason", reason)]);
            return Ok(plain(base, EccLevel::H));
        }
    };

    Ok(first_verified_overlay(
        base,
        &logo_image,
        &LOGO_RATIOS,
        |image| decode_qr(image).as_deref() == Some(payload),
        logger,
    ))
}

/// Tries `ratios` in order and keeps the first composite `verifies` accepts.
fn first_verified_overlay(
    base: Pixmap,
    logo: &RgbaImage,
    ratios: &[f32],
    verifies: impl Fn(&RgbaImage) -> bool,
    logger: Option<&DebugLogger>,
) -> LogoQr {
    for &ratio in ratios {
        let Some(candidate) = composite(&base, logo, ratio) else {
            continue;
        };
        let image = pixmap_to_rgba(&candidate);
        if verifies(&image) {
            log_event(
                logger,
                "qr.logo.accepted",
                &[("ratio", format!("{:.2}", ratio))],
            );
            return LogoQr {
                image,
                logo_ratio: Some(ratio),
                ecc: EccLevel::H,
            };
        }
        log_event(
            logger,
            "qr.logo.rejected",
            &[("ratio", format!("{:.2}", ratio))],
        );
    }

    log_event(
        logger,
        "qr.logo.fallback",
        &[("reason", "no logo size verified".to_string())],
    );
    plain(base, EccLevel::H)
}

fn plain(base: Pixmap, ecc: EccLevel) -> LogoQr {
    LogoQr {
        image: pixmap_to_rgba(&base),
        logo_ratio: None,
        ecc,
    }
}

/// Black-on-white symbol with a four-module border, stretched to `size_px`.
fn render_base(payload: &str, ecc: EccLevel, size_px: u32) -> Result<Pixmap, SignError> {
    let matrix = QrMatrix::encode(payload, ecc)?;
    let total = (matrix.width() + BORDER_MODULES * 2) as f32;
    let module_px = size_px as f32 / total;
    let mut pixmap = Pixmap::new(size_px, size_px)
        .ok_or_else(|| SignError::Render(format!("invalid QR raster size {size_px}")))?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let mut paint = Paint::default();
    paint.set_color(tiny_skia::Color::BLACK);
    paint.anti_alias = false;
    let mut builder = PathBuilder::new();
    for y in 0..matrix.width() {
        for x in 0..matrix.width() {
            if !matrix.is_dark(x, y) {
                continue;
            }
            let left = ((x + BORDER_MODULES) as f32 * module_px).round();
            let top = ((y + BORDER_MODULES) as f32 * module_px).round();
            let right = ((x + BORDER_MODULES + 1) as f32 * module_px).round();
            let bottom = ((y + BORDER_MODULES + 1) as f32 * module_px).round();
            if let Some(rect) = SkRect::from_ltrb(left, top, right, bottom) {
                builder.push_rect(rect);
            }
        }
    }
    if let Some(path) = builder.finish() {
        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }
    Ok(pixmap)
}

fn decode_logo(bytes: &[u8]) -> Result<RgbaImage, String> {
    if bytes.is_empty() {
        return Err("empty logo".to_string());
    }
    if bytes.len() > MAX_LOGO_BYTES {
        return Err(format!("logo too large: {} bytes", bytes.len()));
    }
    let (w, h) = image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| format!("logo decode failed: {e}"))?
        .into_dimensions()
        .map_err(|e| format!("logo decode failed: {e}"))?;
    if w == 0 || h == 0 {
        return Err("logo has no pixels".to_string());
    }
    if (w as u64) * (h as u64) > MAX_LOGO_PIXELS {
        return Err(format!("logo too large: {w}x{h}"));
    }
    if w.max(h) / w.min(h) > MAX_LOGO_ASPECT {
        return Err(format!("logo aspect out of range: {w}x{h}"));
    }
    let decoded =
        image::load_from_memory(bytes).map_err(|e| format!("logo decode failed: {e}"))?;
    let rgba = decoded.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err("logo has no pixels".to_string());
    }
    Ok(rgba)
}

fn composite(base: &Pixmap, logo: &RgbaImage, ratio: f32) -> Option<Pixmap> {
    let width = base.width() as f32;
    // The logo fits a square box of `ratio * width` on its longer side.
    let box_px = (width * ratio).floor().max(1.0);
    let scale = box_px / logo.width().max(logo.height()) as f32;
    let logo_w = (logo.width() as f32 * scale).floor().max(1.0);
    let logo_h = (logo.height() as f32 * scale).floor().max(1.0);
    let resized = imageops::resize(
        logo,
        logo_w as u32,
        logo_h as u32,
        imageops::FilterType::Lanczos3,
    );

    let mut canvas = base.clone();
    let back_w = (logo_w * BACKING_SCALE).floor();
    let back_h = (logo_h * BACKING_SCALE).floor();
    let center = width / 2.0;
    let backing = SkRect::from_xywh(center - back_w / 2.0, center - back_h / 2.0, back_w, back_h)?;
    let mut paint = Paint::default();
    paint.set_color(tiny_skia::Color::WHITE);
    paint.anti_alias = true;
    let path = rounded_rect(backing, back_w / 10.0)?;
    canvas.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);

    let logo_pixmap = rgba_to_pixmap(&resized)?;
    canvas.draw_pixmap(
        (center - logo_w / 2.0).floor() as i32,
        (center - logo_h / 2.0).floor() as i32,
        logo_pixmap.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
    Some(canvas)
}

fn rounded_rect(rect: SkRect, radius: f32) -> Option<tiny_skia::Path> {
    let r = radius.min(rect.width() / 2.0).min(rect.height() / 2.0).max(0.0);
    let (x0, y0, x1, y1) = (rect.left(), rect.top(), rect.right(), rect.bottom());
    let mut pb = PathBuilder::new();
    pb.move_to(x0 + r, y0);
    pb.line_to(x1 - r, y0);
    pb.quad_to(x1, y0, x1, y0 + r);
    pb.line_to(x1, y1 - r);
    pb.quad_to(x1, y1, x1 - r, y1);
    pb.line_to(x0 + r, y1);
    pb.quad_to(x0, y1, x0, y1 - r);
    pb.line_to(x0, y0 + r);
    pb.quad_to(x0, y0, x0 + r, y0);
    pb.close();
    pb.finish()
}

fn rgba_to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width(), image.height())?;
    for (src, dst) in image
        .as_raw()
        .chunks_exact(4)
        .zip(pixmap.data_mut().chunks_exact_mut(4))
    {
        let a = src[3];
        dst[0] = premul_u8(src[0], a);
        dst[1] = premul_u8(src[1], a);
        dst[2] = premul_u8(src[2], a);
        dst[3] = a;
    }
    Some(pixmap)
}

// Every pixel of a composited QR is opaque, so premultiplied equals straight.
fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        dst.0 = [c.red(), c.green(), c.blue(), c.alpha()];
    }
    image
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

pub fn decoder_available() -> bool {
    cfg!(feature = "qr_verify")
}

/// Decodes the first QR symbol found in `image`.
#[cfg(feature = "qr_verify")]
pub fn decode_qr(image: &RgbaImage) -> Option<String> {
    let gray = imageops::grayscale(image);
    let (w, h) = gray.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w as usize, h as usize, |x, y| {
        gray.get_pixel(x as u32, y as u32).0[0]
    });
    prepared
        .detect_grids()
        .into_iter()
        .find_map(|grid| grid.decode().ok().map(|(_, content)| content))
}

#[cfg(not(feature = "qr_verify"))]
pub fn decode_qr(_image: &RgbaImage) -> Option<String> {
    None
}
