use crate::canvas::{Command, Document, Page};
use crate::error::SignError;
use crate::font::FontRegistry;
use crate::types::{Color, Pt};
use image::RgbaImage;
use rustybuzz::{Face as HbFace, UnicodeBuffer};
use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tiny_skia::{
    FillRule, FilterQuality, Mask, Paint, Path, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke,
    Transform,
};
use ttf_parser::{GlyphId, OutlineBuilder};

pub const PREVIEW_DPI: u32 = 150;
pub const PREVIEW_MAX_DIMENSION: u32 = 1800;

static SYSTEM_FONT_CACHE: OnceLock<Mutex<HashMap<String, Option<Arc<Vec<u8>>>>>> =
    OnceLock::new();

#[derive(Clone)]
struct RasterState {
    transform: Transform,
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_name: String,
    font_size: Pt,
    clip_mask: Option<Mask>,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font_name: "Helvetica".to_string(),
            font_size: Pt::from_f32(12.0),
            clip_mask: None,
        }
    }
}

/// Web preview of a finished sign: trim area only.
#[derive(Debug, Clone)]
pub struct Preview {
    pub webp: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub fn document_to_png_pages(
    document: &Document,
    dpi: u32,
    registry: Option<&FontRegistry>,
) -> Result<Vec<Vec<u8>>, SignError> {
    let mut image_cache = HashMap::new();
    document
        .pages
        .iter()
        .map(|page| {
            let pixmap = render_page_pixmap(document, page, dpi, registry, &mut image_cache)?;
            pixmap
                .encode_png()
                .map_err(|e| SignError::Render(format!("png encode failed: {e}")))
        })
        .collect()
}

/// Rasterizes the first page at [`PREVIEW_DPI`], crops `bleed` from every
/// edge, scales the longest side down to `max_dimension` and encodes lossless
/// WebP.
pub fn render_preview(
    document: &Document,
    bleed: Pt,
    max_dimension: u32,
    registry: Option<&FontRegistry>,
) -> Result<Preview, SignError> {
    let page = document
        .pages
        .first()
        .ok_or_else(|| SignError::Render("document has no pages".to_string()))?;
    let mut image_cache = HashMap::new();
    let pixmap = render_page_pixmap(document, page, PREVIEW_DPI, registry, &mut image_cache)?;

    let full = pixmap_to_rgba(&pixmap)?;
    let crop = pt_milli_to_px_i64(bleed.max(Pt::ZERO).to_milli_i64(), PREVIEW_DPI)?;
    let crop = u32::try_from(crop).unwrap_or(0);
    let (full_w, full_h) = full.dimensions();
    if crop * 2 >= full_w || crop * 2 >= full_h {
        return Err(SignError::Render(format!(
            "bleed crop of {crop}px leaves nothing of a {full_w}x{full_h} page"
        )));
    }
    let mut trimmed =
        image::imageops::crop_imm(&full, crop, crop, full_w - crop * 2, full_h - crop * 2).to_image();

    let max_dimension = max_dimension.max(1);
    let (w, h) = trimmed.dimensions();
    let longest = w.max(h);
    if longest > max_dimension {
        let ratio = max_dimension as f64 / longest as f64;
        let new_w = ((w as f64 * ratio).round() as u32).max(1);
        let new_h = ((h as f64 * ratio).round() as u32).max(1);
        trimmed = image::imageops::resize(
            &trimmed,
            new_w,
            new_h,
            image::imageops::FilterType::Lanczos3,
        );
    }

    let (width, height) = trimmed.dimensions();
    let mut webp = Vec::new();
    image::codecs::webp::WebPEncoder::new_lossless(&mut webp)
        .encode(trimmed.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .map_err(|e| SignError::Render(format!("webp encode failed: {e}")))?;
    Ok(Preview {
        webp,
        width,
        height,
    })
}

fn render_page_pixmap(
    document: &Document,
    page: &Page,
    dpi: u32,
    registry: Option<&FontRegistry>,
    image_cache: &mut HashMap<String, Option<Pixmap>>,
) -> Result<Pixmap, SignError> {
    let dpi = if dpi == 0 { PREVIEW_DPI } else { dpi };
    let width_px = pt_milli_to_px_u32(document.page_size.width.to_milli_i64(), dpi)?;
    let height_px = pt_milli_to_px_u32(document.page_size.height.to_milli_i64(), dpi)?;
    let scale = dpi as f32 / 72.0;
    // Canvas space is already top-left, so no flip is needed.
    let base_transform = Transform::from_scale(scale, scale);

    let mut pixmap = Pixmap::new(width_px, height_px).ok_or_else(|| {
        SignError::InvalidConfiguration(format!(
            "invalid raster size {}x{} at {} DPI",
            width_px, height_px, dpi
        ))
    })?;
    pixmap.fill(tiny_skia::Color::WHITE);

    let mut state = RasterState::default();
    let mut stack: Vec<RasterState> = Vec::new();
    let mut path_builder = PathBuilder::new();
    let mut has_path = false;

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => stack.push(state.clone()),
            Command::RestoreState => {
                if let Some(restored) = stack.pop() {
                    state = restored;
                }
            }
            Command::Translate(x, y) => {
                state.transform = state
                    .transform
                    .pre_concat(Transform::from_translate(x.to_f32(), y.to_f32()));
            }
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => state.fill_color = *color,
            Command::SetStrokeColor(color) => state.stroke_color = *color,
            Command::SetLineWidth(width) => state.line_width = width.max(Pt::ZERO),
            Command::SetFontName(name) => state.font_name = name.clone(),
            Command::SetFontSize(size) => state.font_size = *size,
            Command::ClipPath => {
                if let Some(path) = take_path(&mut path_builder, &mut has_path) {
                    let clip_transform = base_transform.pre_concat(state.transform);
                    apply_clip_path(
                        &mut state,
                        &path,
                        clip_transform,
                        pixmap.width(),
                        pixmap.height(),
                    );
                }
            }
            Command::MoveTo { x, y } => {
                path_builder.move_to(x.to_f32(), y.to_f32());
                has_path = true;
            }
            Command::LineTo { x, y } => {
                path_builder.line_to(x.to_f32(), y.to_f32());
                has_path = true;
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                path_builder.cubic_to(
                    x1.to_f32(),
                    y1.to_f32(),
                    x2.to_f32(),
                    y2.to_f32(),
                    x.to_f32(),
                    y.to_f32(),
                );
                has_path = true;
            }
            Command::ClosePath => path_builder.close(),
            Command::Fill => {
                if let Some(path) = take_path(&mut path_builder, &mut has_path) {
                    fill_path(&mut pixmap, &state, &path, base_transform);
                }
            }
            Command::Stroke => {
                if let Some(path) = take_path(&mut path_builder, &mut has_path) {
                    stroke_path(&mut pixmap, &state, &path, base_transform);
                }
            }
            Command::FillStroke => {
                if let Some(path) = take_path(&mut path_builder, &mut has_path) {
                    fill_path(&mut pixmap, &state, &path, base_transform);
                    stroke_path(&mut pixmap, &state, &path, base_transform);
                }
            }
            Command::DrawString { x, y, text } => {
                draw_string(
                    &mut pixmap,
                    &state,
                    x.to_f32(),
                    y.to_f32(),
                    text,
                    base_transform,
                    registry,
                );
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                if let Some(rect) =
                    Rect::from_xywh(x.to_f32(), y.to_f32(), width.to_f32(), height.to_f32())
                {
                    let path = PathBuilder::from_rect(rect);
                    fill_path(&mut pixmap, &state, &path, base_transform);
                }
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                let source = image_cache.entry(resource_id.clone()).or_insert_with(|| {
                    document
                        .image(resource_id)
                        .and_then(decode_image_to_pixmap)
                });
                let Some(image) = source.as_ref() else {
                    continue;
                };
                let sx = width.to_f32() / image.width() as f32;
                let sy = height.to_f32() / image.height() as f32;
                let image_ts = Transform::from_row(sx, 0.0, 0.0, sy, x.to_f32(), y.to_f32());
                let device_ts = base_transform.pre_concat(state.transform.pre_concat(image_ts));
                let paint = PixmapPaint {
                    quality: FilterQuality::Bilinear,
                    ..PixmapPaint::default()
                };
                pixmap.draw_pixmap(
                    0,
                    0,
                    image.as_ref(),
                    &paint,
                    device_ts,
                    state.clip_mask.as_ref(),
                );
            }
        }
    }
    Ok(pixmap)
}

fn fill_path(pixmap: &mut Pixmap, state: &RasterState, path: &Path, base_transform: Transform) {
    pixmap.fill_path(
        path,
        &fill_paint(state.fill_color),
        FillRule::Winding,
        base_transform.pre_concat(state.transform),
        state.clip_mask.as_ref(),
    );
}

fn stroke_path(pixmap: &mut Pixmap, state: &RasterState, path: &Path, base_transform: Transform) {
    let stroke = Stroke {
        width: state.line_width.to_f32().max(0.0),
        ..Stroke::default()
    };
    pixmap.stroke_path(
        path,
        &fill_paint(state.stroke_color),
        &stroke,
        base_transform.pre_concat(state.transform),
        state.clip_mask.as_ref(),
    );
}

fn apply_clip_path(
    state: &mut RasterState,
    path: &Path,
    transform: Transform,
    width: u32,
    height: u32,
) {
    if let Some(mask) = state.clip_mask.as_mut() {
        mask.intersect_path(path, FillRule::Winding, true, transform);
        return;
    }
    let Some(mut mask) = Mask::new(width, height) else {
        return;
    };
    mask.fill_path(path, FillRule::Winding, true, transform);
    state.clip_mask = Some(mask);
}

fn draw_string(
    pixmap: &mut Pixmap,
    state: &RasterState,
    x: f32,
    baseline_y: f32,
    text: &str,
    base_transform: Transform,
    registry: Option<&FontRegistry>,
) {
    let font_size = state.font_size.to_f32().max(0.0);
    if font_size <= 0.0 {
        return;
    }
    let registered = registry
        .and_then(|registry| registry.resolve(&state.font_name))
        .map(|font| font.data.as_slice());
    let system;
    let font_data = match registered {
        Some(data) => data,
        None => {
            let Some(bytes) = resolve_system_font_bytes(&state.font_name) else {
                return;
            };
            system = bytes;
            system.as_slice()
        }
    };
    let Ok(face) = ttf_parser::Face::parse(font_data, 0) else {
        return;
    };
    let Some(hb_face) = HbFace::from_slice(font_data, 0) else {
        return;
    };

    let units = hb_face.units_per_em().max(1) as f32;
    let scale = font_size / units;
    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    let output = rustybuzz::shape(&hb_face, &[], buffer);

    let paint = fill_paint(state.fill_color);
    let device_transform = base_transform.pre_concat(state.transform);
    let mut pen_x = x;
    for (info, pos) in output.glyph_infos().iter().zip(output.glyph_positions()) {
        let gid = info.glyph_id as u16;
        if gid != 0 {
            let origin_x = pen_x + pos.x_offset as f32 * scale;
            let origin_y = baseline_y - pos.y_offset as f32 * scale;
            let mut builder = GlyphPathBuilder::new(origin_x, origin_y, scale);
            if face.outline_glyph(GlyphId(gid), &mut builder).is_some() {
                if let Some(path) = builder.finish() {
                    pixmap.fill_path(
                        &path,
                        &paint,
                        FillRule::Winding,
                        device_transform,
                        state.clip_mask.as_ref(),
                    );
                }
            }
        }
        pen_x += pos.x_advance as f32 * scale;
    }
}

/// Base-14 names have no program to draw with; borrow a metric-compatible
/// system face when one is installed.
fn resolve_system_font_bytes(font_name: &str) -> Option<Arc<Vec<u8>>> {
    let key = font_name.trim().to_ascii_lowercase();
    let cache = SYSTEM_FONT_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    if let Ok(guard) = cache.lock() {
        if let Some(entry) = guard.get(&key) {
            return entry.clone();
        }
    }
    let candidates = system_font_file_candidates(&key);
    let loaded = system_font_dirs().iter().find_map(|dir| {
        candidates
            .iter()
            .find_map(|file_name| find_font_file(dir, file_name, 3))
    });
    if let Ok(mut guard) = cache.lock() {
        guard.insert(key, loaded.clone());
    }
    loaded
}

fn find_font_file(dir: &FsPath, file_name: &str, depth: usize) -> Option<Arc<Vec<u8>>> {
    let direct = dir.join(file_name);
    if let Ok(bytes) = std::fs::read(&direct) {
        if ttf_parser::Face::parse(&bytes, 0).is_ok() {
            return Some(Arc::new(bytes));
        }
    }
    if depth == 0 {
        return None;
    }
    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();
    subdirs
        .iter()
        .find_map(|sub| find_font_file(sub, file_name, depth - 1))
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
    }

    if let Ok(extra) = std::env::var("YARDSIGN_FONT_DIR") {
        for path in std::env::split_paths(&extra) {
            if !path.as_os_str().is_empty() {
                dirs.push(path);
            }
        }
    }
    dirs
}

fn system_font_file_candidates(font_name: &str) -> &'static [&'static str] {
    match font_name {
        "helvetica-bold" => &[
            "LiberationSans-Bold.ttf",
            "arialbd.ttf",
            "Arial Bold.ttf",
            "DejaVuSans-Bold.ttf",
            "NotoSans-Bold.ttf",
        ],
        "times-roman" => &[
            "LiberationSerif-Regular.ttf",
            "times.ttf",
            "Times New Roman.ttf",
            "DejaVuSerif.ttf",
            "NotoSerif-Regular.ttf",
        ],
        "times-italic" => &[
            "LiberationSerif-Italic.ttf",
            "timesi.ttf",
            "Times New Roman Italic.ttf",
            "DejaVuSerif-Italic.ttf",
            "NotoSerif-Italic.ttf",
        ],
        _ => &[
            "LiberationSans-Regular.ttf",
            "arial.ttf",
            "Arial.ttf",
            "DejaVuSans.ttf",
            "NotoSans-Regular.ttf",
        ],
    }
}

/// Glyph outlines are y-up in font units; canvas space is y-down.
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn take_path(path_builder: &mut PathBuilder, has_path: &mut bool) -> Option<Path> {
    if !*has_path {
        return None;
    }
    *has_path = false;
    let builder = std::mem::replace(path_builder, PathBuilder::new());
    builder.finish()
}

fn fill_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_sk_color(color));
    paint.anti_alias = true;
    paint
}

fn to_sk_color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba(
        color.r.clamp(0.0, 1.0),
        color.g.clamp(0.0, 1.0),
        color.b.clamp(0.0, 1.0),
        1.0,
    )
    .unwrap_or(tiny_skia::Color::BLACK)
}

fn pixmap_to_rgba(pixmap: &Pixmap) -> Result<RgbaImage, SignError> {
    let data = pixmap
        .pixels()
        .iter()
        .flat_map(|px| {
            let c = px.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect::<Vec<u8>>();
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
        .ok_or_else(|| SignError::Render("pixmap size mismatch".to_string()))
}

fn pt_milli_to_px_u32(pt_milli: i64, dpi: u32) -> Result<u32, SignError> {
    let px = pt_milli_to_px_i64(pt_milli, dpi)?;
    if px <= 0 {
        return Err(SignError::InvalidConfiguration(format!(
            "invalid non-positive pixel dimension {px} for pt_milli={pt_milli} dpi={dpi}"
        )));
    }
    u32::try_from(px).map_err(|_| {
        SignError::InvalidConfiguration(format!(
            "pixel dimension out of range: {px} for pt_milli={pt_milli} dpi={dpi}"
        ))
    })
}

fn pt_milli_to_px_i64(pt_milli: i64, dpi: u32) -> Result<i64, SignError> {
    if dpi == 0 {
        return Err(SignError::InvalidConfiguration(
            "dpi must be > 0".to_string(),
        ));
    }
    let num = (pt_milli as i128).saturating_mul(dpi as i128);
    let den = 72_000_i128;
    let px = if num >= 0 {
        (num + (den / 2)) / den
    } else {
        -(((-num) + (den / 2)) / den)
    };
    i64::try_from(px).map_err(|_| {
        SignError::InvalidConfiguration(format!(
            "pixel conversion overflow: pt_milli={pt_milli} dpi={dpi}"
        ))
    })
}

fn decode_image_to_pixmap(data: &[u8]) -> Option<Pixmap> {
    let rgba = image::load_from_memory(data).ok()?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height)?;
    for (src_px, dst_px) in rgba
        .as_raw()
        .chunks_exact(4)
        .zip(pixmap.data_mut().chunks_exact_mut(4))
    {
        let a = src_px[3];
        dst_px[0] = premul_u8(src_px[0], a);
        dst_px[1] = premul_u8(src_px[1], a);
        dst_px[2] = premul_u8(src_px[2], a);
        dst_px[3] = a;
    }
    Some(pixmap)
}

fn premul_u8(channel: u8, alpha: u8) -> u8 {
    let prod = (channel as u16) * (alpha as u16) + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}
