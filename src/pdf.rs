use crate::canvas::{Command, Document, Page};
use crate::error::SignError;
use crate::font::{FontProgramKind, FontRegistry, RegisteredFont, winansi_code};
use crate::types::{Color, Pt, Size};
use fixed::types::I32F32;
use image::GenericImageView;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

const STEM_V: i32 = 80;
const DEFAULT_FONT: &str = "Helvetica";

#[derive(Debug, Clone)]
pub struct PdfOptions {
    pub title: Option<String>,
    /// Flate-compress page content streams. Turned off only to inspect output.
    pub compress_content: bool,
    /// Distance from the media edge to the trim edge on every side.
    pub bleed: Pt,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            title: None,
            compress_content: true,
            bleed: Pt::ZERO,
        }
    }
}

struct ImageData {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

/// Serializes a recorded document. Every page shares one resource dictionary;
/// output depends only on the document, the registry and `options`.
pub fn document_to_pdf(
    document: &Document,
    registry: &FontRegistry,
    options: &PdfOptions,
) -> Result<Vec<u8>, SignError> {
    if document.pages.is_empty() {
        return Err(SignError::Render("document has no pages".to_string()));
    }

    let mut font_names: BTreeSet<String> = BTreeSet::new();
    let mut has_text = false;
    for cmd in document.pages.iter().flat_map(|page| page.commands.iter()) {
        match cmd {
            Command::SetFontName(name) => {
                font_names.insert(name.clone());
            }
            Command::DrawString { .. } => has_text = true,
            _ => {}
        }
    }
    // Canvas default font, also the stand-in for unknown names.
    if has_text {
        font_names.insert(DEFAULT_FONT.to_string());
    }

    let mut objects: Vec<String> = vec![String::new(), String::new(), String::new()];
    let catalog_id = 1;
    let pages_id = 2;
    let resources_id = 3;

    let mut font_map: BTreeMap<String, String> = BTreeMap::new();
    let mut font_entries = Vec::new();
    let mut unknown = Vec::new();
    for name in &font_names {
        let font_id = objects.len() + 1;
        if let Some(font) = registry.resolve(name) {
            objects.push(truetype_font_object(font, font_id + 1));
            objects.push(font_descriptor_object(font, font_id + 2));
            objects.push(font_file_object(&font.data, font.program_kind));
        } else if is_base14_font(name) {
            objects.push(font_object(name));
        } else {
            unknown.push(name.clone());
            continue;
        }
        let resource = format!("F{}", font_entries.len() + 1);
        font_entries.push((resource.clone(), font_id));
        font_map.insert(name.clone(), resource);
    }
    if let Some(fallback) = font_map.get(DEFAULT_FONT).cloned() {
        for name in unknown {
            font_map.insert(name, fallback.clone());
        }
    }

    let mut image_map: BTreeMap<String, String> = BTreeMap::new();
    let mut image_entries = Vec::new();
    for (resource_id, bytes) in &document.images {
        let Some(image) = decode_image_bytes(bytes) else {
            continue;
        };
        let smask_id = match &image.alpha {
            Some(alpha) => {
                objects.push(image_smask_object(image.width, image.height, alpha));
                Some(objects.len())
            }
            None => None,
        };
        objects.push(image_object(&image, smask_id));
        let resource = format!("Im{}", image_entries.len() + 1);
        image_entries.push((resource.clone(), objects.len()));
        image_map.insert(resource_id.clone(), resource);
    }

    objects[resources_id - 1] = format!(
        "<< /Font {} /XObject {} >>",
        named_refs(&font_entries),
        named_refs(&image_entries)
    );

    let page_size = document.page_size;
    let boxes = page_box_entries(page_size, options.bleed);
    let mut page_ids = Vec::new();
    for page in &document.pages {
        let content = render_page(page, page_size.height, &font_map, &image_map);
        objects.push(stream_object(content.as_bytes(), options.compress_content));
        let content_id = objects.len();
        objects.push(format!(
            "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}]{} /Resources {} 0 R /Contents {} 0 R >>",
            pages_id,
            fmt_pt(page_size.width),
            fmt_pt(page_size.height),
            boxes,
            resources_id,
            content_id
        ));
        page_ids.push(objects.len());
    }

    let kids = page_ids
        .iter()
        .map(|id| format!("{} 0 R", id))
        .collect::<Vec<_>>()
        .join(" ");
    objects[pages_id - 1] = format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids,
        page_ids.len()
    );
    objects[catalog_id - 1] = format!("<< /Type /Catalog /Pages {} 0 R >>", pages_id);

    objects.push(info_object(options.title.as_deref()));
    let info_id = objects.len();

    Ok(build_pdf(&objects, catalog_id, info_id))
}

fn render_page(
    page: &Page,
    page_height: Pt,
    font_map: &BTreeMap<String, String>,
    image_map: &BTreeMap<String, String>,
) -> String {
    let mut out = String::new();
    let mut font = (DEFAULT_FONT.to_string(), Pt::from_f32(12.0));
    let mut font_stack = Vec::new();
    let flip = |y: Pt| fmt_pt(page_height - y);

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => {
                font_stack.push(font.clone());
                out.push_str("q\n");
            }
            Command::RestoreState => {
                if let Some(saved) = font_stack.pop() {
                    font = saved;
                }
                out.push_str("Q\n");
            }
            Command::Translate(x, y) => {
                out.push_str(&format!("1 0 0 1 {} {} cm\n", fmt_pt(*x), fmt_pt(-*y)));
            }
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => {
                out.push_str(&format!("{} rg\n", color_components(*color)));
            }
            Command::SetStrokeColor(color) => {
                out.push_str(&format!("{} RG\n", color_components(*color)));
            }
            Command::SetLineWidth(width) => out.push_str(&format!("{} w\n", fmt_pt(*width))),
            Command::SetFontName(name) => font.0 = name.clone(),
            Command::SetFontSize(size) => font.1 = *size,
            Command::ClipPath => out.push_str("W n\n"),
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), flip(*y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), flip(*y)));
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} {} {} c\n",
                    fmt_pt(*x1),
                    flip(*y1),
                    fmt_pt(*x2),
                    flip(*y2),
                    fmt_pt(*x),
                    flip(*y)
                ));
            }
            Command::ClosePath => out.push_str("h\n"),
            Command::Fill => out.push_str("f\n"),
            Command::Stroke => out.push_str("S\n"),
            Command::FillStroke => out.push_str("B\n"),
            Command::DrawString { x, y, text } => {
                let resource = font_map
                    .get(&font.0)
                    .or_else(|| font_map.get(DEFAULT_FONT))
                    .map(String::as_str)
                    .unwrap_or("F1");
                out.push_str(&format!(
                    "BT /{} {} Tf {} {} Td ({}) Tj ET\n",
                    resource,
                    fmt_pt(font.1),
                    fmt_pt(*x),
                    flip(*y),
                    encode_winansi_pdf_string(text)
                ));
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re f\n",
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                // Undecodable images were dropped from the resources; skip the draw.
                let Some(resource) = image_map.get(resource_id) else {
                    continue;
                };
                out.push_str(&format!(
                    "q {} 0 0 {} {} {} cm /{} Do Q\n",
                    fmt_pt(*width),
                    fmt_pt(*height),
                    fmt_pt(*x),
                    fmt_pt(page_height - *y - *height),
                    resource
                ));
            }
        }
    }
    out
}

fn color_components(color: Color) -> String {
    format!(
        "{} {} {}",
        fmt(clamp_unit(color.r)),
        fmt(clamp_unit(color.g)),
        fmt(clamp_unit(color.b))
    )
}

fn named_refs(entries: &[(String, usize)]) -> String {
    let refs = entries
        .iter()
        .map(|(resource, id)| format!("/{} {} 0 R", resource, id))
        .collect::<Vec<_>>()
        .join(" ");
    format!("<< {} >>", refs)
}

fn page_box_entries(page_size: Size, bleed: Pt) -> String {
    let bleed = bleed.max(Pt::ZERO);
    format!(
        " /BleedBox [0 0 {} {}] /TrimBox [{} {} {} {}]",
        fmt_pt(page_size.width),
        fmt_pt(page_size.height),
        fmt_pt(bleed),
        fmt_pt(bleed),
        fmt_pt(page_size.width - bleed),
        fmt_pt(page_size.height - bleed),
    )
}

fn info_object(title: Option<&str>) -> String {
    let mut entries = vec!["/Producer (yardsign)".to_string()];
    if let Some(title) = title {
        entries.insert(0, format!("/Title ({})", encode_winansi_pdf_string(title)));
    }
    format!("<< {} >>", entries.join(" "))
}

fn stream_object(content: &[u8], compress: bool) -> String {
    if compress {
        let data = encode_stream_data(&flate_compress(content));
        format!(
            "<< /Length {} /Filter [/ASCIIHexDecode /FlateDecode] >>\nstream\n{}\nendstream",
            data.len(),
            data
        )
    } else {
        let text = String::from_utf8_lossy(content);
        format!("<< /Length {} >>\nstream\n{}\nendstream", text.len(), text)
    }
}

fn build_pdf(objects: &[String], catalog_id: usize, info_id: usize) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n");
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (index, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        out.extend_from_slice(obj.as_bytes());
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF",
            objects.len() + 1,
            catalog_id,
            info_id,
            xref_start
        )
        .as_bytes(),
    );
    out
}

fn font_object(name: &str) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        sanitize_font_name(name)
    )
}

fn truetype_font_object(font: &RegisteredFont, descriptor_id: usize) -> String {
    let metrics = &font.metrics;
    let subtype = match font.program_kind {
        FontProgramKind::OpenTypeCff => "Type1",
        FontProgramKind::TrueType => "TrueType",
    };
    let widths = metrics
        .widths
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "<< /Type /Font /Subtype /{} /BaseFont /{} /FirstChar {} /LastChar {} /Widths [{}] /FontDescriptor {} 0 R /Encoding /WinAnsiEncoding >>",
        subtype,
        sanitize_font_name(&font.name),
        metrics.first_char,
        metrics.last_char,
        widths,
        descriptor_id
    )
}

fn font_descriptor_object(font: &RegisteredFont, font_file_id: usize) -> String {
    let metrics = &font.metrics;
    let mut flags = 32;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    if metrics.italic_angle != 0 {
        flags |= 64;
    }
    let font_file_entry = match font.program_kind {
        FontProgramKind::OpenTypeCff => "FontFile3",
        FontProgramKind::TrueType => "FontFile2",
    };
    format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags {} /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} /CapHeight {} /StemV {} /MissingWidth {} /{} {} 0 R >>",
        sanitize_font_name(&font.name),
        flags,
        metrics.bbox.0,
        metrics.bbox.1,
        metrics.bbox.2,
        metrics.bbox.3,
        metrics.italic_angle,
        metrics.ascent,
        metrics.descent,
        metrics.cap_height,
        STEM_V,
        metrics.missing_width,
        font_file_entry,
        font_file_id
    )
}

fn font_file_object(data: &[u8], kind: FontProgramKind) -> String {
    let stream_data = encode_stream_data(&flate_compress(data));
    let mut dict = format!(
        "<< /Length {} /Length1 {} /Filter [/ASCIIHexDecode /FlateDecode]",
        stream_data.len(),
        data.len()
    );
    if matches!(kind, FontProgramKind::OpenTypeCff) {
        dict.push_str(" /Subtype /OpenType");
    }
    format!("{} >>\nstream\n{}\nendstream", dict, stream_data)
}

fn decode_image_bytes(data: &[u8]) -> Option<ImageData> {
    let format = image::guess_format(data).ok();
    let decoded = image::load_from_memory(data).ok()?;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    if matches!(format, Some(image::ImageFormat::Jpeg)) {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "/DeviceGray",
            _ => "/DeviceRGB",
        };
        return Some(ImageData {
            width,
            height,
            color_space,
            filter: "/DCTDecode",
            data: data.to_vec(),
            alpha: None,
        });
    }

    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    let mut has_alpha = false;
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        has_alpha |= a != 255;
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }
    Some(ImageData {
        width,
        height,
        color_space: "/DeviceRGB",
        filter: "/FlateDecode",
        data: flate_compress(&rgb),
        alpha: has_alpha.then(|| flate_compress(&alpha)),
    })
}

fn image_object(image: &ImageData, smask_id: Option<usize>) -> String {
    let stream_data = encode_stream_data(&image.data);
    let filters = match image.filter {
        "/DCTDecode" => "[/ASCIIHexDecode /DCTDecode]",
        _ => "[/ASCIIHexDecode /FlateDecode]",
    };
    let smask = smask_id
        .map(|id| format!(" /SMask {} 0 R", id))
        .unwrap_or_default();
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace {} /BitsPerComponent 8 /Length {} /Filter {}{} >>\nstream\n{}\nendstream",
        image.width,
        image.height,
        image.color_space,
        stream_data.len(),
        filters,
        smask,
        stream_data
    )
}

fn image_smask_object(width: u32, height: u32, alpha: &[u8]) -> String {
    let stream_data = encode_stream_data(alpha);
    format!(
        "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceGray /BitsPerComponent 8 /Length {} /Filter [/ASCIIHexDecode /FlateDecode] >>\nstream\n{}\nendstream",
        width,
        height,
        stream_data.len(),
        stream_data
    )
}

fn flate_compress(data: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

fn encode_stream_data(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32 + 1);
    for (index, byte) in data.iter().enumerate() {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02X}", byte);
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out.push('>');
    out
}

fn is_base14_font(name: &str) -> bool {
    matches!(
        name.trim().to_ascii_lowercase().as_str(),
        "courier"
            | "courier-bold"
            | "courier-oblique"
            | "courier-boldoblique"
            | "helvetica"
            | "helvetica-bold"
            | "helvetica-oblique"
            | "helvetica-boldoblique"
            | "times-roman"
            | "times-bold"
            | "times-italic"
            | "times-bolditalic"
            | "symbol"
            | "zapfdingbats"
    )
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        "Helvetica".to_string()
    } else {
        out
    }
}

/// Literal-string body in WinAnsi bytes. Bytes outside printable ASCII are
/// octal-escaped; characters WinAnsi cannot express become `?`.
fn encode_winansi_pdf_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let byte = winansi_code(ch).unwrap_or(b'?');
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7E => out.push(byte as char),
            _ => out.push_str(&format!("\\{:03o}", byte)),
        }
    }
    out
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        return format!("{}{}", sign, int_part);
    }
    let mut s = format!("{}{}.{:03}", sign, int_part, frac_part);
    while s.ends_with('0') {
        s.pop();
    }
    s
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}
