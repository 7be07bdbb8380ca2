use crate::debug::{DebugLogger, log_event};
use crate::error::SignError;
use crate::types::Pt;
use rustybuzz::{Direction as HbDirection, Face as HbFace, UnicodeBuffer};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use ttf_parser::GlyphId;

/// Logical typefaces the sign templates draw with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FontRole {
    Body,
    Medium,
    Bold,
    Serif,
    Script,
}

impl FontRole {
    pub const ALL: [FontRole; 5] = [
        FontRole::Body,
        FontRole::Medium,
        FontRole::Bold,
        FontRole::Serif,
        FontRole::Script,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FontRole::Body => "body",
            FontRole::Medium => "medium",
            FontRole::Bold => "bold",
            FontRole::Serif => "serif",
            FontRole::Script => "script",
        }
    }

    /// Family looked up in the registry when no explicit mapping was configured.
    pub fn default_family(self) -> &'static str {
        match self {
            FontRole::Body => "Inter-Regular",
            FontRole::Medium => "Inter-Medium",
            FontRole::Bold => "Inter-Bold",
            FontRole::Serif => "BodoniModa",
            FontRole::Script => "Allura",
        }
    }

    /// Built-in PDF font used when the family is not registered.
    pub fn base14_fallback(self) -> &'static str {
        match self {
            FontRole::Body | FontRole::Medium => "Helvetica",
            FontRole::Bold => "Helvetica-Bold",
            FontRole::Serif => "Times-Roman",
            FontRole::Script => "Times-Italic",
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct TextWidthKey {
    font_index: usize,
    size_milli: i64,
    text: String,
}

#[derive(Debug)]
struct TextWidthCache {
    map: HashMap<TextWidthKey, Pt>,
    order: VecDeque<TextWidthKey>,
    max_entries: usize,
}

impl TextWidthCache {
    fn new(max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &TextWidthKey) -> Option<Pt> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: TextWidthKey, value: Pt) {
        if self.map.contains_key(&key) {
            return;
        }
        self.map.insert(key.clone(), value);
        self.order.push_back(key);
        while self.map.len() > self.max_entries {
            let Some(old) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&old);
        }
    }
}

/// Loaded font programs plus the role table. Built once at engine start and
/// shared read-only across renders; registration of the same file twice is a
/// no-op.
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
    sources: HashSet<PathBuf>,
    roles: BTreeMap<FontRole, String>,
    fallback_reported: Mutex<BTreeSet<FontRole>>,
    logger: Option<DebugLogger>,
    text_width_cache: Mutex<TextWidthCache>,
}

impl std::fmt::Debug for FontRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontRegistry")
            .field("fonts", &self.fonts.len())
            .field("roles", &self.roles)
            .finish()
    }
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) metrics: FontMetrics,
    pub(crate) program_kind: FontProgramKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FontProgramKind {
    TrueType,
    OpenTypeCff,
}

#[derive(Debug)]
pub(crate) struct FontMetrics {
    pub(crate) first_char: u8,
    pub(crate) last_char: u8,
    pub(crate) widths: Vec<u16>,
    glyph_ids: Vec<u16>,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
    kerning: HashMap<(u16, u16), i16>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            sources: HashSet::new(),
            roles: BTreeMap::new(),
            fallback_reported: Mutex::new(BTreeSet::new()),
            logger: None,
            text_width_cache: Mutex::new(TextWidthCache::new(20_000)),
        }
    }

    pub(crate) fn set_logger(&mut self, logger: Option<DebugLogger>) {
        self.logger = logger;
    }

    /// Maps a role to a family name. The family does not need to be
    /// registered yet; resolution happens at draw time.
    pub fn set_role(&mut self, role: FontRole, family: impl Into<String>) {
        self.roles.insert(role, family.into());
    }

    pub fn register_dir(&mut self, path: impl AsRef<Path>) {
        let Ok(entries) = fs::read_dir(path.as_ref()) else {
            return;
        };
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        // Directory order is filesystem dependent; alias precedence must not be.
        files.sort();
        for file in files {
            self.register_file(file);
        }
    }

    /// Returns true when a new font was added.
    pub fn register_file(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let Some(ext) = path.extension().and_then(|v| v.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        if ext != "ttf" && ext != "otf" {
            return false;
        }
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if self.sources.contains(&canonical) {
            return false;
        }
        let Ok(data) = fs::read(path) else {
            return false;
        };
        if self.add_font(data, path).is_err() {
            return false;
        }
        self.sources.insert(canonical);
        true
    }

    pub fn register_bytes(
        &mut self,
        data: Vec<u8>,
        source_name: Option<&str>,
    ) -> Result<String, SignError> {
        let source = source_name.unwrap_or("EmbeddedFont");
        self.add_font(data, Path::new(source))
    }

    fn add_font(&mut self, data: Vec<u8>, source: &Path) -> Result<String, SignError> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|_| {
            SignError::InvalidArgument(format!("invalid font data for {}", source.display()))
        })?;
        let (name, aliases) = font_names(&face, source);
        let (metrics, program_kind) = FontMetrics::from_face(&face);
        drop(face);

        let index = self.fonts.len();
        self.fonts.push(RegisteredFont {
            name: name.clone(),
            data,
            metrics,
            program_kind,
        });
        for alias in std::iter::once(name.clone()).chain(aliases) {
            let key = normalize_name(&alias);
            if key.is_empty() || self.lookup.contains_key(&key) {
                continue;
            }
            self.lookup.insert(key, index);
        }
        Ok(name)
    }

    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<&RegisteredFont> {
        let key = normalize_name(name);
        self.lookup
            .get(&key)
            .and_then(|index| self.fonts.get(*index))
    }

    pub fn is_role_available(&self, role: FontRole) -> bool {
        self.resolve(self.role_family(role)).is_some()
    }

    fn role_family(&self, role: FontRole) -> &str {
        self.roles
            .get(&role)
            .map(|v| v.as_str())
            .unwrap_or_else(|| role.default_family())
    }

    /// Name to draw `role` with: the registered family, or its base-14
    /// fallback. The first fallback per role is logged; later ones are silent.
    pub fn font_for(&self, role: FontRole) -> String {
        let family = self.role_family(role);
        if let Some(font) = self.resolve(family) {
            return font.name.clone();
        }
        let fallback = role.base14_fallback();
        let first_time = self
            .fallback_reported
            .lock()
            .map(|mut seen| seen.insert(role))
            .unwrap_or(false);
        if first_time {
            log_event(
                self.logger.as_ref(),
                "font.fallback",
                &[
                    ("role", role.as_str().to_string()),
                    ("family", family.to_string()),
                    ("fallback", fallback.to_string()),
                ],
            );
        }
        fallback.to_string()
    }

    pub fn measure_text_width(&self, name: &str, font_size: Pt, text: &str) -> Pt {
        let key = normalize_name(name);
        let Some(index) = self.lookup.get(&key).copied() else {
            return base14_estimate(font_size, text);
        };
        let Some(font) = self.fonts.get(index) else {
            return base14_estimate(font_size, text);
        };
        let cache_key = TextWidthKey {
            font_index: index,
            size_milli: font_size.to_milli_i64(),
            text: text.to_string(),
        };
        if let Ok(cache) = self.text_width_cache.lock() {
            if let Some(value) = cache.get(&cache_key) {
                return value;
            }
        }
        let value = if font.metrics.is_within_winansi(text) {
            font.metrics.measure_text_width(font_size, text)
        } else {
            measure_text_width_full(font, font_size, text)
                .unwrap_or_else(|| font.metrics.measure_text_width(font_size, text))
        };
        if let Ok(mut cache) = self.text_width_cache.lock() {
            cache.insert(cache_key, value);
        }
        value
    }
}

// Built-in fonts are not measured from a program; 0.6 em per character
// over-estimates Helvetica and Times, so fitted text never overflows.
fn base14_estimate(font_size: Pt, text: &str) -> Pt {
    let char_width = (font_size * 0.6).max(Pt::from_f32(1.0));
    char_width * (text.chars().count() as i32)
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> (Self, FontProgramKind) {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let first_char = 32u8;
        let last_char = 255u8;
        let glyph_ids = (first_char..=last_char)
            .map(|code| glyph_for_winansi(face, code).map(|g| g.0).unwrap_or(0))
            .collect::<Vec<u16>>();
        let widths = glyph_ids
            .iter()
            .map(|gid| {
                let advance = face.glyph_hor_advance(GlyphId(*gid)).unwrap_or(0);
                let scaled = (advance as f32 * scale).round() as i32;
                scaled.clamp(0, u16::MAX as i32) as u16
            })
            .collect::<Vec<u16>>();
        let missing_width = widths.first().copied().unwrap_or(0);

        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let cap_height = face
            .capital_height()
            .map(|value| scale_i16(value, scale))
            .unwrap_or(ascent);
        let bbox = face.global_bounding_box();
        let bbox = (
            scale_i16(bbox.x_min, scale),
            scale_i16(bbox.y_min, scale),
            scale_i16(bbox.x_max, scale),
            scale_i16(bbox.y_max, scale),
        );
        let italic_angle = face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0);
        let program_kind = if face.tables().cff.is_some() {
            FontProgramKind::OpenTypeCff
        } else {
            FontProgramKind::TrueType
        };
        let kerning = build_kerning_pairs(face, &glyph_ids, scale);

        (
            Self {
                first_char,
                last_char,
                widths,
                glyph_ids,
                ascent,
                descent,
                cap_height,
                italic_angle,
                bbox,
                missing_width,
                is_fixed_pitch: face.is_monospaced(),
                kerning,
            },
            program_kind,
        )
    }

    fn index_for_char(&self, ch: char) -> Option<usize> {
        let code = winansi_code(ch)? as u32;
        let first = self.first_char as u32;
        let last = self.last_char as u32;
        if code < first || code > last {
            return None;
        }
        Some((code - first) as usize)
    }

    fn measure_text_width(&self, font_size: Pt, text: &str) -> Pt {
        let mut total_units: i32 = 0;
        let mut prev: Option<u16> = None;
        for ch in text.chars() {
            let index = self.index_for_char(ch);
            let gid = index
                .and_then(|idx| self.glyph_ids.get(idx).copied())
                .unwrap_or(0);
            let adv = index
                .and_then(|idx| self.widths.get(idx).copied())
                .unwrap_or(self.missing_width) as i32;
            total_units = total_units.saturating_add(adv);
            if let Some(prev_gid) = prev {
                if let Some(k) = self.kerning.get(&(prev_gid, gid)) {
                    total_units = total_units.saturating_add(*k as i32);
                }
            }
            prev = Some(gid);
        }
        if total_units <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(total_units, 1000)
    }

    fn is_within_winansi(&self, text: &str) -> bool {
        text.chars().all(|ch| self.index_for_char(ch).is_some())
    }
}

/// Maps a char to its WinAnsi (cp1252) byte, the encoding every simple font
/// in the output uses.
pub(crate) fn winansi_code(ch: char) -> Option<u8> {
    let byte = match ch {
        '\u{0020}'..='\u{007E}' => ch as u8,
        '\u{00A0}'..='\u{00FF}' => ch as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

fn winansi_char(code: u8) -> Option<char> {
    (0x20u32..=0x2FFF)
        .filter_map(char::from_u32)
        .find(|ch| winansi_code(*ch) == Some(code))
}

fn glyph_for_winansi(face: &ttf_parser::Face<'_>, code: u8) -> Option<GlyphId> {
    let ch = if code < 0x80 || code >= 0xA0 {
        Some(code as char)
    } else {
        winansi_char(code)
    }?;
    face.glyph_index(ch)
}

fn build_kerning_pairs(
    face: &ttf_parser::Face<'_>,
    glyph_ids: &[u16],
    scale: f32,
) -> HashMap<(u16, u16), i16> {
    let mut out = HashMap::new();
    let Some(kern) = face.tables().kern else {
        return out;
    };
    let subtables: Vec<_> = kern
        .subtables
        .into_iter()
        .filter(|s| s.horizontal && !s.has_cross_stream && !s.has_state_machine)
        .collect();
    if subtables.is_empty() {
        return out;
    }
    for &left in glyph_ids.iter().filter(|g| **g != 0) {
        for &right in glyph_ids.iter().filter(|g| **g != 0) {
            let total: i32 = subtables
                .iter()
                .filter_map(|sub| sub.glyphs_kerning(GlyphId(left), GlyphId(right)))
                .map(|v| v as i32)
                .sum();
            if total == 0 {
                continue;
            }
            let clamped = total.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            let scaled = scale_i16(clamped, scale);
            if scaled != 0 {
                out.insert((left, right), scaled);
            }
        }
    }
    out
}

fn measure_text_width_full(font: &RegisteredFont, font_size: Pt, text: &str) -> Option<Pt> {
    let face = HbFace::from_slice(&font.data, 0)?;
    let units_per_em = face.units_per_em().max(1) as i64;

    let mut buffer = UnicodeBuffer::new();
    buffer.set_direction(HbDirection::LeftToRight);
    buffer.push_str(text);
    let output = rustybuzz::shape(&face, &[], buffer);
    let positions = output.glyph_positions();
    if positions.is_empty() {
        return None;
    }
    let total_units: i32 = positions
        .iter()
        .map(|pos| (((pos.x_advance as i64) * 1000 + (units_per_em / 2)) / units_per_em) as i32)
        .fold(0i32, |acc, adv| acc.saturating_add(adv));
    if total_units <= 0 {
        return Some(Pt::ZERO);
    }
    Some(font_size.mul_ratio(total_units, 1000))
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn font_names(face: &ttf_parser::Face<'_>, path: &Path) -> (String, Vec<String>) {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        let slot = match entry.name_id {
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => &mut family,
            name_id::FULL_NAME => &mut full,
            name_id::POST_SCRIPT_NAME => &mut post,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(name);
        }
    }

    let stem = path
        .file_stem()
        .and_then(|v| v.to_str())
        .map(|v| v.to_string());
    let primary = post
        .clone()
        .or_else(|| full.clone())
        .or_else(|| family.clone())
        .or_else(|| stem.clone())
        .unwrap_or_else(|| "EmbeddedFont".to_string());

    // File stems come first so "Inter-Bold.ttf" wins over the shared "Inter" family.
    let aliases = [stem, full, post, family]
        .into_iter()
        .flatten()
        .filter(|candidate| *candidate != primary)
        .collect();
    (primary, aliases)
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_log_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("yardsign_{tag}_{}_{}.jsonl", std::process::id(), nanos))
    }

    #[test]
    fn missing_roles_fall_back_to_base14() {
        let registry = FontRegistry::new();
        assert_eq!(registry.font_for(FontRole::Body), "Helvetica");
        assert_eq!(registry.font_for(FontRole::Bold), "Helvetica-Bold");
        assert_eq!(registry.font_for(FontRole::Serif), "Times-Roman");
        assert_eq!(registry.font_for(FontRole::Script), "Times-Italic");
        assert!(!registry.is_role_available(FontRole::Medium));
    }

    #[test]
    fn fallback_is_logged_once_per_role() {
        let path = temp_log_path("font_fallback");
        let logger = DebugLogger::new(&path).unwrap();
        let mut registry = FontRegistry::new();
        registry.set_logger(Some(logger.clone()));
        for _ in 0..5 {
            registry.font_for(FontRole::Serif);
        }
        registry.font_for(FontRole::Bold);
        logger.flush();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("\"role\":\"serif\"").count(), 1);
        assert_eq!(text.matches("\"role\":\"bold\"").count(), 1);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn base14_width_scales_with_size_and_length() {
        let registry = FontRegistry::new();
        let w10 = registry.measure_text_width("Helvetica", Pt::from_i32(10), "abcd");
        let w20 = registry.measure_text_width("Helvetica", Pt::from_i32(20), "abcd");
        assert_eq!(w10, Pt::from_i32(24));
        assert_eq!(w20, Pt::from_i32(48));
    }

    #[test]
    fn registering_missing_or_non_font_files_is_ignored() {
        let mut registry = FontRegistry::new();
        assert!(!registry.register_file("/definitely/not/here/Inter-Bold.ttf"));
        assert!(!registry.register_file("notes.txt"));
        registry.register_dir("/definitely/not/here");
        assert_eq!(registry.font_count(), 0);
        assert!(registry.register_bytes(vec![0, 1, 2], Some("Broken.ttf")).is_err());
    }

    #[test]
    fn winansi_covers_latin1_and_cp1252_extras() {
        assert_eq!(winansi_code('A'), Some(b'A'));
        assert_eq!(winansi_code('é'), Some(0xE9));
        assert_eq!(winansi_code('\u{2022}'), Some(0x95));
        assert_eq!(winansi_code('\u{4E2D}'), None);
        assert_eq!(winansi_char(0x95), Some('\u{2022}'));
    }
}
