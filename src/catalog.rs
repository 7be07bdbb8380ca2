use crate::types::Color;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizePreset {
    pub key: &'static str,
    pub width_in: f32,
    pub height_in: f32,
    pub dpi: u32,
}

impl SizePreset {
    pub fn is_landscape(&self) -> bool {
        self.width_in > self.height_in
    }

    pub fn matches(&self, width_in: f32, height_in: f32) -> bool {
        (self.width_in - width_in).abs() < 1e-3 && (self.height_in - height_in).abs() < 1e-3
    }
}

pub const SIGN_SIZES: [SizePreset; 5] = [
    SizePreset {
        key: "12x18",
        width_in: 12.0,
        height_in: 18.0,
        dpi: 300,
    },
    SizePreset {
        key: "18x24",
        width_in: 18.0,
        height_in: 24.0,
        dpi: 300,
    },
    SizePreset {
        key: "24x36",
        width_in: 24.0,
        height_in: 36.0,
        dpi: 300,
    },
    SizePreset {
        key: "36x24",
        width_in: 36.0,
        height_in: 24.0,
        dpi: 300,
    },
    SizePreset {
        key: "36x18",
        width_in: 36.0,
        height_in: 18.0,
        dpi: 300,
    },
];

/// Rider and riser strips. Only reachable when custom sizes are allowed.
pub const CUSTOM_SIZES: [SizePreset; 2] = [
    SizePreset {
        key: "6x24",
        width_in: 6.0,
        height_in: 24.0,
        dpi: 300,
    },
    SizePreset {
        key: "6x36",
        width_in: 6.0,
        height_in: 36.0,
        dpi: 300,
    },
];

pub const DEFAULT_SIGN_SIZE: &str = "18x24";

// Known customer typos, mapped before the catalog lookup.
const SIZE_TYPOS: [(&str, &str); 1] = [("24x26", "24x36")];

pub const DEFAULT_SIGN_COLOR: &str = "#0077ff";

/// Bumped whenever the printed layout changes; part of every asset name.
pub const LAYOUT_VERSION: u32 = 2;

pub const SIGN_COLORS: [(&str, &str); 11] = [
    ("blue", "#0077ff"),
    ("green", "#2EA043"),
    ("red", "#CF222E"),
    ("purple", "#8250DF"),
    ("orange", "#FB8500"),
    ("teal", "#0969DA"),
    ("navy", "#0f172a"),
    ("black", "#000000"),
    ("white", "#ffffff"),
    ("gray", "#64748b"),
    ("gold", "#C9A227"),
];

pub const DEFAULT_CTA: &str = "SCAN FOR DETAILS";

const CTA_TEXT: [(&str, &str); 4] = [
    ("scan_for_details", "SCAN FOR DETAILS"),
    ("scan_for_photos", "SCAN FOR PHOTOS & DETAILS"),
    ("scan_to_tour", "SCAN TO TOUR"),
    ("call_or_scan", "CALL OR SCAN"),
];

pub fn lookup_size(key: &str) -> Option<&'static SizePreset> {
    SIGN_SIZES.iter().find(|preset| preset.key == key)
}

pub fn lookup_custom_size(key: &str) -> Option<&'static SizePreset> {
    lookup_size(key).or_else(|| CUSTOM_SIZES.iter().find(|preset| preset.key == key))
}

pub fn preset_for_dimensions(width_in: f32, height_in: f32) -> Option<&'static SizePreset> {
    SIGN_SIZES
        .iter()
        .find(|preset| preset.matches(width_in, height_in))
}

pub fn default_size() -> &'static SizePreset {
    &SIGN_SIZES[1]
}

/// Canonicalizes a user-entered size. Unknown input resolves to the default
/// size and carries a warning for the caller to surface.
pub fn normalize_sign_size(raw: Option<&str>) -> (&'static SizePreset, Option<String>) {
    normalize_sign_size_with(raw, false)
}

/// Same as [`normalize_sign_size`], also accepting rider sizes when
/// `allow_custom` is set.
pub fn normalize_sign_size_with(
    raw: Option<&str>,
    allow_custom: bool,
) -> (&'static SizePreset, Option<String>) {
    let Some(raw) = raw else {
        return (default_size(), None);
    };
    let canonical = canonical_size_key(raw);
    if canonical.is_empty() {
        return (default_size(), None);
    }
    let canonical = SIZE_TYPOS
        .iter()
        .find(|(typo, _)| *typo == canonical)
        .map(|(_, fixed)| fixed.to_string())
        .unwrap_or(canonical);
    let found = if allow_custom {
        lookup_custom_size(&canonical)
    } else {
        lookup_size(&canonical)
    };
    match found {
        Some(preset) => (preset, None),
        None => (
            default_size(),
            Some(format!(
                "Unknown sign size '{}', using {}",
                raw.trim(),
                DEFAULT_SIGN_SIZE
            )),
        ),
    }
}

fn canonical_size_key(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut chars = lowered.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '×' | '*' | 'x' => out.push('x'),
            '"' | '\'' | ' ' | '\t' => {}
            'i' if chars.peek() == Some(&'n') => {
                chars.next();
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Palette name or hex string to a color; anything unparseable becomes the
/// default sign color.
pub fn normalize_color(raw: Option<&str>) -> Color {
    let fallback = Color::from_hex(DEFAULT_SIGN_COLOR).unwrap_or(Color::BLACK);
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return fallback;
    };
    let lowered = raw.to_ascii_lowercase();
    if let Some((_, hex)) = SIGN_COLORS.iter().find(|(name, _)| *name == lowered) {
        return Color::from_hex(hex).unwrap_or(fallback);
    }
    if !raw.starts_with('#') {
        return fallback;
    }
    Color::from_hex(raw).unwrap_or(fallback)
}

pub fn cta_text(key: Option<&str>) -> &'static str {
    let Some(key) = key.map(|v| v.trim().to_ascii_lowercase()) else {
        return DEFAULT_CTA;
    };
    CTA_TEXT
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, text)| *text)
        .unwrap_or(DEFAULT_CTA)
}

pub fn asset_basename(size_key: &str, version: u32) -> String {
    format!("sign_{}_v{}", size_key, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_keys_canonicalize() {
        assert_eq!(normalize_sign_size(Some(" 24 X 36 ")).0.key, "24x36");
        assert_eq!(normalize_sign_size(Some("18\"x24\"")).0.key, "18x24");
        assert_eq!(normalize_sign_size(Some("12in×18in")).0.key, "12x18");
        assert_eq!(normalize_sign_size(Some("36*18")).0.key, "36x18");
        assert_eq!(normalize_sign_size(None), (default_size(), None));
    }

    #[test]
    fn typo_is_corrected_without_warning() {
        let (preset, warning) = normalize_sign_size(Some("24x26"));
        assert_eq!(preset.key, "24x36");
        assert!(warning.is_none());
    }

    #[test]
    fn unknown_size_defaults_with_warning() {
        let (preset, warning) = normalize_sign_size(Some("99x99"));
        assert_eq!(preset.key, DEFAULT_SIGN_SIZE);
        assert!(warning.unwrap().contains("99x99"));
    }

    #[test]
    fn riser_sizes_need_custom_lookup() {
        assert!(lookup_size("6x24").is_none());
        assert_eq!(lookup_custom_size("6x24").map(|p| p.height_in), Some(24.0));
        assert_eq!(preset_for_dimensions(36.0, 24.0).map(|p| p.key), Some("36x24"));
        assert_eq!(normalize_sign_size_with(Some("6 x 36"), true).0.key, "6x36");
        let (preset, warning) = normalize_sign_size(Some("6x36"));
        assert_eq!(preset.key, DEFAULT_SIGN_SIZE);
        assert!(warning.is_some());
        assert!(SIGN_SIZES[3].is_landscape());
    }

    #[test]
    fn colors_accept_names_and_hex() {
        assert_eq!(normalize_color(Some("GOLD")).to_hex(), "#c9a227");
        assert_eq!(normalize_color(Some("#abc")).to_hex(), "#aabbcc");
        assert_eq!(normalize_color(Some("chartreuse")).to_hex(), "#0077ff");
        assert_eq!(normalize_color(Some("#12")).to_hex(), "#0077ff");
        assert_eq!(normalize_color(None).to_hex(), "#0077ff");
    }

    #[test]
    fn cta_and_basename() {
        assert_eq!(cta_text(Some("scan_to_tour")), "SCAN TO TOUR");
        assert_eq!(cta_text(Some("nope")), DEFAULT_CTA);
        assert_eq!(asset_basename("18x24", LAYOUT_VERSION), "sign_18x24_v2");
    }
}
