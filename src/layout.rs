use crate::catalog;
use crate::error::SignError;
use crate::types::{Pt, Rect, Size};

/// Smaller side, in inches, of the size every base font constant is tuned for.
pub const REFERENCE_MIN_DIMENSION_IN: f32 = 18.0;

pub const DEFAULT_BLEED_IN: f32 = 0.125;
pub const DEFAULT_SAFE_MARGIN_IN: f32 = 0.5;

// Preflight floor for the margin; margins between this and the layout
// default are flagged as out of policy.
const MARGIN_POLICY_FLOOR_IN: f32 = 0.25;

/// Generator-side geometry policy. Preflight carries its own, independently
/// configured minimums.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutPolicy {
    pub bleed_in: f32,
    pub safe_margin_in: f32,
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        Self {
            bleed_in: DEFAULT_BLEED_IN,
            safe_margin_in: DEFAULT_SAFE_MARGIN_IN,
        }
    }
}

/// Font maxima in points, already multiplied by the layout scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSizeTable {
    pub status: Pt,
    pub address: Pt,
    pub price: Pt,
    pub features: Pt,
    pub agent_name: Pt,
    pub agent_sub: Pt,
    pub phone: Pt,
    pub cta: Pt,
    pub brokerage: Pt,
    pub license: Pt,
}

impl FontSizeTable {
    pub const BASE: [(&'static str, f32); 10] = [
        ("status", 120.0),
        ("address", 72.0),
        ("price", 96.0),
        ("features", 48.0),
        ("agent_name", 48.0),
        ("agent_sub", 38.0),
        ("phone", 110.0),
        ("cta", 40.0),
        ("brokerage", 34.0),
        ("license", 14.0),
    ];

    fn scaled(scale: f32) -> Self {
        let s = |base: f32| Pt::from_f32(base * scale);
        Self {
            status: s(120.0),
            address: s(72.0),
            price: s(96.0),
            features: s(48.0),
            agent_name: s(48.0),
            agent_sub: s(38.0),
            phone: s(110.0),
            cta: s(40.0),
            brokerage: s(34.0),
            license: s(14.0),
        }
    }

    pub fn get(&self, name: &str) -> Option<Pt> {
        let value = match name {
            "status" => self.status,
            "address" => self.address,
            "price" => self.price,
            "features" => self.features,
            "agent_name" => self.agent_name,
            "agent_sub" => self.agent_sub,
            "phone" => self.phone,
            "cta" => self.cta,
            "brokerage" => self.brokerage,
            "license" => self.license,
            _ => return None,
        };
        Some(value)
    }
}

/// Derived page geometry for one render. Page size includes bleed on every
/// side; drawing happens in trim space after translating by `bleed_pt`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSpec {
    pub width_in: f32,
    pub height_in: f32,
    pub page_width_pt: Pt,
    pub page_height_pt: Pt,
    pub trim_width_pt: Pt,
    pub trim_height_pt: Pt,
    pub bleed_pt: Pt,
    pub safe_margin_pt: Pt,
    pub scale_factor: f32,
    pub fonts: FontSizeTable,
}

impl LayoutSpec {
    pub fn is_landscape(&self) -> bool {
        self.width_in > self.height_in
    }

    pub fn page_size(&self) -> Size {
        Size::new(self.page_width_pt, self.page_height_pt)
    }

    pub fn trim_rect(&self) -> Rect {
        Rect::new(Pt::ZERO, Pt::ZERO, self.trim_width_pt, self.trim_height_pt)
    }

    pub fn safe_rect(&self) -> Rect {
        self.trim_rect().inset(self.safe_margin_pt)
    }

    pub fn min_dim_pt(&self) -> Pt {
        self.trim_width_pt.min(self.trim_height_pt)
    }

    pub fn bleed_in(&self) -> f32 {
        self.bleed_pt.to_inches()
    }

    pub fn safe_margin_in(&self) -> f32 {
        self.safe_margin_pt.to_inches()
    }

    /// True when the margin passes preflight but is below the generous
    /// default the generator is meant to use.
    pub fn margin_out_of_policy(&self) -> bool {
        let margin = self.safe_margin_in();
        margin + 1e-4 >= MARGIN_POLICY_FLOOR_IN && margin + 1e-4 < DEFAULT_SAFE_MARGIN_IN
    }
}

pub fn make_layout(width_in: f32, height_in: f32) -> Result<LayoutSpec, SignError> {
    make_layout_with(width_in, height_in, &LayoutPolicy::default(), false)
}

pub fn make_layout_with(
    width_in: f32,
    height_in: f32,
    policy: &LayoutPolicy,
    allow_custom: bool,
) -> Result<LayoutSpec, SignError> {
    if !width_in.is_finite() || !height_in.is_finite() || width_in <= 0.0 || height_in <= 0.0 {
        return Err(SignError::InvalidDimension(format!(
            "{}x{} in",
            width_in, height_in
        )));
    }
    if !allow_custom && catalog::preset_for_dimensions(width_in, height_in).is_none() {
        return Err(SignError::InvalidDimension(format!(
            "{}x{} in is not a catalog size",
            width_in, height_in
        )));
    }
    if !policy.bleed_in.is_finite() || policy.bleed_in < 0.0 {
        return Err(SignError::InvalidDimension(format!(
            "bleed {} in",
            policy.bleed_in
        )));
    }
    if !policy.safe_margin_in.is_finite()
        || policy.safe_margin_in <= 0.0
        || policy.safe_margin_in * 2.0 >= width_in.min(height_in)
    {
        return Err(SignError::InvalidDimension(format!(
            "safe margin {} in",
            policy.safe_margin_in
        )));
    }

    let scale_factor = width_in.min(height_in) / REFERENCE_MIN_DIMENSION_IN;
    let bleed_pt = Pt::from_inches(policy.bleed_in);
    let trim_width_pt = Pt::from_inches(width_in);
    let trim_height_pt = Pt::from_inches(height_in);
    Ok(LayoutSpec {
        width_in,
        height_in,
        page_width_pt: Pt::from_inches(width_in + 2.0 * policy.bleed_in),
        page_height_pt: Pt::from_inches(height_in + 2.0 * policy.bleed_in),
        trim_width_pt,
        trim_height_pt,
        bleed_pt,
        safe_margin_pt: Pt::from_inches(policy.safe_margin_in),
        scale_factor,
        fonts: FontSizeTable::scaled(scale_factor),
    })
}
