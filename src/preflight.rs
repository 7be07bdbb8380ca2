use crate::catalog;
use crate::error::{PreflightError, SignError};
use crate::layout::LayoutSpec;
use crate::types::{POINTS_PER_INCH, Pt};
use lopdf::{Document as LoDocument, Object as LoObject};

/// Production tolerances. Independent of the generator's `LayoutPolicy`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreflightLimits {
    pub min_bleed_in: f32,
    pub min_margin_in: f32,
    pub min_qr_in: f32,
    pub preferred_qr_in: f32,
    pub min_quiet_zone_in: f32,
    /// Margin the generator aims for; anything between this and
    /// `min_margin_in` passes with a warning.
    pub policy_margin_in: f32,
    pub epsilon_pt: f32,
}

impl Default for PreflightLimits {
    fn default() -> Self {
        Self {
            min_bleed_in: 0.125,
            min_margin_in: 0.25,
            min_qr_in: 2.0,
            preferred_qr_in: 2.5,
            min_quiet_zone_in: 0.25,
            policy_margin_in: 0.5,
            epsilon_pt: 0.1,
        }
    }
}

impl PreflightLimits {
    pub(crate) fn check(&self) -> Result<(), SignError> {
        let positive = [
            ("min_bleed_in", self.min_bleed_in),
            ("min_margin_in", self.min_margin_in),
            ("min_qr_in", self.min_qr_in),
            ("preferred_qr_in", self.preferred_qr_in),
            ("min_quiet_zone_in", self.min_quiet_zone_in),
            ("policy_margin_in", self.policy_margin_in),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(SignError::InvalidConfiguration(format!(
                    "preflight {} must be > 0 (got {})",
                    name, value
                )));
            }
        }
        if self.preferred_qr_in < self.min_qr_in {
            return Err(SignError::InvalidConfiguration(format!(
                "preferred QR size {} is below the minimum {}",
                self.preferred_qr_in, self.min_qr_in
            )));
        }
        if !self.epsilon_pt.is_finite() || self.epsilon_pt < 0.0 {
            return Err(SignError::InvalidConfiguration(format!(
                "preflight epsilon must be >= 0 (got {})",
                self.epsilon_pt
            )));
        }
        Ok(())
    }

    fn below(&self, value_pt: f32, limit_in: f32) -> bool {
        value_pt < limit_in * POINTS_PER_INCH - self.epsilon_pt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PreflightMetrics {
    pub bleed_in: f32,
    pub margin_in: f32,
    pub qr_size_in: f32,
    pub quiet_zone_in: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreflightResult {
    pub ok: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub metrics: PreflightMetrics,
}

pub fn validate(layout: &LayoutSpec, size_key: &str, qr_size: Pt, quiet_zone: Pt) -> PreflightResult {
    validate_with(&PreflightLimits::default(), layout, size_key, qr_size, quiet_zone)
}

/// Runs every check and collects all violations; nothing short-circuits.
pub fn validate_with(
    limits: &PreflightLimits,
    layout: &LayoutSpec,
    size_key: &str,
    qr_size: Pt,
    quiet_zone: Pt,
) -> PreflightResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let bleed_pt = layout.bleed_pt.to_f32();
    if limits.below(bleed_pt, limits.min_bleed_in) {
        errors.push(format!(
            "Bleed too small: {:.3}\" (min {}\")",
            bleed_pt / POINTS_PER_INCH,
            limits.min_bleed_in
        ));
    }

    let margin_pt = layout.safe_margin_pt.to_f32();
    if limits.below(margin_pt, limits.min_margin_in) {
        errors.push(format!(
            "Safe margin too small: {:.3}\" (min {}\")",
            margin_pt / POINTS_PER_INCH,
            limits.min_margin_in
        ));
    } else if limits.below(margin_pt, limits.policy_margin_in) {
        warnings.push(format!(
            "Safe margin {:.3}\" is below the {}\" layout policy",
            margin_pt / POINTS_PER_INCH,
            limits.policy_margin_in
        ));
    }

    let qr_pt = qr_size.to_f32();
    if limits.below(qr_pt, limits.min_qr_in) {
        errors.push(format!(
            "QR code too small: {:.2}\" (min {:.1}\")",
            qr_pt / POINTS_PER_INCH,
            limits.min_qr_in
        ));
    } else if limits.below(qr_pt, limits.preferred_qr_in) {
        warnings.push(format!(
            "QR code smaller than recommended: {:.2}\" (preferred {:.1}\")",
            qr_pt / POINTS_PER_INCH,
            limits.preferred_qr_in
        ));
    }

    let quiet_pt = quiet_zone.to_f32();
    if limits.below(quiet_pt, limits.min_quiet_zone_in) {
        errors.push(format!(
            "QR quiet zone too small: {:.3}\" (min {}\")",
            quiet_pt / POINTS_PER_INCH,
            limits.min_quiet_zone_in
        ));
    }

    match catalog::lookup_custom_size(size_key) {
        Some(preset) => {
            let trimmed = preset.matches(layout.width_in, layout.height_in);
            let bled = preset.matches(
                layout.page_width_pt.to_inches(),
                layout.page_height_pt.to_inches(),
            );
            if !trimmed && !bled {
                errors.push(format!("Page size does not match {}", size_key));
            }
        }
        None => warnings.push(format!("Unknown sign size '{}'", size_key)),
    }

    PreflightResult {
        ok: errors.is_empty(),
        errors,
        warnings,
        metrics: PreflightMetrics {
            bleed_in: bleed_pt / POINTS_PER_INCH,
            margin_in: margin_pt / POINTS_PER_INCH,
            qr_size_in: qr_pt / POINTS_PER_INCH,
            quiet_zone_in: quiet_pt / POINTS_PER_INCH,
        },
    }
}

pub fn validate_strict(
    limits: &PreflightLimits,
    layout: &LayoutSpec,
    size_key: &str,
    qr_size: Pt,
    quiet_zone: Pt,
) -> Result<PreflightResult, PreflightError> {
    let result = validate_with(limits, layout, size_key, qr_size, quiet_zone);
    if result.ok {
        Ok(result)
    } else {
        Err(PreflightError { result })
    }
}

/// Page geometry read back from finished PDF bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfGeometry {
    pub page_count: usize,
    /// `(width, height)` in points of the first page.
    pub media_box: (f32, f32),
    pub trim_box: Option<(f32, f32)>,
    pub bleed_box: Option<(f32, f32)>,
    /// True when every page has the same MediaBox.
    pub uniform_pages: bool,
    /// Whether the trim box (or the media box) matches `size_key`.
    pub matches_size: bool,
}

pub fn inspect_pdf(bytes: &[u8], size_key: &str) -> Result<PdfGeometry, SignError> {
    let pdf = LoDocument::load_mem(bytes)
        .map_err(|err| SignError::InvalidArgument(format!("pdf parse failed: {err}")))?;
    let pages = pdf.get_pages();
    let mut boxes = Vec::with_capacity(pages.len());
    for page_id in pages.values() {
        let page = pdf
            .get_dictionary(*page_id)
            .map_err(|err| SignError::InvalidArgument(format!("pdf page unreadable: {err}")))?;
        boxes.push((
            box_size(page.get(b"MediaBox").ok()),
            box_size(page.get(b"TrimBox").ok()),
            box_size(page.get(b"BleedBox").ok()),
        ));
    }
    let Some((Some(media_box), trim_box, bleed_box)) = boxes.first().copied() else {
        return Err(SignError::InvalidArgument(
            "pdf has no pages or no MediaBox".to_string(),
        ));
    };
    let uniform_pages = boxes.iter().all(|(media, _, _)| *media == Some(media_box));
    let matches_size = catalog::lookup_custom_size(size_key)
        .map(|preset| {
            let trim = trim_box.unwrap_or(media_box);
            [trim, media_box].iter().any(|(w, h)| {
                preset.matches(w / POINTS_PER_INCH, h / POINTS_PER_INCH)
            })
        })
        .unwrap_or(false);
    Ok(PdfGeometry {
        page_count: boxes.len(),
        media_box,
        trim_box,
        bleed_box,
        uniform_pages,
        matches_size,
    })
}

fn box_size(object: Option<&LoObject>) -> Option<(f32, f32)> {
    let values = object?.as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let nums: Vec<f32> = values.iter().filter_map(object_number).collect();
    if nums.len() != 4 {
        return None;
    }
    Some(((nums[2] - nums[0]).abs(), (nums[3] - nums[1]).abs()))
}

fn object_number(object: &LoObject) -> Option<f32> {
    match object {
        LoObject::Integer(value) => Some(*value as f32),
        LoObject::Real(value) => Some(*value as f32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutPolicy, make_layout, make_layout_with};

    fn inches(v: f32) -> Pt {
        Pt::from_inches(v)
    }

    #[test]
    fn small_qr_fails() {
        let layout = make_layout(18.0, 24.0).unwrap();
        let result = validate(&layout, "18x24", inches(1.5), inches(0.3));
        assert!(!result.ok);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("too small"));
        assert_eq!(result.errors[0], "QR code too small: 1.50\" (min 2.0\")");
    }

    #[test]
    fn comfortable_qr_passes_clean() {
        let layout = make_layout(18.0, 24.0).unwrap();
        let result = validate(&layout, "18x24", inches(2.6), inches(0.3));
        assert!(result.ok);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
        assert!((result.metrics.qr_size_in - 2.6).abs() < 1e-3);
        assert!((result.metrics.bleed_in - 0.125).abs() < 1e-4);
    }

    #[test]
    fn marginal_qr_warns() {
        let layout = make_layout(18.0, 24.0).unwrap();
        let result = validate(&layout, "18x24", inches(2.2), inches(0.3));
        assert!(result.ok);
        assert_eq!(result.warnings, vec!["QR code smaller than recommended: 2.20\" (preferred 2.5\")"]);
    }

    #[test]
    fn every_violation_is_reported() {
        let policy = LayoutPolicy {
            bleed_in: 0.05,
            safe_margin_in: 0.1,
        };
        let layout = make_layout_with(18.0, 24.0, &policy, false).unwrap();
        let result = validate(&layout, "24x36", inches(1.0), inches(0.1));
        assert!(!result.ok);
        assert_eq!(result.errors.len(), 5, "{:?}", result.errors);
        assert_eq!(result.errors[0], "Bleed too small: 0.050\" (min 0.125\")");
        assert_eq!(result.errors[1], "Safe margin too small: 0.100\" (min 0.25\")");
        assert_eq!(result.errors[3], "QR quiet zone too small: 0.100\" (min 0.25\")");
        assert_eq!(result.errors[4], "Page size does not match 24x36");
        assert!((result.metrics.margin_in - 0.1).abs() < 1e-4);
    }

    #[test]
    fn out_of_policy_margin_warns_but_passes() {
        let policy = LayoutPolicy {
            bleed_in: 0.125,
            safe_margin_in: 0.3,
        };
        let layout = make_layout_with(18.0, 24.0, &policy, false).unwrap();
        let result = validate(&layout, "18x24", inches(3.0), inches(0.3));
        assert!(result.ok);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("layout policy"));
    }

    #[test]
    fn strict_variant_raises_with_full_result() {
        let layout = make_layout(18.0, 24.0).unwrap();
        let limits = PreflightLimits::default();
        assert!(validate_strict(&limits, &layout, "18x24", inches(3.0), inches(0.3)).is_ok());
        let err = validate_strict(&limits, &layout, "18x24", inches(1.0), inches(0.0)).unwrap_err();
        assert_eq!(err.result.errors.len(), 2);
        assert!(err.to_string().starts_with("Preflight failed: QR code too small"));
    }

    #[test]
    fn unknown_size_key_is_a_warning() {
        let layout = make_layout(18.0, 24.0).unwrap();
        let result = validate(&layout, "banner", inches(3.0), inches(0.3));
        assert!(result.ok);
        assert_eq!(result.warnings, vec!["Unknown sign size 'banner'"]);
    }

    #[test]
    fn limits_are_checked() {
        assert!(PreflightLimits::default().check().is_ok());
        let bad = PreflightLimits {
            preferred_qr_in: 1.0,
            ..PreflightLimits::default()
        };
        assert!(matches!(bad.check(), Err(SignError::InvalidConfiguration(_))));
    }

    #[test]
    fn garbage_pdf_is_rejected() {
        assert!(inspect_pdf(b"not a pdf", "18x24").is_err());
    }
}
