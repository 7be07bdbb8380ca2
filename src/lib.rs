mod assets;
mod canvas;
mod catalog;
mod compose;
mod debug;
mod error;
mod fields;
mod font;
mod identity;
mod layout;
mod pdf;
mod preflight;
mod qr_logo;
mod qr_vector;
mod raster;
mod templates;
mod text_fit;
mod types;

pub use assets::{
    AssetKind, CONTENT_TYPE_PDF, CONTENT_TYPE_WEBP, DirStorage, MemoryStorage, Storage,
    StoredObject, fetch_asset, pdf_key, preview_key,
};
pub use canvas::{Canvas, Command, Document, Page};
pub use catalog::{
    CUSTOM_SIZES, DEFAULT_CTA, DEFAULT_SIGN_COLOR, DEFAULT_SIGN_SIZE, LAYOUT_VERSION, SIGN_COLORS,
    SIGN_SIZES, SizePreset, asset_basename, cta_text, lookup_custom_size, lookup_size,
    normalize_color, normalize_sign_size, normalize_sign_size_with,
};
pub use compose::{
    DEFAULT_ADDRESS, DEFAULT_AGENT_NAME, DEFAULT_OPEN_HOUSE, DEFAULT_STATUS, PAGES_PER_SIGN,
    RenderedSign, SignData, SignRequest, StoredSign,
};
use debug::DebugLogger;
pub use error::{AssetUnavailable, PreflightError, SignError};
pub use fields::{format_features_line, format_phone, format_price, initials, license_line};
pub use font::{FontRegistry, FontRole};
pub use layout::{
    DEFAULT_BLEED_IN, DEFAULT_SAFE_MARGIN_IN, FontSizeTable, LayoutPolicy, LayoutSpec,
    REFERENCE_MIN_DIMENSION_IN, make_layout, make_layout_with,
};
pub use pdf::{PdfOptions, document_to_pdf};
pub use preflight::{
    PdfGeometry, PreflightLimits, PreflightMetrics, PreflightResult, inspect_pdf, validate,
    validate_strict, validate_with,
};
pub use qr_logo::{
    BACKING_SCALE, BORDER_MODULES, LOGO_RATIOS, LogoQr, QR_RASTER_PX, decode_qr,
    decoder_available,
};
pub use qr_vector::{EccLevel, QrMatrix, VectorQr, draw_vector_qr, legacy_quiet_zone};
pub use raster::{PREVIEW_DPI, PREVIEW_MAX_DIMENSION, Preview, document_to_png_pages, render_preview};
pub use templates::{Placement, Template, quiet_zone_for};
pub use text_fit::{
    Align, FitResult, MAX_LINES_ADDRESS, MAX_LINES_BROKERAGE, MAX_LINES_CTA, MAX_LINES_FEATURES,
    TextBlock, TextMeasure, draw_fitted_block, draw_fitted_line, fit_single_line, wrap_and_fit,
    wrap_text,
};
pub use types::{Color, POINTS_PER_INCH, Pt, Rect, Size};

use std::path::PathBuf;
use std::sync::Arc;

/// Renders print-ready yard signs. Immutable once built and safe to share
/// across threads; every render is independent.
pub struct SignEngine {
    font_registry: Arc<FontRegistry>,
    layout_policy: LayoutPolicy,
    preflight_limits: PreflightLimits,
    allow_custom_sizes: bool,
    qr_logo_overlay: bool,
    pdf_options: PdfOptions,
    debug: Option<DebugLogger>,
    storage: Option<Arc<dyn Storage>>,
}

#[derive(Clone)]
pub struct SignEngineBuilder {
    font_dirs: Vec<PathBuf>,
    font_files: Vec<PathBuf>,
    font_roles: Vec<(FontRole, String)>,
    layout_policy: LayoutPolicy,
    preflight_limits: PreflightLimits,
    allow_custom_sizes: bool,
    qr_logo_overlay: bool,
    pdf_options: PdfOptions,
    debug_path: Option<PathBuf>,
    storage: Option<Arc<dyn Storage>>,
}

impl SignEngine {
    pub fn builder() -> SignEngineBuilder {
        SignEngineBuilder::new()
    }

    pub fn font_registry(&self) -> &FontRegistry {
        &self.font_registry
    }

    pub fn layout_policy(&self) -> LayoutPolicy {
        self.layout_policy
    }

    pub fn preflight_limits(&self) -> PreflightLimits {
        self.preflight_limits
    }

    /// Writes the accumulated counters as a `debug.summary` record and flushes
    /// the log. No-op without `debug_log`.
    pub fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = self.debug.as_ref() {
            logger.emit_summary(context);
            logger.flush();
        }
    }
}

impl SignEngineBuilder {
    pub fn new() -> Self {
        Self {
            font_dirs: Vec::new(),
            font_files: Vec::new(),
            font_roles: Vec::new(),
            layout_policy: LayoutPolicy::default(),
            preflight_limits: PreflightLimits::default(),
            allow_custom_sizes: false,
            qr_logo_overlay: false,
            pdf_options: PdfOptions::default(),
            debug_path: None,
            storage: None,
        }
    }

    pub fn register_font_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_dirs.push(path.into());
        self
    }

    pub fn register_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    // Family used for a role, e.g. (FontRole::Script, "GreatVibes-Regular").
    pub fn font_role(mut self, role: FontRole, family: impl Into<String>) -> Self {
        self.font_roles.push((role, family.into()));
        self
    }

    pub fn bleed_in(mut self, inches: f32) -> Self {
        self.layout_policy.bleed_in = inches;
        self
    }

    pub fn safe_margin_in(mut self, inches: f32) -> Self {
        self.layout_policy.safe_margin_in = inches;
        self
    }

    pub fn preflight_limits(mut self, limits: PreflightLimits) -> Self {
        self.preflight_limits = limits;
        self
    }

    // Accept the 6x24 and 6x36 rider strips in addition to the catalog.
    pub fn allow_custom_sizes(mut self, enabled: bool) -> Self {
        self.allow_custom_sizes = enabled;
        self
    }

    // Composite the brokerage logo into the QR when it still decodes.
    pub fn qr_logo_overlay(mut self, enabled: bool) -> Self {
        self.qr_logo_overlay = enabled;
        self
    }

    // Enable debug logging to a JSONL file.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    // Document title for the Info dictionary. Defaults to "<template> <size>".
    pub fn document_title(mut self, title: impl Into<String>) -> Self {
        self.pdf_options.title = Some(title.into());
        self
    }

    // Debug switch: leave page content streams uncompressed.
    pub fn compress_content(mut self, enabled: bool) -> Self {
        self.pdf_options.compress_content = enabled;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn build(self) -> Result<SignEngine, SignError> {
        let policy = self.layout_policy;
        if !policy.bleed_in.is_finite() || policy.bleed_in < 0.0 {
            return Err(SignError::InvalidConfiguration(format!(
                "bleed_in must be >= 0 (got {})",
                policy.bleed_in
            )));
        }
        if !policy.safe_margin_in.is_finite() || policy.safe_margin_in <= 0.0 {
            return Err(SignError::InvalidConfiguration(format!(
                "safe_margin_in must be > 0 (got {})",
                policy.safe_margin_in
            )));
        }
        self.preflight_limits.check()?;

        let debug = match self.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        let mut registry = FontRegistry::new();
        registry.set_logger(debug.clone());
        for dir in &self.font_dirs {
            registry.register_dir(dir);
        }
        for file in &self.font_files {
            registry.register_file(file);
        }
        for (role, family) in self.font_roles {
            registry.set_role(role, family);
        }
        Ok(SignEngine {
            font_registry: Arc::new(registry),
            layout_policy: policy,
            preflight_limits: self.preflight_limits,
            allow_custom_sizes: self.allow_custom_sizes,
            qr_logo_overlay: self.qr_logo_overlay,
            pdf_options: self.pdf_options,
            debug,
            storage: self.storage,
        })
    }
}

impl Default for SignEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_bad_geometry() {
        assert!(matches!(
            SignEngine::builder().bleed_in(-0.1).build(),
            Err(SignError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SignEngine::builder().safe_margin_in(0.0).build(),
            Err(SignError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SignEngine::builder().bleed_in(f32::NAN).build(),
            Err(SignError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn builder_rejects_inverted_qr_thresholds() {
        let limits = PreflightLimits {
            min_qr_in: 3.0,
            preferred_qr_in: 2.5,
            ..PreflightLimits::default()
        };
        assert!(matches!(
            SignEngine::builder().preflight_limits(limits).build(),
            Err(SignError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn builder_carries_settings() {
        let engine = SignEngine::builder()
            .bleed_in(0.25)
            .safe_margin_in(0.75)
            .font_role(FontRole::Script, "GreatVibes-Regular")
            .build()
            .unwrap();
        assert_eq!(engine.layout_policy().bleed_in, 0.25);
        assert_eq!(engine.layout_policy().safe_margin_in, 0.75);
        assert_eq!(engine.preflight_limits(), PreflightLimits::default());
        assert_eq!(engine.font_registry().font_count(), 0);
    }

    #[test]
    fn missing_font_dir_is_ignored() {
        let engine = SignEngine::builder()
            .register_font_dir("/definitely/not/a/font/dir")
            .build()
            .unwrap();
        assert_eq!(engine.font_registry().font_count(), 0);
    }

    #[test]
    fn debug_log_path_must_be_writable() {
        let result = SignEngine::builder()
            .debug_log("/definitely/not/a/dir/log.jsonl")
            .build();
        assert!(matches!(result, Err(SignError::Io(_))));
    }
}
