//! Request normalization and the render entry points on [`SignEngine`].

use crate::SignEngine;
use crate::assets::{CONTENT_TYPE_PDF, CONTENT_TYPE_WEBP, pdf_key, preview_key};
use crate::canvas::{Canvas, Document};
use crate::catalog::{SizePreset, cta_text, normalize_color, normalize_sign_size_with};
use crate::debug::log_event;
use crate::error::{PreflightError, SignError};
use crate::fields::{format_features_line, format_phone, format_price};
use crate::layout::{LayoutSpec, make_layout_with};
use crate::pdf::{PdfOptions, document_to_pdf};
use crate::preflight::{PreflightResult, validate_with};
use crate::raster::{PREVIEW_MAX_DIMENSION, Preview, render_preview};
use crate::templates::{DrawCtx, Placement, Template};
use crate::types::Color;
use sha2::{Digest, Sha256};

/// Front and back of every physical sign.
pub const PAGES_PER_SIGN: usize = 2;

pub const DEFAULT_ADDRESS: &str = "Address TBD";
pub const DEFAULT_AGENT_NAME: &str = "Agent";
pub const DEFAULT_STATUS: &str = "FOR SALE";
pub const DEFAULT_OPEN_HOUSE: &str = "OPEN HOUSE";

/// Flat input record for one sign. Every field is optional text as entered
/// by the customer; only `qr_payload` is required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignRequest {
    pub order_id: Option<u64>,
    pub layout_id: Option<String>,
    pub size: Option<String>,
    pub color: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub beds: Option<String>,
    pub baths: Option<String>,
    pub sqft: Option<String>,
    pub price: Option<String>,
    pub status_text: Option<String>,
    pub open_house_text: Option<String>,
    pub agent_name: Option<String>,
    pub agent_phone: Option<String>,
    pub agent_email: Option<String>,
    pub brokerage: Option<String>,
    pub license_number: Option<String>,
    pub headshot_key: Option<String>,
    pub logo_key: Option<String>,
    pub qr_payload: Option<String>,
    pub cta_key: Option<String>,
}

/// A request after defaulting and formatting. Templates only ever read this.
#[derive(Debug, Clone, PartialEq)]
pub struct SignData {
    pub order_id: Option<u64>,
    pub template: Template,
    pub size: &'static SizePreset,
    pub color: Color,
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub features: String,
    pub price: String,
    pub status_text: String,
    pub open_house_text: String,
    pub agent_name: String,
    pub agent_phone: Option<String>,
    pub agent_email: Option<String>,
    pub brokerage: Option<String>,
    pub license_number: Option<String>,
    pub headshot_key: Option<String>,
    pub logo_key: Option<String>,
    pub qr_payload: String,
    pub cta: &'static str,
    /// Input that was replaced by a default (unknown size, unknown layout).
    pub warnings: Vec<String>,
}

fn text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl SignData {
    pub fn from_request(req: &SignRequest, allow_custom: bool) -> Result<Self, SignError> {
        let qr_payload = text(&req.qr_payload).ok_or(SignError::MissingRequiredField("qr_payload"))?;
        let mut warnings = Vec::new();

        let (size, size_warning) = normalize_sign_size_with(req.size.as_deref(), allow_custom);
        warnings.extend(size_warning);

        let layout_id = text(&req.layout_id);
        if let Some(id) = layout_id.as_deref() {
            if Template::from_id(id).is_none() {
                warnings.push(format!(
                    "Unknown layout '{}', using {}",
                    id,
                    Template::ModernRound.id()
                ));
            }
        }
        let template = Template::resolve(layout_id.as_deref(), size.is_landscape());

        Ok(Self {
            order_id: req.order_id,
            template,
            size,
            color: normalize_color(req.color.as_deref()),
            address: text(&req.address).unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            city: text(&req.city),
            state: text(&req.state),
            features: format_features_line(
                req.beds.as_deref(),
                req.baths.as_deref(),
                req.sqft.as_deref(),
            ),
            price: format_price(req.price.as_deref().unwrap_or("")),
            status_text: text(&req.status_text).unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            open_house_text: text(&req.open_house_text)
                .unwrap_or_else(|| DEFAULT_OPEN_HOUSE.to_string()),
            agent_name: text(&req.agent_name).unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string()),
            agent_phone: text(&req.agent_phone).map(|p| format_phone(&p)),
            agent_email: text(&req.agent_email),
            brokerage: text(&req.brokerage),
            license_number: text(&req.license_number),
            headshot_key: text(&req.headshot_key),
            logo_key: text(&req.logo_key),
            qr_payload,
            cta: cta_text(req.cta_key.as_deref()),
            warnings,
        })
    }

    /// `"Springfield, CA"`, or whichever half is present.
    pub fn city_line(&self) -> Option<String> {
        match (self.city.as_deref(), self.state.as_deref()) {
            (Some(city), Some(state)) => Some(format!("{}, {}", city, state)),
            (Some(city), None) => Some(city.to_string()),
            (None, Some(state)) => Some(state.to_string()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSign {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub size_key: &'static str,
    pub template: Template,
    /// Lowercase hex SHA-256 of `bytes`.
    pub sha256: String,
    pub placement: Placement,
    pub preflight: PreflightResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredSign {
    pub key: String,
    pub sign: RenderedSign,
}

impl SignEngine {
    pub(crate) fn layout_for(&self, data: &SignData) -> Result<LayoutSpec, SignError> {
        make_layout_with(
            data.size.width_in,
            data.size.height_in,
            &self.layout_policy,
            self.allow_custom_sizes,
        )
    }

    /// Draws the identical front and back pages for `data`.
    pub(crate) fn compose_document(
        &self,
        data: &SignData,
        layout: &LayoutSpec,
    ) -> Result<(Document, Placement), SignError> {
        let mut canvas = Canvas::new(layout.page_size());
        let mut placement = None;
        {
            let mut ctx = DrawCtx::new(&mut canvas, &self.font_registry, layout, data)
                .with_storage(self.storage.as_deref())
                .with_logger(self.debug.as_ref())
                .with_qr_logo_overlay(self.qr_logo_overlay);
            for _ in 0..PAGES_PER_SIGN {
                ctx.canvas.save_state();
                ctx.canvas.translate(layout.bleed_pt, layout.bleed_pt);
                placement = Some(data.template.draw(&mut ctx)?);
                ctx.canvas.restore_state();
                ctx.canvas.show_page();
            }
        }
        let placement =
            placement.ok_or_else(|| SignError::Render("no pages were drawn".to_string()))?;
        Ok((canvas.finish(), placement))
    }

    fn prepare(&self, req: &SignRequest) -> Result<(SignData, LayoutSpec), SignError> {
        let data = SignData::from_request(req, self.allow_custom_sizes)?;
        for warning in &data.warnings {
            log_event(self.debug.as_ref(), "sign.warning", &[("message", warning.clone())]);
        }
        let layout = self.layout_for(&data)?;
        Ok((data, layout))
    }

    fn check(&self, data: &SignData, layout: &LayoutSpec, placement: &Placement) -> PreflightResult {
        let result = validate_with(
            &self.preflight_limits,
            layout,
            data.size.key,
            placement.qr_size,
            placement.quiet_zone,
        );
        log_event(
            self.debug.as_ref(),
            "preflight.result",
            &[
                ("size", data.size.key.to_string()),
                ("ok", result.ok.to_string()),
                ("errors", result.errors.join("; ")),
                ("warnings", result.warnings.join("; ")),
            ],
        );
        result
    }

    /// Renders the print PDF. A sign that fails preflight is not returned.
    pub fn render_sign(&self, req: &SignRequest) -> Result<RenderedSign, SignError> {
        let (data, layout) = self.prepare(req)?;
        let (document, placement) = self.compose_document(&data, &layout)?;
        let preflight = self.check(&data, &layout, &placement);
        if !preflight.ok {
            return Err(PreflightError { result: preflight }.into());
        }

        let options = PdfOptions {
            title: Some(
                self.pdf_options
                    .title
                    .clone()
                    .unwrap_or_else(|| format!("{} {}", data.template.id(), data.size.key)),
            ),
            bleed: layout.bleed_pt,
            ..self.pdf_options.clone()
        };
        let bytes = document_to_pdf(&document, &self.font_registry, &options)?;
        let sha256 = hex_digest(&bytes);
        log_event(
            self.debug.as_ref(),
            "sign.render",
            &[
                ("template", data.template.id().to_string()),
                ("size", data.size.key.to_string()),
                ("pages", document.pages.len().to_string()),
                ("bytes", bytes.len().to_string()),
                ("sha256", sha256.clone()),
            ],
        );
        Ok(RenderedSign {
            page_count: document.pages.len(),
            size_key: data.size.key,
            template: data.template,
            sha256,
            placement,
            preflight,
            bytes,
        })
    }

    /// Renders and puts the PDF at its order key.
    pub fn render_and_store(&self, req: &SignRequest) -> Result<StoredSign, SignError> {
        let storage = self.storage.as_deref().ok_or_else(|| {
            SignError::InvalidConfiguration("render_and_store needs a storage backend".to_string())
        })?;
        let sign = self.render_sign(req)?;
        let key = pdf_key(req.order_id, sign.template.id(), sign.size_key);
        storage.put(&sign.bytes, &key, CONTENT_TYPE_PDF)?;
        Ok(StoredSign { key, sign })
    }

    /// Front page as a bleed-cropped WebP preview.
    pub fn render_preview(&self, req: &SignRequest) -> Result<Preview, SignError> {
        let (data, layout) = self.prepare(req)?;
        let (document, _) = self.compose_document(&data, &layout)?;
        render_preview(
            &document,
            layout.bleed_pt,
            PREVIEW_MAX_DIMENSION,
            Some(&self.font_registry),
        )
    }

    /// Renders the preview and puts it at its preview key.
    pub fn store_preview(&self, req: &SignRequest) -> Result<String, SignError> {
        let storage = self.storage.as_deref().ok_or_else(|| {
            SignError::InvalidConfiguration("store_preview needs a storage backend".to_string())
        })?;
        let preview = self.render_preview(req)?;
        let (size, _) = normalize_sign_size_with(req.size.as_deref(), self.allow_custom_sizes);
        let key = preview_key(req.order_id, size.key);
        storage.put(&preview.webp, &key, CONTENT_TYPE_WEBP)?;
        Ok(key)
    }

    /// Renders many signs in parallel. Results keep the input order.
    pub fn render_batch(&self, requests: &[SignRequest]) -> Vec<Result<RenderedSign, SignError>> {
        use rayon::prelude::*;

        let mut results: Vec<(usize, Result<RenderedSign, SignError>)> = requests
            .par_iter()
            .enumerate()
            .map(|(idx, req)| (idx, self.render_sign(req)))
            .collect();
        results.sort_by_key(|(idx, _)| *idx);
        self.emit_debug_summary("render_batch");
        results.into_iter().map(|(_, res)| res).collect()
    }

    /// Lays the sign out and validates it without producing PDF bytes.
    pub fn preflight(&self, req: &SignRequest) -> Result<PreflightResult, SignError> {
        let (data, layout) = self.prepare(req)?;
        let (_, placement) = self.compose_document(&data, &layout)?;
        Ok(self.check(&data, &layout, &placement))
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{MemoryStorage, Storage};
    use crate::catalog::SIGN_SIZES;
    use crate::canvas::Command;
    use crate::preflight::{PreflightLimits, inspect_pdf};
    use crate::templates::test_support::request;
    use std::sync::Arc;

    fn engine() -> SignEngine {
        SignEngine::builder().build().unwrap()
    }

    fn temp_log_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("yardsign_{tag}_{}.jsonl", std::process::id()))
    }

    #[test]
    fn request_defaults_fill_blank_fields() {
        let req = SignRequest {
            qr_payload: Some(" https://example.com/q ".to_string()),
            address: Some("   ".to_string()),
            ..SignRequest::default()
        };
        let data = SignData::from_request(&req, false).unwrap();
        assert_eq!(data.address, DEFAULT_ADDRESS);
        assert_eq!(data.agent_name, DEFAULT_AGENT_NAME);
        assert_eq!(data.status_text, DEFAULT_STATUS);
        assert_eq!(data.open_house_text, DEFAULT_OPEN_HOUSE);
        assert_eq!(data.qr_payload, "https://example.com/q");
        assert_eq!(data.size.key, "18x24");
        assert_eq!(data.color.to_hex(), "#0077ff");
        assert_eq!(data.template, Template::ModernRound);
        assert_eq!(data.cta, "SCAN FOR DETAILS");
        assert!(data.features.is_empty());
        assert!(data.warnings.is_empty());
    }

    #[test]
    fn blank_qr_payload_is_rejected() {
        let mut req = request("18x24", "yard_modern_round");
        req.qr_payload = Some("  ".to_string());
        assert!(matches!(
            SignData::from_request(&req, false),
            Err(SignError::MissingRequiredField("qr_payload"))
        ));
        req.qr_payload = None;
        assert!(matches!(
            engine().render_sign(&req),
            Err(SignError::MissingRequiredField("qr_payload"))
        ));
    }

    #[test]
    fn unknown_inputs_become_warnings() {
        let mut req = request("99x99", "fancy_layout");
        req.color = Some("chartreuse".to_string());
        let data = SignData::from_request(&req, false).unwrap();
        assert_eq!(data.size.key, "18x24");
        assert_eq!(data.template, Template::ModernRound);
        assert_eq!(data.warnings.len(), 2);
        assert!(data.warnings[1].contains("fancy_layout"));
    }

    #[test]
    fn document_has_two_identical_pages_offset_by_bleed() {
        let engine = engine();
        let (data, layout) = engine.prepare(&request("18x24", "yard_phone_qr_premium")).unwrap();
        let (doc, _) = engine.compose_document(&data, &layout).unwrap();
        assert_eq!(doc.pages.len(), PAGES_PER_SIGN);
        assert_eq!(doc.pages[0], doc.pages[1]);
        assert_eq!(
            doc.pages[0].commands[1],
            Command::Translate(layout.bleed_pt, layout.bleed_pt)
        );
        assert_eq!(doc.page_size, layout.page_size());
    }

    #[test]
    fn render_sign_produces_preflighted_pdf() {
        let engine = engine();
        let rendered = engine.render_sign(&request("24x36", "yard_address_qr_premium")).unwrap();
        assert!(rendered.bytes.starts_with(b"%PDF-1.7"));
        assert_eq!(rendered.page_count, 2);
        assert_eq!(rendered.size_key, "24x36");
        assert_eq!(rendered.sha256.len(), 64);
        assert!(rendered.preflight.ok);
        let geometry = inspect_pdf(&rendered.bytes, "24x36").unwrap();
        assert_eq!(geometry.page_count, 2);
        assert!(geometry.matches_size);
        assert!(geometry.uniform_pages);
    }

    fn page_strings(doc: &Document, page: usize) -> Vec<String> {
        doc.pages[page]
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawString { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn textual_price_is_drawn_verbatim() {
        let engine = engine();
        let mut req = request("18x24", "yard_modern_round");
        req.price = Some("$500k".to_string());
        let (data, layout) = engine.prepare(&req).unwrap();
        assert_eq!(data.price, "$500k");
        let (doc, _) = engine.compose_document(&data, &layout).unwrap();
        for page in 0..PAGES_PER_SIGN {
            let texts = page_strings(&doc, page);
            assert!(texts.iter().any(|t| t == "$500k"), "{texts:?}");
            assert!(!texts.iter().any(|t| t.contains("$500,")));
        }
    }

    #[test]
    fn standard_sign_has_bled_pages_and_requested_content() {
        let engine = engine();
        let req = SignRequest {
            size: Some("18x24".to_string()),
            address: Some("123 Maple Street".to_string()),
            color: Some("#0077ff".to_string()),
            qr_payload: Some("https://x.co/abcdefg".to_string()),
            ..SignRequest::default()
        };
        assert_eq!(req.qr_payload.as_deref().map(str::len), Some(20));

        let (data, layout) = engine.prepare(&req).unwrap();
        let (doc, _) = engine.compose_document(&data, &layout).unwrap();
        let accent = Command::SetFillColor(crate::catalog::normalize_color(Some("#0077ff")));
        for page in 0..PAGES_PER_SIGN {
            assert!(page_strings(&doc, page).iter().any(|t| t == "123 Maple Street"));
            assert!(doc.pages[page].commands.contains(&accent));
        }

        let rendered = engine.render_sign(&req).unwrap();
        assert!(rendered.preflight.ok);
        let pdf = lopdf::Document::load_mem(&rendered.bytes).unwrap();
        let pages = pdf.get_pages();
        assert_eq!(pages.len(), 2);
        for page_id in pages.values() {
            let page = pdf.get_dictionary(*page_id).unwrap();
            let media: Vec<f32> = page
                .get(b"MediaBox")
                .unwrap()
                .as_array()
                .unwrap()
                .iter()
                .map(|obj| match obj {
                    lopdf::Object::Integer(v) => *v as f32,
                    lopdf::Object::Real(v) => *v as f32,
                    other => panic!("unexpected box value {other:?}"),
                })
                .collect();
            assert_eq!(media, vec![0.0, 0.0, 1314.0, 1746.0]);
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let engine = engine();
        let req = request("12x18", "yard_open_house");
        let a = engine.render_sign(&req).unwrap();
        let b = engine.render_sign(&req).unwrap();
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(a.sha256, b.sha256);
    }

    #[test]
    fn strict_limits_turn_into_preflight_errors() {
        let limits = PreflightLimits {
            min_qr_in: 30.0,
            preferred_qr_in: 30.0,
            ..PreflightLimits::default()
        };
        let engine = SignEngine::builder().preflight_limits(limits).build().unwrap();
        let req = request("18x24", "yard_modern_round");
        match engine.render_sign(&req) {
            Err(SignError::Preflight(err)) => {
                assert!(err.result.errors[0].starts_with("QR code too small"));
            }
            other => panic!("expected preflight failure, got {:?}", other.map(|r| r.size_key)),
        }
        let result = engine.preflight(&req).unwrap();
        assert!(!result.ok);
    }

    #[test]
    fn narrow_margin_passes_with_warning() {
        let engine = SignEngine::builder().safe_margin_in(0.3).build().unwrap();
        let result = engine.preflight(&request("18x24", "yard_modern_round")).unwrap();
        assert!(result.ok);
        assert!(result.warnings.iter().any(|w| w.contains("layout policy")));
    }

    #[test]
    fn batch_keeps_input_order_and_isolates_failures() {
        let engine = engine();
        let mut bad = request("18x24", "yard_modern_round");
        bad.qr_payload = None;
        let requests: Vec<SignRequest> = SIGN_SIZES
            .iter()
            .map(|preset| request(preset.key, "yard_modern_round"))
            .chain(std::iter::once(bad))
            .collect();
        let results = engine.render_batch(&requests);
        assert_eq!(results.len(), requests.len());
        for (preset, result) in SIGN_SIZES.iter().zip(&results) {
            assert_eq!(result.as_ref().unwrap().size_key, preset.key);
        }
        assert!(results.last().unwrap().is_err());
        let landscape = results[3].as_ref().unwrap();
        assert_eq!(landscape.template, Template::LandscapeSplit);
    }

    #[test]
    fn render_and_store_uses_order_keys() {
        let storage = Arc::new(MemoryStorage::new());
        let engine = SignEngine::builder().storage(storage.clone()).build().unwrap();
        let mut req = request("18x24", "yard_phone_qr_premium");
        req.order_id = Some(42);
        let stored = engine.render_and_store(&req).unwrap();
        assert_eq!(stored.key, "pdfs/order_42/yard_phone_qr_premium_18x24.pdf");
        assert_eq!(storage.get(&stored.key).unwrap(), stored.sign.bytes);
        assert_eq!(storage.content_type(&stored.key).as_deref(), Some(CONTENT_TYPE_PDF));

        let key = engine.store_preview(&req).unwrap();
        assert_eq!(key, "previews/order_42/sign_18x24_v2.webp");
        assert!(storage.exists(&key).unwrap());

        assert!(matches!(
            self::engine().render_and_store(&req),
            Err(SignError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn preview_crops_bleed_and_bounds_size() {
        let preview = engine().render_preview(&request("36x24", "yard_modern_round")).unwrap();
        assert_eq!((preview.width, preview.height), (1800, 1200));
        assert_eq!(&preview.webp[0..4], b"RIFF");
    }

    #[test]
    fn rider_sizes_need_custom_sizes_enabled() {
        let req = request("6x24", "yard_modern_round");
        let data = SignData::from_request(&req, false).unwrap();
        assert_eq!(data.size.key, "18x24");
        let engine = SignEngine::builder().allow_custom_sizes(true).build().unwrap();
        let rendered = engine.render_sign(&req).unwrap();
        assert_eq!(rendered.size_key, "6x24");
        assert!(rendered.preflight.ok);
    }

    #[test]
    fn debug_log_records_render_events() {
        let path = temp_log_path("compose_events");
        let mut req = request("18x24", "yard_modern_round");
        req.headshot_key = Some("agents/missing.png".to_string());
        req.layout_id = Some("nope".to_string());
        {
            let engine = SignEngine::builder()
                .debug_log(&path)
                .storage(Arc::new(MemoryStorage::new()))
                .build()
                .unwrap();
            engine.render_sign(&req).unwrap();
            engine.emit_debug_summary("test");
        }
        let log = std::fs::read_to_string(&path).unwrap();
        assert!(log.contains("\"type\":\"sign.render\""));
        assert!(log.contains("\"type\":\"preflight.result\""));
        assert!(log.contains("\"type\":\"asset.unavailable\""));
        assert!(log.contains("\"type\":\"sign.warning\""));
        assert!(log.contains("\"type\":\"debug.summary\""));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn logo_overlay_embeds_raster_qr_when_logo_is_accepted() {
        use image::{Rgba, RgbaImage};
        let logo = RgbaImage::from_pixel(64, 64, Rgba([10, 120, 200, 255]));
        let mut png = std::io::Cursor::new(Vec::new());
        logo.write_to(&mut png, image::ImageFormat::Png).unwrap();
        let storage = Arc::new(MemoryStorage::new());
        storage.insert("logos/acme.png", png.into_inner(), "image/png");
        let engine = SignEngine::builder()
            .storage(storage)
            .qr_logo_overlay(true)
            .build()
            .unwrap();
        let mut req = request("18x24", "yard_modern_round");
        req.logo_key = Some("logos/acme.png".to_string());
        let rendered = engine.render_sign(&req).unwrap();
        assert_eq!(rendered.placement.logo_overlay, crate::qr_logo::decoder_available());
        assert!(rendered.preflight.ok);
    }
}
