//! Visual sign templates.
//!
//! Every template draws in trim space: the caller has already translated the
//! canvas by the bleed, so `(0, 0)` is the top-left trim corner. Bands that
//! touch a trim edge are extended into the bleed with [`DrawCtx::fill_band`].

mod address_qr;
mod modern_round;
mod open_house;
mod phone_qr;
mod split;

use crate::assets::{AssetKind, Storage, fetch_asset};
use crate::canvas::Canvas;
use crate::compose::SignData;
use crate::debug::{DebugLogger, log_event};
use crate::error::{AssetUnavailable, SignError};
use crate::font::{FontRegistry, FontRole};
use crate::layout::LayoutSpec;
use crate::qr_logo::{BORDER_MODULES, QR_RASTER_PX, render_qr_with_logo};
use crate::qr_vector::{EccLevel, QrMatrix, draw_vector_qr};
use crate::text_fit::{FitResult, TextBlock, draw_fitted_block, draw_fitted_line};
use crate::types::{Color, Pt, Rect};
use std::collections::BTreeMap;
use std::sync::Arc;

// Smallest quiet zone any template uses: 0.25 in.
const MIN_QUIET_ZONE_PT: f32 = 18.0;

// Signs live outdoors; every printed symbol carries the highest correction level.
const SIGN_QR_ECC: EccLevel = EccLevel::H;

pub(crate) const INK: Color = Color {
    r: 15.0 / 255.0,
    g: 23.0 / 255.0,
    b: 42.0 / 255.0,
};

pub(crate) const SUBTLE: Color = Color {
    r: 71.0 / 255.0,
    g: 85.0 / 255.0,
    b: 105.0 / 255.0,
};

pub(crate) const CARD: Color = Color {
    r: 241.0 / 255.0,
    g: 245.0 / 255.0,
    b: 249.0 / 255.0,
};

pub(crate) const PRICE_ORANGE: Color = Color {
    r: 212.0 / 255.0,
    g: 93.0 / 255.0,
    b: 18.0 / 255.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    ModernRound,
    PhoneQrPremium,
    AddressQrPremium,
    OpenHouse,
    LandscapeSplit,
}

const ALIASES: [(&str, Template); 12] = [
    ("yard_modern_round", Template::ModernRound),
    ("listing_modern_round", Template::ModernRound),
    ("listing_standard", Template::ModernRound),
    ("yard_standard", Template::ModernRound),
    ("smart_v1_photo_banner", Template::ModernRound),
    ("yard_phone_qr_premium", Template::PhoneQrPremium),
    ("listing_v2_phone_qr_premium", Template::PhoneQrPremium),
    ("yard_address_qr_premium", Template::AddressQrPremium),
    ("listing_v2_address_qr_premium", Template::AddressQrPremium),
    ("yard_open_house", Template::OpenHouse),
    ("open_house", Template::OpenHouse),
    ("yard_open_house_gold", Template::OpenHouse),
];

impl Template {
    pub const ALL: [Template; 5] = [
        Template::ModernRound,
        Template::PhoneQrPremium,
        Template::AddressQrPremium,
        Template::OpenHouse,
        Template::LandscapeSplit,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Template::ModernRound => "yard_modern_round",
            Template::PhoneQrPremium => "yard_phone_qr_premium",
            Template::AddressQrPremium => "yard_address_qr_premium",
            Template::OpenHouse => "yard_open_house",
            Template::LandscapeSplit => "yard_landscape_split",
        }
    }

    /// Canonical id or a known alias. Case and surrounding whitespace are ignored.
    pub fn from_id(raw: &str) -> Option<Template> {
        let key = raw.trim().to_ascii_lowercase();
        if key == Template::LandscapeSplit.id() {
            return Some(Template::LandscapeSplit);
        }
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, template)| *template)
    }

    /// Picks the template for a layout id. Missing or unknown ids use
    /// modern-round, which becomes the split layout on landscape sizes.
    pub fn resolve(layout_id: Option<&str>, landscape: bool) -> Template {
        let template = layout_id
            .and_then(Template::from_id)
            .unwrap_or(Template::ModernRound);
        match template {
            Template::ModernRound if landscape => Template::LandscapeSplit,
            other => other,
        }
    }

    pub(crate) fn draw(self, ctx: &mut DrawCtx<'_>) -> Result<Placement, SignError> {
        let landscape = ctx.layout.is_landscape();
        match self {
            Template::ModernRound if landscape => split::draw(ctx),
            Template::ModernRound => modern_round::draw(ctx),
            Template::PhoneQrPremium if landscape => phone_qr::draw_landscape(ctx),
            Template::PhoneQrPremium => phone_qr::draw_portrait(ctx),
            Template::AddressQrPremium => address_qr::draw(ctx),
            Template::OpenHouse if landscape => open_house::draw_landscape(ctx),
            Template::OpenHouse => open_house::draw_portrait(ctx),
            Template::LandscapeSplit => split::draw(ctx),
        }
    }
}

/// Where the QR code ended up. Feeds preflight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub qr_size: Pt,
    pub quiet_zone: Pt,
    /// The symbol itself, without the quiet zone, in trim space.
    pub qr_rect: Rect,
    pub logo_overlay: bool,
}

#[derive(Debug, Clone)]
struct LogoOverlay {
    image_id: String,
    modules: usize,
}

/// Everything a template needs while drawing one page.
pub(crate) struct DrawCtx<'a> {
    pub canvas: &'a mut Canvas,
    pub fonts: &'a FontRegistry,
    pub layout: &'a LayoutSpec,
    pub data: &'a SignData,
    storage: Option<&'a dyn Storage>,
    logger: Option<&'a DebugLogger>,
    qr_logo_overlay: bool,
    assets: BTreeMap<AssetKind, Option<Arc<Vec<u8>>>>,
    logo_qr: Option<Option<LogoOverlay>>,
}

impl<'a> DrawCtx<'a> {
    pub fn new(
        canvas: &'a mut Canvas,
        fonts: &'a FontRegistry,
        layout: &'a LayoutSpec,
        data: &'a SignData,
    ) -> Self {
        Self {
            canvas,
            fonts,
            layout,
            data,
            storage: None,
            logger: None,
            qr_logo_overlay: false,
            assets: BTreeMap::new(),
            logo_qr: None,
        }
    }

    pub fn with_storage(mut self, storage: Option<&'a dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_logger(mut self, logger: Option<&'a DebugLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_qr_logo_overlay(mut self, enabled: bool) -> Self {
        self.qr_logo_overlay = enabled;
        self
    }

    pub fn logger(&self) -> Option<&'a DebugLogger> {
        self.logger
    }

    pub fn w(&self) -> Pt {
        self.layout.trim_width_pt
    }

    pub fn h(&self) -> Pt {
        self.layout.trim_height_pt
    }

    pub fn margin(&self) -> Pt {
        self.layout.safe_margin_pt
    }

    pub fn font(&self, role: FontRole) -> String {
        self.fonts.font_for(role)
    }

    pub fn block(&self, text: &str, role: FontRole, max_width: Pt, max_size: Pt) -> TextBlock {
        TextBlock::new(text, self.font(role), max_width, max_size)
    }

    /// One fitted line; returns the size used.
    pub fn line(&mut self, block: &TextBlock, color: Color, anchor_x: Pt, baseline: Pt) -> Pt {
        self.canvas.set_fill_color(color);
        draw_fitted_line(self.canvas, self.fonts, block, anchor_x, baseline)
    }

    /// A wrapped block vertically centered in `rect`.
    pub fn text_block(&mut self, block: &TextBlock, color: Color, rect: Rect) -> FitResult {
        self.canvas.set_fill_color(color);
        draw_fitted_block(self.canvas, self.fonts, block, rect)
    }

    /// Fills `rect`, pushing any side that sits on a trim edge out through the bleed.
    pub fn fill_band(&mut self, rect: Rect, color: Color) {
        let bleed = self.layout.bleed_pt;
        let eps = Pt::from_f32(0.01);
        let mut left = rect.x;
        let mut top = rect.y;
        let mut right = rect.right();
        let mut bottom = rect.bottom();
        if left <= eps {
            left = left - bleed;
        }
        if top <= eps {
            top = top - bleed;
        }
        if right >= self.w() - eps {
            right = right + bleed;
        }
        if bottom >= self.h() - eps {
            bottom = bottom + bleed;
        }
        self.canvas
            .fill_rect(Rect::new(left, top, right - left, bottom - top), color);
    }

    pub fn rect_path(&mut self, rect: Rect) {
        self.canvas.move_to(rect.x, rect.y);
        self.canvas.line_to(rect.right(), rect.y);
        self.canvas.line_to(rect.right(), rect.bottom());
        self.canvas.line_to(rect.x, rect.bottom());
        self.canvas.close_path();
    }

    pub fn stroke_line(&mut self, from: (Pt, Pt), to: (Pt, Pt), color: Color, width: Pt) {
        self.canvas.save_state();
        self.canvas.set_stroke_color(color);
        self.canvas.set_line_width(width);
        self.canvas.line(from.0, from.1, to.0, to.1);
        self.canvas.restore_state();
    }

    /// Optional image bytes for `kind`, fetched once per context. Failures are
    /// logged (except a missing key) and read as "no image".
    pub fn asset(&mut self, kind: AssetKind) -> Option<Arc<Vec<u8>>> {
        if let Some(cached) = self.assets.get(&kind) {
            return cached.clone();
        }
        let key = match kind {
            AssetKind::Headshot => self.data.headshot_key.as_deref(),
            AssetKind::BrokerageLogo => self.data.logo_key.as_deref(),
        };
        let fetched = match fetch_asset(self.storage, key) {
            Ok(bytes) => Some(Arc::new(bytes)),
            Err(AssetUnavailable::NoKey) => None,
            Err(reason) => {
                log_event(
                    self.logger,
                    "asset.unavailable",
                    &[("kind", kind.as_str().to_string()), ("reason", reason.to_string())],
                );
                None
            }
        };
        self.assets.insert(kind, fetched.clone());
        fetched
    }

    /// Draws the QR symbol with its top-left corner at `(x, y)` and a quiet
    /// zone of [`quiet_zone_for`] around it.
    pub fn draw_qr(&mut self, x: Pt, y: Pt, size: Pt) -> Result<Placement, SignError> {
        let quiet_zone = quiet_zone_for(self.layout);
        let symbol = Rect::square(x, y, size);
        if let Some(overlay) = self.logo_overlay()? {
            let module = size / overlay.modules as i32;
            let border = module * BORDER_MODULES as i32;
            let backing = Rect::new(
                x - quiet_zone,
                y - quiet_zone,
                size + quiet_zone * 2,
                size + quiet_zone * 2,
            );
            self.canvas.meta("qr.size_pt", format!("{:.3}", size.to_f32()));
            self.canvas.meta("qr.logo_overlay", "true");
            self.canvas.save_state();
            self.canvas.fill_rect(backing, Color::WHITE);
            self.rect_path(backing);
            self.canvas.clip_path();
            self.canvas.draw_image(
                Rect::square(x - border, y - border, size + border * 2),
                overlay.image_id,
            );
            self.canvas.restore_state();
            return Ok(Placement {
                qr_size: size,
                quiet_zone,
                qr_rect: symbol,
                logo_overlay: true,
            });
        }

        let qr = draw_vector_qr(&self.data.qr_payload, x, y, size, quiet_zone, SIGN_QR_ECC)?
            .ok_or(SignError::MissingRequiredField("qr_payload"))?;
        qr.emit(self.canvas);
        Ok(Placement {
            qr_size: qr.size,
            quiet_zone: qr.quiet_zone,
            qr_rect: qr.symbol_rect(),
            logo_overlay: false,
        })
    }

    fn logo_overlay(&mut self) -> Result<Option<LogoOverlay>, SignError> {
        if !self.qr_logo_overlay {
            return Ok(None);
        }
        if let Some(cached) = &self.logo_qr {
            return Ok(cached.clone());
        }
        let overlay = match self.asset(AssetKind::BrokerageLogo) {
            None => None,
            Some(logo) => {
                let rendered = render_qr_with_logo(
                    &self.data.qr_payload,
                    Some(logo.as_slice()),
                    QR_RASTER_PX,
                    self.logger,
                )?;
                if rendered.logo_ratio.is_some() {
                    let modules = QrMatrix::encode(&self.data.qr_payload, rendered.ecc)?.width();
                    let image_id = self.canvas.register_image(Arc::new(rendered.to_png()?));
                    Some(LogoOverlay { image_id, modules })
                } else {
                    None
                }
            }
        };
        self.logo_qr = Some(overlay.clone());
        Ok(overlay)
    }

    pub fn license_text(&self) -> Option<String> {
        crate::fields::license_line(
            self.data.license_number.as_deref(),
            self.data.state.as_deref(),
        )
    }
}

/// Quiet zone for every template: 2% of the short side, never under 0.25 in.
pub fn quiet_zone_for(layout: &LayoutSpec) -> Pt {
    (layout.min_dim_pt() * 0.02).max(Pt::from_f32(MIN_QUIET_ZONE_PT))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::canvas::Command;
    use crate::catalog::SIGN_SIZES;

    #[test]
    fn sign_qr_is_drawn_at_high_correction() {
        let req = request("18x24", "yard_modern_round");
        let (doc, placement, _) = draw(&req, false);
        let rects: Vec<Rect> = doc.pages[0]
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawRect { x, y, width, height } => Some(Rect::new(*x, *y, *width, *height)),
                _ => None,
            })
            .collect();
        let payload = req.qr_payload.as_deref().unwrap();
        for (ecc, on_page) in [(EccLevel::H, true), (EccLevel::M, false)] {
            let qr = draw_vector_qr(
                payload,
                placement.qr_rect.x,
                placement.qr_rect.y,
                placement.qr_size,
                placement.quiet_zone,
                ecc,
            )
            .unwrap()
            .unwrap();
            let matches = qr.modules.iter().all(|module| rects.contains(module));
            assert_eq!(matches, on_page, "{:?}", ecc);
        }
    }

    #[test]
    fn aliases_resolve_to_canonical_templates() {
        assert_eq!(Template::resolve(Some("listing_standard"), false), Template::ModernRound);
        assert_eq!(Template::resolve(Some("smart_v1_photo_banner"), false), Template::ModernRound);
        assert_eq!(
            Template::resolve(Some(" LISTING_V2_PHONE_QR_PREMIUM "), false),
            Template::PhoneQrPremium
        );
        assert_eq!(
            Template::resolve(Some("listing_v2_address_qr_premium"), true),
            Template::AddressQrPremium
        );
        assert_eq!(Template::resolve(Some("yard_open_house_gold"), false), Template::OpenHouse);
        assert_eq!(Template::resolve(Some("yard_landscape_split"), false), Template::LandscapeSplit);
    }

    #[test]
    fn modern_round_switches_to_split_on_landscape() {
        assert_eq!(Template::resolve(None, true), Template::LandscapeSplit);
        assert_eq!(Template::resolve(Some("nope"), false), Template::ModernRound);
        assert_eq!(Template::resolve(Some("nope"), true), Template::LandscapeSplit);
        assert!(Template::from_id("nope").is_none());
        for template in Template::ALL {
            assert_eq!(Template::from_id(template.id()), Some(template));
        }
    }

    #[test]
    fn quiet_zone_has_a_floor() {
        let small = crate::layout::make_layout(12.0, 18.0).unwrap();
        assert_eq!(quiet_zone_for(&small), Pt::from_f32(18.0));
        let large = crate::layout::make_layout(24.0, 36.0).unwrap();
        assert!((quiet_zone_for(&large).to_f32() - 34.56).abs() < 0.01);
    }

    #[test]
    fn every_template_meets_minimum_qr_on_every_size() {
        for template in Template::ALL {
            for preset in SIGN_SIZES.iter() {
                let (doc, placement, layout) = draw(&request(preset.key, template.id()), false);
                assert!(
                    placement.qr_size.to_inches() >= 2.0,
                    "{} on {}: {}in",
                    template.id(),
                    preset.key,
                    placement.qr_size.to_inches()
                );
                assert!(placement.quiet_zone.to_inches() >= 0.25 - 1e-3);
                assert!(placement.qr_rect.inset(-placement.quiet_zone).clearance_within(layout.trim_rect()) >= Pt::ZERO - Pt::from_f32(0.01));
                assert_within_page(&doc, &layout);
            }
        }
    }

    #[test]
    fn rider_sizes_render_every_template() {
        for template in Template::ALL {
            for key in ["6x24", "6x36"] {
                let (_, placement, _) = draw(&request(key, template.id()), true);
                assert!(placement.qr_size.to_inches() >= 2.0, "{} on {}", template.id(), key);
            }
        }
    }

    #[test]
    fn bands_on_trim_edges_reach_into_bleed() {
        let layout = crate::layout::make_layout(18.0, 24.0).unwrap();
        let data = SignData::from_request(&request("18x24", "yard_modern_round"), false).unwrap();
        let fonts = FontRegistry::new();
        let mut canvas = Canvas::new(layout.page_size());
        {
            let mut ctx = DrawCtx::new(&mut canvas, &fonts, &layout, &data);
            ctx.fill_band(Rect::new(Pt::ZERO, Pt::ZERO, ctx.w(), Pt::from_f32(100.0)), Color::BLACK);
        }
        let doc = canvas.finish();
        let rect = doc.pages[0].commands.iter().find_map(|cmd| match cmd {
            crate::canvas::Command::DrawRect { x, y, width, height } => Some((*x, *y, *width, *height)),
            _ => None,
        });
        let (x, y, w, h) = rect.unwrap();
        assert_eq!(x, -layout.bleed_pt);
        assert_eq!(y, -layout.bleed_pt);
        assert_eq!(w, layout.trim_width_pt + layout.bleed_pt * 2);
        assert_eq!(h, Pt::from_f32(100.0) + layout.bleed_pt);
    }
}
