use crate::canvas::Canvas;
use crate::error::SignError;
use crate::types::{Color, Pt, Rect};
use qrcode::{EcLevel, QrCode};

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EccLevel {
    L,
    M,
    Q,
    H,
}

impl EccLevel {
    pub fn parse(raw: &str) -> Result<Self, SignError> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(EccLevel::L),
            "M" => Ok(EccLevel::M),
            "Q" => Ok(EccLevel::Q),
            "H" => Ok(EccLevel::H),
            other => Err(SignError::InvalidArgument(format!(
                "unsupported QR error correction level '{}'",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EccLevel::L => "L",
            EccLevel::M => "M",
            EccLevel::Q => "Q",
            EccLevel::H => "H",
        }
    }

    fn to_qrcode(self) -> EcLevel {
        match self {
            EccLevel::L => EcLevel::L,
            EccLevel::M => EcLevel::M,
            EccLevel::Q => EcLevel::Q,
            EccLevel::H => EcLevel::H,
        }
    }
}

/// Encoded QR symbol without quiet zone. Version is picked automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
}

impl QrMatrix {
    pub fn encode(payload: &str, ecc: EccLevel) -> Result<Self, SignError> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), ecc.to_qrcode())
            .map_err(|e| SignError::InvalidArgument(format!("QR encode failed: {e}")))?;
        let width = code.width();
        let dark = code
            .to_colors()
            .into_iter()
            .map(|color| color == qrcode::Color::Dark)
            .collect();
        Ok(Self { width, dark })
    }

    /// Modules per side.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.dark[y * self.width + x]
    }

    /// Runs of dark modules per row as `(row, first_col, len)`.
    fn dark_runs(&self) -> Vec<(usize, usize, usize)> {
        let mut runs = Vec::new();
        for y in 0..self.width {
            let mut x = 0;
            while x < self.width {
                if !self.is_dark(x, y) {
                    x += 1;
                    continue;
                }
                let start = x;
                while x < self.width && self.is_dark(x, y) {
                    x += 1;
                }
                runs.push((y, start, x - start));
            }
        }
        runs
    }
}

/// QR geometry ready to emit as vector rectangles.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQr {
    /// White area covering the symbol plus quiet zone on every side.
    pub backing: Rect,
    /// Dark modules, merged into horizontal runs.
    pub modules: Vec<Rect>,
    pub module_size: Pt,
    pub modules_per_side: usize,
    pub size: Pt,
    pub quiet_zone: Pt,
    pub ecc: EccLevel,
}

impl VectorQr {
    pub fn symbol_rect(&self) -> Rect {
        self.backing.inset(self.quiet_zone)
    }

    pub fn emit(&self, canvas: &mut Canvas) {
        canvas.meta("qr.size_pt", format!("{:.3}", self.size.to_f32()));
        canvas.meta("qr.quiet_zone_pt", format!("{:.3}", self.quiet_zone.to_f32()));
        canvas.save_state();
        if self.quiet_zone > Pt::ZERO {
            canvas.fill_rect(self.backing, Color::WHITE);
        }
        canvas.set_fill_color(Color::BLACK);
        for module in &self.modules {
            canvas.draw_rect(module.x, module.y, module.width, module.height);
        }
        canvas.restore_state();
    }
}

/// Builds vector QR geometry with the symbol's top-left corner at `(x, y)`
/// and side `size`. The quiet zone extends outside that square. An empty
/// payload yields `None`.
pub fn draw_vector_qr(
    payload: &str,
    x: Pt,
    y: Pt,
    size: Pt,
    quiet_zone: Pt,
    ecc: EccLevel,
) -> Result<Option<VectorQr>, SignError> {
    if payload.is_empty() {
        return Ok(None);
    }
    if size <= Pt::ZERO {
        return Err(SignError::InvalidDimension(format!(
            "QR size {} pt",
            size.to_f32()
        )));
    }
    let matrix = QrMatrix::encode(payload, ecc)?;
    let n = matrix.width() as i32;
    let quiet_zone = quiet_zone.max(Pt::ZERO);

    // Edges come from the integer grid so adjacent runs share exact coordinates.
    let edge = |index: usize| size.mul_ratio(index as i32, n);
    let modules = matrix
        .dark_runs()
        .into_iter()
        .map(|(row, col, len)| {
            let left = edge(col);
            let top = edge(row);
            Rect::new(
                x + left,
                y + top,
                edge(col + len) - left,
                edge(row + 1) - top,
            )
        })
        .collect();

    Ok(Some(VectorQr {
        backing: Rect::new(
            x - quiet_zone,
            y - quiet_zone,
            size + quiet_zone * 2,
            size + quiet_zone * 2,
        ),
        modules,
        module_size: size / n,
        modules_per_side: matrix.width(),
        size,
        quiet_zone,
        ecc,
    }))
}

/// Quiet zone used by call sites that only know the symbol size.
pub fn legacy_quiet_zone(size: Pt) -> Pt {
    size * 0.1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::types::Size;

    fn pt(v: i32) -> Pt {
        Pt::from_i32(v)
    }

    #[cfg(feature = "qr_verify")]
    // Paints the emitted rectangles into an 8-bit grey buffer at `px_per_pt`.
    fn rasterize(qr: &VectorQr, px_per_pt: f32) -> (usize, Vec<u8>) {
        let origin_x = qr.backing.x.to_f32();
        let origin_y = qr.backing.y.to_f32();
        let side = (qr.backing.width.to_f32() * px_per_pt).ceil() as usize;
        let mut pixels = vec![255u8; side * side];
        for module in &qr.modules {
            let x0 = ((module.x.to_f32() - origin_x) * px_per_pt).round() as usize;
            let y0 = ((module.y.to_f32() - origin_y) * px_per_pt).round() as usize;
            let x1 = ((module.right().to_f32() - origin_x) * px_per_pt).round() as usize;
            let y1 = ((module.bottom().to_f32() - origin_y) * px_per_pt).round() as usize;
            for y in y0..y1.min(side) {
                for x in x0..x1.min(side) {
                    pixels[y * side + x] = 0;
                }
            }
        }
        (side, pixels)
    }

    #[cfg(feature = "qr_verify")]
    fn decode(side: usize, pixels: &[u8]) -> Option<String> {
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(side, side, |x, y| pixels[y * side + x]);
        prepared
            .detect_grids()
            .into_iter()
            .find_map(|grid| grid.decode().ok().map(|(_, text)| text))
    }

    #[test]
    fn ecc_levels_parse_case_insensitively() {
        assert_eq!(EccLevel::parse("h").unwrap(), EccLevel::H);
        assert_eq!(EccLevel::parse(" q ").unwrap(), EccLevel::Q);
        assert!(matches!(EccLevel::parse("X"), Err(SignError::InvalidArgument(_))));
    }

    #[test]
    fn empty_payload_emits_nothing() {
        let qr = draw_vector_qr("", pt(0), pt(0), pt(180), pt(18), EccLevel::H).unwrap();
        assert!(qr.is_none());
    }

    #[test]
    fn geometry_covers_requested_size() {
        let qr = draw_vector_qr("https://example.com/r/abc123", pt(100), pt(200), pt(180), pt(18), EccLevel::H)
            .unwrap()
            .unwrap();
        assert_eq!(qr.backing, Rect::new(pt(82), pt(182), pt(216), pt(216)));
        assert_eq!(qr.symbol_rect(), Rect::new(pt(100), pt(200), pt(180), pt(180)));
        for module in &qr.modules {
            assert!(module.x >= pt(100) && module.right() <= pt(280));
            assert!(module.y >= pt(200) && module.bottom() <= pt(380));
        }
        // Finder pattern: the top-left module is always dark.
        assert_eq!(qr.modules[0].x, pt(100));
        assert_eq!(qr.modules[0].y, pt(200));
    }

    #[test]
    fn emit_writes_vector_rects_not_images() {
        let qr = draw_vector_qr("https://example.com/r/abc123", pt(10), pt(10), pt(144), pt(18), EccLevel::M)
            .unwrap()
            .unwrap();
        let mut canvas = Canvas::new(Size::from_inches(3.0, 3.0));
        qr.emit(&mut canvas);
        let doc = canvas.finish();
        let commands = &doc.pages[0].commands;
        let rects = commands
            .iter()
            .filter(|cmd| matches!(cmd, Command::DrawRect { .. }))
            .count();
        assert_eq!(rects, qr.modules.len() + 1);
        assert!(!commands.iter().any(|cmd| matches!(cmd, Command::DrawImage { .. })));
        assert!(doc.images.is_empty());
    }

    #[test]
    fn legacy_quiet_zone_is_ten_percent() {
        assert_eq!(legacy_quiet_zone(pt(200)), pt(20));
    }

    #[cfg(feature = "qr_verify")]
    #[test]
    fn vector_geometry_decodes_to_payload() {
        for len in [10usize, 20, 64, 120, 200] {
            let payload: String = "https://signs.example.com/r/"
                .chars()
                .chain(('a'..='z').cycle())
                .take(len)
                .collect();
            let qr = draw_vector_qr(&payload, pt(0), pt(0), pt(180), pt(18), EccLevel::H)
                .unwrap()
                .unwrap();
            let px_per_pt = (qr.modules_per_side as f32 * 6.0) / 180.0;
            let (side, pixels) = rasterize(&qr, px_per_pt);
            assert_eq!(decode(side, &pixels).as_deref(), Some(payload.as_str()), "len {len}");
        }
    }
}
