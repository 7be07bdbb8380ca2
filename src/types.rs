use fixed::types::I32F32;

pub const POINTS_PER_INCH: f32 = 72.0;

/// Fixed-point length in PDF points, quantized to 1/1000 pt so that equal
/// inputs always serialize to identical bytes.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Pt(I32F32);

impl Pt {
    pub const ZERO: Pt = Pt(I32F32::from_bits(0));

    pub fn from_f32(value: f32) -> Pt {
        if !value.is_finite() {
            return Pt::ZERO;
        }
        let milli = (value as f64 * 1000.0).round();
        let milli = milli.clamp(i64::MIN as f64, i64::MAX as f64) as i64;
        Pt::from_milli_i64(milli)
    }

    pub fn from_i32(value: i32) -> Pt {
        Pt::from_milli_i64((value as i64) * 1000)
    }

    pub fn from_inches(inches: f32) -> Pt {
        Pt::from_f32(inches * POINTS_PER_INCH)
    }

    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    pub fn to_inches(self) -> f32 {
        self.to_f32() / POINTS_PER_INCH
    }

    pub fn to_milli_i64(self) -> i64 {
        let bits = self.0.to_bits() as i128;
        let denom = 1i128 << 32;
        let scaled = bits * 1000;
        let adj = if scaled >= 0 { denom / 2 } else { -denom / 2 };
        let milli = (scaled + adj) / denom;
        milli.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn max(self, other: Pt) -> Pt {
        if self >= other { self } else { other }
    }

    pub fn min(self, other: Pt) -> Pt {
        if self <= other { self } else { other }
    }

    pub fn clamp(self, lo: Pt, hi: Pt) -> Pt {
        self.max(lo).min(hi)
    }

    pub fn abs(self) -> Pt {
        if self.to_milli_i64() < 0 { -self } else { self }
    }

    pub fn mul_ratio(self, num: i32, denom: i32) -> Pt {
        if denom == 0 {
            return Pt::ZERO;
        }
        let milli = self.to_milli_i64() as i128;
        let value = div_round_i128(milli.saturating_mul(num as i128), denom as i128);
        Pt::from_milli_i128(value)
    }

    pub fn from_milli_i64(milli: i64) -> Pt {
        Pt::from_milli_i128(milli as i128)
    }

    fn from_milli_i128(milli: i128) -> Pt {
        let denom = 1i128 << 32;
        let adj = if milli >= 0 { 500 } else { -500 };
        let bits = (milli * denom + adj) / 1000;
        let bits = bits.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Pt(I32F32::from_bits(bits))
    }
}

impl std::ops::Add for Pt {
    type Output = Pt;
    fn add(self, rhs: Pt) -> Pt {
        Pt::from_milli_i128(self.to_milli_i64() as i128 + rhs.to_milli_i64() as i128)
    }
}

impl std::ops::AddAssign for Pt {
    fn add_assign(&mut self, rhs: Pt) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Pt {
    type Output = Pt;
    fn sub(self, rhs: Pt) -> Pt {
        Pt::from_milli_i128(self.to_milli_i64() as i128 - rhs.to_milli_i64() as i128)
    }
}

impl std::ops::SubAssign for Pt {
    fn sub_assign(&mut self, rhs: Pt) {
        *self = *self - rhs;
    }
}

impl std::ops::Mul<i32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: i32) -> Pt {
        let milli = self.to_milli_i64() as i128;
        Pt::from_milli_i128(milli.saturating_mul(rhs as i128))
    }
}

impl std::ops::Div<i32> for Pt {
    type Output = Pt;
    fn div(self, rhs: i32) -> Pt {
        if rhs == 0 {
            Pt::ZERO
        } else {
            let milli = self.to_milli_i64() as i128;
            Pt::from_milli_i128(div_round_i128(milli, rhs as i128))
        }
    }
}

impl std::ops::Mul<f32> for Pt {
    type Output = Pt;
    fn mul(self, rhs: f32) -> Pt {
        if !rhs.is_finite() {
            return Pt::ZERO;
        }
        Pt::from_f32(self.to_f32() * rhs)
    }
}

impl std::ops::Div<f32> for Pt {
    type Output = Pt;
    fn div(self, rhs: f32) -> Pt {
        if rhs == 0.0 || !rhs.is_finite() {
            Pt::ZERO
        } else {
            Pt::from_f32(self.to_f32() / rhs)
        }
    }
}

impl std::ops::Neg for Pt {
    type Output = Pt;
    fn neg(self) -> Pt {
        Pt::from_milli_i128(-(self.to_milli_i64() as i128))
    }
}

impl std::iter::Sum for Pt {
    fn sum<I: Iterator<Item = Pt>>(iter: I) -> Pt {
        iter.fold(Pt::ZERO, |acc, v| acc + v)
    }
}

fn div_round_i128(num: i128, den: i128) -> i128 {
    if den == 0 {
        return 0;
    }
    let den_abs = den.abs();
    if num >= 0 {
        (num + (den_abs / 2)) / den
    } else {
        -(((-num) + (den_abs / 2)) / den)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: Pt,
    pub height: Pt,
}

impl Size {
    pub fn new(width: Pt, height: Pt) -> Self {
        Self { width, height }
    }

    pub fn from_inches(width_in: f32, height_in: f32) -> Self {
        Self {
            width: Pt::from_inches(width_in),
            height: Pt::from_inches(height_in),
        }
    }

    pub fn is_landscape(self) -> bool {
        self.width > self.height
    }
}

/// Axis-aligned box in top-left-origin page space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: Pt,
    pub y: Pt,
    pub width: Pt,
    pub height: Pt,
}

impl Rect {
    pub fn new(x: Pt, y: Pt, width: Pt, height: Pt) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn square(x: Pt, y: Pt, side: Pt) -> Self {
        Self::new(x, y, side, side)
    }

    pub fn right(self) -> Pt {
        self.x + self.width
    }

    pub fn bottom(self) -> Pt {
        self.y + self.height
    }

    pub fn center_x(self) -> Pt {
        self.x + self.width / 2
    }

    pub fn center_y(self) -> Pt {
        self.y + self.height / 2
    }

    pub fn inset(self, amount: Pt) -> Self {
        let width = (self.width - amount * 2).max(Pt::ZERO);
        let height = (self.height - amount * 2).max(Pt::ZERO);
        Self::new(self.x + amount, self.y + amount, width, height)
    }

    /// Smallest distance from this box to the edge of `outer`. Negative when
    /// the box pokes outside.
    pub fn clearance_within(self, outer: Rect) -> Pt {
        let left = self.x - outer.x;
        let top = self.y - outer.y;
        let right = outer.right() - self.right();
        let bottom = outer.bottom() - self.bottom();
        left.min(top).min(right).min(bottom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    /// Parses `#rgb` or `#rrggbb` (leading `#` optional).
    pub fn from_hex(raw: &str) -> Option<Self> {
        let hex = raw.trim().trim_start_matches('#');
        if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|ch| [ch, ch]).collect(),
            6 => hex.to_string(),
            _ => return None,
        };
        let channel = |idx: usize| u8::from_str_radix(&expanded[idx..idx + 2], 16).ok();
        Some(Color::rgb8(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(self) -> String {
        let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", to_u8(self.r), to_u8(self.g), to_u8(self.b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inches_convert_exactly_for_sign_pages() {
        let size = Size::from_inches(18.25, 24.25);
        assert_eq!(size.width.to_milli_i64(), 1_314_000);
        assert_eq!(size.height.to_milli_i64(), 1_746_000);
        assert!(!size.is_landscape());
    }

    #[test]
    fn hex_colors_parse_short_and_long_forms() {
        assert_eq!(Color::from_hex("#0077ff").map(|c| c.to_hex()), Some("#0077ff".to_string()));
        assert_eq!(Color::from_hex("fff"), Some(Color::WHITE));
        assert_eq!(Color::from_hex("#12345"), None);
        assert_eq!(Color::from_hex("#zzzzzz"), None);
    }

    #[test]
    fn clearance_is_negative_outside() {
        let outer = Rect::new(Pt::ZERO, Pt::ZERO, Pt::from_i32(100), Pt::from_i32(100));
        let inner = Rect::square(Pt::from_i32(10), Pt::from_i32(20), Pt::from_i32(50));
        assert_eq!(inner.clearance_within(outer), Pt::from_i32(10));
        let outside = Rect::square(Pt::from_i32(-5), Pt::from_i32(0), Pt::from_i32(10));
        assert!(outside.clearance_within(outer) < Pt::ZERO);
    }
}
