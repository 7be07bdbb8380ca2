//! Shrink-to-fit and wrap-to-fit for sign text.
//!
//! Fitting never fails: text that cannot fit degrades to the minimum size
//! and, for wrapped blocks, is cut at the line budget with an ellipsis.

use crate::canvas::Canvas;
use crate::font::FontRegistry;
use crate::types::{Pt, Rect};

pub const DEFAULT_LEADING_RATIO: f32 = 1.15;
pub const DEFAULT_MIN_SIZE: f32 = 8.0;
pub const ELLIPSIS: &str = "...";

pub const MAX_LINES_ADDRESS: usize = 2;
pub const MAX_LINES_BROKERAGE: usize = 1;
pub const MAX_LINES_CTA: usize = 2;
pub const MAX_LINES_FEATURES: usize = 1;

// Fraction of the font size from the top of a line box down to its baseline.
const BASELINE_RATIO: f32 = 0.8;

/// Anything that can report the advance width of a run of text.
pub trait TextMeasure {
    fn text_width(&self, font: &str, size: Pt, text: &str) -> Pt;
}

impl TextMeasure for FontRegistry {
    fn text_width(&self, font: &str, size: Pt, text: &str) -> Pt {
        if text.is_empty() {
            return Pt::ZERO;
        }
        self.measure_text_width(font, size, text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    Left,
    #[default]
    Center,
    Right,
}

impl Align {
    /// Left edge of a line of `width` placed against `anchor`.
    fn line_x(self, anchor: Pt, width: Pt) -> Pt {
        match self {
            Align::Left => anchor,
            Align::Center => anchor - width / 2,
            Align::Right => anchor - width,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub font: String,
    pub max_width: Pt,
    pub max_height: Option<Pt>,
    pub max_size: Pt,
    pub min_size: Pt,
    pub max_lines: usize,
    pub leading_ratio: f32,
    pub align: Align,
}

impl TextBlock {
    pub fn new(text: impl Into<String>, font: impl Into<String>, max_width: Pt, max_size: Pt) -> Self {
        let max_size = max_size.max(Pt::from_f32(1.0));
        Self {
            text: text.into(),
            font: font.into(),
            max_width,
            max_height: None,
            max_size,
            min_size: Pt::from_f32(DEFAULT_MIN_SIZE).min(max_size),
            max_lines: 1,
            leading_ratio: DEFAULT_LEADING_RATIO,
            align: Align::Center,
        }
    }

    pub fn min_size(mut self, min_size: Pt) -> Self {
        self.min_size = min_size.min(self.max_size);
        self
    }

    pub fn max_height(mut self, max_height: Pt) -> Self {
        self.max_height = Some(max_height);
        self
    }

    pub fn max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines.max(1);
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn leading_ratio(mut self, ratio: f32) -> Self {
        if ratio.is_finite() && ratio > 0.0 {
            self.leading_ratio = ratio;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub size: Pt,
    pub lines: Vec<String>,
    pub line_height: Pt,
    pub total_height: Pt,
}

/// Largest size, stepping down 1pt from `max_size`, at which `text` fits
/// `max_width` on one line. Returns `min_size` when nothing fits.
pub fn fit_single_line(
    measure: &dyn TextMeasure,
    text: &str,
    font: &str,
    max_width: Pt,
    max_size: Pt,
    min_size: Pt,
) -> Pt {
    let text = text.trim();
    if text.is_empty() {
        return max_size;
    }
    let step = Pt::from_i32(1);
    let mut size = max_size;
    while size > min_size {
        if measure.text_width(font, size, text) <= max_width {
            return size;
        }
        size -= step;
    }
    min_size
}

/// Greedy word wrap at a fixed size. Words wider than the line are split by
/// character; output beyond `max_lines` is dropped and the last kept line is
/// shortened until it fits with a trailing ellipsis.
pub fn wrap_text(
    measure: &dyn TextMeasure,
    text: &str,
    font: &str,
    size: Pt,
    max_width: Pt,
    max_lines: usize,
) -> Vec<String> {
    let max_lines = max_lines.max(1);
    let fits = |candidate: &str| measure.text_width(font, size, candidate) <= max_width;

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !fits(word) {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let mut chunk = String::new();
            for ch in word.chars() {
                chunk.push(ch);
                if !fits(&chunk) && chunk.chars().count() > 1 {
                    chunk.pop();
                    lines.push(std::mem::replace(&mut chunk, ch.to_string()));
                }
            }
            current = chunk;
            continue;
        }
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if fits(&candidate) {
            current = candidate;
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let mut kept = last.clone();
            while !kept.is_empty() && !fits(&format!("{}{}", kept.trim_end(), ELLIPSIS)) {
                kept.pop();
            }
            let kept = kept.trim_end();
            let mut tail = ELLIPSIS.to_string();
            // Boxes narrower than the ellipsis get as many dots as fit.
            while kept.is_empty() && !tail.is_empty() && !fits(&tail) {
                tail.pop();
            }
            *last = format!("{}{}", kept, tail);
        }
    }
    lines
}

/// Largest size in `[min_size, max_size]` whose wrapped lines all fit the
/// width and, when bounded, whose stacked height fits `max_height`.
pub fn wrap_and_fit(measure: &dyn TextMeasure, block: &TextBlock) -> FitResult {
    let text = block.text.trim();
    if text.is_empty() {
        return FitResult {
            size: block.max_size,
            lines: Vec::new(),
            line_height: block.max_size * block.leading_ratio,
            total_height: Pt::ZERO,
        };
    }

    let step = Pt::from_i32(1);
    let mut size = block.max_size;
    while size >= block.min_size {
        let lines = wrap_text(measure, text, &block.font, size, block.max_width, block.max_lines);
        let line_height = size * block.leading_ratio;
        let total_height = line_height * (lines.len() as i32);
        let height_ok = block.max_height.is_none_or(|limit| total_height <= limit);
        let width_ok = lines
            .iter()
            .all(|line| measure.text_width(&block.font, size, line) <= block.max_width);
        if height_ok && width_ok {
            return FitResult {
                size,
                lines,
                line_height,
                total_height,
            };
        }
        size -= step;
    }

    let size = block.min_size;
    let lines = wrap_text(measure, text, &block.font, size, block.max_width, block.max_lines);
    let line_height = size * block.leading_ratio;
    FitResult {
        size,
        total_height: line_height * (lines.len() as i32),
        lines,
        line_height,
    }
}

/// Shrinks `block.text` onto one line and draws it with its baseline at
/// `baseline_y`. `anchor_x` is the left edge, center or right edge depending
/// on the block's alignment. Returns the size used.
pub fn draw_fitted_line(
    canvas: &mut Canvas,
    measure: &dyn TextMeasure,
    block: &TextBlock,
    anchor_x: Pt,
    baseline_y: Pt,
) -> Pt {
    let text = block.text.trim();
    if text.is_empty() {
        return block.max_size;
    }
    let size = fit_single_line(
        measure,
        text,
        &block.font,
        block.max_width,
        block.max_size,
        block.min_size,
    );
    let width = measure.text_width(&block.font, size, text);
    canvas.set_font(&block.font, size);
    canvas.draw_string(block.align.line_x(anchor_x, width), baseline_y, text);
    size
}

/// Fits `block` into `rect` and draws it vertically centered.
pub fn draw_fitted_block(
    canvas: &mut Canvas,
    measure: &dyn TextMeasure,
    block: &TextBlock,
    rect: Rect,
) -> FitResult {
    let mut block = block.clone();
    block.max_width = rect.width;
    if block.max_height.is_none() {
        block.max_height = Some(rect.height);
    }
    let fit = wrap_and_fit(measure, &block);
    if fit.lines.is_empty() {
        return fit;
    }
    let anchor_x = match block.align {
        Align::Left => rect.x,
        Align::Center => rect.center_x(),
        Align::Right => rect.right(),
    };
    let top = rect.center_y() - fit.total_height / 2;
    canvas.set_font(&block.font, fit.size);
    for (idx, line) in fit.lines.iter().enumerate() {
        let baseline = top + fit.line_height * (idx as i32) + fit.size * BASELINE_RATIO;
        let width = measure.text_width(&block.font, fit.size, line);
        canvas.draw_string(block.align.line_x(anchor_x, width), baseline, line.clone());
    }
    fit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::types::Size;

    // Every character is half an em wide.
    struct HalfEm;

    impl TextMeasure for HalfEm {
        fn text_width(&self, _font: &str, size: Pt, text: &str) -> Pt {
            (size * 0.5) * (text.chars().count() as i32)
        }
    }

    fn pt(v: i32) -> Pt {
        Pt::from_i32(v)
    }

    #[test]
    fn single_line_picks_largest_fitting_size() {
        // 10 chars at size s are 5s wide.
        let size = fit_single_line(&HalfEm, "ABCDEFGHIJ", "F", pt(200), pt(60), pt(8));
        assert_eq!(size, pt(40));
        assert_eq!(fit_single_line(&HalfEm, "ABCDEFGHIJ", "F", pt(500), pt(60), pt(8)), pt(60));
        assert_eq!(fit_single_line(&HalfEm, "ABCDEFGHIJ", "F", pt(10), pt(60), pt(8)), pt(8));
        assert_eq!(fit_single_line(&HalfEm, "   ", "F", pt(10), pt(60), pt(8)), pt(60));
    }

    #[test]
    fn single_line_is_monotonic_in_width() {
        let mut previous = Pt::from_i32(1000);
        for width in (20..400).rev().step_by(7) {
            let size = fit_single_line(&HalfEm, "123 Maple Street", "F", pt(width), pt(72), pt(8));
            assert!(size <= previous, "width {width}");
            previous = size;
        }
    }

    #[test]
    fn wrap_breaks_on_words() {
        // 10pt text: 5pt per char, 60pt line = 12 chars.
        let lines = wrap_text(&HalfEm, "123 Maple Street Springfield", "F", pt(10), pt(60), 3);
        assert_eq!(lines, vec!["123 Maple", "Street", "Springfield"]);
    }

    #[test]
    fn wrap_splits_overlong_words_by_character() {
        let lines = wrap_text(&HalfEm, "AB CDEFGHIJKLMNOP", "F", pt(10), pt(30), 5);
        assert_eq!(lines, vec!["AB", "CDEFGH", "IJKLMN", "OP"]);
    }

    #[test]
    fn truncated_line_ends_with_ellipsis_and_fits() {
        let max_width = pt(60);
        let lines = wrap_text(
            &HalfEm,
            "one two three four five six seven eight",
            "F",
            pt(10),
            max_width,
            2,
        );
        assert_eq!(lines.len(), 2);
        let last = lines.last().unwrap();
        assert!(last.ends_with(ELLIPSIS));
        assert!(HalfEm.text_width("F", pt(10), last) <= max_width);
    }

    #[test]
    fn ellipsis_shrinks_in_boxes_narrower_than_itself() {
        // 8pt text is 4pt per char: "..." is 12pt, the box 10pt.
        let lines = wrap_text(&HalfEm, "alpha beta gamma", "F", pt(8), pt(10), 1);
        assert_eq!(lines, vec![".."]);

        let block = TextBlock::new("alpha beta gamma", "F", pt(10), pt(12))
            .min_size(pt(8))
            .max_lines(1);
        let fit = wrap_and_fit(&HalfEm, &block);
        assert_eq!(fit.lines, vec!["."]);
        for line in &fit.lines {
            assert!(HalfEm.text_width("F", fit.size, line) <= pt(10));
        }

        let lines = wrap_text(&HalfEm, "alpha", "F", pt(8), pt(3), 1);
        assert_eq!(lines, vec![""]);
    }

    #[test]
    fn wrap_and_fit_returns_largest_feasible_size() {
        let block = TextBlock::new("123 Maple Street Springfield", "F", pt(300), pt(72))
            .min_size(pt(8))
            .max_height(pt(120))
            .max_lines(2);
        let fit = wrap_and_fit(&HalfEm, &block);
        assert!(fit.lines.len() <= 2);
        assert!(fit.total_height <= pt(120));
        for line in &fit.lines {
            assert!(HalfEm.text_width("F", fit.size, line) <= pt(300));
        }
        let bigger = fit.size + pt(1);
        let lines = wrap_text(&HalfEm, &block.text, "F", bigger, pt(300), 2);
        let too_tall = (bigger * 1.15) * (lines.len() as i32) > pt(120);
        let too_wide = lines
            .iter()
            .any(|line| HalfEm.text_width("F", bigger, line) > pt(300));
        assert!(too_tall || too_wide);
    }

    #[test]
    fn empty_block_is_a_no_op() {
        let block = TextBlock::new("  ", "F", pt(100), pt(40));
        let fit = wrap_and_fit(&HalfEm, &block);
        assert!(fit.lines.is_empty());
        assert_eq!(fit.total_height, Pt::ZERO);
        let mut canvas = Canvas::new(Size::from_inches(2.0, 2.0));
        draw_fitted_block(&mut canvas, &HalfEm, &block, Rect::new(pt(0), pt(0), pt(100), pt(50)));
        assert_eq!(canvas.current_command_count(), 0);
    }

    #[test]
    fn centered_line_is_placed_around_anchor() {
        let mut canvas = Canvas::new(Size::from_inches(4.0, 4.0));
        let block = TextBlock::new("ABCD", "Helvetica", pt(200), pt(20));
        let size = draw_fitted_line(&mut canvas, &HalfEm, &block, pt(100), pt(50));
        assert_eq!(size, pt(20));
        let doc = canvas.finish();
        let text_x = doc.pages[0].commands.iter().find_map(|cmd| match cmd {
            Command::DrawString { x, .. } => Some(*x),
            _ => None,
        });
        assert_eq!(text_x, Some(pt(80)));
    }
}
