use crate::types::{Color, Pt, Rect, Size};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

// Cubic approximation constant for a quarter circle.
const KAPPA: f32 = 0.552_284_8;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    // Offsets subsequent drawing in top-left page space.
    Translate(Pt, Pt),
    // Non-rendered metadata used for placement reporting. Ignored by the PDF renderer.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFontName(String),
    SetFontSize(Pt),
    // Clip to the current path (W n). The current path is consumed.
    ClipPath,
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    CurveTo {
        x1: Pt,
        y1: Pt,
        x2: Pt,
        y2: Pt,
        x: Pt,
        y: Pt,
    },
    ClosePath,
    Fill,
    Stroke,
    FillStroke,
    // `y` is the text baseline.
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
    /// Encoded image bytes keyed by the resource id used in `DrawImage`.
    pub images: BTreeMap<String, Arc<Vec<u8>>>,
}

impl Document {
    pub fn image(&self, resource_id: &str) -> Option<&[u8]> {
        self.images.get(resource_id).map(|bytes| bytes.as_slice())
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_size: Pt,
    font_name: String,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font_size: Pt::from_f32(12.0),
            font_name: "Helvetica".to_string(),
        }
    }
}

/// Records drawing commands page by page. Coordinates are top-left origin;
/// the PDF and raster backends flip them.
pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
    images: BTreeMap<String, Arc<Vec<u8>>>,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::new(),
            state_stack: Vec::new(),
            current_state: GraphicsState::default(),
            images: BTreeMap::new(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.current.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.current.commands.push(Command::RestoreState);
        }
    }

    pub fn translate(&mut self, x: Pt, y: Pt) {
        self.current.commands.push(Command::Translate(x, y));
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.current.commands.push(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.current.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.current.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.current_state.line_width == width {
            return;
        }
        self.current_state.line_width = width;
        self.current.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_font(&mut self, name: &str, size: Pt) {
        if self.current_state.font_name != name {
            self.current_state.font_name = name.to_string();
            self.current
                .commands
                .push(Command::SetFontName(self.current_state.font_name.clone()));
        }
        if self.current_state.font_size != size {
            self.current_state.font_size = size;
            self.current.commands.push(Command::SetFontSize(size));
        }
    }

    pub fn clip_path(&mut self) {
        self.current.commands.push(Command::ClipPath);
    }

    pub fn move_to(&mut self, x: Pt, y: Pt) {
        self.current.commands.push(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: Pt, y: Pt) {
        self.current.commands.push(Command::LineTo { x, y });
    }

    pub fn curve_to(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt, x: Pt, y: Pt) {
        self.current.commands.push(Command::CurveTo {
            x1,
            y1,
            x2,
            y2,
            x,
            y,
        });
    }

    pub fn close_path(&mut self) {
        self.current.commands.push(Command::ClosePath);
    }

    pub fn fill(&mut self) {
        self.current.commands.push(Command::Fill);
    }

    pub fn stroke(&mut self) {
        self.current.commands.push(Command::Stroke);
    }

    pub fn fill_stroke(&mut self) {
        self.current.commands.push(Command::FillStroke);
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.current.commands.push(Command::DrawString { x, y, text });
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::DrawRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.set_fill_color(color);
        self.draw_rect(rect.x, rect.y, rect.width, rect.height);
    }

    pub fn line(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt) {
        self.move_to(x1, y1);
        self.line_to(x2, y2);
        self.stroke();
    }

    /// Appends a closed circle path; the caller decides fill, stroke or clip.
    pub fn circle_path(&mut self, cx: Pt, cy: Pt, r: Pt) {
        let k = r * KAPPA;
        self.move_to(cx + r, cy);
        self.curve_to(cx + r, cy + k, cx + k, cy + r, cx, cy + r);
        self.curve_to(cx - k, cy + r, cx - r, cy + k, cx - r, cy);
        self.curve_to(cx - r, cy - k, cx - k, cy - r, cx, cy - r);
        self.curve_to(cx + k, cy - r, cx + r, cy - k, cx + r, cy);
        self.close_path();
    }

    pub fn round_rect_path(&mut self, rect: Rect, radius: Pt) {
        let r = radius
            .max(Pt::ZERO)
            .min(rect.width / 2)
            .min(rect.height / 2);
        let k = r * KAPPA;
        let (x0, y0, x1, y1) = (rect.x, rect.y, rect.right(), rect.bottom());
        self.move_to(x0 + r, y0);
        self.line_to(x1 - r, y0);
        self.curve_to(x1 - r + k, y0, x1, y0 + r - k, x1, y0 + r);
        self.line_to(x1, y1 - r);
        self.curve_to(x1, y1 - r + k, x1 - r + k, y1, x1 - r, y1);
        self.line_to(x0 + r, y1);
        self.curve_to(x0 + r - k, y1, x0, y1 - r + k, x0, y1 - r);
        self.line_to(x0, y0 + r);
        self.curve_to(x0, y0 + r - k, x0 + r - k, y0, x0 + r, y0);
        self.close_path();
    }

    /// Stores encoded image bytes once and returns the resource id to draw them with.
    pub fn register_image(&mut self, bytes: Arc<Vec<u8>>) -> String {
        let digest = Sha256::digest(bytes.as_slice());
        let mut id = String::from("img-");
        for byte in digest.iter().take(8) {
            id.push_str(&format!("{:02x}", byte));
        }
        self.images.entry(id.clone()).or_insert(bytes);
        id
    }

    pub fn draw_image(&mut self, rect: Rect, resource_id: impl Into<String>) {
        self.current.commands.push(Command::DrawImage {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            resource_id: resource_id.into(),
        });
    }

    pub fn show_page(&mut self) {
        let current = std::mem::replace(&mut self.current, Page::new());
        self.pages.push(current);
        self.state_stack.clear();
        self.current_state = GraphicsState::default();
    }

    pub fn current_command_count(&self) -> usize {
        self.current.commands.len()
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
            images: self.images,
        }
    }
}
