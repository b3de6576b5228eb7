use super::color::Rgba;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in surface pixels. Width and height are never negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    /// Builds a rectangle from any two opposite corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subpath {
    pub points: Vec<Point>,
    pub closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    /// Canvas `textAlign` values; `start`/`end` assume left-to-right text.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" | "start" => Some(TextAlign::Left),
            "center" => Some(TextAlign::Center),
            "right" | "end" => Some(TextAlign::Right),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }
}

/// Host-provided drawing target. Coordinates arrive already transformed into
/// surface pixels and guaranteed finite.
pub trait DrawSurface {
    fn size(&self) -> (u32, u32);
    fn clear_rect(&mut self, rect: Rect);
    fn fill_rect(&mut self, rect: Rect, color: Rgba);
    fn stroke_rect(&mut self, rect: Rect, line_width: f64, color: Rgba);
    /// Fills the union of `contours` with the nonzero winding rule.
    fn fill_path(&mut self, contours: &[Vec<Point>], color: Rgba);
    fn stroke_path(&mut self, subpaths: &[Subpath], line_width: f64, color: Rgba);
    /// `origin.y` is the alphabetic baseline.
    fn fill_text(&mut self, text: &str, origin: Point, size_px: f64, align: TextAlign, color: Rgba);
}

/// One call received by a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    ClearRect(Rect),
    FillRect(Rect, Rgba),
    StrokeRect(Rect, f64, Rgba),
    FillPath(Vec<Vec<Point>>, Rgba),
    StrokePath(Vec<Subpath>, f64, Rgba),
    FillText(String, Point, f64, TextAlign, Rgba),
}

/// Surface that only remembers what it was asked to draw. Used headless.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    calls: Vec<SurfaceCall>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<SurfaceCall> {
        std::mem::take(&mut self.calls)
    }
}

impl DrawSurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear_rect(&mut self, rect: Rect) {
        self.calls.push(SurfaceCall::ClearRect(rect));
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        self.calls.push(SurfaceCall::FillRect(rect, color));
    }

    fn stroke_rect(&mut self, rect: Rect, line_width: f64, color: Rgba) {
        self.calls.push(SurfaceCall::StrokeRect(rect, line_width, color));
    }

    fn fill_path(&mut self, contours: &[Vec<Point>], color: Rgba) {
        self.calls.push(SurfaceCall::FillPath(contours.to_vec(), color));
    }

    fn stroke_path(&mut self, subpaths: &[Subpath], line_width: f64, color: Rgba) {
        self.calls
            .push(SurfaceCall::StrokePath(subpaths.to_vec(), line_width, color));
    }

    fn fill_text(&mut self, text: &str, origin: Point, size_px: f64, align: TextAlign, color: Rgba) {
        self.calls.push(SurfaceCall::FillText(
            text.to_string(),
            origin,
            size_px,
            align,
            color,
        ));
    }
}
