use std::f64::consts::TAU;

use super::color::{parse_css_color, with_alpha, Rgba, BLACK};
use super::font;
use super::surface::{DrawSurface, Point, Rect, Subpath, TextAlign};

pub const MAX_DRAW_COMMANDS: usize = 20_000;
/// Path points a frame may build or copy into fill/stroke commands.
pub const MAX_PATH_POINTS: usize = 200_000;
const MAX_SAVE_DEPTH: usize = 256;
const MAX_ARC_SEGMENTS: usize = 256;
const DEFAULT_FONT: &str = "10px sans-serif";
const DEFAULT_FONT_PX: f64 = 10.0;

/// 2-D affine transform in canvas order: `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn apply(&self, x: f64, y: f64) -> Point {
        Point::new(
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    fn then_translate(self, tx: f64, ty: f64) -> Self {
        Self {
            e: self.a * tx + self.c * ty + self.e,
            f: self.b * tx + self.d * ty + self.f,
            ..self
        }
    }

    fn then_scale(self, sx: f64, sy: f64) -> Self {
        Self {
            a: self.a * sx,
            b: self.b * sx,
            c: self.c * sy,
            d: self.d * sy,
            ..self
        }
    }

    fn then_rotate(self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            a: self.a * cos + self.c * sin,
            b: self.b * cos + self.d * sin,
            c: self.c * cos - self.a * sin,
            d: self.d * cos - self.b * sin,
            ..self
        }
    }

    fn is_axis_aligned(&self) -> bool {
        self.b == 0.0 && self.c == 0.0
    }

    /// Uniform length scale, used for line widths and font sizes.
    fn length_scale(&self) -> f64 {
        (self.a * self.d - self.b * self.c).abs().sqrt()
    }

    fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.e, self.f]
            .iter()
            .all(|value| value.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct DrawState {
    fill: Rgba,
    fill_source: String,
    stroke: Rgba,
    stroke_source: String,
    line_width: f64,
    global_alpha: f64,
    font: String,
    font_px: f64,
    text_align: TextAlign,
    transform: Transform,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            fill: BLACK,
            fill_source: "#000000".to_string(),
            stroke: BLACK,
            stroke_source: "#000000".to_string(),
            line_width: 1.0,
            global_alpha: 1.0,
            font: DEFAULT_FONT.to_string(),
            font_px: DEFAULT_FONT_PX,
            text_align: TextAlign::Left,
            transform: Transform::IDENTITY,
        }
    }
}

/// A recorded drawing call, already in surface coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    ClearRect(Rect),
    FillRect(Rect, Rgba),
    StrokeRect(Rect, f64, Rgba),
    FillPath(Vec<Vec<Point>>, Rgba),
    StrokePath(Vec<Subpath>, f64, Rgba),
    FillText {
        text: String,
        origin: Point,
        size_px: f64,
        align: TextAlign,
        color: Rgba,
    },
}

/// Canvas-style recorder backing the script `ctx`.
///
/// Drawing state (styles, transform, save stack) survives across frames the
/// way a canvas context does; the command buffer and current path are reset
/// by [`DisplayList::begin_frame`]. Calls with non-finite arguments are
/// dropped, and recording stops at [`MAX_DRAW_COMMANDS`] commands or
/// [`MAX_PATH_POINTS`] path points per frame.
#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    commands: Vec<DrawCommand>,
    state: DrawState,
    saved: Vec<DrawState>,
    path: Vec<Subpath>,
    points_used: usize,
    dropped: usize,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_frame(&mut self) {
        self.commands.clear();
        self.path.clear();
        self.points_used = 0;
        self.dropped = 0;
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Calls rejected this frame because a command or point cap was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn replay(&self, surface: &mut dyn DrawSurface) {
        for command in &self.commands {
            match command {
                DrawCommand::ClearRect(rect) => surface.clear_rect(*rect),
                DrawCommand::FillRect(rect, color) => surface.fill_rect(*rect, *color),
                DrawCommand::StrokeRect(rect, width, color) => {
                    surface.stroke_rect(*rect, *width, *color)
                }
                DrawCommand::FillPath(contours, color) => surface.fill_path(contours, *color),
                DrawCommand::StrokePath(subpaths, width, color) => {
                    surface.stroke_path(subpaths, *width, *color)
                }
                DrawCommand::FillText {
                    text,
                    origin,
                    size_px,
                    align,
                    color,
                } => surface.fill_text(text, *origin, *size_px, *align, *color),
            }
        }
    }

    pub fn fill_style(&self) -> &str {
        &self.state.fill_source
    }

    pub fn stroke_style(&self) -> &str {
        &self.state.stroke_source
    }

    pub fn line_width(&self) -> f64 {
        self.state.line_width
    }

    pub fn global_alpha(&self) -> f64 {
        self.state.global_alpha
    }

    pub fn font(&self) -> &str {
        &self.state.font
    }

    pub fn font_px(&self) -> f64 {
        self.state.font_px
    }

    pub fn text_align(&self) -> TextAlign {
        self.state.text_align
    }

    /// Unparseable colours are ignored and the previous style stays.
    pub fn set_fill_style(&mut self, raw: &str) {
        if let Some(color) = parse_css_color(raw) {
            self.state.fill = color;
            self.state.fill_source = raw.to_string();
        }
    }

    pub fn set_stroke_style(&mut self, raw: &str) {
        if let Some(color) = parse_css_color(raw) {
            self.state.stroke = color;
            self.state.stroke_source = raw.to_string();
        }
    }

    pub fn set_line_width(&mut self, width: f64) {
        if width.is_finite() && width > 0.0 {
            self.state.line_width = width;
        }
    }

    pub fn set_global_alpha(&mut self, alpha: f64) {
        if alpha.is_finite() && (0.0..=1.0).contains(&alpha) {
            self.state.global_alpha = alpha;
        }
    }

    /// Only the pixel size of a CSS font shorthand is honoured.
    pub fn set_font(&mut self, raw: &str) {
        if let Some(px) = font_size_px(raw) {
            self.state.font = raw.to_string();
            self.state.font_px = px;
        }
    }

    pub fn set_text_align(&mut self, raw: &str) {
        if let Some(align) = TextAlign::parse(raw) {
            self.state.text_align = align;
        }
    }

    pub fn save(&mut self) {
        if self.saved.len() < MAX_SAVE_DEPTH {
            self.saved.push(self.state.clone());
        }
    }

    pub fn restore(&mut self) {
        if let Some(state) = self.saved.pop() {
            self.state = state;
        }
    }

    pub fn translate(&mut self, tx: f64, ty: f64) {
        self.update_transform(|t| t.then_translate(tx, ty));
    }

    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.update_transform(|t| t.then_scale(sx, sy));
    }

    pub fn rotate(&mut self, angle: f64) {
        self.update_transform(|t| t.then_rotate(angle));
    }

    pub fn set_transform(&mut self, transform: Transform) {
        if transform.is_finite() {
            self.state.transform = transform;
        }
    }

    pub fn reset_transform(&mut self) {
        self.state.transform = Transform::IDENTITY;
    }

    pub fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        if !all_finite(&[x, y, w, h]) {
            return;
        }
        let rect = self.device_bounds(x, y, w, h);
        self.push(DrawCommand::ClearRect(rect));
    }

    pub fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        if !all_finite(&[x, y, w, h]) {
            return;
        }
        let color = self.paint(self.state.fill);
        if self.state.transform.is_axis_aligned() {
            let rect = self.device_bounds(x, y, w, h);
            self.push(DrawCommand::FillRect(rect, color));
        } else {
            let contour = self.rect_contour(x, y, w, h);
            self.push(DrawCommand::FillPath(vec![contour], color));
        }
    }

    pub fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        if !all_finite(&[x, y, w, h]) {
            return;
        }
        let color = self.paint(self.state.stroke);
        let width = self.device_line_width();
        if self.state.transform.is_axis_aligned() {
            let rect = self.device_bounds(x, y, w, h);
            self.push(DrawCommand::StrokeRect(rect, width, color));
        } else {
            let subpath = Subpath {
                points: self.rect_contour(x, y, w, h),
                closed: true,
            };
            self.push(DrawCommand::StrokePath(vec![subpath], width, color));
        }
    }

    pub fn begin_path(&mut self) {
        self.path.clear();
    }

    pub fn close_path(&mut self) {
        let Some(current) = self.path.last_mut() else {
            return;
        };
        if current.points.is_empty() {
            return;
        }
        let start = current.points[0];
        if !self.reserve_points(1) {
            return;
        }
        if let Some(current) = self.path.last_mut() {
            current.closed = true;
        }
        self.path.push(Subpath {
            points: vec![start],
            closed: false,
        });
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        if !all_finite(&[x, y]) {
            return;
        }
        if !self.reserve_points(1) {
            return;
        }
        let point = self.state.transform.apply(x, y);
        self.path.push(Subpath {
            points: vec![point],
            closed: false,
        });
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        if !all_finite(&[x, y]) {
            return;
        }
        let point = self.state.transform.apply(x, y);
        self.extend_path(point);
    }

    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        if !all_finite(&[x, y, w, h]) {
            return;
        }
        let points = self.rect_contour(x, y, w, h);
        if !self.reserve_points(points.len() + 1) {
            return;
        }
        let start = points[0];
        self.path.push(Subpath {
            points,
            closed: true,
        });
        self.path.push(Subpath {
            points: vec![start],
            closed: false,
        });
    }

    /// Appends a circular arc; like a canvas, it is joined to the current
    /// subpath with a straight line.
    pub fn arc(
        &mut self,
        cx: f64,
        cy: f64,
        radius: f64,
        start: f64,
        end: f64,
        counter_clockwise: bool,
    ) {
        if !all_finite(&[cx, cy, radius, start, end]) || radius < 0.0 {
            return;
        }

        let sweep = arc_sweep(start, end, counter_clockwise);
        let device_radius = radius * self.state.transform.length_scale();
        let segments = ((sweep.abs() * device_radius / 4.0).ceil() as usize).clamp(8, MAX_ARC_SEGMENTS);
        if !self.reserve_points(segments + 1) {
            return;
        }
        for step in 0..=segments {
            let angle = start + sweep * step as f64 / segments as f64;
            let point = self
                .state
                .transform
                .apply(cx + radius * angle.cos(), cy + radius * angle.sin());
            self.append_point(point);
        }
    }

    pub fn fill(&mut self) {
        let filled = |subpath: &&Subpath| subpath.points.len() >= 3;
        let count: usize = self.path.iter().filter(filled).map(|subpath| subpath.points.len()).sum();
        if count == 0 || !self.reserve_points(count) {
            return;
        }
        let contours = self
            .path
            .iter()
            .filter(filled)
            .map(|subpath| subpath.points.clone())
            .collect::<Vec<_>>();
        let color = self.paint(self.state.fill);
        self.push(DrawCommand::FillPath(contours, color));
    }

    pub fn stroke(&mut self) {
        let stroked = |subpath: &&Subpath| subpath.points.len() >= 2;
        let count: usize = self.path.iter().filter(stroked).map(|subpath| subpath.points.len()).sum();
        if count == 0 || !self.reserve_points(count) {
            return;
        }
        let subpaths = self
            .path
            .iter()
            .filter(stroked)
            .cloned()
            .collect::<Vec<_>>();
        let color = self.paint(self.state.stroke);
        let width = self.device_line_width();
        self.push(DrawCommand::StrokePath(subpaths, width, color));
    }

    pub fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        if !all_finite(&[x, y]) || text.is_empty() {
            return;
        }
        let command = DrawCommand::FillText {
            text: font::clip_text(text).to_string(),
            origin: self.state.transform.apply(x, y),
            size_px: self.state.font_px * self.state.transform.length_scale(),
            align: self.state.text_align,
            color: self.paint(self.state.fill),
        };
        self.push(command);
    }

    fn push(&mut self, command: DrawCommand) {
        if self.commands.len() >= MAX_DRAW_COMMANDS {
            self.dropped += 1;
            return;
        }
        self.commands.push(command);
    }

    fn reserve_points(&mut self, count: usize) -> bool {
        match self.points_used.checked_add(count) {
            Some(total) if total <= MAX_PATH_POINTS => {
                self.points_used = total;
                true
            }
            _ => {
                self.dropped += 1;
                false
            }
        }
    }

    fn extend_path(&mut self, point: Point) {
        if self.reserve_points(1) {
            self.append_point(point);
        }
    }

    fn append_point(&mut self, point: Point) {
        match self.path.last_mut() {
            Some(current) if !current.closed => current.points.push(point),
            _ => self.path.push(Subpath {
                points: vec![point],
                closed: false,
            }),
        }
    }

    fn update_transform(&mut self, update: impl FnOnce(Transform) -> Transform) {
        let next = update(self.state.transform);
        if next.is_finite() {
            self.state.transform = next;
        }
    }

    fn paint(&self, color: Rgba) -> Rgba {
        with_alpha(color, self.state.global_alpha)
    }

    fn device_line_width(&self) -> f64 {
        self.state.line_width * self.state.transform.length_scale()
    }

    fn device_bounds(&self, x: f64, y: f64, w: f64, h: f64) -> Rect {
        let transform = &self.state.transform;
        Rect::from_corners(transform.apply(x, y), transform.apply(x + w, y + h))
    }

    fn rect_contour(&self, x: f64, y: f64, w: f64, h: f64) -> Vec<Point> {
        let transform = &self.state.transform;
        vec![
            transform.apply(x, y),
            transform.apply(x + w, y),
            transform.apply(x + w, y + h),
            transform.apply(x, y + h),
        ]
    }
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|value| value.is_finite())
}

fn arc_sweep(start: f64, end: f64, counter_clockwise: bool) -> f64 {
    if counter_clockwise {
        let delta = start - end;
        if delta >= TAU {
            -TAU
        } else {
            -delta.rem_euclid(TAU)
        }
    } else {
        let delta = end - start;
        if delta >= TAU {
            TAU
        } else {
            delta.rem_euclid(TAU)
        }
    }
}

fn font_size_px(raw: &str) -> Option<f64> {
    raw.split_whitespace()
        .filter_map(|token| token.split('/').next())
        .filter_map(|token| token.strip_suffix("px"))
        .filter_map(|number| number.parse::<f64>().ok())
        .find(|px| px.is_finite() && *px > 0.0)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use super::*;
    use crate::draw::surface::{RecordingSurface, SurfaceCall};

    fn rect(x: f64, y: f64, width: f64, height: f64) -> Rect {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn fill_rect_records_current_fill_style() {
        let mut list = DisplayList::new();
        list.set_fill_style("#ff0000");
        list.fill_rect(1.0, 2.0, 3.0, 4.0);
        assert_eq!(
            list.commands(),
            &[DrawCommand::FillRect(rect(1.0, 2.0, 3.0, 4.0), [255, 0, 0, 255])]
        );
    }

    #[test]
    fn invalid_colour_keeps_previous_style() {
        let mut list = DisplayList::new();
        list.set_fill_style("#00ff00");
        list.set_fill_style("not-a-colour");
        assert_eq!(list.fill_style(), "#00ff00");
        list.fill_rect(0.0, 0.0, 1.0, 1.0);
        assert_eq!(
            list.commands(),
            &[DrawCommand::FillRect(rect(0.0, 0.0, 1.0, 1.0), [0, 255, 0, 255])]
        );
    }

    #[test]
    fn non_finite_coordinates_are_dropped() {
        let mut list = DisplayList::new();
        list.fill_rect(f64::NAN, 0.0, 10.0, 10.0);
        list.stroke_rect(0.0, f64::INFINITY, 10.0, 10.0);
        list.move_to(f64::NAN, 1.0);
        list.fill_text("hi", 0.0, f64::NEG_INFINITY);
        list.arc(0.0, 0.0, f64::NAN, 0.0, PI, false);
        assert!(list.commands().is_empty());
    }

    #[test]
    fn negative_sizes_normalise_to_positive_rects() {
        let mut list = DisplayList::new();
        list.clear_rect(10.0, 10.0, -4.0, -6.0);
        assert_eq!(list.commands(), &[DrawCommand::ClearRect(rect(6.0, 4.0, 4.0, 6.0))]);
    }

    #[test]
    fn save_and_restore_round_trip_styles_and_transform() {
        let mut list = DisplayList::new();
        list.set_fill_style("red");
        list.save();
        list.set_fill_style("blue");
        list.translate(5.0, 5.0);
        list.restore();
        list.fill_rect(0.0, 0.0, 1.0, 1.0);
        assert_eq!(
            list.commands(),
            &[DrawCommand::FillRect(rect(0.0, 0.0, 1.0, 1.0), [255, 0, 0, 255])]
        );
        list.restore();
        assert_eq!(list.fill_style(), "red");
    }

    #[test]
    fn translate_and_scale_are_baked_into_rects() {
        let mut list = DisplayList::new();
        list.translate(10.0, 20.0);
        list.scale(2.0, 3.0);
        list.set_line_width(2.0);
        list.fill_rect(1.0, 1.0, 2.0, 2.0);
        assert_eq!(
            list.commands()[0],
            DrawCommand::FillRect(rect(12.0, 23.0, 4.0, 6.0), BLACK)
        );
        list.reset_transform();
        list.fill_rect(1.0, 1.0, 2.0, 2.0);
        assert_eq!(list.commands()[1], DrawCommand::FillRect(rect(1.0, 1.0, 2.0, 2.0), BLACK));
    }

    #[test]
    fn rotation_turns_rects_into_paths() {
        let mut list = DisplayList::new();
        list.rotate(FRAC_PI_2);
        list.fill_rect(0.0, 0.0, 2.0, 1.0);
        let DrawCommand::FillPath(contours, _) = &list.commands()[0] else {
            panic!("expected a path, got {:?}", list.commands()[0]);
        };
        let corner = contours[0][1];
        assert!(corner.x.abs() < 1e-9);
        assert!((corner.y - 2.0).abs() < 1e-9);
    }

    #[test]
    fn global_alpha_scales_paint() {
        let mut list = DisplayList::new();
        list.set_fill_style("#ffffff");
        list.set_global_alpha(0.5);
        list.set_global_alpha(3.0);
        list.fill_rect(0.0, 0.0, 1.0, 1.0);
        assert_eq!(
            list.commands(),
            &[DrawCommand::FillRect(rect(0.0, 0.0, 1.0, 1.0), [255, 255, 255, 128])]
        );
    }

    #[test]
    fn path_fill_collects_closed_and_open_contours() {
        let mut list = DisplayList::new();
        list.begin_path();
        list.move_to(0.0, 0.0);
        list.line_to(10.0, 0.0);
        list.line_to(10.0, 10.0);
        list.close_path();
        list.rect(20.0, 20.0, 5.0, 5.0);
        list.fill();
        let DrawCommand::FillPath(contours, _) = &list.commands()[0] else {
            panic!("expected a path");
        };
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].len(), 3);
        assert_eq!(contours[1].len(), 4);
    }

    #[test]
    fn full_circle_arc_starts_and_ends_at_the_same_point() {
        let mut list = DisplayList::new();
        list.begin_path();
        list.arc(50.0, 50.0, 10.0, 0.0, 2.0 * PI, false);
        list.stroke();
        let DrawCommand::StrokePath(subpaths, width, _) = &list.commands()[0] else {
            panic!("expected a stroke");
        };
        let points = &subpaths[0].points;
        assert_eq!(*width, 1.0);
        assert!(points.len() >= 9);
        let first = points[0];
        let last = points[points.len() - 1];
        assert!((first.x - 60.0).abs() < 1e-9 && (first.y - 50.0).abs() < 1e-9);
        assert!((last.x - first.x).abs() < 1e-9 && (last.y - first.y).abs() < 1e-9);
    }

    #[test]
    fn arc_sweep_matches_canvas_direction_rules() {
        assert!((arc_sweep(0.0, FRAC_PI_2, false) - FRAC_PI_2).abs() < 1e-12);
        assert!((arc_sweep(0.0, FRAC_PI_2, true) + 3.0 * FRAC_PI_2).abs() < 1e-12);
        assert_eq!(arc_sweep(0.0, 10.0, false), TAU);
        assert_eq!(arc_sweep(1.0, 1.0, false), 0.0);
    }

    #[test]
    fn font_size_is_read_from_shorthand() {
        assert_eq!(font_size_px("bold 24px monospace"), Some(24.0));
        assert_eq!(font_size_px("12px/1.5 Arial"), Some(12.0));
        assert_eq!(font_size_px("large serif"), None);

        let mut list = DisplayList::new();
        list.set_font("garbage");
        assert_eq!(list.font(), DEFAULT_FONT);
        list.set_font("20px Arial");
        list.set_text_align("center");
        list.fill_text("score", 5.0, 6.0);
        assert_eq!(
            list.commands()[0],
            DrawCommand::FillText {
                text: "score".to_string(),
                origin: Point::new(5.0, 6.0),
                size_px: 20.0,
                align: TextAlign::Center,
                color: BLACK,
            }
        );
    }

    #[test]
    fn command_cap_drops_the_overflow() {
        let mut list = DisplayList::new();
        for _ in 0..MAX_DRAW_COMMANDS + 5 {
            list.fill_rect(0.0, 0.0, 1.0, 1.0);
        }
        assert_eq!(list.commands().len(), MAX_DRAW_COMMANDS);
        assert_eq!(list.dropped(), 5);

        list.begin_frame();
        assert!(list.commands().is_empty());
        assert_eq!(list.dropped(), 0);
    }

    #[test]
    fn path_points_are_capped_per_frame() {
        fn recorded_points(list: &DisplayList) -> usize {
            let in_commands: usize = list
                .commands()
                .iter()
                .map(|command| match command {
                    DrawCommand::FillPath(contours, _) => contours.iter().map(Vec::len).sum(),
                    DrawCommand::StrokePath(subpaths, _, _) => {
                        subpaths.iter().map(|subpath| subpath.points.len()).sum()
                    }
                    _ => 0,
                })
                .sum();
            in_commands + list.path.iter().map(|subpath| subpath.points.len()).sum::<usize>()
        }

        let mut list = DisplayList::new();
        for _ in 0..2000 {
            list.arc(50.0, 50.0, 100.0, 0.0, TAU, false);
            list.fill();
        }
        assert!(recorded_points(&list) <= MAX_PATH_POINTS);
        assert!(list.dropped() > 0);

        list.begin_frame();
        assert_eq!(list.dropped(), 0);
        list.move_to(0.0, 0.0);
        list.line_to(4.0, 0.0);
        list.line_to(4.0, 4.0);
        list.fill();
        assert_eq!(list.commands().len(), 1);
    }

    #[test]
    fn long_text_is_clipped_when_recorded() {
        let mut list = DisplayList::new();
        list.fill_text(&"A".repeat(font::MAX_TEXT_CHARS * 3), 0.0, 10.0);
        let DrawCommand::FillText { text, .. } = &list.commands()[0] else {
            panic!("expected text");
        };
        assert_eq!(text.chars().count(), font::MAX_TEXT_CHARS);
    }

    #[test]
    fn replay_forwards_every_command_in_order() {
        let mut list = DisplayList::new();
        list.clear_rect(0.0, 0.0, 4.0, 4.0);
        list.set_stroke_style("#0000ff");
        list.stroke_rect(1.0, 1.0, 2.0, 2.0);
        list.fill_text("A", 0.0, 3.0);

        let mut surface = RecordingSurface::new(4, 4);
        list.replay(&mut surface);
        assert_eq!(
            surface.calls(),
            &[
                SurfaceCall::ClearRect(rect(0.0, 0.0, 4.0, 4.0)),
                SurfaceCall::StrokeRect(rect(1.0, 1.0, 2.0, 2.0), 1.0, [0, 0, 255, 255]),
                SurfaceCall::FillText(
                    "A".to_string(),
                    Point::new(0.0, 3.0),
                    DEFAULT_FONT_PX,
                    TextAlign::Left,
                    BLACK
                ),
            ]
        );
    }
}
