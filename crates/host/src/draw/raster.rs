use super::color::{Rgba, BLACK};
use super::font;
use super::surface::{DrawSurface, Point, Rect, Subpath, TextAlign};

const STROKE_JOIN_SEGMENTS: usize = 8;
const MAX_TEXT_COORDINATE: f64 = 1.0e7;

/// Software [`DrawSurface`] over an RGBA8 frame, row-major with no padding.
/// Every write is clipped; out-of-range geometry is simply not drawn.
pub struct RasterSurface<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> RasterSurface<'a> {
    pub fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    pub fn fill(&mut self, color: Rgba) {
        for chunk in self.frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&color);
        }
    }
}

impl DrawSurface for RasterSurface<'_> {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear_rect(&mut self, rect: Rect) {
        let (x0, y0, x1, y1) = pixel_span(rect, self.width, self.height);
        for y in y0..y1 {
            for x in x0..x1 {
                write_pixel(self.frame, self.width, self.height, x, y, BLACK);
            }
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        let (x0, y0, x1, y1) = pixel_span(rect, self.width, self.height);
        fill_rect_px(self.frame, self.width, self.height, x0, y0, x1 - x0, y1 - y0, color);
    }

    fn stroke_rect(&mut self, rect: Rect, line_width: f64, color: Rgba) {
        let outline = Subpath {
            points: vec![
                Point::new(rect.x, rect.y),
                Point::new(rect.right(), rect.y),
                Point::new(rect.right(), rect.bottom()),
                Point::new(rect.x, rect.bottom()),
            ],
            closed: true,
        };
        self.stroke_path(&[outline], line_width, color);
    }

    fn fill_path(&mut self, contours: &[Vec<Point>], color: Rgba) {
        fill_nonzero(self.frame, self.width, self.height, contours, color);
    }

    fn stroke_path(&mut self, subpaths: &[Subpath], line_width: f64, color: Rgba) {
        let contours = stroke_outline(subpaths, line_width);
        fill_nonzero(self.frame, self.width, self.height, &contours, color);
    }

    fn fill_text(&mut self, text: &str, origin: Point, size_px: f64, align: TextAlign, color: Rgba) {
        if origin.x.abs() > MAX_TEXT_COORDINATE || origin.y.abs() > MAX_TEXT_COORDINATE {
            return;
        }
        let text = font::clip_text(text);
        let scale = font::scale_for_size(size_px);
        let width = font::text_width(text, scale);
        let anchor = origin.x.round() as i32;
        let left = match align {
            TextAlign::Left => anchor,
            TextAlign::Center => anchor.saturating_sub(width / 2),
            TextAlign::Right => anchor.saturating_sub(width),
        };
        let top = (origin.y.round() as i32).saturating_sub(font::GLYPH_HEIGHT * scale);
        draw_text_px(self.frame, self.width, self.height, left, top, text, scale, color);
    }
}

/// Pixel-centre coverage of a rect, clipped to the frame: `(x0, y0, x1, y1)`,
/// end-exclusive.
fn pixel_span(rect: Rect, width: u32, height: u32) -> (i32, i32, i32, i32) {
    let clip = |value: f64, limit: u32| (value - 0.5).ceil().clamp(0.0, f64::from(limit)) as i32;
    let x0 = clip(rect.x, width);
    let y0 = clip(rect.y, height);
    let x1 = clip(rect.right(), width);
    let y1 = clip(rect.bottom(), height);
    (x0, y0, x1.max(x0), y1.max(y0))
}

fn byte_offset(width: u32, height: u32, x: i32, y: i32) -> Option<usize> {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return None;
    }
    let pixel = (y as usize).checked_mul(width as usize)?.checked_add(x as usize)?;
    pixel.checked_mul(4)
}

pub(crate) fn write_pixel(frame: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: Rgba) {
    let Some(offset) = byte_offset(width, height, x, y) else {
        return;
    };
    let Some(end) = offset.checked_add(4) else {
        return;
    };
    if end > frame.len() {
        return;
    }
    frame[offset..end].copy_from_slice(&color);
}

/// Source-over blend of `color` onto one pixel.
pub(crate) fn blend_pixel(frame: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: Rgba) {
    match color[3] {
        0 => {}
        255 => write_pixel(frame, width, height, x, y, color),
        alpha => {
            let Some(offset) = byte_offset(width, height, x, y) else {
                return;
            };
            let Some(pixel) = frame.get_mut(offset..offset + 4) else {
                return;
            };
            let src_alpha = u32::from(alpha);
            let dst_alpha = 255 - src_alpha;
            for channel in 0..3 {
                let blended =
                    (u32::from(color[channel]) * src_alpha + u32::from(pixel[channel]) * dst_alpha + 127) / 255;
                pixel[channel] = blended as u8;
            }
            pixel[3] = (src_alpha + u32::from(pixel[3]) * dst_alpha / 255).min(255) as u8;
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn fill_rect_px(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    rect_width: i32,
    rect_height: i32,
    color: Rgba,
) {
    let start_x = x.max(0);
    let start_y = y.max(0);
    let end_x = x.saturating_add(rect_width).min(width as i32);
    let end_y = y.saturating_add(rect_height).min(height as i32);
    if end_x <= start_x || end_y <= start_y {
        return;
    }
    for py in start_y..end_y {
        for px in start_x..end_x {
            blend_pixel(frame, width, height, px, py, color);
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn outline_rect_px(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    rect_width: i32,
    rect_height: i32,
    color: Rgba,
) {
    if rect_width <= 1 || rect_height <= 1 {
        return;
    }
    fill_rect_px(frame, width, height, x, y, rect_width, 1, color);
    fill_rect_px(frame, width, height, x, y + rect_height - 1, rect_width, 1, color);
    fill_rect_px(frame, width, height, x, y + 1, 1, rect_height - 2, color);
    fill_rect_px(frame, width, height, x + rect_width - 1, y + 1, 1, rect_height - 2, color);
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_text_px(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    text: &str,
    scale: i32,
    color: Rgba,
) {
    if width == 0 || height == 0 {
        return;
    }
    let Some((visible, pen_x)) = visible_glyphs(text, x, y, scale, width, height) else {
        return;
    };
    font::for_each_text_pixel(visible, pen_x, y, scale, |px, py| {
        blend_pixel(frame, width, height, px, py, color);
    });
}

/// The run of glyphs in `text` that can touch a `width` x `height` frame,
/// with the pen position of its first glyph.
fn visible_glyphs(text: &str, x: i32, y: i32, scale: i32, width: u32, height: u32) -> Option<(&str, i32)> {
    let scale = i64::from(scale.max(1));
    let (x, y) = (i64::from(x), i64::from(y));
    if y >= i64::from(height) || y + i64::from(font::GLYPH_HEIGHT) * scale <= 0 {
        return None;
    }
    let advance = i64::from(font::advance(1)) * scale;
    let first = if x < 0 { (-x) / advance } else { 0 };
    let last = (i64::from(width) - x).div_euclid(advance) + 1;
    if last <= first {
        return None;
    }
    let skip = usize::try_from(first).ok()?;
    let take = usize::try_from(last - first).ok()?;
    let mut bounds = text.char_indices().map(|(index, _)| index).chain([text.len()]).skip(skip);
    let start = bounds.next()?;
    let end = bounds.nth(take - 1).unwrap_or(text.len());
    let pen_x = i32::try_from(x + first * advance).ok()?;
    Some((&text[start..end], pen_x))
}

/// Scanline fill with the nonzero winding rule, sampled at pixel centres.
fn fill_nonzero(frame: &mut [u8], width: u32, height: u32, contours: &[Vec<Point>], color: Rgba) {
    if width == 0 || height == 0 || color[3] == 0 {
        return;
    }

    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for point in contours.iter().flatten() {
        min_y = min_y.min(point.y);
        max_y = max_y.max(point.y);
    }
    if !min_y.is_finite() || !max_y.is_finite() {
        return;
    }

    let first_row = ((min_y - 0.5).ceil() as i64).max(0);
    let last_row = ((max_y - 0.5).floor() as i64).min(i64::from(height) - 1);
    let mut crossings: Vec<(f64, i32)> = Vec::new();

    for row in first_row..=last_row {
        let sample_y = row as f64 + 0.5;
        crossings.clear();
        for contour in contours.iter().filter(|contour| contour.len() >= 3) {
            for (index, start) in contour.iter().enumerate() {
                let end = contour[(index + 1) % contour.len()];
                let (upper, lower, winding) = if start.y < end.y {
                    (*start, end, 1)
                } else {
                    (end, *start, -1)
                };
                if sample_y < upper.y || sample_y >= lower.y {
                    continue;
                }
                let t = (sample_y - upper.y) / (lower.y - upper.y);
                crossings.push((upper.x + t * (lower.x - upper.x), winding));
            }
        }
        if crossings.is_empty() {
            continue;
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut winding = 0;
        for pair in crossings.windows(2) {
            winding += pair[0].1;
            if winding == 0 {
                continue;
            }
            let x0 = ((pair[0].0 - 0.5).ceil() as i64).max(0);
            let x1 = ((pair[1].0 - 0.5).ceil() as i64).min(i64::from(width));
            for x in x0..x1 {
                blend_pixel(frame, width, height, x as i32, row as i32, color);
            }
        }
    }
}

/// Expands polylines into filled quads plus joint discs, all wound the
/// same way so a single nonzero fill paints their union once.
fn stroke_outline(subpaths: &[Subpath], line_width: f64) -> Vec<Vec<Point>> {
    let half = (line_width.max(1.0)) / 2.0;
    let mut contours = Vec::new();
    for subpath in subpaths {
        let points = &subpath.points;
        if points.len() < 2 {
            continue;
        }
        let mut segments = points.windows(2).map(|pair| (pair[0], pair[1])).collect::<Vec<_>>();
        if subpath.closed {
            if let (Some(first), Some(last)) = (points.first(), points.last()) {
                segments.push((*last, *first));
            }
        }

        for (start, end) in &segments {
            let dx = end.x - start.x;
            let dy = end.y - start.y;
            let length = dx.hypot(dy);
            if length == 0.0 || !length.is_finite() {
                continue;
            }
            let nx = -dy / length * half;
            let ny = dx / length * half;
            contours.push(oriented(vec![
                Point::new(start.x + nx, start.y + ny),
                Point::new(end.x + nx, end.y + ny),
                Point::new(end.x - nx, end.y - ny),
                Point::new(start.x - nx, start.y - ny),
            ]));
        }

        if half > 1.0 {
            for point in points {
                contours.push(oriented(disc(*point, half)));
            }
        }
    }
    contours
}

fn disc(center: Point, radius: f64) -> Vec<Point> {
    (0..STROKE_JOIN_SEGMENTS)
        .map(|step| {
            let angle = std::f64::consts::TAU * step as f64 / STROKE_JOIN_SEGMENTS as f64;
            Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}

fn oriented(mut contour: Vec<Point>) -> Vec<Point> {
    let doubled_area = contour
        .iter()
        .zip(contour.iter().cycle().skip(1))
        .map(|(a, b)| a.x * b.y - b.x * a.y)
        .sum::<f64>();
    if doubled_area < 0.0 {
        contour.reverse();
    }
    contour
}
