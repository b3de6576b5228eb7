use crate::capability::AudioState;
use crate::config::FaultPolicy;
use crate::draw::font;
use crate::draw::raster::{draw_text_px, fill_rect_px, outline_rect_px};
use crate::draw::Rgba;
use crate::input::{PadButton, PadShape, VirtualPad};
use crate::runtime::{Fault, Phase};

use super::metrics::LoopMetricsSnapshot;

const TEXT_SCALE: i32 = 2;
const PANEL_MARGIN: i32 = 10;
const PANEL_PADDING: i32 = 10;
const ERROR_TEXT_COLOR: Rgba = [255, 85, 85, 255];
const ERROR_PANEL_BG_COLOR: Rgba = [0, 0, 0, 204];
const NOTICE_TEXT_COLOR: Rgba = [255, 209, 102, 255];
const PERF_TEXT_PRIMARY_COLOR: Rgba = [244, 248, 252, 255];
const PERF_TEXT_DIM_COLOR: Rgba = [176, 198, 220, 255];
const PERF_PANEL_BG_COLOR: Rgba = [10, 12, 16, 210];
const PERF_PANEL_BORDER_COLOR: Rgba = [92, 106, 126, 255];
const PAD_BUTTON_COLOR: Rgba = [255, 255, 255, 26];
const PAD_BUTTON_PRESSED_COLOR: Rgba = [255, 255, 255, 102];
const PAD_BORDER_COLOR: Rgba = [255, 255, 255, 51];
const FIRE_BUTTON_COLOR: Rgba = [255, 50, 50, 38];
const FIRE_BUTTON_PRESSED_COLOR: Rgba = [255, 50, 50, 128];
const FIRE_BORDER_COLOR: Rgba = [255, 50, 50, 102];
const PAD_LABEL_COLOR: Rgba = [255, 255, 255, 128];

/// Loop state shown in the F3 perf panel.
#[derive(Debug, Clone)]
pub(crate) struct OverlayData {
    pub metrics: LoopMetricsSnapshot,
    pub phase: Phase,
    pub generation: u64,
    pub fault_policy: FaultPolicy,
    pub audio: AudioState,
    pub script_label: String,
}

pub(crate) fn draw_perf_panel(frame: &mut [u8], width: u32, height: u32, data: &OverlayData) {
    if width == 0 || height == 0 {
        return;
    }
    let lines = build_perf_lines(data);
    let longest = lines
        .iter()
        .map(|line| font::text_width(line, TEXT_SCALE))
        .max()
        .unwrap_or(0);
    let line_height = font::line_height(TEXT_SCALE);
    let panel_width = longest + PANEL_PADDING * 2;
    let panel_height = lines.len() as i32 * line_height + PANEL_PADDING * 2;
    let panel_left = width as i32 - PANEL_MARGIN - panel_width;
    let panel_top = PANEL_MARGIN;

    fill_rect_px(
        frame,
        width,
        height,
        panel_left,
        panel_top,
        panel_width,
        panel_height,
        PERF_PANEL_BG_COLOR,
    );
    outline_rect_px(
        frame,
        width,
        height,
        panel_left,
        panel_top,
        panel_width,
        panel_height,
        PERF_PANEL_BORDER_COLOR,
    );

    let mut y = panel_top + PANEL_PADDING;
    for (index, line) in lines.iter().enumerate() {
        let color = if index == 0 {
            PERF_TEXT_PRIMARY_COLOR
        } else {
            PERF_TEXT_DIM_COLOR
        };
        draw_text_px(
            frame,
            width,
            height,
            panel_left + PANEL_PADDING,
            y,
            line,
            TEXT_SCALE,
            color,
        );
        y += line_height;
    }
}

fn build_perf_lines(data: &OverlayData) -> Vec<String> {
    vec![
        "Perf".to_string(),
        format!("FPS: {:.1}", data.metrics.fps),
        format!("Script FPS: {:.1}", data.metrics.script_fps),
        format!("Frame: {:.2} ms", data.metrics.frame_time_ms),
        format!(
            "Skipped/Faulted: {}/{}",
            data.metrics.skipped_frames, data.metrics.faulted_frames
        ),
        format!("Phase: {}", phase_text(data.phase)),
        format!("Gen: {}", data.generation),
        format!("Policy: {}", data.fault_policy.as_str()),
        format!("Audio: {}", audio_text(data.audio)),
        format!("Script: {}", data.script_label),
    ]
}

fn phase_text(phase: Phase) -> &'static str {
    match phase {
        Phase::Uninitialized => "waiting",
        Phase::Initialized => "init",
        Phase::Running => "running",
        Phase::Faulted => "halted",
    }
}

fn audio_text(state: AudioState) -> &'static str {
    match state {
        AudioState::Suspended => "suspended",
        AudioState::Running => "on",
        AudioState::Unavailable => "unavailable",
    }
}

/// Red-bordered panel in the top-left corner holding the current fault.
pub(crate) fn draw_fault_panel(frame: &mut [u8], width: u32, height: u32, fault: &Fault) {
    if width == 0 || height == 0 {
        return;
    }
    let color = if fault.is_error() {
        ERROR_TEXT_COLOR
    } else {
        NOTICE_TEXT_COLOR
    };
    let max_text_width = (width as i32 - 2 * (PANEL_MARGIN + PANEL_PADDING)).max(font::advance(TEXT_SCALE));
    let lines = wrap_text(&fault.to_string(), max_text_width, TEXT_SCALE);
    let longest = lines
        .iter()
        .map(|line| font::text_width(line, TEXT_SCALE))
        .max()
        .unwrap_or(0);
    let line_height = font::line_height(TEXT_SCALE);
    let panel_width = longest + PANEL_PADDING * 2;
    let panel_height = lines.len() as i32 * line_height + PANEL_PADDING * 2;

    fill_rect_px(
        frame,
        width,
        height,
        PANEL_MARGIN,
        PANEL_MARGIN,
        panel_width,
        panel_height,
        ERROR_PANEL_BG_COLOR,
    );
    outline_rect_px(
        frame,
        width,
        height,
        PANEL_MARGIN,
        PANEL_MARGIN,
        panel_width,
        panel_height,
        color,
    );

    let mut y = PANEL_MARGIN + PANEL_PADDING;
    for line in &lines {
        draw_text_px(
            frame,
            width,
            height,
            PANEL_MARGIN + PANEL_PADDING,
            y,
            line,
            TEXT_SCALE,
            color,
        );
        y += line_height;
    }
}

/// Greedy word wrap to `max_width` pixels; words longer than a line are
/// split.
fn wrap_text(text: &str, max_width: i32, scale: i32) -> Vec<String> {
    let max_chars = ((max_width + scale) / font::advance(scale)).max(1) as usize;
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let needed = current.chars().count() + usize::from(!current.is_empty()) + word.len();
            if needed > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.extend(word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

pub(crate) fn draw_virtual_pad(
    frame: &mut [u8],
    width: u32,
    height: u32,
    pad: &VirtualPad,
    pressed: &[PadButton],
) {
    if width == 0 || height == 0 || !pad.is_visible(f64::from(width)) {
        return;
    }
    for (button, shape) in pad.layout(f64::from(width), f64::from(height)) {
        let is_pressed = pressed.contains(&button);
        match shape {
            PadShape::Square { x, y, size } => {
                let (x, y, size) = (x.round() as i32, y.round() as i32, size.round() as i32);
                let fill = if is_pressed {
                    PAD_BUTTON_PRESSED_COLOR
                } else {
                    PAD_BUTTON_COLOR
                };
                fill_rect_px(frame, width, height, x, y, size, size, fill);
                outline_rect_px(frame, width, height, x, y, size, size, PAD_BORDER_COLOR);
                let label = arrow_label(button);
                let label_x = x + (size - font::text_width(label, TEXT_SCALE)) / 2;
                let label_y = y + (size - font::GLYPH_HEIGHT * TEXT_SCALE) / 2;
                draw_text_px(frame, width, height, label_x, label_y, label, TEXT_SCALE, PAD_LABEL_COLOR);
            }
            PadShape::Circle { cx, cy, radius } => {
                let fill = if is_pressed {
                    FIRE_BUTTON_PRESSED_COLOR
                } else {
                    FIRE_BUTTON_COLOR
                };
                draw_disc(frame, width, height, cx, cy, radius, fill, FIRE_BORDER_COLOR);
                let label = "FIRE";
                let label_x = cx.round() as i32 - font::text_width(label, TEXT_SCALE) / 2;
                let label_y = cy.round() as i32 - font::GLYPH_HEIGHT * TEXT_SCALE / 2;
                draw_text_px(frame, width, height, label_x, label_y, label, TEXT_SCALE, PAD_LABEL_COLOR);
            }
        }
    }
}

fn arrow_label(button: PadButton) -> &'static str {
    match button {
        PadButton::Up => "^",
        PadButton::Down => "V",
        PadButton::Left => "<",
        PadButton::Right => ">",
        PadButton::Fire => "FIRE",
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_disc(
    frame: &mut [u8],
    width: u32,
    height: u32,
    cx: f64,
    cy: f64,
    radius: f64,
    fill: Rgba,
    border: Rgba,
) {
    let top = (cy - radius).floor() as i32;
    let bottom = (cy + radius).ceil() as i32;
    let inner = (radius - 1.0).max(0.0);
    for py in top..=bottom {
        let dy = f64::from(py) + 0.5 - cy;
        let half = radius * radius - dy * dy;
        if half < 0.0 {
            continue;
        }
        let half = half.sqrt();
        let left = (cx - half).round() as i32;
        let right = (cx + half).round() as i32;
        for px in left..right {
            let dx = f64::from(px) + 0.5 - cx;
            let color = if dx * dx + dy * dy >= inner * inner {
                border
            } else {
                fill
            };
            fill_rect_px(frame, width, height, px, py, 1, 1, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::FaultKind;

    fn pixel(frame: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * width + x) * 4) as usize;
        [frame[offset], frame[offset + 1], frame[offset + 2], frame[offset + 3]]
    }

    #[test]
    fn wrap_keeps_words_together_and_splits_long_ones() {
        // advance at scale 1 is 4px, so 23px fits 6 characters
        let lines = wrap_text("attempt to index abcdefghij", 23, 1);
        assert_eq!(lines, ["attemp", "t to", "index", "abcdef", "ghij"]);
    }

    #[test]
    fn wrap_of_empty_text_yields_one_blank_line() {
        assert_eq!(wrap_text("", 100, 2), [""]);
    }

    #[test]
    fn fault_panel_has_red_border_at_top_left() {
        let (width, height) = (320, 120);
        let mut frame = vec![0u8; (width * height * 4) as usize];
        let fault = Fault::new(FaultKind::Runtime, "boom", Some(3));
        draw_fault_panel(&mut frame, width, height, &fault);
        assert_eq!(pixel(&frame, width, 10, 10), ERROR_TEXT_COLOR);
        assert_eq!(pixel(&frame, width, 0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn perf_panel_sits_at_top_right() {
        let (width, height) = (640, 240);
        let mut frame = vec![0u8; (width * height * 4) as usize];
        let data = OverlayData {
            metrics: LoopMetricsSnapshot::default(),
            phase: Phase::Running,
            generation: 3,
            fault_policy: FaultPolicy::Halt,
            audio: AudioState::Suspended,
            script_label: "game.lua".to_string(),
        };
        draw_perf_panel(&mut frame, width, height, &data);
        assert_eq!(
            pixel(&frame, width, width - PANEL_MARGIN as u32 - 1, PANEL_MARGIN as u32),
            PERF_PANEL_BORDER_COLOR
        );
        assert_eq!(pixel(&frame, width, 0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn hidden_pad_draws_nothing() {
        let (width, height) = (1280, 200);
        let mut frame = vec![0u8; (width * height * 4) as usize];
        draw_virtual_pad(&mut frame, width, height, &VirtualPad::default(), &[]);
        assert!(frame.iter().all(|byte| *byte == 0));
    }

    #[test]
    fn visible_pad_marks_pressed_button() {
        let (width, height) = (400, 300);
        let mut idle = vec![0u8; (width * height * 4) as usize];
        let mut pressed = idle.clone();
        let pad = VirtualPad::default();
        draw_virtual_pad(&mut idle, width, height, &pad, &[]);
        draw_virtual_pad(&mut pressed, width, height, &pad, &[PadButton::Left]);
        // inside the left button, away from border and label
        assert_ne!(pixel(&idle, width, 42, 202), [0, 0, 0, 0]);
        assert_ne!(pixel(&idle, width, 42, 202), pixel(&pressed, width, 42, 202));
    }
}
