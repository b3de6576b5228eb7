use serde::Deserialize;
use thiserror::Error;

const PAD_SIZE: f64 = 120.0;
const PAD_MARGIN_LEFT: f64 = 40.0;
const PAD_MARGIN_BOTTOM: f64 = 20.0;
const DPAD_BUTTON: f64 = 40.0;
const FIRE_DIAMETER: f64 = 80.0;
const FIRE_MARGIN_RIGHT: f64 = 40.0;
/// Surfaces this narrow get the pad in `auto` mode even without touch.
const NARROW_SURFACE_MAX_WIDTH: f64 = 900.0;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("invalid virtual pad bindings: {0}")]
    Json(#[from] serde_json::Error),
    #[error("virtual pad button `{0}` has no keys bound")]
    EmptyButton(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadButton {
    Up,
    Down,
    Left,
    Right,
    Fire,
}

impl PadButton {
    pub const ALL: [PadButton; 5] = [
        PadButton::Up,
        PadButton::Down,
        PadButton::Left,
        PadButton::Right,
        PadButton::Fire,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PadButton::Up => "up",
            PadButton::Down => "down",
            PadButton::Left => "left",
            PadButton::Right => "right",
            PadButton::Fire => "fire",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Key identifiers each pad button holds down while pressed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PadBindings {
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub fire: Vec<String>,
}

impl Default for PadBindings {
    fn default() -> Self {
        let keys = |names: [&str; 2]| names.iter().map(|name| name.to_string()).collect();
        Self {
            up: keys(["ArrowUp", "KeyW"]),
            down: keys(["ArrowDown", "KeyS"]),
            left: keys(["ArrowLeft", "KeyA"]),
            right: keys(["ArrowRight", "KeyD"]),
            fire: keys([" ", "Enter"]),
        }
    }
}

impl PadBindings {
    /// Parses a JSON binding table. Buttons left out keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, LayoutError> {
        let bindings: PadBindings = serde_json::from_str(raw)?;
        bindings.validate()?;
        Ok(bindings)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        match PadButton::ALL
            .into_iter()
            .find(|button| self.keys(*button).is_empty())
        {
            Some(button) => Err(LayoutError::EmptyButton(button.name())),
            None => Ok(()),
        }
    }

    pub fn keys(&self, button: PadButton) -> &[String] {
        match button {
            PadButton::Up => &self.up,
            PadButton::Down => &self.down,
            PadButton::Left => &self.left,
            PadButton::Right => &self.right,
            PadButton::Fire => &self.fire,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VirtualPadConfig {
    pub mode: PadMode,
    pub bindings: PadBindings,
}

/// Screen-space hit area of one button.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PadShape {
    Square { x: f64, y: f64, size: f64 },
    Circle { cx: f64, cy: f64, radius: f64 },
}

impl PadShape {
    pub fn contains(&self, px: f64, py: f64) -> bool {
        match *self {
            PadShape::Square { x, y, size } => {
                px >= x && px < x + size && py >= y && py < y + size
            }
            PadShape::Circle { cx, cy, radius } => {
                let (dx, dy) = (px - cx, py - cy);
                dx * dx + dy * dy <= radius * radius
            }
        }
    }
}

/// On-screen directional pad plus fire button for touch-only devices.
#[derive(Debug, Clone)]
pub struct VirtualPad {
    bindings: PadBindings,
    mode: PadMode,
    touch_seen: bool,
}

impl Default for VirtualPad {
    fn default() -> Self {
        Self::new(VirtualPadConfig::default())
    }
}

impl VirtualPad {
    pub fn new(config: VirtualPadConfig) -> Self {
        Self {
            bindings: config.bindings,
            mode: config.mode,
            touch_seen: false,
        }
    }

    pub fn mode(&self) -> PadMode {
        self.mode
    }

    pub fn bindings(&self) -> &PadBindings {
        &self.bindings
    }

    pub(crate) fn note_touch(&mut self) {
        self.touch_seen = true;
    }

    pub fn is_visible(&self, surface_width: f64) -> bool {
        match self.mode {
            PadMode::Always => true,
            PadMode::Never => false,
            PadMode::Auto => self.touch_seen || surface_width <= NARROW_SURFACE_MAX_WIDTH,
        }
    }

    /// Button shapes anchored to the bottom corners of a `width`x`height`
    /// surface.
    pub fn layout(&self, width: f64, height: f64) -> [(PadButton, PadShape); 5] {
        let pad_x = PAD_MARGIN_LEFT;
        let pad_y = height - PAD_MARGIN_BOTTOM - PAD_SIZE;
        let square = |dx: f64, dy: f64| PadShape::Square {
            x: pad_x + dx,
            y: pad_y + dy,
            size: DPAD_BUTTON,
        };
        let radius = FIRE_DIAMETER / 2.0;
        [
            (PadButton::Up, square(DPAD_BUTTON, 0.0)),
            (PadButton::Down, square(DPAD_BUTTON, 2.0 * DPAD_BUTTON)),
            (PadButton::Left, square(0.0, DPAD_BUTTON)),
            (PadButton::Right, square(2.0 * DPAD_BUTTON, DPAD_BUTTON)),
            (
                PadButton::Fire,
                PadShape::Circle {
                    cx: width - FIRE_MARGIN_RIGHT - radius,
                    cy: height - PAD_MARGIN_BOTTOM - radius,
                    radius,
                },
            ),
        ]
    }

    /// The visible button under `(x, y)`, if any.
    pub fn hit_test(&self, x: f64, y: f64, width: f64, height: f64) -> Option<PadButton> {
        if !self.is_visible(width) || !x.is_finite() || !y.is_finite() {
            return None;
        }
        self.layout(width, height)
            .into_iter()
            .find(|(_, shape)| shape.contains(x, y))
            .map(|(button, _)| button)
    }
}
