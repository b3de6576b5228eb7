//! Platform events folded into the per-tick `input` table scripts read.

mod normalizer;
mod virtual_pad;

use std::collections::BTreeSet;

pub use normalizer::{EventDisposition, InputNormalizer};
pub use virtual_pad::{
    LayoutError, PadBindings, PadButton, PadMode, PadShape, VirtualPad, VirtualPadConfig,
};

/// The repaired input state handed to one `update` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSnapshot {
    pub x: f64,
    pub y: f64,
    /// Mouse button held or a touch in progress.
    pub is_down: bool,
    /// Held keys, by key value (`"a"`, `" "`, `"ArrowUp"`) and by physical
    /// code (`"KeyA"`, `"Space"`).
    pub keys: BTreeSet<String>,
}

impl InputSnapshot {
    pub fn is_key_down(&self, key: &str) -> bool {
        self.keys.contains(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Started,
    Moved,
    Ended,
    Cancelled,
}

/// Platform-neutral input, as produced by the native event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerMoved {
        x: f64,
        y: f64,
    },
    PointerButton {
        pressed: bool,
    },
    Key {
        key: String,
        code: String,
        pressed: bool,
    },
    /// `x`/`y` are in window space; `surface_origin` is where the drawing
    /// surface starts inside the window.
    Touch {
        phase: TouchPhase,
        x: f64,
        y: f64,
        surface_origin: (f64, f64),
    },
    /// The window lost focus; every held key and button is released.
    FocusLost,
}
