use std::collections::BTreeSet;

use super::virtual_pad::{PadButton, VirtualPad};
use super::{InputEvent, InputSnapshot, TouchPhase};

/// Whether an event reached script-visible pointer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    Forwarded,
    /// Swallowed by the virtual pad; no pointer or touch state changed.
    Consumed,
}

/// Folds raw events into live input state. Values are stored as received
/// and only repaired when a tick takes a snapshot.
#[derive(Debug)]
pub struct InputNormalizer {
    // NaN until the first pointer event, so the first snapshot starts at the
    // surface midpoint.
    x: f64,
    y: f64,
    mouse_down: bool,
    touch_active: bool,
    keys: BTreeSet<String>,
    pad: VirtualPad,
    pointer_pad_press: Option<PadButton>,
    touch_pad_press: Option<PadButton>,
}

impl Default for InputNormalizer {
    fn default() -> Self {
        Self::new(VirtualPad::default())
    }
}

impl InputNormalizer {
    pub fn new(pad: VirtualPad) -> Self {
        Self {
            x: f64::NAN,
            y: f64::NAN,
            mouse_down: false,
            touch_active: false,
            keys: BTreeSet::new(),
            pad,
            pointer_pad_press: None,
            touch_pad_press: None,
        }
    }

    pub fn pad(&self) -> &VirtualPad {
        &self.pad
    }

    /// Pad buttons currently held by the pointer or a touch.
    pub fn pressed_pad_buttons(&self) -> impl Iterator<Item = PadButton> + '_ {
        self.pointer_pad_press
            .into_iter()
            .chain(self.touch_pad_press.filter(|touch| Some(*touch) != self.pointer_pad_press))
    }

    /// `surface` is the committed surface size, used to place the pad.
    pub fn handle_event(&mut self, event: InputEvent, surface: (f64, f64)) -> EventDisposition {
        let (width, height) = surface;
        match event {
            InputEvent::PointerMoved { x, y } => {
                self.x = x;
                self.y = y;
                EventDisposition::Forwarded
            }
            InputEvent::PointerButton { pressed: true } => {
                if let Some(button) = self.pad.hit_test(self.x, self.y, width, height) {
                    self.press_pad(button);
                    self.pointer_pad_press = Some(button);
                    return EventDisposition::Consumed;
                }
                self.mouse_down = true;
                EventDisposition::Forwarded
            }
            InputEvent::PointerButton { pressed: false } => {
                if let Some(button) = self.pointer_pad_press.take() {
                    self.release_pad(button);
                    return EventDisposition::Consumed;
                }
                self.mouse_down = false;
                EventDisposition::Forwarded
            }
            InputEvent::Key { key, code, pressed } => {
                for name in [key, code] {
                    if name.is_empty() {
                        continue;
                    }
                    if pressed {
                        self.keys.insert(name);
                    } else {
                        self.keys.remove(&name);
                    }
                }
                EventDisposition::Forwarded
            }
            InputEvent::Touch {
                phase,
                x,
                y,
                surface_origin,
            } => self.handle_touch(phase, x - surface_origin.0, y - surface_origin.1, surface),
            InputEvent::FocusLost => {
                self.keys.clear();
                self.mouse_down = false;
                self.touch_active = false;
                self.pointer_pad_press = None;
                self.touch_pad_press = None;
                EventDisposition::Forwarded
            }
        }
    }

    fn handle_touch(
        &mut self,
        phase: TouchPhase,
        x: f64,
        y: f64,
        (width, height): (f64, f64),
    ) -> EventDisposition {
        self.pad.note_touch();
        match phase {
            TouchPhase::Started => {
                if let Some(button) = self.pad.hit_test(x, y, width, height) {
                    self.press_pad(button);
                    self.touch_pad_press = Some(button);
                    return EventDisposition::Consumed;
                }
            }
            TouchPhase::Moved if self.touch_pad_press.is_some() => {
                return EventDisposition::Consumed;
            }
            TouchPhase::Ended | TouchPhase::Cancelled => {
                if let Some(button) = self.touch_pad_press.take() {
                    self.release_pad(button);
                    return EventDisposition::Consumed;
                }
            }
            TouchPhase::Moved => {}
        }

        self.x = x;
        self.y = y;
        self.touch_active = matches!(phase, TouchPhase::Started | TouchPhase::Moved);
        EventDisposition::Forwarded
    }

    fn press_pad(&mut self, button: PadButton) {
        self.keys
            .extend(self.pad.bindings().keys(button).iter().cloned());
    }

    fn release_pad(&mut self, button: PadButton) {
        for key in self.pad.bindings().keys(button) {
            self.keys.remove(key);
        }
    }

    /// Repairs the live pointer position in place (non-finite values go to
    /// the surface midpoint, then everything is clamped into the surface)
    /// and returns what this tick's `update` sees.
    pub fn snapshot_for_tick(&mut self, viewport: (f64, f64)) -> InputSnapshot {
        let (width, height) = viewport;
        self.x = repair_axis(self.x, width);
        self.y = repair_axis(self.y, height);
        InputSnapshot {
            x: self.x,
            y: self.y,
            is_down: self.mouse_down || self.touch_active,
            keys: self.keys.clone(),
        }
    }
}

fn repair_axis(value: f64, extent: f64) -> f64 {
    let extent = if extent.is_finite() && extent > 0.0 {
        extent
    } else {
        0.0
    };
    let value = if value.is_finite() { value } else { extent / 2.0 };
    value.clamp(0.0, extent)
}
