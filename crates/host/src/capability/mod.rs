//! Ambient functionality handed to every script: vector math, the colour
//! palette and procedural sound cues.

pub mod audio;
mod bindings;
pub mod palette;
pub mod vector;

pub use audio::{
    AudioEngine, AudioError, AudioOpener, AudioOutput, AudioState, Cue, CueVoice, SilentOutput,
};
pub use bindings::{Capabilities, InstalledCapabilities, Operand, CAPABILITY_MANIFEST};
pub(crate) use bindings::with_script_rng;
pub use palette::{Palette, DEFAULT_PALETTE};
pub use vector::Vector;
