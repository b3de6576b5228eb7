//! Sandboxed host for untrusted game-logic scripts.
//!
//! A script is Lua source that evaluates to a table of `init`, `update` and
//! `draw` hooks. [`Runtime`] loads it behind a fault barrier, feeds it
//! normalized input and a clamped frame delta once per tick, and records its
//! drawing onto any [`DrawSurface`]. The [`app`] module drives a runtime in a
//! native window.

pub mod app;
pub mod capability;
pub mod config;
pub mod draw;
pub mod input;
pub mod runtime;
pub mod script;

pub use app::{
    run_app, run_app_with_metrics, AppError, LoopConfig, LoopMetricsSnapshot, MetricsHandle,
};
pub use capability::{AudioEngine, AudioError, AudioOutput, AudioState, CueVoice};
pub use config::{FaultPolicy, HostConfig};
pub use draw::{DrawSurface, RasterSurface, RecordingSurface};
pub use input::{InputEvent, InputSnapshot, VirtualPadConfig};
pub use runtime::{Fault, FaultKind, LoadSummary, Phase, Runtime, TickOutcome, Viewport};
pub use script::{validate_script, IssueCode, LoadError, ValidationIssue};
