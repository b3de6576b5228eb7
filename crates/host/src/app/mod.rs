mod loop_runner;
mod metrics;
mod overlay;
mod renderer;
mod watch;

pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use renderer::Renderer;
pub use watch::{fingerprint, ScriptWatcher, WatchError};
