use std::process::ExitCode;

use host::{run_app, Runtime};
use tracing::error;

use super::audio;
use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let runtime = Runtime::new(&app.host_config, audio::build_engine());
    if let Err(err) = run_app(app.loop_config, runtime, app.script_path) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
