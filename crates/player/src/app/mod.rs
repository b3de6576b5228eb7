mod audio;
mod bootstrap;
mod loop_runner;

use std::env;
use std::process::ExitCode;

use tracing::error;

pub(crate) fn run() -> ExitCode {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let wiring = match bootstrap::build_app(&args) {
        Ok(Some(wiring)) => wiring,
        Ok(None) => return ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "startup_failed");
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    loop_runner::run(wiring)
}
