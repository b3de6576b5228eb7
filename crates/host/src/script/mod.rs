//! Turning untrusted script text into a running logic object.

mod instance;
mod loader;
mod sandbox;
pub mod validation;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

pub use instance::{LogicObject, ScriptInstance};
pub use loader::{LoadError, LoadStrategy, LoadedScript, ScriptLoader};
pub use sandbox::SandboxLimits;
pub use validation::{validate_script, IssueCode, ValidationIssue};

/// The lifecycle callbacks a logic object may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Init,
    Update,
    Draw,
}

impl Hook {
    pub const ALL: [Hook; 3] = [Hook::Init, Hook::Update, Hook::Draw];

    pub fn name(self) -> &'static str {
        match self {
            Hook::Init => "init",
            Hook::Update => "update",
            Hook::Draw => "draw",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error raised by script code while one of its hooks was running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{hook} failed: {message}")]
pub struct ScriptFault {
    pub hook: Hook,
    pub message: String,
    pub line: Option<u32>,
}

impl ScriptFault {
    pub(crate) fn from_lua(hook: Hook, error: &mlua::Error) -> Self {
        let raw = describe_lua_error(error);
        Self {
            hook,
            line: script_error_line(&raw),
            message: strip_location(&raw),
        }
    }
}

fn location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"\[string "game"\]:(\d+):\s*"#)
            .expect("chunk location pattern must compile")
    })
}

/// Line number of the first `[string "game"]:N:` location in `message`.
pub(crate) fn script_error_line(message: &str) -> Option<u32> {
    location_pattern()
        .captures(message)
        .and_then(|captures| captures.get(1))
        .and_then(|line| line.as_str().parse().ok())
}

/// First line of `message` with the chunk location removed.
pub(crate) fn strip_location(message: &str) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    location_pattern().replace(first_line, "").trim().to_string()
}

/// Innermost human-readable message of a Lua error, without tracebacks.
pub(crate) fn describe_lua_error(error: &mlua::Error) -> String {
    match error {
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        mlua::Error::RuntimeError(message) => message.clone(),
        mlua::Error::MemoryError(_) => "memory limit exceeded".to_string(),
        mlua::Error::CallbackError { cause, .. } => describe_lua_error(cause),
        other => other.to_string(),
    }
}
