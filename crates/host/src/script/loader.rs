use std::borrow::Cow;
use std::fmt;

use mlua::Value;
use thiserror::Error;
use tracing::{debug, info};

use super::instance::{LogicObject, ScriptInstance};
use super::sandbox::{Sandbox, SandboxLimits};
use super::{describe_lua_error, script_error_line, strip_location};
use crate::capability::Capabilities;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{message}")]
    Syntax { message: String, line: Option<u32> },
    #[error("{message}")]
    Evaluation { message: String, line: Option<u32> },
    #[error("script did not produce a logic object (got {found})")]
    NoObject { found: String },
    #[error("hook `{hook}` must be a function (got {found})")]
    InvalidHook { hook: &'static str, found: String },
    #[error("script sandbox could not be prepared")]
    Sandbox(#[source] mlua::Error),
}

impl LoadError {
    pub(crate) fn from_evaluation(error: &mlua::Error) -> Self {
        let raw = describe_lua_error(error);
        let line = script_error_line(&raw);
        let message = strip_location(&raw);
        match error {
            mlua::Error::SyntaxError { .. } => LoadError::Syntax { message, line },
            _ => LoadError::Evaluation { message, line },
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, LoadError::Syntax { .. })
    }

    pub fn line(&self) -> Option<u32> {
        match self {
            LoadError::Syntax { line, .. } | LoadError::Evaluation { line, .. } => *line,
            _ => None,
        }
    }
}

/// The two ordered ways script text is turned into a logic object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// The text is a chunk whose `return` yields the object.
    ChunkReturn,
    /// The text is a bare table expression, evaluated as `return (<text>)`.
    BareExpression,
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStrategy::ChunkReturn => f.write_str("chunk_return"),
            LoadStrategy::BareExpression => f.write_str("bare_expression"),
        }
    }
}

pub enum LoadedScript {
    Logic(ScriptInstance),
    /// A complete HTML document from an older generation format, passed
    /// through untouched.
    LegacyDocument(String),
}

impl fmt::Debug for LoadedScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadedScript::Logic(instance) => f
                .debug_tuple("Logic")
                .field(&instance.strategy())
                .finish(),
            LoadedScript::LegacyDocument(text) => f
                .debug_tuple("LegacyDocument")
                .field(&text.len())
                .finish(),
        }
    }
}

pub struct ScriptLoader {
    limits: SandboxLimits,
    capabilities: Capabilities,
}

impl ScriptLoader {
    pub fn new(limits: SandboxLimits, capabilities: Capabilities) -> Self {
        Self {
            limits,
            capabilities,
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Tries each strategy in order, every attempt in a brand-new VM. When
    /// both fail, a syntax error from the first attempt wins; otherwise the
    /// second attempt's error is reported. A structurally invalid object is
    /// final and does not fall through.
    pub fn try_load(&self, text: &str) -> Result<LoadedScript, LoadError> {
        if is_legacy_document(text) {
            info!(bytes = text.len(), "legacy_document_passthrough");
            return Ok(LoadedScript::LegacyDocument(text.to_string()));
        }

        let first = match self.attempt(text, LoadStrategy::ChunkReturn) {
            Ok(instance) => return Ok(LoadedScript::Logic(instance)),
            Err(error @ (LoadError::InvalidHook { .. } | LoadError::Sandbox(_))) => {
                return Err(error)
            }
            Err(error) => error,
        };
        debug!(
            strategy = %LoadStrategy::ChunkReturn,
            error = %first,
            "load_strategy_failed"
        );

        match self.attempt(text, LoadStrategy::BareExpression) {
            Ok(instance) => Ok(LoadedScript::Logic(instance)),
            Err(second) => {
                debug!(
                    strategy = %LoadStrategy::BareExpression,
                    error = %second,
                    "load_strategy_failed"
                );
                if first.is_syntax() {
                    Err(first)
                } else {
                    Err(second)
                }
            }
        }
    }

    fn attempt(&self, text: &str, strategy: LoadStrategy) -> Result<ScriptInstance, LoadError> {
        let sandbox = Sandbox::new(self.limits, &self.capabilities).map_err(LoadError::Sandbox)?;
        let source = match strategy {
            LoadStrategy::ChunkReturn => Cow::Borrowed(text),
            LoadStrategy::BareExpression => Cow::Owned(format!("return ({text}\n)")),
        };

        let value = sandbox
            .evaluate(&source)
            .map_err(|error| LoadError::from_evaluation(&error))?;
        let object = match value {
            Value::Table(object) => object,
            other => {
                return Err(LoadError::NoObject {
                    found: other.type_name().to_string(),
                })
            }
        };

        let logic = LogicObject::from_table(&sandbox, &object)?;
        let instance = ScriptInstance::new(sandbox, logic, strategy).map_err(LoadError::Sandbox)?;
        for capability in instance
            .shadowed_capabilities()
            .map_err(LoadError::Sandbox)?
        {
            info!(capability, "capability_shadowed_by_script");
        }
        Ok(instance)
    }
}

fn is_legacy_document(text: &str) -> bool {
    let head = text.trim_start();
    let starts_with = |prefix: &str| {
        head.get(..prefix.len())
            .is_some_and(|start| start.eq_ignore_ascii_case(prefix))
    };
    starts_with("<!DOCTYPE html>") || starts_with("<html")
}
