//! Error types for the component core.
//!
//! Two families live here. [`Error`] is fatal: malformed option shapes and
//! resolver protection trips unwind to whoever asked for the instance.
//! [`HookError`] is what user code (hooks, `data()`, computed getters, watch
//! callbacks, methods) hands back; it is always reported and never aborts
//! initialization.

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    /// An option carried a value whose shape cannot be merged.
    #[error("invalid value for option \"{option}\": expected {expected}, got {found}")]
    InvalidOption {
        option: String,
        expected: &'static str,
        found: String,
    },

    /// The `super` chain of a class is deeper than the resolver will walk.
    #[error("component inheritance chain exceeds {limit} levels")]
    InheritanceTooDeep { limit: usize },

    /// The instance cell was already borrowed when a phase needed it.
    #[error("component instance is busy and cannot enter phase `{phase}`")]
    InstanceBusy { phase: &'static str },

    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_option(option: &str, expected: &'static str, found: &serde_json::Value) -> Self {
        Error::InvalidOption {
            option: option.to_string(),
            expected,
            found: describe_value(found).to_string(),
        }
    }
}

fn describe_value(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Error raised by user-supplied code.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("{message}")]
pub struct HookError {
    pub message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for HookError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for HookError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

pub const ERR_MULTIPLE_ROOTS: &str = "TPL001";
pub const ERR_NO_ROOT: &str = "TPL002";
pub const ERR_PARSE: &str = "TPL003";
pub const ERR_UNCLOSED_INTERPOLATION: &str = "TPL004";

/// Diagnostic produced while compiling a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileError {
    pub code: String,
    pub message: String,
    /// Byte range into the template source, present when source ranges were requested.
    pub range: Option<(usize, usize)>,
}

impl CompileError {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            range: None,
        }
    }

    pub fn with_range(mut self, start: usize, end: usize) -> Self {
        self.range = Some((start, end));
        self
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
