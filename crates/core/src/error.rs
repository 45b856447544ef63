//! Typed failure surface shared by every engine layer.
//!
//! Defines the closed [`ErrorKind`] taxonomy, the structured
//! [`ScriptFailure`] carried through every layer unchanged, and the
//! [`ScriptResult`] alias collaborators consume.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result alias for every engine operation.
pub type ScriptResult<T> = Result<T, ScriptFailure>;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Closed set of failure categories.
///
/// Produced at exactly two points: the process runner (only [`Timeout`],
/// from its own deadline logic, plus spawn failures) and the classifier
/// (everything else, from exit-code/stderr inspection). Membership drives
/// retry eligibility and user messaging; there is no meaningful ordering.
///
/// [`Timeout`]: ErrorKind::Timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The process exceeded its wall-clock deadline and was killed.
    Timeout,
    /// The interpreter rejected the script before running it.
    SyntaxError,
    /// The script ran and failed (non-zero exit, runtime error).
    ExecutionError,
    /// The OS denied an automation/accessibility authorization.
    PermissionDenied,
    /// A script file, interpreter executable, application, or workflow
    /// could not be found.
    NotFound,
    /// The failure shape was unrecognizable (e.g. non-zero exit with no
    /// diagnostic output at all).
    Unknown,
}

impl ErrorKind {
    /// Whether a failure of this kind may self-resolve on a later attempt.
    ///
    /// Only [`Timeout`](ErrorKind::Timeout) qualifies; every other kind
    /// indicates a defect or environmental condition that retrying cannot
    /// fix.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Stable snake_case name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::SyntaxError => "syntax_error",
            Self::ExecutionError => "execution_error",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ScriptFailure
// ---------------------------------------------------------------------------

/// A failed invocation: category, human-readable message, and diagnostic
/// context.
///
/// Immutable once handed to a caller. The `context` map carries raw
/// material for self-diagnosis (offending path, raw interpreter output,
/// extracted OSA code, invalid parameter name) so callers never need to
/// re-run with extra logging.
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ScriptFailure {
    /// Failure category.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// Diagnostic key/value context.
    pub context: serde_json::Map<String, Value>,
}

impl ScriptFailure {
    /// Create a failure with an empty context.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: serde_json::Map::new(),
        }
    }

    /// Attach one context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
