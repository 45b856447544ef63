//! Invocation descriptions: languages, sources, timeouts, and per-call
//! options.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ScriptLanguage
// ---------------------------------------------------------------------------

/// The two dialects the native interpreter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptLanguage {
    /// The declarative automation language (`.applescript`, `.scpt`).
    AppleScript,
    /// The JavaScript-for-Automation variant (`.js`, `.jxa`).
    JavaScript,
}

impl ScriptLanguage {
    /// Value passed to the interpreter's `-l` flag.
    pub fn osascript_flag(self) -> &'static str {
        match self {
            Self::AppleScript => "AppleScript",
            Self::JavaScript => "JavaScript",
        }
    }

    /// Infer the language from a file extension.
    ///
    /// Returns `None` for unknown extensions; callers decide the fallback
    /// (the engine defaults to AppleScript, the interpreter's own default
    /// dialect).
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "applescript" | "scpt" => Some(Self::AppleScript),
            "js" | "jxa" => Some(Self::JavaScript),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Timeout
// ---------------------------------------------------------------------------

/// Wall-clock limit for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Kill the process once this much time has elapsed. Must be > 0.
    Bounded(Duration),
    /// Wait for the process indefinitely.
    Unbounded,
}

impl Timeout {
    /// Bounded timeout from milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self::Bounded(Duration::from_millis(ms))
    }

    /// The limit as a `Duration`, or `None` when unbounded.
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Self::Bounded(d) => Some(d),
            Self::Unbounded => None,
        }
    }

    /// A bounded timeout of zero is a caller bug; everything else is valid.
    pub fn is_valid(self) -> bool {
        !matches!(self, Self::Bounded(Duration::ZERO))
    }
}

// ---------------------------------------------------------------------------
// ScriptSource
// ---------------------------------------------------------------------------

/// What to hand the interpreter: inline text or an on-disk file.
///
/// The enum encodes the "inline text and file path are mutually exclusive"
/// invariant structurally.
#[derive(Debug, Clone)]
pub enum ScriptSource {
    /// Script text piped to the interpreter via stdin.
    Inline(String),
    /// Path to a script file passed in the argument vector.
    File(PathBuf),
}

// ---------------------------------------------------------------------------
// RunOptions
// ---------------------------------------------------------------------------

/// Per-call options for `run_script` / `run_file`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Dialect override. When `None`, `run_script` uses AppleScript and
    /// `run_file` infers from the file extension.
    pub language: Option<ScriptLanguage>,
    /// Positional string arguments handed to the script.
    pub arguments: Vec<String>,
    /// Wall-clock limit; the engine default applies when `None`.
    pub timeout: Option<Timeout>,
    /// Additional environment variables for the child process.
    pub env_vars: Vec<(String, String)>,
    /// Working directory for the child process.
    pub working_directory: Option<PathBuf>,
}

impl RunOptions {
    /// Empty options (engine defaults everywhere).
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a specific dialect.
    pub fn with_language(mut self, language: ScriptLanguage) -> Self {
        self.language = Some(language);
        self
    }

    /// Append one positional argument.
    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    /// Replace the positional arguments.
    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Bounded timeout in milliseconds.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Some(Timeout::from_millis(ms));
        self
    }

    /// Wait for the process indefinitely.
    pub fn unbounded(mut self) -> Self {
        self.timeout = Some(Timeout::Unbounded);
        self
    }

    /// Add one environment variable for the child process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Set the child's working directory.
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }
}

// ---------------------------------------------------------------------------
// WorkflowOptions
// ---------------------------------------------------------------------------

/// Per-call options for `run_workflow`.
#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    /// Structured input handed to the workflow: a string is passed as-is, a
    /// number in its canonical decimal form, a map or list JSON-encoded.
    pub input: Option<serde_json::Value>,
    /// Wall-clock limit; the engine's workflow default applies when `None`.
    pub timeout: Option<Timeout>,
}

impl WorkflowOptions {
    /// Empty options (engine defaults everywhere).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the workflow input.
    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = Some(input);
        self
    }

    /// Bounded timeout in milliseconds.
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Some(Timeout::from_millis(ms));
        self
    }
}

// ---------------------------------------------------------------------------
// ExecutionRequest
// ---------------------------------------------------------------------------

/// Immutable value describing one validated invocation, assembled by the
/// engine from the caller's source and options.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub source: ScriptSource,
    pub language: ScriptLanguage,
    pub arguments: Vec<String>,
    pub timeout: Timeout,
    pub env_vars: Vec<(String, String)>,
    pub working_directory: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_from_extension() {
        let cases = [
            ("run.applescript", Some(ScriptLanguage::AppleScript)),
            ("run.scpt", Some(ScriptLanguage::AppleScript)),
            ("run.js", Some(ScriptLanguage::JavaScript)),
            ("run.jxa", Some(ScriptLanguage::JavaScript)),
            ("run.txt", None),
            ("run", None),
        ];
        for (name, expected) in cases {
            assert_eq!(
                ScriptLanguage::from_extension(Path::new(name)),
                expected,
                "extension inference for {name}"
            );
        }
    }

    #[test]
    fn osascript_flags() {
        assert_eq!(ScriptLanguage::AppleScript.osascript_flag(), "AppleScript");
        assert_eq!(ScriptLanguage::JavaScript.osascript_flag(), "JavaScript");
    }

    #[test]
    fn zero_bounded_timeout_is_invalid() {
        assert!(!Timeout::Bounded(Duration::ZERO).is_valid());
        assert!(Timeout::from_millis(1).is_valid());
        assert!(Timeout::Unbounded.is_valid());
    }

    #[test]
    fn run_options_builder_accumulates() {
        let opts = RunOptions::new()
            .with_language(ScriptLanguage::JavaScript)
            .with_argument("a")
            .with_argument("b")
            .with_timeout_ms(250)
            .with_env("HOME", "/tmp")
            .with_working_directory("/tmp");

        assert_eq!(opts.language, Some(ScriptLanguage::JavaScript));
        assert_eq!(opts.arguments, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(opts.timeout, Some(Timeout::from_millis(250)));
        assert_eq!(opts.env_vars, vec![("HOME".into(), "/tmp".into())]);
        assert_eq!(opts.working_directory, Some(PathBuf::from("/tmp")));
    }
}
