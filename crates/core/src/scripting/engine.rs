//! Execution adapter: the public operation surface.
//!
//! [`AutomationEngine`] is the capability set every caller programs
//! against: an injectable strategy trait, so test doubles can stand in for
//! the production engine. [`OsaEngine`] is the production implementation:
//! it assembles the interpreter argument vector for a validated request,
//! delegates to the process runner, classifies non-zero exits, and
//! publishes telemetry around every invocation.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use macauto_events::{channel, TelemetryBus, TelemetryEvent};

use super::classify;
use super::request::{
    ExecutionRequest, RunOptions, ScriptLanguage, ScriptSource, Timeout, WorkflowOptions,
};
use super::subprocess::{self, Invocation, RawOutput};
use crate::config::EngineConfig;
use crate::error::{ErrorKind, ScriptFailure, ScriptResult};

/// Stderr markers indicating the workflow runner could not find the named
/// workflow.
///
/// Best-effort: the runner's diagnostic text is not a documented contract
/// of that tool, so an unrecognized wording falls through to the generic
/// classifier instead.
const WORKFLOW_NOT_FOUND_MARKERS: &[&str] = &["not found", "doesn't exist", "no shortcut"];

// ---------------------------------------------------------------------------
// AutomationEngine
// ---------------------------------------------------------------------------

/// The operation surface of the script execution engine.
///
/// Every operation is synchronous from the caller's perspective (one
/// `await`, one owned subprocess) and returns either trimmed stdout or a
/// typed [`ScriptFailure`]. Implementations hold no shared mutable state,
/// so concurrent callers may issue calls in parallel freely.
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    /// Run inline script text through the interpreter.
    async fn run_script(&self, script: &str, opts: RunOptions) -> ScriptResult<String>;

    /// Run a script file through the interpreter.
    async fn run_file(&self, path: &Path, opts: RunOptions) -> ScriptResult<String>;

    /// Run a named workflow through the workflow runner.
    async fn run_workflow(&self, name: &str, opts: WorkflowOptions) -> ScriptResult<String>;

    /// Enumerate the names of available workflows.
    async fn list_workflows(&self) -> ScriptResult<Vec<String>>;
}

// ---------------------------------------------------------------------------
// OsaEngine
// ---------------------------------------------------------------------------

/// Production engine backed by `osascript` and `shortcuts`.
pub struct OsaEngine {
    config: EngineConfig,
    telemetry: Arc<TelemetryBus>,
}

impl OsaEngine {
    /// Create an engine with a private, subscriber-less telemetry bus
    /// (telemetry becomes a no-op).
    pub fn new(config: EngineConfig) -> Self {
        Self::with_telemetry(config, Arc::new(TelemetryBus::default()))
    }

    /// Create an engine publishing into an externally-owned bus.
    pub fn with_telemetry(config: EngineConfig, telemetry: Arc<TelemetryBus>) -> Self {
        Self { config, telemetry }
    }

    /// The bus this engine publishes into.
    pub fn telemetry(&self) -> &Arc<TelemetryBus> {
        &self.telemetry
    }

    fn script_timeout(&self, opts: &RunOptions) -> Timeout {
        opts.timeout
            .unwrap_or_else(|| Timeout::from_millis(self.config.default_timeout_ms))
    }

    /// Reject a zero bounded timeout before any process is spawned.
    fn validate_timeout(timeout: Timeout) -> ScriptResult<()> {
        if timeout.is_valid() {
            Ok(())
        } else {
            Err(ScriptFailure::new(
                ErrorKind::ExecutionError,
                "timeout must be greater than zero",
            )
            .with_context("invalid_parameter", "timeout"))
        }
    }

    /// Build the interpreter invocation for a validated request.
    ///
    /// Inline text is piped via stdin behind the `-` argv sentinel so
    /// script content never passes through a shell or the argument vector;
    /// files are passed by path. User arguments follow in order.
    fn interpreter_invocation(&self, request: &ExecutionRequest) -> Invocation {
        let flag = request.language.osascript_flag().to_string();
        let (script_arg, stdin) = match &request.source {
            ScriptSource::Inline(text) => ("-".to_string(), Some(text.clone().into_bytes())),
            ScriptSource::File(path) => (path.display().to_string(), None),
        };

        let mut args = vec!["-l".to_string(), flag, script_arg];
        args.extend(request.arguments.iter().cloned());

        Invocation {
            program: self.config.osascript_path.clone(),
            args,
            stdin,
            env_vars: request.env_vars.clone(),
            working_directory: request.working_directory.clone(),
            timeout: request.timeout,
            kill_grace: self.config.kill_grace(),
        }
    }

    /// Run one invocation with telemetry and classification.
    ///
    /// `detail` is merged into the `execution.start` payload;
    /// `classify_failure` maps a non-zero exit onto the taxonomy (workflow
    /// calls override the default to recognize their runner's diagnostics).
    async fn dispatch<F>(
        &self,
        invocation: Invocation,
        detail: serde_json::Map<String, Value>,
        classify_failure: F,
    ) -> ScriptResult<String>
    where
        F: FnOnce(&RawOutput) -> ScriptFailure + Send,
    {
        let timeout_ms = invocation
            .timeout
            .as_duration()
            .map(|d| d.as_millis() as u64);

        let mut start_payload = detail;
        start_payload.insert("command".into(), invocation.program.clone().into());
        start_payload.insert("args".into(), invocation.args.clone().into());
        start_payload.insert("timeout_ms".into(), timeout_ms.into());
        self.publish(channel::EXECUTION_START, start_payload.into());

        match subprocess::run_command(invocation).await {
            Ok(raw) if raw.exit_code == 0 => {
                self.publish(
                    channel::EXECUTION_STOP,
                    serde_json::json!({
                        "duration_ms": raw.duration.as_millis() as u64,
                        "output_bytes": raw.stdout.len(),
                        "exit_code": raw.exit_code,
                    }),
                );
                Ok(trim_trailing_newline(&raw.stdout).to_string())
            }
            Ok(raw) => {
                let failure = classify_failure(&raw);
                self.publish_exception(&failure, Some(raw.duration.as_millis() as u64));
                Err(failure)
            }
            Err(failure) => {
                self.publish_exception(&failure, None);
                Err(failure)
            }
        }
    }

    fn publish(&self, name: &str, payload: Value) {
        self.telemetry
            .publish(TelemetryEvent::new(name).with_payload(payload));
    }

    fn publish_exception(&self, failure: &ScriptFailure, duration_ms: Option<u64>) {
        self.publish(
            channel::EXECUTION_EXCEPTION,
            serde_json::json!({
                "kind": failure.kind,
                "message": failure.message,
                "duration_ms": duration_ms,
            }),
        );
    }
}

#[async_trait]
impl AutomationEngine for OsaEngine {
    async fn run_script(&self, script: &str, opts: RunOptions) -> ScriptResult<String> {
        let timeout = self.script_timeout(&opts);
        Self::validate_timeout(timeout)?;

        let request = ExecutionRequest {
            source: ScriptSource::Inline(script.to_string()),
            language: opts.language.unwrap_or(ScriptLanguage::AppleScript),
            arguments: opts.arguments,
            timeout,
            env_vars: opts.env_vars,
            working_directory: opts.working_directory,
        };

        let mut detail = serde_json::Map::new();
        detail.insert("script".into(), script.into());
        detail.insert(
            "language".into(),
            request.language.osascript_flag().into(),
        );

        let invocation = self.interpreter_invocation(&request);
        self.dispatch(invocation, detail, |raw| {
            classify::classify(raw.exit_code, &raw.stdout, &raw.stderr)
        })
        .await
    }

    async fn run_file(&self, path: &Path, opts: RunOptions) -> ScriptResult<String> {
        let timeout = self.script_timeout(&opts);
        Self::validate_timeout(timeout)?;

        // Fail fast before spawning anything.
        if tokio::fs::metadata(path).await.is_err() {
            return Err(ScriptFailure::new(
                ErrorKind::NotFound,
                format!("script file not found: {}", path.display()),
            )
            .with_context("path", path.display().to_string()));
        }

        let language = opts
            .language
            .or_else(|| ScriptLanguage::from_extension(path))
            .unwrap_or(ScriptLanguage::AppleScript);

        let request = ExecutionRequest {
            source: ScriptSource::File(path.to_path_buf()),
            language,
            arguments: opts.arguments,
            timeout,
            env_vars: opts.env_vars,
            working_directory: opts.working_directory,
        };

        let mut detail = serde_json::Map::new();
        detail.insert("path".into(), path.display().to_string().into());
        detail.insert("language".into(), language.osascript_flag().into());

        let invocation = self.interpreter_invocation(&request);
        self.dispatch(invocation, detail, |raw| {
            classify::classify(raw.exit_code, &raw.stdout, &raw.stderr)
        })
        .await
    }

    async fn run_workflow(&self, name: &str, opts: WorkflowOptions) -> ScriptResult<String> {
        let timeout = opts
            .timeout
            .unwrap_or_else(|| Timeout::from_millis(self.config.default_workflow_timeout_ms));
        Self::validate_timeout(timeout)?;

        let stdin = opts
            .input
            .as_ref()
            .map(|input| serialize_workflow_input(input).into_bytes());

        let invocation = Invocation {
            program: self.config.shortcuts_path.clone(),
            args: vec!["run".to_string(), name.to_string()],
            stdin,
            env_vars: vec![],
            working_directory: None,
            timeout,
            kill_grace: self.config.kill_grace(),
        };

        let mut detail = serde_json::Map::new();
        detail.insert("workflow".into(), name.into());

        let workflow = name.to_string();
        self.dispatch(invocation, detail, move |raw| {
            classify_workflow_failure(&workflow, raw)
        })
        .await
    }

    async fn list_workflows(&self) -> ScriptResult<Vec<String>> {
        let invocation = Invocation {
            program: self.config.shortcuts_path.clone(),
            args: vec!["list".to_string()],
            stdin: None,
            env_vars: vec![],
            working_directory: None,
            timeout: Timeout::from_millis(self.config.default_workflow_timeout_ms),
            kill_grace: self.config.kill_grace(),
        };

        let mut detail = serde_json::Map::new();
        detail.insert("workflow".into(), "(list)".into());

        let output = self
            .dispatch(invocation, detail, |raw| {
                classify::classify(raw.exit_code, &raw.stdout, &raw.stderr)
            })
            .await?;

        Ok(parse_workflow_names(&output))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Remove exactly one trailing newline (`\n` or `\r\n`), nothing else.
fn trim_trailing_newline(output: &str) -> &str {
    match output.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => output,
    }
}

/// Serialize workflow input for the runner's stdin: a string is passed
/// as-is, a number in its canonical decimal form, everything else
/// JSON-encoded.
fn serialize_workflow_input(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Parse the runner's enumeration output into an ordered name list.
///
/// Tolerates newline- or comma-delimited output; an empty result is an
/// empty list, not an error.
fn parse_workflow_names(output: &str) -> Vec<String> {
    output
        .lines()
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Classify a failed workflow invocation, recognizing the runner's
/// missing-workflow diagnostics before falling back to the generic
/// classifier.
fn classify_workflow_failure(name: &str, raw: &RawOutput) -> ScriptFailure {
    let normalized = classify::normalize(&raw.stderr);
    if WORKFLOW_NOT_FOUND_MARKERS
        .iter()
        .any(|marker| normalized.contains(marker))
    {
        return ScriptFailure::new(ErrorKind::NotFound, format!("workflow '{name}' not found"))
            .with_context("workflow", name)
            .with_context("exit_code", raw.exit_code)
            .with_context("stderr", raw.stderr.clone());
    }
    classify::classify(raw.exit_code, &raw.stdout, &raw.stderr)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
