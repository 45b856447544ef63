//! macOS automation script execution engine.
//!
//! This crate runs automation scripts through the OS-native `osascript`
//! interpreter (AppleScript and JavaScript-for-Automation) and named
//! workflows through the `shortcuts` CLI, returning trimmed stdout or a
//! typed [`ScriptFailure`](error::ScriptFailure).
//!
//! The engine is layered leaf-first:
//!
//! - [`scripting::subprocess`] — spawns one interpreter process, pipes
//!   input, enforces a wall-clock timeout, and collects raw output.
//! - [`scripting::classify`] — maps a non-zero exit and its diagnostic
//!   text onto the closed [`ErrorKind`](error::ErrorKind) taxonomy.
//! - [`scripting::engine`] — the public operation surface
//!   ([`run_script`](scripting::engine::AutomationEngine::run_script),
//!   [`run_file`](scripting::engine::AutomationEngine::run_file),
//!   [`run_workflow`](scripting::engine::AutomationEngine::run_workflow),
//!   [`list_workflows`](scripting::engine::AutomationEngine::list_workflows)).
//! - [`scripting::retry`] — wraps any operation with timeout-only retry
//!   and deterministic backoff.
//!
//! Telemetry events are published at each layer boundary through a
//! [`macauto_events::TelemetryBus`]; a bus without subscribers makes the
//! whole side channel a no-op.

pub mod config;
pub mod error;
pub mod scripting;

pub use config::EngineConfig;
pub use error::{ErrorKind, ScriptFailure, ScriptResult};
pub use scripting::engine::{AutomationEngine, OsaEngine};
pub use scripting::request::{RunOptions, ScriptLanguage, Timeout, WorkflowOptions};
pub use scripting::retry::{with_retry, Backoff, RetryPolicy};
