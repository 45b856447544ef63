//! Engine configuration loaded from environment variables.

use std::time::Duration;

/// Configuration for [`OsaEngine`](crate::scripting::engine::OsaEngine).
///
/// All fields have defaults suitable for a stock macOS install. The
/// executable paths are overridable so tests and alternate deployments can
/// substitute stub binaries.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the scripting interpreter (default: `osascript`).
    pub osascript_path: String,
    /// Path to the workflow runner (default: `shortcuts`).
    pub shortcuts_path: String,
    /// Default script timeout in milliseconds when a call supplies none
    /// (default: `30000`).
    pub default_timeout_ms: u64,
    /// Default workflow timeout in milliseconds (default: `60000`).
    /// Workflows get a longer default because they routinely chain several
    /// applications.
    pub default_workflow_timeout_ms: u64,
    /// Grace period between SIGTERM and SIGKILL when a timed-out process
    /// ignores the termination request (default: `500`).
    pub kill_grace_ms: u64,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default      |
    /// |-------------------------------|--------------|
    /// | `MACAUTO_OSASCRIPT_PATH`      | `osascript`  |
    /// | `MACAUTO_SHORTCUTS_PATH`      | `shortcuts`  |
    /// | `MACAUTO_TIMEOUT_MS`          | `30000`      |
    /// | `MACAUTO_WORKFLOW_TIMEOUT_MS` | `60000`      |
    /// | `MACAUTO_KILL_GRACE_MS`       | `500`        |
    pub fn from_env() -> Self {
        let osascript_path =
            std::env::var("MACAUTO_OSASCRIPT_PATH").unwrap_or_else(|_| "osascript".into());

        let shortcuts_path =
            std::env::var("MACAUTO_SHORTCUTS_PATH").unwrap_or_else(|_| "shortcuts".into());

        let default_timeout_ms: u64 = std::env::var("MACAUTO_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".into())
            .parse()
            .expect("MACAUTO_TIMEOUT_MS must be a valid u64");

        let default_workflow_timeout_ms: u64 = std::env::var("MACAUTO_WORKFLOW_TIMEOUT_MS")
            .unwrap_or_else(|_| "60000".into())
            .parse()
            .expect("MACAUTO_WORKFLOW_TIMEOUT_MS must be a valid u64");

        let kill_grace_ms: u64 = std::env::var("MACAUTO_KILL_GRACE_MS")
            .unwrap_or_else(|_| "500".into())
            .parse()
            .expect("MACAUTO_KILL_GRACE_MS must be a valid u64");

        Self {
            osascript_path,
            shortcuts_path,
            default_timeout_ms,
            default_workflow_timeout_ms,
            kill_grace_ms,
        }
    }

    /// Grace period as a [`Duration`].
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            osascript_path: "osascript".into(),
            shortcuts_path: "shortcuts".into(),
            default_timeout_ms: 30_000,
            default_workflow_timeout_ms: 60_000,
            kill_grace_ms: 500,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
