//! Subprocess management: the process runner.
//!
//! Provides [`run_command`], the single place a child process is spawned,
//! fed, raced against its deadline, and reaped. The runner is purely
//! mechanical: a non-zero exit is returned as data in [`RawOutput`], never
//! as an error; classification belongs to the caller. The only failure
//! kinds produced here are spawn failures and [`ErrorKind::Timeout`] from
//! the deadline path.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use super::request::Timeout;
use crate::error::{ErrorKind, ScriptFailure};

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output exceeding this limit is truncated to prevent memory exhaustion
/// from extremely verbose scripts.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Invocation / RawOutput
// ---------------------------------------------------------------------------

/// One fully-assembled subprocess invocation.
///
/// The argument vector is passed to the OS atomically (never through a
/// shell) so script text and user arguments cannot inject into a command
/// line.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Executable name or path.
    pub program: String,
    /// Argument vector.
    pub args: Vec<String>,
    /// Bytes piped to the child's stdin; stdin is closed immediately when
    /// `None`.
    pub stdin: Option<Vec<u8>>,
    /// Additional environment variables.
    pub env_vars: Vec<(String, String)>,
    /// Working directory for the child.
    pub working_directory: Option<PathBuf>,
    /// Wall-clock limit.
    pub timeout: Timeout,
    /// Grace period between SIGTERM and SIGKILL on timeout.
    pub kill_grace: Duration,
}

/// Raw result of a completed invocation.
#[derive(Debug, Clone)]
pub struct RawOutput {
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    /// Complete captured stdout (capped at [`MAX_OUTPUT_BYTES`]).
    pub stdout: String,
    /// Complete captured stderr (capped at [`MAX_OUTPUT_BYTES`]).
    pub stderr: String,
    /// Wall-clock duration of the invocation.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// run_command
// ---------------------------------------------------------------------------

/// Spawn the invocation, pipe its input, capture stdout/stderr, and enforce
/// the timeout.
///
/// On every exit path (normal completion, timeout, spawn failure) the
/// child is guaranteed terminated and reaped before this function returns.
/// `kill_on_drop(true)` backstops the explicit kill paths against
/// cancellation of the calling future.
pub async fn run_command(invocation: Invocation) -> Result<RawOutput, ScriptFailure> {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Give the child its own process group so the timeout path can kill
    // the whole tree; an orphaned grandchild would otherwise keep the
    // output pipes open and stall the drain.
    #[cfg(unix)]
    cmd.process_group(0);

    for (key, value) in &invocation.env_vars {
        cmd.env(key, value);
    }

    if let Some(dir) = &invocation.working_directory {
        cmd.current_dir(dir);
    }

    let start = Instant::now();

    let mut child = cmd
        .spawn()
        .map_err(|e| spawn_failure(&invocation.program, &e))?;

    // Write the piped input, then close stdin so the child sees EOF.
    // Best-effort write: if the process closes stdin early, ignore it.
    if let Some(mut stdin) = child.stdin.take() {
        if let Some(bytes) = &invocation.stdin {
            let _ = stdin.write_all(bytes).await;
        }
        drop(stdin);
    }

    // Read both streams in spawned tasks so `child.wait()` (which borrows
    // `&mut child`) can proceed concurrently.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    let status = match invocation.timeout {
        Timeout::Unbounded => child.wait().await.map_err(wait_failure)?,
        Timeout::Bounded(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(result) => result.map_err(wait_failure)?,
            Err(_elapsed) => {
                terminate(&mut child, invocation.kill_grace).await;

                // Drain whatever the process produced before it was killed;
                // the raw tails go into the failure context, not through
                // the classifier (a killed process's stderr is unreliable).
                let stdout =
                    String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
                let stderr =
                    String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();

                let limit_ms = limit.as_millis() as u64;
                tracing::warn!(
                    program = %invocation.program,
                    timeout_ms = limit_ms,
                    "process exceeded its deadline and was killed"
                );

                return Err(ScriptFailure::new(
                    ErrorKind::Timeout,
                    format!("process exceeded its {limit_ms}ms deadline and was killed"),
                )
                .with_context("program", invocation.program.clone())
                .with_context("timeout_ms", limit_ms)
                .with_context("elapsed_ms", start.elapsed().as_millis() as u64)
                .with_context("stdout", stdout)
                .with_context("stderr", stderr));
            }
        },
    };

    let duration = start.elapsed();
    let stdout_bytes = stdout_task.await.unwrap_or_default();
    let stderr_bytes = stderr_task.await.unwrap_or_default();

    Ok(RawOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        duration,
    })
}

/// Kill a timed-out child: SIGTERM, a grace period, then SIGKILL.
///
/// The child is reaped (waited on) before returning, so no zombie survives
/// the timeout path.
async fn terminate(child: &mut Child, grace: Duration) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // Negative pid addresses the whole process group set up at spawn.
        let pgid = -(pid as libc::pid_t);
        // Ask politely first so the interpreter can release its targets.
        unsafe { libc::kill(pgid, libc::SIGTERM) };
        if tokio::time::timeout(grace, child.wait()).await.is_err() {
            unsafe { libc::kill(pgid, libc::SIGKILL) };
            let _ = child.wait().await;
        }
        // Sweep any group members that outlived the direct child; they
        // would otherwise hold the output pipes open.
        unsafe { libc::kill(pgid, libc::SIGKILL) };
        return;
    }

    #[cfg(not(unix))]
    let _ = grace;

    // `Child::kill` sends SIGKILL (or the platform equivalent) and reaps.
    let _ = child.kill().await;
}

/// Map a spawn error onto the taxonomy.
///
/// A missing executable is reported as `not_found`, distinct from a process
/// that ran and exited non-zero.
fn spawn_failure(program: &str, error: &std::io::Error) -> ScriptFailure {
    let kind = match error.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound,
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        _ => ErrorKind::Unknown,
    };
    ScriptFailure::new(kind, format!("failed to spawn {program}: {error}"))
        .with_context("program", program)
}

fn wait_failure(error: std::io::Error) -> ScriptFailure {
    ScriptFailure::new(
        ErrorKind::Unknown,
        format!("i/o error while waiting for process: {error}"),
    )
}

/// Read an entire output stream into a byte buffer, capped at
/// [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
