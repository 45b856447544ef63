//! End-to-end tests for the execution engine against stub interpreters.
//!
//! The engine's executable paths are configurable, so these tests swap the
//! real `osascript`/`shortcuts` binaries for small shell stubs and verify
//! the full path: argument-vector assembly, stdin piping, timeout
//! enforcement, classification, and retry coordination.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use macauto_core::{
    with_retry, AutomationEngine, Backoff, EngineConfig, ErrorKind, OsaEngine, RetryPolicy,
    RunOptions, ScriptLanguage, WorkflowOptions,
};
use macauto_events::TelemetryBus;

/// Write an executable shell stub and return its handle.
fn write_stub(body: &str) -> tempfile::TempPath {
    let mut f = tempfile::Builder::new()
        .suffix(".sh")
        .tempfile()
        .expect("create temp file");
    writeln!(f, "#!/bin/bash").expect("write shebang");
    write!(f, "{body}").expect("write body");

    let mut perms = f.as_file().metadata().expect("stub metadata").permissions();
    perms.set_mode(0o755);
    f.as_file().set_permissions(perms).expect("chmod stub");
    // Close the write handle; an open writable fd makes exec fail with
    // ETXTBSY on Linux. The path (and cleanup-on-drop) remain.
    f.into_temp_path()
}

fn engine_with_interpreter(stub: &tempfile::TempPath) -> OsaEngine {
    OsaEngine::new(EngineConfig {
        osascript_path: stub.to_str().expect("stub path").to_string(),
        ..EngineConfig::default()
    })
}

fn engine_with_runner(stub: &tempfile::TempPath) -> OsaEngine {
    OsaEngine::new(EngineConfig {
        shortcuts_path: stub.to_str().expect("stub path").to_string(),
        ..EngineConfig::default()
    })
}

// ---------------------------------------------------------------------------
// Script execution
// ---------------------------------------------------------------------------

/// Exit 0 returns stdout with exactly the trailing newline trimmed, and the
/// same inputs produce the same output on repeated calls.
#[tokio::test]
async fn run_script_trims_trailing_newline_and_is_idempotent() {
    // Consumes the piped script, answers "2" the way `osascript -e "1+1"`
    // would.
    let stub = write_stub("cat > /dev/null\necho 2\n");
    let engine = engine_with_interpreter(&stub);

    let first = engine
        .run_script("return 1 + 1", RunOptions::new().with_timeout_ms(5000))
        .await
        .expect("script succeeds");
    let second = engine
        .run_script("return 1 + 1", RunOptions::new().with_timeout_ms(5000))
        .await
        .expect("script succeeds again");

    assert_eq!(first, "2");
    assert_eq!(second, first);
}

/// The interpreter sees `[-l, <dialect>, -, ...user_args]` and the script
/// text on stdin.
#[tokio::test]
async fn run_script_passes_dialect_sentinel_and_arguments() {
    let stub = write_stub("script=$(cat)\necho \"$1 $2 $3 $4|$script\"\n");
    let engine = engine_with_interpreter(&stub);

    let output = engine
        .run_script(
            "argv test",
            RunOptions::new()
                .with_language(ScriptLanguage::JavaScript)
                .with_argument("zap")
                .with_timeout_ms(5000),
        )
        .await
        .expect("script succeeds");

    assert_eq!(output, "-l JavaScript - zap|argv test");
}

/// A syntax diagnostic on stderr classifies as `syntax_error`.
#[tokio::test]
async fn run_script_classifies_syntax_errors() {
    let stub = write_stub(
        "cat > /dev/null\n\
         echo 'syntax error: Expected expression but found end of script. (-2741)' >&2\n\
         exit 1\n",
    );
    let engine = engine_with_interpreter(&stub);

    let failure = engine
        .run_script("malformed(", RunOptions::new().with_timeout_ms(5000))
        .await
        .expect_err("syntax error surfaces");

    assert_eq!(failure.kind, ErrorKind::SyntaxError);
    assert_eq!(failure.context["osa_code"], -2741);
}

/// An authorization diagnostic classifies as `permission_denied`.
#[tokio::test]
async fn run_script_classifies_permission_denials() {
    let stub = write_stub(
        "cat > /dev/null\n\
         echo 'execution error: Not authorized to send Apple events to Finder. (-1743)' >&2\n\
         exit 1\n",
    );
    let engine = engine_with_interpreter(&stub);

    let failure = engine
        .run_script(
            "tell application \"Finder\" to quit",
            RunOptions::new().with_timeout_ms(5000),
        )
        .await
        .expect_err("denial surfaces");

    assert_eq!(failure.kind, ErrorKind::PermissionDenied);
}

/// A script that overruns its deadline is killed: the work it would have
/// done after the deadline never happens.
#[tokio::test]
async fn run_script_timeout_kills_the_interpreter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let marker = dir.path().join("survived");
    let stub = write_stub("cat > /dev/null\nsleep 2\necho alive > \"$MACAUTO_MARKER\"\n");
    let engine = engine_with_interpreter(&stub);

    let failure = engine
        .run_script(
            "delay 10",
            RunOptions::new()
                .with_timeout_ms(200)
                .with_env("MACAUTO_MARKER", marker.to_str().expect("marker path")),
        )
        .await
        .expect_err("deadline fires");

    assert_eq!(failure.kind, ErrorKind::Timeout);

    // Give a survivor time to reach the marker write; a killed process
    // never does.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(
        !marker.exists(),
        "the interpreter kept running after the timeout"
    );
}

/// A missing interpreter executable is a spawn failure, reported as
/// `not_found` rather than a generic unknown.
#[tokio::test]
async fn missing_interpreter_reports_not_found() {
    let engine = OsaEngine::new(EngineConfig {
        osascript_path: "/nonexistent/osascript".into(),
        ..EngineConfig::default()
    });

    let failure = engine
        .run_script("return 1", RunOptions::new().with_timeout_ms(1000))
        .await
        .expect_err("spawn fails");

    assert_eq!(failure.kind, ErrorKind::NotFound);
}

// ---------------------------------------------------------------------------
// File execution
// ---------------------------------------------------------------------------

/// `run_file` infers the dialect from the extension and passes the path in
/// the argument vector (no stdin piping).
#[tokio::test]
async fn run_file_infers_language_from_extension() {
    let stub = write_stub("echo \"$2 $3\"\n");
    let engine = engine_with_interpreter(&stub);

    let mut script = tempfile::Builder::new()
        .suffix(".jxa")
        .tempfile()
        .expect("script file");
    writeln!(script, "console.log('hi')").expect("write script");

    let output = engine
        .run_file(script.path(), RunOptions::new().with_timeout_ms(5000))
        .await
        .expect("file runs");

    let expected = format!("JavaScript {}", script.path().display());
    assert_eq!(output, expected);
}

/// A nonexistent path fails fast with `not_found`; nothing is spawned (the
/// configured interpreter does not even exist).
#[tokio::test]
async fn run_file_missing_path_fails_before_spawn() {
    let engine = OsaEngine::new(EngineConfig {
        osascript_path: "/nonexistent/osascript".into(),
        ..EngineConfig::default()
    });

    let failure = engine
        .run_file(Path::new("/no/such/place.scpt"), RunOptions::new())
        .await
        .expect_err("missing file");

    assert_eq!(failure.kind, ErrorKind::NotFound);
    assert_eq!(failure.context["path"], "/no/such/place.scpt");
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

/// Workflow input is serialized per type and piped to the runner; stdout
/// comes back trimmed.
#[tokio::test]
async fn run_workflow_pipes_serialized_input() {
    let stub = write_stub("if [ \"$1\" = run ]; then cat; echo; fi\n");
    let engine = engine_with_runner(&stub);

    let text = engine
        .run_workflow(
            "Echo",
            WorkflowOptions::new().with_input(serde_json::json!("plain text")),
        )
        .await
        .expect("workflow runs");
    assert_eq!(text, "plain text");

    let number = engine
        .run_workflow("Echo", WorkflowOptions::new().with_input(serde_json::json!(7)))
        .await
        .expect("workflow runs");
    assert_eq!(number, "7");

    let json = engine
        .run_workflow(
            "Echo",
            WorkflowOptions::new().with_input(serde_json::json!({"ids": [1, 2]})),
        )
        .await
        .expect("workflow runs");
    assert_eq!(json, r#"{"ids":[1,2]}"#);
}

/// The runner's missing-workflow diagnostic maps to `not_found`.
#[tokio::test]
async fn run_workflow_missing_name_is_not_found() {
    let stub = write_stub("echo 'Error: Shortcut \"Missing\" not found.' >&2\nexit 1\n");
    let engine = engine_with_runner(&stub);

    let failure = engine
        .run_workflow("Missing", WorkflowOptions::new())
        .await
        .expect_err("unknown workflow");

    assert_eq!(failure.kind, ErrorKind::NotFound);
    assert_eq!(failure.context["workflow"], "Missing");
}

/// Enumeration parses newline- and comma-delimited names; empty output is
/// an empty list.
#[tokio::test]
async fn list_workflows_parses_delimited_names() {
    let stub = write_stub("printf 'Morning Report\\nBackup, Sync\\n'\n");
    let engine = engine_with_runner(&stub);

    let names = engine.list_workflows().await.expect("list");
    assert_eq!(names, vec!["Morning Report", "Backup", "Sync"]);

    let empty_stub = write_stub("exit 0\n");
    let engine = engine_with_runner(&empty_stub);
    assert_eq!(engine.list_workflows().await.expect("list"), Vec::<String>::new());
}

// ---------------------------------------------------------------------------
// Retry end-to-end
// ---------------------------------------------------------------------------

/// A flaky interpreter that times out once and then answers is absorbed by
/// the retry orchestrator.
#[tokio::test]
async fn retry_absorbs_a_transient_timeout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = dir.path().join("first-attempt-done");
    // First invocation sleeps past the deadline; later ones answer fast.
    let stub = write_stub(
        "cat > /dev/null\n\
         if [ ! -e \"$MACAUTO_STATE\" ]; then touch \"$MACAUTO_STATE\"; sleep 5; fi\n\
         echo 2\n",
    );
    let engine = engine_with_interpreter(&stub);
    let telemetry = TelemetryBus::default();

    let policy = RetryPolicy::new(2, Backoff::Exponential);
    let state_path = state.to_str().expect("state path").to_string();
    let output = with_retry(&policy, &telemetry, || {
        engine.run_script(
            "return 1 + 1",
            RunOptions::new()
                .with_timeout_ms(300)
                .with_env("MACAUTO_STATE", state_path.clone()),
        )
    })
    .await
    .expect("second attempt succeeds");

    assert_eq!(output, "2");
}

/// Telemetry observes the whole execution lifecycle on the shared bus.
#[tokio::test]
async fn telemetry_sees_execution_lifecycle() {
    let stub = write_stub("cat > /dev/null\necho ok\n");
    let bus = Arc::new(TelemetryBus::default());
    let mut rx = bus.subscribe();
    let engine = OsaEngine::with_telemetry(
        EngineConfig {
            osascript_path: stub.to_str().expect("stub path").to_string(),
            ..EngineConfig::default()
        },
        bus,
    );

    engine
        .run_script("return \"ok\"", RunOptions::new().with_timeout_ms(5000))
        .await
        .expect("script succeeds");

    let start = rx.recv().await.expect("start event");
    assert_eq!(start.name, "execution.start");
    assert_eq!(start.payload["script"], "return \"ok\"");

    let stop = rx.recv().await.expect("stop event");
    assert_eq!(stop.name, "execution.stop");
    assert_eq!(stop.payload["exit_code"], 0);
}
