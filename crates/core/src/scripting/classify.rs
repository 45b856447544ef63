//! Error classification for interpreter diagnostics.
//!
//! `osascript` and `shortcuts` report failures as free-form text, not a
//! structured protocol, so classification is substring-based against an
//! ordered rule table. The table is data, not control flow: auditing or
//! extending the taxonomy means editing [`CLASSIFICATION_RULES`], and the
//! rule order is the documented tie-breaker (first match wins).
//!
//! The timeout case never reaches this module — it is produced directly by
//! the process runner's deadline path, because a killed process's stderr is
//! unreliable.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ErrorKind, ScriptFailure};

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// One classification rule: any needle matching the normalized stderr
/// assigns the kind.
#[derive(Debug)]
pub struct ClassificationRule {
    /// Lowercase, ASCII-apostrophe substrings to search for.
    pub needles: &'static [&'static str],
    /// Kind assigned on match.
    pub kind: ErrorKind,
    /// Fallback message when the diagnostic text is empty.
    pub summary: &'static str,
}

/// Ordered rule table; earlier rules win.
///
/// Ordering rationale: authorization diagnostics often name an application,
/// so the permission rule must precede the missing-target rule; syntax
/// markers are unambiguous and go last. Needles cover both the marker
/// phrases and the parenthesized OSA codes the interpreter appends, so a
/// localized or reworded message still classifies when the code survives.
pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule {
        needles: &[
            "not authorized",
            "not allowed assistive access",
            "not allowed to send apple events",
            "(-1743)",
            "(-25211)",
            "(-10004)",
        ],
        kind: ErrorKind::PermissionDenied,
        summary: "the script was denied an automation or accessibility authorization",
    },
    ClassificationRule {
        needles: &[
            "isn't running",
            "is not running",
            "doesn't exist",
            "does not exist",
            "can't be found",
            "(-600)",
            "(-1728)",
        ],
        kind: ErrorKind::NotFound,
        summary: "the script's target application or object could not be found",
    },
    ClassificationRule {
        needles: &["syntax error", "(-2740)", "(-2741)"],
        kind: ErrorKind::SyntaxError,
        summary: "the interpreter rejected the script before running it",
    },
];

static OSA_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((-\d+)\)").expect("valid regex"));

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

/// Map a non-zero exit and its captured output onto the taxonomy.
///
/// Never called for exit code 0 and never produces
/// [`ErrorKind::Timeout`]. Unmatched diagnostics fall back to
/// [`ErrorKind::ExecutionError`]; a completely silent failure (no output on
/// either stream) is [`ErrorKind::Unknown`].
pub fn classify(exit_code: i32, stdout: &str, stderr: &str) -> ScriptFailure {
    let normalized = normalize(stderr);
    let osa_code = extract_osa_code(stderr);

    let matched = CLASSIFICATION_RULES
        .iter()
        .find(|rule| rule.needles.iter().any(|n| normalized.contains(n)));

    let kind = match matched {
        Some(rule) => rule.kind,
        None if stderr.trim().is_empty() && stdout.trim().is_empty() => ErrorKind::Unknown,
        None => ErrorKind::ExecutionError,
    };

    let message = stderr
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| match matched {
            Some(rule) => rule.summary.to_string(),
            None => format!("process exited with code {exit_code} and no diagnostic output"),
        });

    let mut failure = ScriptFailure::new(kind, message)
        .with_context("exit_code", exit_code)
        .with_context("stdout", stdout)
        .with_context("stderr", stderr);
    if let Some(code) = osa_code {
        failure = failure.with_context("osa_code", code);
    }
    failure
}

/// Extract the first parenthesized OSA-style numeric code, e.g. `-1743`
/// from `"Not authorized to send Apple events to Finder. (-1743)"`.
pub fn extract_osa_code(stderr: &str) -> Option<i64> {
    OSA_CODE
        .captures(stderr)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Lowercase the diagnostic and fold typographic apostrophes and quotes to
/// ASCII, so needles match both `isn't` and the `isn’t` the interpreter
/// actually emits.
pub(crate) fn normalize(stderr: &str) -> String {
    stderr
        .to_lowercase()
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201c}', '\u{201d}'], "\"")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
