//! Script execution engine.
//!
//! Provides the process runner, error classifier, execution adapter, and
//! retry orchestrator for driving `osascript` and `shortcuts`. All
//! subprocess management is self-contained (no shared state between calls)
//! for isolation and testability.

pub mod classify;
pub mod engine;
pub mod request;
pub mod retry;
pub mod subprocess;
