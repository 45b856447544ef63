//! Telemetry bus for the macauto script execution engine.
//!
//! This crate provides the fire-and-forget observability side channel the
//! engine publishes into:
//!
//! - [`TelemetryBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`TelemetryEvent`] — the canonical event envelope.
//! - [`channel`] — the well-known channel name constants subscribers key
//!   off (`execution.*`, `retry.*`).
//! - [`TelemetryLogger`] — background subscriber that mirrors every event
//!   into the `tracing` log.
//!
//! Telemetry is purely observational: publishing never blocks the emitting
//! operation on a subscriber, and a lagging or dropped subscriber never
//! affects control flow.

pub mod bus;
pub mod logger;

pub use bus::{channel, TelemetryBus, TelemetryEvent};
pub use logger::TelemetryLogger;
