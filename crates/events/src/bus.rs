//! In-process telemetry bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`TelemetryBus`] is the central publish/subscribe hub for
//! [`TelemetryEvent`]s. It is designed to be shared via `Arc<TelemetryBus>`
//! between the engine and any number of external subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Channel names
// ---------------------------------------------------------------------------

/// Well-known telemetry channel names.
///
/// Subscribers key off these values in [`TelemetryEvent::name`]. The set is
/// part of the public contract and must stay stable.
pub mod channel {
    /// An interpreter or workflow-runner invocation is about to spawn.
    pub const EXECUTION_START: &str = "execution.start";
    /// An invocation completed (exit code 0).
    pub const EXECUTION_STOP: &str = "execution.stop";
    /// An invocation failed (spawn failure, timeout, or non-zero exit).
    pub const EXECUTION_EXCEPTION: &str = "execution.exception";
    /// A retry-wrapped operation is starting its first attempt.
    pub const RETRY_START: &str = "retry.start";
    /// One attempt of a retry-wrapped operation is beginning.
    pub const RETRY_ATTEMPT: &str = "retry.attempt";
    /// A retry-wrapped operation finished successfully.
    pub const RETRY_STOP: &str = "retry.stop";
    /// A retry-wrapped operation exhausted its attempts or hit a
    /// non-retryable failure.
    pub const RETRY_ERROR: &str = "retry.error";
}

// ---------------------------------------------------------------------------
// TelemetryEvent
// ---------------------------------------------------------------------------

/// A lifecycle notification emitted at a layer boundary.
///
/// Constructed via [`TelemetryEvent::new`] and enriched with
/// [`with_payload`](TelemetryEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Dot-separated channel name, one of the [`channel`] constants.
    pub name: String,

    /// Free-form JSON payload carrying event-specific measurements and
    /// metadata (durations, attempt numbers, output sizes, ...).
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    /// Create a new event on the given channel with an empty payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// TelemetryBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out telemetry hub.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`TelemetryEvent`]. Publication is
/// non-blocking; when the buffer is full, the oldest un-consumed events are
/// dropped and slow receivers observe `RecvError::Lagged`.
pub struct TelemetryBus {
    sender: broadcast::Sender<TelemetryEvent>,
}

impl TelemetryBus {
    /// Create a bus with a specific channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    /// This is the expected steady state for embedders that do not care
    /// about telemetry.
    pub fn publish(&self, event: TelemetryEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Register a new subscriber.
    ///
    /// The receiver sees every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.sender.subscribe()
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for TelemetryBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
