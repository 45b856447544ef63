//! Telemetry-to-log bridge.
//!
//! [`TelemetryLogger`] subscribes to the [`TelemetryBus`](crate::bus::TelemetryBus)
//! broadcast channel and mirrors every received [`TelemetryEvent`] into the
//! `tracing` log. It runs as a long-lived background task and shuts down
//! when the bus sender is dropped.

use tokio::sync::broadcast;

use crate::bus::TelemetryEvent;

/// Background subscriber that logs every telemetry event.
pub struct TelemetryLogger;

impl TelemetryLogger {
    /// Run the logging loop.
    ///
    /// Consumes events from the provided `receiver` until the channel is
    /// closed (i.e. the bus is dropped). Intended to be spawned:
    ///
    /// ```no_run
    /// use macauto_events::{TelemetryBus, TelemetryLogger};
    ///
    /// let bus = TelemetryBus::default();
    /// tokio::spawn(TelemetryLogger::run(bus.subscribe()));
    /// ```
    pub async fn run(mut receiver: broadcast::Receiver<TelemetryEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    tracing::debug!(
                        channel = %event.name,
                        payload = %event.payload,
                        timestamp = %event.timestamp,
                        "telemetry event"
                    );
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "telemetry logger lagged, events were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("telemetry bus closed, logger shutting down");
                    break;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
