//! PrinterSyncer: fixed-cadence poll loop
//!
//! Every tick: fetch a snapshot, diff it against the previous one, and hand
//! the changed fields to the relay. A failed iteration is logged and the loop
//! carries on with the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::diff::Differ;
use crate::models::OutboundMessage;
use crate::octoprint::client::SnapshotSource;
use crate::relay::{ConnectionState, Relay};

/// Result of a single poll iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    FetchFailed,
    Unchanged,
    /// Number of changed fields handed to the relay
    Sent(usize),
    NotConnected,
    SendRejected,
}

pub struct PrinterSyncer {
    source: Arc<dyn SnapshotSource>,
    relay: Arc<dyn Relay>,
    /// Owned baseline; `poll_once` is its only writer
    differ: Differ,
    socket_key: String,
    period: Duration,
}

impl PrinterSyncer {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        relay: Arc<dyn Relay>,
        socket_key: String,
        period: Duration,
    ) -> Self {
        Self {
            source,
            relay,
            differ: Differ::new(),
            socket_key,
            period,
        }
    }

    /// Run the poll loop (runs forever)
    pub async fn start(mut self) {
        tracing::info!(
            "[PrinterSync] Starting poll loop (interval: {}s)",
            self.period.as_secs_f32()
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    pub async fn poll_once(&mut self) -> PollOutcome {
        let snapshot = match self.source.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("[PrinterSync] Octoprint not running: {}", e);
                return PollOutcome::FetchFailed;
            }
        };

        let changes = self.differ.advance(snapshot);
        if changes.is_empty() {
            tracing::debug!("[PrinterSync] No changes");
            return PollOutcome::Unchanged;
        }

        let state = self.relay.state();
        if state != ConnectionState::Open {
            tracing::info!(
                "[PrinterSync] {} changed fields not sent: uplink {}",
                changes.len(),
                state
            );
            return PollOutcome::NotConnected;
        }

        let message = OutboundMessage::new(&self.socket_key, &changes);
        if self.relay.send(&message) {
            tracing::debug!(
                "[PrinterSync] Sent {} changed fields: {}",
                changes.len(),
                changes.keys().map(String::as_str).collect::<Vec<_>>().join(", ")
            );
            PollOutcome::Sent(changes.len())
        } else {
            PollOutcome::SendRejected
        }
    }

    #[cfg(test)]
    pub fn baseline(&self) -> &crate::models::Snapshot {
        self.differ.baseline()
    }
}
