//! ConnectionManager: owns the single uplink connection and its reconnect policy
//!
//! The connection lives in a supervised tokio task:
//!
//! ```text
//! Disconnected --connect--> Connecting --open ok--> Open
//!      ^                        |                     |
//!      |                   open failed              closed
//!      +------------------------+---------------------+
//!      (after reconnect_delay, back to Connecting while reconnect is enabled)
//! ```
//!
//! The delay is fixed and retries never stop while reconnect is enabled.
//! This is intentional for a single always-on printer; there is no backoff
//! growth and no retry limit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use super::state::{ConnectionState, StateCell};
use super::transport::{Link, Transport};
use super::Relay;
use crate::models::OutboundMessage;

type OutboundRx = mpsc::UnboundedReceiver<String>;

pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    reconnect_delay: Duration,
    state: Arc<StateCell>,
    reconnect: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
    outbound_tx: mpsc::UnboundedSender<String>,
    /// Held here while no connection task runs; the task takes it and gives it back on exit
    outbound_rx: Arc<Mutex<Option<OutboundRx>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, reconnect_delay: Duration) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);

        Self {
            transport,
            reconnect_delay,
            state: Arc::new(StateCell::new()),
            reconnect: Arc::new(AtomicBool::new(true)),
            shutdown,
            outbound_tx,
            outbound_rx: Arc::new(Mutex::new(Some(outbound_rx))),
            task: Mutex::new(None),
        }
    }

    /// Start the connection task for `url`.
    ///
    /// Returns false without doing anything if a task is already running or
    /// the manager has been closed.
    pub fn connect(&self, url: &str) -> bool {
        if *self.shutdown.borrow() {
            tracing::warn!("[Relay] connect({}) ignored: manager closed", url);
            return false;
        }

        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            tracing::debug!("[Relay] connect({}) ignored: already {}", url, self.state());
            return false;
        }

        let Some(outbound) = self
            .outbound_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            tracing::warn!("[Relay] connect({}) ignored: previous task still exiting", url);
            return false;
        };

        self.reconnect.store(true, Ordering::SeqCst);

        let supervisor = Supervisor {
            transport: self.transport.clone(),
            url: url.to_string(),
            reconnect_delay: self.reconnect_delay,
            state: self.state.clone(),
            reconnect: self.reconnect.clone(),
            shutdown: self.shutdown.subscribe(),
            outbound,
            outbound_slot: self.outbound_rx.clone(),
        };
        *task = Some(tokio::spawn(supervisor.run()));
        true
    }

    /// Queue `message` for transmission if the connection is open.
    ///
    /// Never waits for the network. Returns whether the message was handed
    /// to the connection; there is no delivery acknowledgment.
    pub fn send(&self, message: &OutboundMessage<'_>) -> bool {
        let state = self.state();
        if state != ConnectionState::Open {
            tracing::info!("[Relay] No open connection ({}), update not sent", state);
            return false;
        }

        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("[Relay] Failed to encode outbound message: {}", e);
                return false;
            }
        };

        if self.outbound_tx.send(text).is_err() {
            tracing::warn!("[Relay] Connection task not running, update not sent");
            return false;
        }
        true
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Stop scheduling reconnects; the current connection, if any, stays up
    pub fn disable_reconnect(&self) {
        if self.reconnect.swap(false, Ordering::SeqCst) {
            tracing::info!("[Relay] Reconnect disabled");
        }
    }

    /// Terminal shutdown: no more reconnects, close the active connection and
    /// wait for the connection task to finish.
    pub async fn close(&self) {
        self.disable_reconnect();
        self.shutdown.send_replace(true);

        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("[Relay] Connection task ended abnormally: {}", e);
            }
        }

        self.state.set(ConnectionState::Disconnected);
    }
}

impl Relay for ConnectionManager {
    fn state(&self) -> ConnectionState {
        ConnectionManager::state(self)
    }

    fn send(&self, message: &OutboundMessage<'_>) -> bool {
        ConnectionManager::send(self, message)
    }
}

/// Connection task: one loop iteration per connection attempt
struct Supervisor {
    transport: Arc<dyn Transport>,
    url: String,
    reconnect_delay: Duration,
    state: Arc<StateCell>,
    reconnect: Arc<AtomicBool>,
    shutdown: watch::Receiver<bool>,
    outbound: OutboundRx,
    outbound_slot: Arc<Mutex<Option<OutboundRx>>>,
}

impl Supervisor {
    async fn run(mut self) {
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            self.transition(ConnectionState::Connecting);
            tracing::info!("[Relay] connecting {}", self.url);

            let opened = tokio::select! {
                result = self.transport.open(&self.url) => result,
                _ = self.shutdown.changed() => break,
            };

            match opened {
                Ok(link) => {
                    // A send that raced the previous close may have queued late
                    self.discard_pending();
                    self.transition(ConnectionState::Open);
                    tracing::info!("[Relay] open");
                    self.serve(link).await;
                }
                Err(e) => {
                    tracing::error!("[Relay] error {}", e);
                }
            }

            self.transition(ConnectionState::Disconnected);
            self.discard_pending();

            if !self.reconnect.load(Ordering::SeqCst) || *self.shutdown.borrow() {
                break;
            }

            tracing::info!(
                "[Relay] Reconnecting in {}s",
                self.reconnect_delay.as_secs_f32()
            );
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = self.shutdown.changed() => break,
            }
        }

        self.transition(ConnectionState::Disconnected);
        self.discard_pending();
        tracing::info!("[Relay] Connection task stopped");

        *self
            .outbound_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(self.outbound);
    }

    /// Pump one open link until it closes or shutdown is requested
    async fn serve(&mut self, link: Link) {
        let Link {
            mut sink,
            mut stream,
        } = link;

        loop {
            tokio::select! {
                incoming = stream.next() => match incoming {
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!("[Relay] closed {:?}", frame);
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        tracing::info!("[Relay] message {}", text);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::info!("[Relay] message ({} bytes binary)", data.len());
                    }
                    // Ping/Pong are answered by tungstenite
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("[Relay] error {}", e);
                        break;
                    }
                    None => {
                        tracing::info!("[Relay] closed (stream ended)");
                        break;
                    }
                },
                outgoing = self.outbound.recv() => match outgoing {
                    Some(text) => {
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            tracing::error!("[Relay] error {}", e);
                            break;
                        }
                    }
                    None => break,
                },
                _ = self.shutdown.changed() => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        tracing::debug!("[Relay] Close frame not sent: {}", e);
                    }
                    tracing::info!("[Relay] closed by shutdown");
                    break;
                }
            }
        }
    }

    fn transition(&self, next: ConnectionState) {
        let previous = self.state.set(next);
        if previous != next {
            tracing::debug!("[Relay] {} -> {}", previous, next);
        }
    }

    /// Updates queued for a connection that is gone are dropped, never replayed
    fn discard_pending(&mut self) {
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::warn!("[Relay] Dropped {} unsent updates", dropped);
        }
    }
}
