//! Connection state shared between the relay task and its observers

use std::fmt;

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-writer state cell. The relay task writes; anyone may read or
/// subscribe to transitions.
#[derive(Debug)]
pub struct StateCell {
    tx: watch::Sender<ConnectionState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    pub fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Returns the previous state
    pub(crate) fn set(&self, state: ConnectionState) -> ConnectionState {
        self.tx.send_replace(state)
    }

    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disconnected() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_set_returns_previous() {
        let cell = StateCell::new();
        assert_eq!(cell.set(ConnectionState::Connecting), ConnectionState::Disconnected);
        assert_eq!(cell.set(ConnectionState::Open), ConnectionState::Connecting);
        assert_eq!(cell.get(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn test_subscriber_sees_transition() {
        let cell = StateCell::new();
        let mut rx = cell.subscribe();

        cell.set(ConnectionState::Open);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionState::Open);
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }
}
