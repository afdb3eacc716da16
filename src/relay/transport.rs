//! Uplink transport: opens one duplex message link to the remote endpoint

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Sink, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::error::BridgeError;

pub type LinkSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;
pub type LinkStream = Pin<Box<dyn Stream<Item = Result<Message, WsError>> + Send>>;

/// An established connection, split into its write and read halves
pub struct Link {
    pub sink: LinkSink,
    pub stream: LinkStream,
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<Link, BridgeError>;
}

/// WebSocket transport (ws:// and wss://)
pub struct WebSocketTransport {
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &str) -> Result<Link, BridgeError> {
        match tokio::time::timeout(self.connect_timeout, connect_async(url)).await {
            Ok(Ok((stream, response))) => {
                tracing::debug!("[Relay] Handshake complete: HTTP {}", response.status());
                let (sink, stream) = stream.split();
                Ok(Link {
                    sink: Box::pin(sink),
                    stream: Box::pin(stream),
                })
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(BridgeError::ConnectionError(format!(
                "handshake timed out after {}s",
                self.connect_timeout.as_secs_f32()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Echo server
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_text() {
                    ws.send(msg).await.unwrap();
                }
            }
        });

        let transport = WebSocketTransport::new(Duration::from_secs(5));
        let mut link = transport
            .open(&format!("ws://{}/socket", addr))
            .await
            .unwrap();

        link.sink.send(Message::Text("hello".into())).await.unwrap();
        let echoed = link.stream.next().await.unwrap().unwrap();
        assert_eq!(echoed, Message::Text("hello".into()));
    }

    #[tokio::test]
    async fn test_open_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = WebSocketTransport::new(Duration::from_secs(5));
        let result = transport.open(&format!("ws://{}/socket", addr)).await;
        assert!(matches!(result, Err(BridgeError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_open_handshake_timeout() {
        // Accepts TCP but never answers the upgrade
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let (_tcp, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let transport = WebSocketTransport::new(Duration::from_millis(200));
        let result = transport.open(&format!("ws://{}/socket", addr)).await;
        assert!(
            matches!(result, Err(BridgeError::ConnectionError(msg)) if msg.contains("timed out"))
        );
    }
}
