//! Error handling module

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Fetch error: {0}")]
    FetchError(String),

    #[error("Partial data: {0}")]
    PartialData(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl From<config::ConfigError> for BridgeError {
    fn from(e: config::ConfigError) -> Self {
        BridgeError::ConfigError(e.to_string())
    }
}

impl From<url::ParseError> for BridgeError {
    fn from(e: url::ParseError) -> Self {
        BridgeError::ConfigError(format!("invalid URL: {}", e))
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            "timeout".to_string()
        } else if e.is_connect() {
            format!("connection_failed: {}", e)
        } else {
            e.to_string()
        };
        BridgeError::FetchError(message)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BridgeError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BridgeError::ConnectionError(e.to_string())
    }
}
