//! Configuration module
//!
//! Settings come from a `KEY=VALUE` vars file (INI syntax, `#` comments)
//! overlaid by process environment variables with the same names. Key names
//! are case-insensitive: every source is folded to lower case on merge.

use std::time::Duration;

use config::{Environment, File, FileFormat, Source};
use serde::Deserialize;
use url::Url;

use crate::error::BridgeError;

/// Vars file used when `OCTO_BRIDGE_VARS` is not set
pub const DEFAULT_VARS_FILE: &str = "vars.txt";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// host:port (or full URL) of the OctoPrint instance
    pub octo_url: String,
    /// Value of the `X-Api-Key` header
    pub octo_key: String,
    pub ws_url: String,
    /// Identity key embedded in every outbound message
    pub ws_key: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub log_file: Option<String>,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    10
}

impl Config {
    /// Load from the vars file and environment. Missing keys are fatal.
    pub fn load() -> Result<Self, BridgeError> {
        let vars_path =
            std::env::var("OCTO_BRIDGE_VARS").unwrap_or_else(|_| DEFAULT_VARS_FILE.to_string());

        Self::from_sources(
            File::new(&vars_path, FileFormat::Ini).required(false),
            Environment::default(),
        )
    }

    /// Environment wins over the vars file
    fn from_sources<F, E>(vars: F, env: E) -> Result<Self, BridgeError>
    where
        F: Source + Send + Sync + 'static,
        E: Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(vars)
            .add_source(env)
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate()
    }

    fn validate(mut self) -> Result<Self, BridgeError> {
        for (key, value) in [
            ("OCTO_URL", &self.octo_url),
            ("OCTO_KEY", &self.octo_key),
            ("WS_URL", &self.ws_url),
            ("WS_KEY", &self.ws_key),
        ] {
            if value.trim().is_empty() {
                return Err(BridgeError::ConfigError(format!("{} is empty", key)));
            }
        }

        if self.poll_interval_secs == 0 {
            return Err(BridgeError::ConfigError(
                "POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        self.ws_url = http_to_ws_url(self.ws_url.trim()).ok_or_else(|| {
            BridgeError::ConfigError(format!("WS_URL has unsupported scheme: {}", self.ws_url))
        })?;
        Url::parse(&self.ws_url)?;

        // Fail at startup rather than on the first poll
        self.octo_base_url()?;

        Ok(self)
    }

    /// Base URL of the status API, always ending in `/`
    pub fn octo_base_url(&self) -> Result<Url, BridgeError> {
        let raw = self.octo_url.trim().trim_end_matches('/');
        let with_scheme = if raw.contains("://") {
            format!("{}/", raw)
        } else {
            format!("http://{}/", raw)
        };
        Ok(Url::parse(&with_scheme)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Convert HTTP/HTTPS URL to WS/WSS URL
fn http_to_ws_url(url: &str) -> Option<String> {
    if let Some(rest) = url.strip_prefix("https://") {
        Some(format!("wss://{}", rest))
    } else if let Some(rest) = url.strip_prefix("http://") {
        Some(format!("ws://{}", rest))
    } else if url.starts_with("ws://") || url.starts_with("wss://") {
        Some(url.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_vars(text: &str) -> Result<Config, BridgeError> {
        from_vars_and_env(text, &[])
    }

    fn from_vars_and_env(text: &str, env: &[(&str, &str)]) -> Result<Config, BridgeError> {
        let env = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_sources(
            File::from_str(text, FileFormat::Ini),
            Environment::default().source(Some(env)),
        )
    }

    const FULL: &str = "\
# OctoPrint
OCTO_URL=192.168.1.20:5000
OCTO_KEY=abc123
WS_URL=wss://printers.example.com/socket
WS_KEY=printer-one
";

    #[test]
    fn test_load_required_keys_with_defaults() {
        let config = tokio_test::assert_ok!(from_vars(FULL));

        assert_eq!(config.octo_url, "192.168.1.20:5000");
        assert_eq!(config.octo_key, "abc123");
        assert_eq!(config.ws_url, "wss://printers.example.com/socket");
        assert_eq!(config.ws_key, "printer-one");
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(config.log_file.is_none());
    }

    #[test]
    fn test_optional_overrides() {
        let text = format!("{}POLL_INTERVAL_SECS=2\nLOG_FILE=/tmp/octo.log\n", FULL);
        let config = from_vars(&text).unwrap();

        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.log_file.as_deref(), Some("/tmp/octo.log"));
    }

    #[test]
    fn test_environment_overrides_vars_file() {
        let config = from_vars_and_env(
            FULL,
            &[("OCTO_URL", "env-host:6000"), ("POLL_INTERVAL_SECS", "3"), ("HOME", "/root")],
        )
        .unwrap();

        assert_eq!(config.octo_url, "env-host:6000");
        assert_eq!(config.octo_key, "abc123");
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
    }

    #[test]
    fn test_environment_supplies_missing_key() {
        let text = FULL.replace("WS_KEY=printer-one\n", "");
        tokio_test::assert_err!(from_vars(&text));

        let config = from_vars_and_env(&text, &[("WS_KEY", "from-env")]).unwrap();
        assert_eq!(config.ws_key, "from-env");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let text = "OCTO_URL=localhost\nOCTO_KEY=k\nWS_URL=ws://remote/ws\n";
        let err = from_vars(text).unwrap_err();
        assert!(matches!(err, BridgeError::ConfigError(_)));
    }

    #[test]
    fn test_empty_key_is_config_error() {
        let text = FULL.replace("OCTO_KEY=abc123", "OCTO_KEY=");
        let err = from_vars(&text).unwrap_err();
        assert!(matches!(err, BridgeError::ConfigError(_)));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let text = format!("{}POLL_INTERVAL_SECS=0\n", FULL);
        tokio_test::assert_err!(from_vars(&text));
    }

    #[test]
    fn test_ws_url_scheme_normalized() {
        let text = FULL.replace("wss://printers", "https://printers");
        let config = from_vars(&text).unwrap();
        assert_eq!(config.ws_url, "wss://printers.example.com/socket");

        let text = FULL.replace("wss://printers", "ftp://printers");
        assert!(from_vars(&text).is_err());
    }

    #[test]
    fn test_octo_base_url() {
        let config = from_vars(FULL).unwrap();
        assert_eq!(
            config.octo_base_url().unwrap().as_str(),
            "http://192.168.1.20:5000/"
        );

        let text = FULL.replace("192.168.1.20:5000", "https://octopi.local/");
        let config = from_vars(&text).unwrap();
        assert_eq!(
            config.octo_base_url().unwrap().as_str(),
            "https://octopi.local/"
        );
    }

    #[test]
    fn test_http_to_ws_url() {
        assert_eq!(
            http_to_ws_url("http://localhost:8080/ws"),
            Some("ws://localhost:8080/ws".to_string())
        );
        assert_eq!(
            http_to_ws_url("https://example.com/ws"),
            Some("wss://example.com/ws".to_string())
        );
        assert_eq!(
            http_to_ws_url("ws://already:8080/ws"),
            Some("ws://already:8080/ws".to_string())
        );
        assert_eq!(http_to_ws_url("ftp://invalid"), None);
    }
}
