//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may contain any subset of fields.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for the attune client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttuneSettings {
    /// Settings schema version.
    pub version: String,
    /// Backend endpoints.
    pub server: ServerSettings,
    /// Automatic and manual reconnection timing.
    pub reconnect: ReconnectSettings,
    /// Bootstrap HTTP client.
    pub http: HttpSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl Default for AttuneSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            server: ServerSettings::default(),
            reconnect: ReconnectSettings::default(),
            http: HttpSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Where the backend lives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// HTTP base address for bootstrap requests.
    pub base_url: String,
    /// Path of the WebSocket endpoint, appended to the base address.
    pub ws_path: String,
    /// Explicit WebSocket URL; bypasses derivation from `base_url`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            ws_path: "/ws".to_string(),
            ws_url: None,
        }
    }
}

impl ServerSettings {
    /// Base URL without a trailing slash.
    pub fn http_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// WebSocket endpoint: the explicit override, or `base_url` with its
    /// scheme swapped (`http` → `ws`, `https` → `wss`) plus `ws_path`.
    pub fn ws_url(&self) -> Result<String> {
        if let Some(url) = &self.ws_url {
            return Ok(url.clone());
        }
        let base = self.http_base();
        let swapped = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(SettingsError::InvalidValue(format!(
                "baseUrl must start with http:// or https://, got {base}"
            )));
        };
        let path = if self.ws_path.starts_with('/') {
            self.ws_path.clone()
        } else {
            format!("/{}", self.ws_path)
        };
        Ok(format!("{swapped}{path}"))
    }
}

/// Reconnection timing. Automatic attempts back off linearly:
/// attempt `n` waits `base_delay_ms * n`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectSettings {
    pub base_delay_ms: u64,
    pub max_attempts: u32,
    /// Pause between the forced close and the re-open of a manual reconnect.
    pub manual_delay_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_attempts: 5,
            manual_delay_ms: 1000,
        }
    }
}

impl ReconnectSettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn manual_delay(&self) -> Duration {
        Duration::from_millis(self.manual_delay_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpSettings {
    pub timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
