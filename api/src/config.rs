use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Endpoint used when nothing else is configured.
pub const WS_URL: &str = "ws://127.0.0.1:9944";

/// Origin name passed to the extension when requesting authorization.
pub const DEFAULT_APP_NAME: &str = "polkadot-js/apps";

/// Prefix setting that means "use the chain default".
pub const PREFIX_DEFAULT: i32 = -1;

/// User-facing display settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// SS58 address prefix, or [`PREFIX_DEFAULT`].
    pub prefix: i32,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            prefix: PREFIX_DEFAULT,
        }
    }
}

/// Configuration for connecting to a node.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// WebSocket endpoint URL (e.g., "ws://127.0.0.1:9944")
    pub endpoint: String,
    /// Connection timeout
    #[serde(with = "duration_secs")]
    pub connection_timeout: Duration,
    /// Request timeout
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
    /// First delay between reconnection attempts
    #[serde(with = "duration_secs")]
    pub reconnect_delay: Duration,
    /// Upper bound for the reconnection backoff
    #[serde(with = "duration_secs")]
    pub max_reconnect_delay: Duration,
    /// Name presented to the browser extension
    pub app_name: String,
    pub ui: UiSettings,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: WS_URL.to_string(),
            connection_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            reconnect_delay: Duration::from_secs(2),
            max_reconnect_delay: Duration::from_secs(30),
            app_name: DEFAULT_APP_NAME.to_string(),
            ui: UiSettings::default(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom endpoint
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Load a config from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
