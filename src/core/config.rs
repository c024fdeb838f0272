use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::core::error::{AppError, AppResult};

/// Prefix for environment overrides, e.g. `TWACHAT_API_URL`
pub const ENV_PREFIX: &str = "TWACHAT_";

/// Default config file, read from the working directory if present
pub const CONFIG_FILE: &str = "twachat.toml";

/// Environment variable holding the raw init data outside Telegram
pub const INIT_DATA_ENV: &str = "TWA_INIT_DATA";

/// Log file path override
pub const LOG_FILE_ENV: &str = "TWACHAT_LOG_FILE";

/// Client configuration
///
/// Layered as: built-in defaults, then `twachat.toml`, then `TWACHAT_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend REST base URL (`http`/`https`)
    pub api_url: String,
    /// Backend WebSocket base URL (`ws`/`wss`)
    pub websocket_url: String,
    /// Per-request timeout for the resource client (seconds)
    pub request_timeout_secs: u64,
    /// Timeout for the WebSocket handshake (seconds)
    pub connect_timeout_secs: u64,
    /// User-Agent sent with every HTTP request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            websocket_url: "ws://localhost:8000".to_string(),
            request_timeout_secs: network::REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: network::CONNECT_TIMEOUT_SECS,
            user_agent: concat!("twachat/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Loads the layered configuration using the default config file.
    pub fn load() -> AppResult<Self> {
        Self::load_from(CONFIG_FILE)
    }

    /// Loads the layered configuration with an explicit TOML file.
    ///
    /// A missing file is not an error; figment simply skips it.
    pub fn load_from(path: impl AsRef<Path>) -> AppResult<Self> {
        let config: ClientConfig = Figment::from(Serialized::defaults(ClientConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that both base URLs parse and carry the right scheme.
    pub fn validate(&self) -> AppResult<()> {
        let api = Url::parse(&self.api_url)?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(AppError::Config(format!(
                "api_url must be http(s), got {}",
                api.scheme()
            )));
        }
        let ws = Url::parse(&self.websocket_url)?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(AppError::Config(format!(
                "websocket_url must be ws(s), got {}",
                ws.scheme()
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(AppError::Config("request_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Builds a config pointing both endpoints at one server (tests, local dev).
    pub fn for_base(api_url: impl Into<String>, websocket_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            websocket_url: websocket_url.into(),
            ..Self::default()
        }
    }
}

/// Network configuration
pub mod network {
    /// Request timeout for HTTP requests (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// WebSocket handshake timeout (in seconds)
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Authorization scheme expected by the backend
    pub const AUTH_SCHEME: &str = "twa";

    /// Query parameter carrying the credential on the socket URL
    pub const WS_INIT_DATA_PARAM: &str = "initData";

    /// Path of the realtime endpoint
    pub const WS_PATH: &str = "/ws";

    /// Buffer size for decoded realtime events
    pub const EVENT_BUFFER: usize = 256;
}
