use reqwest::StatusCode;
use thiserror::Error;

/// Centralized error types for the client
///
/// Every layer (identity bridge, resource client, realtime channel, page
/// loaders) converts its failures into this enum. Lower layers never swallow
/// errors: HTTP status information is carried upward untouched so page
/// loaders can branch on it.
///
/// # Example
///
/// ```no_run
/// use twachat::core::error::AppError;
///
/// fn render(err: &AppError) {
///     if err.is_not_found() {
///         eprintln!("nothing here");
///     } else {
///         eprintln!("Error: {}", err);
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// No credential could be obtained from the identity bridge
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The backend refused to resolve the current identity
    #[error("Identity fetch failed{}", status_suffix(.status))]
    IdentityFetch { status: Option<StatusCode> },

    /// Non-2xx response from the backend
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// Loader-level "resource not found" condition
    #[error("Not found: {0}")]
    NotFound(String),

    /// The session is being re-established (or could not be)
    #[error("Session is not valid")]
    SessionInvalid,

    /// Network / transport errors from the HTTP client
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// WebSocket errors
    #[error("Channel error: {0}")]
    Channel(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// The realtime channel is already closed
    #[error("Channel {0} is closed")]
    ChannelGone(uuid::Uuid),

    /// An operation did not complete in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Reasons a credential could not be produced by the identity bridge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The bridge reported no init data (app opened outside Telegram)
    #[error("no init data available, open the app through Telegram")]
    MissingInitData,

    /// The bridge returned an empty blob
    #[error("init data is empty")]
    EmptyInitData,

    /// `raw()` was called before `init()` / `restore()`
    #[error("identity bridge used out of order: {0}")]
    BridgeNotReady(&'static str),

    /// Signature or freshness check failed
    #[error("invalid init data: {0}")]
    InvalidInitData(String),
}

/// A non-2xx response, carrying the raw status for callers to interpret.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code} {status_text}", code = .status.as_u16())]
pub struct HttpError {
    pub status: StatusCode,
    pub status_text: String,
}

impl HttpError {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }
}

fn status_suffix(status: &Option<StatusCode>) -> String {
    match status {
        Some(status) => format!(" with status {}", status),
        None => String::new(),
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// True for loader-level not-found conditions and HTTP 404 responses.
    pub fn is_not_found(&self) -> bool {
        match self {
            AppError::NotFound(_) => true,
            AppError::Http(err) => err.status == StatusCode::NOT_FOUND,
            AppError::IdentityFetch { status } => *status == Some(StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AppError::Http(err) => Some(err.status),
            AppError::IdentityFetch { status } => *status,
            AppError::NotFound(_) => Some(StatusCode::NOT_FOUND),
            AppError::Transport(err) => err.status(),
            _ => None,
        }
    }

    /// Fatal errors end the app load with a blocking message.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Auth(_))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        AppError::Channel(Box::new(err))
    }
}

impl From<figment::Error> for AppError {
    fn from(err: figment::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
