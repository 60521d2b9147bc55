use thiserror::Error;

/// Top-level error type for the `vigia-api` crate.
///
/// Covers every failure mode across both API surfaces:
/// authentication, transport, the REST pull API, and the push channel.
/// `vigia-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The server rejected the bearer token (HTTP 401/403).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST API ────────────────────────────────────────────────────
    /// Non-success HTTP status from the pull API.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Push channel ────────────────────────────────────────────────
    /// Push channel failed to open or broke while reading/writing.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// An outbound message was sent while the channel was not open.
    #[error("Push channel is not open")]
    ChannelClosed,

    /// Inbound message body could not be validated.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) | Self::ChannelClosed => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }
}
