// ── Core error types ──
//
// User-facing errors from vigia-core. Consumers never see HTTP status codes
// or raw JSON failures directly; `From<vigia_api::Error>` translates
// transport-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach alert server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    /// Inbound payload did not match the expected shape or vocabulary.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Alert not found: {id}")]
    AlertNotFound { id: String },

    /// The initial or recovery snapshot could not be loaded. The store
    /// keeps its last-known-good state.
    #[error("Snapshot load failed: {reason}")]
    SnapshotLoad { reason: String },

    // ── Operation errors ─────────────────────────────────────────────
    /// The server answered an operator action with `success: false`.
    #[error("Action `{action}` on alert {id} rejected: {message}")]
    ActionRejected {
        id: String,
        action: String,
        message: String,
    },

    /// The coordinator was stopped; late results are discarded.
    #[error("Alert synchronization stopped")]
    Stopped,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<vigia_api::Error> for CoreError {
    fn from(err: vigia_api::Error) -> Self {
        match err {
            vigia_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            vigia_api::Error::Transport(ref e) => {
                if e.is_connect() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            vigia_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            vigia_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            // 404 becomes `AlertNotFound` only where the alert id is known.
            vigia_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            vigia_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            vigia_api::Error::ChannelClosed => CoreError::ConnectionFailed {
                url: String::new(),
                reason: "push channel is not open".into(),
            },
            vigia_api::Error::Protocol { message } => CoreError::Protocol { message },
            vigia_api::Error::Deserialization { message, body: _ } => CoreError::Protocol {
                message: format!("unexpected response body: {message}"),
            },
        }
    }
}
