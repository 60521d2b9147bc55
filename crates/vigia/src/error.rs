//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use vigia_config::ConfigError;
use vigia_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to alert server at {url}")]
    #[diagnostic(
        code(vigia::connection_failed),
        help(
            "Check that the alert server is running and reachable.\n\
             URL: {url}\n\
             For self-signed certificates try: vigia --insecure alerts active"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Could not load the active alert snapshot")]
    #[diagnostic(
        code(vigia::snapshot_failed),
        help("The server answered GET /alerts/active with: {reason}")
    )]
    SnapshotFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(vigia::auth_failed),
        help(
            "Verify your token.\n\
             Store one with: vigia config set-token <TOKEN>\n\
             Or set the VIGIA_TOKEN environment variable."
        )
    )]
    AuthFailed { message: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(vigia::not_found),
        help("Run: vigia {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Actions ──────────────────────────────────────────────────────

    #[error("Server rejected `{action}` on alert {id}: {message}")]
    #[diagnostic(
        code(vigia::action_rejected),
        help("Nothing was changed. Check the alert's current state with: vigia alerts get {id}")
    )]
    ActionRejected {
        id: String,
        action: String,
        message: String,
    },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error ({code}): {message}")]
    #[diagnostic(code(vigia::api_error))]
    ApiError { code: String, message: String },

    #[error("Unexpected data from server: {message}")]
    #[diagnostic(
        code(vigia::protocol),
        help("The server may be running an incompatible version.")
    )]
    Protocol { message: String },

    #[error("Interrupted")]
    #[diagnostic(code(vigia::interrupted))]
    Interrupted,

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(vigia::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(vigia::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Profiles live in the file shown by: vigia config path"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No alert server configured")]
    #[diagnostic(
        code(vigia::no_config),
        help(
            "Pass --server <URL>, set VIGIA_SERVER, or add a profile to:\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(vigia::config))]
    Config(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(vigia::json))]
    Json(#[from] serde_json::Error),

    #[error("Could not render YAML: {0}")]
    #[diagnostic(code(vigia::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::SnapshotFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::ActionRejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Protocol { message } => CliError::Protocol { message },

            CoreError::AlertNotFound { id } => CliError::NotFound {
                resource_type: "alert".into(),
                identifier: id,
                list_command: "alerts active".into(),
            },

            CoreError::SnapshotLoad { reason } => CliError::SnapshotFailed { reason },

            CoreError::ActionRejected {
                id,
                action,
                message,
            } => CliError::ActionRejected {
                id,
                action,
                message,
            },

            CoreError::Stopped => CliError::Interrupted,

            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map_or_else(|| "transport".into(), |s| s.to_string()),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other.to_string()),
        }
    }
}
