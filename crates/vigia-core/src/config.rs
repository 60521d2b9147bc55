// ── Runtime sync configuration ──
//
// These types describe *how* to talk to an alert server. They carry the
// bearer token and connection tuning, but never touch disk. The CLI
// constructs a `SyncConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use vigia_api::transport::{TlsMode, TransportConfig};
use vigia_api::ReconnectConfig;

use crate::error::CoreError;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed appliance certs).
    DangerAcceptInvalid,
}

/// Configuration for synchronizing with a single alert server.
///
/// Built by the CLI, passed to `SyncCoordinator` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Pull API root (e.g., `https://nvr.local/api`).
    pub api_url: Url,
    /// Push channel endpoint. Derived from `api_url` when `None`.
    pub push_url: Option<Url>,
    /// Bearer token sent on every request and on the push upgrade.
    pub token: Option<SecretString>,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Push channel reconnect tuning.
    pub reconnect: ReconnectConfig,
    /// Enable the push channel. When off, the coordinator runs on polling alone.
    pub websocket_enabled: bool,
    /// Polling interval while degraded (seconds).
    pub poll_interval_secs: u64,
    /// Snapshot refresh interval while live (seconds). 0 = never.
    pub refresh_interval_secs: u64,
}

impl SyncConfig {
    /// A config with defaults for everything but the server URL.
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            push_url: None,
            token: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
            websocket_enabled: true,
            poll_interval_secs: 30,
            refresh_interval_secs: 300,
        }
    }

    /// The push endpoint: explicit `push_url`, or `ws(s)://<host>/ws/alerts`
    /// derived from the API URL.
    pub fn push_endpoint(&self) -> Result<Url, CoreError> {
        if let Some(ref url) = self.push_url {
            return Ok(url.clone());
        }

        let mut url = self.api_url.clone();
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(CoreError::Config {
                    message: format!("unsupported API URL scheme: {other}"),
                });
            }
        };
        url.set_scheme(scheme).map_err(|()| CoreError::Config {
            message: format!("cannot derive push URL from {}", self.api_url),
        })?;
        url.set_path("/ws/alerts");
        url.set_query(None);
        Ok(url)
    }

    /// Transport settings for the HTTP client and the push upgrade.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: tls_to_transport(&self.tls),
            timeout: self.timeout,
            token: self.token.clone(),
        }
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
