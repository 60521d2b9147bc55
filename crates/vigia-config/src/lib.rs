//! Shared configuration for vigia tools.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `vigia_core::SyncConfig`. The CLI layers its
//! `GlobalOpts` overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use vigia_core::{SyncConfig, TlsVerification};

const KEYRING_SERVICE: &str = "vigia";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named alert-server profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Pull API root (e.g., "https://nvr.local/api").
    pub server: String,

    /// Push channel URL. Derived from `server` when unset.
    pub push_url: Option<String>,

    /// Bearer token (plaintext -- prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the token.
    pub token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Push channel on/off. On by default.
    pub websocket: Option<bool>,

    /// Poll interval while degraded (seconds).
    pub poll_interval: Option<u64>,

    /// Snapshot refresh interval while live (seconds, 0 = never).
    pub refresh_interval: Option<u64>,

    /// Reconnect attempts before giving up (0 = forever).
    pub max_reconnect_attempts: Option<u32>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "vigia", "vigia").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("vigia");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + `VIGIA_` environment. A missing file yields defaults.
///
/// Nested keys use a double underscore: `VIGIA_DEFAULTS__TIMEOUT=5`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VIGIA_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution (without CLI flags) ────────────────────────────

/// Resolve the bearer token from the credential chain (no CLI flag step).
///
/// Order: env var named by `token_env`, system keyring
/// (`vigia` / `<profile>/token`), plaintext `token`. Servers without
/// authentication simply have none of the three.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token")) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    profile.token.clone().map(SecretString::from)
}

/// Store a token in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))
        .and_then(|entry| entry.set_password(token))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    let url: Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    match (field, url.scheme()) {
        ("server", "http" | "https") | ("push_url", "ws" | "wss") => Ok(url),
        (_, scheme) => Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("unsupported scheme '{scheme}' in {raw}"),
        }),
    }
}

/// Build a `SyncConfig` from a profile -- no CLI flag overrides.
pub fn profile_to_sync_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SyncConfig, ConfigError> {
    let mut config = SyncConfig::new(parse_url("server", &profile.server)?);

    if let Some(ref push) = profile.push_url {
        config.push_url = Some(parse_url("push_url", push)?);
    }

    config.token = resolve_token(profile, profile_name);

    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    if let Some(enabled) = profile.websocket {
        config.websocket_enabled = enabled;
    }
    if let Some(secs) = profile.poll_interval {
        if secs == 0 {
            return Err(ConfigError::Validation {
                field: "poll_interval".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        config.poll_interval_secs = secs;
    }
    if let Some(secs) = profile.refresh_interval {
        config.refresh_interval_secs = secs;
    }
    if let Some(attempts) = profile.max_reconnect_attempts {
        config.reconnect.max_attempts = (attempts > 0).then_some(attempts);
    }

    Ok(config)
}
