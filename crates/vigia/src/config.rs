//! CLI flag overrides on top of `vigia-config` profiles.
//!
//! This is the single boundary where CLI flags cross into
//! `vigia_core::SyncConfig`.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use vigia_config::{Config, Profile};
use vigia_core::{SyncConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

fn available_profiles(config: &Config) -> String {
    let mut names: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

fn parse_server(raw: &str) -> Result<Url, CliError> {
    let url: Url = raw.parse().map_err(|_| CliError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CliError::Validation {
            field: "server".into(),
            reason: format!("expected an http(s) URL, got {raw}"),
        });
    }
    Ok(url)
}

/// Build a `SyncConfig` from the config file, profile, and CLI overrides.
pub fn build_sync_config(global: &GlobalOpts) -> Result<SyncConfig, CliError> {
    let cfg = vigia_config::load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    match cfg.profiles.get(&profile_name) {
        Some(profile) => resolve_profile(profile, &profile_name, &cfg, global),
        // An explicitly requested profile must exist.
        None if global.profile.is_some() => Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(&cfg),
        }),
        // No profile -- build from CLI flags / env vars alone.
        None => {
            let server = global.server.as_deref().ok_or_else(|| CliError::NoConfig {
                path: vigia_config::config_path().display().to_string(),
            })?;

            let mut config = SyncConfig::new(parse_server(server)?);
            config.token = global.token.clone().map(SecretString::from);
            config.timeout =
                Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout));
            if global.insecure || cfg.defaults.insecure {
                config.tls = TlsVerification::DangerAcceptInvalid;
            }
            Ok(config)
        }
    }
}

/// Translate a profile + global flags into a `SyncConfig`.
///
/// Flags win over the profile: server, token, insecure, timeout.
fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<SyncConfig, CliError> {
    let mut config = vigia_config::profile_to_sync_config(profile, profile_name, &cfg.defaults)?;

    if let Some(ref server) = global.server {
        config.api_url = parse_server(server)?;
        // The profile's push URL belongs to the profile's server.
        config.push_url = None;
    }
    if let Some(ref token) = global.token {
        config.token = Some(SecretString::from(token.clone()));
    }
    if global.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        config.timeout = Duration::from_secs(secs);
    }

    Ok(config)
}
