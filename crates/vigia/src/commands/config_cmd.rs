//! Config subcommand handlers.

use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ProfileSummary {
    name: String,
    server: String,
    default: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Default")]
    default: String,
}

/// What the coordinator would be started with. Never carries the token.
#[derive(Serialize)]
struct EffectiveConfig {
    profile: String,
    server: String,
    push_endpoint: String,
    token: &'static str,
    tls: String,
    timeout_secs: u64,
    push_enabled: bool,
    poll_interval_secs: u64,
    refresh_interval_secs: u64,
    max_reconnect_attempts: Option<u32>,
}

fn effective_detail(cfg: &EffectiveConfig) -> String {
    let attempts = cfg
        .max_reconnect_attempts
        .map_or_else(|| "unlimited".to_owned(), |n| n.to_string());
    [
        format!("Profile         {}", cfg.profile),
        format!("Server          {}", cfg.server),
        format!("Push endpoint   {}", cfg.push_endpoint),
        format!("Token           {}", cfg.token),
        format!("TLS             {}", cfg.tls),
        format!("Timeout         {}s", cfg.timeout_secs),
        format!("Push enabled    {}", cfg.push_enabled),
        format!("Poll interval   {}s", cfg.poll_interval_secs),
        format!("Refresh         {}s", cfg.refresh_interval_secs),
        format!("Reconnects      {attempts}"),
    ]
    .join("\n")
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(
                &vigia_config::config_path().display().to_string(),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = vigia_config::load_config()?;
            let default = config::active_profile_name(global, &cfg);
            let mut profiles: Vec<ProfileSummary> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileSummary {
                    name: name.clone(),
                    server: p.server.clone(),
                    default: *name == default,
                })
                .collect();
            profiles.sort_by(|a, b| a.name.cmp(&b.name));

            let out = output::render_list(
                &global.output,
                &profiles,
                |p| ProfileRow {
                    name: p.name.clone(),
                    server: p.server.clone(),
                    default: if p.default { "*" } else { "" }.into(),
                },
                |p| p.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = vigia_config::load_config_or_default();
            let sync = config::build_sync_config(global)?;
            let push_endpoint = sync.push_endpoint()?;

            let effective = EffectiveConfig {
                profile: config::active_profile_name(global, &cfg),
                server: sync.api_url.to_string(),
                push_endpoint: push_endpoint.to_string(),
                token: if sync.token.is_some() { "(set)" } else { "(none)" },
                tls: format!("{:?}", sync.tls),
                timeout_secs: sync.timeout.as_secs(),
                push_enabled: sync.websocket_enabled,
                poll_interval_secs: sync.poll_interval_secs,
                refresh_interval_secs: sync.refresh_interval_secs,
                max_reconnect_attempts: sync.reconnect.max_attempts,
            };

            let out = output::render_single(&global.output, &effective, effective_detail, |e| {
                e.server.clone()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken { token } => {
            let cfg = vigia_config::load_config_or_default();
            let profile = config::active_profile_name(global, &cfg);
            vigia_config::store_token(&profile, &token)?;
            if !global.quiet {
                eprintln!("Token stored in the system keyring for profile '{profile}'");
            }
            Ok(())
        }
    }
}
