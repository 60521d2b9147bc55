//! Alert listing and lookup handlers.

use std::fmt::Write as _;
use std::sync::Arc;

use tabled::Tabled;
use vigia_core::{Alert, AlertId, SyncCoordinator};

use crate::cli::{AlertsArgs, AlertsCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct AlertRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Camera")]
    camera: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl From<&Arc<Alert>> for AlertRow {
    fn from(a: &Arc<Alert>) -> Self {
        Self {
            id: a.id.to_string(),
            time: a.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            kind: a.alert_type.to_string(),
            priority: a.priority.to_string(),
            status: a.status.to_string(),
            location: a.location.clone(),
            camera: a.camera_id.clone().unwrap_or_default(),
            message: a.message.clone(),
        }
    }
}

/// Multi-line detail view for a single alert.
pub fn detail(alert: &Alert) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Alert     {}", alert.id);
    let _ = writeln!(out, "Type      {}", alert.alert_type);
    let _ = writeln!(out, "Priority  {}", alert.priority);
    let _ = writeln!(out, "Status    {} ({})", alert.status, alert.partition());
    let _ = writeln!(
        out,
        "Time      {}",
        alert.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Location  {}", alert.location);
    let optional = [
        ("Camera", &alert.camera_id),
        ("Assigned", &alert.assigned_to),
        ("Notes", &alert.notes),
        ("Image", &alert.image_url),
        ("Video", &alert.video_url),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            let _ = writeln!(out, "{label:<9} {value}");
        }
    }
    let _ = write!(out, "Message   {}", alert.message);
    out
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    coordinator: &SyncCoordinator,
    args: AlertsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let out = match args.command {
        AlertsCommand::Active => {
            let alerts = coordinator.store().active();
            output::render_list(
                &global.output,
                &alerts,
                |a| AlertRow::from(a),
                |a| a.id.to_string(),
            )?
        }

        AlertsCommand::History { page, limit } => {
            let history = coordinator.load_history(page, limit).await?;
            if matches!(global.output, OutputFormat::Table) {
                let table = output::render_list(
                    &global.output,
                    &history.alerts,
                    |a| AlertRow::from(a),
                    |a| a.id.to_string(),
                )?;
                format!(
                    "{table}\nPage {} of {} ({} alerts)",
                    history.page,
                    history.page_count(),
                    history.total
                )
            } else {
                output::render_single(
                    &global.output,
                    &*history,
                    |_| String::new(),
                    |h| {
                        h.alerts
                            .iter()
                            .map(|a| a.id.to_string())
                            .collect::<Vec<_>>()
                            .join("\n")
                    },
                )?
            }
        }

        AlertsCommand::Get { id } => {
            let alert = coordinator.fetch_alert(&AlertId::new(id)).await?;
            output::render_single(&global.output, &*alert, detail, |a| a.id.to_string())?
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
