//! `vigia watch`: keep a coordinator running and print every hub event.

use serde_json::json;
use tokio::sync::watch;
use tracing::warn;

use vigia_core::{Alert, CoreError, HubEvent, SyncConfig, SyncCoordinator, SyncState};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

/// One line for an alert event in human-readable formats.
fn alert_line(topic: &str, alert: &Alert, color: bool) -> String {
    format!(
        "{} {:<6} #{} {} {} {} @ {}: {}",
        alert.timestamp.format("%H:%M:%S"),
        topic.to_uppercase(),
        alert.id,
        output::paint_priority(alert.priority, color),
        output::paint_status(alert.status, color),
        alert.alert_type,
        alert.location,
        alert.message
    )
}

fn render_event(event: &HubEvent, format: &OutputFormat, color: bool) -> Result<String, CliError> {
    let topic = event.topic().to_string();

    match format {
        OutputFormat::Json | OutputFormat::JsonCompact | OutputFormat::Yaml => {
            let body = match event {
                HubEvent::New(alert) | HubEvent::Update(alert) => {
                    json!({ "topic": topic, "alert": alert })
                }
                HubEvent::Load(alerts) => json!({ "topic": topic, "alerts": alerts }),
                HubEvent::History(page) => json!({ "topic": topic, "history": page }),
            };
            // One event per line for streaming consumers.
            match format {
                OutputFormat::Yaml => Ok(format!("---\n{}", output::render_yaml(&body)?)),
                _ => output::render_json_compact(&body),
            }
        }
        OutputFormat::Plain => Ok(match event {
            HubEvent::New(alert) | HubEvent::Update(alert) => format!("{topic} {}", alert.id),
            HubEvent::Load(alerts) => format!("{topic} {}", alerts.len()),
            HubEvent::History(page) => format!("{topic} {}", page.page),
        }),
        OutputFormat::Table => Ok(match event {
            HubEvent::New(alert) | HubEvent::Update(alert) => alert_line(&topic, alert, color),
            HubEvent::Load(alerts) => {
                let mut lines = vec![format!("snapshot: {} active alerts", alerts.len())];
                lines.extend(alerts.iter().map(|a| alert_line("active", a, color)));
                lines.join("\n")
            }
            HubEvent::History(page) => format!("history page {}", page.page),
        }),
    }
}

/// Report coordinator state changes on stderr until the sender is gone.
async fn report_states(mut states: watch::Receiver<SyncState>) {
    while states.changed().await.is_ok() {
        let state = *states.borrow_and_update();
        eprintln!("sync: {state}");
    }
}

pub async fn handle(
    mut config: SyncConfig,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.no_push {
        config.websocket_enabled = false;
    }

    let coordinator = SyncCoordinator::new(config)?;
    let format = global.output.clone();
    let color = output::should_color(&global.color);
    let quiet = global.quiet;

    let subscription = coordinator.hub().subscribe_all(move |event: &HubEvent| {
        let line = render_event(event, &format, color)?;
        output::print_output(&line, quiet);
        Ok(())
    });

    let states = (!quiet).then(|| tokio::spawn(report_states(coordinator.sync_state())));

    match coordinator.start().await {
        Ok(()) => {}
        // The coordinator keeps polling; keep watching.
        Err(CoreError::SnapshotLoad { reason }) => {
            warn!(%reason, "initial snapshot failed, retrying in the background");
        }
        Err(e) => {
            coordinator.stop().await;
            return Err(e.into());
        }
    }

    tokio::signal::ctrl_c().await?;

    subscription.dispose();
    coordinator.stop().await;
    if let Some(task) = states {
        task.abort();
    }
    Ok(())
}
