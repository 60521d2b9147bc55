//! Statistics command handler.

use std::fmt::Write as _;

use tabled::Tabled;
use vigia_core::{AlertStatistics, Priority, SyncCoordinator};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Counter")]
    name: String,
    #[tabled(rename = "Alerts")]
    count: usize,
}

fn rows(stats: &AlertStatistics) -> Vec<CountRow> {
    let mut rows = vec![
        CountRow {
            name: "active".into(),
            count: stats.active,
        },
        CountRow {
            name: "settled".into(),
            count: stats.settled,
        },
    ];
    for priority in [Priority::High, Priority::Medium, Priority::Low] {
        rows.push(CountRow {
            name: format!("priority: {priority}"),
            count: stats.by_priority.get(priority),
        });
    }
    for (kind, count) in &stats.by_type {
        rows.push(CountRow {
            name: format!("type: {kind}"),
            count: *count,
        });
    }
    for (status, count) in &stats.by_status {
        rows.push(CountRow {
            name: format!("status: {status}"),
            count: *count,
        });
    }
    rows
}

fn plain(stats: &AlertStatistics) -> String {
    let mut out = String::new();
    for row in rows(stats) {
        let _ = writeln!(out, "{}={}", row.name.replace(": ", "."), row.count);
    }
    out.trim_end().to_owned()
}

pub fn handle(coordinator: &SyncCoordinator, global: &GlobalOpts) -> Result<(), CliError> {
    let stats = coordinator.statistics();

    let out = output::render_single(
        &global.output,
        &stats,
        |s| {
            tabled::Table::new(rows(s))
                .with(tabled::settings::Style::rounded())
                .to_string()
        },
        plain,
    )?;

    output::print_output(&out, global.quiet);
    Ok(())
}
