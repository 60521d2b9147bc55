//! Command dispatch: bridges CLI args -> coordinator calls -> output formatting.

pub mod actions;
pub mod alerts;
pub mod config_cmd;
pub mod stats;
pub mod watch;

use vigia_core::SyncCoordinator;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a one-shot command to the appropriate handler.
///
/// The coordinator has already loaded the active snapshot.
pub async fn dispatch(
    cmd: Command,
    coordinator: &SyncCoordinator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Alerts(args) => alerts::handle(coordinator, args, global).await,
        Command::Ack(args) => actions::acknowledge(coordinator, args, global).await,
        Command::Resolve(args) => actions::resolve(coordinator, args, global).await,
        Command::FalseAlarm(args) => actions::false_alarm(coordinator, args, global).await,
        Command::Escalate(args) => actions::escalate(coordinator, args, global).await,
        Command::Assign { id, user } => actions::assign(coordinator, &id, &user, global).await,
        Command::Note { id, text } => actions::note(coordinator, &id, &text, global).await,
        Command::Stats => stats::handle(coordinator, global),
        // Config, Completions and Watch are handled before dispatch
        Command::Config(_) | Command::Completions(_) | Command::Watch(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "not a one-shot command".into(),
        }),
    }
}
