//! Operator action handlers.
//!
//! Each action waits for the server's confirmation; nothing is printed as
//! done until the confirmed alert comes back.

use vigia_core::{ActionOutcome, AlertId, SyncCoordinator};

use crate::cli::{ActionArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::alerts;

fn report(outcome: &ActionOutcome, verb: &str, id: &AlertId, global: &GlobalOpts) -> Result<(), CliError> {
    match outcome.alert {
        Some(ref alert) => {
            let out = output::render_single(&global.output, &**alert, alerts::detail, |a| {
                a.id.to_string()
            })?;
            output::print_output(&out, global.quiet);
        }
        None => {
            if !global.quiet {
                eprintln!("Alert {id} {verb}");
            }
        }
    }
    if let Some(ref message) = outcome.message {
        if !global.quiet {
            eprintln!("{message}");
        }
    }
    Ok(())
}

pub async fn acknowledge(
    coordinator: &SyncCoordinator,
    args: ActionArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = AlertId::new(args.id);
    let outcome = coordinator
        .dispatcher()
        .acknowledge(&id, args.note.as_deref())
        .await?;
    report(&outcome, "acknowledged", &id, global)
}

pub async fn resolve(
    coordinator: &SyncCoordinator,
    args: ActionArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = AlertId::new(args.id);
    let outcome = coordinator
        .dispatcher()
        .resolve(&id, args.note.as_deref())
        .await?;
    report(&outcome, "resolved", &id, global)
}

pub async fn false_alarm(
    coordinator: &SyncCoordinator,
    args: ActionArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = AlertId::new(args.id);
    let outcome = coordinator
        .dispatcher()
        .mark_false_alarm(&id, args.note.as_deref())
        .await?;
    report(&outcome, "marked as false alarm", &id, global)
}

pub async fn escalate(
    coordinator: &SyncCoordinator,
    args: ActionArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = AlertId::new(args.id);
    let outcome = coordinator
        .dispatcher()
        .escalate(&id, args.note.as_deref())
        .await?;
    report(&outcome, "escalated", &id, global)
}

pub async fn assign(
    coordinator: &SyncCoordinator,
    id: &str,
    user: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if user.trim().is_empty() {
        return Err(CliError::Validation {
            field: "user".into(),
            reason: "must not be empty".into(),
        });
    }
    let id = AlertId::from(id);
    let outcome = coordinator.dispatcher().assign(&id, user).await?;
    report(&outcome, "assigned", &id, global)
}

pub async fn note(
    coordinator: &SyncCoordinator,
    id: &str,
    text: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let id = AlertId::from(id);
    let outcome = coordinator.dispatcher().add_note(&id, text).await?;
    report(&outcome, "updated", &id, global)
}
