mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vigia_core::{CoreError, SyncCoordinator};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose, cli.global.log_json);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so stdout stays parseable.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a server connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "vigia", &mut std::io::stdout());
            Ok(())
        }

        // Watch keeps the coordinator running until interrupted
        Command::Watch(args) => {
            let sync_config = config::build_sync_config(&cli.global)?;
            commands::watch::handle(sync_config, args, &cli.global).await
        }

        // Everything else is a single request-response cycle
        cmd => {
            let sync_config = config::build_sync_config(&cli.global)?;
            let global = &cli.global;

            tracing::debug!(command = ?cmd, "dispatching command");
            SyncCoordinator::oneshot(sync_config, |coordinator| async move {
                Ok::<_, CoreError>(commands::dispatch(cmd, &coordinator, global).await)
            })
            .await?
        }
    }
}
