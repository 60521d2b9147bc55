//! Clap derive structures for the `vigia` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vigia -- follow and act on surveillance alerts
#[derive(Debug, Parser)]
#[command(
    name = "vigia",
    version,
    about = "Follow and act on surveillance alerts from the command line",
    long_about = "A CLI for the vigia alert server.\n\n\
        Streams alerts over the push channel when available and falls back\n\
        to the pull API otherwise. Operator actions are applied only once\n\
        the server confirms them.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "VIGIA_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Alert server API URL (overrides profile)
    #[arg(long, short = 's', env = "VIGIA_SERVER", global = true)]
    pub server: Option<String>,

    /// Bearer token
    #[arg(long, env = "VIGIA_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VIGIA_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "VIGIA_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "VIGIA_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream alerts live until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// List and inspect alerts
    #[command(alias = "a")]
    Alerts(AlertsArgs),

    /// Acknowledge an alert
    Ack(ActionArgs),

    /// Resolve an alert
    Resolve(ActionArgs),

    /// Mark an alert as a false alarm
    FalseAlarm(ActionArgs),

    /// Escalate an alert
    Escalate(ActionArgs),

    /// Assign an alert to an operator
    Assign {
        /// Alert ID
        id: String,
        /// Operator to assign
        user: String,
    },

    /// Attach a note to an alert
    Note {
        /// Alert ID
        id: String,
        /// Note text
        text: String,
    },

    /// Show alert counters
    Stats,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll the pull API instead of opening the push channel
    #[arg(long)]
    pub no_push: bool,
}

// ── Alerts ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AlertsArgs {
    #[command(subcommand)]
    pub command: AlertsCommand,
}

#[derive(Debug, Subcommand)]
pub enum AlertsCommand {
    /// Active alerts, newest first
    #[command(alias = "ls")]
    Active,

    /// One page of alert history
    History {
        /// Page number (1-based)
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        /// Alerts per page
        #[arg(long, short = 'l', default_value = "25", value_parser = clap::value_parser!(u32).range(1..=500))]
        limit: u32,
    },

    /// A single alert
    Get {
        /// Alert ID
        id: String,
    },
}

// ── Actions ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ActionArgs {
    /// Alert ID
    pub id: String,

    /// Note to attach
    #[arg(long, short = 'n')]
    pub note: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Show the effective configuration (token redacted)
    Show,

    /// Store a token in the system keyring for the active profile
    SetToken {
        /// The token
        token: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
