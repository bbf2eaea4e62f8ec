//! Clap derive structures for the `relayguard` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// relayguard -- watch and open cloud-connected door relays
#[derive(Debug, Parser)]
#[command(
    name = "relayguard",
    version,
    about = "Monitor and control cloud-connected door relays",
    long_about = "Polls relay devices through their vendor cloud without exceeding the\n\
        account's request budget, publishes status for other processes, and\n\
        sends open/close commands through the same rate-limited queue.",
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
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "RELAYGUARD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (defaults to `defaults.output` from the config file)
    #[arg(long, short = 'o', env = "RELAYGUARD_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// List configured devices
    #[command(alias = "dev", alias = "d")]
    Devices,

    /// Show device status, probed now or read from the shared status file
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Poll devices continuously and print every status change
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Open (or close) a door relay
    Open(OpenArgs),

    /// Run the central monitor that publishes status for every device
    #[command(alias = "mon")]
    Monitor(MonitorArgs),

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Command Arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Device id or name (all devices when omitted)
    pub device: Option<String>,

    /// Read the shared status file instead of probing
    /// (optional path, defaults to `monitor.store_path`)
    #[arg(long, num_args = 0..=1)]
    pub store: Option<Option<PathBuf>>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Device ids or names (all devices when omitted)
    pub devices: Vec<String>,
}

#[derive(Debug, Args)]
pub struct OpenArgs {
    /// Device id or name
    pub device: String,

    /// Close the relay instead of opening it
    #[arg(long)]
    pub close: bool,

    /// Judge liveness from the shared status file instead of probing first
    #[arg(long, num_args = 0..=1)]
    pub store: Option<Option<PathBuf>>,
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// Run a single sweep, print the report and exit
    #[arg(long)]
    pub once: bool,

    /// Status file to publish to (defaults to `monitor.store_path`)
    #[arg(long)]
    pub store: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display the resolved configuration (secrets redacted)
    Show,

    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Store a device auth key in the system keyring
    SetKey {
        /// Device id
        device: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
