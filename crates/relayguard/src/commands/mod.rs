//! Command handlers, one module per top-level subcommand.

pub mod config_cmd;
pub mod devices;
pub mod monitor;
pub mod open;
pub mod status;
pub mod util;
pub mod watch;

use std::path::PathBuf;

use clap::ValueEnum;

use relayguard_config::Config;

use crate::cli::{ColorMode, Command, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

/// Loaded configuration plus the resolved presentation flags.
pub struct Ctx {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub color: bool,
    pub quiet: bool,
    pub yes: bool,
}

impl Ctx {
    /// Command-line flags win over the config file's `[defaults]`.
    pub fn new(config: Config, config_path: PathBuf, global: &GlobalOpts) -> Result<Self, CliError> {
        let format = match global.output {
            Some(format) => format,
            None => parse_value("defaults.output", &config.defaults.output)?,
        };
        let color_mode: ColorMode = match global.color {
            Some(mode) => mode,
            None => parse_value("defaults.color", &config.defaults.color)?,
        };

        Ok(Self {
            config,
            config_path,
            format,
            color: output::should_color(color_mode),
            quiet: global.quiet,
            yes: global.yes,
        })
    }
}

fn parse_value<T: ValueEnum>(field: &str, raw: &str) -> Result<T, CliError> {
    T::from_str(raw, true).map_err(|reason| CliError::Validation {
        field: field.into(),
        reason,
    })
}

/// Route a parsed command to its handler. Config and completions are
/// handled before a config is loaded.
pub async fn dispatch(cmd: Command, ctx: &Ctx) -> Result<(), CliError> {
    match cmd {
        Command::Devices => devices::handle(ctx),
        Command::Status(args) => status::handle(args, ctx).await,
        Command::Watch(args) => watch::handle(args, ctx).await,
        Command::Open(args) => open::handle(args, ctx).await,
        Command::Monitor(args) => monitor::handle(args, ctx).await,
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
