//! `relayguard config`: inspect and bootstrap the config file.

use std::path::{Path, PathBuf};

use relayguard_config::{Config, load_config, render_template, store_auth_key};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::Ctx;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

pub fn handle(args: ConfigArgs, global: &GlobalOpts, path: &Path) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => {
            let config = load_config(Some(path))?;
            let ctx = Ctx::new(redacted(config), path.to_path_buf(), global)?;
            let out = output::render_single(ctx.format, &ctx.config, |cfg| {
                toml::to_string_pretty(cfg).unwrap_or_else(|e| format!("# {e}"))
            })?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }
        ConfigCommand::Init { force } => init(path, force, global.quiet),
        ConfigCommand::SetKey { device } => set_key(path, &device, global.quiet),
    }
}

fn redacted(mut config: Config) -> Config {
    for entry in &mut config.devices {
        if entry.auth_key.is_some() {
            entry.auth_key = Some(REDACTED.into());
        }
    }
    config
}

fn init(path: &Path, force: bool, quiet: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::ConfigExists {
            path: path.display().to_string(),
        });
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_template()?)?;
    output::print_output(&format!("Wrote {}", path.display()), quiet);
    Ok(())
}

fn set_key(path: &Path, device: &str, quiet: bool) -> Result<(), CliError> {
    let config = load_config(Some(path))?;
    let entry = config
        .find_device(device)
        .ok_or_else(|| CliError::NotFound {
            identifier: device.into(),
        })?;

    let key = dialoguer::Password::new()
        .with_prompt(format!("Auth key for {}", entry.id))
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    if key.trim().is_empty() {
        return Err(CliError::Validation {
            field: "auth key".into(),
            reason: "must not be empty".into(),
        });
    }

    store_auth_key(&entry.id, key.trim())?;
    output::print_output(&format!("Stored auth key for {} in the system keyring", entry.id), quiet);
    Ok(())
}

/// Config path from `--config`, falling back to the platform location.
pub fn resolve_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(relayguard_config::config_path)
}
