//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::sync::Arc;

use relayguard_core::{Device, VendorClient};

use super::Ctx;
use crate::error::CliError;

/// Every configured device, or `NoDevices` when the file lists none.
pub fn configured_devices(ctx: &Ctx) -> Result<Vec<Device>, CliError> {
    let devices = ctx.config.devices();
    if devices.is_empty() {
        return Err(CliError::NoDevices {
            path: ctx.config_path.display().to_string(),
        });
    }
    Ok(devices)
}

/// Resolve a device by id or (case-insensitive) name.
pub fn resolve_device(ctx: &Ctx, identifier: &str) -> Result<Device, CliError> {
    ctx.config
        .find_device(identifier)
        .map(relayguard_config::DeviceEntry::to_device)
        .ok_or_else(|| CliError::NotFound {
            identifier: identifier.into(),
        })
}

/// Pick devices out of `pool` by id or name; all of them when `wanted` is empty.
pub fn select_devices(pool: Vec<Device>, wanted: &[String]) -> Result<Vec<Device>, CliError> {
    if wanted.is_empty() {
        return Ok(pool);
    }

    wanted
        .iter()
        .map(|ident| {
            pool.iter()
                .find(|d| {
                    d.id == *ident
                        || d.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(ident))
                })
                .cloned()
                .ok_or_else(|| CliError::NotFound {
                    identifier: ident.clone(),
                })
        })
        .collect()
}

/// Vendor client built from the `[vendor]` section.
pub fn vendor_client(ctx: &Ctx) -> Result<Arc<VendorClient>, CliError> {
    Ok(Arc::new(VendorClient::new(&ctx.config.vendor_config())?))
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal to ask on, refuses instead of guessing.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}
