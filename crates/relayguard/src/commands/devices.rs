//! `relayguard devices`: list configured devices.

use serde::Serialize;
use tabled::Tabled;

use relayguard_core::Device;

use super::Ctx;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct DeviceView {
    id: String,
    name: Option<String>,
    device_id: String,
    server_url: String,
    complete: bool,
}

impl From<&Device> for DeviceView {
    fn from(d: &Device) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            device_id: d.device_id.clone(),
            server_url: d.server_url.clone(),
            complete: d.is_complete(),
        }
    }
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Device ID")]
    device_id: String,
    #[tabled(rename = "Server")]
    server: String,
    #[tabled(rename = "Config")]
    config: String,
}

fn to_row(v: &DeviceView) -> DeviceRow {
    DeviceRow {
        id: v.id.clone(),
        name: v.name.clone().unwrap_or_default(),
        device_id: v.device_id.clone(),
        server: v.server_url.clone(),
        config: if v.complete { "ready" } else { "incomplete" }.into(),
    }
}

pub fn handle(ctx: &Ctx) -> Result<(), CliError> {
    let views: Vec<DeviceView> = ctx.config.devices().iter().map(DeviceView::from).collect();
    let out = output::render_list(ctx.format, &views, to_row, |v| v.id.clone())?;
    output::print_output(&out, ctx.quiet);
    Ok(())
}
