//! `relayguard open`: send a relay command, asking first when the device
//! does not look online.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use relayguard_core::{
    CommandDispatcher, CommandResult, Device, DeviceApi, JsonFileStore, Liveness,
    RateLimitedQueue, RelayAction, StatusStore, VendorClient,
};

use super::{Ctx, util};
use crate::cli::OpenArgs;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: OpenArgs, ctx: &Ctx) -> Result<(), CliError> {
    let device = util::resolve_device(ctx, &args.device)?;
    if !device.is_complete() {
        return Err(CliError::ConfigIncomplete { device: device.id });
    }

    let action = if args.close {
        RelayAction::Close
    } else {
        RelayAction::Open
    };

    let api = util::vendor_client(ctx)?;
    let queue = RateLimitedQueue::new(ctx.config.queue_config());

    if !ctx.yes {
        let liveness = match args.store {
            Some(path) => {
                let path = path.unwrap_or_else(|| ctx.config.store_path());
                stored_liveness(ctx, path, &device).await?
            }
            None => probed_liveness(ctx, &api, &queue, &device).await?,
        };

        if liveness.requires_confirmation() {
            let reason = liveness.reason.as_deref().unwrap_or("unknown");
            let prompt = format!(
                "{} appears offline ({reason}). Send '{action}' anyway?",
                device.display_name()
            );
            if !util::confirm(&prompt, &action.to_string(), ctx.yes)? {
                info!(device = %device.id, "command cancelled by operator");
                queue.shutdown();
                return Ok(());
            }
        }
    }

    let result = CommandDispatcher::new(api, queue.clone())
        .dispatch_action(&device, action)
        .await;
    queue.shutdown();

    let out = output::render_single(ctx.format, &result, |r: &CommandResult| {
        format!("{}: {}", device.display_name(), r.message)
    })?;
    output::print_output(&out, ctx.quiet);

    if result.success {
        Ok(())
    } else {
        Err(CliError::CommandFailed {
            message: result.message,
        })
    }
}

/// Probe once through the queue that the command will use next, so the two
/// calls are spaced like any other pair.
async fn probed_liveness(
    ctx: &Ctx,
    api: &Arc<VendorClient>,
    queue: &RateLimitedQueue,
    device: &Device,
) -> Result<Liveness, CliError> {
    let api = Arc::clone(api);
    let probe_device = device.clone();
    let record = queue
        .enqueue(move || async move { api.query_status(&probe_device).await })
        .await?;
    Ok(ctx.config.staleness().evaluate(Some(&record), Utc::now()))
}

async fn stored_liveness(ctx: &Ctx, path: PathBuf, device: &Device) -> Result<Liveness, CliError> {
    let record = JsonFileStore::new(path).load_status(&device.id).await?;
    Ok(ctx
        .config
        .staleness()
        .evaluate(record.as_ref(), Utc::now()))
}
