//! `relayguard watch`: run a poller per device and stream status changes
//! until interrupted.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relayguard_core::{Device, DevicePoller, RateLimitedQueue, StatusRecord};

use super::status::StatusView;
use super::{Ctx, util};
use crate::cli::{OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: WatchArgs, ctx: &Ctx) -> Result<(), CliError> {
    let devices = util::select_devices(util::configured_devices(ctx)?, &args.devices)?;
    let api = util::vendor_client(ctx)?;
    let queue = RateLimitedQueue::new(ctx.config.queue_config());
    let evaluator = ctx.config.staleness();
    let cancel = CancellationToken::new();

    let (tx, mut rx) = mpsc::unbounded_channel::<(Device, StatusRecord)>();
    let mut handles = Vec::with_capacity(devices.len());

    for device in devices {
        let handle = DevicePoller::new(
            device.clone(),
            Arc::clone(&api),
            queue.clone(),
            ctx.config.polling_config(),
        )
        .spawn(&cancel);

        let mut updates = handle.subscribe();
        let tx = tx.clone();
        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let record = updates.borrow_and_update().clone();
                if let Some(record) = record {
                    if tx.send((device.clone(), record)).is_err() {
                        break;
                    }
                }
            }
        });
        handles.push(handle);
    }
    drop(tx);

    info!(devices = handles.len(), "watching devices, press Ctrl-C to stop");

    let interrupted = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "could not listen for Ctrl-C");
        }
    };
    let shown = stream_updates(&mut rx, interrupted, |device, record| {
        let liveness = evaluator.evaluate(Some(record), Utc::now());
        print_update(ctx, &StatusView::new(device, Some(record), liveness))
    })
    .await?;

    debug!(updates = shown, "stopping pollers");
    cancel.cancel();
    for handle in handles {
        handle.stop().await;
    }
    queue.shutdown();
    Ok(())
}

/// Hand each update to `emit` until the channel closes or `shutdown`
/// resolves. Returns how many updates were emitted.
async fn stream_updates<S, F>(
    rx: &mut mpsc::UnboundedReceiver<(Device, StatusRecord)>,
    shutdown: S,
    mut emit: F,
) -> Result<usize, CliError>
where
    S: Future<Output = ()>,
    F: FnMut(&Device, &StatusRecord) -> Result<(), CliError>,
{
    tokio::pin!(shutdown);
    let mut emitted = 0;
    loop {
        tokio::select! {
            biased;
            () = &mut shutdown => break,
            update = rx.recv() => {
                let Some((device, record)) = update else { break };
                emit(&device, &record)?;
                emitted += 1;
            }
        }
    }
    Ok(emitted)
}

fn print_update(ctx: &Ctx, view: &StatusView) -> Result<(), CliError> {
    let line = match ctx.format {
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(view)?,
        OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(view)?),
        OutputFormat::Table | OutputFormat::Plain => {
            let at = view
                .last_check
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_default();
            format!("{} {}", output::dim(&at, ctx.color), view.line(ctx.color))
        }
    };
    output::print_output(&line, ctx.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use tokio::sync::oneshot;

    use super::*;

    fn update(id: &str) -> (Device, StatusRecord) {
        let device = Device::new(id, "https://c.example", id, SecretString::from("k".to_owned()));
        (device, StatusRecord::offline(Utc::now()))
    }

    #[tokio::test]
    async fn interrupt_during_an_update_stops_the_stream() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for id in ["front", "back", "side"] {
            tx.send(update(id)).unwrap();
        }
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut stop_tx = Some(stop_tx);

        let mut seen = Vec::new();
        let emitted = stream_updates(
            &mut rx,
            async {
                let _ = stop_rx.await;
            },
            |device, _| {
                seen.push(device.id.clone());
                if let Some(stop) = stop_tx.take() {
                    stop.send(()).unwrap();
                }
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!(emitted, 1);
        assert_eq!(seen, vec!["front"]);
    }

    #[tokio::test]
    async fn closed_channel_ends_the_stream() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(update("front")).unwrap();
        tx.send(update("back")).unwrap();
        drop(tx);

        let emitted = stream_updates(&mut rx, std::future::pending(), |_, _| Ok(()))
            .await
            .unwrap();
        assert_eq!(emitted, 2);
    }
}
