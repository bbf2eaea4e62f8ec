// ── Central monitor ──
//
// Sweeps every known device on a fixed cadence, independent of any observer,
// and publishes each result to the shared status store. One sweep is bounded
// by a wall-clock budget; devices not reached in time are reported as
// abandoned and left for the next sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::model::{Device, StatusRecord};
use crate::queue::RateLimitedQueue;
use crate::store::{DeviceSource, StatusStore};
use crate::vendor::DeviceApi;

/// How the monitor spaces its vendor calls.
#[derive(Debug, Clone)]
pub enum MonitorPacing {
    /// Sole caller on the account: sleep between consecutive devices.
    InterDeviceDelay(Duration),
    /// Pollers in this process share the account: go through their queue.
    SharedQueue(RateLimitedQueue),
}

/// Result for one device in a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceOutcome {
    pub device_id: String,
    pub status: StatusRecord,
    /// Probes sent, including the rate-limit retry.
    pub attempts: u32,
    pub published: bool,
}

/// Summary of one sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub started_at: DateTime<Utc>,
    pub results: Vec<DeviceOutcome>,
    pub published: usize,
    /// Devices whose probe or publish failed.
    pub failed: Vec<String>,
    /// Devices not reached before the budget ran out.
    pub abandoned: Vec<String>,
}

/// Scheduled sweep over every device from a [`DeviceSource`].
pub struct CentralMonitor<A, S, D> {
    api: Arc<A>,
    store: Arc<S>,
    devices: Arc<D>,
    config: MonitorConfig,
    pacing: MonitorPacing,
}

impl<A, S, D> CentralMonitor<A, S, D>
where
    A: DeviceApi,
    S: StatusStore,
    D: DeviceSource,
{
    pub fn new(api: Arc<A>, store: Arc<S>, devices: Arc<D>, config: MonitorConfig) -> Self {
        let pacing = MonitorPacing::InterDeviceDelay(config.inter_device_delay);
        Self {
            api,
            store,
            devices,
            config,
            pacing,
        }
    }

    /// Route probes through a queue shared with in-process pollers instead
    /// of sleeping between devices.
    #[must_use]
    pub fn with_shared_queue(mut self, queue: RateLimitedQueue) -> Self {
        self.pacing = MonitorPacing::SharedQueue(queue);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn pacing(&self) -> &MonitorPacing {
        &self.pacing
    }

    /// Probe and publish every device once, within the sweep budget.
    ///
    /// Only a failure to enumerate devices is an error. Per-device failures
    /// are logged and listed in the report.
    pub async fn sweep(&self) -> Result<SweepReport, CoreError> {
        let started_at = Utc::now();
        let deadline = Instant::now() + self.config.budget;
        let devices = self.devices.list_devices().await?;

        info!(devices = devices.len(), "monitor sweep started");

        let mut report = SweepReport {
            started_at,
            results: Vec::with_capacity(devices.len()),
            published: 0,
            failed: Vec::new(),
            abandoned: Vec::new(),
        };

        let total = devices.len();
        let mut remaining = devices.into_iter().map(Arc::new).enumerate();

        while let Some((index, device)) = remaining.next() {
            match tokio::time::timeout_at(deadline, self.check_device(&device)).await {
                Ok(Some(outcome)) => {
                    if outcome.published {
                        report.published += 1;
                    } else {
                        report.failed.push(outcome.device_id.clone());
                    }
                    report.results.push(outcome);
                }
                Ok(None) => report.failed.push(device.id.clone()),
                Err(_) => {
                    report.abandoned.push(device.id.clone());
                    report
                        .abandoned
                        .extend(remaining.by_ref().map(|(_, d)| d.id.clone()));
                    warn!(
                        budget_secs = self.config.budget.as_secs(),
                        abandoned = report.abandoned.len(),
                        "sweep budget exhausted"
                    );
                    break;
                }
            }

            if let MonitorPacing::InterDeviceDelay(delay) = &self.pacing {
                if index + 1 < total {
                    tokio::time::sleep_until((Instant::now() + *delay).min(deadline)).await;
                }
            }
        }

        info!(
            published = report.published,
            failed = report.failed.len(),
            abandoned = report.abandoned.len(),
            "monitor sweep finished"
        );
        Ok(report)
    }

    /// Probe one device (with the single 429 retry) and publish the result.
    /// `None` when the probe could not be executed at all.
    async fn check_device(&self, device: &Arc<Device>) -> Option<DeviceOutcome> {
        let mut attempts = 1;
        let mut status = match self.probe(device).await {
            Ok(status) => status,
            Err(e) => {
                warn!(device = %device.id, error = %e, "probe not executed");
                return None;
            }
        };

        if let Some(retry_delay) = self.config.rate_limit_retry {
            if status.is_rate_limited() {
                debug!(
                    device = %device.id,
                    delay_ms = retry_delay.as_millis(),
                    "vendor busy, retrying once"
                );
                tokio::time::sleep(retry_delay).await;
                attempts += 1;
                match self.probe(device).await {
                    Ok(retried) => status = retried,
                    Err(e) => warn!(device = %device.id, error = %e, "retry not executed"),
                }
            }
        }

        let published = match self.store.publish_status(&device.id, &status).await {
            Ok(()) => true,
            Err(e) => {
                warn!(device = %device.id, error = %e, "failed to publish status");
                false
            }
        };

        let reason = status.error().unwrap_or_default();
        debug!(
            device = %device.id,
            online = status.is_online(),
            reason = %reason,
            published,
            "device checked"
        );

        Some(DeviceOutcome {
            device_id: device.id.clone(),
            status,
            attempts,
            published,
        })
    }

    async fn probe(&self, device: &Arc<Device>) -> Result<StatusRecord, CoreError> {
        match &self.pacing {
            MonitorPacing::InterDeviceDelay(_) => Ok(self.api.query_status(device).await),
            MonitorPacing::SharedQueue(queue) => {
                let api = Arc::clone(&self.api);
                let device = Arc::clone(device);
                queue
                    .enqueue(move || async move { api.query_status(&device).await })
                    .await
            }
        }
    }

    /// Sweep every `interval` until cancelled. The first sweep starts
    /// immediately; a sweep in progress is dropped on cancellation.
    pub async fn run<F>(&self, cancel: &CancellationToken, mut on_report: F)
    where
        F: FnMut(&SweepReport) + Send,
    {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.config.interval.as_secs(), "monitor started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.sweep() => match result {
                    Ok(report) => on_report(&report),
                    Err(e) => warn!(error = %e, "monitor sweep failed"),
                },
            }
        }

        info!("monitor stopped");
    }
}
