// ── Per-device poller ──
//
// One background task per observed device. Each iteration sends a single
// status probe through the shared queue, publishes the record, then sleeps
// for a delay chosen by the backoff state. Cancellation is checked between
// iterations only; a probe already handed to the queue runs to completion
// and its result is dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollingConfig;
use crate::error::CoreError;
use crate::model::{Device, Liveness, StatusRecord};
use crate::queue::RateLimitedQueue;
use crate::staleness::StalenessEvaluator;
use crate::vendor::DeviceApi;

// ── Backoff policy ───────────────────────────────────────────────

/// How a completed probe feeds the backoff state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    RateLimited,
    /// Offline, timeout or any other non-429 failure.
    Failure,
}

impl ProbeOutcome {
    pub fn classify(record: &StatusRecord) -> Self {
        if record.is_online() {
            Self::Success
        } else if record.is_rate_limited() {
            Self::RateLimited
        } else {
            Self::Failure
        }
    }
}

/// `min(max_delay, base_interval * 2^consecutive)`, saturating at `max_delay`.
pub fn backoff_delay(consecutive: u32, config: &PollingConfig) -> Duration {
    2u32.checked_pow(consecutive)
        .and_then(|factor| config.base_interval.checked_mul(factor))
        .map_or(config.max_delay, |delay| delay.min(config.max_delay))
}

/// Uniform random delay in `0..=max`.
pub fn random_jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::random_range(0..=max_ms))
}

/// Where the poller loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerPhase {
    #[default]
    Idle,
    Scheduled,
    Probing,
    Cancelled,
}

/// Backoff state owned by a single poller loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollerState {
    pub phase: PollerPhase,
    pub consecutive_rate_limit_failures: u32,
    /// Delay chosen after the most recent probe.
    pub current_delay: Duration,
    pub probes: u64,
}

impl PollerState {
    /// Fold one probe outcome in and return the delay before the next probe.
    pub fn record(
        &mut self,
        outcome: ProbeOutcome,
        config: &PollingConfig,
        jitter: Duration,
    ) -> Duration {
        self.probes += 1;
        self.current_delay = match outcome {
            ProbeOutcome::Success => {
                self.consecutive_rate_limit_failures = 0;
                config.base_interval + jitter
            }
            ProbeOutcome::RateLimited => {
                self.consecutive_rate_limit_failures =
                    self.consecutive_rate_limit_failures.saturating_add(1);
                backoff_delay(self.consecutive_rate_limit_failures, config)
            }
            ProbeOutcome::Failure => {
                self.consecutive_rate_limit_failures = 0;
                config.base_interval
            }
        };
        self.current_delay
    }
}

// ── Poller ───────────────────────────────────────────────────────

/// Keeps one device's status fresh under the shared rate budget.
pub struct DevicePoller<A> {
    device: Arc<Device>,
    api: Arc<A>,
    queue: RateLimitedQueue,
    config: PollingConfig,
}

impl<A: DeviceApi> DevicePoller<A> {
    pub fn new(device: Device, api: Arc<A>, queue: RateLimitedQueue, config: PollingConfig) -> Self {
        Self {
            device: Arc::new(device),
            api,
            queue,
            config,
        }
    }

    /// Start the loop. Cancelling `parent` stops this poller along with any
    /// sibling spawned from the same token.
    pub fn spawn(self, parent: &CancellationToken) -> PollerHandle {
        let cancel = parent.child_token();
        let (status_tx, status_rx) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(PollerState::default());
        let device_id = self.device.id.clone();

        let task = tokio::spawn(self.run(status_tx, state_tx, cancel.clone()));

        PollerHandle {
            device_id,
            status: status_rx,
            state: state_rx,
            cancel,
            task,
        }
    }

    async fn run(
        self,
        status_tx: watch::Sender<Option<StatusRecord>>,
        state_tx: watch::Sender<PollerState>,
        cancel: CancellationToken,
    ) {
        let device_id = self.device.id.clone();
        let mut state = PollerState {
            phase: PollerPhase::Scheduled,
            ..PollerState::default()
        };
        state_tx.send_replace(state.clone());

        let first = random_jitter(self.config.initial_jitter);
        debug!(device = %device_id, delay_ms = first.as_millis(), "first probe scheduled");

        if sleep_or_cancel(first, &cancel).await {
            loop {
                state.phase = PollerPhase::Probing;
                state_tx.send_replace(state.clone());

                let api = Arc::clone(&self.api);
                let device = Arc::clone(&self.device);
                let probe = self
                    .queue
                    .enqueue(move || async move { api.query_status(&device).await })
                    .await;

                if cancel.is_cancelled() {
                    debug!(device = %device_id, "poller cancelled, discarding last probe");
                    break;
                }

                let delay = match probe {
                    Ok(record) => {
                        let outcome = ProbeOutcome::classify(&record);
                        let jitter = random_jitter(self.config.success_jitter);
                        let delay = state.record(outcome, &self.config, jitter);
                        if outcome == ProbeOutcome::RateLimited {
                            warn!(
                                device = %device_id,
                                failures = state.consecutive_rate_limit_failures,
                                delay_ms = delay.as_millis(),
                                "vendor busy, backing off"
                            );
                        }
                        status_tx.send_replace(Some(record));
                        delay
                    }
                    Err(CoreError::QueueClosed) => {
                        info!(device = %device_id, "request queue closed, poller stopping");
                        break;
                    }
                    Err(e) => {
                        warn!(device = %device_id, error = %e, "probe not executed");
                        state.current_delay = self.config.base_interval;
                        self.config.base_interval
                    }
                };

                state.phase = PollerPhase::Scheduled;
                state_tx.send_replace(state.clone());
                debug!(device = %device_id, delay_ms = delay.as_millis(), "next probe scheduled");

                if !sleep_or_cancel(delay, &cancel).await {
                    break;
                }
            }
        }

        state.phase = PollerPhase::Cancelled;
        state_tx.send_replace(state);
        debug!(device = %device_id, "poller stopped");
    }
}

/// Sleep for `delay`; `false` if cancelled first.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

/// Observer side of a running [`DevicePoller`].
pub struct PollerHandle {
    device_id: String,
    status: watch::Receiver<Option<StatusRecord>>,
    state: watch::Receiver<PollerState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Most recently published record, if any probe has completed.
    pub fn latest(&self) -> Option<StatusRecord> {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> PollerState {
        self.state.borrow().clone()
    }

    pub fn liveness(&self, evaluator: &StalenessEvaluator, now: DateTime<Utc>) -> Liveness {
        evaluator.evaluate(self.status.borrow().as_ref(), now)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<StatusRecord>> {
        self.status.clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PollerState> {
        self.state.clone()
    }

    /// Stop scheduling further probes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the loop to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(device = %self.device_id, error = %e, "poller task ended abnormally");
        }
    }
}
