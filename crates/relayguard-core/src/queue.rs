// ── Rate-limited admission gate ──
//
// One FIFO of boxed jobs drained by a single background task. Exactly one job
// runs at a time and the next one may not start until `min_delay` has passed
// since the previous one finished. Every vendor call in the process (pollers,
// the monitor in shared mode, the dispatcher) goes through one instance.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::QueueConfig;
use crate::error::CoreError;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Serialising, spacing admission gate for vendor calls.
///
/// Cheaply cloneable; all clones feed the same drain task. Must be created
/// inside a Tokio runtime.
#[derive(Clone)]
pub struct RateLimitedQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    config: QueueConfig,
    job_tx: mpsc::UnboundedSender<Job>,
    /// Items enqueued but not yet started.
    depth: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl RateLimitedQueue {
    pub fn new(config: QueueConfig) -> Self {
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        tokio::spawn(drain_task(
            job_rx,
            Arc::clone(&depth),
            config.min_delay,
            cancel.clone(),
        ));

        Self {
            inner: Arc::new(QueueInner {
                config,
                job_tx,
                depth,
                cancel,
            }),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Number of items waiting for their turn.
    pub fn pending(&self) -> usize {
        self.inner.depth.load(Ordering::Acquire)
    }

    /// Run `work` once every earlier item has finished and the spacing
    /// delay has elapsed, and return its output.
    ///
    /// A panic inside `work` is reported to this caller only; the queue keeps
    /// draining. When `max_depth` is configured and reached, the call is
    /// rejected immediately with [`CoreError::QueueFull`].
    pub async fn enqueue<T, F, Fut>(&self, work: F) -> Result<T, CoreError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::QueueClosed);
        }

        let depth = self.inner.depth.fetch_add(1, Ordering::AcqRel);
        if let Some(max) = self.inner.config.max_depth {
            if depth >= max {
                self.inner.depth.fetch_sub(1, Ordering::AcqRel);
                warn!(depth, max, "request queue full, rejecting work");
                return Err(CoreError::QueueFull { depth });
            }
        }

        let (result_tx, result_rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let outcome = AssertUnwindSafe(async move { work().await })
                .catch_unwind()
                .await;
            // Receiver gone means the caller stopped waiting; nothing to do.
            let _ = result_tx.send(outcome);
        });

        if self.inner.job_tx.send(job).is_err() {
            self.inner.depth.fetch_sub(1, Ordering::AcqRel);
            return Err(CoreError::QueueClosed);
        }

        match result_rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(CoreError::WorkPanicked),
            Err(_) => Err(CoreError::QueueClosed),
        }
    }

    /// Stop draining. Items not yet started resolve with `QueueClosed`.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for RateLimitedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedQueue")
            .field("config", &self.inner.config)
            .field("pending", &self.pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn drain_task(
    mut job_rx: mpsc::UnboundedReceiver<Job>,
    depth: Arc<AtomicUsize>,
    min_delay: Duration,
    cancel: CancellationToken,
) {
    let mut last_finished: Option<Instant> = None;

    loop {
        let job = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            job = job_rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        if let Some(finished) = last_finished {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep_until(finished + min_delay) => {}
            }
        }

        depth.fetch_sub(1, Ordering::AcqRel);
        job.await;
        last_finished = Some(Instant::now());
    }

    job_rx.close();
    debug!("request queue drained and closed");
}
