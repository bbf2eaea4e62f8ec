#![allow(clippy::unwrap_used)]
// Integration tests for `DevicePoller` against a scripted vendor.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use common::{Reply, ScriptedApi, device};
use relayguard_core::{
    DevicePoller, PollerPhase, PollingConfig, QueueConfig, RateLimitedQueue, StalenessEvaluator,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn fast_queue() -> RateLimitedQueue {
    RateLimitedQueue::new(QueueConfig {
        min_delay: Duration::ZERO,
        max_depth: None,
    })
}

fn polling(base_secs: u64) -> PollingConfig {
    PollingConfig {
        base_interval: Duration::from_secs(base_secs),
        max_delay: Duration::from_secs(60),
        success_jitter: Duration::ZERO,
        initial_jitter: Duration::ZERO,
    }
}

// ── Backoff ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_three_rate_limits_back_off_exponentially() {
    let api = Arc::new(
        ScriptedApi::new().script(
            "gate",
            [Reply::RateLimited, Reply::RateLimited, Reply::RateLimited],
        ),
    );
    let cancel = CancellationToken::new();
    let handle = DevicePoller::new(device("gate"), api, fast_queue(), polling(1)).spawn(&cancel);
    let mut states = handle.subscribe_state();

    let mut delays = Vec::new();
    let mut seen = 0;
    while delays.len() < 3 {
        states.changed().await.unwrap();
        let state = states.borrow_and_update().clone();
        if state.phase == PollerPhase::Scheduled && state.probes > seen {
            seen = state.probes;
            delays.push(state.current_delay);
            let latest = handle.latest().unwrap();
            assert!(!latest.is_online());
            assert_eq!(latest.error().as_deref(), Some("BUSY (429)"));
        }
    }

    assert_eq!(
        delays,
        vec![
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8)
        ]
    );
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_backoff_is_capped_at_max_delay() {
    let api = Arc::new(ScriptedApi::new().fallback(Reply::RateLimited));
    let cancel = CancellationToken::new();
    let handle = DevicePoller::new(device("gate"), api, fast_queue(), polling(15)).spawn(&cancel);

    // 30s + 60s + 60s after the first probe at t=0.
    tokio::time::sleep(Duration::from_secs(151)).await;

    let state = handle.state();
    assert_eq!(state.consecutive_rate_limit_failures, 4);
    assert_eq!(state.current_delay, Duration::from_secs(60));
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_recovery_resets_to_base_interval() {
    let api = Arc::new(
        ScriptedApi::new()
            .script("gate", [Reply::RateLimited, Reply::RateLimited])
            .fallback(Reply::Online),
    );
    let cancel = CancellationToken::new();
    let handle =
        DevicePoller::new(device("gate"), Arc::clone(&api), fast_queue(), polling(1)).spawn(&cancel);

    // Probes at t=0 (429), t=2 (429), t=6 (ok).
    tokio::time::sleep(Duration::from_millis(6500)).await;

    let state = handle.state();
    assert_eq!(api.probe_count(), 3);
    assert_eq!(state.consecutive_rate_limit_failures, 0);
    assert_eq!(state.current_delay, Duration::from_secs(1));
    assert!(handle.latest().unwrap().is_online());
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_offline_keeps_base_cadence() {
    let api = Arc::new(ScriptedApi::new().fallback(Reply::Timeout));
    let cancel = CancellationToken::new();
    let handle =
        DevicePoller::new(device("gate"), Arc::clone(&api), fast_queue(), polling(15)).spawn(&cancel);

    tokio::time::sleep(Duration::from_secs(46)).await;

    // t=0, 15, 30, 45
    assert_eq!(api.probe_count(), 4);
    assert_eq!(handle.state().current_delay, Duration::from_secs(15));
    assert_eq!(handle.latest().unwrap().error().as_deref(), Some("Timeout"));
    handle.stop().await;
}

// ── Scheduling ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_first_probe_within_initial_jitter() {
    let api = Arc::new(ScriptedApi::new());
    let cancel = CancellationToken::new();
    let config = PollingConfig {
        initial_jitter: Duration::from_secs(4),
        ..polling(15)
    };
    let handle = DevicePoller::new(device("gate"), Arc::clone(&api), fast_queue(), config).spawn(&cancel);

    tokio::time::sleep(Duration::from_millis(4100)).await;
    assert_eq!(api.probe_count(), 1);
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_pollers_share_the_queue_spacing() {
    let api = Arc::new(ScriptedApi::new());
    let queue = RateLimitedQueue::new(QueueConfig {
        min_delay: Duration::from_millis(2200),
        max_depth: None,
    });
    let cancel = CancellationToken::new();

    let handles: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|id| {
            DevicePoller::new(device(id), Arc::clone(&api), queue.clone(), polling(15)).spawn(&cancel)
        })
        .collect();

    tokio::time::sleep(Duration::from_secs(5)).await;
    cancel.cancel();
    for handle in handles {
        handle.stop().await;
    }

    let probes = api.probes();
    assert_eq!(probes.len(), 3);
    for pair in probes.windows(2) {
        assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(2200));
    }
}

// ── Cancellation ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_cancel_discards_in_flight_probe() {
    let api = Arc::new(ScriptedApi::new().latency(Duration::from_secs(5)));
    let cancel = CancellationToken::new();
    let handle =
        DevicePoller::new(device("gate"), Arc::clone(&api), fast_queue(), polling(15)).spawn(&cancel);
    let mut states = handle.subscribe_state();

    states
        .wait_for(|s| s.phase == PollerPhase::Probing)
        .await
        .unwrap();
    handle.cancel();
    states
        .wait_for(|s| s.phase == PollerPhase::Cancelled)
        .await
        .unwrap();

    assert_eq!(api.probe_count(), 1);
    assert!(handle.latest().is_none());
    assert_eq!(handle.state().probes, 0);
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_no_probes_after_cancellation() {
    let api = Arc::new(ScriptedApi::new());
    let cancel = CancellationToken::new();
    let handle =
        DevicePoller::new(device("gate"), Arc::clone(&api), fast_queue(), polling(15)).spawn(&cancel);

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(api.probe_count(), 1);
    assert_eq!(handle.state().phase, PollerPhase::Cancelled);
    handle.stop().await;
}

// ── Liveness ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_liveness_from_latest_record() {
    let api = Arc::new(ScriptedApi::new());
    let cancel = CancellationToken::new();
    let handle = DevicePoller::new(device("gate"), api, fast_queue(), polling(15)).spawn(&cancel);
    let evaluator = StalenessEvaluator::default();

    assert_eq!(
        handle.liveness(&evaluator, Utc::now()).reason.as_deref(),
        Some("no signal yet")
    );

    let mut status = handle.subscribe();
    status.wait_for(Option::is_some).await.unwrap();
    assert!(handle.liveness(&evaluator, Utc::now()).online);
    handle.stop().await;
}
