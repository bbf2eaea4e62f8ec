// ── Runtime configuration ──
//
// These types describe *how* the core paces, polls and publishes. They never
// touch disk: the CLI loads its TOML file through `relayguard-config` and
// hands finished values in.

use std::time::Duration;

use relayguard_api::TransportConfig;

use crate::vendor::OptimisticCommandPolicy;

/// Admission gate tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Minimum gap between the end of one vendor call and the start of the next.
    pub min_delay: Duration,
    /// Reject new work once this many items are waiting. `None` = unbounded.
    pub max_depth: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(2200),
            max_depth: None,
        }
    }
}

/// Per-device polling cadence and backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    /// Delay between probes while the vendor is healthy.
    pub base_interval: Duration,
    /// Upper bound for rate-limit backoff.
    pub max_delay: Duration,
    /// Random extra delay added after a successful probe.
    pub success_jitter: Duration,
    /// Random delay before the very first probe.
    pub initial_jitter: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(15),
            max_delay: Duration::from_secs(60),
            success_jitter: Duration::from_secs(2),
            initial_jitter: Duration::from_secs(4),
        }
    }
}

/// Central monitor schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Gap between sweep starts in the standalone loop.
    pub interval: Duration,
    /// Pause between two devices when the monitor paces itself.
    pub inter_device_delay: Duration,
    /// Delay before the single retry of a 429 probe. `None` disables the retry.
    pub rate_limit_retry: Option<Duration>,
    /// Hard wall-clock budget for one sweep.
    pub budget: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            inter_device_delay: Duration::from_secs(2),
            rate_limit_retry: Some(Duration::from_secs(2)),
            budget: Duration::from_secs(60),
        }
    }
}

/// Vendor client settings.
#[derive(Debug, Clone)]
pub struct VendorConfig {
    pub transport: TransportConfig,
    pub command_policy: OptimisticCommandPolicy,
    /// Relay channel switched by open/close commands.
    pub relay_channel: u8,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            command_policy: OptimisticCommandPolicy::default(),
            relay_channel: 0,
        }
    }
}

/// Everything the core needs, bundled for the CLI.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub queue: QueueConfig,
    pub polling: PollingConfig,
    pub monitor: MonitorConfig,
    pub vendor: VendorConfig,
    /// Age after which a published record is no longer trusted.
    pub stale_threshold: Option<Duration>,
}
