// ── Vendor operations ──
//
// The policy half of the vendor boundary. `relayguard-api` speaks HTTP; this
// module turns its results into StatusRecords and CommandResults, so nothing
// above it ever sees a raw transport error.

use std::future::Future;

use chrono::Utc;
use relayguard_api::CloudClient;
use tracing::{debug, warn};

use crate::config::VendorConfig;
use crate::error::CoreError;
use crate::model::{CommandResult, Device, ProbeFailure, RelayAction, StatusRecord};

/// The two operations the core performs against a device.
///
/// Implementations never fail: every outcome, including transport errors, is
/// folded into the returned value. Tests substitute scripted fakes.
pub trait DeviceApi: Send + Sync + 'static {
    /// Probe the device's cloud connectivity.
    fn query_status(&self, device: &Device) -> impl Future<Output = StatusRecord> + Send;

    /// Switch the device's relay.
    fn send_command(
        &self,
        device: &Device,
        action: RelayAction,
    ) -> impl Future<Output = CommandResult> + Send;
}

/// How a relay command that never got an HTTP answer is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptimisticCommandPolicy {
    /// Report success with "command sent": the request frequently reaches the
    /// device even when the response is lost.
    #[default]
    Optimistic,
    /// Report the transport error as a failure.
    Strict,
}

impl OptimisticCommandPolicy {
    fn on_transport_failure(self, err: &relayguard_api::Error) -> CommandResult {
        match self {
            Self::Optimistic => CommandResult::success("command sent"),
            Self::Strict => CommandResult::failure(ProbeFailure::from(err).to_string()),
        }
    }
}

/// [`DeviceApi`] backed by the vendor cloud.
#[derive(Debug, Clone)]
pub struct VendorClient {
    client: CloudClient,
    policy: OptimisticCommandPolicy,
    channel: u8,
}

impl VendorClient {
    pub fn new(config: &VendorConfig) -> Result<Self, CoreError> {
        let client = CloudClient::new(config.transport.clone())?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: CloudClient, config: &VendorConfig) -> Self {
        Self {
            client,
            policy: config.command_policy,
            channel: config.relay_channel,
        }
    }

    pub fn policy(&self) -> OptimisticCommandPolicy {
        self.policy
    }
}

impl DeviceApi for VendorClient {
    async fn query_status(&self, device: &Device) -> StatusRecord {
        if !device.is_complete() {
            return StatusRecord::failed(ProbeFailure::ConfigIncomplete, Utc::now());
        }

        match self.client.device_status(device.target()).await {
            Ok(status) if status.online => StatusRecord::online(status.ip, Utc::now()),
            Ok(_) => StatusRecord::offline(Utc::now()),
            Err(e) => {
                let failure = ProbeFailure::from(&e);
                debug!(device = %device.id, error = %e, reason = %failure, "status probe failed");
                StatusRecord::failed(failure, Utc::now())
            }
        }
    }

    async fn send_command(&self, device: &Device, action: RelayAction) -> CommandResult {
        if !device.is_complete() {
            return CommandResult::failure(ProbeFailure::ConfigIncomplete.to_string());
        }

        match self
            .client
            .relay_control(device.target(), self.channel, action.turn())
            .await
        {
            Ok(()) => CommandResult::success(match action {
                RelayAction::Open => "door opened",
                RelayAction::Close => "door closed",
            }),
            Err(e) if e.is_rate_limited() => {
                warn!(device = %device.id, "relay command rate limited");
                CommandResult::failure(ProbeFailure::RateLimited.to_string())
            }
            Err(e) if e.is_transport() => {
                warn!(
                    device = %device.id,
                    error = %e,
                    policy = ?self.policy,
                    "relay command got no response"
                );
                self.policy.on_transport_failure(&e)
            }
            Err(e) => CommandResult::failure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_policy_reports_transport_reason() {
        let err = relayguard_api::Error::Timeout { timeout_secs: 8 };
        let result = OptimisticCommandPolicy::Strict.on_transport_failure(&err);
        assert_eq!(result, CommandResult::failure("Timeout"));
    }

    #[test]
    fn optimistic_policy_is_default() {
        let err = relayguard_api::Error::Timeout { timeout_secs: 8 };
        let result = OptimisticCommandPolicy::default().on_transport_failure(&err);
        assert_eq!(result, CommandResult::success("command sent"));
    }
}
