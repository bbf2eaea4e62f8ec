// ── Command dispatch ──
//
// Relay commands share the polling queue so an unlock never races a probe
// against the vendor's rate budget. There is no retry: the caller gets the
// first result and decides what to do with it.

use std::sync::Arc;

use tracing::{info, warn};

use crate::model::{CommandResult, Device, RelayAction};
use crate::queue::RateLimitedQueue;
use crate::vendor::DeviceApi;

/// Sends relay commands through the shared admission gate.
///
/// Liveness is not checked here. Callers that want a confirmation step for
/// offline devices evaluate staleness before calling [`dispatch`](Self::dispatch).
pub struct CommandDispatcher<A> {
    api: Arc<A>,
    queue: RateLimitedQueue,
}

impl<A> Clone for CommandDispatcher<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            queue: self.queue.clone(),
        }
    }
}

impl<A: DeviceApi> CommandDispatcher<A> {
    pub fn new(api: Arc<A>, queue: RateLimitedQueue) -> Self {
        Self { api, queue }
    }

    /// Open (unlock) the device's relay.
    pub async fn dispatch(&self, device: &Device) -> CommandResult {
        self.dispatch_action(device, RelayAction::Open).await
    }

    pub async fn dispatch_action(&self, device: &Device, action: RelayAction) -> CommandResult {
        let api = Arc::clone(&self.api);
        let target = device.clone();

        let result = match self
            .queue
            .enqueue(move || async move { api.send_command(&target, action).await })
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(device = %device.id, %action, error = %e, "command not executed");
                CommandResult::failure(e.to_string())
            }
        };

        info!(
            device = %device.id,
            %action,
            success = result.success,
            message = %result.message,
            "relay command finished"
        );
        result
    }
}
