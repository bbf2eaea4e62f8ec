// relayguard-core: Rate-limited polling and command dispatch for cloud relays.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod monitor;
pub mod poller;
pub mod queue;
pub mod staleness;
pub mod store;
pub mod vendor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{CoreConfig, MonitorConfig, PollingConfig, QueueConfig, VendorConfig};
pub use dispatcher::CommandDispatcher;
pub use error::CoreError;
pub use monitor::{CentralMonitor, DeviceOutcome, MonitorPacing, SweepReport};
pub use poller::{DevicePoller, PollerHandle, PollerPhase, PollerState, ProbeOutcome};
pub use queue::RateLimitedQueue;
pub use staleness::StalenessEvaluator;
pub use store::{DeviceSource, JsonFileStore, MemoryStatusStore, StatusStore};
pub use vendor::{DeviceApi, OptimisticCommandPolicy, VendorClient};

// Re-export model types at the crate root for ergonomics.
pub use model::{CommandResult, Device, Liveness, ProbeFailure, RelayAction, StatusRecord};
