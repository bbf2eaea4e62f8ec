// ── Domain model ──
//
// Devices come from configuration and are read-only here. Status records and
// command results are produced by the core and handed to stores and the CLI.

pub mod command;
pub mod device;
pub mod status;

pub use command::{CommandResult, RelayAction};
pub use device::Device;
pub use status::{Liveness, ProbeFailure, StatusRecord};
