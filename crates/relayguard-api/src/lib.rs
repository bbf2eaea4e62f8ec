// relayguard-api: Async Rust client for the relay vendor's cloud API

pub mod client;
pub mod endpoint;
pub mod error;
pub mod models;
pub mod transport;

pub use client::{CloudClient, DeviceTarget};
pub use error::Error;
pub use models::{Connectivity, DeviceStatus, RelayTurn, StatusEnvelope};
pub use transport::{TlsMode, TransportConfig};
