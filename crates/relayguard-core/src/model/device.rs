// ── Device identity ──

use relayguard_api::DeviceTarget;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

/// One relay device as supplied by the configuration layer.
///
/// All four identity fields must be non-empty for the device to be probed.
/// An incomplete device is still carried around so it can be reported as
/// permanently offline instead of silently disappearing.
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    /// Opaque identifier used as the store key.
    pub id: String,
    pub name: Option<String>,
    pub server_url: String,
    /// Vendor-side device id.
    pub device_id: String,
    #[serde(skip)]
    pub auth_key: SecretString,
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        server_url: impl Into<String>,
        device_id: impl Into<String>,
        auth_key: SecretString,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            server_url: server_url.into(),
            device_id: device_id.into(),
            auth_key,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// `true` when every field needed to reach the vendor is present.
    pub fn is_complete(&self) -> bool {
        !self.id.trim().is_empty()
            && !self.server_url.trim().is_empty()
            && !self.device_id.trim().is_empty()
            && !self.auth_key.expose_secret().trim().is_empty()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Borrow the addressing triple for the raw client.
    pub fn target(&self) -> DeviceTarget<'_> {
        DeviceTarget {
            server_url: &self.server_url,
            device_id: &self.device_id,
            auth_key: &self.auth_key,
        }
    }
}
