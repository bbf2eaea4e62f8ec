// Vendor response models
//
// The status endpoint has answered with several shapes over time:
// `{isok, data: {online, ...}}`, `{isok, data: {connected, ...}}`, and a flat
// `{connected}` from older firmware. Every known field is optional here and
// the decode step below picks one in a fixed priority order.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Boolean as the vendor sends it: usually `true`/`false`, sometimes `1`/`0`
/// or the same as a string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Flag {
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Str(s) => {
                let s = s.trim();
                s == "1" || s.eq_ignore_ascii_case("true")
            }
        }
    }
}

/// Raw status response envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusEnvelope {
    #[serde(default)]
    pub isok: Option<bool>,
    #[serde(default)]
    pub data: Option<StatusData>,
    /// Flat shape returned by older cloud versions.
    #[serde(default)]
    pub connected: Option<Flag>,
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusData {
    #[serde(default)]
    pub online: Option<Flag>,
    #[serde(default)]
    pub connected: Option<Flag>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub device_status: Option<DeviceStatusBlock>,
}

/// Nested device report. Gen1 devices use `wifi_sta.ip`, Gen2 use
/// `wifi.sta_ip`, wired devices report under `eth`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceStatusBlock {
    #[serde(default)]
    pub wifi_sta: Option<IpField>,
    #[serde(default)]
    pub wifi: Option<StaIpField>,
    #[serde(default)]
    pub eth: Option<IpField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpField {
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaIpField {
    #[serde(default)]
    pub sta_ip: Option<String>,
}

/// Which response field decided the connectivity verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// `data.connected`
    NestedConnected(bool),
    /// top-level `connected`
    Connected(bool),
    /// `data.online`
    NestedOnline(bool),
    /// None of the known shapes matched.
    Unknown,
}

impl Connectivity {
    /// Collapse to a single boolean; an unknown shape counts as offline.
    pub fn is_online(self) -> bool {
        match self {
            Self::NestedConnected(b) | Self::Connected(b) | Self::NestedOnline(b) => b,
            Self::Unknown => false,
        }
    }
}

/// Decoded device status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    pub online: bool,
    pub ip: Option<String>,
}

impl StatusEnvelope {
    /// Decide connectivity, preferring `connected` over nested `online`.
    pub fn connectivity(&self) -> Connectivity {
        let data = self.data.as_ref();

        if let Some(flag) = data.and_then(|d| d.connected.as_ref()) {
            return Connectivity::NestedConnected(flag.as_bool());
        }
        if let Some(flag) = &self.connected {
            return Connectivity::Connected(flag.as_bool());
        }
        if let Some(flag) = data.and_then(|d| d.online.as_ref()) {
            return Connectivity::NestedOnline(flag.as_bool());
        }
        Connectivity::Unknown
    }

    /// First non-empty IP address among the known shapes.
    pub fn ip(&self) -> Option<&str> {
        let data = self.data.as_ref();
        let nested = data.and_then(|d| d.device_status.as_ref());

        [
            data.and_then(|d| d.ip.as_deref()),
            nested.and_then(|s| s.wifi_sta.as_ref()?.ip.as_deref()),
            nested.and_then(|s| s.wifi.as_ref()?.sta_ip.as_deref()),
            nested.and_then(|s| s.eth.as_ref()?.ip.as_deref()),
            self.ip.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|ip| !ip.is_empty())
    }

    pub fn decode(&self) -> DeviceStatus {
        DeviceStatus {
            online: self.connectivity().is_online(),
            ip: self.ip().map(str::to_owned),
        }
    }
}

/// Body returned by the control endpoint on failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlReply {
    #[serde(default)]
    pub isok: Option<bool>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

/// Relay `turn` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RelayTurn {
    On,
    Off,
}
