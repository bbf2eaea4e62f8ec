// ── Device status records ──
//
// A StatusRecord is replaced wholesale on every completed probe. Fields are
// private so the online/error exclusivity cannot be broken after
// construction, and the wire form goes through `StatusWire` so records read
// back from a shared store are normalised the same way.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a probe did not yield an online reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// Required device fields are missing; the vendor was never called.
    ConfigIncomplete,
    /// The vendor call exceeded its bound.
    Timeout,
    /// The vendor answered HTTP 429.
    RateLimited,
    /// Any other non-2xx answer.
    Http { status: u16 },
    /// No HTTP response at all (DNS, refused connection, TLS).
    Transport(String),
    /// The vendor answered and reported the device as disconnected.
    DeviceOffline,
    /// The vendor answered 2xx with a body we could not read.
    InvalidResponse(String),
}

impl ProbeFailure {
    /// Recover the classification from a stored human-readable reason.
    pub fn from_reason(reason: &str) -> Self {
        let trimmed = reason.trim();
        if trimmed.contains("429") || trimmed.contains("BUSY") {
            return Self::RateLimited;
        }
        match trimmed {
            "config incomplete" => return Self::ConfigIncomplete,
            "Timeout" => return Self::Timeout,
            "device offline" => return Self::DeviceOffline,
            _ => {}
        }
        if let Some(status) = trimmed
            .strip_prefix("HTTP ")
            .and_then(|code| code.parse::<u16>().ok())
        {
            return Self::Http { status };
        }
        if let Some(message) = trimmed.strip_prefix("invalid response: ") {
            return Self::InvalidResponse(message.to_owned());
        }
        Self::Transport(trimmed.to_owned())
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigIncomplete => f.write_str("config incomplete"),
            Self::Timeout => f.write_str("Timeout"),
            Self::RateLimited => f.write_str("BUSY (429)"),
            Self::Http { status } => write!(f, "HTTP {status}"),
            Self::Transport(message) => f.write_str(message),
            Self::DeviceOffline => f.write_str("device offline"),
            Self::InvalidResponse(message) => write!(f, "invalid response: {message}"),
        }
    }
}

impl From<&relayguard_api::Error> for ProbeFailure {
    fn from(err: &relayguard_api::Error) -> Self {
        use relayguard_api::Error;

        if err.is_rate_limited() {
            return Self::RateLimited;
        }
        if err.is_timeout() {
            return Self::Timeout;
        }
        match err {
            Error::Http { status, .. } => Self::Http { status: *status },
            Error::Deserialization { message, .. } => Self::InvalidResponse(message.clone()),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Last known liveness of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StatusWire", into = "StatusWire")]
pub struct StatusRecord {
    online: bool,
    ip: Option<String>,
    failure: Option<ProbeFailure>,
    observed_at: DateTime<Utc>,
}

impl StatusRecord {
    /// The device answered and is connected.
    pub fn online(ip: Option<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            online: true,
            ip: ip.filter(|ip| !ip.trim().is_empty()),
            failure: None,
            observed_at,
        }
    }

    /// The vendor answered but reports the device disconnected.
    pub fn offline(observed_at: DateTime<Utc>) -> Self {
        Self::failed(ProbeFailure::DeviceOffline, observed_at)
    }

    /// The probe itself failed or the device is offline.
    pub fn failed(failure: ProbeFailure, observed_at: DateTime<Utc>) -> Self {
        Self {
            online: false,
            ip: None,
            failure: Some(failure),
            observed_at,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    pub fn failure(&self) -> Option<&ProbeFailure> {
        self.failure.as_ref()
    }

    /// Human-readable reason, present exactly when the device is not online.
    pub fn error(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self.failure, Some(ProbeFailure::RateLimited))
    }
}

/// Persisted shape: `{online, ip, error, lastCheck}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusWire {
    online: bool,
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    error: Option<String>,
    last_check: DateTime<Utc>,
}

impl From<StatusWire> for StatusRecord {
    fn from(wire: StatusWire) -> Self {
        if wire.online {
            return Self::online(wire.ip, wire.last_check);
        }
        let failure = wire
            .error
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .map_or(ProbeFailure::DeviceOffline, ProbeFailure::from_reason);
        Self::failed(failure, wire.last_check)
    }
}

impl From<StatusRecord> for StatusWire {
    fn from(record: StatusRecord) -> Self {
        Self {
            online: record.online,
            error: record.error(),
            ip: record.ip,
            last_check: record.observed_at,
        }
    }
}

/// Effective liveness after staleness has been taken into account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Liveness {
    pub online: bool,
    pub reason: Option<String>,
}

impl Liveness {
    pub fn online() -> Self {
        Self {
            online: true,
            reason: None,
        }
    }

    pub fn offline(reason: impl Into<String>) -> Self {
        Self {
            online: false,
            reason: Some(reason.into()),
        }
    }

    /// Callers should ask for explicit confirmation before sending a command.
    pub fn requires_confirmation(&self) -> bool {
        !self.online
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn online_record_has_no_error() {
        let record = StatusRecord::online(Some("10.0.0.5".into()), at());
        assert!(record.is_online());
        assert_eq!(record.error(), None);
        assert_eq!(record.ip(), Some("10.0.0.5"));
    }

    #[test]
    fn failed_record_drops_ip_and_carries_reason() {
        let record = StatusRecord::failed(ProbeFailure::RateLimited, at());
        assert!(!record.is_online());
        assert!(record.is_rate_limited());
        assert_eq!(record.error().as_deref(), Some("BUSY (429)"));
        assert_eq!(record.ip(), None);
    }

    #[test]
    fn wire_shape_uses_last_check() {
        let record = StatusRecord::failed(ProbeFailure::Http { status: 503 }, at());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "online": false,
                "ip": null,
                "error": "HTTP 503",
                "lastCheck": "2024-05-01T12:00:00Z"
            })
        );
    }

    #[test]
    fn wire_online_with_error_is_normalised() {
        let record: StatusRecord = serde_json::from_value(json!({
            "online": true,
            "ip": "10.0.0.9",
            "error": "stale reason",
            "lastCheck": "2024-05-01T12:00:00Z"
        }))
        .unwrap();
        assert!(record.is_online());
        assert_eq!(record.error(), None);
    }

    #[test]
    fn wire_offline_without_error_gets_default_reason() {
        let record: StatusRecord = serde_json::from_value(json!({
            "online": false,
            "lastCheck": "2024-05-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(record.failure(), Some(&ProbeFailure::DeviceOffline));
    }

    #[test]
    fn reasons_classify_back() {
        assert_eq!(ProbeFailure::from_reason("BUSY (429)"), ProbeFailure::RateLimited);
        assert_eq!(ProbeFailure::from_reason("Timeout"), ProbeFailure::Timeout);
        assert_eq!(
            ProbeFailure::from_reason("HTTP 502"),
            ProbeFailure::Http { status: 502 }
        );
        assert_eq!(
            ProbeFailure::from_reason("connection refused"),
            ProbeFailure::Transport("connection refused".into())
        );
    }
}
