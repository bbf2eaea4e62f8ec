// Vendor cloud HTTP client
//
// Wraps `reqwest::Client` with endpoint normalisation, form-encoded bodies,
// per-call timeouts and status-code classification. No retries happen here:
// pacing and backoff belong to the caller.

use chrono::Utc;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::endpoint;
use crate::error::Error;
use crate::models::{ControlReply, DeviceStatus, RelayTurn, StatusEnvelope};
use crate::transport::TransportConfig;

/// Everything needed to address one device through the vendor cloud.
#[derive(Debug, Clone, Copy)]
pub struct DeviceTarget<'a> {
    pub server_url: &'a str,
    pub device_id: &'a str,
    pub auth_key: &'a SecretString,
}

/// Raw HTTP client for the vendor's device cloud.
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: reqwest::Client,
    transport: TransportConfig,
}

impl CloudClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(transport: TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, transport })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, transport: TransportConfig) -> Self {
        Self { http, transport }
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Query a device's cloud connectivity.
    ///
    /// `POST {server}/device/status?id=..&auth_key=..&_t=..` with the same
    /// credentials form-encoded in the body.
    pub async fn device_status(&self, target: DeviceTarget<'_>) -> Result<DeviceStatus, Error> {
        let url = endpoint::status_url(target.server_url)?;
        let timeout = self.transport.status_timeout;
        let auth_key = target.auth_key.expose_secret();
        let cache_buster = Utc::now().timestamp_millis().to_string();

        debug!(device = target.device_id, %url, "querying device status");

        let resp = self
            .http
            .post(url)
            .query(&[
                ("id", target.device_id),
                ("auth_key", auth_key),
                ("_t", cache_buster.as_str()),
            ])
            .form(&[("id", target.device_id), ("auth_key", auth_key)])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, timeout))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_reqwest(e, timeout))?;

        let envelope: StatusEnvelope =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        let decoded = envelope.decode();
        debug!(
            device = target.device_id,
            online = decoded.online,
            connectivity = ?envelope.connectivity(),
            "device status decoded"
        );
        Ok(decoded)
    }

    /// Switch a relay channel.
    ///
    /// `POST {server}/device/relay/control` with `id`, `auth_key`, `channel`
    /// and `turn`. Any 2xx counts as accepted; the vendor's logical `isok`
    /// flag is not consulted because it reports false negatives.
    pub async fn relay_control(
        &self,
        target: DeviceTarget<'_>,
        channel: u8,
        turn: RelayTurn,
    ) -> Result<(), Error> {
        let url = endpoint::control_url(target.server_url)?;
        let timeout = self.transport.command_timeout;
        let channel = channel.to_string();
        let turn = turn.to_string();

        debug!(device = target.device_id, %url, %channel, %turn, "sending relay command");

        let resp = self
            .http
            .post(url)
            .form(&[
                ("id", target.device_id),
                ("auth_key", target.auth_key.expose_secret()),
                ("channel", channel.as_str()),
                ("turn", turn.as_str()),
            ])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, timeout))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited);
        }

        let body = resp.text().await.unwrap_or_default();
        let reply: ControlReply = serde_json::from_str(&body).unwrap_or_default();
        let message = match reply.errors {
            Some(errors) if !errors.is_null() => format!("Error: {errors}"),
            _ => "unknown server error".into(),
        };

        Err(Error::Http {
            status: status.as_u16(),
            message,
        })
    }
}
