#![allow(clippy::unwrap_used)]
// Integration tests for `CloudClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relayguard_api::{CloudClient, DeviceStatus, DeviceTarget, Error, RelayTurn, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, CloudClient) {
    let server = MockServer::start().await;
    let transport = TransportConfig {
        status_timeout: Duration::from_millis(500),
        command_timeout: Duration::from_millis(500),
        ..TransportConfig::default()
    };
    let client = CloudClient::with_client(reqwest::Client::new(), transport);
    (server, client)
}

fn auth_key() -> SecretString {
    SecretString::from("secret-key".to_string())
}

fn target<'a>(server_url: &'a str, key: &'a SecretString) -> DeviceTarget<'a> {
    DeviceTarget {
        server_url,
        device_id: "e8db84aa1234",
        auth_key: key,
    }
}

// ── Status tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_connected_with_ip() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/device/status"))
        .and(query_param("id", "e8db84aa1234"))
        .and(query_param("auth_key", "secret-key"))
        .and(body_string_contains("auth_key=secret-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"isok": true, "data": {"connected": true, "ip": "10.0.0.5"}})),
        )
        .mount(&server)
        .await;

    let key = auth_key();
    let status = client.device_status(target(&server.uri(), &key)).await.unwrap();

    assert_eq!(
        status,
        DeviceStatus {
            online: true,
            ip: Some("10.0.0.5".into()),
        }
    );
}

#[tokio::test]
async fn test_status_url_rewritten_from_control_endpoint() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/device/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"isok": true, "data": {"online": false}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let key = auth_key();
    let url = format!("{}/device/relay/control/", server.uri());
    let status = client.device_status(target(&url, &key)).await.unwrap();

    assert!(!status.online);
}

#[tokio::test]
async fn test_status_429_is_rate_limited() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/device/status"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let key = auth_key();
    let result = client.device_status(target(&server.uri(), &key)).await;

    assert!(
        matches!(result, Err(Error::RateLimited)),
        "expected RateLimited, got: {result:?}"
    );
}

#[tokio::test]
async fn test_status_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/device/status"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let key = auth_key();
    let err = client
        .device_status(target(&server.uri(), &key))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(err.to_string(), "HTTP 503");
}

#[tokio::test]
async fn test_status_timeout() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/device/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"online": true}}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let key = auth_key();
    let err = client
        .device_status(target(&server.uri(), &key))
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got: {err:?}");
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_status_invalid_json() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/device/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let key = auth_key();
    let result = client.device_status(target(&server.uri(), &key)).await;

    assert!(matches!(result, Err(Error::Deserialization { .. })));
}

// ── Relay control tests ─────────────────────────────────────────────

#[tokio::test]
async fn test_relay_control_form_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/device/relay/control"))
        .and(body_string_contains("channel=0"))
        .and(body_string_contains("turn=on"))
        .and(body_string_contains("id=e8db84aa1234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"isok": false})))
        .expect(1)
        .mount(&server)
        .await;

    let key = auth_key();
    client
        .relay_control(target(&server.uri(), &key), 0, RelayTurn::On)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_relay_control_http_error_carries_vendor_errors() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/device/relay/control"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"isok": false, "errors": {"device_offline": "offline"}})),
        )
        .mount(&server)
        .await;

    let key = auth_key();
    let err = client
        .relay_control(target(&server.uri(), &key), 0, RelayTurn::On)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("device_offline"), "got: {err}");
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_relay_control_connection_refused_is_transport() {
    let (_server, client) = setup().await;

    let key = auth_key();
    let err = client
        .relay_control(target("http://127.0.0.1:1", &key), 0, RelayTurn::On)
        .await
        .unwrap_err();

    assert!(err.is_transport(), "expected transport error, got: {err:?}");
}
