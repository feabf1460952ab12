#![allow(clippy::unwrap_used)]
// Integration tests for `RentlyCloud` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rently_api::{CloudApi, Credentials, DeviceKind, Error, HvacMode, LockMode, RentlyCloud};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, RentlyCloud) {
    let server = MockServer::start().await;
    let api_url = Url::parse(&format!("{}/api/", server.uri())).unwrap();
    let login_url = Url::parse(&format!("{}/auth/", server.uri())).unwrap();
    let client = RentlyCloud::with_client(reqwest::Client::new(), api_url, login_url);
    (server, client)
}

fn creds() -> Credentials {
    Credentials::new("owner@example.com", SecretString::from("hunter2".to_owned()))
}

async fn logged_in() -> (MockServer, RentlyCloud) {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .and(path("/auth/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": true, "token": "tok-1" })),
        )
        .mount(&server)
        .await;
    assert!(client.login(&creds()).await.unwrap());
    (server, client)
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_success_stores_session() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth/oauth/token"))
        .and(body_json(
            json!({ "email": "owner@example.com", "password": "hunter2" }),
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "success": true, "token": "tok-1" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    assert!(!client.is_connected());
    assert!(client.login(&creds()).await.unwrap());
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_login_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let result = client.login(&creds()).await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_login_without_token_is_not_connected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": false, "message": "locked out" })),
        )
        .mount(&server)
        .await;

    assert!(!client.login(&creds()).await.unwrap());
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_login_missing_password_sends_nothing() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let blank = Credentials::new("owner@example.com", SecretString::from(String::new()));
    let result = client.login(&blank).await;

    assert!(matches!(result, Err(Error::MissingParameters("password"))));
}

#[tokio::test]
async fn test_requests_before_login_are_not_connected() {
    let (_server, client) = setup().await;

    let result = client.get_hubs().await;

    assert!(matches!(result, Err(Error::NotConnected)));
}

#[tokio::test]
async fn test_unauthorized_api_call_drops_session() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/hubs"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.get_hubs().await;

    assert!(matches!(result, Err(Error::SessionExpired)));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_logout_drops_session() {
    let (_server, client) = logged_in().await;
    client.logout().await;
    assert!(!client.is_connected());
}

// ── Hub tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_hubs() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/hubs"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hubs": [
                { "id": 101, "homeName": "Maple St", "status": { "model": "KH-2", "fmVer": "3.1.0" } },
                { "id": "102", "homeName": "Oak Ave" }
            ]
        })))
        .mount(&server)
        .await;

    let hubs = client.get_hubs().await.unwrap();

    assert_eq!(hubs.len(), 2);
    assert_eq!(hubs[0].id, "101");
    assert_eq!(hubs[0].home_name, "Maple St");
    assert_eq!(hubs[0].status.model.as_deref(), Some("KH-2"));
    assert_eq!(hubs[0].status.firmware_version.as_deref(), Some("3.1.0"));
    assert_eq!(hubs[1].status.model, None);
}

#[tokio::test]
async fn test_get_hub_not_found() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/hubs/999"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(client.get_hub("999").await.unwrap().is_none());
}

// ── Device tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_devices_classifies_kinds() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/hubs/101/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [
                {
                    "id": 1, "name": "Front Door", "deviceType": "lock",
                    "battery": 77, "status": { "mode": "locked" }
                },
                {
                    "id": 2, "name": "Hall", "deviceType": "thermostat",
                    "status": {
                        "mode": "heat", "fan": "auto", "roomTemp": 68.5,
                        "heatingSetpoint": 67, "coolingSetpoint": 72,
                        "modes": ["off", "heat", "cool"], "fanModes": ["auto"]
                    }
                },
                { "id": 3, "name": "Porch Light", "deviceType": "switch" }
            ]
        })))
        .mount(&server)
        .await;

    let devices = client.get_devices("101").await.unwrap();

    assert_eq!(devices.len(), 3);
    assert_eq!(devices[0].lock_mode(), Some(LockMode::Locked));
    assert_eq!(devices[0].battery_level, Some(77));
    assert_eq!(devices[1].thermostat().unwrap().mode, HvacMode::Heat);
    assert!(matches!(devices[2].kind, DeviceKind::Other { .. }));
}

#[tokio::test]
async fn test_get_device_not_found_is_none() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/devices/55"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(client.get_device("55").await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_device_malformed_body() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/devices/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client.get_device("1").await;

    assert!(matches!(result, Err(Error::InvalidResponse { .. })));
}

#[tokio::test]
async fn test_update_device_status_puts_lock_mode() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/devices/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "name": "Front Door", "deviceType": "lock",
            "status": { "mode": "locked" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/devices/1"))
        .and(body_json(json!({ "status": { "mode": "unlocked" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let mut device = client.get_device("1").await.unwrap().unwrap();
    device.set_lock_mode(LockMode::Unlocked);
    client.update_device_status(&device).await.unwrap();
}

#[tokio::test]
async fn test_update_device_status_server_error() {
    let (server, client) = logged_in().await;

    Mock::given(method("GET"))
        .and(path("/api/devices/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1, "deviceType": "lock", "status": { "mode": "locked" }
        })))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/devices/1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("hub offline"))
        .mount(&server)
        .await;

    let device = client.get_device("1").await.unwrap().unwrap();
    let err = client.update_device_status(&device).await.unwrap_err();

    assert!(matches!(err, Error::Api { status: 503, .. }));
    assert!(err.is_transient());
    assert!(client.is_connected());
}
