// Cloud HTTP client
//
// Wraps `reqwest::Client` with the two Rently hosts: the login service
// that issues bearer tokens and the Keyless device API that serves hubs
// and devices. Session state lives here and nowhere else.

use std::sync::RwLock;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::{Credentials, Session};
use crate::cloud::CloudApi;
use crate::error::Error;
use crate::models::{
    DeviceRecord, HubRecord, WireDevice, WireDeviceList, WireHub, WireHubList, WireLoginResponse,
};
use crate::transport::TransportConfig;

/// Production device API root.
pub const DEFAULT_API_URL: &str = "https://app2.keyless.rocks/api/";
/// Production login service root.
pub const DEFAULT_LOGIN_URL: &str = "https://remotapp.rently.com/";

/// HTTP client for the Rently cloud.
///
/// Holds at most one session. A 401 from the device API drops it, so the
/// next `is_connected()` check reports `false` and the caller logs in again.
pub struct RentlyCloud {
    http: reqwest::Client,
    api_url: Url,
    login_url: Url,
    session: RwLock<Option<Session>>,
}

impl RentlyCloud {
    /// Create a client from a `TransportConfig`.
    pub fn new(api_url: Url, login_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, api_url, login_url))
    }

    /// Create a client with the production endpoints.
    pub fn production(transport: &TransportConfig) -> Result<Self, Error> {
        Self::new(
            Url::parse(DEFAULT_API_URL)?,
            Url::parse(DEFAULT_LOGIN_URL)?,
            transport,
        )
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, api_url: Url, login_url: Url) -> Self {
        Self {
            http,
            api_url: with_trailing_slash(api_url),
            login_url: with_trailing_slash(login_url),
            session: RwLock::new(None),
        }
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    // ── Session management ───────────────────────────────────────────

    fn store_session(&self, token: String) {
        debug!("storing session token");
        *self.session.write().expect("session lock poisoned") = Some(Session {
            token: SecretString::from(token),
        });
    }

    fn clear_session(&self) {
        *self.session.write().expect("session lock poisoned") = None;
    }

    fn bearer(&self) -> Result<String, Error> {
        self.session
            .read()
            .expect("session lock poisoned")
            .as_ref()
            .map(Session::bearer)
            .ok_or(Error::NotConnected)
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.api_url.join(path)?)
    }

    /// Attach the bearer token and send. A 401 drops the session.
    async fn send(&self, request: RequestBuilder) -> Result<Response, Error> {
        let resp = request
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .send()
            .await
            .map_err(Error::Transport)?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!("device API rejected session token");
            self.clear_session();
            return Err(Error::SessionExpired);
        }
        Ok(resp)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.send(self.http.get(url)).await?;
        parse_body(resp).await
    }

    /// GET that maps 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, Error> {
        debug!("GET {}", url);
        let resp = self.send(self.http.get(url)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        parse_body(resp).await.map(Some)
    }
}

#[async_trait]
impl CloudApi for RentlyCloud {
    async fn login(&self, credentials: &Credentials) -> Result<bool, Error> {
        credentials.validate()?;

        let url = self.login_url.join("oauth/token")?;
        debug!("logging in at {}", url);

        let body = json!({
            "email": credentials.email,
            "password": credentials.password.expose_secret(),
        });

        let resp = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status}): {body}"),
            });
        }

        let login: WireLoginResponse = parse_body(resp).await?;
        match login.token {
            Some(token) if login.success => {
                self.store_session(token);
                debug!("login successful");
                Ok(true)
            }
            _ => {
                debug!(message = ?login.message, "login refused");
                self.clear_session();
                Ok(false)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.session.read().expect("session lock poisoned").is_some()
    }

    async fn logout(&self) {
        self.clear_session();
        debug!("session dropped");
    }

    async fn get_hubs(&self) -> Result<Vec<HubRecord>, Error> {
        let list: WireHubList = self.get(self.endpoint("hubs")?).await?;
        Ok(list.hubs.into_iter().map(HubRecord::from).collect())
    }

    async fn get_hub(&self, hub_id: &str) -> Result<Option<HubRecord>, Error> {
        let url = self.endpoint(&format!("hubs/{hub_id}"))?;
        let hub: Option<WireHub> = self.get_optional(url).await?;
        Ok(hub.map(HubRecord::from))
    }

    async fn get_devices(&self, hub_id: &str) -> Result<Vec<DeviceRecord>, Error> {
        let url = self.endpoint(&format!("hubs/{hub_id}/devices"))?;
        let list: WireDeviceList = self.get(url).await?;
        list.devices
            .into_iter()
            .map(DeviceRecord::try_from)
            .collect()
    }

    async fn get_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, Error> {
        let url = self.endpoint(&format!("devices/{device_id}"))?;
        let device: Option<WireDevice> = self.get_optional(url).await?;
        device.map(DeviceRecord::try_from).transpose()
    }

    async fn update_device_status(&self, device: &DeviceRecord) -> Result<(), Error> {
        let url = self.endpoint(&format!("devices/{}", device.id))?;
        let body = json!({ "status": device.status_payload()? });
        debug!("PUT {}", url);
        trace!(%body, "device update body");

        let resp = self.send(self.http.put(url).json(&body)).await?;
        ensure_success(resp).await.map(|_| ())
    }
}

// ── Response parsing ─────────────────────────────────────────────────

async fn ensure_success(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        message: if message.is_empty() {
            status.to_string()
        } else {
            message
        },
    })
}

async fn parse_body<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
    let resp = ensure_success(resp).await?;
    let body = resp.text().await.map_err(Error::Transport)?;
    serde_json::from_str(&body).map_err(|e| Error::InvalidResponse {
        message: e.to_string(),
        body,
    })
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
