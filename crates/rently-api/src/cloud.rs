// The cloud-client seam.
//
// `rently-core` talks to the cloud only through this trait so the
// coordinator and device state machines can run against an in-memory
// fake in tests. `RentlyCloud` is the HTTP implementation.

use async_trait::async_trait;

use crate::auth::Credentials;
use crate::error::Error;
use crate::models::{DeviceRecord, HubRecord};

/// Black-box RPC surface of the Rently / Keyless cloud.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Authenticate and store the session. Returns `false` if the login
    /// service answered but did not grant a session.
    async fn login(&self, credentials: &Credentials) -> Result<bool, Error>;

    /// Whether a session is currently held.
    fn is_connected(&self) -> bool;

    /// Drop the session.
    async fn logout(&self);

    async fn get_hubs(&self) -> Result<Vec<HubRecord>, Error>;

    /// Fetch one hub. `None` if the cloud does not know the ID.
    async fn get_hub(&self, hub_id: &str) -> Result<Option<HubRecord>, Error>;

    async fn get_devices(&self, hub_id: &str) -> Result<Vec<DeviceRecord>, Error>;

    /// Fetch one device. `None` if the cloud does not know the ID.
    async fn get_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, Error>;

    /// Push the record's desired status to the cloud.
    async fn update_device_status(&self, device: &DeviceRecord) -> Result<(), Error>;
}
