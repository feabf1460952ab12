// Read-only hub entity: registry metadata only, no commands.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use rently_api::{CloudApi, HubRecord};
use tracing::debug;

use super::{DOMAIN, DeviceInfo, EntityKind, Pollable, not_found};
use crate::error::CoreError;

/// A Rently hub bound to one cloud ID.
pub struct HubEntity {
    id: String,
    cloud: Arc<dyn CloudApi>,
    record: RwLock<Option<HubRecord>>,
}

impl HubEntity {
    pub fn new(id: impl Into<String>, cloud: Arc<dyn CloudApi>) -> Self {
        Self {
            id: id.into(),
            cloud,
            record: RwLock::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn unique_id(&self) -> String {
        format!("{DOMAIN}-hub-{}", self.id)
    }

    /// Last fetched snapshot.
    pub fn record(&self) -> Option<HubRecord> {
        self.record.read().expect("hub record lock poisoned").clone()
    }

    pub fn device_info(&self) -> DeviceInfo {
        let record = self.record.read().expect("hub record lock poisoned");
        DeviceInfo {
            domain: DOMAIN,
            identifier: self.id.clone(),
            name: record
                .as_ref()
                .map_or_else(|| self.id.clone(), |r| r.home_name.clone()),
            manufacturer: None,
            model: record.as_ref().and_then(|r| r.status.model.clone()),
            sw_version: record
                .as_ref()
                .and_then(|r| r.status.firmware_version.clone()),
        }
    }

    /// Fetch the hub. Errors leave the previous snapshot in place.
    pub async fn update(&self) -> Result<(), CoreError> {
        let record = self
            .cloud
            .get_hub(&self.id)
            .await?
            .ok_or_else(|| not_found(&self.id))?;
        debug!(hub_id = %self.id, home = %record.home_name, "hub refreshed");
        self.seed(record);
        Ok(())
    }

    pub(crate) fn seed(&self, record: HubRecord) {
        *self.record.write().expect("hub record lock poisoned") = Some(record);
    }
}

#[async_trait]
impl Pollable for HubEntity {
    fn unique_id(&self) -> String {
        HubEntity::unique_id(self)
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Hub
    }

    fn available(&self) -> bool {
        self.record.read().expect("hub record lock poisoned").is_some()
    }

    async fn refresh(&self) -> Result<(), CoreError> {
        self.update().await
    }
}
