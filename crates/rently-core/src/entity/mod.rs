// ── Device entities ──
//
// Each entity is a small state machine bound to one cloud ID. It owns
// its last fetched record, publishes observable state through a `watch`
// channel, and serializes its own commands.

pub mod climate;
pub mod hub;
pub mod lock;

pub(crate) mod confirm;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CoreError;

pub use climate::{ClimateEntity, ClimateState, ClimateTarget, TemperatureRequest};
pub use hub::HubEntity;
pub use lock::{LockEntity, LockState};

/// Integration domain, used as the namespace of device identifiers.
pub const DOMAIN: &str = "rently";

/// Which kind of entity a [`Pollable`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Hub,
    Lock,
    Climate,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hub => "hub",
            Self::Lock => "lock",
            Self::Climate => "climate",
        })
    }
}

/// Device registry metadata the host attaches to an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// `(DOMAIN, id)` pair, flattened.
    pub domain: &'static str,
    pub identifier: String,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub sw_version: Option<String>,
}

/// Anything the coordinator's entity poll can drive.
#[async_trait]
pub trait Pollable: Send + Sync {
    fn unique_id(&self) -> String;

    fn kind(&self) -> EntityKind;

    fn available(&self) -> bool;

    /// Re-fetch remote state.
    async fn refresh(&self) -> Result<(), CoreError>;
}

fn not_found(id: &str) -> CoreError {
    CoreError::DeviceNotFound {
        identifier: id.to_owned(),
    }
}
