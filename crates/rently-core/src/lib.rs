//! Reconciliation core between `rently-api` and a host (the CLI).
//!
//! - **[`Coordinator`]** owns one account: bounded login retries, the
//!   periodic fleet refresh that rebuilds the entity registry, the entity
//!   poll schedule, and teardown.
//!
//! - **[`EntityRegistry`]** is an immutable snapshot of the account's
//!   hubs, locks and climates, swapped in atomically via `ArcSwap`.
//!
//! - **Entities** ([`LockEntity`], [`ClimateEntity`], [`HubEntity`]) are
//!   per-device state machines. Commands publish an optimistic state,
//!   then poll the cloud until it converges or the attempts run out.

pub mod config;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod registry;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{CoordinatorConfig, RetryPolicy};
pub use coordinator::{Coordinator, CoordinatorState, validate_credentials};
pub use entity::{
    ClimateEntity, ClimateState, ClimateTarget, DOMAIN, DeviceInfo, EntityKind, HubEntity,
    LockEntity, LockState, Pollable, TemperatureRequest,
};
pub use error::CoreError;
pub use registry::EntityRegistry;

// Re-export the record types hosts commonly need.
pub use rently_api::{Credentials, FanMode, HubRecord, HvacMode, LockMode};
