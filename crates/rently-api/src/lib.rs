//! Async Rust client for the Rently login service and Keyless device API.
//!
//! - **[`CloudApi`]** is the seam the rest of the workspace programs
//!   against: login, hub and device reads, and device status writes.
//! - **[`RentlyCloud`]** is the `reqwest` implementation. It owns the
//!   bearer session and drops it when the device API answers 401.
//! - **Records** ([`HubRecord`], [`DeviceRecord`]) are decoded from the
//!   wire once, so callers never handle a raw `status` blob.

pub mod auth;
pub mod client;
pub mod cloud;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::Credentials;
pub use client::{DEFAULT_API_URL, DEFAULT_LOGIN_URL, RentlyCloud};
pub use cloud::CloudApi;
pub use error::Error;
pub use models::{
    DeviceKind, DeviceRecord, FanMode, HubRecord, HubStatus, HvacMode, LockMode, LockStatus,
    ThermostatStatus,
};
pub use transport::TransportConfig;
