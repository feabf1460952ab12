// Wire and record types for the Keyless device API.
//
// Raw `Wire*` shapes mirror the JSON exactly; the public records are
// what the rest of the workspace consumes. Conversion happens here so
// callers never see an untyped `status` blob.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::error::Error;

// ── Enumerations ────────────────────────────────────────────────────

/// Lock position as reported by the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    Locked,
    Unlocked,
    Jammed,
    Locking,
    Unlocking,
    Open,
    #[serde(other)]
    Unavailable,
}

impl LockMode {
    /// A command is in flight and the final position is not known yet.
    pub fn is_transitional(self) -> bool {
        matches!(self, Self::Locking | Self::Unlocking | Self::Open)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
            Self::Jammed => "jammed",
            Self::Locking => "locking",
            Self::Unlocking => "unlocking",
            Self::Open => "open",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thermostat operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    Auto,
    On,
}

impl HvacMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::Auto => "auto",
            Self::On => "on",
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HvacMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "heat" => Ok(Self::Heat),
            "cool" => Ok(Self::Cool),
            "auto" => Ok(Self::Auto),
            "on" => Ok(Self::On),
            other => Err(format!("unknown HVAC mode '{other}'")),
        }
    }
}

/// Thermostat fan mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanMode {
    On,
    Auto,
}

impl FanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for FanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Ok(Self::On),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown fan mode '{other}'")),
        }
    }
}

// ── Hub ─────────────────────────────────────────────────────────────

/// Snapshot of a hub (the gateway bridging locks and thermostats).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubRecord {
    pub id: String,
    pub home_name: String,
    pub status: HubStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubStatus {
    pub model: Option<String>,
    pub firmware_version: Option<String>,
}

// ── Devices ─────────────────────────────────────────────────────────

/// Snapshot of a single device, re-fetched on every poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    pub battery_level: Option<u8>,
    pub kind: DeviceKind,
}

/// Capability-specific part of a device record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceKind {
    Lock(LockStatus),
    Thermostat(ThermostatStatus),
    Other { device_type: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockStatus {
    pub mode: LockMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThermostatStatus {
    pub mode: HvacMode,
    pub fan_mode: FanMode,
    pub room_temperature: Option<f64>,
    pub heating_setpoint: Option<i32>,
    pub cooling_setpoint: Option<i32>,
    pub available_hvac_modes: Vec<HvacMode>,
    pub available_fan_modes: Vec<FanMode>,
}

impl DeviceRecord {
    pub fn is_lock(&self) -> bool {
        matches!(self.kind, DeviceKind::Lock(_))
    }

    pub fn is_thermostat(&self) -> bool {
        matches!(self.kind, DeviceKind::Thermostat(_))
    }

    pub fn lock_mode(&self) -> Option<LockMode> {
        match &self.kind {
            DeviceKind::Lock(status) => Some(status.mode),
            _ => None,
        }
    }

    pub fn thermostat(&self) -> Option<&ThermostatStatus> {
        match &self.kind {
            DeviceKind::Thermostat(status) => Some(status),
            _ => None,
        }
    }

    pub fn thermostat_mut(&mut self) -> Option<&mut ThermostatStatus> {
        match &mut self.kind {
            DeviceKind::Thermostat(status) => Some(status),
            _ => None,
        }
    }

    /// Set the desired lock position. No-op for non-lock devices.
    pub fn set_lock_mode(&mut self, mode: LockMode) {
        if let DeviceKind::Lock(status) = &mut self.kind {
            status.mode = mode;
        }
    }

    /// The `status` object sent with `PUT devices/{id}`.
    pub(crate) fn status_payload(&self) -> Result<Value, Error> {
        match &self.kind {
            DeviceKind::Lock(status) => Ok(json!({ "mode": status.mode })),
            DeviceKind::Thermostat(t) => Ok(json!({
                "mode": t.mode,
                "fan": t.fan_mode,
                "heatingSetpoint": t.heating_setpoint,
                "coolingSetpoint": t.cooling_setpoint,
            })),
            DeviceKind::Other { device_type } => Err(Error::Api {
                status: 0,
                message: format!("device type '{device_type}' does not accept commands"),
            }),
        }
    }
}

// ── Wire shapes ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct WireLoginResponse {
    #[serde(default)]
    pub success: bool,
    pub token: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireHubList {
    #[serde(default)]
    pub hubs: Vec<WireHub>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireHub {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub home_name: Option<String>,
    #[serde(default)]
    pub status: WireHubStatus,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireHubStatus {
    pub model: Option<String>,
    #[serde(rename = "fmVer")]
    pub fm_ver: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDeviceList {
    #[serde(default)]
    pub devices: Vec<WireDevice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireDevice {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    pub device_type: String,
    pub battery: Option<u8>,
    #[serde(default)]
    pub status: Value,
}

#[derive(Debug, Deserialize)]
struct WireLockStatus {
    #[serde(default = "unavailable")]
    mode: LockMode,
}

fn unavailable() -> LockMode {
    LockMode::Unavailable
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireThermostatStatus {
    mode: HvacMode,
    fan: FanMode,
    room_temp: Option<f64>,
    heating_setpoint: Option<i32>,
    cooling_setpoint: Option<i32>,
    #[serde(default)]
    modes: Vec<HvacMode>,
    #[serde(default)]
    fan_modes: Vec<FanMode>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

// ── Conversions ─────────────────────────────────────────────────────

impl From<WireHub> for HubRecord {
    fn from(hub: WireHub) -> Self {
        Self {
            home_name: hub.home_name.unwrap_or_else(|| hub.id.clone()),
            id: hub.id,
            status: HubStatus {
                model: hub.status.model,
                firmware_version: hub.status.fm_ver,
            },
        }
    }
}

impl TryFrom<WireDevice> for DeviceRecord {
    type Error = Error;

    fn try_from(device: WireDevice) -> Result<Self, Self::Error> {
        let kind = match device.device_type.to_ascii_lowercase().as_str() {
            "lock" => {
                let status: WireLockStatus = decode_status(&device.status)?;
                DeviceKind::Lock(LockStatus { mode: status.mode })
            }
            "thermostat" => {
                let s: WireThermostatStatus = decode_status(&device.status)?;
                DeviceKind::Thermostat(ThermostatStatus {
                    mode: s.mode,
                    fan_mode: s.fan,
                    room_temperature: s.room_temp,
                    heating_setpoint: s.heating_setpoint,
                    cooling_setpoint: s.cooling_setpoint,
                    available_hvac_modes: s.modes,
                    available_fan_modes: s.fan_modes,
                })
            }
            _ => DeviceKind::Other {
                device_type: device.device_type.clone(),
            },
        };

        Ok(Self {
            name: device.name.unwrap_or_else(|| device.id.clone()),
            id: device.id,
            manufacturer: device.manufacturer,
            product_name: device.product_name,
            battery_level: device.battery,
            kind,
        })
    }
}

fn decode_status<T: serde::de::DeserializeOwned>(status: &Value) -> Result<T, Error> {
    T::deserialize(status).map_err(|e| Error::InvalidResponse {
        message: format!("device status: {e}"),
        body: status.to_string(),
    })
}
