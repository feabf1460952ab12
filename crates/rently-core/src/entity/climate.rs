// ── Climate state machine ──
//
// A thermostat's state is its attribute tuple: HVAC mode, fan mode, the
// heating/cooling setpoints and the room temperature. Setters build an
// explicit `ClimateTarget`, push it, and confirm against that target.
// Temperatures are whole degrees Fahrenheit on the wire.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use rently_api::{CloudApi, DeviceRecord, FanMode, HvacMode, ThermostatStatus};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::confirm::{Confirmation, poll_until};
use super::{DOMAIN, DeviceInfo, EntityKind, Pollable, not_found};
use crate::config::RetryPolicy;
use crate::error::CoreError;

pub const TEMPERATURE_UNIT: &str = "°F";

/// Observable thermostat state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClimateState {
    pub available: bool,
    pub hvac_mode: Option<HvacMode>,
    pub fan_mode: Option<FanMode>,
    pub current_temperature: Option<f64>,
    /// Heating setpoint.
    pub target_temperature_low: Option<i32>,
    /// Cooling setpoint.
    pub target_temperature_high: Option<i32>,
    pub hvac_modes: Vec<HvacMode>,
    pub fan_modes: Vec<FanMode>,
    pub battery_level: Option<u8>,
}

impl ClimateState {
    fn from_record(record: &DeviceRecord) -> Self {
        let Some(t) = record.thermostat() else {
            return Self {
                available: true,
                battery_level: record.battery_level,
                ..Self::default()
            };
        };
        Self {
            available: true,
            hvac_mode: Some(t.mode),
            fan_mode: Some(t.fan_mode),
            current_temperature: t.room_temperature,
            target_temperature_low: t.heating_setpoint,
            target_temperature_high: t.cooling_setpoint,
            hvac_modes: t.available_hvac_modes.clone(),
            fan_modes: t.available_fan_modes.clone(),
            battery_level: record.battery_level,
        }
    }
}

/// The attributes a save writes and then waits to see reflected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClimateTarget {
    pub hvac_mode: HvacMode,
    pub fan_mode: FanMode,
    pub heating_setpoint: Option<i32>,
    pub cooling_setpoint: Option<i32>,
}

impl ClimateTarget {
    fn from_status(status: &ThermostatStatus) -> Self {
        Self {
            hvac_mode: status.mode,
            fan_mode: status.fan_mode,
            heating_setpoint: status.heating_setpoint,
            cooling_setpoint: status.cooling_setpoint,
        }
    }

    fn apply_to(self, status: &mut ThermostatStatus) {
        status.mode = self.hvac_mode;
        status.fan_mode = self.fan_mode;
        status.heating_setpoint = self.heating_setpoint;
        status.cooling_setpoint = self.cooling_setpoint;
    }

    fn matches(self, record: &DeviceRecord) -> bool {
        record
            .thermostat()
            .is_some_and(|t| Self::from_status(t) == self)
    }
}

/// Arguments of a set-temperature call. Any subset may be present.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TemperatureRequest {
    pub temperature: Option<f64>,
    pub target_low: Option<f64>,
    pub target_high: Option<f64>,
}

/// A thermostat bound to one cloud device ID.
pub struct ClimateEntity {
    id: String,
    cloud: Arc<dyn CloudApi>,
    confirm: RetryPolicy,
    min_spread: i32,
    cancel: CancellationToken,
    record: RwLock<Option<DeviceRecord>>,
    state: watch::Sender<ClimateState>,
    command: Mutex<()>,
}

impl ClimateEntity {
    pub fn new(
        id: impl Into<String>,
        cloud: Arc<dyn CloudApi>,
        confirm: RetryPolicy,
        min_spread: i32,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(ClimateState::default());
        Self {
            id: id.into(),
            cloud,
            confirm,
            min_spread,
            cancel,
            record: RwLock::new(None),
            state,
            command: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn unique_id(&self) -> String {
        format!("{DOMAIN}-climate-{}", self.id)
    }

    pub fn name(&self) -> String {
        self.record
            .read()
            .expect("record lock poisoned")
            .as_ref()
            .map_or_else(|| self.id.clone(), |r| r.name.clone())
    }

    pub fn device_info(&self) -> DeviceInfo {
        let record = self.record.read().expect("record lock poisoned");
        DeviceInfo {
            domain: DOMAIN,
            identifier: self.id.clone(),
            name: record.as_ref().map_or_else(|| self.id.clone(), |r| r.name.clone()),
            manufacturer: record.as_ref().and_then(|r| r.manufacturer.clone()),
            model: record.as_ref().and_then(|r| r.product_name.clone()),
            sw_version: None,
        }
    }

    pub fn temperature_unit(&self) -> &'static str {
        TEMPERATURE_UNIT
    }

    pub fn state(&self) -> ClimateState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ClimateState> {
        self.state.subscribe()
    }

    pub fn available(&self) -> bool {
        self.state.borrow().available
    }

    // ── Refresh ──────────────────────────────────────────────────────

    pub async fn update(&self) -> Result<(), CoreError> {
        match self.cloud.get_device(&self.id).await? {
            Some(record) => self.apply(record),
            None => {
                if self.available() {
                    warn!(device_id = %self.id, "thermostat not found");
                }
                self.state.send_if_modified(|s| std::mem::replace(&mut s.available, false));
            }
        }
        Ok(())
    }

    pub(crate) fn seed(&self, record: DeviceRecord) {
        if let Ok(_guard) = self.command.try_lock() {
            self.apply(record);
        }
    }

    fn apply(&self, record: DeviceRecord) {
        let next = ClimateState::from_record(&record);
        *self.record.write().expect("record lock poisoned") = Some(record);
        self.publish(next);
    }

    fn publish(&self, next: ClimateState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    /// Current thermostat status, or `DeviceNotFound` if never loaded.
    fn status(&self) -> Result<ThermostatStatus, CoreError> {
        self.record
            .read()
            .expect("record lock poisoned")
            .as_ref()
            .and_then(DeviceRecord::thermostat)
            .cloned()
            .ok_or_else(|| not_found(&self.id))
    }

    // ── Setters ──────────────────────────────────────────────────────

    pub async fn set_hvac_mode(&self, mode: HvacMode) -> Result<(), CoreError> {
        let guard = self.command.lock().await;
        let status = self.status()?;
        if !status.available_hvac_modes.contains(&mode) {
            return Err(CoreError::StateNotSupported {
                message: format!("HVAC mode '{mode}' is not offered by {}", self.id),
            });
        }
        let mut target = ClimateTarget::from_status(&status);
        target.hvac_mode = mode;
        self.save_locked(&guard, target).await
    }

    pub async fn turn_on(&self) -> Result<(), CoreError> {
        self.set_hvac_mode(HvacMode::On).await
    }

    pub async fn turn_off(&self) -> Result<(), CoreError> {
        self.set_hvac_mode(HvacMode::Off).await
    }

    pub async fn set_fan_mode(&self, mode: FanMode) -> Result<(), CoreError> {
        let guard = self.command.lock().await;
        let status = self.status()?;
        if !status.available_fan_modes.contains(&mode) {
            return Err(CoreError::StateNotSupported {
                message: format!("fan mode '{mode}' is not offered by {}", self.id),
            });
        }
        let mut target = ClimateTarget::from_status(&status);
        target.fan_mode = mode;
        self.save_locked(&guard, target).await
    }

    pub async fn set_temperature(&self, request: TemperatureRequest) -> Result<(), CoreError> {
        let guard = self.command.lock().await;
        let status = self.status()?;
        let (low, high) = resolve_setpoints(status.mode, request, self.min_spread)?;
        let mut target = ClimateTarget::from_status(&status);
        target.heating_setpoint = Some(low);
        target.cooling_setpoint = Some(high);
        self.save_locked(&guard, target).await
    }

    /// Push `target`, publish it optimistically, then confirm against it.
    pub async fn save(&self, target: ClimateTarget) -> Result<(), CoreError> {
        let guard = self.command.lock().await;
        self.save_locked(&guard, target).await
    }

    /// The save itself. Callers hold the command guard from the moment
    /// they read the record they derived `target` from.
    async fn save_locked(
        &self,
        _guard: &MutexGuard<'_, ()>,
        target: ClimateTarget,
    ) -> Result<(), CoreError> {
        let mut desired = self
            .record
            .read()
            .expect("record lock poisoned")
            .clone()
            .ok_or_else(|| not_found(&self.id))?;
        let status = desired.thermostat_mut().ok_or_else(|| not_found(&self.id))?;
        target.apply_to(status);

        info!(
            device_id = %self.id,
            mode = %target.hvac_mode,
            fan = %target.fan_mode,
            heat = ?target.heating_setpoint,
            cool = ?target.cooling_setpoint,
            "saving thermostat state"
        );
        if let Err(e) = self.cloud.update_device_status(&desired).await {
            warn!(device_id = %self.id, error = %e, "thermostat save failed");
            self.settle().await;
            return Err(e.into());
        }
        self.publish(ClimateState::from_record(&desired));

        let outcome = poll_until(self.confirm, &self.cancel, |attempt| {
            self.probe(attempt, target)
        })
        .await;

        match outcome {
            Confirmation::Cancelled => return Ok(()),
            Confirmation::Converged { attempt } => {
                debug!(device_id = %self.id, attempt, "thermostat save confirmed");
            }
            Confirmation::Exhausted => {
                warn!(device_id = %self.id, "thermostat did not confirm the save");
            }
        }

        self.settle().await;
        Ok(())
    }

    async fn probe(&self, attempt: u32, target: ClimateTarget) -> bool {
        match self.cloud.get_device(&self.id).await {
            Ok(Some(record)) => {
                let converged = target.matches(&record);
                *self.record.write().expect("record lock poisoned") = Some(record);
                converged
            }
            Ok(None) => false,
            Err(e) => {
                warn!(device_id = %self.id, attempt, error = %e, "confirmation fetch failed");
                false
            }
        }
    }

    /// Final unconditional refresh. Never leaves the optimistic state up.
    async fn settle(&self) {
        match self.update().await {
            Ok(()) if self.available() => {}
            Ok(()) => self.publish_observed(),
            Err(e) => {
                warn!(device_id = %self.id, error = %e, "final refresh failed");
                self.publish_observed();
            }
        }
    }

    /// Publish the attributes of the last fetched record, keeping the
    /// current availability.
    fn publish_observed(&self) {
        let observed = self
            .record
            .read()
            .expect("record lock poisoned")
            .as_ref()
            .map(ClimateState::from_record);
        if let Some(mut observed) = observed {
            observed.available = self.available();
            self.publish(observed);
        }
    }

    /// Stop any confirmation loop; the entity is being dropped.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    #[cfg(test)]
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[async_trait]
impl Pollable for ClimateEntity {
    fn unique_id(&self) -> String {
        ClimateEntity::unique_id(self)
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Climate
    }

    fn available(&self) -> bool {
        ClimateEntity::available(self)
    }

    async fn refresh(&self) -> Result<(), CoreError> {
        let Ok(_guard) = self.command.try_lock() else {
            debug!(device_id = %self.id, "command in flight, skipping poll");
            return Ok(());
        };
        self.update().await
    }
}

// ── Setpoint resolution ──────────────────────────────────────────────

/// Work out the `(heating, cooling)` pair for a set-temperature request.
///
/// `cool` only moves the cooling bound and `heat` only the heating bound;
/// the other follows at `spread` degrees. Range modes take both bounds and
/// keep them at least `spread` apart.
pub fn resolve_setpoints(
    mode: HvacMode,
    request: TemperatureRequest,
    spread: i32,
) -> Result<(i32, i32), CoreError> {
    let TemperatureRequest {
        temperature,
        target_low,
        target_high,
    } = request;

    if temperature.is_none() && target_low.is_none() && target_high.is_none() {
        return Err(CoreError::ValidationFailed {
            message: "no temperature given".into(),
        });
    }

    match mode {
        HvacMode::Cool => {
            let Some(high) = temperature.or(target_high) else {
                return Err(CoreError::StateNotSupported {
                    message: "cool mode only adjusts the cooling setpoint".into(),
                });
            };
            let high = whole_degrees(high)?;
            Ok((high - spread, high))
        }
        HvacMode::Heat => {
            let Some(low) = temperature.or(target_low) else {
                return Err(CoreError::StateNotSupported {
                    message: "heat mode only adjusts the heating setpoint".into(),
                });
            };
            let low = whole_degrees(low)?;
            Ok((low, low + spread))
        }
        HvacMode::Auto | HvacMode::On | HvacMode::Off => {
            let low = target_low.map(whole_degrees).transpose()?;
            let high = target_high.map(whole_degrees).transpose()?;
            match (low, high) {
                (Some(low), Some(high)) => Ok((low, high.max(low + spread))),
                (Some(low), None) => Ok((low, low + spread)),
                (None, Some(high)) => Ok((high - spread, high)),
                (None, None) => Err(CoreError::StateNotSupported {
                    message: format!("{mode} mode needs a low and/or high setpoint"),
                }),
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn whole_degrees(value: f64) -> Result<i32, CoreError> {
    if !value.is_finite() || value.abs() > 1000.0 {
        return Err(CoreError::ValidationFailed {
            message: format!("temperature {value} is out of range"),
        });
    }
    Ok(value.trunc() as i32)
}
