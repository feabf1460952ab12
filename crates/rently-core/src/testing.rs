// In-memory `CloudApi` for state-machine tests.
//
// Holds the "remote truth" for hubs and devices and counts every call,
// so tests can assert on exact network traffic under paused time.
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rently_api::{
    CloudApi, Credentials, DeviceKind, DeviceRecord, Error, FanMode, HubRecord, HubStatus,
    HvacMode, LockMode, LockStatus, ThermostatStatus,
};

/// How `login` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginBehavior {
    Succeed,
    /// Answers but grants no session.
    Refuse,
    /// Login service unreachable.
    Unreachable,
}

/// What happens to a status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateBehavior {
    /// Remote state changes immediately.
    Apply,
    /// The n-th subsequent fetch of the device observes the change.
    ApplyAfter(u32),
    /// Accepted but never applied.
    Ignore,
    /// Rejected with a 503.
    Fail,
}

#[derive(Debug, Default)]
pub(crate) struct CallCounts {
    pub login: AtomicUsize,
    pub get_hubs: AtomicUsize,
    pub get_hub: AtomicUsize,
    pub get_devices: AtomicUsize,
    pub get_device: AtomicUsize,
    pub update: AtomicUsize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        [
            &self.login,
            &self.get_hubs,
            &self.get_hub,
            &self.get_devices,
            &self.get_device,
            &self.update,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

pub(crate) struct MockCloud {
    pub calls: CallCounts,
    connected: AtomicBool,
    login: Mutex<LoginBehavior>,
    login_latency: Mutex<Duration>,
    hubs_latency: Mutex<Duration>,
    update_latency: Mutex<Duration>,
    update: Mutex<UpdateBehavior>,
    fail_fetches: AtomicBool,
    fail_hubs_with_auth: AtomicBool,
    hubs: Mutex<Vec<HubRecord>>,
    hub_devices: Mutex<HashMap<String, Vec<String>>>,
    devices: Mutex<HashMap<String, DeviceRecord>>,
    pending: Mutex<HashMap<String, (DeviceRecord, u32)>>,
    pub last_update: Mutex<Option<DeviceRecord>>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self {
            calls: CallCounts::default(),
            connected: AtomicBool::new(false),
            login: Mutex::new(LoginBehavior::Succeed),
            login_latency: Mutex::new(Duration::ZERO),
            hubs_latency: Mutex::new(Duration::ZERO),
            update_latency: Mutex::new(Duration::ZERO),
            update: Mutex::new(UpdateBehavior::Apply),
            fail_fetches: AtomicBool::new(false),
            fail_hubs_with_auth: AtomicBool::new(false),
            hubs: Mutex::new(Vec::new()),
            hub_devices: Mutex::new(HashMap::new()),
            devices: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            last_update: Mutex::new(None),
        }
    }

    /// Start with an active session.
    pub fn connected(self) -> Self {
        self.connected.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_hub(self, id: &str) -> Self {
        self.hubs.lock().unwrap().push(HubRecord {
            id: id.into(),
            home_name: format!("Home {id}"),
            status: HubStatus {
                model: Some("KH-2".into()),
                firmware_version: Some("3.1.0".into()),
            },
        });
        self
    }

    pub fn with_lock(self, hub: &str, id: &str, mode: LockMode) -> Self {
        self.insert_device(hub, lock_record(id, mode));
        self
    }

    pub fn with_thermostat(self, hub: &str, id: &str, mode: HvacMode) -> Self {
        self.insert_device(hub, thermostat_record(id, mode));
        self
    }

    fn insert_device(&self, hub: &str, record: DeviceRecord) {
        self.hub_devices
            .lock()
            .unwrap()
            .entry(hub.into())
            .or_default()
            .push(record.id.clone());
        self.devices.lock().unwrap().insert(record.id.clone(), record);
    }

    pub fn remove_device(&self, id: &str) {
        self.devices.lock().unwrap().remove(id);
        for ids in self.hub_devices.lock().unwrap().values_mut() {
            ids.retain(|d| d != id);
        }
    }

    pub fn set_lock_mode(&self, id: &str, mode: LockMode) {
        if let Some(record) = self.devices.lock().unwrap().get_mut(id) {
            record.set_lock_mode(mode);
        }
    }

    pub fn set_login(&self, behavior: LoginBehavior) {
        *self.login.lock().unwrap() = behavior;
    }

    pub fn set_login_latency(&self, latency: Duration) {
        *self.login_latency.lock().unwrap() = latency;
    }

    pub fn set_hubs_latency(&self, latency: Duration) {
        *self.hubs_latency.lock().unwrap() = latency;
    }

    pub fn set_update_latency(&self, latency: Duration) {
        *self.update_latency.lock().unwrap() = latency;
    }

    pub fn set_update(&self, behavior: UpdateBehavior) {
        *self.update.lock().unwrap() = behavior;
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_hubs_with_auth(&self, fail: bool) {
        self.fail_hubs_with_auth.store(fail, Ordering::SeqCst);
    }

    pub fn drop_session(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn require_session(&self) -> Result<(), Error> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}

fn unavailable() -> Error {
    Error::Api {
        status: 503,
        message: "service unavailable".into(),
    }
}

#[async_trait]
impl CloudApi for MockCloud {
    async fn login(&self, _credentials: &Credentials) -> Result<bool, Error> {
        self.calls.login.fetch_add(1, Ordering::SeqCst);
        let latency = *self.login_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let behavior = *self.login.lock().unwrap();
        match behavior {
            LoginBehavior::Succeed => {
                self.connected.store(true, Ordering::SeqCst);
                Ok(true)
            }
            LoginBehavior::Refuse => Ok(false),
            LoginBehavior::Unreachable => Err(unavailable()),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn logout(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn get_hubs(&self) -> Result<Vec<HubRecord>, Error> {
        self.calls.get_hubs.fetch_add(1, Ordering::SeqCst);
        self.require_session()?;
        let latency = *self.hubs_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.fail_hubs_with_auth.load(Ordering::SeqCst) {
            self.connected.store(false, Ordering::SeqCst);
            return Err(Error::SessionExpired);
        }
        Ok(self.hubs.lock().unwrap().clone())
    }

    async fn get_hub(&self, hub_id: &str) -> Result<Option<HubRecord>, Error> {
        self.calls.get_hub.fetch_add(1, Ordering::SeqCst);
        self.require_session()?;
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self
            .hubs
            .lock()
            .unwrap()
            .iter()
            .find(|h| h.id == hub_id)
            .cloned())
    }

    async fn get_devices(&self, hub_id: &str) -> Result<Vec<DeviceRecord>, Error> {
        self.calls.get_devices.fetch_add(1, Ordering::SeqCst);
        self.require_session()?;
        let ids = self
            .hub_devices
            .lock()
            .unwrap()
            .get(hub_id)
            .cloned()
            .unwrap_or_default();
        let devices = self.devices.lock().unwrap();
        Ok(ids.iter().filter_map(|id| devices.get(id).cloned()).collect())
    }

    async fn get_device(&self, device_id: &str) -> Result<Option<DeviceRecord>, Error> {
        self.calls.get_device.fetch_add(1, Ordering::SeqCst);
        self.require_session()?;
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let mut pending = self.pending.lock().unwrap();
        if let Some((record, remaining)) = pending.get_mut(device_id) {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                let record = record.clone();
                pending.remove(device_id);
                self.devices
                    .lock()
                    .unwrap()
                    .insert(device_id.to_owned(), record);
            }
        }
        drop(pending);

        Ok(self.devices.lock().unwrap().get(device_id).cloned())
    }

    async fn update_device_status(&self, device: &DeviceRecord) -> Result<(), Error> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        self.require_session()?;
        let latency = *self.update_latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        *self.last_update.lock().unwrap() = Some(device.clone());

        let behavior = *self.update.lock().unwrap();
        match behavior {
            UpdateBehavior::Apply => {
                self.devices
                    .lock()
                    .unwrap()
                    .insert(device.id.clone(), device.clone());
            }
            UpdateBehavior::ApplyAfter(n) => {
                self.pending
                    .lock()
                    .unwrap()
                    .insert(device.id.clone(), (device.clone(), n));
            }
            UpdateBehavior::Ignore => {}
            UpdateBehavior::Fail => return Err(unavailable()),
        }
        Ok(())
    }
}

// ── Record builders ──────────────────────────────────────────────────

pub(crate) fn lock_record(id: &str, mode: LockMode) -> DeviceRecord {
    DeviceRecord {
        id: id.into(),
        name: format!("Lock {id}"),
        manufacturer: Some("Yale".into()),
        product_name: Some("Assure".into()),
        battery_level: Some(90),
        kind: DeviceKind::Lock(LockStatus { mode }),
    }
}

pub(crate) fn thermostat_record(id: &str, mode: HvacMode) -> DeviceRecord {
    DeviceRecord {
        id: id.into(),
        name: format!("Thermostat {id}"),
        manufacturer: Some("Honeywell".into()),
        product_name: Some("T6".into()),
        battery_level: None,
        kind: DeviceKind::Thermostat(ThermostatStatus {
            mode,
            fan_mode: FanMode::Auto,
            room_temperature: Some(71.5),
            heating_setpoint: Some(66),
            cooling_setpoint: Some(76),
            available_hvac_modes: vec![HvacMode::Off, HvacMode::Heat, HvacMode::Cool, HvacMode::Auto],
            available_fan_modes: vec![FanMode::Auto, FanMode::On],
        }),
    }
}

pub(crate) fn credentials() -> Credentials {
    Credentials::new(
        "owner@example.com",
        secrecy::SecretString::from("hunter2".to_owned()),
    )
}
