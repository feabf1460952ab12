// ── Lock state machine ──
//
// unavailable → {locked, unlocked, jammed}, with the transient locking /
// unlocking / open states published while a command is in flight. The
// published state always ends on what the cloud last reported.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use rently_api::{CloudApi, DeviceRecord, LockMode};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::confirm::{Confirmation, poll_until};
use super::{DOMAIN, DeviceInfo, EntityKind, Pollable, not_found};
use crate::config::RetryPolicy;
use crate::error::CoreError;

/// Observable lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockState {
    pub mode: LockMode,
    pub available: bool,
    pub battery_level: Option<u8>,
}

impl Default for LockState {
    fn default() -> Self {
        Self {
            mode: LockMode::Unavailable,
            available: false,
            battery_level: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockCommand {
    Lock,
    Unlock,
}

impl LockCommand {
    fn target(self) -> LockMode {
        match self {
            Self::Lock => LockMode::Locked,
            Self::Unlock => LockMode::Unlocked,
        }
    }

    fn transitional(self) -> LockMode {
        match self {
            Self::Lock => LockMode::Locking,
            Self::Unlock => LockMode::Unlocking,
        }
    }

    /// An unlock has landed as soon as the bolt is anything but locked.
    fn converged(self, remote: LockMode) -> bool {
        match self {
            Self::Lock => remote == LockMode::Locked,
            Self::Unlock => remote != LockMode::Locked,
        }
    }
}

/// A smart lock bound to one cloud device ID.
pub struct LockEntity {
    id: String,
    cloud: Arc<dyn CloudApi>,
    confirm: RetryPolicy,
    cancel: CancellationToken,
    /// Last record fetched from the cloud.
    record: RwLock<Option<DeviceRecord>>,
    state: watch::Sender<LockState>,
    command: Mutex<()>,
}

impl LockEntity {
    pub fn new(
        id: impl Into<String>,
        cloud: Arc<dyn CloudApi>,
        confirm: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(LockState::default());
        Self {
            id: id.into(),
            cloud,
            confirm,
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
        format!("{DOMAIN}-{}", self.id)
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

    // ── Observable state ─────────────────────────────────────────────

    pub fn state(&self) -> LockState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LockState> {
        self.state.subscribe()
    }

    pub fn available(&self) -> bool {
        self.state.borrow().available
    }

    pub fn battery_level(&self) -> Option<u8> {
        self.state.borrow().battery_level
    }

    pub fn is_locked(&self) -> bool {
        self.state.borrow().mode == LockMode::Locked
    }

    pub fn is_jammed(&self) -> bool {
        self.state.borrow().mode == LockMode::Jammed
    }

    pub fn is_locking(&self) -> bool {
        self.state.borrow().mode == LockMode::Locking
    }

    pub fn is_unlocking(&self) -> bool {
        self.state.borrow().mode == LockMode::Unlocking
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Fetch the device and publish its state.
    ///
    /// A device the cloud no longer knows is marked unavailable with its
    /// last state left in place.
    pub async fn update(&self) -> Result<(), CoreError> {
        match self.cloud.get_device(&self.id).await? {
            Some(record) => self.apply(record),
            None => self.mark_missing(),
        }
        Ok(())
    }

    /// Adopt a record fetched elsewhere (fleet discovery). Skipped while a
    /// command holds the entity, so an optimistic state is not clobbered.
    pub(crate) fn seed(&self, record: DeviceRecord) {
        if let Ok(_guard) = self.command.try_lock() {
            self.apply(record);
        }
    }

    fn apply(&self, record: DeviceRecord) {
        let next = LockState {
            mode: record.lock_mode().unwrap_or(LockMode::Unavailable),
            available: true,
            battery_level: record.battery_level,
        };
        *self.record.write().expect("record lock poisoned") = Some(record);
        self.publish(next);
    }

    fn mark_missing(&self) {
        if self.available() {
            warn!(device_id = %self.id, "lock not found");
        } else {
            debug!(device_id = %self.id, "lock still not found");
        }
        let mut next = self.state();
        next.available = false;
        self.publish(next);
    }

    /// Publish the mode of the last fetched record.
    fn publish_observed(&self) {
        let mode = self
            .record
            .read()
            .expect("record lock poisoned")
            .as_ref()
            .and_then(DeviceRecord::lock_mode)
            .unwrap_or(LockMode::Unavailable);
        let mut next = self.state();
        next.mode = mode;
        self.publish(next);
    }

    fn publish_mode(&self, mode: LockMode) {
        let mut next = self.state();
        next.mode = mode;
        self.publish(next);
    }

    fn publish(&self, next: LockState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn lock(&self) -> Result<(), CoreError> {
        self.run(LockCommand::Lock).await
    }

    pub async fn unlock(&self) -> Result<(), CoreError> {
        self.run(LockCommand::Unlock).await
    }

    async fn run(&self, command: LockCommand) -> Result<(), CoreError> {
        let _guard = self.command.lock().await;

        let mut desired = self
            .record
            .read()
            .expect("record lock poisoned")
            .clone()
            .ok_or_else(|| not_found(&self.id))?;

        self.publish_mode(command.transitional());
        desired.set_lock_mode(command.target());

        info!(device_id = %self.id, desired = %command.target(), "sending lock command");
        if let Err(e) = self.cloud.update_device_status(&desired).await {
            warn!(device_id = %self.id, error = %e, "lock command failed");
            self.settle().await;
            return Err(e.into());
        }

        let outcome = poll_until(self.confirm, &self.cancel, |attempt| {
            self.probe(attempt, command)
        })
        .await;

        match outcome {
            Confirmation::Cancelled => {
                debug!(device_id = %self.id, "confirmation cancelled");
                return Ok(());
            }
            Confirmation::Converged { attempt } => {
                debug!(device_id = %self.id, attempt, "lock command confirmed");
            }
            Confirmation::Exhausted => {
                warn!(
                    device_id = %self.id,
                    desired = %command.target(),
                    "lock did not confirm the command"
                );
            }
        }

        self.settle().await;
        Ok(())
    }

    /// One confirmation fetch. Failures are logged and count as "not yet".
    async fn probe(&self, attempt: u32, command: LockCommand) -> bool {
        match self.cloud.get_device(&self.id).await {
            Ok(Some(record)) => {
                let converged = record.lock_mode().is_some_and(|m| command.converged(m));
                *self.record.write().expect("record lock poisoned") = Some(record);
                converged
            }
            Ok(None) => {
                debug!(device_id = %self.id, attempt, "lock missing during confirmation");
                false
            }
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
impl Pollable for LockEntity {
    fn unique_id(&self) -> String {
        LockEntity::unique_id(self)
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Lock
    }

    fn available(&self) -> bool {
        LockEntity::available(self)
    }

    async fn refresh(&self) -> Result<(), CoreError> {
        // A command in flight owns the published state until it settles.
        let Ok(_guard) = self.command.try_lock() else {
            debug!(device_id = %self.id, "command in flight, skipping poll");
            return Ok(());
        };
        self.update().await
    }
}
