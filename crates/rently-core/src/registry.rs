// ── Entity registry snapshot ──
//
// One immutable view of an account's hubs, locks and climates, rebuilt
// off to the side on every fleet refresh and swapped in whole. Entities
// whose IDs survive a refresh are carried over so their state and any
// in-flight command are kept.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rently_api::{CloudApi, DeviceKind, DeviceRecord, HubRecord};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::RetryPolicy;
use crate::entity::{ClimateEntity, HubEntity, LockEntity, Pollable};

/// Immutable snapshot of every entity in one account.
#[derive(Default)]
pub struct EntityRegistry {
    generation: u64,
    refreshed_at: Option<DateTime<Utc>>,
    hubs: Vec<Arc<HubEntity>>,
    locks: Vec<Arc<LockEntity>>,
    climates: Vec<Arc<ClimateEntity>>,
}

impl EntityRegistry {
    /// Bumped on every successful discovery.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn hubs(&self) -> &[Arc<HubEntity>] {
        &self.hubs
    }

    pub fn locks(&self) -> &[Arc<LockEntity>] {
        &self.locks
    }

    pub fn climates(&self) -> &[Arc<ClimateEntity>] {
        &self.climates
    }

    pub fn hub(&self, id: &str) -> Option<Arc<HubEntity>> {
        self.hubs.iter().find(|h| h.id() == id).cloned()
    }

    pub fn lock(&self, id: &str) -> Option<Arc<LockEntity>> {
        self.locks.iter().find(|l| l.id() == id).cloned()
    }

    pub fn climate(&self, id: &str) -> Option<Arc<ClimateEntity>> {
        self.climates.iter().find(|c| c.id() == id).cloned()
    }

    /// IDs of every lock and climate device.
    pub fn device_ids(&self) -> Vec<String> {
        self.locks
            .iter()
            .map(|l| l.id().to_owned())
            .chain(self.climates.iter().map(|c| c.id().to_owned()))
            .collect()
    }

    /// Every entity, as the poll task sees them.
    pub fn pollables(&self) -> Vec<Arc<dyn Pollable>> {
        let hubs = self.hubs.iter().map(|h| Arc::clone(h) as Arc<dyn Pollable>);
        let locks = self.locks.iter().map(|l| Arc::clone(l) as Arc<dyn Pollable>);
        let climates = self
            .climates
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn Pollable>);
        hubs.chain(locks).chain(climates).collect()
    }

    pub fn len(&self) -> usize {
        self.hubs.len() + self.locks.len() + self.climates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What the builder needs to construct new entities.
pub(crate) struct EntityContext {
    pub cloud: Arc<dyn CloudApi>,
    /// Account-scoped token; each entity gets a child.
    pub cancel: CancellationToken,
    pub lock_confirm: RetryPolicy,
    pub climate_confirm: RetryPolicy,
    pub min_setpoint_spread: i32,
}

/// Build the next snapshot from fresh cloud data and the previous snapshot.
pub(crate) fn rebuild(
    previous: &EntityRegistry,
    ctx: &EntityContext,
    hubs: Vec<HubRecord>,
    devices: Vec<DeviceRecord>,
) -> EntityRegistry {
    let mut old_hubs: HashMap<&str, &Arc<HubEntity>> =
        previous.hubs.iter().map(|h| (h.id(), h)).collect();
    let mut old_locks: HashMap<&str, &Arc<LockEntity>> =
        previous.locks.iter().map(|l| (l.id(), l)).collect();
    let mut old_climates: HashMap<&str, &Arc<ClimateEntity>> =
        previous.climates.iter().map(|c| (c.id(), c)).collect();

    let hubs: Vec<Arc<HubEntity>> = hubs
        .into_iter()
        .map(|record| {
            let entity = old_hubs.remove(record.id.as_str()).map_or_else(
                || Arc::new(HubEntity::new(record.id.clone(), Arc::clone(&ctx.cloud))),
                Arc::clone,
            );
            entity.seed(record);
            entity
        })
        .collect();

    let mut locks = Vec::new();
    let mut climates = Vec::new();
    for record in devices {
        match &record.kind {
            DeviceKind::Lock(_) => {
                let entity = old_locks.remove(record.id.as_str()).map_or_else(
                    || {
                        Arc::new(LockEntity::new(
                            record.id.clone(),
                            Arc::clone(&ctx.cloud),
                            ctx.lock_confirm,
                            ctx.cancel.child_token(),
                        ))
                    },
                    Arc::clone,
                );
                entity.seed(record);
                locks.push(entity);
            }
            DeviceKind::Thermostat(_) => {
                let entity = old_climates.remove(record.id.as_str()).map_or_else(
                    || {
                        Arc::new(ClimateEntity::new(
                            record.id.clone(),
                            Arc::clone(&ctx.cloud),
                            ctx.climate_confirm,
                            ctx.min_setpoint_spread,
                            ctx.cancel.child_token(),
                        ))
                    },
                    Arc::clone,
                );
                entity.seed(record);
                climates.push(entity);
            }
            DeviceKind::Other { device_type } => {
                debug!(device_id = %record.id, %device_type, "ignoring unsupported device");
            }
        }
    }

    let dropped = old_hubs.len() + old_locks.len() + old_climates.len();
    if dropped > 0 {
        debug!(dropped, "entities no longer reported by the cloud");
    }
    for lock in old_locks.into_values() {
        lock.cancel();
    }
    for climate in old_climates.into_values() {
        climate.cancel();
    }

    EntityRegistry {
        generation: previous.generation + 1,
        refreshed_at: Some(Utc::now()),
        hubs,
        locks,
        climates,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use rently_api::{HubStatus, HvacMode, LockMode};

    use super::*;
    use crate::testing::{MockCloud, lock_record, thermostat_record};

    fn ctx() -> EntityContext {
        EntityContext {
            cloud: Arc::new(MockCloud::new()),
            cancel: CancellationToken::new(),
            lock_confirm: RetryPolicy::new(3, Duration::from_secs(8)),
            climate_confirm: RetryPolicy::new(3, Duration::from_secs(8)),
            min_setpoint_spread: 3,
        }
    }

    fn hub(id: &str) -> HubRecord {
        HubRecord {
            id: id.into(),
            home_name: id.into(),
            status: HubStatus::default(),
        }
    }

    #[test]
    fn classifies_devices_by_kind() {
        let other = DeviceRecord {
            kind: DeviceKind::Other {
                device_type: "switch".into(),
            },
            ..lock_record("s1", LockMode::Locked)
        };
        let registry = rebuild(
            &EntityRegistry::default(),
            &ctx(),
            vec![hub("h1")],
            vec![
                lock_record("l1", LockMode::Locked),
                thermostat_record("t1", HvacMode::Cool),
                other,
            ],
        );

        assert_eq!(registry.generation(), 1);
        assert_eq!(registry.hubs().len(), 1);
        assert_eq!(registry.locks().len(), 1);
        assert_eq!(registry.climates().len(), 1);
        assert_eq!(registry.device_ids(), vec!["l1".to_owned(), "t1".to_owned()]);
        assert_eq!(registry.pollables().len(), 3);
        assert!(registry.lock("l1").unwrap().is_locked());
    }

    #[test]
    fn surviving_entities_are_reused() {
        let ctx = ctx();
        let first = rebuild(
            &EntityRegistry::default(),
            &ctx,
            vec![hub("h1")],
            vec![
                lock_record("l1", LockMode::Locked),
                lock_record("l2", LockMode::Locked),
            ],
        );
        let second = rebuild(
            &first,
            &ctx,
            vec![hub("h1")],
            vec![lock_record("l1", LockMode::Unlocked)],
        );

        assert!(Arc::ptr_eq(
            &first.lock("l1").unwrap(),
            &second.lock("l1").unwrap()
        ));
        assert!(second.lock("l2").is_none());
        assert_eq!(second.generation(), 2);
        assert!(!second.lock("l1").unwrap().is_locked());
    }

    #[test]
    fn dropped_entities_are_cancelled() {
        let ctx = ctx();
        let first = rebuild(
            &EntityRegistry::default(),
            &ctx,
            vec![hub("h1")],
            vec![
                lock_record("l1", LockMode::Locked),
                lock_record("l2", LockMode::Locked),
                thermostat_record("t1", HvacMode::Heat),
            ],
        );
        let kept = first.lock("l1").unwrap();
        let gone_lock = first.lock("l2").unwrap();
        let gone_climate = first.climate("t1").unwrap();

        let _second = rebuild(
            &first,
            &ctx,
            vec![hub("h1")],
            vec![lock_record("l1", LockMode::Locked)],
        );

        assert!(gone_lock.is_cancelled());
        assert!(gone_climate.is_cancelled());
        assert!(!kept.is_cancelled());
        assert!(!ctx.cancel.is_cancelled());
    }
}
