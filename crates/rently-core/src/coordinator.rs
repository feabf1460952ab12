// ── Refresh coordinator ──
//
// Per-account lifecycle: login with bounded retries, periodic fleet
// refresh (hubs, then their devices), the entity poll schedule, and
// teardown. Entities are rebuilt into a fresh registry snapshot on every
// successful fleet refresh and swapped in atomically.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use rently_api::{CloudApi, Credentials, HubRecord};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CoordinatorConfig, RetryPolicy};
use crate::entity::{ClimateEntity, HubEntity, LockEntity};
use crate::error::CoreError;
use crate::registry::{self, EntityContext, EntityRegistry};

// ── CoordinatorState ─────────────────────────────────────────────

/// Account state observable by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Created, no refresh attempted yet.
    Idle,
    /// Last fleet refresh succeeded.
    Ready,
    /// Last fleet refresh failed in a recoverable way.
    UpdateFailed,
    /// Credentials rejected; schedules suspended until re-authentication.
    AuthFailed,
    ShutDown,
}

// ── Coordinator ──────────────────────────────────────────────────

/// Owns one account's session, registry and background schedules.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    cloud: Arc<dyn CloudApi>,
    config: RwLock<CoordinatorConfig>,
    registry: ArcSwap<EntityRegistry>,
    state: watch::Sender<CoordinatorState>,
    /// Account-scoped token: stops schedules, entity polls and in-flight
    /// confirmations at teardown.
    cancel: CancellationToken,
    /// Child token for the current schedules; replaced on re-authentication.
    schedule: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    /// Serializes logins so concurrent callers share one attempt loop.
    login_lock: Mutex<()>,
    /// Serializes fleet refreshes; the registry has a single writer.
    refresh_lock: Mutex<()>,
}

impl Coordinator {
    /// Create a coordinator. Does not touch the network; call
    /// [`setup()`](Self::setup) to log in and start the schedules.
    pub fn new(cloud: Arc<dyn CloudApi>, config: CoordinatorConfig) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Idle);
        let cancel = CancellationToken::new();
        let schedule = cancel.child_token();

        Self {
            inner: Arc::new(CoordinatorInner {
                cloud,
                config: RwLock::new(config),
                registry: ArcSwap::from_pointee(EntityRegistry::default()),
                state,
                cancel,
                schedule: Mutex::new(schedule),
                task_handles: Mutex::new(Vec::new()),
                login_lock: Mutex::new(()),
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    fn config(&self) -> CoordinatorConfig {
        self.inner.config.read().expect("config lock poisoned").clone()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run the first fleet refresh and, if it succeeds, start the
    /// fleet-refresh and entity-poll schedules.
    pub async fn setup(&self) -> Result<(), CoreError> {
        info!("setting up account");
        self.fleet_refresh().await?;
        self.start_schedules().await;
        let registry = self.registry();
        info!(
            hubs = registry.hubs().len(),
            locks = registry.locks().len(),
            climates = registry.climates().len(),
            "account ready"
        );
        Ok(())
    }

    /// Swap credentials after an authentication failure and start over.
    pub async fn reauthenticate(&self, credentials: Credentials) -> Result<(), CoreError> {
        info!(email = %credentials.email, "re-authenticating");
        self.stop_schedules().await;
        self.inner
            .config
            .write()
            .expect("config lock poisoned")
            .credentials = credentials;
        self.inner.cloud.logout().await;

        self.fleet_refresh().await?;
        self.start_schedules().await;
        Ok(())
    }

    /// Cancel everything, join the background tasks and drop the session.
    pub async fn teardown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.inner.cloud.logout().await;
        self.inner.state.send_replace(CoordinatorState::ShutDown);
        info!("account torn down");
    }

    async fn start_schedules(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        let schedule = self.inner.cancel.child_token();
        *self.inner.schedule.lock().await = schedule.clone();

        let config = self.config();
        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(fleet_refresh_task(
            self.clone(),
            config.fleet_refresh_interval,
            schedule.clone(),
        )));
        handles.push(tokio::spawn(entity_poll_task(
            self.clone(),
            config.entity_poll_interval,
            schedule,
        )));
        debug!(
            fleet_secs = config.fleet_refresh_interval.as_secs(),
            poll_secs = config.entity_poll_interval.as_secs(),
            "schedules started"
        );
    }

    async fn stop_schedules(&self) {
        self.inner.schedule.lock().await.cancel();
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
    }

    // ── Login ────────────────────────────────────────────────────

    /// Log in unless a session is already held.
    ///
    /// Retries on a fixed delay, bounded overall by `attempts × delay`.
    pub async fn ensure_logged_in(&self) -> Result<(), CoreError> {
        if self.inner.cloud.is_connected() {
            return Ok(());
        }
        let _login = self.inner.login_lock.lock().await;
        if self.inner.cloud.is_connected() {
            return Ok(());
        }

        let config = self.config();
        let budget = config.login.budget();
        match tokio::time::timeout(budget, self.login_loop(&config.credentials, config.login))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(budget_secs = budget.as_secs(), "login budget exhausted");
                Err(CoreError::AuthenticationFailed {
                    message: format!("login did not complete within {}s", budget.as_secs()),
                })
            }
        }
    }

    async fn login_loop(
        &self,
        credentials: &Credentials,
        policy: RetryPolicy,
    ) -> Result<(), CoreError> {
        let mut last_error = String::new();
        for attempt in 1..=policy.attempts {
            match self.inner.cloud.login(credentials).await {
                Ok(true) => {
                    info!(attempt, "logged in");
                    return Ok(());
                }
                Ok(false) => last_error = "login refused".into(),
                Err(e @ rently_api::Error::MissingParameters(_)) => return Err(e.into()),
                Err(e) => last_error = e.to_string(),
            }
            warn!(attempt, max = policy.attempts, error = %last_error, "login attempt failed");
            if attempt < policy.attempts {
                tokio::time::sleep(policy.delay).await;
            }
        }
        Err(CoreError::AuthenticationFailed {
            message: format!(
                "login failed after {} attempts: {last_error}",
                policy.attempts
            ),
        })
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.cloud.is_connected()
    }

    // ── Fleet refresh ────────────────────────────────────────────

    /// Log in if needed, then fetch the hub list. The refresh timeout
    /// covers both, so it sits outside the login budget.
    pub async fn refresh(&self) -> Result<Vec<HubRecord>, CoreError> {
        let timeout = self.config().refresh_timeout;
        let fetch = async {
            self.ensure_logged_in().await?;
            self.inner.cloud.get_hubs().await.map_err(fetch_error)
        };
        let hubs = tokio::time::timeout(timeout, fetch)
            .await
            .map_err(|_| timed_out(timeout))??;
        debug!(count = hubs.len(), "hubs fetched");
        Ok(hubs)
    }

    /// Enumerate every hub's devices and swap in a rebuilt registry.
    pub async fn discover(&self, hubs: Vec<HubRecord>) -> Result<Arc<EntityRegistry>, CoreError> {
        let config = self.config();
        let cloud = &self.inner.cloud;
        let devices = bounded(config.refresh_timeout, async {
            let mut devices = Vec::new();
            for hub in &hubs {
                let found = cloud.get_devices(&hub.id).await?;
                debug!(hub_id = %hub.id, count = found.len(), "devices fetched");
                devices.extend(found);
            }
            Ok::<_, rently_api::Error>(devices)
        })
        .await?;

        let ctx = EntityContext {
            cloud: Arc::clone(cloud),
            cancel: self.inner.cancel.clone(),
            lock_confirm: config.lock_confirm,
            climate_confirm: config.climate_confirm,
            min_setpoint_spread: config.min_setpoint_spread,
        };
        let previous = self.inner.registry.load_full();
        let next = Arc::new(registry::rebuild(&previous, &ctx, hubs, devices));
        self.inner.registry.store(Arc::clone(&next));
        debug!(generation = next.generation(), entities = next.len(), "registry swapped");
        Ok(next)
    }

    /// [`refresh()`](Self::refresh) then [`discover()`](Self::discover),
    /// recording the outcome in [`CoordinatorState`].
    pub async fn fleet_refresh(&self) -> Result<(), CoreError> {
        let _refresh = self.inner.refresh_lock.lock().await;

        let result = match self.refresh().await {
            Ok(hubs) => self.discover(hubs).await.map(|_| ()),
            Err(e) => Err(e),
        };

        let next = match &result {
            Ok(()) => CoordinatorState::Ready,
            Err(e) if e.is_auth_failure() => CoordinatorState::AuthFailed,
            Err(_) => CoordinatorState::UpdateFailed,
        };
        self.set_state(next);
        result
    }

    /// Publish `next` unless the account has already shut down.
    fn set_state(&self, next: CoordinatorState) {
        self.inner.state.send_if_modified(|state| {
            if *state == CoordinatorState::ShutDown || *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
    }

    /// Refresh every entity of the current snapshot concurrently.
    /// Per-entity failures are logged, not returned.
    pub async fn poll_entities(&self) -> Result<(), CoreError> {
        self.ensure_logged_in().await?;
        let pollables = self.registry().pollables();
        let results = join_all(pollables.iter().map(|p| async move {
            let result = p.refresh().await;
            (p, result)
        }))
        .await;

        for (entity, result) in results {
            if let Err(e) = result {
                warn!(
                    entity = %entity.unique_id(),
                    kind = %entity.kind(),
                    error = %e,
                    "entity poll failed"
                );
            }
        }
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────

    /// The current registry snapshot.
    pub fn registry(&self) -> Arc<EntityRegistry> {
        self.inner.registry.load_full()
    }

    /// Hub records from the last successful refresh.
    pub fn hubs(&self) -> Vec<HubRecord> {
        self.registry()
            .hubs()
            .iter()
            .filter_map(|h| h.record())
            .collect()
    }

    pub fn hub_entities(&self) -> Vec<Arc<HubEntity>> {
        self.registry().hubs().to_vec()
    }

    pub fn locks(&self) -> Vec<Arc<LockEntity>> {
        self.registry().locks().to_vec()
    }

    pub fn climates(&self) -> Vec<Arc<ClimateEntity>> {
        self.registry().climates().to_vec()
    }

    pub fn hub(&self, id: &str) -> Option<Arc<HubEntity>> {
        self.registry().hub(id)
    }

    pub fn lock(&self, id: &str) -> Option<Arc<LockEntity>> {
        self.registry().lock(id)
    }

    pub fn climate(&self, id: &str) -> Option<Arc<ClimateEntity>> {
        self.registry().climate(id)
    }

    pub fn device_ids(&self) -> Vec<String> {
        self.registry().device_ids()
    }

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }
}

// ── Credential check ─────────────────────────────────────────────

/// One login attempt for a config flow. Returns the account title.
///
/// Rejected credentials map to `AuthenticationFailed`; anything else
/// (unreachable service, bad responses) to `ConnectionFailed`.
pub async fn validate_credentials(
    cloud: &dyn CloudApi,
    credentials: &Credentials,
) -> Result<String, CoreError> {
    match cloud.login(credentials).await {
        Ok(true) => Ok(credentials.email.clone()),
        Ok(false) => Err(CoreError::AuthenticationFailed {
            message: "invalid email or password".into(),
        }),
        Err(e @ (rently_api::Error::Authentication { .. } | rently_api::Error::MissingParameters(_))) => {
            Err(e.into())
        }
        Err(e) => Err(CoreError::ConnectionFailed {
            reason: e.to_string(),
        }),
    }
}

/// Run a cloud call under the refresh timeout and map its error.
async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, rently_api::Error>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(fetch_error),
        Err(_) => Err(timed_out(timeout)),
    }
}

/// Session expiry stays an auth failure; anything else is recoverable.
fn fetch_error(e: rently_api::Error) -> CoreError {
    if e.is_auth_expired() {
        e.into()
    } else {
        CoreError::UpdateFailed {
            message: format!("Error communicating with API: {e}"),
        }
    }
}

fn timed_out(timeout: Duration) -> CoreError {
    CoreError::UpdateFailed {
        message: format!("refresh timed out after {}s", timeout.as_secs()),
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodic fleet refresh. Stops the schedules on an authentication
/// failure; recoverable failures wait for the next tick.
async fn fleet_refresh_task(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match coordinator.fleet_refresh().await {
                    Ok(()) => debug!("fleet refresh complete"),
                    Err(e) if e.is_auth_failure() => {
                        warn!(error = %e, "authentication failed, suspending scheduled refreshes");
                        cancel.cancel();
                        break;
                    }
                    Err(e) => warn!(error = %e, "fleet refresh failed"),
                }
            }
        }
    }
}

/// Periodic per-entity state poll.
async fn entity_poll_task(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = coordinator.poll_entities().await {
                    warn!(error = %e, "entity poll skipped");
                    if e.is_auth_failure() {
                        coordinator.set_state(CoordinatorState::AuthFailed);
                        cancel.cancel();
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;

    use pretty_assertions::assert_eq;
    use rently_api::{HvacMode, LockMode};
    use tokio::time::Instant;

    use super::*;
    use crate::testing::{LoginBehavior, MockCloud, credentials};

    fn fleet() -> Arc<MockCloud> {
        Arc::new(
            MockCloud::new()
                .with_hub("h1")
                .with_hub("h2")
                .with_lock("h1", "l1", LockMode::Locked)
                .with_lock("h2", "l2", LockMode::Unlocked)
                .with_thermostat("h1", "t1", HvacMode::Cool),
        )
    }

    fn coordinator(cloud: &Arc<MockCloud>) -> Coordinator {
        Coordinator::new(
            Arc::clone(cloud) as Arc<dyn CloudApi>,
            CoordinatorConfig::new(credentials()),
        )
    }

    // ── Login ────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn login_gives_up_after_three_spaced_attempts() {
        let cloud = fleet();
        cloud.set_login(LoginBehavior::Refuse);
        let coordinator = coordinator(&cloud);
        let start = Instant::now();

        let err = coordinator.ensure_logged_in().await.unwrap_err();

        assert!(err.is_auth_failure());
        assert_eq!(cloud.calls.login.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(6));

        // no background retry once the loop has given up
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(cloud.calls.login.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_login_is_cut_off_by_the_budget() {
        let cloud = fleet();
        cloud.set_login(LoginBehavior::Unreachable);
        cloud.set_login_latency(Duration::from_secs(5));
        let coordinator = coordinator(&cloud);
        let start = Instant::now();

        let err = coordinator.ensure_logged_in().await.unwrap_err();

        assert!(err.is_auth_failure());
        assert_eq!(start.elapsed(), Duration::from_secs(9));
        assert_eq!(cloud.calls.login.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn login_skipped_when_session_held() {
        let cloud = Arc::new(MockCloud::new().connected());
        let coordinator = coordinator(&cloud);

        coordinator.ensure_logged_in().await.unwrap();

        assert_eq!(cloud.calls.login.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credentials_fail_without_retry() {
        struct Blank;
        #[async_trait::async_trait]
        impl CloudApi for Blank {
            async fn login(&self, _: &Credentials) -> Result<bool, rently_api::Error> {
                Err(rently_api::Error::MissingParameters("password"))
            }
            fn is_connected(&self) -> bool {
                false
            }
            async fn logout(&self) {}
            async fn get_hubs(&self) -> Result<Vec<HubRecord>, rently_api::Error> {
                Ok(Vec::new())
            }
            async fn get_hub(&self, _: &str) -> Result<Option<HubRecord>, rently_api::Error> {
                Ok(None)
            }
            async fn get_devices(
                &self,
                _: &str,
            ) -> Result<Vec<rently_api::DeviceRecord>, rently_api::Error> {
                Ok(Vec::new())
            }
            async fn get_device(
                &self,
                _: &str,
            ) -> Result<Option<rently_api::DeviceRecord>, rently_api::Error> {
                Ok(None)
            }
            async fn update_device_status(
                &self,
                _: &rently_api::DeviceRecord,
            ) -> Result<(), rently_api::Error> {
                Ok(())
            }
        }

        let coordinator = Coordinator::new(Arc::new(Blank), CoordinatorConfig::new(credentials()));
        let start = Instant::now();

        let err = coordinator.ensure_logged_in().await.unwrap_err();

        assert!(err.is_auth_failure());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    // ── Fleet refresh ────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn setup_discovers_entities() {
        let cloud = fleet();
        let coordinator = coordinator(&cloud);

        coordinator.setup().await.unwrap();

        assert_eq!(coordinator.state(), CoordinatorState::Ready);
        assert!(coordinator.is_logged_in());
        assert_eq!(coordinator.hubs().len(), 2);
        assert_eq!(coordinator.locks().len(), 2);
        assert_eq!(coordinator.climates().len(), 1);
        assert_eq!(
            coordinator.device_ids(),
            vec!["l1".to_owned(), "l2".to_owned(), "t1".to_owned()]
        );
        assert!(coordinator.lock("l1").unwrap().is_locked());
        assert!(coordinator.hub("h2").is_some());
        assert!(coordinator.climate("t1").unwrap().available());

        coordinator.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_setup_spawns_nothing() {
        let cloud = fleet();
        cloud.set_login(LoginBehavior::Refuse);
        let coordinator = coordinator(&cloud);

        let err = coordinator.setup().await.unwrap_err();

        assert!(err.is_auth_failure());
        assert_eq!(coordinator.state(), CoordinatorState::AuthFailed);
        assert!(coordinator.inner.task_handles.lock().await.is_empty());
        assert!(coordinator.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_hub_list_is_update_failed() {
        let cloud = fleet();
        cloud.set_hubs_latency(Duration::from_secs(11));
        let coordinator = coordinator(&cloud);

        let err = coordinator.fleet_refresh().await.unwrap_err();

        assert!(matches!(err, CoreError::UpdateFailed { .. }));
        assert!(err.is_recoverable());
        assert_eq!(coordinator.state(), CoordinatorState::UpdateFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_timeout_covers_login_and_hub_list() {
        let cloud = fleet();
        cloud.set_login_latency(Duration::from_secs(8));
        cloud.set_hubs_latency(Duration::from_secs(8));
        let coordinator = coordinator(&cloud);
        let start = Instant::now();

        let err = coordinator.refresh().await.unwrap_err();

        assert!(matches!(err, CoreError::UpdateFailed { .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(cloud.calls.login.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_session_is_auth_failure() {
        let cloud = fleet();
        cloud.set_fail_hubs_with_auth(true);
        let coordinator = coordinator(&cloud);

        let err = coordinator.fleet_refresh().await.unwrap_err();

        assert!(err.is_auth_failure());
        assert_eq!(coordinator.state(), CoordinatorState::AuthFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn fleet_refresh_keeps_surviving_entities() {
        let cloud = fleet();
        let coordinator = coordinator(&cloud);
        coordinator.fleet_refresh().await.unwrap();
        let before = coordinator.lock("l1").unwrap();

        cloud.remove_device("l2");
        coordinator.fleet_refresh().await.unwrap();

        assert!(Arc::ptr_eq(&before, &coordinator.lock("l1").unwrap()));
        assert!(coordinator.lock("l2").is_none());
        assert_eq!(coordinator.registry().generation(), 2);
    }

    // ── Schedules ────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn schedules_fire_on_their_intervals() {
        let cloud = fleet();
        let coordinator = coordinator(&cloud);
        coordinator.setup().await.unwrap();
        let hubs_after_setup = cloud.calls.get_hubs.load(Ordering::SeqCst);
        let fetches_after_setup = cloud.calls.get_device.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(61)).await;
        // one poll: two locks and one thermostat
        assert_eq!(
            cloud.calls.get_device.load(Ordering::SeqCst) - fetches_after_setup,
            3
        );
        assert_eq!(cloud.calls.get_hubs.load(Ordering::SeqCst), hubs_after_setup);

        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(
            cloud.calls.get_hubs.load(Ordering::SeqCst),
            hubs_after_setup + 1
        );

        coordinator.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_suspends_schedules_until_reauth() {
        let cloud = fleet();
        let coordinator = coordinator(&cloud);
        coordinator.setup().await.unwrap();

        cloud.drop_session();
        cloud.set_login(LoginBehavior::Refuse);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(coordinator.state(), CoordinatorState::AuthFailed);
        let logins = cloud.calls.login.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(2000)).await;
        assert_eq!(cloud.calls.login.load(Ordering::SeqCst), logins);

        cloud.set_login(LoginBehavior::Succeed);
        coordinator.reauthenticate(credentials()).await.unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Ready);

        coordinator.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_stops_everything_and_logs_out() {
        let cloud = fleet();
        let coordinator = coordinator(&cloud);
        coordinator.setup().await.unwrap();
        let mut state = coordinator.subscribe_state();

        coordinator.teardown().await;
        let calls = cloud.calls.total();
        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert_eq!(cloud.calls.total(), calls);
        assert!(!coordinator.is_logged_in());
        assert!(state.has_changed().unwrap());
        assert_eq!(*state.borrow_and_update(), CoordinatorState::ShutDown);
    }

    // ── Credential check ─────────────────────────────────────────

    #[tokio::test]
    async fn validate_credentials_distinguishes_failures() {
        let cloud = MockCloud::new();
        assert_eq!(
            validate_credentials(&cloud, &credentials()).await.unwrap(),
            "owner@example.com"
        );

        cloud.set_login(LoginBehavior::Refuse);
        let err = validate_credentials(&cloud, &credentials()).await.unwrap_err();
        assert!(err.is_auth_failure());

        cloud.set_login(LoginBehavior::Unreachable);
        let err = validate_credentials(&cloud, &credentials()).await.unwrap_err();
        assert!(matches!(err, CoreError::ConnectionFailed { .. }));
    }
}
