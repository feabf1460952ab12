// ── Runtime coordinator configuration ──
//
// These types describe how one account is polled and how commands are
// confirmed. They carry credential data and timing, but never touch disk.
// The CLI builds a `CoordinatorConfig` and hands it in.

use std::time::Duration;

use rently_api::Credentials;

/// Login attempts before the account is declared unauthenticated.
pub const LOGIN_ATTEMPTS: u32 = 3;
/// Fixed delay between login attempts.
pub const LOGIN_RETRY_DELAY: Duration = Duration::from_secs(3);
/// Hard limit on each hub/device enumeration.
pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);
/// Confirmation fetches after a lock command.
pub const LOCK_CONFIRM_ATTEMPTS: u32 = 3;
/// Delay before each lock confirmation fetch.
pub const LOCK_CONFIRM_DELAY: Duration = Duration::from_secs(8);
/// Hubs change rarely; re-enumerate every 15 minutes.
pub const FLEET_REFRESH_INTERVAL: Duration = Duration::from_secs(900);
/// Per-entity state poll.
pub const ENTITY_POLL_INTERVAL: Duration = Duration::from_secs(60);
/// Minimum gap between heating and cooling setpoints, in degrees.
pub const MIN_SETPOINT_SPREAD: i32 = 3;

/// A bounded, fixed-delay retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Total wall-clock budget: `attempts × delay`.
    pub fn budget(&self) -> Duration {
        self.delay * self.attempts
    }
}

/// Configuration for one Rently account.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub credentials: Credentials,
    /// Login retry loop, also bounding the overall login budget.
    pub login: RetryPolicy,
    /// Timeout applied to hub and device enumeration.
    pub refresh_timeout: Duration,
    pub lock_confirm: RetryPolicy,
    pub climate_confirm: RetryPolicy,
    pub fleet_refresh_interval: Duration,
    pub entity_poll_interval: Duration,
    pub min_setpoint_spread: i32,
}

impl CoordinatorConfig {
    /// Production timings for the given account.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            login: RetryPolicy::new(LOGIN_ATTEMPTS, LOGIN_RETRY_DELAY),
            refresh_timeout: REFRESH_TIMEOUT,
            lock_confirm: RetryPolicy::new(LOCK_CONFIRM_ATTEMPTS, LOCK_CONFIRM_DELAY),
            climate_confirm: RetryPolicy::new(LOCK_CONFIRM_ATTEMPTS, LOCK_CONFIRM_DELAY),
            fleet_refresh_interval: FLEET_REFRESH_INTERVAL,
            entity_poll_interval: ENTITY_POLL_INTERVAL,
            min_setpoint_spread: MIN_SETPOINT_SPREAD,
        }
    }
}
