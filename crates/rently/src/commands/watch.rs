//! `rently watch`: host loop over the coordinator's schedules.
//!
//! Runs setup, then prints a line whenever an entity's observable state
//! changes until Ctrl-C. An authentication failure suspends the
//! schedules; the loop reloads credentials from the profile once and
//! gives up if they are rejected again.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use rently_core::{Coordinator, CoordinatorState};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output::{self, or_dash};
use crate::session;

/// How often the entity watch channels are sampled for printing.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

pub async fn handle(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    coordinator.setup().await?;

    let color = output::should_color(&global.color);
    let mut seen: HashMap<String, String> = HashMap::new();
    let mut state_rx = coordinator.subscribe_state();
    let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                return Ok(());
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = *state_rx.borrow_and_update();
                info!(?state, "account state changed");
                if state == CoordinatorState::AuthFailed {
                    reauthenticate(coordinator, global).await?;
                }
            }
            _ = ticker.tick() => {
                print_changes(coordinator, &mut seen, color, global.quiet);
            }
        }
    }
}

async fn reauthenticate(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    warn!("credentials rejected, reloading profile");
    let credentials = session::reload_credentials(global)?;
    coordinator.reauthenticate(credentials).await?;
    Ok(())
}

/// Current one-line summary of every entity, keyed by unique ID.
fn snapshot(coordinator: &Coordinator, color: bool) -> Vec<(String, String, String)> {
    let mut lines = Vec::new();
    for lock in coordinator.locks() {
        let state = lock.state();
        let battery = state
            .battery_level
            .map_or_else(String::new, |b| format!(" battery {b}%"));
        lines.push((
            lock.unique_id(),
            lock.name(),
            format!("{}{battery}", output::paint_lock_mode(state.mode, color)),
        ));
    }
    for climate in coordinator.climates() {
        let state = climate.state();
        let unit = climate.temperature_unit();
        let line = if state.available {
            format!(
                "{} fan {} room {} heat {} cool {}",
                or_dash(state.hvac_mode),
                or_dash(state.fan_mode),
                or_dash(state.current_temperature.map(|t| format!("{t}{unit}"))),
                or_dash(state.target_temperature_low.map(|t| format!("{t}{unit}"))),
                or_dash(state.target_temperature_high.map(|t| format!("{t}{unit}"))),
            )
        } else {
            "unavailable".into()
        };
        lines.push((climate.unique_id(), climate.name(), line));
    }
    lines
}

fn print_changes(
    coordinator: &Coordinator,
    seen: &mut HashMap<String, String>,
    color: bool,
    quiet: bool,
) {
    let current = snapshot(coordinator, color);

    let mut gone: Vec<String> = seen
        .keys()
        .filter(|id| !current.iter().any(|(cid, _, _)| cid == *id))
        .cloned()
        .collect();
    gone.sort();
    for id in gone {
        seen.remove(&id);
        output::print_output(&format!("{id}: removed"), quiet);
    }

    for (id, name, line) in current {
        if seen.get(&id) != Some(&line) {
            output::print_output(&format!("{name} ({id}): {line}"), quiet);
            seen.insert(id, line);
        }
    }
}
