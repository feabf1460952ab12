//! Lock command handlers.

use serde::Serialize;
use tabled::Tabled;

use rently_api::LockMode;
use rently_core::{Coordinator, LockEntity};

use crate::cli::{GlobalOpts, LocksArgs, LocksCommand};
use crate::error::CliError;
use crate::output::{self, or_dash};

/// What the CLI prints for a lock.
#[derive(Debug, Serialize)]
struct LockView {
    id: String,
    unique_id: String,
    name: String,
    mode: LockMode,
    available: bool,
    battery_level: Option<u8>,
    manufacturer: Option<String>,
    model: Option<String>,
}

impl From<&LockEntity> for LockView {
    fn from(lock: &LockEntity) -> Self {
        let state = lock.state();
        let info = lock.device_info();
        Self {
            id: lock.id().to_owned(),
            unique_id: lock.unique_id(),
            name: info.name,
            mode: state.mode,
            available: state.available,
            battery_level: state.battery_level,
            manufacturer: info.manufacturer,
            model: info.model,
        }
    }
}

#[derive(Tabled)]
struct LockRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Model")]
    model: String,
}

fn row(l: &LockView, color: bool) -> LockRow {
    LockRow {
        id: l.id.clone(),
        name: l.name.clone(),
        state: output::paint_lock_mode(l.mode, color),
        battery: l.battery_level.map_or_else(|| "-".into(), |b| format!("{b}%")),
        model: or_dash(l.model.as_deref()),
    }
}

fn detail(l: &LockView) -> String {
    [
        format!("ID:           {}", l.id),
        format!("Unique ID:    {}", l.unique_id),
        format!("Name:         {}", l.name),
        format!("State:        {}", l.mode),
        format!("Available:    {}", l.available),
        format!(
            "Battery:      {}",
            l.battery_level.map_or_else(|| "-".into(), |b| format!("{b}%"))
        ),
        format!("Manufacturer: {}", or_dash(l.manufacturer.as_deref())),
        format!("Model:        {}", or_dash(l.model.as_deref())),
    ]
    .join("\n")
}

fn find(coordinator: &Coordinator, id: String) -> Result<std::sync::Arc<LockEntity>, CliError> {
    coordinator
        .lock(&id)
        .ok_or_else(|| CliError::not_found("lock", id))
}

/// Report where a command left the lock. The command itself never fails
/// on a slow cloud, so a mismatch is only a warning.
fn report(lock: &LockEntity, wanted: &str, landed: fn(LockMode) -> bool, global: &GlobalOpts) {
    let state = lock.state();
    if !landed(state.mode) {
        tracing::warn!(
            lock = %lock.id(),
            wanted,
            reported = %state.mode,
            "cloud has not confirmed the command yet"
        );
    }
    if !global.quiet {
        eprintln!("{} is {}", lock.name(), state.mode);
    }
}

pub async fn handle(
    coordinator: &Coordinator,
    args: LocksArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    match args.command {
        LocksCommand::List => {
            let locks: Vec<LockView> = coordinator
                .locks()
                .iter()
                .map(|l| LockView::from(l.as_ref()))
                .collect();
            let out =
                output::render_list(&global.output, &locks, |l| row(l, color), |l| l.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        LocksCommand::Get { lock } => {
            let entity = find(coordinator, lock)?;
            let view = LockView::from(entity.as_ref());
            let out = output::render_single(&global.output, &view, detail, |l| l.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        LocksCommand::Lock { lock } => {
            let entity = find(coordinator, lock)?;
            entity.lock().await?;
            report(&entity, "locked", |m| m == LockMode::Locked, global);
            Ok(())
        }

        LocksCommand::Unlock { lock } => {
            let entity = find(coordinator, lock)?;
            entity.unlock().await?;
            report(&entity, "unlocked", |m| m != LockMode::Locked, global);
            Ok(())
        }
    }
}
