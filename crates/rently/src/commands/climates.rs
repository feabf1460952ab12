//! Thermostat command handlers.

use serde::Serialize;
use tabled::Tabled;

use rently_api::{FanMode, HvacMode};
use rently_core::{ClimateEntity, Coordinator, TemperatureRequest};

use crate::cli::{ClimatesArgs, ClimatesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output::{self, or_dash};

/// What the CLI prints for a thermostat.
#[derive(Debug, Serialize)]
struct ClimateView {
    id: String,
    unique_id: String,
    name: String,
    available: bool,
    hvac_mode: Option<HvacMode>,
    fan_mode: Option<FanMode>,
    current_temperature: Option<f64>,
    target_temperature_low: Option<i32>,
    target_temperature_high: Option<i32>,
    temperature_unit: &'static str,
    hvac_modes: Vec<HvacMode>,
    fan_modes: Vec<FanMode>,
}

impl From<&ClimateEntity> for ClimateView {
    fn from(climate: &ClimateEntity) -> Self {
        let state = climate.state();
        Self {
            id: climate.id().to_owned(),
            unique_id: climate.unique_id(),
            name: climate.name(),
            available: state.available,
            hvac_mode: state.hvac_mode,
            fan_mode: state.fan_mode,
            current_temperature: state.current_temperature,
            target_temperature_low: state.target_temperature_low,
            target_temperature_high: state.target_temperature_high,
            temperature_unit: climate.temperature_unit(),
            hvac_modes: state.hvac_modes,
            fan_modes: state.fan_modes,
        }
    }
}

#[derive(Tabled)]
struct ClimateRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Fan")]
    fan: String,
    #[tabled(rename = "Room")]
    room: String,
    #[tabled(rename = "Heat to")]
    low: String,
    #[tabled(rename = "Cool to")]
    high: String,
}

fn degrees<T: std::fmt::Display>(value: Option<T>, unit: &str) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v}{unit}"))
}

impl From<&ClimateView> for ClimateRow {
    fn from(c: &ClimateView) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            mode: or_dash(c.hvac_mode),
            fan: or_dash(c.fan_mode),
            room: degrees(c.current_temperature, c.temperature_unit),
            low: degrees(c.target_temperature_low, c.temperature_unit),
            high: degrees(c.target_temperature_high, c.temperature_unit),
        }
    }
}

fn join_modes<T: std::fmt::Display>(modes: &[T]) -> String {
    if modes.is_empty() {
        return "-".into();
    }
    modes.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn detail(c: &ClimateView) -> String {
    let unit = c.temperature_unit;
    [
        format!("ID:          {}", c.id),
        format!("Unique ID:   {}", c.unique_id),
        format!("Name:        {}", c.name),
        format!("Available:   {}", c.available),
        format!("Mode:        {}", or_dash(c.hvac_mode)),
        format!("Fan:         {}", or_dash(c.fan_mode)),
        format!("Room:        {}", degrees(c.current_temperature, unit)),
        format!("Heat to:     {}", degrees(c.target_temperature_low, unit)),
        format!("Cool to:     {}", degrees(c.target_temperature_high, unit)),
        format!("HVAC modes:  {}", join_modes(&c.hvac_modes)),
        format!("Fan modes:   {}", join_modes(&c.fan_modes)),
    ]
    .join("\n")
}

fn find(
    coordinator: &Coordinator,
    id: String,
) -> Result<std::sync::Arc<ClimateEntity>, CliError> {
    coordinator
        .climate(&id)
        .ok_or_else(|| CliError::not_found("climate", id))
}

/// Print the state a setter left behind.
fn report(climate: &ClimateEntity, global: &GlobalOpts) {
    if global.quiet {
        return;
    }
    let view = ClimateView::from(climate);
    let out = output::render_single(&global.output, &view, detail, |c| c.id.clone());
    output::print_output(&out, false);
}

pub async fn handle(
    coordinator: &Coordinator,
    args: ClimatesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ClimatesCommand::List => {
            let climates: Vec<ClimateView> = coordinator
                .climates()
                .iter()
                .map(|c| ClimateView::from(c.as_ref()))
                .collect();
            let out = output::render_list(&global.output, &climates, |c| ClimateRow::from(c), |c| {
                c.id.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ClimatesCommand::Get { climate } => {
            let entity = find(coordinator, climate)?;
            report(&entity, global);
            Ok(())
        }

        ClimatesCommand::SetMode { climate, mode } => {
            let entity = find(coordinator, climate)?;
            entity.set_hvac_mode(mode).await?;
            report(&entity, global);
            Ok(())
        }

        ClimatesCommand::SetFan { climate, mode } => {
            let entity = find(coordinator, climate)?;
            entity.set_fan_mode(mode).await?;
            report(&entity, global);
            Ok(())
        }

        ClimatesCommand::SetTemp {
            climate,
            temperature,
            low,
            high,
        } => {
            let entity = find(coordinator, climate)?;
            entity
                .set_temperature(TemperatureRequest {
                    temperature,
                    target_low: low,
                    target_high: high,
                })
                .await?;
            report(&entity, global);
            Ok(())
        }

        ClimatesCommand::On { climate } => {
            let entity = find(coordinator, climate)?;
            entity.turn_on().await?;
            report(&entity, global);
            Ok(())
        }

        ClimatesCommand::Off { climate } => {
            let entity = find(coordinator, climate)?;
            entity.turn_off().await?;
            report(&entity, global);
            Ok(())
        }
    }
}
