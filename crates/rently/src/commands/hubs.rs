//! Hub command handlers.

use serde::Serialize;
use tabled::Tabled;

use rently_core::{Coordinator, HubEntity};

use crate::cli::{GlobalOpts, HubsArgs, HubsCommand};
use crate::error::CliError;
use crate::output::{self, or_dash};

/// What the CLI prints for a hub.
#[derive(Debug, Serialize)]
struct HubView {
    id: String,
    unique_id: String,
    home_name: String,
    model: Option<String>,
    firmware_version: Option<String>,
}

impl From<&HubEntity> for HubView {
    fn from(hub: &HubEntity) -> Self {
        let info = hub.device_info();
        Self {
            id: hub.id().to_owned(),
            unique_id: hub.unique_id(),
            home_name: info.name,
            model: info.model,
            firmware_version: info.sw_version,
        }
    }
}

#[derive(Tabled)]
struct HubRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Home")]
    home: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Firmware")]
    firmware: String,
}

impl From<&HubView> for HubRow {
    fn from(h: &HubView) -> Self {
        Self {
            id: h.id.clone(),
            home: h.home_name.clone(),
            model: or_dash(h.model.as_deref()),
            firmware: or_dash(h.firmware_version.as_deref()),
        }
    }
}

fn detail(h: &HubView) -> String {
    [
        format!("ID:        {}", h.id),
        format!("Unique ID: {}", h.unique_id),
        format!("Home:      {}", h.home_name),
        format!("Model:     {}", or_dash(h.model.as_deref())),
        format!("Firmware:  {}", or_dash(h.firmware_version.as_deref())),
    ]
    .join("\n")
}

pub fn handle(coordinator: &Coordinator, args: HubsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        HubsCommand::List => {
            let hubs: Vec<HubView> = coordinator
                .hub_entities()
                .iter()
                .map(|h| HubView::from(h.as_ref()))
                .collect();
            let out = output::render_list(&global.output, &hubs, |h| HubRow::from(h), |h| h.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        HubsCommand::Get { hub } => {
            let entity = coordinator
                .hub(&hub)
                .ok_or_else(|| CliError::not_found("hub", hub))?;
            let view = HubView::from(entity.as_ref());
            let out = output::render_single(&global.output, &view, detail, |h| h.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
