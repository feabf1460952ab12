//! Command dispatch.

pub mod climates;
pub mod config_cmd;
pub mod hubs;
pub mod locks;
pub mod watch;

use clap::CommandFactory;
use rently_core::Coordinator;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;
use crate::session;

/// Top-level entry: local commands run directly, account commands get a
/// coordinator that is torn down however they end.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;
    match command {
        Command::Config(args) => config_cmd::handle(args, &global).await,
        Command::Completions(args) => {
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "rently",
                &mut std::io::stdout(),
            );
            Ok(())
        }
        account => {
            let coordinator = session::connect(&global)?;
            tracing::debug!(command = ?account, "running account command");
            let result = dispatch(account, &coordinator, &global).await;
            coordinator.teardown().await;
            result
        }
    }
}

/// Run one account command. `watch` drives the schedules itself; every
/// other command works from a single fleet refresh.
async fn dispatch(
    cmd: Command,
    coordinator: &Coordinator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Command::Watch = cmd {
        return watch::handle(coordinator, global).await;
    }

    coordinator.fleet_refresh().await?;
    match cmd {
        Command::Hubs(args) => hubs::handle(coordinator, args, global),
        Command::Locks(args) => locks::handle(coordinator, args, global).await,
        Command::Climates(args) => climates::handle(coordinator, args, global).await,
        Command::Watch | Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
