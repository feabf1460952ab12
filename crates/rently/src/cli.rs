//! Clap derive structures for the `rently` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use clap::{Args, Parser, Subcommand, ValueEnum};
use rently_api::{FanMode, HvacMode};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// rently -- drive Rently smart locks and thermostats from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "rently",
    version,
    about = "Control Rently smart locks and thermostats from the command line",
    long_about = "Logs in to the Rently cloud, discovers every hub on the account \
        and the locks and thermostats behind them, and sends commands that are \
        confirmed against the cloud before returning.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Account profile to use
    #[arg(long, short = 'p', env = "RENTLY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "RENTLY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "RENTLY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect hubs on the account
    Hubs(HubsArgs),

    /// List and operate smart locks
    #[command(alias = "l")]
    Locks(LocksArgs),

    /// List and operate thermostats
    #[command(alias = "thermostats", alias = "c")]
    Climates(ClimatesArgs),

    /// Run the refresh schedules and print state changes until Ctrl-C
    Watch,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Hubs ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct HubsArgs {
    #[command(subcommand)]
    pub command: HubsCommand,
}

#[derive(Debug, Subcommand)]
pub enum HubsCommand {
    /// List hubs
    #[command(alias = "ls")]
    List,

    /// Show one hub
    Get {
        /// Hub ID
        hub: String,
    },
}

// ── Locks ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LocksArgs {
    #[command(subcommand)]
    pub command: LocksCommand,
}

#[derive(Debug, Subcommand)]
pub enum LocksCommand {
    /// List locks
    #[command(alias = "ls")]
    List,

    /// Show one lock
    Get {
        /// Lock device ID
        lock: String,
    },

    /// Lock and wait for the cloud to confirm
    Lock {
        /// Lock device ID
        lock: String,
    },

    /// Unlock and wait for the cloud to confirm
    Unlock {
        /// Lock device ID
        lock: String,
    },
}

// ── Climates ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ClimatesArgs {
    #[command(subcommand)]
    pub command: ClimatesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ClimatesCommand {
    /// List thermostats
    #[command(alias = "ls")]
    List,

    /// Show one thermostat
    Get {
        /// Thermostat device ID
        climate: String,
    },

    /// Set the HVAC mode (off, heat, cool, auto, on)
    SetMode {
        /// Thermostat device ID
        climate: String,
        mode: HvacMode,
    },

    /// Set the fan mode (auto, on)
    SetFan {
        /// Thermostat device ID
        climate: String,
        mode: FanMode,
    },

    /// Set setpoints in °F
    #[command(
        after_help = "In cool or heat mode a single --temperature is enough; the \
            other setpoint is derived. In auto mode pass --low and/or --high."
    )]
    SetTemp {
        /// Thermostat device ID
        climate: String,

        /// Target temperature for single-setpoint modes
        #[arg(long, short = 't')]
        temperature: Option<f64>,

        /// Heating setpoint
        #[arg(long)]
        low: Option<f64>,

        /// Cooling setpoint
        #[arg(long)]
        high: Option<f64>,
    },

    /// Turn the thermostat on
    On {
        /// Thermostat device ID
        climate: String,
    },

    /// Switch the thermostat off
    Off {
        /// Thermostat device ID
        climate: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup: prompt for credentials, verify them, save a profile
    Init,

    /// Show the resolved configuration (secrets redacted)
    Show,

    /// List profile names
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },

    /// Store a profile's password in the system keyring
    SetPassword {
        /// Profile to update (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
