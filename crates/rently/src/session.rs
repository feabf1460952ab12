//! Turn the active profile into a running `Coordinator`.

use std::sync::Arc;
use std::time::Duration;

use rently_api::{Credentials, RentlyCloud};
use rently_config::{Config, Profile};
use rently_core::Coordinator;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// `--profile`, else the config's default, else `"default"`.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Look up the active profile.
///
/// With no config file at all, an empty profile is used so that
/// `RENTLY_EMAIL` / `RENTLY_PASSWORD` alone are enough.
fn active_profile(global: &GlobalOpts, cfg: &Config) -> Result<(String, Profile), CliError> {
    let name = active_profile_name(global, cfg);
    if let Some(profile) = cfg.profiles.get(&name) {
        return Ok((name, profile.clone()));
    }

    if cfg.profiles.is_empty() {
        if std::env::var("RENTLY_EMAIL").is_ok() {
            return Ok((name, Profile::default()));
        }
        return Err(CliError::NoConfig {
            path: rently_config::config_path().display().to_string(),
        });
    }

    let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    available.sort_unstable();
    Err(CliError::ProfileNotFound {
        name,
        available: available.join(", "),
    })
}

/// Build a coordinator for the active profile. Touches no network.
pub fn connect(global: &GlobalOpts) -> Result<Coordinator, CliError> {
    let cfg = rently_config::load_config_or_default();
    let (name, profile) = active_profile(global, &cfg)?;

    let mut endpoints = rently_config::profile_endpoints(&profile, &cfg.defaults)?;
    if let Some(secs) = global.timeout {
        endpoints.transport = endpoints.transport.with_timeout(Duration::from_secs(secs));
    }
    let config = rently_config::profile_to_coordinator_config(&profile, &name)?;

    tracing::debug!(
        profile = %name,
        api_url = %endpoints.api_url,
        login_url = %endpoints.login_url,
        "building cloud client"
    );
    let cloud = RentlyCloud::new(endpoints.api_url, endpoints.login_url, &endpoints.transport)?;
    Ok(Coordinator::new(Arc::new(cloud), config))
}

/// Re-read the active profile's credentials (env, keyring, file).
pub fn reload_credentials(global: &GlobalOpts) -> Result<Credentials, CliError> {
    let cfg = rently_config::load_config_or_default();
    let (name, profile) = active_profile(global, &cfg)?;
    Ok(rently_config::resolve_credentials(&profile, &name)?)
}
