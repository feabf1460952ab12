//! Config subcommand handlers.

use dialoguer::{Input, Select};
use secrecy::SecretString;

use rently_api::{Credentials, RentlyCloud, TransportConfig};
use rently_config::{Config, Profile};
use rently_core::validate_credentials;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;
use crate::session;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        if let Some(ref email) = p.email {
            let _ = writeln!(out, "email = \"{email}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(ref url) = p.api_url {
            let _ = writeln!(out, "api_url = \"{url}\"");
        }
        if let Some(ref url) = p.login_url {
            let _ = writeln!(out, "login_url = \"{url}\"");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(secs) = p.fleet_refresh_secs {
            let _ = writeln!(out, "fleet_refresh_secs = {secs}");
        }
        if let Some(secs) = p.entity_poll_secs {
            let _ = writeln!(out, "entity_poll_secs = {secs}");
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_password() -> Result<String, CliError> {
    let password = rpassword::prompt_password("Password: ").map_err(prompt_err)?;
    if password.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "password cannot be empty".into(),
        });
    }
    Ok(password)
}

/// Offer to store the password in the system keyring.
///
/// Returns `Some(password)` if the user chose plaintext, `None` if stored.
fn prompt_keyring_storage(profile_name: &str, password: &str) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        rently_config::store_password(profile_name, password).map_err(|e| {
            CliError::Validation {
                field: "keyring".into(),
                reason: format!("failed to store password in keyring: {e}"),
            }
        })?;
        eprintln!("   ✓ Password stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password.to_owned()))
    }
}

/// The profile already holding `email`, if any.
fn profile_for_email<'a>(cfg: &'a Config, email: &str) -> Option<&'a str> {
    cfg.profiles
        .iter()
        .find(|(_, p)| {
            p.email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
        })
        .map(|(name, _)| name.as_str())
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global).await,

        ConfigCommand::Show => {
            let cfg = rently_config::load_config_or_default();
            output::print_output(&format_config_redacted(&cfg), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = rently_config::load_config_or_default();
            let active = session::active_profile_name(global, &cfg);
            let mut names: Vec<&String> = cfg.profiles.keys().collect();
            names.sort();
            let lines: Vec<String> = names
                .into_iter()
                .map(|n| {
                    if *n == active {
                        format!("* {n}")
                    } else {
                        format!("  {n}")
                    }
                })
                .collect();
            output::print_output(&lines.join("\n"), global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = rently_config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
                available.sort_unstable();
                return Err(CliError::ProfileNotFound {
                    name,
                    available: available.join(", "),
                });
            }
            cfg.default_profile = Some(name.clone());
            rently_config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let cfg = rently_config::load_config_or_default();
            let name = profile.unwrap_or_else(|| session::active_profile_name(global, &cfg));
            let password = prompt_password()?;
            rently_config::store_password(&name, &password)?;
            if !global.quiet {
                eprintln!("Password for profile '{name}' stored in system keyring");
            }
            Ok(())
        }
    }
}

/// Interactive wizard: prompt, verify with one login, then save.
async fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = rently_config::config_path();
    eprintln!("Rently CLI configuration");
    eprintln!("   Config path: {}\n", config_path.display());

    let mut cfg = rently_config::load_config_or_default();

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let email: String = Input::new()
        .with_prompt("Email")
        .interact_text()
        .map_err(prompt_err)?;
    let email = email.trim().to_owned();
    if email.is_empty() {
        return Err(CliError::Validation {
            field: "email".into(),
            reason: "email cannot be empty".into(),
        });
    }

    // One profile per account; re-running init for the same profile
    // replaces it.
    if let Some(existing) = profile_for_email(&cfg, &email) {
        if existing != profile_name {
            return Err(CliError::Validation {
                field: "email".into(),
                reason: format!("account already configured in profile '{existing}'"),
            });
        }
    }

    let password = prompt_password()?;

    let mut transport = TransportConfig::default();
    if let Some(secs) = global.timeout {
        transport = transport.with_timeout(std::time::Duration::from_secs(secs));
    }
    let cloud = RentlyCloud::production(&transport)?;
    let credentials = Credentials::new(email.clone(), SecretString::from(password.clone()));
    eprintln!("   Verifying credentials...");
    let title = validate_credentials(&cloud, &credentials).await?;
    eprintln!("   ✓ Logged in as {title}");

    let plaintext = prompt_keyring_storage(&profile_name, &password)?;

    cfg.profiles.insert(
        profile_name.clone(),
        Profile {
            email: Some(email),
            password: plaintext,
            ..Profile::default()
        },
    );
    if cfg.profiles.len() == 1 || cfg.default_profile.is_none() {
        cfg.default_profile = Some(profile_name.clone());
    }
    rently_config::save_config(&cfg)?;

    eprintln!("\n   Profile '{profile_name}' saved to {}", config_path.display());
    Ok(())
}
