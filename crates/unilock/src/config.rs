//! `GlobalOpts`-aware wrappers over `unilock_config`.
//!
//! Flags win over the profile: `--hub`, `--token`, `--insecure` and
//! `--timeout` each replace the matching profile value.

use secrecy::SecretString;

use unilock_config::{Config, Profile};
use unilock_core::HubConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.active_profile_name().to_owned())
}

/// Build a `HubConfig` from the config file, profile, and CLI overrides.
pub fn build_hub_config(global: &GlobalOpts) -> Result<HubConfig, CliError> {
    let cfg = unilock_config::load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, &cfg, global);
    }

    // An explicitly requested profile must exist unless the hub is given outright.
    if global.profile.is_some() && global.hub.is_none() {
        return Err(CliError::ProfileNotFound {
            name: profile_name,
            available: available_profiles(&cfg),
        });
    }

    let hub = global.hub.clone().ok_or_else(|| CliError::NoConfig {
        path: unilock_config::config_path().display().to_string(),
    })?;
    let flags_only = Profile {
        hub,
        ..Profile::default()
    };
    resolve_profile(&flags_only, &profile_name, &cfg, global)
}

/// Apply flag overrides to a profile and translate it.
fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<HubConfig, CliError> {
    let token = match global.token {
        Some(ref token) => SecretString::from(token.clone()),
        None => unilock_config::resolve_token(profile, profile_name)?,
    };

    let mut effective = profile.clone();
    if let Some(ref hub) = global.hub {
        effective.hub.clone_from(hub);
    }
    if global.insecure {
        effective.insecure = Some(true);
        effective.ca_cert = None;
    }
    if global.timeout.is_some() {
        effective.timeout = global.timeout;
    }

    Ok(unilock_config::profile_to_hub_config(
        &effective,
        &cfg.defaults,
        token,
    )?)
}

/// Comma-separated profile names, for error help text.
pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}
