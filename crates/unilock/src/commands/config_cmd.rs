//! Config subcommand handlers.

use unilock_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output;

const MASK: &str = "********";

// ── Helpers ─────────────────────────────────────────────────────────

/// Map an interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Token from `--token`/`UNILOCK_TOKEN`, else an interactive prompt.
fn read_token(global: &GlobalOpts) -> Result<String, CliError> {
    let token = match global.token {
        Some(ref token) => token.clone(),
        None => rpassword::prompt_password("API token: ").map_err(prompt_err)?,
    };
    if token.trim().is_empty() {
        return Err(CliError::Validation {
            field: "token".into(),
            reason: "token cannot be empty".into(),
        });
    }
    Ok(token)
}

/// Copy of the config safe to print.
fn masked(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(MASK.into());
        }
    }
    cfg
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(
                &unilock_config::config_path().display().to_string(),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = masked(&unilock_config::load_config()?);
            let out = match global.output {
                OutputFormat::Table => toml::to_string_pretty(&cfg).map_err(|e| {
                    CliError::Validation {
                        field: "config".into(),
                        reason: format!("failed to serialize config: {e}"),
                    }
                })?,
                OutputFormat::Json => output::render_json(&cfg, false)?,
                OutputFormat::JsonCompact => output::render_json(&cfg, true)?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init {
            token_env,
            plaintext,
        } => {
            let hub = global.hub.clone().ok_or_else(|| CliError::Validation {
                field: "hub".into(),
                reason: "pass the hub URL with --hub".into(),
            })?;
            unilock_config::parse_hub_url(&hub)?;

            let mut cfg = unilock_config::load_config()?;
            let profile_name = config::active_profile_name(global, &cfg);

            let mut profile = Profile {
                hub,
                token_env,
                insecure: global.insecure.then_some(true),
                timeout: global.timeout,
                ..Profile::default()
            };

            if profile.token_env.is_none() {
                let token = read_token(global)?;
                if plaintext {
                    profile.token = Some(token);
                } else {
                    unilock_config::store_token(&profile_name, &token)?;
                    if !global.quiet {
                        eprintln!("   ✓ Token stored in system keyring");
                    }
                }
            }

            cfg.profiles.insert(profile_name.clone(), profile);
            if cfg.profiles.len() == 1 || global.profile.is_none() {
                cfg.default_profile = Some(profile_name.clone());
            }
            unilock_config::save_config(&cfg)?;

            if !global.quiet {
                eprintln!(
                    "✓ Profile '{profile_name}' written to {}",
                    unilock_config::config_path().display()
                );
                eprintln!("  Test it: unilock devices");
            }
            Ok(())
        }

        ConfigCommand::SetToken { profile } => {
            let cfg = unilock_config::load_config()?;
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));

            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    name: profile_name,
                    available: config::available_profiles(&cfg),
                });
            }

            let token = read_token(global)?;
            unilock_config::store_token(&profile_name, &token)?;
            if !global.quiet {
                eprintln!("✓ Token stored in system keyring for profile '{profile_name}'");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_plaintext_tokens() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                hub: "https://hub".into(),
                token: Some("secret".into()),
                ..Profile::default()
            },
        );
        let shown = masked(&cfg);
        assert_eq!(shown.profiles["home"].token.as_deref(), Some(MASK));
        assert_eq!(cfg.profiles["home"].token.as_deref(), Some("secret"));
    }
}
