//! Config subcommand handlers.

use secrecy::SecretString;

use lavascope_config::{self as config, Config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::active_profile_name;
use crate::error::CliError;
use crate::output;

use super::util::prompt_err;

const MASK: &str = "********";

/// Copy of the config with plaintext keys replaced by a mask.
fn masked(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.api_key.is_some() {
            profile.api_key = Some(MASK.into());
        }
    }
    cfg
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = masked(&config::load_config()?);
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("{c:#?}\n({e})")),
                |c| c.default_profile.clone().unwrap_or_default(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        // ── SetToken ────────────────────────────────────────────────
        ConfigCommand::SetToken { plaintext } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = active_profile_name(global, &cfg);

            let key = rpassword::prompt_password("Vultr API key: ").map_err(prompt_err)?;
            let key = key.trim().to_owned();
            if key.is_empty() {
                return Err(CliError::Validation {
                    field: "api_key".into(),
                    reason: "API key cannot be empty".into(),
                });
            }

            if plaintext {
                cfg.profiles.entry(profile_name.clone()).or_default().api_key = Some(key);
                let path = config::save_config(&cfg)?;
                if !global.quiet {
                    eprintln!(
                        "✓ API key saved to {} for profile '{profile_name}'",
                        path.display()
                    );
                }
            } else {
                config::store_api_key(&profile_name, &SecretString::from(key))?;
                if !global.quiet {
                    eprintln!("✓ API key stored in system keyring for profile '{profile_name}'");
                }
            }
            Ok(())
        }
    }
}
