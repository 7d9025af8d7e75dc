//! Flag-aware configuration resolution.
//!
//! `lavascope-config` resolves profiles and credentials; this module layers
//! the global CLI flags on top and builds the engine.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use lavascope_api::VultrClient;
use lavascope_config::{Config, Profile};
use lavascope_core::{Controller, ControllerConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::notify::CliNotifier;
use crate::output;

/// Everything a command needs to know about the active account.
#[derive(Debug)]
pub struct Resolved {
    pub profile_name: String,
    pub profile: Profile,
    pub controller: ControllerConfig,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref()).to_owned()
}

/// Load the config file and apply flag overrides (flag > env > profile).
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = lavascope_config::load_config()?;
    let profile_name = active_profile_name(global, &cfg);
    let profile = cfg.profile_or_default(&profile_name);

    let mut controller =
        lavascope_config::profile_to_controller_config(&profile, &profile_name, &cfg.defaults)?;

    if let Some(ref raw) = global.api_url {
        controller.base_url = raw.parse().map_err(|_| CliError::Validation {
            field: "api-url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
    }
    if let Some(ref key) = global.api_key {
        controller.api_key = Some(SecretString::from(key.clone()));
    }
    if let Some(ms) = global.timeout {
        controller.timeout = Duration::from_millis(ms);
    }
    if let Some(ref raw) = global.proxy {
        controller.proxy = Some(raw.parse().map_err(|_| CliError::Validation {
            field: "proxy".into(),
            reason: format!("invalid URL: {raw}"),
        })?);
    }

    Ok(Resolved {
        profile_name,
        profile,
        controller,
    })
}

/// Build a controller for an API-bound command. Requires an API key.
///
/// Only long-running commands keep the profile's background refresh;
/// one-shot commands run with it disabled.
pub async fn build_controller(
    resolved: &Resolved,
    global: &GlobalOpts,
    long_running: bool,
) -> Result<Controller<VultrClient>, CliError> {
    if resolved.controller.api_key.is_none() {
        return Err(CliError::NoCredentials {
            profile: resolved.profile_name.clone(),
        });
    }

    let mut config = resolved.controller.clone();
    if !long_running {
        config.refresh_interval = Duration::ZERO;
    }

    let notifier = CliNotifier::new(global.quiet, output::should_color(global.color));
    Ok(Controller::new(&config, Arc::new(notifier)).await?)
}
