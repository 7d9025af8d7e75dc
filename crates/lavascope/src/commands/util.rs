//! Shared helpers for command handlers.

use std::io::IsTerminal;

use lavascope_api::VultrClient;
use lavascope_core::{Controller, GroupKey};

use crate::error::CliError;

/// Refresh the group list and resolve `id` to a known group.
pub async fn require_group(
    controller: &Controller<VultrClient>,
    id: &str,
) -> Result<GroupKey, CliError> {
    controller.refresh_groups().await?;
    let key = GroupKey::from(id);
    if controller.snapshot().group(&key).is_none() {
        return Err(CliError::NotFound {
            resource_type: "group".into(),
            identifier: id.into(),
            list_command: "groups list".into(),
        });
    }
    Ok(key)
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// `YYYY-MM-DD HH:MM` in UTC.
pub fn short_date(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}
