//! Command dispatch: bridges CLI args -> engine operations -> output formatting.

pub mod config_cmd;
pub mod groups;
pub mod my_ip;
pub mod rules;
pub mod util;

use lavascope_api::VultrClient;
use lavascope_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Dispatch an API-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller<VultrClient>,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Groups(args) => groups::handle(controller, args, global).await,
        Command::Rules(args) => rules::handle(controller, args, resolved, global).await,
        // Handled before a controller is built
        Command::MyIp(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
