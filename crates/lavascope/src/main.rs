mod cli;
mod commands;
mod config;
mod error;
mod notify;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GroupsArgs, GroupsCommand};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need the API
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "lavascope", &mut std::io::stdout());
            Ok(())
        }

        // Public-IP lookup needs the profile, not an API key
        Command::MyIp(args) => {
            let resolved = config::resolve(&cli.global)?;
            commands::my_ip::handle(args, &resolved, &cli.global).await
        }

        cmd => {
            let resolved = config::resolve(&cli.global)?;
            let long_running = matches!(
                cmd,
                Command::Groups(GroupsArgs {
                    command: GroupsCommand::List { watch: true }
                })
            );
            let controller =
                config::build_controller(&resolved, &cli.global, long_running).await?;

            tracing::debug!(command = ?cmd, profile = %resolved.profile_name, "dispatching command");
            let result = commands::dispatch(cmd, &controller, &resolved, &cli.global).await;
            controller.shutdown().await;
            result
        }
    }
}
