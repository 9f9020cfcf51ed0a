//! toolweave CLI entry point.
//!
//! Binary name: `twv`
//!
//! Parses CLI arguments, initializes tracing, then dispatches to the command
//! handlers. Only commands that touch the registry open the data directory.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;
use toolweave_observe::tracing_setup::{default_filter, init_tracing, shutdown_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(default_filter(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = dispatch(cli).await;
    shutdown_tracing();

    match result {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(err) => Err(err),
    }
}

/// Run the selected command. `Ok(false)` means "completed, exit non-zero".
async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        // Shell completions don't need app state
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(shell, &mut cmd, "twv", &mut std::io::stdout());
            Ok(true)
        }

        Commands::Semver { action } => cli::semver::handle_semver_command(action, cli.json),

        Commands::Tools { action } => {
            let state = AppState::init().await?;
            cli::tools::handle_tools_command(action, &state, cli.json).await?;
            Ok(true)
        }

        Commands::Workflow { action } => {
            let state = if action.needs_state() {
                Some(AppState::init().await?)
            } else {
                None
            };
            cli::workflow::handle_workflow_command(action, state.as_ref(), cli.json).await?;
            Ok(true)
        }
    }
}
