use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use creditd::cli::{Cli, Commands, ServeArgs};
use creditd::drift::{run_drift_command, run_reports_command};
use creditd::logging::init_logging;
use creditd::server::{AppState, run_server};
use creditd::workspace::CreditWorkspace;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format)?;

    let exit_code = match &cli.command {
        Commands::Serve(args) => {
            serve(&CreditWorkspace::load(&cli.workspace)?, args)?;
            0
        }
        Commands::Drift(args) => {
            run_drift_command(&cli.workspace, args, &mut std::io::stdout())?
        }
        Commands::Reports(args) => {
            let workspace = CreditWorkspace::load(&cli.workspace)?;
            run_reports_command(&workspace, args, &mut std::io::stdout())?
        }
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

fn serve(workspace: &CreditWorkspace, args: &ServeArgs) -> Result<()> {
    let store = workspace.open_store().with_context(|| {
        format!(
            "failed to open prediction store under {}",
            workspace.root().display()
        )
    })?;
    let config = workspace.config();
    let host = args.host.as_deref().unwrap_or(config.server.host.as_str());
    let port = args.port.unwrap_or(config.server.port);
    let state = Arc::new(AppState::from_config(store, config));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run_server(state, host, port))
}
