//! InnerWorld operator CLI entry point.
//!
//! Binary name: `innerworld`
//!
//! Parses CLI arguments, initializes tracing, wires the stores and lifecycle
//! services, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use tokio_util::sync::CancellationToken;

use innerworld_observe::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::{AppState, Backend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,innerworld=debug",
        _ => "trace",
    };
    let mut options = TracingOptions::new(filter);
    options.json = cli.log_json;
    options.otel = cli.otel;
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "innerworld", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(cli.ephemeral).await?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let outcome = match &state.backend {
        Backend::Sqlite(services) => {
            cli::run(&state, services, cli.command, cli.json, &cancel).await
        }
        Backend::Memory(services) => {
            cli::run(&state, services, cli.command, cli.json, &cancel).await
        }
    };

    shutdown_tracing();
    outcome
}
