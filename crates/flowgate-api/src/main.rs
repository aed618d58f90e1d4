//! flowgate CLI entry point.
//!
//! Binary name: `flowgate`
//!
//! Parses CLI arguments, initializes tracing and configuration, then
//! dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use flowgate_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let tracing_options = TracingOptions {
        json: cli.log_json,
        otel: cli.otel,
        filter: Some(TracingOptions::verbosity_filter(cli.quiet, cli.verbose).to_string()),
    };
    if let Err(e) = init_tracing(&tracing_options) {
        eprintln!("Warning: failed to initialize tracing: {e}");
    }

    // Shell completions don't need configuration
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "flowgate", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(cli.config.as_deref()).await?;

    let outcome = match cli.command {
        Commands::Validate {
            document,
            schema,
            details,
        } => {
            cli::validate::validate(
                &state,
                &document,
                schema.as_deref(),
                details,
                cli.json,
                cli.quiet,
            )
            .await
        }
        Commands::Layout { document } => cli::layout::layout(&state, &document, cli.json).await,
        Commands::Run(args) => cli::run::run(&state, args, cli.json, cli.quiet).await,
        Commands::Classify { kind, label } => {
            cli::classify::classify(&state, &kind, &label, cli.json)
        }
        Commands::Fingerprint { document } => {
            cli::fingerprint::fingerprint(&state, &document, cli.json).await
        }
        Commands::Completions { .. } => Ok(()),
    };

    shutdown_tracing();
    outcome
}
