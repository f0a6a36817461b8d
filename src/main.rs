//! PDP - Main Entry Point
//!
//! Command-line front end for partial dependence and ICE curves.

use clap::Parser;
use pdp::cli::{cmd_estimate, cmd_grid, cmd_partial, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdp=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Partial {
            run,
            model,
            output,
            interaction,
        } => {
            cmd_partial(&run, &model, output.as_deref(), interaction)?;
        }
        Commands::Estimate { run, model } => {
            cmd_estimate(&run, model.as_deref())?;
        }
        Commands::Grid { run, output } => {
            cmd_grid(&run, output.as_deref())?;
        }
    }

    Ok(())
}
