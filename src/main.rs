//! mcpbench - load-testing host for MCP servers
//!
#![doc = "mcpbench - load-testing host for MCP servers"]
#![doc = "Main entry point for the mcpbench application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mcpbench::cli::{Cli, Commands};
use mcpbench::commands;
use mcpbench::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("mcpbench.yaml");
    let mut config = Config::load(config_path, &cli)?;

    // Execute command
    match cli.command {
        Commands::Probe {
            call_tool,
            tool_args,
            ..
        } => {
            config.validate()?;
            tracing::info!("Probing MCP server over {}", config.transport);
            if let Some(name) = &call_tool {
                tracing::debug!("Will call tool: {}", name);
            }
            commands::probe::run_probe(config, call_tool, tool_args).await?;
            Ok(())
        }
        Commands::Run {
            scenario,
            vus,
            iterations,
            ..
        } => {
            if let Some(path) = &scenario {
                commands::run::apply_scenario_file(&mut config, path, vus, iterations)?;
            }
            config.validate()?;
            tracing::info!(
                "Starting load run: {} VUs, {} iterations",
                config.scenario.vus,
                config.scenario.iterations
            );
            commands::run::run_scenario(config).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "mcpbench=debug"
    } else {
        "mcpbench=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
