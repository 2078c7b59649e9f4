#![warn(clippy::all)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use promptgate::config::Config;
use promptgate::gateway;
use promptgate::providers;

#[derive(Parser)]
#[command(name = "promptgate", version, about = "Smart routing gateway for text-generation providers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Interface to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Path to the TOML configuration file
        #[arg(long, default_value = "promptgate.toml")]
        config: PathBuf,
    },

    /// Validate a configuration file and print the resolved provider chain
    CheckConfig {
        #[arg(long, default_value = "promptgate.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port, config } => {
            let config = Config::load(&config)
                .with_context(|| format!("Configuration rejected: {}", config.display()))?;
            gateway::run_gateway(&host, port, config).await
        }
        Commands::CheckConfig { config: path } => {
            let config = Config::load(&path)
                .with_context(|| format!("Configuration rejected: {}", path.display()))?;
            let chain = providers::build_providers(&config)?;

            println!("✅ {} is valid", path.display());
            println!("Provider chain (priority order):");
            let mut chain: Vec<_> = chain.iter().collect();
            chain.sort_by_key(|p| p.priority());
            for provider in chain {
                let limit = config.router.limit_for(provider.name());
                println!(
                    "  {:>2}. {} (cost/token: {}, request limit: {})",
                    provider.priority(),
                    provider.name(),
                    provider.cost_per_token(),
                    limit.map_or(0, |l| l.request_limit),
                );
            }
            println!(
                "Journal: {}",
                if config.journal.enabled {
                    format!("enabled at {}", config.journal.file_path.display())
                } else {
                    "disabled".to_string()
                }
            );
            Ok(())
        }
    }
}
