//! Heart Rate Bridge CLI
//!
//! Runs the bridge server and offers a few pairing-code helpers.

use anyhow::Context;
use clap::{Parser, Subcommand};
use heart_rate_bridge::{
    config::Config,
    pairing,
    server::{self, ServerConfig},
    VERSION,
};
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "heart-rate-bridge")]
#[command(version = VERSION)]
#[command(about = "Live heart-rate relay for dashboards and AI agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API and MCP endpoint
    Serve {
        /// Address to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config and $PORT)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Generate pairing codes
    Pair {
        /// How many codes to print
        #[arg(long, short, default_value = "1")]
        count: usize,
    },

    /// Check whether a pairing code is well formed
    Check {
        /// The pairing code, e.g. tiger07
        code: String,
    },

    /// Show configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(host, port),
        Commands::Pair { count } => {
            cmd_pair(count);
            Ok(())
        }
        Commands::Check { code } => {
            cmd_check(&code);
            Ok(())
        }
        Commands::Config => cmd_config(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("heart_rate_bridge=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Config file plus environment overrides.
fn effective_config(path: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load_from(path).context("Failed to load configuration")?;
    config
        .apply_env()
        .context("Failed to apply environment overrides")?;
    Ok(config)
}

fn cmd_serve(host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    init_tracing();

    let mut config = effective_config(&Config::config_path())?;
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    tracing::info!("Heart Rate Bridge v{VERSION}");

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async {
        let server = server::run(ServerConfig::from(&config)).await?;

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;

        tracing::info!("Shutting down...");
        server.shutdown().await;
        Ok::<(), anyhow::Error>(())
    })
}

fn cmd_pair(count: usize) {
    for _ in 0..count {
        println!("{}", pairing::generate());
    }
}

fn cmd_check(code: &str) {
    if pairing::is_valid(code) {
        println!("{code}: valid");
    } else {
        println!("{code}: invalid (expected an animal followed by two digits, e.g. tiger07)");
        println!();
        println!("Known animals: {}", pairing::ANIMALS.join(", "));
        std::process::exit(1);
    }
}

fn cmd_config() -> anyhow::Result<()> {
    let path = Config::config_path();
    let config = effective_config(&path)?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", path);
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("Failed to render configuration")?
    );
    Ok(())
}
