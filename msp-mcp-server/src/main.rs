//! MSP MCP Server
//!
//! Serves Model Context Protocol over stdio for the vendor profiles in the
//! configuration file.

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use msp_mcp_server::logging::init_logging;
use msp_mcp_server::MspMcpServer;
use msp_mcp_shared::{config::env_prefix, MspConfig};

const DEFAULT_CONFIG: &str = "config.json";

#[derive(Parser, Debug)]
#[command(name = "msp-mcp-server", version, about)]
struct Cli {
    /// Path to the JSON configuration file
    config: Option<PathBuf>,

    /// Write a starter configuration and exit
    #[arg(long, value_name = "PATH", num_args = 0..=1, default_missing_value = DEFAULT_CONFIG)]
    init: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(init_path) = &cli.init {
        // `msp-mcp-server my.json --init` writes to my.json
        let target = match &cli.config {
            Some(config) if init_path == Path::new(DEFAULT_CONFIG) => config.clone(),
            _ => init_path.clone(),
        };
        return init_config(&target);
    }

    let Some(config_path) = cli.config else {
        eprintln!("Error: no configuration file given.");
        eprintln!("Run `msp-mcp-server --init` to create a default configuration.");
        std::process::exit(1);
    };

    let mut config = match MspConfig::load_or_default(Some(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Error loading configuration '{}': {}",
                config_path.display(),
                e
            );
            eprintln!("Run `msp-mcp-server --init` to create a default configuration.");
            std::process::exit(1);
        }
    };

    config.apply_env_overrides();

    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    init_logging(&config.logging)?;
    info!("Starting MSP MCP Server");
    info!(
        "Configuration loaded from {} ({} vendors)",
        config_path.display(),
        config.vendors.len()
    );

    let server = MspMcpServer::new(config)?;

    match server.run().await {
        Ok(()) => {
            info!("MSP MCP Server shut down gracefully");
            Ok(())
        }
        Err(e) => {
            error!("MSP MCP Server error: {}", e);
            Err(e)
        }
    }
}

fn init_config(config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() {
        eprintln!(
            "Configuration file '{}' already exists.",
            config_path.display()
        );
        eprintln!("Remove it first if you want to create a new one.");
        std::process::exit(1);
    }

    let config = MspConfig::example();
    if let Err(e) = config.save(config_path) {
        eprintln!("Failed to create configuration file: {}", e);
        std::process::exit(1);
    }

    println!(
        "Configuration file '{}' created successfully!",
        config_path.display()
    );
    println!();
    println!("Vendor profiles:");
    for (name, vendor) in &config.vendors {
        let prefix = env_prefix(name);
        println!(
            "  {} ({}): set {}_CLIENT_ID and {}_CLIENT_SECRET",
            name, vendor.display_name, prefix, prefix
        );
    }
    println!();
    println!("Credentials may also be placed in a .env file next to the server.");
    println!("To start the MCP server:");
    println!("  msp-mcp-server {}", config_path.display());
    Ok(())
}
