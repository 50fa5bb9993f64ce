// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! NMOS Registry
//!
//! Registration and discovery service for networked media nodes.
//!
//! # Usage
//!
//! ```bash
//! # Start a registry on the default port (3000)
//! nmos-registry
//!
//! # Custom port and config
//! nmos-registry --port 8235 --config registry.json
//!
//! # Generate or check a configuration file
//! nmos-registry gen-config --output registry.json
//! nmos-registry validate --config registry.json
//! ```

use clap::{Parser, Subcommand};
use nmos_registry_server::{RegistryServer, ServerConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// NMOS Registry - node registration, discovery queries and liveness
#[derive(Parser, Debug)]
#[command(name = "nmos-registry")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (JSON format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address (overrides the config file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Reject registrations not newer than the current version
    #[arg(long)]
    ascending: bool,

    /// Heartbeat timeout in seconds (overrides the config file)
    #[arg(long)]
    gc_interval: Option<u64>,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a configuration file with every default filled in
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "registry.json")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(cmd) = args.command {
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;
    let roles = if config.registry.node.is_some() {
        "registration, query, node"
    } else {
        "registration, query"
    };

    info!("+----------------------------------------------------+");
    info!("|           NMOS Registry v{:<25} |", env!("CARGO_PKG_VERSION"));
    info!("+----------------------------------------------------+");
    info!("|  Bind:    {:40} |", format!("{}:{}", config.bind_address, config.port));
    info!("|  APIs:    {:40} |", roles);
    info!("|  Version: {:40} |", config.registry.max_api_version.as_str());
    info!(
        "|  Timeout: {:40} |",
        format!("{}s", config.registry.liveness.gc_interval_secs)
    );
    if let Some(target) = &config.registration {
        info!("|  Upstream:{:40} |", target.base_url);
    }
    info!("+----------------------------------------------------+");

    let server = RegistryServer::new(config)?;

    let server_handle = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received, stopping registry...");
        server_handle.shutdown().await;
    });

    server.run().await?;
    Ok(())
}

fn build_config(args: &Args) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            ServerConfig::from_file(path)?
        }
        None => ServerConfig::default(),
    };

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = &args.bind {
        config.bind_address = bind.parse()?;
    }
    if args.ascending {
        config.registry.store.ascending = true;
    }
    if let Some(secs) = args.gc_interval {
        config.registry.liveness.gc_interval_secs = secs;
    }
    Ok(config)
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    ServerConfig::default().to_file(&output)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = match ServerConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("Configuration invalid: {}", e);
        std::process::exit(1);
    }

    println!("Configuration valid!");
    println!();
    println!("Listen:      {}:{}", config.bind_address, config.port);
    println!("API version: {}", config.registry.max_api_version);
    println!("Timeout:     {}s", config.registry.liveness.gc_interval_secs);
    println!("Paging:      {}", config.registry.store.paging_limit);
    println!(
        "Node API:    {}",
        if config.registry.node.is_some() { "enabled" } else { "disabled" }
    );
    Ok(())
}
