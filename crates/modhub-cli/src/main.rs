// ABOUTME: modhub binary: parses flags, loads config, and dispatches subcommands.
// ABOUTME: `serve` (default) runs the hub; `scan` prints discovered manifests as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modhub_core::config::resolve_modules_dir;
use modhub_core::{HubConfig, ManifestStore};
use modhub_serve::ServeConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "modhub")]
#[command(about = "Local hub that discovers, supervises, and aggregates modules")]
#[command(version)]
struct Cli {
    /// Path to hub.toml (defaults to the platform config dir)
    #[arg(long, global = true, env = "MODHUB_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, global = true, env = "MODHUB_PORT")]
    port: Option<u16>,

    /// gRPC port modules connect back to
    #[arg(long, global = true, env = "MODHUB_GRPC_PORT")]
    grpc_port: Option<u16>,

    /// Directory holding one subdirectory per module
    #[arg(long, global = true, env = "MODHUB_MODULES_DIR")]
    modules_dir: Option<PathBuf>,

    /// Log to <config_dir>/modhub/modhub.log instead of stderr
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the hub server (default)
    Serve,

    /// Scan the modules directory and print the manifests
    Scan,
}

/// Replace the port of a `host:port` address, keeping the host.
fn with_port(addr: &str, port: u16) -> String {
    let host = addr
        .rsplit_once(':')
        .map(|(host, _)| host)
        .filter(|host| !host.is_empty())
        .unwrap_or("127.0.0.1");
    format!("{host}:{port}")
}

fn load_config(cli: &Cli) -> Result<HubConfig> {
    let mut config = match cli.config.clone().or_else(HubConfig::default_path) {
        Some(path) if cli.config.is_some() || path.exists() => HubConfig::load(&path)?,
        _ => HubConfig::default(),
    };

    if let Some(port) = cli.port {
        config.http_addr = with_port(&config.http_addr, port);
    }
    if let Some(port) = cli.grpc_port {
        config.grpc_addr = with_port(&config.grpc_addr, port);
    }
    if let Some(dir) = &cli.modules_dir {
        config.modules_dir = Some(dir.clone());
    }
    Ok(config)
}

fn modules_dir(config: &HubConfig) -> Result<PathBuf> {
    let dir = resolve_modules_dir(config.modules_dir.as_deref())?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create modules dir {}", dir.display()))?;
    Ok(dir)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if cli.log_file {
        modhub_log::init_file("modhub");
    } else {
        modhub_log::init_for(&["modhub", "module"]);
    }

    let config = load_config(&cli)?;
    let modules_dir = modules_dir(&config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            modhub_serve::run(ServeConfig {
                hub: config,
                modules_dir,
            })
            .await
        }
        Commands::Scan => {
            let store = ManifestStore::new();
            store.scan(&modules_dir)?;
            println!("{}", serde_json::to_string_pretty(&store.list())?);
            Ok(())
        }
    }
}
