// ABOUTME: Hub server for modhub: module-facing gRPC plus the dashboard HTTP API
// ABOUTME: Wires the manifest store, process supervisor, and aggregation service together

pub mod api;
pub mod server;
pub mod services;

use anyhow::Result;
use modhub_core::HubConfig;
use std::path::PathBuf;

/// Configuration for the hub server
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub hub: HubConfig,
    /// Resolved modules directory (must exist)
    pub modules_dir: PathBuf,
}

/// Run the hub server until Ctrl+C or SIGTERM
pub async fn run(config: ServeConfig) -> Result<()> {
    server::run(config).await
}
