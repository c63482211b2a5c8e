// ABOUTME: Server setup and lifecycle for the hub
// ABOUTME: Runs the gRPC HubService and the HTTP API side by side with graceful shutdown

use std::sync::Arc;

use anyhow::{Context, Result};
use modhub_core::{AggregationService, ManifestStore, ProcessSupervisor};
use modhub_proto::server::HubServiceServer;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{info, warn};

use crate::api::build_router;
use crate::services::HubServiceImpl;
use crate::ServeConfig;

/// Run the hub server until a shutdown signal arrives
pub async fn run(config: ServeConfig) -> Result<()> {
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    run_until(config, shutdown).await
}

/// Run the hub server until `shutdown` is cancelled, then stop every module
pub async fn run_until(config: ServeConfig, shutdown: CancellationToken) -> Result<()> {
    info!("Starting hub server");
    info!("  HTTP address: {}", config.hub.http_addr);
    info!("  gRPC address: {}", config.hub.grpc_addr);
    info!("  Modules: {}", config.modules_dir.display());

    let store = Arc::new(ManifestStore::new());
    if let Err(e) = store.scan(&config.modules_dir) {
        warn!(error = %e, "Initial module scan failed");
    }

    let supervisor = Arc::new(ProcessSupervisor::new(&config.hub));
    let aggregation = Arc::new(AggregationService::new(
        Arc::clone(&store),
        Arc::clone(&supervisor),
        config.modules_dir.clone(),
        config.hub.grpc_addr.clone(),
        config.hub.aggregation.clone(),
    ));

    let grpc_addr = config
        .hub
        .grpc_addr
        .parse()
        .context("parsing gRPC address")?;
    let http_listener = tokio::net::TcpListener::bind(&config.hub.http_addr)
        .await
        .with_context(|| format!("binding HTTP address {}", config.hub.http_addr))?;

    let grpc = {
        let token = shutdown.clone();
        let service = HubServiceImpl::new(Arc::clone(&store));
        async move {
            let result = Server::builder()
                .add_service(HubServiceServer::new(service))
                .serve_with_shutdown(grpc_addr, token.clone().cancelled_owned())
                .await
                .context("running gRPC server");
            // Either server stopping takes the other down with it.
            token.cancel();
            result
        }
    };

    let http = {
        let token = shutdown.clone();
        let app = build_router(aggregation);
        async move {
            let result = axum::serve(http_listener, app)
                .with_graceful_shutdown(token.clone().cancelled_owned())
                .await
                .context("running HTTP server");
            token.cancel();
            result
        }
    };

    info!("Hub listening");
    let (grpc_result, http_result) = tokio::join!(grpc, http);

    info!("Stopping modules");
    supervisor.shutdown().await;
    info!("Server shut down gracefully");

    grpc_result?;
    http_result?;
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
