// ABOUTME: gRPC channel creation for short-lived hub-to-module connections.
// ABOUTME: Normalizes host:port manifest addresses into URIs and applies the connect timeout.

use std::time::Duration;
use tonic::transport::{Channel, Endpoint};

use crate::rpc::error::RpcError;

/// Configuration for creating a gRPC channel to a module.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Module address as a URI (e.g., "http://127.0.0.1:19100").
    pub address: String,
    /// Connection timeout.
    pub connect_timeout: Option<Duration>,
}

impl ChannelConfig {
    /// Create a channel config for a manifest address.
    /// Bare `host:port` addresses get an `http://` scheme; modules serve plaintext on loopback.
    pub fn new(address: impl Into<String>) -> Self {
        let addr = address.into().trim().to_string();
        Self {
            address: Self::normalize_address(&addr),
            connect_timeout: Some(Duration::from_secs(3)),
        }
    }

    fn normalize_address(addr: &str) -> String {
        let lower = addr.to_lowercase();
        if addr.is_empty() || lower.starts_with("http://") || lower.starts_with("https://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        }
    }

    /// Set connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

/// Create a gRPC channel with the specified configuration.
pub async fn create_channel(config: &ChannelConfig) -> Result<Channel, RpcError> {
    let mut endpoint = Endpoint::from_shared(config.address.clone())
        .map_err(|e| RpcError::InvalidAddress(e.to_string()))?;

    if let Some(timeout) = config.connect_timeout {
        endpoint = endpoint.connect_timeout(timeout);
    }

    let channel = endpoint
        .connect()
        .await
        .map_err(|e| RpcError::ConnectionFailed(e.to_string()))?;

    tracing::debug!(address = %config.address, "gRPC channel connected");

    Ok(channel)
}
