// ABOUTME: Typed client for the ModuleService every module exposes.
// ABOUTME: Fetches widgets and module info and issues actions such as disconnect.

use std::time::Duration;

use modhub_proto::client::ModuleServiceClient;
use modhub_proto::{Empty, ExecuteRequest, ExecuteResponse, ModuleInfo, Widget};
use tonic::transport::Channel;

use crate::rpc::channel::{create_channel, ChannelConfig};
use crate::rpc::error::RpcError;

/// Action asking a module to drop its connections before it is stopped.
pub const DISCONNECT_ACTION: &str = "disconnect";

/// Connection to one module's gRPC server.
pub struct ModuleClient {
    inner: ModuleServiceClient<Channel>,
}

impl ModuleClient {
    /// Connect to a module at its manifest address (`host:port`).
    pub async fn connect(address: &str, connect_timeout: Duration) -> Result<Self, RpcError> {
        if address.trim().is_empty() {
            return Err(RpcError::InvalidAddress(
                "grpc_addr is not set in manifest".to_string(),
            ));
        }
        let config = ChannelConfig::new(address).with_connect_timeout(connect_timeout);
        let channel = create_channel(&config).await?;
        Ok(Self {
            inner: ModuleServiceClient::new(channel),
        })
    }

    pub async fn widgets(&mut self) -> Result<Vec<Widget>, RpcError> {
        let response = self.inner.get_widgets(Empty {}).await?;
        Ok(response.into_inner().widgets)
    }

    pub async fn info(&mut self) -> Result<ModuleInfo, RpcError> {
        let response = self.inner.get_info(Empty {}).await?;
        Ok(response.into_inner())
    }

    pub async fn execute(&mut self, action_id: &str) -> Result<ExecuteResponse, RpcError> {
        let request = ExecuteRequest {
            action_id: action_id.to_string(),
            params: Default::default(),
        };
        let response = self.inner.execute(request).await?;
        Ok(response.into_inner())
    }
}

/// Best-effort request for a module to disconnect, bounded by `timeout` overall.
pub async fn request_disconnect(address: &str, timeout: Duration) -> Result<(), RpcError> {
    let call = async {
        let mut client = ModuleClient::connect(address, timeout).await?;
        let response = client.execute(DISCONNECT_ACTION).await?;
        if !response.success && !response.error.is_empty() {
            return Err(RpcError::Call(response.error));
        }
        Ok(())
    };

    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| RpcError::Timeout(timeout))?
}
