// ABOUTME: HubService gRPC implementation for calls coming from modules.
// ABOUTME: Records registrations and forwards module logs and notifications to tracing.

use std::collections::HashMap;
use std::sync::Arc;

use modhub_core::platform::{arch_key, platform_key};
use modhub_core::ManifestStore;
use modhub_proto::server::HubService;
use modhub_proto::{
    Empty, LogLevel, LogRequest, LogResponse, NotifyRequest, NotifyResponse, RegisterRequest,
    RegisterResponse, SystemInfoResponse,
};
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, warn};

/// Identifier the hub reports back to registering modules.
pub const HUB_ID: &str = "hub";

/// HubService implementation
pub struct HubServiceImpl {
    store: Arc<ManifestStore>,
}

impl HubServiceImpl {
    pub fn new(store: Arc<ManifestStore>) -> Self {
        Self { store }
    }
}

#[tonic::async_trait]
impl HubService for HubServiceImpl {
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        let req = request.into_inner();
        if req.module_id.is_empty() {
            return Err(Status::invalid_argument("module_id is required"));
        }

        self.store.register(&req.module_id, &req.version, req.pid);
        info!(module = %req.module_id, version = %req.version, pid = req.pid, "Module registered");

        let config = HashMap::from([
            ("logging".to_string(), "true".to_string()),
            ("notifications".to_string(), "true".to_string()),
        ]);
        Ok(Response::new(RegisterResponse {
            success: true,
            hub_id: HUB_ID.to_string(),
            config,
        }))
    }

    async fn notify(
        &self,
        request: Request<NotifyRequest>,
    ) -> Result<Response<NotifyResponse>, Status> {
        let req = request.into_inner();
        info!(target: "module", title = %req.title, "{}", req.message);
        Ok(Response::new(NotifyResponse { delivered: true }))
    }

    async fn log(&self, request: Request<LogRequest>) -> Result<Response<LogResponse>, Status> {
        let req = request.into_inner();
        match req.level() {
            LogLevel::Debug => debug!(target: "module", "{}", req.message),
            LogLevel::Warn => warn!(target: "module", "{}", req.message),
            LogLevel::Error => error!(target: "module", "{}", req.message),
            LogLevel::Info | LogLevel::Unspecified => info!(target: "module", "{}", req.message),
        }
        Ok(Response::new(LogResponse { logged: true }))
    }

    async fn get_system_info(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<SystemInfoResponse>, Status> {
        Ok(Response::new(SystemInfoResponse {
            os: platform_key().to_string(),
            arch: arch_key().to_string(),
        }))
    }
}
