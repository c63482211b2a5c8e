// ABOUTME: Re-exports the hub protocol types and generated tonic stubs.
// ABOUTME: Single source of truth for hub <-> module gRPC services and messages.

#![allow(clippy::derive_partial_eq_without_eq)]

/// Protocol version 1 messages and services.
pub mod v1;

// Re-export commonly used types at crate root for convenience
pub use v1::*;

// Re-export client types under a client module
pub mod client {
    pub use super::v1::hub_service_client::HubServiceClient;
    pub use super::v1::module_service_client::ModuleServiceClient;
}

// Re-export server types under a server module
pub mod server {
    pub use super::v1::hub_service_server::{HubService, HubServiceServer};
    pub use super::v1::module_service_server::{ModuleService, ModuleServiceServer};
}
