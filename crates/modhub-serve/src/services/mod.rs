// ABOUTME: gRPC service implementations for the hub server
// ABOUTME: HubService (module registration, logs, notifications)

pub mod hub;

pub use hub::HubServiceImpl;
