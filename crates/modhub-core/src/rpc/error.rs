// ABOUTME: Error types for hub-to-module RPC calls.
// ABOUTME: Distinguishes bad addresses, connect failures, failed calls, and timeouts.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to a module.
#[derive(Error, Debug)]
pub enum RpcError {
    /// Invalid module address format.
    #[error("invalid module address: {0}")]
    InvalidAddress(String),

    /// Failed to connect to the module.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The module answered with an error status.
    #[error("rpc failed: {0}")]
    Call(String),

    /// The module did not answer in time.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl From<tonic::Status> for RpcError {
    fn from(status: tonic::Status) -> Self {
        RpcError::Call(status.to_string())
    }
}

impl From<tonic::transport::Error> for RpcError {
    fn from(err: tonic::transport::Error) -> Self {
        RpcError::ConnectionFailed(err.to_string())
    }
}
