// ABOUTME: Outbound gRPC plumbing from the hub to module processes.
// ABOUTME: Channel creation with timeouts, error types, and the typed module client.

pub mod channel;
pub mod client;
pub mod error;

pub use channel::{create_channel, ChannelConfig};
pub use client::ModuleClient;
pub use error::RpcError;
