// ABOUTME: TCP readiness probe for freshly launched modules.
// ABOUTME: Polls the module's gRPC address until it accepts a connection or the deadline passes.

use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Strip a URI scheme so manifest addresses like `http://127.0.0.1:1` can be dialled.
pub fn socket_addr(address: &str) -> &str {
    let trimmed = address.trim();
    trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed)
        .trim_end_matches('/')
}

/// Returns true once `address` accepts a TCP connection, false after `deadline`.
pub async fn wait_for_tcp(
    address: &str,
    deadline: Duration,
    poll: Duration,
    connect_timeout: Duration,
) -> bool {
    let addr = socket_addr(address);
    let give_up = Instant::now() + deadline;

    loop {
        if let Ok(Ok(stream)) = tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await
        {
            drop(stream);
            return true;
        }
        if Instant::now() + poll > give_up {
            return false;
        }
        tokio::time::sleep(poll).await;
    }
}
