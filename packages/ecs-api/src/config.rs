//! API server configuration.

use std::net::SocketAddr;

/// Configuration for the inspection/control HTTP surface.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address the server binds to.
    pub bind_addr: SocketAddr,
    /// Timeout applied to any single handler before it is treated as failed.
    /// Enforced once, at the router's dispatch point, via `tokio::time::timeout`
    /// wrapping the matched handler's future -- so every route gets it without
    /// each handler having to apply it itself.
    pub response_timeout_ms: u64,
    /// Maximum entity handles a single `/query` response returns, whatever
    /// the match count. Protects against an unbounded live view being
    /// serialized whole over a debug endpoint.
    pub max_query_results: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7777".parse().unwrap(),
            response_timeout_ms: 5000,
            max_query_results: 10_000,
        }
    }
}
