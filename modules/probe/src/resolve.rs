use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tracing::debug;

/// Resolve `host` within `budget`. `None` on failure, timeout, or an empty answer.
pub async fn resolve_fast(host: &str, budget: Duration) -> Option<Vec<SocketAddr>> {
    match timeout(budget, lookup_host((host, 80u16))).await {
        Ok(Ok(addrs)) => {
            let addrs: Vec<SocketAddr> = addrs.collect();
            if addrs.is_empty() { None } else { Some(addrs) }
        }
        Ok(Err(e)) => {
            debug!(host, error = %e, "resolution failed");
            None
        }
        Err(_) => {
            debug!(host, "resolution timed out");
            None
        }
    }
}

/// Same addresses, different port.
pub fn with_port(addrs: &[SocketAddr], port: u16) -> Vec<SocketAddr> {
    addrs.iter().map(|a| SocketAddr::new(a.ip(), port)).collect()
}

/// Connect to the first reachable address within `per_attempt`.
pub async fn connect_any(addrs: &[SocketAddr], per_attempt: Duration) -> std::io::Result<TcpStream> {
    match timeout(per_attempt, TcpStream::connect(addrs)).await {
        Ok(r) => r,
        Err(_) => Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out")),
    }
}

/// TCP-level reachability of `port` on any of the resolved addresses.
pub async fn is_port_open(addrs: &[SocketAddr], port: u16, per_attempt: Duration) -> bool {
    connect_any(&with_port(addrs, port), per_attempt).await.is_ok()
}
