use crate::ProbeResult;
use async_trait::async_trait;
use thiserror::Error;

/// A failure that escaped a probe's own handling. Ordinary unreachable hosts
/// are not errors; they come back as `Down`.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe pool closed")]
    PoolClosed,
    #[error("{0}")]
    Other(String),
}

/// Determines liveness and certificate metadata for a single hostname.
#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn probe(&self, host: &str) -> Result<ProbeResult, ProbeError>;
}
