//! Single-host health probe: fast resolution, HTTP(S) liveness, and
//! conditional TLS certificate inspection, each step under its own timeout.

pub mod liveness;
pub mod resolve;
pub mod tls;

use anyhow::Result;
use async_trait::async_trait;
use liveness::LivenessChecker;
use monitor_core::{HostProbe, ProbeError, ProbeResult, ProbeStatus};
use reqwest::Client;
use rustls::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub resolve_timeout: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Budget for the raw TCP check on the TLS port when liveness failed.
    pub port_check_timeout: Duration,
    /// Budget for each of connect and handshake during certificate inspection.
    pub tls_timeout: Duration,
    pub user_agent: String,
    pub pool_max_idle_per_host: usize,
    /// Extra GETs allowed on 429/500/502/503/504.
    pub retries: u32,
    pub https_port: u16,
    pub http_port: u16,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            resolve_timeout: Duration::from_millis(1500),
            connect_timeout: Duration::from_millis(1500),
            read_timeout: Duration::from_millis(2000),
            port_check_timeout: Duration::from_millis(1000),
            tls_timeout: Duration::from_millis(3000),
            user_agent: "DomainChecker/1.1".to_string(),
            pool_max_idle_per_host: 64,
            retries: 1,
            https_port: 443,
            http_port: 80,
        }
    }
}

/// Stateless prober. Cheap to share behind an `Arc`; the HTTP client inside
/// pools connections across every host it probes.
pub struct Probe {
    cfg: ProbeConfig,
    liveness: LivenessChecker,
    tls: Arc<ClientConfig>,
}

impl Probe {
    pub fn new(cfg: ProbeConfig) -> Result<Self> {
        let client = liveness::build_client(&cfg)?;
        Self::with_client(cfg, client)
    }

    /// Use a caller-owned client for the liveness step.
    pub fn with_client(cfg: ProbeConfig, client: Client) -> Result<Self> {
        Ok(Probe {
            liveness: LivenessChecker::new(client, &cfg),
            tls: tls::client_config()?,
            cfg,
        })
    }

    /// Resolve, then check liveness, then (if warranted) read the certificate.
    /// Step failures become `Down` or `"N/A"`; nothing here returns an error.
    pub async fn probe_host(&self, host: &str) -> ProbeResult {
        let Some(addrs) = resolve::resolve_fast(host, self.cfg.resolve_timeout).await else {
            return ProbeResult::down();
        };

        let status = self.liveness.check(host).await;

        let inspect = status == ProbeStatus::Live
            || resolve::is_port_open(&addrs, self.cfg.https_port, self.cfg.port_check_timeout).await;
        if !inspect {
            return ProbeResult::without_certificate(status);
        }

        match tls::inspect_certificate(self.tls.clone(), host, &addrs, self.cfg.https_port, self.cfg.tls_timeout).await {
            Ok(cert) => ProbeResult { status, ssl_expiration: cert.expiration, ssl_issuer: cert.issuer },
            Err(e) => {
                debug!(host, error = %e, "certificate inspection failed");
                ProbeResult::without_certificate(status)
            }
        }
    }
}

#[async_trait]
impl HostProbe for Probe {
    async fn probe(&self, host: &str) -> Result<ProbeResult, ProbeError> {
        Ok(self.probe_host(host).await)
    }
}
