//! Peer certificate inspection: expiration date and issuer organization.

use crate::resolve::{connect_any, with_port};
use anyhow::{anyhow, Result};
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;
use x509_parser::prelude::{FromDer, X509Certificate};

/// Issuer value used when the certificate carries no organization name.
pub const UNKNOWN_ISSUER: &str = "Unknown";

/// Verifying client config over the platform's trust store. Falls back to
/// the bundled Mozilla roots when the platform yields no usable anchors.
pub fn client_config() -> Result<Arc<ClientConfig>> {
    let root_store = root_store();
    let config = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

fn root_store() -> rustls::RootCertStore {
    let mut roots = rustls::RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for e in &native.errors {
        debug!(error = %e, "skipping unreadable platform certificate source");
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    debug!(added, ignored, "platform trust anchors loaded");
    if roots.is_empty() {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }
    roots
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSummary {
    /// `YYYY-MM-DD`.
    pub expiration: String,
    pub issuer: String,
}

pub fn format_date(dt: OffsetDateTime) -> String {
    format!("{:04}-{:02}-{:02}", dt.year(), u8::from(dt.month()), dt.day())
}

/// Pull notAfter and issuer O out of a DER end-entity certificate.
pub fn summarize_der(der: &[u8]) -> Result<CertificateSummary> {
    let (_, x509) = X509Certificate::from_der(der).map_err(|e| anyhow!("certificate parse failed: {}", e))?;
    let expiration = format_date(x509.validity().not_after.to_datetime());
    let issuer = x509
        .issuer()
        .iter_organization()
        .next()
        .and_then(|o| o.as_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN_ISSUER)
        .to_string();
    Ok(CertificateSummary { expiration, issuer })
}

/// Connect to `port`, complete a verified handshake as `host`, and summarize
/// the leaf certificate. Connect and handshake each get `budget`.
pub async fn inspect_certificate(
    config: Arc<ClientConfig>,
    host: &str,
    addrs: &[SocketAddr],
    port: u16,
    budget: Duration,
) -> Result<CertificateSummary> {
    let server_name = match host.parse::<std::net::IpAddr>() {
        Ok(ip) => ServerName::IpAddress(ip.into()),
        Err(_) => ServerName::try_from(host.to_owned()).map_err(|_| anyhow!("invalid server name"))?,
    };
    let stream = connect_any(&with_port(addrs, port), budget).await?;
    let connector = TlsConnector::from(config);
    let tls = timeout(budget, connector.connect(server_name, stream))
        .await
        .map_err(|_| anyhow!("tls handshake timed out"))??;
    let leaf = tls
        .get_ref()
        .1
        .peer_certificates()
        .and_then(|certs| certs.first())
        .ok_or_else(|| anyhow!("no peer certificate"))?;
    summarize_der(leaf.as_ref())
}
