use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder stored when a certificate field could not be obtained.
pub const NOT_AVAILABLE: &str = "N/A";
/// Status a freshly registered domain carries until its first scan.
pub const PENDING: &str = "Pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeStatus {
    Live,
    Down,
}

impl ProbeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeStatus::Live => "Live",
            ProbeStatus::Down => "Down",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing one hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    /// `YYYY-MM-DD` or `"N/A"`.
    pub ssl_expiration: String,
    /// Issuer organization, `"Unknown"`, or `"N/A"`.
    pub ssl_issuer: String,
}

impl ProbeResult {
    pub fn down() -> Self {
        ProbeResult::without_certificate(ProbeStatus::Down)
    }

    pub fn without_certificate(status: ProbeStatus) -> Self {
        ProbeResult {
            status,
            ssl_expiration: NOT_AVAILABLE.to_string(),
            ssl_issuer: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Returned to whoever triggered a scan; never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub domains_scanned: usize,
    pub errors: usize,
}

/// One stored row for a user's domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub domain: String,
    pub status: String,
    pub ssl_expiration: String,
    pub ssl_issuer: String,
}

impl DomainRecord {
    pub fn pending(domain: impl Into<String>) -> Self {
        DomainRecord {
            domain: domain.into(),
            status: PENDING.to_string(),
            ssl_expiration: NOT_AVAILABLE.to_string(),
            ssl_issuer: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Partial field changes for a single stored domain. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_expiration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_issuer: Option<String>,
}

impl From<ProbeResult> for FieldUpdate {
    fn from(r: ProbeResult) -> Self {
        FieldUpdate {
            status: Some(r.status.as_str().to_string()),
            ssl_expiration: Some(r.ssl_expiration),
            ssl_issuer: Some(r.ssl_issuer),
        }
    }
}

/// Hostname -> field changes, as handed to [`crate::DomainStore::update_fields`].
pub type FieldUpdates = BTreeMap<String, FieldUpdate>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub updated: Vec<String>,
    pub skipped: Vec<String>,
}
