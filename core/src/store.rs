use crate::{DomainRecord, FieldUpdates, UpdateReport};
use anyhow::Result;

/// Read/write view of a user's stored domain list. Implementations own
/// their write atomicity: one `update_fields` call is applied all-or-nothing.
pub trait DomainStore: Send + Sync {
    fn list_domains(&self, user: &str) -> Result<Vec<DomainRecord>>;

    /// Apply field changes keyed by normalized hostname. Hosts unknown for
    /// `user` are reported as skipped, not as an error.
    fn update_fields(&self, user: &str, updates: &FieldUpdates) -> Result<UpdateReport>;
}
