//! SQLite-backed storage for users' registered domains and their last
//! observed health.

mod open;
mod models;
mod insert;
mod query;
mod schema;

pub use open::Db;
pub use models::*;

use anyhow::Result;
use monitor_core::{DomainRecord, DomainStore, FieldUpdates, UpdateReport};

impl DomainStore for Db {
    fn list_domains(&self, user: &str) -> Result<Vec<DomainRecord>> {
        Db::list_domains(self, user)
    }

    fn update_fields(&self, user: &str, updates: &FieldUpdates) -> Result<UpdateReport> {
        Db::update_fields(self, user, updates)
    }
}
