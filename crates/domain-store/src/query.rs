use crate::Db;
use anyhow::Result;
use monitor_core::DomainRecord;
use rusqlite::params;

impl Db {
    /// All domains registered by `user`, oldest first.
    pub fn list_domains(&self, user: &str) -> Result<Vec<DomainRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT domain,status,ssl_expiration,ssl_issuer FROM domains WHERE user_name=? ORDER BY domain_id",
        )?;
        let rows = stmt.query_map(params![user], |r| {
            Ok(DomainRecord {
                domain: r.get(0)?,
                status: r.get(1)?,
                ssl_expiration: r.get(2)?,
                ssl_issuer: r.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Users owning at least one domain.
    pub fn users(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT user_name FROM domains ORDER BY user_name")?;
        let rows = stmt.query_map([], |r| r.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }
}
