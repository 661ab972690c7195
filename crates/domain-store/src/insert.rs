use crate::{AddOutcome, BulkAddReport, Db, InvalidEntry, RemoveReport};
use anyhow::Result;
use monitor_core::{clean_host, validate_domain, FieldUpdates, UpdateReport, NOT_AVAILABLE, PENDING};
use rusqlite::{params, OptionalExtension, Transaction};
use std::collections::BTreeSet;
use time::OffsetDateTime;
use tracing::{debug, info};

fn insert_pending(tx: &Transaction<'_>, user: &str, host: &str) -> Result<bool> {
    let n = tx.execute(
        "INSERT INTO domains(user_name,domain,status,ssl_expiration,ssl_issuer,added_at) VALUES (?,?,?,?,?,?)
         ON CONFLICT(user_name,domain) DO NOTHING",
        params![user, host, PENDING, NOT_AVAILABLE, NOT_AVAILABLE, OffsetDateTime::now_utc().unix_timestamp()],
    )?;
    Ok(n > 0)
}

impl Db {
    /// Validate and register a single domain for `user`.
    pub fn add_domain(&self, user: &str, raw: &str) -> Result<AddOutcome> {
        let host = match validate_domain(raw) {
            Ok(h) => h,
            Err(e) => return Ok(AddOutcome::Invalid(e.to_string())),
        };
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let added = insert_pending(&tx, user, &host)?;
        tx.commit()?;
        Ok(if added { AddOutcome::Added } else { AddOutcome::Duplicate })
    }

    /// Register every valid line of an uploaded text file in one transaction.
    pub fn bulk_add(&self, user: &str, text: &str) -> Result<BulkAddReport> {
        let mut report = BulkAddReport::default();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for raw in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            match validate_domain(raw) {
                Ok(host) => {
                    if insert_pending(&tx, user, &host)? {
                        report.added.push(host);
                    } else {
                        report.duplicates.push(host);
                    }
                }
                Err(e) => report.invalid.push(InvalidEntry { input: raw.to_string(), reason: e.to_string() }),
            }
        }
        tx.commit()?;
        info!(
            user,
            added = report.added.len(),
            duplicates = report.duplicates.len(),
            invalid = report.invalid.len(),
            "bulk upload applied"
        );
        Ok(report)
    }

    pub fn remove_domains(&self, user: &str, hosts: &[String]) -> Result<RemoveReport> {
        let targets: BTreeSet<String> = hosts.iter().map(|h| clean_host(h)).filter(|h| !h.is_empty()).collect();
        let mut report = RemoveReport::default();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for host in targets {
            let n = tx.execute("DELETE FROM domains WHERE user_name=? AND domain=?", params![user, host])?;
            if n > 0 { report.removed.push(host); } else { report.not_found.push(host); }
        }
        tx.commit()?;
        Ok(report)
    }

    /// Apply a batch of field changes atomically. A known host is reported
    /// as updated only if at least one stored value actually changed.
    pub fn update_fields(&self, user: &str, updates: &FieldUpdates) -> Result<UpdateReport> {
        let mut report = UpdateReport::default();
        if updates.is_empty() {
            return Ok(report);
        }
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for (key, fields) in updates {
            let host = clean_host(key);
            let row: Option<(i64, String, String, String)> = tx
                .query_row(
                    "SELECT domain_id,status,ssl_expiration,ssl_issuer FROM domains WHERE user_name=? AND domain=?",
                    params![user, host],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
                )
                .optional()?;
            let Some((id, status, expiration, issuer)) = row else {
                report.skipped.push(host);
                continue;
            };
            let new_status = fields.status.as_deref().unwrap_or(&status);
            let new_expiration = fields.ssl_expiration.as_deref().unwrap_or(&expiration);
            let new_issuer = fields.ssl_issuer.as_deref().unwrap_or(&issuer);
            let changed = tx.execute(
                "UPDATE domains SET status=?, ssl_expiration=?, ssl_issuer=?
                 WHERE domain_id=? AND (status<>? OR ssl_expiration<>? OR ssl_issuer<>?)",
                params![new_status, new_expiration, new_issuer, id, new_status, new_expiration, new_issuer],
            )?;
            if changed > 0 {
                report.updated.push(host);
            }
        }
        tx.commit()?;
        debug!(user, updated = report.updated.len(), skipped = report.skipped.len(), "fields updated");
        Ok(report)
    }
}
