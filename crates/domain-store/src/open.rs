use crate::schema::MIG_0001_INIT;
use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

enum Backing {
    /// One connection per operation; SQLite (WAL + busy timeout) arbitrates writers.
    File(PathBuf),
    /// A private in-memory database only exists on its one connection.
    Memory(Mutex<Connection>),
}

pub struct Db {
    backing: Backing,
}

/// A connection borrowed for the duration of one store operation.
pub(crate) enum Conn<'a> {
    Owned(Connection),
    Shared(MutexGuard<'a, Connection>),
}

impl Deref for Conn<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Conn::Owned(c) => c,
            Conn::Shared(g) => g,
        }
    }
}

impl DerefMut for Conn<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        match self {
            Conn::Owned(c) => c,
            Conn::Shared(g) => g,
        }
    }
}

impl Db {
    pub fn open_or_create(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_file(&path)?;
        migrate(&conn)?;
        Ok(Db { backing: Backing::File(path) })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrate(&conn)?;
        Ok(Db { backing: Backing::Memory(Mutex::new(conn)) })
    }

    pub(crate) fn conn(&self) -> Result<Conn<'_>> {
        match &self.backing {
            Backing::File(path) => Ok(Conn::Owned(open_file(path)?)),
            Backing::Memory(m) => m
                .lock()
                .map(Conn::Shared)
                .map_err(|_| anyhow!("domain store connection poisoned")),
        }
    }
}

fn open_file(path: &std::path::Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    apply_pragmas(&conn)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

fn migrate(conn: &Connection) -> Result<()> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name='domains'",
        [],
        |r| r.get(0),
    )?;
    if exists == 0 {
        conn.execute_batch(MIG_0001_INIT)?;
    }
    Ok(())
}
