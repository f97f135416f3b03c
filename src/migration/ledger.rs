//! The table recording applied migrations.
//!
//! Its name and shape are part of every deployed database and must never change.

use crate::connection::Connection;
use crate::error::Result;
use crate::params;

pub const LEDGER_TABLE: &str = "__sqlite_access_migrations";

pub(super) fn ensure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS __sqlite_access_migrations (
           identifier TEXT NOT NULL PRIMARY KEY
         )",
    )
}

fn exists(conn: &Connection) -> Result<bool> {
    let found = conn.fetch_value::<i64>(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
        params![LEDGER_TABLE],
    )?;
    Ok(found.is_some())
}

/// Applied migration names in application order; empty before the first migration ran.
pub(super) fn applied(conn: &Connection) -> Result<Vec<String>> {
    if !exists(conn)? {
        return Ok(Vec::new());
    }
    conn.fetch_values(
        "SELECT identifier FROM __sqlite_access_migrations ORDER BY rowid",
        (),
    )
}

pub(super) fn record(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO __sqlite_access_migrations (identifier) VALUES (?)",
        params![name],
    )?;
    Ok(())
}
