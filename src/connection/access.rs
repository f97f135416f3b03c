use crate::access::AccessMode;
use crate::error::{Result, SqliteAccessError};

use super::Connection;

impl Connection {
    /// Run one access scope: enforce the access mode and make sure no transaction outlives it.
    ///
    /// A body that returns `Ok` while leaving a transaction open gets it rolled back and the
    /// call fails with `Misuse`; a failing body keeps its own error.
    pub(crate) fn run_access<T, F>(&mut self, mode: AccessMode, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let entered_in_transaction = self.is_in_transaction();
        if mode == AccessMode::Read {
            self.begin_read_only()?;
        }
        let mut result = body(self);
        if !entered_in_transaction && self.is_in_transaction() {
            self.depth = 0;
            if let Err(err) = self.rollback_with_busy_retries() {
                tracing::warn!(error = %err, "failed to roll back transaction left open by access");
            }
            if result.is_ok() {
                tracing::warn!(path = %self.display_path(), "access ended with an open transaction");
                result = Err(SqliteAccessError::misuse(
                    "access ended with an open transaction; it was rolled back",
                ));
            }
        }
        if mode == AccessMode::Read {
            self.end_read_only();
        }
        result
    }

    /// Put the connection back into a neutral state after a body panicked.
    pub(crate) fn restore_after_panic(&mut self) {
        self.depth = 0;
        if self.is_in_transaction() {
            match self.rollback_with_busy_retries() {
                Ok(()) => tracing::debug!("rolled back transaction of panicked access"),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to roll back transaction of panicked access");
                }
            }
        }
        if self.read_only_access {
            self.end_read_only();
        }
    }

    /// Run `body` in a deferred read transaction pinned to one snapshot.
    ///
    /// The snapshot is acquired eagerly so that every statement of the body sees the same
    /// committed state, even when a writer commits in between.
    pub(crate) fn read_snapshot<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.run_access(AccessMode::Read, |conn| {
            conn.exec_internal("BEGIN DEFERRED")?;
            let result = conn
                .fetch_value::<i64>("SELECT rootpage FROM sqlite_master LIMIT 1", ())
                .and_then(|_| body(conn));
            if conn.is_in_transaction() {
                match &result {
                    Ok(_) => conn.exec_internal("COMMIT")?,
                    Err(_) => {
                        if let Err(err) = conn.rollback_with_busy_retries() {
                            tracing::warn!(error = %err, "failed to end read transaction");
                        }
                    }
                }
            }
            result
        })
    }

    fn begin_read_only(&mut self) -> Result<()> {
        if !self.opened_read_only() {
            self.exec_internal("PRAGMA query_only = 1")?;
        }
        self.read_only_access = true;
        Ok(())
    }

    fn end_read_only(&mut self) {
        self.read_only_access = false;
        if !self.opened_read_only() {
            if let Err(err) = self.exec_internal("PRAGMA query_only = 0") {
                tracing::warn!(error = %err, "failed to leave read-only access");
            }
        }
    }
}
