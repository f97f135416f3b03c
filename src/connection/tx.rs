use std::thread;
use std::time::Duration;

use crate::error::{Result, SqliteAccessError};
use crate::tx_outcome::TransactionOutcome;

use super::Connection;

const SQLITE_BUSY: i32 = 5;

const ROLLBACK_BUSY_RETRIES: &[Duration] = &[
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
];

/// Locking behavior of `BEGIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionKind {
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

impl TransactionKind {
    fn begin_sql(self) -> &'static str {
        match self {
            Self::Deferred => "BEGIN DEFERRED",
            Self::Immediate => "BEGIN IMMEDIATE",
            Self::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

/// The boundary one level of nesting opened.
enum Boundary {
    Transaction,
    Savepoint(String),
}

impl Connection {
    /// Whether a transaction is open, whoever opened it.
    #[must_use]
    pub fn is_in_transaction(&self) -> bool {
        !self.raw.is_autocommit()
    }

    /// Nesting depth of the transactions and savepoints opened through this connection.
    #[must_use]
    pub fn transaction_depth(&self) -> usize {
        self.depth
    }

    /// Run `body` in a transaction, ending it as the body asks.
    ///
    /// Outside a transaction this issues `BEGIN`; inside one the body runs in a savepoint and only
    /// the outermost level touches the real transaction boundary. An error from the body rolls
    /// the level back and is returned unchanged.
    ///
    /// ```rust
    /// use sqlite_access::prelude::*;
    ///
    /// # fn main() -> Result<(), SqliteAccessError> {
    /// let mut conn = Connection::open_in_memory(&Configuration::default())?;
    /// conn.execute_batch("CREATE TABLE t (v INTEGER)")?;
    /// conn.in_transaction(TransactionKind::Deferred, |conn| {
    ///     conn.execute("INSERT INTO t VALUES (1)", ())?;
    ///     conn.in_transaction(TransactionKind::Deferred, |conn| {
    ///         conn.execute("INSERT INTO t VALUES (2)", ())?;
    ///         Ok(TransactionOutcome::Rollback)
    ///     })?;
    ///     Ok(TransactionOutcome::Commit)
    /// })?;
    /// let values: Vec<i64> = conn.fetch_values("SELECT v FROM t", ())?;
    /// assert_eq!(values, [1]);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns the body's error, or the engine error raised while beginning or ending the level.
    pub fn in_transaction<F>(&mut self, kind: TransactionKind, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<TransactionOutcome>,
    {
        self.scoped(Some(kind), |conn| body(conn).map(|outcome| ((), outcome)))
    }

    /// Run `body` in a savepoint, even outside a transaction.
    ///
    /// # Errors
    /// Same as [`in_transaction`](Self::in_transaction).
    pub fn in_savepoint<F>(&mut self, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<TransactionOutcome>,
    {
        self.scoped(None, |conn| body(conn).map(|outcome| ((), outcome)))
    }

    /// Run `body` in a deferred transaction, committing on `Ok` and rolling back on `Err`.
    ///
    /// # Errors
    /// Returns the body's error, or the engine error raised while beginning or ending the level.
    pub fn transaction<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.transaction_with(TransactionKind::Deferred, body)
    }

    /// Like [`transaction`](Self::transaction) with an explicit `BEGIN` kind.
    ///
    /// # Errors
    /// Returns the body's error, or the engine error raised while beginning or ending the level.
    pub fn transaction_with<T, F>(&mut self, kind: TransactionKind, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.scoped(Some(kind), |conn| {
            body(conn).map(|value| (value, TransactionOutcome::Commit))
        })
    }

    fn scoped<T, F>(&mut self, kind: Option<TransactionKind>, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<(T, TransactionOutcome)>,
    {
        let boundary = self.open_boundary(kind)?;
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        match result {
            Ok((value, outcome)) => {
                if outcome.is_commit() {
                    self.commit_boundary(&boundary)?;
                } else {
                    self.rollback_boundary(&boundary)?;
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback_boundary(&boundary) {
                    tracing::warn!(
                        error = %rollback_err,
                        "rollback after failed transaction body also failed"
                    );
                }
                Err(err)
            }
        }
    }

    fn open_boundary(&mut self, kind: Option<TransactionKind>) -> Result<Boundary> {
        match kind {
            Some(kind) if !self.is_in_transaction() => {
                self.exec_internal(kind.begin_sql())?;
                tracing::debug!(path = %self.display_path(), ?kind, "transaction started");
                Ok(Boundary::Transaction)
            }
            _ => {
                let name = format!("sqlite_access_sp{}", self.depth + 1);
                self.exec_internal(&format!("SAVEPOINT {name}"))?;
                tracing::debug!(savepoint = %name, "savepoint started");
                Ok(Boundary::Savepoint(name))
            }
        }
    }

    fn commit_boundary(&mut self, boundary: &Boundary) -> Result<()> {
        let sql = match boundary {
            Boundary::Transaction => "COMMIT".to_owned(),
            Boundary::Savepoint(name) => format!("RELEASE SAVEPOINT {name}"),
        };
        if let Err(err) = self.exec_internal(&sql) {
            if let Err(rollback_err) = self.rollback_boundary(boundary) {
                tracing::warn!(error = %rollback_err, "rollback after failed commit also failed");
            }
            return Err(err);
        }
        Ok(())
    }

    fn rollback_boundary(&mut self, boundary: &Boundary) -> Result<()> {
        if !self.is_in_transaction() {
            // The engine already ended the transaction, e.g. after SQLITE_FULL or a failed COMMIT.
            tracing::debug!("transaction already rolled back by the engine");
            return Ok(());
        }
        match boundary {
            Boundary::Transaction => {
                self.rollback_with_busy_retries()?;
                tracing::debug!(path = %self.display_path(), "transaction rolled back");
            }
            Boundary::Savepoint(name) => {
                self.exec_internal(&format!(
                    "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"
                ))?;
                tracing::debug!(savepoint = %name, "savepoint rolled back");
            }
        }
        Ok(())
    }

    /// Roll back whatever transaction is open, retrying briefly while the database is busy.
    pub(crate) fn rollback_with_busy_retries(&self) -> Result<()> {
        for (attempt, delay) in ROLLBACK_BUSY_RETRIES.iter().copied().enumerate() {
            match self.exec_internal("ROLLBACK") {
                Ok(()) => return Ok(()),
                Err(SqliteAccessError::Database(err))
                    if err.code == SQLITE_BUSY && attempt + 1 < ROLLBACK_BUSY_RETRIES.len() =>
                {
                    thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
        Err(SqliteAccessError::ConnectionError(
            "rollback retries exhausted".into(),
        ))
    }
}
