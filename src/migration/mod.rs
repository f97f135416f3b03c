//! Ordered, run-once schema migrations tracked inside the migrated database.
//!
//! Each registered migration is applied at most once, in registration order, inside its own
//! transaction that also records it in the ledger table. A failing migration is rolled back and
//! stops the run; migrations committed before it stay applied, and the next run resumes with it.
//!
//! Shipped migrations must never be renamed, reordered or removed: the ledger only stores names,
//! and nothing verifies that a migration's body is the one that originally ran.

mod ledger;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::access::{DatabaseReader, DatabaseWriter};
use crate::connection::{Connection, TransactionKind};
use crate::error::{DatabaseError, Result, SQLITE_CONSTRAINT_FOREIGNKEY, SqliteAccessError};

pub use ledger::LEDGER_TABLE;

type MigrationBody = Arc<dyn Fn(&mut Connection) -> Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForeignKeyChecks {
    /// Enforced statement by statement, as configured.
    Immediate,
    /// Disabled while the body runs, then verified once before commit.
    Deferred,
}

#[derive(Clone)]
struct Migration {
    name: String,
    foreign_keys: ForeignKeyChecks,
    body: MigrationBody,
}

/// What one run did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MigrationReport {
    /// Applied by this run, in order.
    pub applied: Vec<String>,
    /// Found in the ledger and left alone.
    pub skipped: Vec<String>,
}

/// Registry of named migrations.
///
/// ```rust
/// use sqlite_access::prelude::*;
///
/// # fn main() -> Result<(), SqliteAccessError> {
/// let mut migrator = Migrator::new();
/// migrator
///     .register("create player", |db| {
///         db.execute_batch("CREATE TABLE player (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
///     })?
///     .register("add score", |db| {
///         db.execute_batch("ALTER TABLE player ADD COLUMN score INTEGER NOT NULL DEFAULT 0")
///     })?;
///
/// let queue = DatabaseQueue::in_memory(Configuration::default())?;
/// let report = migrator.migrate(&queue)?;
/// assert_eq!(report.applied, ["create player", "add score"]);
/// assert!(migrator.migrate(&queue)?.applied.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Migrator {
    migrations: Vec<Migration>,
}

impl Migrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a migration.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError::Misuse`] if a migration with the same name is registered.
    pub fn register<F>(&mut self, name: impl Into<String>, body: F) -> Result<&mut Self>
    where
        F: Fn(&mut Connection) -> Result<()> + Send + Sync + 'static,
    {
        self.push(name.into(), ForeignKeyChecks::Immediate, Arc::new(body))
    }

    /// Append a migration that runs with foreign keys disabled.
    ///
    /// Foreign keys are checked with `PRAGMA foreign_key_check` before the migration commits, so
    /// tables can be rebuilt in any order as long as the end state is consistent.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError::Misuse`] if a migration with the same name is registered.
    pub fn register_with_deferred_foreign_keys<F>(
        &mut self,
        name: impl Into<String>,
        body: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&mut Connection) -> Result<()> + Send + Sync + 'static,
    {
        self.push(name.into(), ForeignKeyChecks::Deferred, Arc::new(body))
    }

    fn push(
        &mut self,
        name: String,
        foreign_keys: ForeignKeyChecks,
        body: MigrationBody,
    ) -> Result<&mut Self> {
        if self.contains(&name) {
            return Err(SqliteAccessError::misuse(format!(
                "migration {name} is already registered"
            )));
        }
        self.migrations.push(Migration {
            name,
            foreign_keys,
            body,
        });
        Ok(self)
    }

    /// Registered names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.migrations.iter().map(|m| m.name.as_str())
    }

    fn contains(&self, name: &str) -> bool {
        self.migrations.iter().any(|m| m.name == name)
    }

    /// Apply every pending migration through the writer.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError::Migration`] wrapping the first failure, or
    /// [`SqliteAccessError::MigrationHistoryMismatch`] if the database knows migrations this
    /// migrator does not.
    pub fn migrate<W: DatabaseWriter>(&self, writer: &W) -> Result<MigrationReport> {
        let migrator = self.clone();
        writer.write_without_transaction(move |conn| migrator.run(conn, None))
    }

    /// Apply pending migrations up to and including `target`.
    ///
    /// # Errors
    /// Same as [`migrate`](Self::migrate), plus [`SqliteAccessError::Misuse`] when `target` is
    /// not registered or the database is already migrated past it.
    pub fn migrate_up_to<W: DatabaseWriter>(
        &self,
        writer: &W,
        target: &str,
    ) -> Result<MigrationReport> {
        self.target_index(target)?;
        let migrator = self.clone();
        let target = target.to_owned();
        writer.write_without_transaction(move |conn| migrator.run(conn, Some(&target)))
    }

    /// Apply pending migrations on a connection the caller already holds for writing.
    ///
    /// # Errors
    /// Same as [`migrate_up_to`](Self::migrate_up_to), plus [`SqliteAccessError::Misuse`] when
    /// called inside a transaction.
    pub fn run(&self, conn: &mut Connection, target: Option<&str>) -> Result<MigrationReport> {
        if conn.is_in_transaction() {
            return Err(SqliteAccessError::misuse(
                "migrations cannot run inside a transaction",
            ));
        }
        let end = match target {
            Some(target) => self.target_index(target)? + 1,
            None => self.migrations.len(),
        };

        ledger::ensure(conn)?;
        let applied = ledger::applied(conn)?;
        self.check_history(&applied, end)?;
        let applied: HashSet<&str> = applied.iter().map(String::as_str).collect();

        let mut report = MigrationReport::default();
        for migration in &self.migrations[..end] {
            if applied.contains(migration.name.as_str()) {
                debug!(migration = %migration.name, "migration already applied, skipping");
                report.skipped.push(migration.name.clone());
                continue;
            }

            info!(migration = %migration.name, "applying migration");
            if let Err(err) = apply(conn, migration) {
                error!(migration = %migration.name, error = %err, "migration failed");
                return Err(SqliteAccessError::Migration {
                    name: migration.name.clone(),
                    source: Box::new(err),
                });
            }
            report.applied.push(migration.name.clone());
        }

        if !report.applied.is_empty() {
            info!(applied = report.applied.len(), "migrations complete");
        }
        Ok(report)
    }

    /// Names recorded in the database's ledger, in application order.
    ///
    /// # Errors
    /// Returns engine errors raised while reading the ledger.
    pub fn applied_migrations<R: DatabaseReader>(&self, reader: &R) -> Result<Vec<String>> {
        reader.read(|conn| ledger::applied(conn))
    }

    /// Registered migrations not yet recorded in the ledger, in order.
    ///
    /// # Errors
    /// Returns engine errors raised while reading the ledger.
    pub fn pending_migrations<R: DatabaseReader>(&self, reader: &R) -> Result<Vec<String>> {
        let applied = self.applied_migrations(reader)?;
        Ok(self
            .names()
            .filter(|name| !applied.iter().any(|done| done == name))
            .map(str::to_owned)
            .collect())
    }

    /// Whether every registered migration is applied.
    ///
    /// # Errors
    /// Returns engine errors raised while reading the ledger.
    pub fn has_completed_migrations<R: DatabaseReader>(&self, reader: &R) -> Result<bool> {
        Ok(self.pending_migrations(reader)?.is_empty())
    }

    fn target_index(&self, target: &str) -> Result<usize> {
        self.migrations
            .iter()
            .position(|m| m.name == target)
            .ok_or_else(|| {
                SqliteAccessError::misuse(format!("no migration named {target} is registered"))
            })
    }

    fn check_history(&self, applied: &[String], end: usize) -> Result<()> {
        let unknown: Vec<String> = applied
            .iter()
            .filter(|name| !self.contains(name))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(SqliteAccessError::MigrationHistoryMismatch(unknown));
        }
        if let Some(beyond) = self.migrations[end..]
            .iter()
            .find(|m| applied.contains(&m.name))
        {
            return Err(SqliteAccessError::misuse(format!(
                "database is already migrated beyond the target: {} is applied",
                beyond.name
            )));
        }
        Ok(())
    }
}

fn apply(conn: &mut Connection, migration: &Migration) -> Result<()> {
    match migration.foreign_keys {
        ForeignKeyChecks::Immediate => {
            conn.transaction_with(TransactionKind::Immediate, |conn| {
                (migration.body)(conn)?;
                ledger::record(conn, &migration.name)
            })
        }
        ForeignKeyChecks::Deferred => {
            // The pragma is a no-op inside a transaction, so it is toggled around it.
            let enforced = conn
                .fetch_value::<bool>("PRAGMA foreign_keys", ())?
                .unwrap_or(false);
            if enforced {
                conn.execute_batch("PRAGMA foreign_keys = OFF")?;
            }
            let result = conn.transaction_with(TransactionKind::Immediate, |conn| {
                (migration.body)(conn)?;
                check_foreign_keys(conn)?;
                ledger::record(conn, &migration.name)
            });
            if enforced {
                let restored = conn.execute_batch("PRAGMA foreign_keys = ON");
                if result.is_ok() {
                    restored?;
                }
            }
            result
        }
    }
}

fn check_foreign_keys(conn: &Connection) -> Result<()> {
    let violations = conn.fetch_rows("PRAGMA foreign_key_check", ())?;
    let Some(first) = violations.first() else {
        return Ok(());
    };
    let table: String = first.get_named("table")?;
    let parent: String = first.get_named("parent")?;
    Err(DatabaseError::new(
        SQLITE_CONSTRAINT_FOREIGNKEY,
        Some(format!(
            "FOREIGN KEY constraint failed: {} row(s) violate foreign keys, first in {table} referencing {parent}",
            violations.len()
        )),
    )
    .into())
}

impl fmt::Debug for Migrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrator")
            .field("migrations", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
