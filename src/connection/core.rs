use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};

use rusqlite::OpenFlags;

use crate::config::Configuration;
use crate::error::{DatabaseError, Result, SqliteAccessError};
use crate::params::Bindings;
use crate::statement::Statement;

const SQLITE_READONLY: i32 = 8;

/// One open SQLite handle.
///
/// A connection is not shared between threads: queues and pools own their connections and only
/// lend them to the body of an access as `&mut Connection`.
pub struct Connection {
    pub(super) raw: rusqlite::Connection,
    config: Configuration,
    path: Option<PathBuf>,
    opened_read_only: bool,
    pub(super) depth: usize,
    pub(super) read_only_access: bool,
    last_error: RefCell<Option<DatabaseError>>,
}

pub(crate) fn is_memory_path(path: &Path) -> bool {
    path.as_os_str().is_empty() || path == Path::new(":memory:")
}

impl Connection {
    /// Open the database at `path`, creating it unless the configuration is read-only.
    ///
    /// An empty path or `:memory:` opens a private in-memory database.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError::Database`] if the file cannot be opened or configured.
    pub fn open(path: impl AsRef<Path>, config: &Configuration) -> Result<Self> {
        let path = path.as_ref();
        if is_memory_path(path) {
            return Self::open_in_memory(config);
        }
        let flags = if config.read_only {
            read_only_flags()
        } else {
            OpenFlags::default()
        };
        let raw = rusqlite::Connection::open_with_flags(path, flags)?;
        Self::setup(raw, config, Some(path.to_path_buf()), config.read_only)
    }

    /// # Errors
    /// Returns [`SqliteAccessError::Database`] if the database cannot be configured.
    pub fn open_in_memory(config: &Configuration) -> Result<Self> {
        let raw = rusqlite::Connection::open_in_memory()?;
        Self::setup(raw, config, None, false)
    }

    /// Open a read-only handle used by pool readers.
    pub(crate) fn open_reader(path: &Path, config: &Configuration) -> Result<Self> {
        let raw = rusqlite::Connection::open_with_flags(path, read_only_flags())?;
        Self::setup(raw, config, Some(path.to_path_buf()), true)
    }

    fn setup(
        raw: rusqlite::Connection,
        config: &Configuration,
        path: Option<PathBuf>,
        opened_read_only: bool,
    ) -> Result<Self> {
        if let Some(timeout) = config.busy_timeout {
            raw.busy_timeout(timeout)?;
        }
        let connection = Self {
            raw,
            config: config.clone(),
            path,
            opened_read_only,
            depth: 0,
            read_only_access: false,
            last_error: RefCell::new(None),
        };
        connection.exec_internal(if config.foreign_keys_enabled {
            "PRAGMA foreign_keys = ON"
        } else {
            "PRAGMA foreign_keys = OFF"
        })?;
        tracing::debug!(
            path = %connection.display_path(),
            read_only = opened_read_only,
            "connection opened"
        );
        Ok(connection)
    }

    /// File path, or `None` for an in-memory database.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Whether the current access forbids writes.
    #[must_use]
    pub fn is_read_only_access(&self) -> bool {
        self.read_only_access
    }

    pub(super) fn opened_read_only(&self) -> bool {
        self.opened_read_only
    }

    /// Most recent engine error raised through this connection.
    #[must_use]
    pub fn last_error(&self) -> Option<DatabaseError> {
        self.last_error.borrow().clone()
    }

    #[must_use]
    pub fn last_insert_rowid(&self) -> i64 {
        self.raw.last_insert_rowid()
    }

    /// Rows changed by the most recent `INSERT`, `UPDATE` or `DELETE`.
    #[must_use]
    pub fn changes(&self) -> usize {
        usize::try_from(self.raw.changes()).unwrap_or(usize::MAX)
    }

    /// Compile one statement.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError::Database`] for invalid SQL and [`SqliteAccessError::Misuse`]
    /// for a writing statement in a read-only access or mixed placeholder styles.
    pub fn prepare(&self, sql: &str) -> Result<Statement<'_>> {
        let raw = self.raw.prepare(sql).map_err(|err| self.report(err, sql))?;
        Statement::new(raw, self, sql)
    }

    /// Prepare and run one statement, returning the changed row count.
    ///
    /// # Errors
    /// See [`Statement::execute`].
    pub fn execute(&self, sql: &str, bindings: impl Into<Bindings>) -> Result<usize> {
        self.prepare(sql)?.execute(bindings)
    }

    /// Run several `;`-separated statements without bindings.
    ///
    /// In a read-only access every statement of the batch is still refused if it writes.
    ///
    /// # Errors
    /// Returns the first failure; earlier statements of the batch stay applied.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.exec_internal(sql)
    }

    /// Close the handle, reporting errors the engine raises while finalizing.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError::Database`] if SQLite refuses to close.
    pub fn close(self) -> Result<()> {
        let path = self.display_path();
        self.raw.close().map_err(|(_, err)| SqliteAccessError::from(err))?;
        tracing::debug!(path = %path, "connection closed");
        Ok(())
    }

    pub(crate) fn exec_internal(&self, sql: &str) -> Result<()> {
        self.trace_statement(sql);
        self.raw
            .execute_batch(sql)
            .map_err(|err| self.report(err, sql))
    }

    pub(crate) fn trace_statement(&self, sql: &str) {
        tracing::trace!(target: "sqlite_access::sql", sql);
        if let Some(trace) = &self.config.trace {
            trace(sql);
        }
    }

    /// Attach the statement text to an error and remember engine failures as the last error.
    ///
    /// `SQLITE_READONLY` inside a read access or on a read-only handle becomes `Misuse`; the
    /// engine error stays available from [`last_error`](Self::last_error).
    pub(crate) fn report(&self, err: impl Into<SqliteAccessError>, sql: &str) -> SqliteAccessError {
        let err = err.into().with_sql(sql);
        match err {
            SqliteAccessError::Database(db) if self.read_only_access && db.code == SQLITE_READONLY => {
                *self.last_error.borrow_mut() = Some(db);
                SqliteAccessError::misuse(format!(
                    "attempt to write in a read-only access: `{sql}`"
                ))
            }
            SqliteAccessError::Database(db) if self.opened_read_only && db.code == SQLITE_READONLY => {
                *self.last_error.borrow_mut() = Some(db);
                SqliteAccessError::misuse(format!(
                    "attempt to write through a read-only connection: `{sql}`"
                ))
            }
            SqliteAccessError::Database(db) => {
                *self.last_error.borrow_mut() = Some(db.clone());
                SqliteAccessError::Database(db)
            }
            other => other,
        }
    }

    pub(crate) fn display_path(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| ":memory:".to_owned(), |path| path.display().to_string())
    }
}

fn read_only_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("path", &self.path)
            .field("opened_read_only", &self.opened_read_only)
            .field("depth", &self.depth)
            .field("read_only_access", &self.read_only_access)
            .finish_non_exhaustive()
    }
}
