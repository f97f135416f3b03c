use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::access::{AccessMode, DatabaseReader, DatabaseWriter};
use crate::config::Configuration;
use crate::connection::{Connection, TransactionKind};
use crate::error::Result;
use crate::tx_outcome::TransactionOutcome;
use crate::worker::QueueWorker;

/// Serialized access to one connection.
///
/// A dedicated thread owns the connection and runs submitted bodies one at a time, in the order
/// they were submitted, whichever thread submitted them. Callers block until their body has run.
/// Cloning the queue shares the same thread and connection; the connection closes after the last
/// clone is dropped or [`close`](Self::close) is called.
///
/// Open at most one queue or pool per database file in a process.
///
/// ```rust
/// use sqlite_access::prelude::*;
///
/// # fn main() -> Result<(), SqliteAccessError> {
/// let queue = DatabaseQueue::in_memory(Configuration::default())?;
/// queue.write(|db| {
///     db.execute_batch("CREATE TABLE player (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")?;
///     db.execute("INSERT INTO player (name) VALUES (?)", params!["Arthur"])?;
///     Ok(())
/// })?;
/// let count = queue.read(|db| db.fetch_value::<i64>("SELECT COUNT(*) FROM player", ()))?;
/// assert_eq!(count, Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DatabaseQueue {
    worker: Arc<QueueWorker>,
    path: Option<PathBuf>,
}

impl DatabaseQueue {
    /// Open `path` and start the queue thread.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError`](crate::SqliteAccessError) if the database cannot be opened or
    /// the thread cannot be spawned.
    pub fn open(path: impl AsRef<Path>, config: Configuration) -> Result<Self> {
        let conn = Connection::open(path, &config)?;
        Self::from_connection(conn)
    }

    /// Queue over a private in-memory database.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError`](crate::SqliteAccessError) if the thread cannot be spawned.
    pub fn in_memory(config: Configuration) -> Result<Self> {
        let conn = Connection::open_in_memory(&config)?;
        Self::from_connection(conn)
    }

    /// Hand an already open connection to a new queue.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError::ConnectionError`](crate::SqliteAccessError::ConnectionError)
    /// if the thread cannot be spawned.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let path = conn.path().map(Path::to_path_buf);
        let label = conn
            .configuration()
            .label_or(&conn.display_path())
            .to_owned();
        let worker = QueueWorker::spawn(conn, label)?;
        Ok(Self {
            worker: Arc::new(worker),
            path,
        })
    }

    /// File path, or `None` for an in-memory database.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `body` against the connection in the given mode, blocking until it completes.
    ///
    /// Calling back into the same queue from inside `body` fails with
    /// [`Misuse`](crate::SqliteAccessError::Misuse); nest transactions through the connection
    /// instead. A panic in `body` rolls back any open transaction and resumes on the caller.
    ///
    /// # Errors
    /// Returns the body's error, [`Misuse`](crate::SqliteAccessError::Misuse) for writes in a
    /// read access, or [`Closed`](crate::SqliteAccessError::Closed) once the queue was closed.
    pub fn with_connection<T, F>(&self, mode: AccessMode, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.worker.access(mode, body)
    }

    /// # Errors
    /// See [`with_connection`](Self::with_connection).
    pub fn read<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.worker.access(AccessMode::Read, body)
    }

    /// Run `body` in an immediate transaction, committing on `Ok`.
    ///
    /// # Errors
    /// See [`with_connection`](Self::with_connection).
    pub fn write<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.worker.access(AccessMode::Write, move |conn| {
            conn.transaction_with(TransactionKind::Immediate, body)
        })
    }

    /// # Errors
    /// See [`with_connection`](Self::with_connection).
    pub fn write_without_transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.worker.access(AccessMode::Write, body)
    }

    /// Run `body` in a transaction that it ends itself by returning an outcome.
    ///
    /// # Errors
    /// See [`with_connection`](Self::with_connection).
    pub fn in_transaction<F>(&self, kind: TransactionKind, body: F) -> Result<()>
    where
        F: FnOnce(&mut Connection) -> Result<TransactionOutcome> + Send + 'static,
    {
        self.worker
            .access(AccessMode::Write, move |conn| conn.in_transaction(kind, body))
    }

    /// Async form of [`read`](Self::read); the body still runs on the queue thread.
    ///
    /// # Errors
    /// See [`with_connection`](Self::with_connection).
    pub async fn read_async<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.worker.access_async(AccessMode::Read, body).await
    }

    /// Async form of [`write`](Self::write).
    ///
    /// # Errors
    /// See [`with_connection`](Self::with_connection).
    pub async fn write_async<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.worker
            .access_async(AccessMode::Write, move |conn| {
                conn.transaction_with(TransactionKind::Immediate, body)
            })
            .await
    }

    /// Let already submitted accesses finish, then close the connection.
    ///
    /// Later accesses through any clone fail with [`Closed`](crate::SqliteAccessError::Closed).
    ///
    /// # Errors
    /// Returns [`Misuse`](crate::SqliteAccessError::Misuse) when called from inside an access of
    /// this queue.
    pub fn close(&self) -> Result<()> {
        self.worker.shutdown()
    }
}

impl DatabaseReader for DatabaseQueue {
    fn read<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        DatabaseQueue::read(self, body)
    }
}

impl DatabaseWriter for DatabaseQueue {
    fn write<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        DatabaseQueue::write(self, body)
    }

    fn write_without_transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        DatabaseQueue::write_without_transaction(self, body)
    }
}

impl fmt::Debug for DatabaseQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseQueue")
            .field("label", &self.worker.label())
            .field("path", &self.path)
            .finish()
    }
}
