//! WAL-mode access: one serialized writer plus a bounded set of concurrent readers.

mod manager;

use std::fmt;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use r2d2::PooledConnection;

use crate::access::{DatabaseReader, DatabaseWriter};
use crate::config::{Configuration, ReaderAcquisition};
use crate::connection::{Connection, TransactionKind};
use crate::error::{Result, SqliteAccessError};
use crate::queue::DatabaseQueue;
use crate::tx_outcome::TransactionOutcome;

use self::manager::ReaderManager;

type Readers = r2d2::Pool<ReaderManager>;

const DEFAULT_READER_WAIT: Duration = Duration::from_secs(30);

/// A WAL database with one writer and up to `maximum_reader_count` concurrent readers.
///
/// Writes go through a [`DatabaseQueue`] and are serialized exactly like it. Each read runs on a
/// read-only connection inside a transaction pinned to one snapshot, so readers never block the
/// writer and never see a partially committed write. Cloning shares the pool.
///
/// Open at most one queue or pool per database file in a process.
#[derive(Clone)]
pub struct DatabasePool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    writer: DatabaseQueue,
    // Every access holds a read guard; `close` takes the write guard and so waits for them.
    readers: RwLock<Option<Readers>>,
    config: Configuration,
    path: PathBuf,
}

impl DatabasePool {
    /// Open `path`, switch it to WAL journal mode and open the reader connections.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError::Misuse`] for an in-memory path, and
    /// [`SqliteAccessError::ConnectionError`] if the database cannot use WAL mode.
    pub fn open(path: impl AsRef<Path>, config: Configuration) -> Result<Self> {
        let path = path.as_ref();
        if crate::connection::is_memory_path(path) {
            return Err(SqliteAccessError::misuse(
                "a database pool needs a database file; use a DatabaseQueue for in-memory databases",
            ));
        }

        let writer = DatabaseQueue::open(path, config.clone())?;
        let read_only = config.read_only;
        let journal_mode = writer.write_without_transaction(move |db| {
            if read_only {
                return db.fetch_value::<String>("PRAGMA journal_mode", ());
            }
            let mode = db.fetch_value::<String>("PRAGMA journal_mode = WAL", ())?;
            db.execute_batch("PRAGMA synchronous = NORMAL")?;
            Ok(mode)
        })?;
        if !journal_mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("wal"))
        {
            return Err(SqliteAccessError::ConnectionError(format!(
                "could not switch {} to WAL journal mode (journal mode is {})",
                path.display(),
                journal_mode.as_deref().unwrap_or("unknown")
            )));
        }

        let capacity = config.maximum_reader_count.max(1);
        let readers = r2d2::Pool::builder()
            .max_size(capacity)
            .min_idle(Some(capacity))
            .test_on_check_out(false)
            .connection_timeout(config.reader_timeout.unwrap_or(DEFAULT_READER_WAIT))
            .build(ReaderManager::new(path.to_path_buf(), config.clone()))?;

        tracing::debug!(
            path = %path.display(),
            readers = capacity,
            "database pool opened"
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                writer,
                readers: RwLock::new(Some(readers)),
                config,
                path: path.to_path_buf(),
            }),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    #[must_use]
    pub fn maximum_reader_count(&self) -> u32 {
        self.inner.config.maximum_reader_count.max(1)
    }

    /// Run `body` on a reader connection, in a snapshot taken when the read starts.
    ///
    /// The body runs on the calling thread. When all readers are busy the call waits, or fails
    /// with [`PoolExhausted`](SqliteAccessError::PoolExhausted) under
    /// [`ReaderAcquisition::FailFast`].
    ///
    /// # Errors
    /// Returns the body's error, [`Misuse`](SqliteAccessError::Misuse) if it writes,
    /// [`PoolExhausted`](SqliteAccessError::PoolExhausted), [`Pool`](SqliteAccessError::Pool)
    /// when the reader wait times out, or [`Closed`](SqliteAccessError::Closed).
    pub fn read<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let guard = self.inner.readers.read().map_err(|_| poisoned())?;
        let readers = guard.as_ref().ok_or(SqliteAccessError::Closed)?;
        let mut reader = self.acquire_reader(readers)?;
        reader.read_snapshot(body)
    }

    /// Run `body` on the writer in an immediate transaction, committing on `Ok`.
    ///
    /// # Errors
    /// See [`DatabaseQueue::write`].
    pub fn write<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_writer(|writer| writer.write(body))
    }

    /// # Errors
    /// See [`DatabaseQueue::write_without_transaction`].
    pub fn write_without_transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_writer(|writer| writer.write_without_transaction(body))
    }

    /// # Errors
    /// See [`DatabaseQueue::in_transaction`].
    pub fn in_transaction<F>(&self, kind: TransactionKind, body: F) -> Result<()>
    where
        F: FnOnce(&mut Connection) -> Result<TransactionOutcome> + Send + 'static,
    {
        self.with_writer(|writer| writer.in_transaction(kind, body))
    }

    /// [`read`](Self::read) on the blocking thread pool of the current tokio runtime.
    ///
    /// # Errors
    /// See [`read`](Self::read).
    pub async fn read_async<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.clone();
        run_blocking(move || pool.read(body)).await
    }

    /// [`write`](Self::write) on the blocking thread pool of the current tokio runtime.
    ///
    /// # Errors
    /// See [`write`](Self::write).
    pub async fn write_async<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.clone();
        run_blocking(move || pool.write(body)).await
    }

    /// Wait for in-flight reads and writes, then close every connection.
    ///
    /// Must not be called from inside an access of this pool. Later accesses fail with
    /// [`Closed`](SqliteAccessError::Closed).
    ///
    /// # Errors
    /// Returns [`ConnectionError`](SqliteAccessError::ConnectionError) if the writer thread
    /// cannot be joined.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.inner.readers.write().map_err(|_| poisoned())?;
        let Some(readers) = guard.take() else {
            return Ok(());
        };
        drop(readers);
        self.inner.writer.close()?;
        tracing::debug!(path = %self.inner.path.display(), "database pool closed");
        Ok(())
    }

    fn with_writer<T>(&self, access: impl FnOnce(&DatabaseQueue) -> Result<T>) -> Result<T> {
        let guard = self.inner.readers.read().map_err(|_| poisoned())?;
        if guard.is_none() {
            return Err(SqliteAccessError::Closed);
        }
        access(&self.inner.writer)
    }

    fn acquire_reader(&self, readers: &Readers) -> Result<PooledConnection<ReaderManager>> {
        match self.inner.config.reader_acquisition {
            ReaderAcquisition::FailFast => readers
                .try_get()
                .ok_or(SqliteAccessError::PoolExhausted {
                    capacity: readers.max_size(),
                }),
            ReaderAcquisition::Wait => {
                if self.inner.config.reader_timeout.is_some() {
                    return Ok(readers.get()?);
                }
                loop {
                    match readers.get() {
                        Ok(reader) => return Ok(reader),
                        Err(err) if readers.state().connections == 0 => return Err(err.into()),
                        Err(err) => {
                            tracing::debug!(error = %err, "still waiting for a reader connection");
                        }
                    }
                }
            }
        }
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
        Err(err) => Err(SqliteAccessError::ConnectionError(format!(
            "sqlite spawn_blocking join error: {err}"
        ))),
    }
}

fn poisoned() -> SqliteAccessError {
    SqliteAccessError::ConnectionError("database pool lock poisoned".into())
}

impl DatabaseReader for DatabasePool {
    fn read<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        DatabasePool::read(self, body)
    }
}

impl DatabaseWriter for DatabasePool {
    fn write<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        DatabasePool::write(self, body)
    }

    fn write_without_transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        DatabasePool::write_without_transaction(self, body)
    }
}

impl fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabasePool")
            .field("path", &self.inner.path)
            .field("maximum_reader_count", &self.maximum_reader_count())
            .field("closed", &self.inner.readers.read().map(|r| r.is_none()).ok())
            .finish()
    }
}
