//! The read/write access contract shared by [`DatabaseQueue`](crate::DatabaseQueue) and
//! [`DatabasePool`](crate::DatabasePool).

use crate::connection::Connection;
use crate::error::Result;

/// Whether an access may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Writing statements fail with [`Misuse`](crate::SqliteAccessError::Misuse).
    Read,
    Write,
}

impl AccessMode {
    #[must_use]
    pub fn from_read_only(read_only: bool) -> Self {
        if read_only { Self::Read } else { Self::Write }
    }
}

/// Something that lends a connection for reading.
pub trait DatabaseReader: Send + Sync {
    /// Run `body` in a read-only access.
    ///
    /// # Errors
    /// Returns the body's error, [`Misuse`](crate::SqliteAccessError::Misuse) if it writes, or
    /// [`Closed`](crate::SqliteAccessError::Closed) after the owner was closed.
    fn read<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static;
}

/// Something that lends its single writer connection.
pub trait DatabaseWriter: DatabaseReader {
    /// Run `body` in a transaction on the writer, committing on `Ok`.
    ///
    /// # Errors
    /// Returns the body's error or the engine error raised while committing.
    fn write<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static;

    /// Run `body` on the writer without an enclosing transaction.
    ///
    /// # Errors
    /// Returns the body's error.
    fn write_without_transaction<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static;
}
