use std::path::PathBuf;

use crate::config::Configuration;
use crate::connection::Connection;
use crate::error::SqliteAccessError;

/// Opens the read-only connections of a [`DatabasePool`](super::DatabasePool).
#[derive(Debug)]
pub(crate) struct ReaderManager {
    path: PathBuf,
    config: Configuration,
}

impl ReaderManager {
    pub(crate) fn new(path: PathBuf, config: Configuration) -> Self {
        Self { path, config }
    }
}

impl r2d2::ManageConnection for ReaderManager {
    type Connection = Connection;
    type Error = SqliteAccessError;

    fn connect(&self) -> Result<Connection, SqliteAccessError> {
        Connection::open_reader(&self.path, &self.config)
    }

    fn is_valid(&self, conn: &mut Connection) -> Result<(), SqliteAccessError> {
        conn.execute_batch("")
    }

    fn has_broken(&self, conn: &mut Connection) -> bool {
        // Every read ends its snapshot; a reader still inside one is not reusable.
        conn.is_in_transaction()
    }
}
