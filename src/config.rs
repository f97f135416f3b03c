use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::pool::DatabasePool;
use crate::queue::DatabaseQueue;

/// Callback receiving the SQL text of every executed statement.
pub type TraceFunction = Arc<dyn Fn(&str) + Send + Sync>;

/// What a pool read does when every reader connection is busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderAcquisition {
    /// Block until a reader frees up (bounded by `reader_timeout` when set).
    #[default]
    Wait,
    /// Fail immediately with [`SqliteAccessError::PoolExhausted`](crate::SqliteAccessError::PoolExhausted).
    FailFast,
}

/// Options applied to every connection a queue or pool opens.
#[derive(Clone)]
pub struct Configuration {
    pub foreign_keys_enabled: bool,
    /// Open the file read-only. Writes then fail with `Misuse`, the same as writes inside a read
    /// access.
    pub read_only: bool,
    pub trace: Option<TraceFunction>,
    /// How long a statement waits on a locked database before failing with `SQLITE_BUSY`.
    pub busy_timeout: Option<Duration>,
    /// Names worker threads and log fields.
    pub label: Option<String>,
    pub maximum_reader_count: u32,
    pub reader_acquisition: ReaderAcquisition,
    pub reader_timeout: Option<Duration>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            foreign_keys_enabled: true,
            read_only: false,
            trace: None,
            busy_timeout: None,
            label: None,
            maximum_reader_count: 5,
            reader_acquisition: ReaderAcquisition::Wait,
            reader_timeout: None,
        }
    }
}

impl Configuration {
    #[must_use]
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    pub(crate) fn label_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.label.as_deref().unwrap_or(fallback)
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("foreign_keys_enabled", &self.foreign_keys_enabled)
            .field("read_only", &self.read_only)
            .field("trace", &self.trace.as_ref().map(|_| "<fn>"))
            .field("busy_timeout", &self.busy_timeout)
            .field("label", &self.label)
            .field("maximum_reader_count", &self.maximum_reader_count)
            .field("reader_acquisition", &self.reader_acquisition)
            .field("reader_timeout", &self.reader_timeout)
            .finish()
    }
}

/// Fluent builder for [`Configuration`].
///
/// ```rust
/// use std::time::Duration;
/// use sqlite_access::prelude::*;
///
/// let config = Configuration::builder()
///     .foreign_keys(false)
///     .busy_timeout(Duration::from_secs(1))
///     .maximum_reader_count(2)
///     .finish();
/// assert!(!config.foreign_keys_enabled);
/// assert_eq!(config.maximum_reader_count, 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    config: Configuration,
}

impl ConfigurationBuilder {
    #[must_use]
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.config.foreign_keys_enabled = enabled;
        self
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.config.read_only = read_only;
        self
    }

    #[must_use]
    pub fn trace<F>(mut self, trace: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.config.trace = Some(Arc::new(trace));
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.config.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Some(label.into());
        self
    }

    /// Capacity of the reader pool; clamped to at least one.
    #[must_use]
    pub fn maximum_reader_count(mut self, count: u32) -> Self {
        self.config.maximum_reader_count = count.max(1);
        self
    }

    #[must_use]
    pub fn reader_acquisition(mut self, acquisition: ReaderAcquisition) -> Self {
        self.config.reader_acquisition = acquisition;
        self
    }

    #[must_use]
    pub fn reader_timeout(mut self, timeout: Duration) -> Self {
        self.config.reader_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn finish(self) -> Configuration {
        self.config
    }

    /// Open a serialized queue with this configuration.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError`](crate::SqliteAccessError) if the database cannot be opened.
    pub fn open_queue(self, path: impl AsRef<Path>) -> Result<DatabaseQueue> {
        DatabaseQueue::open(path, self.finish())
    }

    /// Open a WAL pool with this configuration.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError`](crate::SqliteAccessError) if the database cannot be opened or
    /// switched to WAL mode.
    pub fn open_pool(self, path: impl AsRef<Path>) -> Result<DatabasePool> {
        DatabasePool::open(path, self.finish())
    }
}
