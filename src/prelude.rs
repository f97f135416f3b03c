//! Convenient imports for common functionality.
//!
//! ```rust
//! use sqlite_access::prelude::*;
//! ```

pub use crate::access::{AccessMode, DatabaseReader, DatabaseWriter};
pub use crate::config::{Configuration, ReaderAcquisition};
pub use crate::connection::{Connection, TransactionKind};
#[cfg(feature = "json")]
pub use crate::conversion::Json;
pub use crate::conversion::{FromSqliteValue, ToSqliteValue};
pub use crate::error::{ConversionError, DatabaseError, SqliteAccessError};
pub use crate::migration::{MigrationReport, Migrator};
pub use crate::params::Bindings;
pub use crate::pool::DatabasePool;
pub use crate::queue::DatabaseQueue;
pub use crate::record::{Assignment, ColumnAssign, ColumnValues, Persistable, PrimaryKey, Record};
pub use crate::results::{FromRow, Row};
pub use crate::tx_outcome::TransactionOutcome;
pub use crate::types::{SqliteValue, StorageClass};

pub use crate::{integer_raw_value, named_params, params, text_raw_value};
