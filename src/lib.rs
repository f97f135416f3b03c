//! Typed, serialized access to embedded SQLite databases.
//!
//! * [`DatabaseQueue`] runs every access on one connection owned by a dedicated thread.
//! * [`DatabasePool`] keeps one writer queue and a set of WAL snapshot readers.
//! * [`Migrator`] applies named migrations once, in order, tracked in the database.
//! * [`Record`] and [`Persistable`] map user types onto table rows.
//!
//! Values cross the engine boundary as [`SqliteValue`] through the [`ToSqliteValue`] and
//! [`FromSqliteValue`] traits.

mod access;
mod config;
mod connection;
mod conversion;
mod error;
mod migration;
mod params;
mod pool;
mod queue;
mod record;
mod results;
mod statement;
mod tx_outcome;
mod types;
mod worker;

pub mod prelude;

pub use access::{AccessMode, DatabaseReader, DatabaseWriter};
pub use config::{Configuration, ConfigurationBuilder, ReaderAcquisition, TraceFunction};
pub use connection::{Connection, TransactionKind};
#[cfg(feature = "json")]
pub use conversion::Json;
pub use conversion::{FromSqliteValue, ToSqliteValue};
pub use error::{ConversionError, DatabaseError, Result, SqliteAccessError};
pub use migration::{LEDGER_TABLE, MigrationReport, Migrator};
pub use params::Bindings;
pub use pool::DatabasePool;
pub use queue::DatabaseQueue;
pub use record::{Assignment, ColumnAssign, ColumnValues, Persistable, PrimaryKey, Record};
pub use results::{FromRow, Row, RowCursor};
pub use statement::Statement;
pub use tx_outcome::TransactionOutcome;
pub use types::{SqliteValue, StorageClass};
