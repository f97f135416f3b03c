//! Mapping rows onto user types and deriving persistence from a table and key declaration.
//!
//! Decoding goes through [`ColumnAssign`], called once per result column. A shape that adds
//! projected columns to an existing record handles its own columns and hands the rest to the
//! record it wraps:
//!
//! ```rust
//! use sqlite_access::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Player { id: Option<i64>, name: String }
//!
//! impl ColumnAssign for Player {
//!     fn assign_column(&mut self, column: &str, value: &SqliteValue) -> Result<Assignment, ConversionError> {
//!         match column {
//!             "id" => self.id = FromSqliteValue::from_sqlite_value(value)?,
//!             "name" => self.name = FromSqliteValue::from_sqlite_value(value)?,
//!             _ => return Ok(Assignment::Ignored),
//!         }
//!         Ok(Assignment::Applied)
//!     }
//! }
//!
//! #[derive(Debug, Default)]
//! struct RankedPlayer { player: Player, rank: i64 }
//!
//! impl ColumnAssign for RankedPlayer {
//!     fn assign_column(&mut self, column: &str, value: &SqliteValue) -> Result<Assignment, ConversionError> {
//!         if column == "rank" {
//!             self.rank = i64::from_sqlite_value(value)?;
//!             return Ok(Assignment::Applied);
//!         }
//!         self.player.assign_column(column, value)
//!     }
//! }
//!
//! let row = Row::from_pairs([
//!     ("id", SqliteValue::Integer(1)),
//!     ("name", SqliteValue::Text("Arthur".into())),
//!     ("rank", SqliteValue::Integer(3)),
//! ]);
//! let ranked = RankedPlayer::from_row(&row).unwrap();
//! assert_eq!((ranked.player.name.as_str(), ranked.rank), ("Arthur", 3));
//! ```

mod persistence;

pub use persistence::Persistable;

use crate::conversion::ToSqliteValue;
use crate::error::ConversionError;
use crate::types::SqliteValue;

/// Whether a column was taken by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Applied,
    Ignored,
}

/// Receives result columns one at a time.
pub trait ColumnAssign {
    /// Store `value` if `column` belongs to the receiver.
    ///
    /// # Errors
    /// Returns a [`ConversionError`] if a recognized column cannot be decoded.
    fn assign_column(
        &mut self,
        column: &str,
        value: &SqliteValue,
    ) -> Result<Assignment, ConversionError>;
}

/// How a record's row is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrimaryKey {
    /// Insert only.
    #[default]
    None,
    /// An `INTEGER PRIMARY KEY` column filled from the row id after insert.
    RowId(&'static str),
    /// A caller-managed single column.
    Column(&'static str),
    /// Caller-managed columns.
    Composite(&'static [&'static str]),
}

impl PrimaryKey {
    #[must_use]
    pub fn columns(&self) -> &[&'static str] {
        match self {
            Self::None => &[],
            Self::RowId(column) | Self::Column(column) => std::slice::from_ref(column),
            Self::Composite(columns) => columns,
        }
    }
}

/// Persisted columns of a record, in declaration order.
///
/// A value that fails to encode is remembered and fails the persistence operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnValues {
    entries: Vec<(String, SqliteValue)>,
    failure: Option<ConversionError>,
}

impl ColumnValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing an earlier value for the same column.
    pub fn set(&mut self, column: impl Into<String>, value: impl ToSqliteValue) -> &mut Self {
        let column = column.into();
        let value = match value.try_to_sqlite_value() {
            Ok(value) => value,
            Err(err) => {
                self.failure.get_or_insert(err);
                SqliteValue::Null
            }
        };
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&column))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
        self
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&SqliteValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqliteValue)> {
        self.entries.iter().map(|(column, value)| (column.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First encoding failure recorded by [`set`](Self::set).
    #[must_use]
    pub fn failure(&self) -> Option<&ConversionError> {
        self.failure.as_ref()
    }
}

/// A type stored as one table row.
///
/// Decoding comes from [`ColumnAssign`]; the table, key and [`encode`](Self::encode) drive the
/// operations of [`Persistable`].
pub trait Record: ColumnAssign + Default {
    /// `None` makes every persistence operation fail with `UnspecifiedTable`.
    fn table_name() -> Option<&'static str> {
        None
    }

    fn primary_key() -> PrimaryKey {
        PrimaryKey::None
    }

    /// Write the persisted columns, key columns included.
    fn encode(&self, values: &mut ColumnValues);

    /// Called after a successful insert with the row id SQLite assigned.
    fn did_insert(&mut self, row_id: i64) {
        if let PrimaryKey::RowId(column) = Self::primary_key() {
            if let Err(err) = self.assign_column(column, &SqliteValue::Integer(row_id)) {
                tracing::warn!(column, error = %err, "could not store inserted row id");
            }
        }
    }
}
