//! Materialized rows, lazy cursors, and decoding rows into Rust values.

mod cursor;
mod row;

pub use cursor::RowCursor;
pub use row::Row;

use crate::error::Result;
use crate::record::ColumnAssign;

/// Build a value from one result row.
///
/// Implemented for [`Row`] itself and, through [`ColumnAssign`], for every record type with a
/// `Default` starting state. Scalars are fetched with
/// [`Statement::fetch_values`](crate::Statement::fetch_values) instead.
pub trait FromRow: Sized {
    /// # Errors
    /// Returns a conversion error when a column cannot be decoded.
    fn from_row(row: &Row) -> Result<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(row.clone())
    }
}

impl<T: ColumnAssign + Default> FromRow for T {
    fn from_row(row: &Row) -> Result<Self> {
        let mut value = T::default();
        for (column, stored) in row.iter() {
            value.assign_column(column, stored)?;
        }
        Ok(value)
    }
}
