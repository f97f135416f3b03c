use std::sync::Arc;

use crate::conversion::FromSqliteValue;
use crate::error::ConversionError;
use crate::types::SqliteValue;

/// One materialized result tuple.
///
/// Column names are shared by every row of a result and are not guaranteed to be unique; lookups
/// by name return the leftmost matching column, compared ASCII case-insensitively the way SQLite
/// resolves identifiers. A `Row` owns its values and stays valid after the access that produced
/// it has ended.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: Vec<SqliteValue>,
}

impl Row {
    pub(crate) fn new(columns: Arc<Vec<String>>, values: Vec<SqliteValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Build a detached row from `(column, value)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, SqliteValue)>,
        K: Into<String>,
    {
        let (columns, values): (Vec<String>, Vec<SqliteValue>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self::new(Arc::new(columns), values)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn values(&self) -> &[SqliteValue] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<SqliteValue> {
        self.values
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn value(&self, index: usize) -> Option<&SqliteValue> {
        self.values.get(index)
    }

    #[must_use]
    pub fn value_named(&self, name: &str) -> Option<&SqliteValue> {
        self.column_index(name).and_then(|index| self.values.get(index))
    }

    /// Decode the value at `index`.
    ///
    /// # Errors
    /// Returns [`ConversionError::ColumnIndexOutOfBounds`] for a bad index, or the conversion
    /// failure of the stored value.
    pub fn get<T: FromSqliteValue>(&self, index: usize) -> Result<T, ConversionError> {
        let value = self
            .values
            .get(index)
            .ok_or(ConversionError::ColumnIndexOutOfBounds(index))?;
        T::from_sqlite_value(value)
    }

    /// Decode the leftmost column called `name`.
    ///
    /// # Errors
    /// Returns [`ConversionError::ColumnNotFound`] when no column matches, or the conversion
    /// failure of the stored value.
    pub fn get_named<T: FromSqliteValue>(&self, name: &str) -> Result<T, ConversionError> {
        let value = self
            .value_named(name)
            .ok_or_else(|| ConversionError::ColumnNotFound(name.to_owned()))?;
        T::from_sqlite_value(value)
    }

    /// Iterate `(column, value)` pairs in result order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqliteValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}
