//! Value conversion between Rust types and [`SqliteValue`].
//!
//! Conversions are explicit and never rely on the engine's own coercion rules:
//!
//! | stored \ target | bool         | integer                  | real        | text  | blob  |
//! |-----------------|--------------|--------------------------|-------------|-------|-------|
//! | NULL            | fail         | fail                     | fail        | fail  | fail  |
//! | INTEGER         | nonzero→true | exact, range checked     | widened     | fail  | fail  |
//! | REAL            | nonzero→true | integral and in range    | exact       | fail  | fail  |
//! | TEXT            | fail         | fail                     | fail        | exact | fail  |
//! | BLOB            | fail         | fail                     | fail        | fail  | exact |
//!
//! Decoding NULL into `Option<T>` yields `None`; into any other type it fails with
//! [`ConversionError::UnexpectedNull`].
//!
//! Types with integer or text raw values get their mapping from the
//! [`integer_raw_value!`](crate::integer_raw_value) and [`text_raw_value!`](crate::text_raw_value)
//! macros.

#[cfg(any(feature = "chrono", feature = "json"))]
mod external;
mod macros;
mod scalar;

#[cfg(feature = "json")]
pub use external::Json;

use crate::error::ConversionError;
use crate::types::SqliteValue;

/// Encode a Rust value as a storage value.
pub trait ToSqliteValue {
    fn to_sqlite_value(&self) -> SqliteValue;

    /// Encoding used by bindings and records: a failure here rejects the statement.
    ///
    /// # Errors
    /// Returns [`ConversionError::Unencodable`] for a value with no storage representation.
    fn try_to_sqlite_value(&self) -> Result<SqliteValue, ConversionError> {
        Ok(self.to_sqlite_value())
    }
}

/// Decode a Rust value from a storage value.
pub trait FromSqliteValue: Sized {
    /// # Errors
    /// Returns [`ConversionError`] when the stored value has no faithful representation as `Self`.
    fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError>;
}

impl ToSqliteValue for SqliteValue {
    fn to_sqlite_value(&self) -> SqliteValue {
        self.clone()
    }
}

impl FromSqliteValue for SqliteValue {
    fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl<T: ToSqliteValue + ?Sized> ToSqliteValue for &T {
    fn to_sqlite_value(&self) -> SqliteValue {
        (**self).to_sqlite_value()
    }

    fn try_to_sqlite_value(&self) -> Result<SqliteValue, ConversionError> {
        (**self).try_to_sqlite_value()
    }
}

impl<T: ToSqliteValue> ToSqliteValue for Option<T> {
    fn to_sqlite_value(&self) -> SqliteValue {
        match self {
            Some(value) => value.to_sqlite_value(),
            None => SqliteValue::Null,
        }
    }

    fn try_to_sqlite_value(&self) -> Result<SqliteValue, ConversionError> {
        match self {
            Some(value) => value.try_to_sqlite_value(),
            None => Ok(SqliteValue::Null),
        }
    }
}

impl<T: FromSqliteValue> FromSqliteValue for Option<T> {
    fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_sqlite_value(value).map(Some)
        }
    }
}

pub(crate) fn mismatch(value: &SqliteValue, target: &'static str) -> ConversionError {
    if value.is_null() {
        ConversionError::UnexpectedNull { target }
    } else {
        ConversionError::Mismatch {
            found: value.storage_class().name(),
            target,
        }
    }
}
