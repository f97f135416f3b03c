//! Text-backed conversions for `chrono` and `serde_json` types.

use crate::error::ConversionError;
use crate::types::SqliteValue;

use super::{FromSqliteValue, ToSqliteValue, mismatch};

fn text<'a>(value: &'a SqliteValue, target: &'static str) -> Result<&'a str, ConversionError> {
    value.as_text().ok_or_else(|| mismatch(value, target))
}

#[cfg(feature = "chrono")]
mod datetime {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

    use super::{ConversionError, FromSqliteValue, SqliteValue, ToSqliteValue, text};

    const DATETIME_FORMAT: &str = "%F %T%.f";
    const DATE_FORMAT: &str = "%F";
    // Accepted on input only: ISO-8601 `T` separator and minute precision.
    const DATETIME_INPUT_FORMATS: &[&str] = &["%F %T%.f", "%FT%T%.f", "%F %H:%M", "%FT%H:%M"];

    fn parse_datetime(raw: &str, target: &'static str) -> Result<NaiveDateTime, ConversionError> {
        DATETIME_INPUT_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .ok_or_else(|| ConversionError::Unparsable {
                target,
                message: format!("`{raw}` is not a date time"),
            })
    }

    impl ToSqliteValue for NaiveDateTime {
        fn to_sqlite_value(&self) -> SqliteValue {
            SqliteValue::Text(self.format(DATETIME_FORMAT).to_string())
        }
    }

    impl FromSqliteValue for NaiveDateTime {
        fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError> {
            parse_datetime(text(value, "NaiveDateTime")?, "NaiveDateTime")
        }
    }

    impl ToSqliteValue for DateTime<Utc> {
        fn to_sqlite_value(&self) -> SqliteValue {
            self.naive_utc().to_sqlite_value()
        }
    }

    impl FromSqliteValue for DateTime<Utc> {
        fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError> {
            parse_datetime(text(value, "DateTime<Utc>")?, "DateTime<Utc>")
                .map(|naive| naive.and_utc())
        }
    }

    impl ToSqliteValue for NaiveDate {
        fn to_sqlite_value(&self) -> SqliteValue {
            SqliteValue::Text(self.format(DATE_FORMAT).to_string())
        }
    }

    impl FromSqliteValue for NaiveDate {
        fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError> {
            let raw = text(value, "NaiveDate")?;
            NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|err| {
                ConversionError::Unparsable {
                    target: "NaiveDate",
                    message: err.to_string(),
                }
            })
        }
    }
}

#[cfg(feature = "json")]
mod json {
    use serde::Serialize;
    use serde::de::DeserializeOwned;

    use super::{ConversionError, FromSqliteValue, SqliteValue, ToSqliteValue, text};

    /// Store any serde value as JSON text.
    ///
    /// ```rust
    /// use sqlite_access::prelude::*;
    ///
    /// let tags = Json(vec!["a".to_string(), "b".to_string()]);
    /// assert_eq!(tags.to_sqlite_value(), SqliteValue::Text(r#"["a","b"]"#.into()));
    /// ```
    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    pub struct Json<T>(pub T);

    impl ToSqliteValue for serde_json::Value {
        fn to_sqlite_value(&self) -> SqliteValue {
            SqliteValue::Text(self.to_string())
        }
    }

    impl FromSqliteValue for serde_json::Value {
        fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError> {
            serde_json::from_str(text(value, "JSON")?).map_err(|err| ConversionError::Unparsable {
                target: "JSON",
                message: err.to_string(),
            })
        }
    }

    impl<T: Serialize> Json<T> {
        /// Serialize to JSON text.
        ///
        /// # Errors
        /// Returns [`ConversionError::Unencodable`] when serde refuses the value, such as a map
        /// with non-string keys.
        pub fn encode(&self) -> Result<SqliteValue, ConversionError> {
            serde_json::to_string(&self.0)
                .map(SqliteValue::Text)
                .map_err(|err| ConversionError::Unencodable {
                    target: "Json",
                    message: err.to_string(),
                })
        }
    }

    /// `to_sqlite_value` yields NULL for a value [`Json::encode`] rejects; bindings and records
    /// encode through `try_to_sqlite_value` and fail instead.
    impl<T: Serialize> ToSqliteValue for Json<T> {
        fn to_sqlite_value(&self) -> SqliteValue {
            self.encode().unwrap_or(SqliteValue::Null)
        }

        fn try_to_sqlite_value(&self) -> Result<SqliteValue, ConversionError> {
            self.encode()
        }
    }

    impl<T: DeserializeOwned> FromSqliteValue for Json<T> {
        fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError> {
            serde_json::from_str(text(value, "Json")?)
                .map(Json)
                .map_err(|err| ConversionError::Unparsable {
                    target: "Json",
                    message: err.to_string(),
                })
        }
    }
}

#[cfg(feature = "json")]
pub use json::Json;
