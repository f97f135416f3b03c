use crate::error::ConversionError;
use crate::types::SqliteValue;

use super::{FromSqliteValue, ToSqliteValue, mismatch};

// Largest magnitude an f64 can hold while still converting exactly into an i64.
const I64_LOWER_BOUND: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Read an INTEGER, or a REAL holding an integral in-range number, as `i64`.
fn integer_value(value: &SqliteValue, target: &'static str) -> Result<i64, ConversionError> {
    match value {
        SqliteValue::Integer(i) => Ok(*i),
        SqliteValue::Real(f) => {
            if !f.is_finite() || f.fract() != 0.0 || *f < I64_LOWER_BOUND || *f >= I64_UPPER_BOUND
            {
                return Err(ConversionError::OutOfRange {
                    value: f.to_string(),
                    target,
                });
            }
            #[allow(clippy::cast_possible_truncation)]
            let exact = *f as i64;
            Ok(exact)
        }
        other => Err(mismatch(other, target)),
    }
}

impl ToSqliteValue for bool {
    fn to_sqlite_value(&self) -> SqliteValue {
        SqliteValue::Integer(i64::from(*self))
    }
}

impl FromSqliteValue for bool {
    fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError> {
        match value {
            SqliteValue::Integer(i) => Ok(*i != 0),
            SqliteValue::Real(f) => Ok(*f != 0.0),
            other => Err(mismatch(other, "bool")),
        }
    }
}

macro_rules! impl_integer {
    ($($ty:ty),+) => {$(
        impl ToSqliteValue for $ty {
            fn to_sqlite_value(&self) -> SqliteValue {
                SqliteValue::Integer(i64::from(*self))
            }
        }

        impl FromSqliteValue for $ty {
            fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError> {
                let target = stringify!($ty);
                let wide = integer_value(value, target)?;
                <$ty>::try_from(wide).map_err(|_| ConversionError::OutOfRange {
                    value: wide.to_string(),
                    target,
                })
            }
        }
    )+};
}

impl_integer!(i8, i16, i32, i64, u8, u16, u32);

impl ToSqliteValue for f64 {
    fn to_sqlite_value(&self) -> SqliteValue {
        SqliteValue::Real(*self)
    }
}

impl FromSqliteValue for f64 {
    fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError> {
        match value {
            #[allow(clippy::cast_precision_loss)]
            SqliteValue::Integer(i) => Ok(*i as f64),
            SqliteValue::Real(f) => Ok(*f),
            other => Err(mismatch(other, "f64")),
        }
    }
}

impl ToSqliteValue for f32 {
    fn to_sqlite_value(&self) -> SqliteValue {
        SqliteValue::Real(f64::from(*self))
    }
}

impl FromSqliteValue for f32 {
    fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError> {
        let wide = match value {
            #[allow(clippy::cast_precision_loss)]
            SqliteValue::Integer(i) => *i as f64,
            SqliteValue::Real(f) => *f,
            other => return Err(mismatch(other, "f32")),
        };
        if wide.is_finite() && wide.abs() > f64::from(f32::MAX) {
            return Err(ConversionError::OutOfRange {
                value: wide.to_string(),
                target: "f32",
            });
        }
        #[allow(clippy::cast_possible_truncation)]
        let narrow = wide as f32;
        Ok(narrow)
    }
}

impl ToSqliteValue for str {
    fn to_sqlite_value(&self) -> SqliteValue {
        SqliteValue::Text(self.to_owned())
    }
}

impl ToSqliteValue for String {
    fn to_sqlite_value(&self) -> SqliteValue {
        SqliteValue::Text(self.clone())
    }
}

impl FromSqliteValue for String {
    fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError> {
        match value {
            SqliteValue::Text(text) => Ok(text.clone()),
            other => Err(mismatch(other, "String")),
        }
    }
}

impl ToSqliteValue for [u8] {
    fn to_sqlite_value(&self) -> SqliteValue {
        SqliteValue::Blob(self.to_vec())
    }
}

impl ToSqliteValue for Vec<u8> {
    fn to_sqlite_value(&self) -> SqliteValue {
        SqliteValue::Blob(self.clone())
    }
}

impl FromSqliteValue for Vec<u8> {
    fn from_sqlite_value(value: &SqliteValue) -> Result<Self, ConversionError> {
        match value {
            SqliteValue::Blob(bytes) => Ok(bytes.clone()),
            other => Err(mismatch(other, "Vec<u8>")),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty),+) => {$(
        impl From<$ty> for SqliteValue {
            fn from(value: $ty) -> Self {
                value.to_sqlite_value()
            }
        }
    )+};
}

impl_from_for_value!(bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, String, Vec<u8>);

impl From<&str> for SqliteValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<&[u8]> for SqliteValue {
    fn from(value: &[u8]) -> Self {
        Self::Blob(value.to_vec())
    }
}

impl<T: ToSqliteValue> From<Option<T>> for SqliteValue {
    fn from(value: Option<T>) -> Self {
        value.to_sqlite_value()
    }
}
