/// Derive storage conversions for a type with an integer raw value.
///
/// The type must be `Copy`, with `From<T> for i64` and `TryFrom<i64> for T`. Decoding goes through
/// the INTEGER rules of the conversion table, so a REAL holding an integral value is accepted too.
///
/// ```rust
/// use sqlite_access::prelude::*;
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Level { Low = 1, High = 2 }
///
/// impl From<Level> for i64 {
///     fn from(level: Level) -> i64 { level as i64 }
/// }
///
/// impl TryFrom<i64> for Level {
///     type Error = ();
///     fn try_from(raw: i64) -> Result<Self, ()> {
///         match raw { 1 => Ok(Level::Low), 2 => Ok(Level::High), _ => Err(()) }
///     }
/// }
///
/// sqlite_access::integer_raw_value!(Level);
///
/// assert_eq!(Level::High.to_sqlite_value(), SqliteValue::Integer(2));
/// assert_eq!(Level::from_sqlite_value(&SqliteValue::Integer(1)).unwrap(), Level::Low);
/// assert!(Level::from_sqlite_value(&SqliteValue::Integer(9)).is_err());
/// ```
#[macro_export]
macro_rules! integer_raw_value {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::ToSqliteValue for $ty {
            fn to_sqlite_value(&self) -> $crate::SqliteValue {
                $crate::SqliteValue::Integer(::core::convert::From::from(*self))
            }
        }

        impl $crate::FromSqliteValue for $ty {
            fn from_sqlite_value(
                value: &$crate::SqliteValue,
            ) -> ::core::result::Result<Self, $crate::ConversionError> {
                let raw = <i64 as $crate::FromSqliteValue>::from_sqlite_value(value)?;
                <$ty as ::core::convert::TryFrom<i64>>::try_from(raw).map_err(|_| {
                    $crate::ConversionError::InvalidRawValue {
                        value: raw.to_string(),
                        target: ::core::any::type_name::<$ty>(),
                    }
                })
            }
        }
    )+};
}

/// Derive storage conversions for a type with a text raw value.
///
/// The type must implement `AsRef<str>` and `FromStr`; it is stored as TEXT.
#[macro_export]
macro_rules! text_raw_value {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::ToSqliteValue for $ty {
            fn to_sqlite_value(&self) -> $crate::SqliteValue {
                $crate::SqliteValue::Text(::core::convert::AsRef::<str>::as_ref(self).to_owned())
            }
        }

        impl $crate::FromSqliteValue for $ty {
            fn from_sqlite_value(
                value: &$crate::SqliteValue,
            ) -> ::core::result::Result<Self, $crate::ConversionError> {
                let raw = <::std::string::String as $crate::FromSqliteValue>::from_sqlite_value(value)?;
                raw.parse::<$ty>().map_err(|_| $crate::ConversionError::InvalidRawValue {
                    value: raw.clone(),
                    target: ::core::any::type_name::<$ty>(),
                })
            }
        }
    )+};
}
