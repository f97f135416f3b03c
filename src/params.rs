use crate::conversion::ToSqliteValue;
use crate::error::ConversionError;
use crate::types::SqliteValue;

/// Arguments for one statement execution.
///
/// Either an ordered sequence matched to `?`/`?NNN` placeholders, or a name→value mapping matched
/// to `:name` placeholders. The two forms never mix within one call.
///
/// ```rust
/// use sqlite_access::prelude::*;
///
/// let positional = params![1_i64, "alice", None::<f64>];
/// let named = named_params! { "id" => 1_i64, ":name" => "alice" };
/// assert_eq!(positional.len(), 3);
/// assert_eq!(named.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Bindings {
    Positional(Vec<SqliteValue>),
    /// Keys are stored with their placeholder prefix (`:name`, `@name` or `$name`).
    Named(Vec<(String, SqliteValue)>),
    /// An argument failed to encode; statements refuse to run with these bindings.
    Unencodable(ConversionError),
}

impl Default for Bindings {
    fn default() -> Self {
        Self::Positional(Vec::new())
    }
}

impl Bindings {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    pub fn positional<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToSqliteValue,
    {
        values.into_iter().map(|v| v.try_to_sqlite_value()).collect()
    }

    /// Build named bindings; a key without a prefix gets a `:`.
    pub fn named<I, K, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: ToSqliteValue,
    {
        pairs
            .into_iter()
            .map(|(key, value)| (key, value.try_to_sqlite_value()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Positional(values) => values.len(),
            Self::Named(pairs) => pairs.len(),
            Self::Unencodable(_) => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn placeholder_name(key: &str) -> String {
    if key.starts_with([':', '@', '$']) {
        key.to_owned()
    } else {
        format!(":{key}")
    }
}

impl FromIterator<Result<SqliteValue, ConversionError>> for Bindings {
    fn from_iter<I: IntoIterator<Item = Result<SqliteValue, ConversionError>>>(iter: I) -> Self {
        let values: Result<Vec<SqliteValue>, ConversionError> = iter.into_iter().collect();
        match values {
            Ok(values) => Self::Positional(values),
            Err(err) => Self::Unencodable(err),
        }
    }
}

impl<K: AsRef<str>> FromIterator<(K, Result<SqliteValue, ConversionError>)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, Result<SqliteValue, ConversionError>)>>(
        iter: I,
    ) -> Self {
        let pairs: Result<Vec<(String, SqliteValue)>, ConversionError> = iter
            .into_iter()
            .map(|(key, value)| value.map(|value| (placeholder_name(key.as_ref()), value)))
            .collect();
        match pairs {
            Ok(pairs) => Self::Named(pairs),
            Err(err) => Self::Unencodable(err),
        }
    }
}

impl From<()> for Bindings {
    fn from((): ()) -> Self {
        Self::default()
    }
}

impl From<Vec<SqliteValue>> for Bindings {
    fn from(values: Vec<SqliteValue>) -> Self {
        Self::Positional(values)
    }
}

impl From<&[SqliteValue]> for Bindings {
    fn from(values: &[SqliteValue]) -> Self {
        Self::Positional(values.to_vec())
    }
}

impl<const N: usize> From<[SqliteValue; N]> for Bindings {
    fn from(values: [SqliteValue; N]) -> Self {
        Self::Positional(values.into())
    }
}

impl From<Vec<(String, SqliteValue)>> for Bindings {
    fn from(pairs: Vec<(String, SqliteValue)>) -> Self {
        Self::Named(
            pairs
                .into_iter()
                .map(|(key, value)| (placeholder_name(&key), value))
                .collect(),
        )
    }
}

/// Positional bindings from a list of convertible values.
#[macro_export]
macro_rules! params {
    () => {
        $crate::Bindings::Positional(::std::vec::Vec::new())
    };
    ($($value:expr),+ $(,)?) => {
        ::std::iter::IntoIterator::into_iter(::std::vec![
            $($crate::ToSqliteValue::try_to_sqlite_value(&$value)),+
        ])
        .collect::<$crate::Bindings>()
    };
}

/// Named bindings from `key => value` pairs; keys may omit the leading `:`.
#[macro_export]
macro_rules! named_params {
    () => {
        $crate::Bindings::Named(::std::vec::Vec::new())
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        ::std::iter::IntoIterator::into_iter(::std::vec![
            $(($key, $crate::ToSqliteValue::try_to_sqlite_value(&$value))),+
        ])
        .collect::<$crate::Bindings>()
    };
}
