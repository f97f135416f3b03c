use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::connection::Connection;
use crate::conversion::FromSqliteValue;
use crate::error::{Result, SqliteAccessError};
use crate::params::Bindings;
use crate::results::{FromRow, Row, RowCursor};

/// The placeholder form a statement was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlaceholderStyle {
    None,
    /// `?` or `?NNN`
    Positional,
    /// `:name`, `@name` or `$name`
    Named,
}

/// Classify a statement from the names SQLite reports for its parameters (`None` for bare `?`).
pub(crate) fn classify_placeholders<'a, I>(names: I) -> Result<PlaceholderStyle, String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut style = PlaceholderStyle::None;
    for name in names {
        let this = match name {
            None => PlaceholderStyle::Positional,
            Some(name) if name.starts_with('?') => PlaceholderStyle::Positional,
            Some(_) => PlaceholderStyle::Named,
        };
        match style {
            PlaceholderStyle::None => style = this,
            current if current != this => {
                return Err("positional and named placeholders are mixed".into());
            }
            _ => {}
        }
    }
    Ok(style)
}

/// A prepared statement owned by the connection that compiled it.
///
/// Every execution rebinds all parameters, and starting a new execution resets the previous
/// cursor. Because the statement borrows its connection it cannot escape the access that
/// prepared it.
pub struct Statement<'conn> {
    raw: rusqlite::Statement<'conn>,
    conn: &'conn Connection,
    sql: String,
    style: PlaceholderStyle,
    columns: Arc<Vec<String>>,
}

impl<'conn> Statement<'conn> {
    pub(crate) fn new(
        raw: rusqlite::Statement<'conn>,
        conn: &'conn Connection,
        sql: &str,
    ) -> Result<Self> {
        if conn.is_read_only_access() && !raw.readonly() {
            return Err(SqliteAccessError::misuse(format!(
                "attempt to write in a read-only access: `{sql}`"
            )));
        }
        let names = (1..=raw.parameter_count()).map(|index| raw.parameter_name(index));
        let style = classify_placeholders(names)
            .map_err(|message| SqliteAccessError::misuse(format!("{message} in `{sql}`")))?;
        let columns = raw.column_names().into_iter().map(str::to_owned).collect();
        Ok(Self {
            raw,
            conn,
            sql: sql.to_owned(),
            style,
            columns: Arc::new(columns),
        })
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Whether SQLite reports the statement as not writing to the database.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.raw.readonly()
    }

    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.raw.parameter_count()
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Run the statement to completion and return the number of rows changed by the most recent
    /// `INSERT`, `UPDATE` or `DELETE`.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError::Misuse`] for bindings that do not fit the placeholders, and
    /// [`SqliteAccessError::Database`] for engine failures.
    pub fn execute(&mut self, bindings: impl Into<Bindings>) -> Result<usize> {
        self.bind(bindings.into())?;
        self.conn.trace_statement(&self.sql);
        let mut rows = self.raw.raw_query();
        loop {
            match rows.next() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(err) => return Err(self.conn.report(err, &self.sql)),
            }
        }
        Ok(self.conn.changes())
    }

    /// Start a lazy execution.
    ///
    /// # Errors
    /// Returns [`SqliteAccessError::Misuse`] for bindings that do not fit the placeholders.
    pub fn cursor(&mut self, bindings: impl Into<Bindings>) -> Result<RowCursor<'_>> {
        self.bind(bindings.into())?;
        self.conn.trace_statement(&self.sql);
        Ok(RowCursor::new(
            self.raw.raw_query(),
            Arc::clone(&self.columns),
            self.conn,
            &self.sql,
        ))
    }

    /// # Errors
    /// Returns binding misuse and engine errors.
    pub fn fetch_rows(&mut self, bindings: impl Into<Bindings>) -> Result<Vec<Row>> {
        self.cursor(bindings)?.collect()
    }

    /// # Errors
    /// Returns binding misuse and engine errors.
    pub fn fetch_row(&mut self, bindings: impl Into<Bindings>) -> Result<Option<Row>> {
        self.cursor(bindings)?.next_row()
    }

    /// Decode every row.
    ///
    /// # Errors
    /// Returns binding misuse, engine errors, and decoding failures.
    pub fn fetch_all<T: FromRow>(&mut self, bindings: impl Into<Bindings>) -> Result<Vec<T>> {
        let mut cursor = self.cursor(bindings)?;
        let mut decoded = Vec::new();
        while let Some(row) = cursor.next_row()? {
            decoded.push(T::from_row(&row)?);
        }
        Ok(decoded)
    }

    /// Decode the first row, if any.
    ///
    /// # Errors
    /// Returns binding misuse, engine errors, and decoding failures.
    pub fn fetch_one<T: FromRow>(&mut self, bindings: impl Into<Bindings>) -> Result<Option<T>> {
        self.cursor(bindings)?.next_as()
    }

    /// Decode the leftmost column of every row.
    ///
    /// # Errors
    /// Returns binding misuse, engine errors, and decoding failures.
    pub fn fetch_values<T: FromSqliteValue>(
        &mut self,
        bindings: impl Into<Bindings>,
    ) -> Result<Vec<T>> {
        let mut cursor = self.cursor(bindings)?;
        let mut decoded = Vec::new();
        while let Some(row) = cursor.next_row()? {
            decoded.push(row.get::<T>(0)?);
        }
        Ok(decoded)
    }

    /// Decode the leftmost column of the first row.
    ///
    /// Returns `None` both when there is no row and when the first row holds NULL; callers that
    /// need to tell the two apart should use [`fetch_row`](Self::fetch_row).
    ///
    /// # Errors
    /// Returns binding misuse, engine errors, and decoding failures.
    pub fn fetch_value<T: FromSqliteValue>(
        &mut self,
        bindings: impl Into<Bindings>,
    ) -> Result<Option<T>> {
        let Some(row) = self.cursor(bindings)?.next_row()? else {
            return Ok(None);
        };
        match row.value(0) {
            None => Err(crate::error::ConversionError::ColumnIndexOutOfBounds(0).into()),
            Some(value) if value.is_null() => Ok(None),
            Some(value) => Ok(Some(T::from_sqlite_value(value)?)),
        }
    }

    fn bind(&mut self, bindings: Bindings) -> Result<()> {
        let expected = self.raw.parameter_count();
        match bindings {
            Bindings::Unencodable(err) => return Err(err.into()),
            Bindings::Positional(values) => {
                if self.style == PlaceholderStyle::Named && !values.is_empty() {
                    return Err(self.misuse("positional arguments given to named placeholders"));
                }
                if values.len() != expected {
                    return Err(self.misuse(&format!(
                        "statement expects {expected} arguments, {} given",
                        values.len()
                    )));
                }
                for (offset, value) in values.iter().enumerate() {
                    self.raw
                        .raw_bind_parameter(offset + 1, value)
                        .map_err(|err| self.conn.report(err, &self.sql))?;
                }
            }
            Bindings::Named(pairs) => {
                if self.style == PlaceholderStyle::Positional && !pairs.is_empty() {
                    return Err(self.misuse("named arguments given to positional placeholders"));
                }
                let mut bound = HashSet::with_capacity(pairs.len());
                for (name, value) in &pairs {
                    let index = self
                        .raw
                        .parameter_index(name)
                        .map_err(|err| self.conn.report(err, &self.sql))?
                        .ok_or_else(|| self.misuse(&format!("unknown named argument {name}")))?;
                    if !bound.insert(index) {
                        return Err(self.misuse(&format!("named argument {name} given twice")));
                    }
                    self.raw
                        .raw_bind_parameter(index, value)
                        .map_err(|err| self.conn.report(err, &self.sql))?;
                }
                if bound.len() != expected {
                    let missing: Vec<&str> = (1..=expected)
                        .filter(|index| !bound.contains(index))
                        .filter_map(|index| self.raw.parameter_name(index))
                        .collect();
                    return Err(self.misuse(&format!(
                        "missing named arguments {}",
                        missing.join(", ")
                    )));
                }
            }
        }
        Ok(())
    }

    fn misuse(&self, message: &str) -> SqliteAccessError {
        SqliteAccessError::misuse(format!("{message} in `{}`", self.sql))
    }
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("style", &self.style)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_placeholder_styles() {
        assert_eq!(
            classify_placeholders(std::iter::empty()).unwrap(),
            PlaceholderStyle::None
        );
        assert_eq!(
            classify_placeholders([None, Some("?2")]).unwrap(),
            PlaceholderStyle::Positional
        );
        assert_eq!(
            classify_placeholders([Some(":a"), Some("@b"), Some("$c")]).unwrap(),
            PlaceholderStyle::Named
        );
    }

    #[test]
    fn rejects_mixed_placeholders() {
        assert!(classify_placeholders([None, Some(":name")]).is_err());
        assert!(classify_placeholders([Some(":name"), Some("?1")]).is_err());
    }
}
