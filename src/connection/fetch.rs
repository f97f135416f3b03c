use crate::conversion::FromSqliteValue;
use crate::error::Result;
use crate::params::Bindings;
use crate::results::{FromRow, Row};

use super::Connection;

/// One-shot fetch helpers; each prepares `sql`, runs it once and materializes the result.
impl Connection {
    /// # Errors
    /// See [`Statement::fetch_rows`](crate::Statement::fetch_rows).
    pub fn fetch_rows(&self, sql: &str, bindings: impl Into<Bindings>) -> Result<Vec<Row>> {
        self.prepare(sql)?.fetch_rows(bindings)
    }

    /// # Errors
    /// See [`Statement::fetch_row`](crate::Statement::fetch_row).
    pub fn fetch_row(&self, sql: &str, bindings: impl Into<Bindings>) -> Result<Option<Row>> {
        self.prepare(sql)?.fetch_row(bindings)
    }

    /// # Errors
    /// See [`Statement::fetch_all`](crate::Statement::fetch_all).
    pub fn fetch_all<T: FromRow>(&self, sql: &str, bindings: impl Into<Bindings>) -> Result<Vec<T>> {
        self.prepare(sql)?.fetch_all(bindings)
    }

    /// # Errors
    /// See [`Statement::fetch_one`](crate::Statement::fetch_one).
    pub fn fetch_one<T: FromRow>(
        &self,
        sql: &str,
        bindings: impl Into<Bindings>,
    ) -> Result<Option<T>> {
        self.prepare(sql)?.fetch_one(bindings)
    }

    /// # Errors
    /// See [`Statement::fetch_values`](crate::Statement::fetch_values).
    pub fn fetch_values<T: FromSqliteValue>(
        &self,
        sql: &str,
        bindings: impl Into<Bindings>,
    ) -> Result<Vec<T>> {
        self.prepare(sql)?.fetch_values(bindings)
    }

    /// Leftmost column of the first row; `None` for no row and for NULL alike.
    ///
    /// # Errors
    /// See [`Statement::fetch_value`](crate::Statement::fetch_value).
    pub fn fetch_value<T: FromSqliteValue>(
        &self,
        sql: &str,
        bindings: impl Into<Bindings>,
    ) -> Result<Option<T>> {
        self.prepare(sql)?.fetch_value(bindings)
    }
}
