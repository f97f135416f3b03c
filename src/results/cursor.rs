use std::sync::Arc;

use crate::connection::Connection;
use crate::error::Result;
use crate::types::SqliteValue;

use super::{FromRow, Row};

/// Lazily stepped rows of one statement execution.
///
/// The cursor borrows the statement, and through it the connection, so it cannot outlive the
/// access that produced it. Rows it yields are owned copies; collect them to keep results after
/// the access ends.
pub struct RowCursor<'stmt> {
    rows: rusqlite::Rows<'stmt>,
    columns: Arc<Vec<String>>,
    conn: &'stmt Connection,
    sql: &'stmt str,
    done: bool,
}

impl<'stmt> RowCursor<'stmt> {
    pub(crate) fn new(
        rows: rusqlite::Rows<'stmt>,
        columns: Arc<Vec<String>>,
        conn: &'stmt Connection,
        sql: &'stmt str,
    ) -> Self {
        Self {
            rows,
            columns,
            conn,
            sql,
            done: false,
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Step to the next row.
    ///
    /// # Errors
    /// Returns the engine error raised while stepping, or a conversion error for TEXT that is
    /// not valid UTF-8; the cursor is exhausted afterwards.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        match self.rows.next() {
            Ok(Some(row)) => {
                let (conn, sql) = (self.conn, self.sql);
                let values = (0..self.columns.len())
                    .map(|index| -> Result<SqliteValue> {
                        let value = row.get_ref(index).map_err(|err| conn.report(err, sql))?;
                        Ok(SqliteValue::from_value_ref(value)?)
                    })
                    .collect::<Result<Vec<_>>>();
                match values {
                    Ok(values) => Ok(Some(Row::new(Arc::clone(&self.columns), values))),
                    Err(err) => {
                        self.done = true;
                        Err(err)
                    }
                }
            }
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(err) => {
                self.done = true;
                Err(self.conn.report(err, self.sql))
            }
        }
    }

    /// Step to the next row and decode it.
    ///
    /// # Errors
    /// Returns engine errors and decoding failures.
    pub fn next_as<T: FromRow>(&mut self) -> Result<Option<T>> {
        self.next_row()?.map(|row| T::from_row(&row)).transpose()
    }

    /// Drain the remaining rows into owned values.
    ///
    /// # Errors
    /// Returns the first engine error raised while stepping.
    pub fn collect_rows(self) -> Result<Vec<Row>> {
        self.collect()
    }
}

impl Iterator for RowCursor<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}
