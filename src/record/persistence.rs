use std::any::type_name;

use crate::connection::Connection;
use crate::error::{Result, SqliteAccessError};
use crate::params::Bindings;
use crate::types::SqliteValue;

use super::{ColumnValues, PrimaryKey, Record};

/// Persistence operations derived from a [`Record`] declaration.
///
/// `update`, `delete` and `reload` report a missing row as [`SqliteAccessError::RowNotFound`],
/// judged from the changed row count of the statement itself.
pub trait Persistable: Record {
    /// Insert the record; a row id key left unset is filled in from SQLite afterwards.
    ///
    /// # Errors
    /// Returns `UnspecifiedTable`, or the engine error (e.g. a constraint violation).
    fn insert(&mut self, db: &Connection) -> Result<()> {
        let table = table_of::<Self>()?;
        let values = encode(self)?;
        let key = Self::primary_key();
        let columns: Vec<(&str, &SqliteValue)> = values
            .iter()
            .filter(|(column, value)| {
                !(value.is_null() && matches!(key, PrimaryKey::RowId(id) if id.eq_ignore_ascii_case(column)))
            })
            .collect();
        let sql = insert_sql(table, columns.iter().map(|(column, _)| *column));
        let bindings = Bindings::Positional(columns.iter().map(|(_, value)| (*value).clone()).collect());
        db.execute(&sql, bindings)?;
        self.did_insert(db.last_insert_rowid());
        Ok(())
    }

    /// Write every non-key column to the row matching the key.
    ///
    /// # Errors
    /// Returns `UnspecifiedTable`, `InvalidPrimaryKey` for an unset key, `RowNotFound`, or the
    /// engine error.
    fn update(&self, db: &Connection) -> Result<()> {
        let table = table_of::<Self>()?;
        let values = encode(self)?;
        let key = key_values::<Self>(table, &values)?;
        let assignments: Vec<(&str, &SqliteValue)> = values
            .iter()
            .filter(|(column, _)| !key.iter().any(|(k, _)| k.eq_ignore_ascii_case(column)))
            .collect();
        if assignments.is_empty() {
            return if row_exists(db, table, &key)? {
                Ok(())
            } else {
                Err(row_not_found(table, &key))
            };
        }
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_identifier(table),
            assignments
                .iter()
                .map(|(column, _)| format!("{} = ?", quote_identifier(column)))
                .collect::<Vec<_>>()
                .join(", "),
            key_predicate(&key)
        );
        let mut bound: Vec<SqliteValue> = assignments.iter().map(|(_, v)| (*v).clone()).collect();
        bound.extend(key.iter().map(|(_, v)| v.clone()));
        if db.execute(&sql, bound)? == 0 {
            return Err(row_not_found(table, &key));
        }
        Ok(())
    }

    /// Insert when the key is unset, update otherwise; a caller-managed key whose row is missing
    /// is inserted.
    ///
    /// # Errors
    /// Same as [`insert`](Self::insert) and [`update`](Self::update).
    fn save(&mut self, db: &Connection) -> Result<()> {
        let key = Self::primary_key();
        if key.columns().is_empty() || key_is_unset(&encode(self)?, key.columns()) {
            return self.insert(db);
        }
        match self.update(db) {
            Err(SqliteAccessError::RowNotFound { .. }) => self.insert(db),
            other => other,
        }
    }

    /// # Errors
    /// Returns `UnspecifiedTable`, `InvalidPrimaryKey`, `RowNotFound`, or the engine error.
    fn delete(&self, db: &Connection) -> Result<()> {
        let table = table_of::<Self>()?;
        let key = key_values::<Self>(table, &encode(self)?)?;
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            quote_identifier(table),
            key_predicate(&key)
        );
        let bound: Vec<SqliteValue> = key.iter().map(|(_, v)| v.clone()).collect();
        if db.execute(&sql, bound)? == 0 {
            return Err(row_not_found(table, &key));
        }
        Ok(())
    }

    /// Replace the in-memory record with the stored row.
    ///
    /// # Errors
    /// Returns `UnspecifiedTable`, `InvalidPrimaryKey`, `RowNotFound`, or decoding failures.
    fn reload(&mut self, db: &Connection) -> Result<()> {
        let table = table_of::<Self>()?;
        let key = key_values::<Self>(table, &encode(self)?)?;
        let sql = format!(
            "SELECT * FROM {} WHERE {}",
            quote_identifier(table),
            key_predicate(&key)
        );
        let bound: Vec<SqliteValue> = key.iter().map(|(_, v)| v.clone()).collect();
        match db.fetch_one::<Self>(&sql, bound)? {
            Some(stored) => {
                *self = stored;
                Ok(())
            }
            None => Err(row_not_found(table, &key)),
        }
    }

    /// Whether a row matches the key; `false` when the key is unset.
    ///
    /// # Errors
    /// Returns `UnspecifiedTable`, `InvalidPrimaryKey` when no key is declared, or the engine
    /// error.
    fn exists(&self, db: &Connection) -> Result<bool> {
        let table = table_of::<Self>()?;
        let values = encode(self)?;
        let declared = Self::primary_key();
        if declared.columns().is_empty() {
            return Err(SqliteAccessError::InvalidPrimaryKey(table.to_owned()));
        }
        if key_is_unset(&values, declared.columns()) {
            return Ok(false);
        }
        let key = key_values::<Self>(table, &values)?;
        row_exists(db, table, &key)
    }

    /// Fetch the record whose key columns equal `key`, in key declaration order.
    ///
    /// # Errors
    /// Returns `UnspecifiedTable`, `InvalidPrimaryKey` when no key is declared, `Misuse` for a
    /// key of the wrong length, or decoding failures.
    fn find(db: &Connection, key: &[SqliteValue]) -> Result<Option<Self>> {
        let table = table_of::<Self>()?;
        let declared = Self::primary_key();
        let columns = declared.columns();
        if columns.is_empty() {
            return Err(SqliteAccessError::InvalidPrimaryKey(table.to_owned()));
        }
        if columns.len() != key.len() {
            return Err(SqliteAccessError::misuse(format!(
                "table {table} has {} key columns, {} values given",
                columns.len(),
                key.len()
            )));
        }
        let pairs: Vec<(&'static str, SqliteValue)> =
            columns.iter().copied().zip(key.iter().cloned()).collect();
        let sql = format!(
            "SELECT * FROM {} WHERE {}",
            quote_identifier(table),
            key_predicate(&pairs)
        );
        db.fetch_one(&sql, key.to_vec())
    }

    /// # Errors
    /// Returns `UnspecifiedTable` or decoding failures.
    fn fetch_all_records(db: &Connection) -> Result<Vec<Self>> {
        let table = table_of::<Self>()?;
        db.fetch_all(&format!("SELECT * FROM {}", quote_identifier(table)), ())
    }

    /// Delete every row of the table, returning how many were deleted.
    ///
    /// # Errors
    /// Returns `UnspecifiedTable` or the engine error.
    fn delete_all(db: &Connection) -> Result<usize> {
        let table = table_of::<Self>()?;
        db.execute(&format!("DELETE FROM {}", quote_identifier(table)), ())
    }

    /// # Errors
    /// Returns `UnspecifiedTable` or the engine error.
    fn count(db: &Connection) -> Result<i64> {
        let table = table_of::<Self>()?;
        let count = db.fetch_value::<i64>(
            &format!("SELECT COUNT(*) FROM {}", quote_identifier(table)),
            (),
        )?;
        Ok(count.unwrap_or(0))
    }
}

impl<T: Record> Persistable for T {}

fn table_of<T: Record>() -> Result<&'static str> {
    T::table_name().ok_or(SqliteAccessError::UnspecifiedTable(type_name::<T>()))
}

fn encode<T: Record>(record: &T) -> Result<ColumnValues> {
    let mut values = ColumnValues::new();
    record.encode(&mut values);
    match values.failure() {
        Some(err) => Err(err.clone().into()),
        None => Ok(values),
    }
}

fn key_is_unset(values: &ColumnValues, columns: &[&str]) -> bool {
    columns
        .iter()
        .any(|column| values.get(column).is_none_or(SqliteValue::is_null))
}

/// Key columns with their current values; fails when no key is declared or a part is unset.
fn key_values<T: Record>(
    table: &str,
    values: &ColumnValues,
) -> Result<Vec<(&'static str, SqliteValue)>> {
    let declared = T::primary_key();
    let columns = declared.columns();
    if columns.is_empty() || key_is_unset(values, columns) {
        return Err(SqliteAccessError::InvalidPrimaryKey(table.to_owned()));
    }
    Ok(columns
        .iter()
        .map(|column| {
            let value = values.get(column).cloned().unwrap_or_default();
            (*column, value)
        })
        .collect())
}

fn row_exists(db: &Connection, table: &str, key: &[(&'static str, SqliteValue)]) -> Result<bool> {
    let sql = format!(
        "SELECT 1 FROM {} WHERE {} LIMIT 1",
        quote_identifier(table),
        key_predicate(key)
    );
    let bound: Vec<SqliteValue> = key.iter().map(|(_, v)| v.clone()).collect();
    Ok(db.fetch_value::<i64>(&sql, bound)?.is_some())
}

fn row_not_found(table: &str, key: &[(&'static str, SqliteValue)]) -> SqliteAccessError {
    SqliteAccessError::RowNotFound {
        table: table.to_owned(),
        key: key
            .iter()
            .map(|(column, value)| format!("{column} = {value}"))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn key_predicate(key: &[(&'static str, SqliteValue)]) -> String {
    key.iter()
        .map(|(column, _)| format!("{} = ?", quote_identifier(column)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn insert_sql<'a>(table: &str, columns: impl Iterator<Item = &'a str>) -> String {
    let columns: Vec<String> = columns.map(quote_identifier).collect();
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table));
    }
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        columns.join(", "),
        vec!["?"; columns.len()].join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_identifier("player"), "\"player\"");
        assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn insert_without_columns_uses_default_values() {
        assert_eq!(
            insert_sql("t", std::iter::empty()),
            "INSERT INTO \"t\" DEFAULT VALUES"
        );
        assert_eq!(
            insert_sql("t", ["a", "b"].into_iter()),
            "INSERT INTO \"t\" (\"a\", \"b\") VALUES (?, ?)"
        );
    }

    #[test]
    fn composite_keys_join_with_and() {
        let key = [
            ("a", SqliteValue::Integer(1)),
            ("b", SqliteValue::Text("x".into())),
        ];
        assert_eq!(key_predicate(&key), "\"a\" = ? AND \"b\" = ?");
        assert_eq!(
            row_not_found("t", &key).to_string(),
            "no row in t matches key a = 1, b = 'x'"
        );
    }
}
