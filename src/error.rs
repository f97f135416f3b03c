use std::fmt;

use thiserror::Error;

/// Primary result code used when the engine reports a failure without one.
pub(crate) const SQLITE_ERROR: i32 = 1;
pub(crate) const SQLITE_CONSTRAINT: i32 = 19;
pub(crate) const SQLITE_CONSTRAINT_FOREIGNKEY: i32 = 787;

/// Failure raised by the SQLite engine.
///
/// Carries enough context to rebuild a diagnostic: the primary result code, the extended result
/// code, the engine message when one was provided, and the SQL that was running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseError {
    /// Primary result code (`SQLITE_CONSTRAINT`, `SQLITE_BUSY`, ...).
    pub code: i32,
    /// Extended result code (`SQLITE_CONSTRAINT_UNIQUE`, ...).
    pub extended_code: i32,
    pub message: Option<String>,
    pub sql: Option<String>,
}

impl DatabaseError {
    #[must_use]
    pub fn new(extended_code: i32, message: Option<String>) -> Self {
        Self {
            code: extended_code & 0xff,
            extended_code,
            message,
            sql: None,
        }
    }

    /// Attach the statement text, keeping an already recorded one.
    #[must_use]
    pub fn with_sql(mut self, sql: &str) -> Self {
        if self.sql.is_none() {
            self.sql = Some(sql.to_owned());
        }
        self
    }

    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        self.code == SQLITE_CONSTRAINT
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SQLite error {}", self.code)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(sql) = &self.sql {
            write!(f, " - while executing `{sql}`")?;
        }
        Ok(())
    }
}

impl std::error::Error for DatabaseError {}

/// Failure to convert between a stored value and a Rust type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("unexpected NULL while decoding {target}")]
    UnexpectedNull { target: &'static str },

    #[error("cannot decode {found} storage class as {target}")]
    Mismatch {
        found: &'static str,
        target: &'static str,
    },

    #[error("value {value} is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },

    #[error("{value} is not a valid raw value for {target}")]
    InvalidRawValue { value: String, target: &'static str },

    #[error("cannot encode {target} as a storage value: {message}")]
    Unencodable {
        target: &'static str,
        message: String,
    },

    #[error("cannot parse {target} from text: {message}")]
    Unparsable {
        target: &'static str,
        message: String,
    },

    #[error("no column at index {0}")]
    ColumnIndexOutOfBounds(usize),

    #[error("no column named {0}")]
    ColumnNotFound(String),
}

#[derive(Debug, Error)]
pub enum SqliteAccessError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Misuse: {0}")]
    Misuse(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("no table declared for record type {0}")]
    UnspecifiedTable(&'static str),

    #[error("invalid primary key for table {0}: the key is missing or unset")]
    InvalidPrimaryKey(String),

    #[error("no row in {table} matches key {key}")]
    RowNotFound { table: String, key: String },

    #[error("migration {name} failed: {source}")]
    Migration {
        name: String,
        #[source]
        source: Box<SqliteAccessError>,
    },

    #[error("database has applied migrations unknown to this migrator: {}", .0.join(", "))]
    MigrationHistoryMismatch(Vec<String>),

    #[error("database access closed")]
    Closed,

    #[error("all {capacity} reader connections are busy")]
    PoolExhausted { capacity: u32 },

    #[error(transparent)]
    Pool(#[from] r2d2::Error),

    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl SqliteAccessError {
    pub(crate) fn misuse(message: impl Into<String>) -> Self {
        Self::Misuse(message.into())
    }

    /// Engine error details, looking through a failed migration.
    #[must_use]
    pub fn database_error(&self) -> Option<&DatabaseError> {
        match self {
            Self::Database(err) => Some(err),
            Self::Migration { source, .. } => source.database_error(),
            _ => None,
        }
    }

    pub(crate) fn with_sql(self, sql: &str) -> Self {
        match self {
            Self::Database(err) => Self::Database(err.with_sql(sql)),
            other => other,
        }
    }
}

impl From<rusqlite::Error> for SqliteAccessError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                Self::Database(DatabaseError::new(failure.extended_code, message))
            }
            rusqlite::Error::SqlInputError { error, msg, .. } => {
                Self::Database(DatabaseError::new(error.extended_code, Some(msg)))
            }
            rusqlite::Error::InvalidParameterCount(given, expected) => Self::Misuse(format!(
                "statement expects {expected} arguments, {given} given"
            )),
            rusqlite::Error::InvalidParameterName(name) => {
                Self::Misuse(format!("unknown named argument {name}"))
            }
            rusqlite::Error::MultipleStatement => {
                Self::Misuse("multiple statements given where one was expected".into())
            }
            other => Self::Database(DatabaseError::new(SQLITE_ERROR, Some(other.to_string()))),
        }
    }
}

pub type Result<T, E = SqliteAccessError> = std::result::Result<T, E>;
