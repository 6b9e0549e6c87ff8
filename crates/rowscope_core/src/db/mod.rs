//! SQLite connection bootstrap for scoped data access.
//!
//! # Responsibility
//! - Open and configure SQLite connections from a connection string.
//! - Wrap driver failures in one transport-level error type.
//!
//! # Invariants
//! - This layer never owns application schema; tables are created by callers.
//! - Driver errors are propagated unchanged, never retried.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;

pub use open::{open_connection, IN_MEMORY_CONNECTION_STRING};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    InvalidConnectionString(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidConnectionString(message) => {
                write!(f, "invalid connection string: {message}")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::InvalidConnectionString(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
