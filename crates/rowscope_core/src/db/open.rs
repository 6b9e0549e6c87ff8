//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Resolve a provider-supplied connection string into a live connection.
//! - Configure connection pragmas requested by `DataAccessConfig`.
//!
//! # Invariants
//! - An absent connection string opens a private in-memory database.
//! - A blank connection string is rejected before touching the driver.
//! - Lock-wait timeout keeps the driver's 5 s default unless configured.

use super::{DbError, DbResult};
use crate::config::DataAccessConfig;
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::time::{Duration, Instant};

/// Connection string understood by SQLite as "private in-memory database".
pub const IN_MEMORY_CONNECTION_STRING: &str = ":memory:";

/// Opens one SQLite connection for a new scope.
///
/// `connection_string` may be a file path, `:memory:` or a `file:` URI.
///
/// # Side effects
/// - Emits `db_open` logging events with mode, duration and status.
pub fn open_connection(
    connection_string: Option<&str>,
    config: &DataAccessConfig,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let target = match connection_string {
        Some(value) if value.trim().is_empty() => {
            error!(
                "event=db_open module=db status=error mode=unknown error_code=blank_connection_string"
            );
            return Err(DbError::InvalidConnectionString(
                "connection string cannot be blank".to_string(),
            ));
        }
        Some(value) => value.trim(),
        None => IN_MEMORY_CONNECTION_STRING,
    };
    let mode = open_mode(target);
    info!("event=db_open module=db status=start mode={mode}");

    let conn = match Connection::open_with_flags(target, OpenFlags::default()) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match configure_connection(&conn, config) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_configure_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn configure_connection(conn: &Connection, config: &DataAccessConfig) -> DbResult<()> {
    if config.foreign_keys {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    }
    if let Some(timeout_ms) = config.busy_timeout_ms {
        conn.busy_timeout(Duration::from_millis(timeout_ms))?;
    }
    Ok(())
}

fn open_mode(target: &str) -> &'static str {
    if target == IN_MEMORY_CONNECTION_STRING || target.contains("mode=memory") {
        "memory"
    } else if target.starts_with("file:") {
        "uri"
    } else {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::{open_connection, open_mode};
    use crate::config::DataAccessConfig;
    use crate::db::DbError;

    #[test]
    fn absent_connection_string_opens_in_memory_database() {
        let conn = open_connection(None, &DataAccessConfig::default()).unwrap();
        let foreign_keys: i64 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn blank_connection_string_is_rejected() {
        let err = open_connection(Some("   "), &DataAccessConfig::default()).unwrap_err();
        assert!(matches!(err, DbError::InvalidConnectionString(_)));
    }

    #[test]
    fn open_mode_classifies_targets() {
        assert_eq!(open_mode(":memory:"), "memory");
        assert_eq!(open_mode("file:shared?mode=memory&cache=shared"), "memory");
        assert_eq!(open_mode("file:/tmp/app.db"), "uri");
        assert_eq!(open_mode("/tmp/app.db"), "file");
    }
}
