//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `rowscope_core` linkage with deterministic output.
//! - Run one read-only query when given `<connection-string> <sql>`.
//!
//! # Invariants
//! - The query scope is always rolled back, so no statement can persist.

use rowscope_core::{
    DataTable, RepoResult, ScopeManager, SqlExecutor, SqlParams, StaticConnectionString,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("rowscope_core ping={}", rowscope_core::ping());
    println!("rowscope_core version={}", rowscope_core::core_version());

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    match args.as_slice() {
        [] => ExitCode::SUCCESS,
        [connection_string, sql] => match run_read_only(connection_string, sql) {
            Ok(table) => {
                print!("{table}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("query failed: {err}");
                ExitCode::FAILURE
            }
        },
        _ => {
            eprintln!("usage: rowscope [<connection-string> <sql>]");
            ExitCode::from(2)
        }
    }
}

fn run_read_only(connection_string: &str, sql: &str) -> RepoResult<DataTable> {
    let provider = StaticConnectionString::new(connection_string);
    let executor = SqlExecutor::new(ScopeManager::with_provider(provider));
    let scope = executor.scopes().begin_scope()?;
    let table = executor.execute_data_table(sql, &SqlParams::None, Some(&scope))?;
    scope.rollback()?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::run_read_only;
    use rowscope_core::{ScopeManager, SqlExecutor, SqlParams, StaticConnectionString};

    fn seeded_db(dir: &tempfile::TempDir) -> (String, SqlExecutor) {
        let path = dir.path().join("cli.db").to_str().unwrap().to_string();
        let executor = SqlExecutor::new(ScopeManager::with_provider(StaticConnectionString::new(
            path.as_str(),
        )));
        executor
            .execute_data_set(
                "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL);
                 INSERT INTO notes (id, body) VALUES (1, 'a'), (2, 'b');",
                &SqlParams::None,
                None,
            )
            .unwrap();
        (path, executor)
    }

    #[test]
    fn query_mode_returns_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _) = seeded_db(&dir);
        let table = run_read_only(&path, "SELECT body FROM notes ORDER BY id").unwrap();
        assert_eq!(table.columns(), &["body"]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn query_mode_discards_writes() {
        let dir = tempfile::tempdir().unwrap();
        let (path, executor) = seeded_db(&dir);

        run_read_only(&path, "DELETE FROM notes").unwrap();

        let remaining: Option<i64> = executor
            .execute_scalar("SELECT COUNT(*) FROM notes", &SqlParams::None, None)
            .unwrap();
        assert_eq!(remaining, Some(2));
    }
}
