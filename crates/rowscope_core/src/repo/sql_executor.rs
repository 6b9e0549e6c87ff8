//! Raw-SQL execution inside scopes.
//!
//! # Responsibility
//! - Run caller-written statements through `ScopeManager::with_scope`.
//! - Materialize results as typed values, mapped rows or dynamic tables.
//!
//! # Invariants
//! - A blank query is rejected before any connection is opened.
//! - Rows are mapped while the scope is open; no reader escapes it.
//! - Single statements bind parameters strictly: every placeholder must be
//!   supplied and every supplied parameter must match a placeholder.
//! - Batches bind leniently: each statement takes the parameters it names.

use crate::repo::error::{fail_if, RepoError, RepoResult};
use crate::scope::{Scope, ScopeManager};
use log::debug;
use rusqlite::types::{FromSql, Value};
use rusqlite::{Batch, Row, Statement};
use std::fmt::{Display, Formatter};

/// Parameters bound to a raw statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SqlParams {
    #[default]
    None,
    /// Bound to `?`/`?N` placeholders in order.
    Positional(Vec<Value>),
    /// Bound by name; a missing `:` prefix is added.
    Named(Vec<(String, Value)>),
}

impl SqlParams {
    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self::Positional(values.into_iter().collect())
    }

    pub fn named<N: Into<String>>(pairs: impl IntoIterator<Item = (N, Value)>) -> Self {
        Self::Named(pairs.into_iter().map(|(name, value)| (name.into(), value)).collect())
    }

    fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Positional(values) => values.len(),
            Self::Named(pairs) => pairs.len(),
        }
    }
}

/// Column names plus rows of dynamic values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl DataTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name`, ignoring ASCII case.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }
}

/// Tab-separated header line followed by one line per row.
impl Display for DataTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let cells = row.iter().map(render_cell).collect::<Vec<_>>();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        Ok(())
    }
}

/// One `DataTable` per result-producing statement, in statement order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSet {
    tables: Vec<DataTable>,
}

impl DataSet {
    pub fn tables(&self) -> &[DataTable] {
        &self.tables
    }

    pub fn into_tables(self) -> Vec<DataTable> {
        self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Executes caller-written SQL in scopes from a `ScopeManager`.
#[derive(Debug, Clone)]
pub struct SqlExecutor {
    scopes: ScopeManager,
}

impl SqlExecutor {
    pub fn new(scopes: ScopeManager) -> Self {
        Self { scopes }
    }

    pub fn scopes(&self) -> &ScopeManager {
        &self.scopes
    }

    /// Runs one statement and returns the affected row count.
    ///
    /// Pending entity writes in the scope are submitted after it succeeds.
    pub fn execute_non_query(&self, sql: &str, params: &SqlParams, scope: Option<&Scope>) -> RepoResult<usize> {
        ensure_query(sql)?;
        self.scopes.with_scope(scope, true, |scope| {
            let mut stmt = scope.connection().prepare(sql)?;
            bind_params(&mut stmt, params, true)?;
            let affected = stmt.raw_execute()?;
            debug!(
                "event=sql_non_query module=repo status=ok scope_id={} affected={}",
                scope.id(),
                affected
            );
            Ok(affected)
        })
    }

    /// First column of the first row; `None` for no rows or `NULL`.
    pub fn execute_scalar<T: FromSql>(&self, sql: &str, params: &SqlParams, scope: Option<&Scope>) -> RepoResult<Option<T>> {
        ensure_query(sql)?;
        self.scopes.with_scope(scope, false, |scope| {
            let mut stmt = scope.connection().prepare(sql)?;
            bind_params(&mut stmt, params, true)?;
            let mut rows = stmt.raw_query();
            match rows.next()? {
                Some(row) => Ok(row.get::<_, Option<T>>(0)?),
                None => Ok(None),
            }
        })
    }

    /// Maps every row with `map_row` while the scope is open.
    pub fn execute_reader<T, F>(&self, sql: &str, params: &SqlParams, mut map_row: F, scope: Option<&Scope>) -> RepoResult<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        ensure_query(sql)?;
        self.scopes.with_scope(scope, false, |scope| {
            let mut stmt = scope.connection().prepare(sql)?;
            bind_params(&mut stmt, params, true)?;
            let mut rows = stmt.raw_query();
            let mut mapped = Vec::new();
            while let Some(row) = rows.next()? {
                mapped.push(map_row(row)?);
            }
            Ok(mapped)
        })
    }

    /// Materializes one statement's result as a `DataTable`.
    pub fn execute_data_table(&self, sql: &str, params: &SqlParams, scope: Option<&Scope>) -> RepoResult<DataTable> {
        ensure_query(sql)?;
        self.scopes.with_scope(scope, false, |scope| {
            let mut stmt = scope.connection().prepare(sql)?;
            bind_params(&mut stmt, params, true)?;
            let table = read_table(&mut stmt)?;
            debug!(
                "event=sql_data_table module=repo status=ok scope_id={} rows={}",
                scope.id(),
                table.len()
            );
            Ok(table)
        })
    }

    /// Runs every statement in `sql`; each one that yields columns adds a table.
    pub fn execute_data_set(&self, sql: &str, params: &SqlParams, scope: Option<&Scope>) -> RepoResult<DataSet> {
        ensure_query(sql)?;
        self.scopes.with_scope(scope, false, |scope| {
            let mut batch = Batch::new(scope.connection(), sql);
            let mut tables = Vec::new();
            while let Some(mut stmt) = batch.next()? {
                bind_params(&mut stmt, params, false)?;
                if stmt.column_count() > 0 {
                    tables.push(read_table(&mut stmt)?);
                } else {
                    stmt.raw_execute()?;
                }
            }
            debug!(
                "event=sql_data_set module=repo status=ok scope_id={} tables={}",
                scope.id(),
                tables.len()
            );
            Ok(DataSet { tables })
        })
    }
}

fn ensure_query(sql: &str) -> RepoResult<()> {
    fail_if(sql.trim().is_empty(), "parameter `sql` cannot be empty")
}

fn read_table(stmt: &mut Statement<'_>) -> RepoResult<DataTable> {
    let columns = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let width = columns.len();
    let mut rows = stmt.raw_query();
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(width);
        for index in 0..width {
            cells.push(row.get::<_, Value>(index)?);
        }
        values.push(cells);
    }
    Ok(DataTable {
        columns,
        rows: values,
    })
}

fn bind_params(stmt: &mut Statement<'_>, params: &SqlParams, strict: bool) -> RepoResult<()> {
    let expected = stmt.parameter_count();
    if strict && params.len() != expected {
        return Err(RepoError::Validation(format!(
            "statement has {expected} parameters, {} supplied",
            params.len()
        )));
    }
    match params {
        SqlParams::None => {}
        SqlParams::Positional(values) => {
            for (index, value) in values.iter().take(expected).enumerate() {
                stmt.raw_bind_parameter(index + 1, value)?;
            }
        }
        SqlParams::Named(pairs) => {
            for (name, value) in pairs {
                let name = parameter_name(name);
                match stmt.parameter_index(&name)? {
                    Some(index) => stmt.raw_bind_parameter(index, value)?,
                    None if strict => {
                        return Err(RepoError::Validation(format!(
                            "statement has no parameter named `{name}`"
                        )))
                    }
                    None => {}
                }
            }
        }
    }
    Ok(())
}

fn parameter_name(name: &str) -> String {
    if name.starts_with([':', '@', '$']) {
        name.to_string()
    } else {
        format!(":{name}")
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => text.clone(),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::{bind_params, parameter_name, DataTable, SqlParams};
    use crate::repo::error::RepoError;
    use rusqlite::types::Value;
    use rusqlite::Connection;

    #[test]
    fn parameter_names_gain_colon_prefix() {
        assert_eq!(parameter_name("id"), ":id");
        assert_eq!(parameter_name(":id"), ":id");
        assert_eq!(parameter_name("@id"), "@id");
    }

    #[test]
    fn strict_binding_rejects_count_mismatch_and_unknown_names() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT :a + :b").unwrap();

        let short = SqlParams::named([("a", Value::Integer(1))]);
        let err = bind_params(&mut stmt, &short, true).unwrap_err();
        assert!(matches!(err, RepoError::Validation(message) if message.contains("2 parameters")));

        let unknown = SqlParams::named([("a", Value::Integer(1)), ("c", Value::Integer(2))]);
        let err = bind_params(&mut stmt, &unknown, true).unwrap_err();
        assert!(matches!(err, RepoError::Validation(message) if message.contains(":c")));
    }

    #[test]
    fn lenient_binding_ignores_extra_parameters() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT ?").unwrap();
        let params = SqlParams::positional([Value::Integer(7), Value::Integer(8)]);
        bind_params(&mut stmt, &params, false).unwrap();
        let mut rows = stmt.raw_query();
        let row = rows.next().unwrap().unwrap();
        assert_eq!(row.get::<_, i64>(0).unwrap(), 7);
    }

    #[test]
    fn table_display_is_tab_separated() {
        let table = DataTable {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![vec![Value::Integer(1), Value::Null]],
        };
        assert_eq!(table.to_string(), "id\tname\n1\tNULL\n");
        assert_eq!(table.value(0, "ID"), Some(&Value::Integer(1)));
    }
}
