#![allow(dead_code)]

use rowscope_core::{
    unknown_field, value_as, DataAccessConfig, Entity, FieldDescriptor, LoadDirective, RepoResult,
    Repository, Scope, ScopeManager, StaticConnectionString,
};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use tempfile::TempDir;

const SCHEMA: &str = "
CREATE TABLE customers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT,
    created_at TEXT NOT NULL
);
CREATE TABLE orders (
    id INTEGER PRIMARY KEY,
    customer_id INTEGER NOT NULL REFERENCES customers(id),
    status TEXT NOT NULL,
    total_cents INTEGER NOT NULL
);
CREATE TABLE order_lines (
    order_id TEXT NOT NULL,
    line_no INTEGER NOT NULL,
    sku TEXT NOT NULL,
    qty INTEGER NOT NULL,
    PRIMARY KEY (order_id, line_no)
);
CREATE TABLE ledger_entries (
    id INTEGER NOT NULL,
    memo TEXT NOT NULL
);
";

/// File-backed database; every scope opens its own connection to it.
pub struct TestDb {
    _dir: TempDir,
    path: String,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rowscope.db").to_str().unwrap().to_string();
        Connection::open(&path).unwrap().execute_batch(SCHEMA).unwrap();
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn scopes(&self) -> ScopeManager {
        ScopeManager::new(
            StaticConnectionString::new(self.path.as_str()),
            DataAccessConfig::default(),
        )
    }

    pub fn repo<E: Entity>(&self) -> Repository<E> {
        Repository::new(self.scopes()).unwrap()
    }

    /// Row count read outside any scope.
    pub fn count(&self, table: &str) -> i64 {
        Connection::open(&self.path)
            .unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub created_at: String,
    pub orders: Vec<Order>,
}

impl Customer {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: None,
            created_at: "2024-01-01".to_string(),
            orders: Vec::new(),
        }
    }
}

impl Entity for Customer {
    const TABLE: &'static str = "customers";
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::key("id"),
        FieldDescriptor::scalar("name"),
        FieldDescriptor::scalar("email"),
        FieldDescriptor::scalar("created_at"),
        FieldDescriptor::relationship("orders"),
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            created_at: row.get("created_at")?,
            orders: Vec::new(),
        })
    }

    fn field_value(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::Integer(self.id)),
            "name" => Some(Value::Text(self.name.clone())),
            "email" => Some(match &self.email {
                Some(email) => Value::Text(email.clone()),
                None => Value::Null,
            }),
            "created_at" => Some(Value::Text(self.created_at.clone())),
            _ => None,
        }
    }

    fn set_field_value(&mut self, field: &str, value: Value) -> RepoResult<()> {
        match field {
            "id" => self.id = value_as(field, &value)?,
            "name" => self.name = value_as(field, &value)?,
            "email" => self.email = value_as(field, &value)?,
            "created_at" => self.created_at = value_as(field, &value)?,
            _ => return Err(unknown_field::<Self>(field)),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("customer name cannot be blank".to_string());
        }
        Ok(())
    }

    fn load_related(&mut self, directive: &LoadDirective, scope: &Scope) -> RepoResult<()> {
        if directive.field() != "orders" {
            return Err(rowscope_core::RepoError::UnknownRelationship {
                entity: Self::TABLE,
                field: directive.field().to_string(),
            });
        }
        let mut params = vec![Value::Integer(self.id)];
        let mut sql = "SELECT id, customer_id, status, total_cents FROM orders WHERE customer_id = ?"
            .to_string();
        if let Some(filter) = directive.filter() {
            let condition = filter.to_sql(&mut params);
            sql.push_str(&format!(" AND ({condition})"));
        }
        sql.push_str(" ORDER BY id");
        let mut stmt = scope.connection().prepare(&sql)?;
        let orders = stmt
            .query_map(params_from_iter(params), Order::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        self.orders = orders;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub status: String,
    pub total_cents: i64,
}

impl Order {
    pub fn new(id: i64, customer_id: i64, status: &str, total_cents: i64) -> Self {
        Self {
            id,
            customer_id,
            status: status.to_string(),
            total_cents,
        }
    }
}

impl Entity for Order {
    const TABLE: &'static str = "orders";
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::key("id"),
        FieldDescriptor::scalar("customer_id"),
        FieldDescriptor::scalar("status"),
        FieldDescriptor::scalar("total_cents"),
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            customer_id: row.get("customer_id")?,
            status: row.get("status")?,
            total_cents: row.get("total_cents")?,
        })
    }

    fn field_value(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::Integer(self.id)),
            "customer_id" => Some(Value::Integer(self.customer_id)),
            "status" => Some(Value::Text(self.status.clone())),
            "total_cents" => Some(Value::Integer(self.total_cents)),
            _ => None,
        }
    }

    fn set_field_value(&mut self, field: &str, value: Value) -> RepoResult<()> {
        match field {
            "id" => self.id = value_as(field, &value)?,
            "customer_id" => self.customer_id = value_as(field, &value)?,
            "status" => self.status = value_as(field, &value)?,
            "total_cents" => self.total_cents = value_as(field, &value)?,
            _ => return Err(unknown_field::<Self>(field)),
        }
        Ok(())
    }
}

/// Entity with a two-column key; `line_no` is declared after `order_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub order_id: String,
    pub line_no: i64,
    pub sku: String,
    pub qty: i64,
}

impl OrderLine {
    pub fn new(order_id: &str, line_no: i64, sku: &str, qty: i64) -> Self {
        Self {
            order_id: order_id.to_string(),
            line_no,
            sku: sku.to_string(),
            qty,
        }
    }
}

impl Entity for OrderLine {
    const TABLE: &'static str = "order_lines";
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::key("order_id"),
        FieldDescriptor::key("line_no"),
        FieldDescriptor::scalar("sku"),
        FieldDescriptor::scalar("qty"),
    ];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            order_id: row.get("order_id")?,
            line_no: row.get("line_no")?,
            sku: row.get("sku")?,
            qty: row.get("qty")?,
        })
    }

    fn field_value(&self, field: &str) -> Option<Value> {
        match field {
            "order_id" => Some(Value::Text(self.order_id.clone())),
            "line_no" => Some(Value::Integer(self.line_no)),
            "sku" => Some(Value::Text(self.sku.clone())),
            "qty" => Some(Value::Integer(self.qty)),
            _ => None,
        }
    }

    fn set_field_value(&mut self, field: &str, value: Value) -> RepoResult<()> {
        match field {
            "order_id" => self.order_id = value_as(field, &value)?,
            "line_no" => self.line_no = value_as(field, &value)?,
            "sku" => self.sku = value_as(field, &value)?,
            "qty" => self.qty = value_as(field, &value)?,
            _ => return Err(unknown_field::<Self>(field)),
        }
        Ok(())
    }
}

/// Mapped with `id` as key, but the table enforces no uniqueness.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub id: i64,
    pub memo: String,
}

impl LedgerEntry {
    pub fn new(id: i64, memo: &str) -> Self {
        Self {
            id,
            memo: memo.to_string(),
        }
    }
}

impl Entity for LedgerEntry {
    const TABLE: &'static str = "ledger_entries";
    const FIELDS: &'static [FieldDescriptor] =
        &[FieldDescriptor::key("id"), FieldDescriptor::scalar("memo")];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            memo: row.get("memo")?,
        })
    }

    fn field_value(&self, field: &str) -> Option<Value> {
        match field {
            "id" => Some(Value::Integer(self.id)),
            "memo" => Some(Value::Text(self.memo.clone())),
            _ => None,
        }
    }

    fn set_field_value(&mut self, field: &str, value: Value) -> RepoResult<()> {
        match field {
            "id" => self.id = value_as(field, &value)?,
            "memo" => self.memo = value_as(field, &value)?,
            _ => return Err(unknown_field::<Self>(field)),
        }
        Ok(())
    }
}
