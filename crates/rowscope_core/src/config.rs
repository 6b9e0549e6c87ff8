//! Data-access configuration and connection-string providers.
//!
//! # Responsibility
//! - Describe how new scopes open connections and begin transactions.
//! - Hold the audit-field exclusion list consulted by partial updates.
//!
//! # Invariants
//! - Every field has a default, so partial config documents deserialize.
//! - Providers are asked once per newly created scope, never per statement.

use serde::{Deserialize, Serialize};

const DEFAULT_AUDIT_FIELDS: [&str; 3] = ["created_at", "created_by", "created_on"];

/// Supplies the connection string used when a scope opens a new connection.
///
/// Returning `None` is valid and delegates to driver defaults.
pub trait ConnectionStringProvider: Send + Sync {
    fn connection_string(&self) -> Option<String>;
}

/// Provider that always defers to driver defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullConnectionStringProvider;

impl ConnectionStringProvider for NullConnectionStringProvider {
    fn connection_string(&self) -> Option<String> {
        None
    }
}

/// Provider returning one fixed path or URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticConnectionString(String);

impl StaticConnectionString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl ConnectionStringProvider for StaticConnectionString {
    fn connection_string(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// SQLite `BEGIN` flavor used when a scope opens its transaction.
///
/// `Deferred` takes locks on first use, so scopes that only read never
/// block one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeginMode {
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

impl BeginMode {
    pub(crate) fn begin_sql(self) -> &'static str {
        match self {
            Self::Deferred => "BEGIN DEFERRED;",
            Self::Immediate => "BEGIN IMMEDIATE;",
            Self::Exclusive => "BEGIN EXCLUSIVE;",
        }
    }
}

/// Tunables shared by the scope manager and every repository built on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataAccessConfig {
    /// Field names never overwritten by partial updates (case-insensitive).
    pub audit_fields: Vec<String>,
    pub begin_mode: BeginMode,
    pub foreign_keys: bool,
    /// Lock-wait timeout; `None` keeps the driver's own behavior.
    pub busy_timeout_ms: Option<u64>,
}

impl Default for DataAccessConfig {
    fn default() -> Self {
        Self {
            audit_fields: DEFAULT_AUDIT_FIELDS
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            begin_mode: BeginMode::default(),
            foreign_keys: true,
            busy_timeout_ms: None,
        }
    }
}

impl DataAccessConfig {
    /// Returns whether `field` is on the audit exclusion list.
    pub fn is_audit_field(&self, field: &str) -> bool {
        self.audit_fields
            .iter()
            .any(|audit| audit.eq_ignore_ascii_case(field))
    }
}
