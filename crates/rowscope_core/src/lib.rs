//! Scoped, generic data access for SQLite-backed entities.
//!
//! Repositories run every operation inside a `Scope`: one connection with an
//! open transaction that callers may share across operations.

pub mod config;
pub mod db;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod query;
pub mod repo;
pub mod scope;

pub use config::{
    BeginMode, ConnectionStringProvider, DataAccessConfig, NullConnectionStringProvider,
    StaticConnectionString,
};
pub use db::{DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use metadata::{EntityMetadata, SchemaError};
pub use model::entity::{unknown_field, value_as, Entity, FieldDescriptor, FieldRole};
pub use model::key::CompositeKey;
pub use query::{Filter, LoadDirective, LoadOptions, Predicate, Query, SortOrder};
pub use repo::entity_repo::Repository;
pub use repo::error::{RepoError, RepoResult};
pub use repo::field_copy::copy_scalar_fields;
pub use repo::paging::{PaginatedResult, UNBOUNDED_PAGE_SIZE};
pub use repo::sql_executor::{DataSet, DataTable, SqlExecutor, SqlParams};
pub use scope::{PendingChange, Scope, ScopeManager};

/// Minimal health-check API for linkage probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
