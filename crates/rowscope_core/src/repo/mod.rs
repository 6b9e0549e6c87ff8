//! Repository layer over scoped SQLite access.
//!
//! # Responsibility
//! - Map entities to rows for CRUD, partial updates and query terminals.
//! - Expose raw-SQL execution through the same scope rules.
//!
//! # Invariants
//! - Every operation accepts an optional caller scope and never finalizes it.
//! - Entity writes pass `Entity::validate()` before they are queued.
//! - Absent rows on read paths are `Ok(None)`; semantic failures use
//!   `RepoError` variants instead of driver errors.

pub mod entity_repo;
pub mod error;
pub mod field_copy;
pub mod paging;
pub mod sql_executor;
