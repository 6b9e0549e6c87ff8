//! Entity contracts shared by the resolver, scope queue and repository.
//!
//! # Responsibility
//! - Define the declarative field-descriptor table each entity exposes.
//! - Define composite primary keys as ordered name/value pairs.
//!
//! # Invariants
//! - Field tables are static for the process lifetime.
//! - Key order is declaration order in `Entity::FIELDS`.

pub mod entity;
pub mod key;
