//! Lazy query pipelines realized by repository terminal operations.
//!
//! # Responsibility
//! - Describe filters, ordering, windows and eager-load directives without
//!   touching the store.
//! - Render the described pipeline into SQL at terminal-operation time.
//!
//! # Invariants
//! - Building a `Query` never performs I/O.
//! - A pipeline is consumed by one terminal operation and never reused
//!   across scopes.

pub mod filter;
pub mod load;
mod pipeline;

pub use filter::{Filter, Predicate};
pub use load::{LoadDirective, LoadOptions};
pub use pipeline::{Query, SortOrder};
