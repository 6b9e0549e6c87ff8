//! Process-wide metadata registry.
//!
//! # Invariants
//! - Resolution work runs at most once per entity type.
//! - The map lock is held only while looking up the per-type cell; the cell
//!   itself serializes initialization for its type.

use super::EntityMetadata;
use crate::model::entity::Entity;
use crate::repo::error::RepoResult;
use log::{debug, error};
use once_cell::sync::{Lazy, OnceCell};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

type MetadataCell = Arc<OnceCell<Arc<EntityMetadata>>>;

static REGISTRY: Lazy<Mutex<HashMap<TypeId, MetadataCell>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Returns cached metadata for `E`, resolving it on first use.
///
/// # Errors
/// - `RepoError::Schema` when `E` has no primary key or an invalid field
///   table. Nothing is cached in that case.
pub fn resolve<E: Entity>() -> RepoResult<Arc<EntityMetadata>> {
    let cell = {
        let mut registry = REGISTRY.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(registry.entry(TypeId::of::<E>()).or_default())
    };

    let metadata = cell.get_or_try_init(|| {
        let resolved = EntityMetadata::for_entity::<E>().map_err(|err| {
            error!(
                "event=metadata_resolve module=metadata status=error entity={} error={}",
                std::any::type_name::<E>(),
                err
            );
            err
        })?;
        debug!(
            "event=metadata_resolve module=metadata status=ok entity={} table={} key_count={}",
            resolved.entity,
            resolved.table_name,
            resolved.key_fields.len()
        );
        Ok::<_, super::SchemaError>(Arc::new(resolved))
    })?;

    Ok(Arc::clone(metadata))
}

/// Number of entity types with successfully resolved metadata.
pub fn cached_entity_count() -> usize {
    let registry = REGISTRY.lock().unwrap_or_else(PoisonError::into_inner);
    registry.values().filter(|cell| cell.get().is_some()).count()
}
