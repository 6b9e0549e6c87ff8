//! Generic entity repository.
//!
//! # Responsibility
//! - Provide CRUD, partial update and query terminal operations for one
//!   entity type.
//! - Route every store access through `ScopeManager::with_scope`.
//!
//! # Invariants
//! - Writes are queued on the scope and submitted when the operation
//!   succeeds; reads never submit.
//! - Batch operations run their element operations sequentially inside one
//!   shared scope, so they commit or roll back together.
//! - A caller-supplied scope is never committed or closed here.

use crate::metadata::{resolve, EntityMetadata};
use crate::model::entity::Entity;
use crate::model::key::CompositeKey;
use crate::query::{LoadOptions, Predicate, Query};
use crate::repo::error::{fail_if, RepoError, RepoResult};
use crate::repo::field_copy::copy_scalar_fields;
use crate::repo::paging::{normalize_page_index, normalize_page_size, PaginatedResult};
use crate::scope::{PendingChange, Scope, ScopeManager};
use log::debug;
use rusqlite::types::Value;
use rusqlite::params_from_iter;
use std::marker::PhantomData;
use std::sync::Arc;

/// Repository for entity type `E`.
pub struct Repository<E: Entity> {
    scopes: ScopeManager,
    metadata: Arc<EntityMetadata>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            scopes: self.scopes.clone(),
            metadata: Arc::clone(&self.metadata),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    /// Builds a repository, resolving `E`'s metadata on first use.
    ///
    /// # Errors
    /// - `RepoError::Schema` when `E` declares no primary key.
    pub fn new(scopes: ScopeManager) -> RepoResult<Self> {
        Ok(Self {
            scopes,
            metadata: resolve::<E>()?,
            _entity: PhantomData,
        })
    }

    pub fn metadata(&self) -> &EntityMetadata {
        &self.metadata
    }

    pub fn scopes(&self) -> &ScopeManager {
        &self.scopes
    }

    /// Composite key of `entity` in key-declaration order.
    pub fn key_of(&self, entity: &E) -> RepoResult<CompositeKey> {
        CompositeKey::of(entity, &self.metadata)
    }

    // ---- writes -------------------------------------------------------

    /// Queues one insert and returns the entity unchanged.
    pub fn add(&self, entity: E, scope: Option<&Scope>) -> RepoResult<E> {
        entity.validate().map_err(RepoError::Validation)?;
        self.scopes.with_scope(scope, true, move |scope| {
            scope.queue(self.insert_change(&entity)?);
            debug!(
                "event=entity_add module=repo status=queued scope_id={} table={}",
                scope.id(),
                self.metadata.table_name
            );
            Ok(entity)
        })
    }

    /// Adds every entity inside one scope; all inserts commit or none do.
    pub fn add_all(&self, entities: Vec<E>, scope: Option<&Scope>) -> RepoResult<Vec<E>> {
        fail_if(entities.is_empty(), "parameter `entities` cannot be empty")?;
        self.scopes.with_scope(scope, true, |scope| {
            entities
                .into_iter()
                .map(|entity| self.add(entity, Some(scope)))
                .collect()
        })
    }

    /// Copies scalar fields of `entity` onto its persisted row.
    ///
    /// With `fields`, only the named fields (ASCII case-insensitive) are
    /// copied. Key, relationship and audit fields are never copied.
    /// Returns the persisted entity after the copy.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when no row has `entity`'s key.
    pub fn update(&self, entity: &E, fields: Option<&[&str]>, scope: Option<&Scope>) -> RepoResult<E> {
        self.scopes.with_scope(scope, true, |scope| {
            let key = self.key_of(entity)?;
            let mut persisted =
                self.fetch_by_key(scope, &key)?
                    .ok_or_else(|| RepoError::NotFound {
                        table: self.metadata.table_name,
                        key: key.to_string(),
                    })?;

            let copied = copy_scalar_fields(entity, &mut persisted, fields, self.scopes.config())?;
            persisted.validate().map_err(RepoError::Validation)?;
            scope.queue(self.update_change(&persisted, &copied)?);
            debug!(
                "event=entity_update module=repo status=queued scope_id={} table={} field_count={}",
                scope.id(),
                self.metadata.table_name,
                copied.len()
            );
            Ok(persisted)
        })
    }

    /// Updates every entity (all scalar fields) inside one scope.
    pub fn update_all(&self, entities: &[E], scope: Option<&Scope>) -> RepoResult<Vec<E>> {
        fail_if(entities.is_empty(), "parameter `entities` cannot be empty")?;
        self.scopes.with_scope(scope, true, |scope| {
            entities
                .iter()
                .map(|entity| self.update(entity, None, Some(scope)))
                .collect()
        })
    }

    /// Deletes the persisted row with `entity`'s key.
    ///
    /// Returns `None` when no such row exists.
    pub fn delete(&self, entity: &E, scope: Option<&Scope>) -> RepoResult<Option<E>> {
        let key = self.key_of(entity)?;
        self.delete_by_key(&key, scope)
    }

    /// Deletes the row with `key`; `None` when no such row exists.
    pub fn delete_by_key(&self, key: &CompositeKey, scope: Option<&Scope>) -> RepoResult<Option<E>> {
        fail_if(key.is_empty(), "parameter `key` cannot be empty")?;
        self.scopes.with_scope(scope, true, |scope| {
            let Some(persisted) = self.fetch_by_key(scope, key)? else {
                debug!(
                    "event=entity_delete module=repo status=absent scope_id={} table={}",
                    scope.id(),
                    self.metadata.table_name
                );
                return Ok(None);
            };
            scope.queue(self.delete_change(&persisted)?);
            debug!(
                "event=entity_delete module=repo status=queued scope_id={} table={}",
                scope.id(),
                self.metadata.table_name
            );
            Ok(Some(persisted))
        })
    }

    /// Deletes each entity inside one scope; returns the rows that existed.
    pub fn delete_all(&self, entities: &[E], scope: Option<&Scope>) -> RepoResult<Vec<E>> {
        self.scopes.with_scope(scope, true, |scope| {
            let mut deleted = Vec::with_capacity(entities.len());
            for entity in entities {
                if let Some(persisted) = self.delete(entity, Some(scope))? {
                    deleted.push(persisted);
                }
            }
            Ok(deleted)
        })
    }

    /// Deletes every row matching `predicate` inside one scope.
    pub fn delete_where(&self, predicate: impl Predicate + 'static, scope: Option<&Scope>) -> RepoResult<Vec<E>> {
        self.delete_query(|query| query.filter(predicate), scope)
    }

    /// Deletes every row yielded by the built query inside one scope.
    pub fn delete_query<F>(&self, build: F, scope: Option<&Scope>) -> RepoResult<Vec<E>>
    where
        F: FnOnce(Query<E>) -> Query<E>,
    {
        let query = build(Query::new());
        self.scopes.with_scope(scope, true, |scope| {
            let targets = self.fetch_rows(scope, &query, 0, None, false)?;
            self.delete_all(&targets, Some(scope))
        })
    }

    // ---- key lookup ---------------------------------------------------

    /// Fetches the row with `key`; `None` when absent.
    ///
    /// # Errors
    /// - `RepoError::AmbiguousResult` when the key matches several rows.
    pub fn get_by_key(&self, key: &CompositeKey, scope: Option<&Scope>) -> RepoResult<Option<E>> {
        fail_if(key.is_empty(), "parameter `key` cannot be empty")?;
        self.scopes
            .with_scope(scope, false, |scope| self.fetch_by_key(scope, key))
    }

    // ---- terminal operations -----------------------------------------

    pub fn list(&self, scope: Option<&Scope>) -> RepoResult<Vec<E>> {
        self.list_query(|query| query, scope)
    }

    pub fn list_where(&self, predicate: impl Predicate + 'static, scope: Option<&Scope>) -> RepoResult<Vec<E>> {
        self.list_query(|query| query.filter(predicate), scope)
    }

    pub fn list_query<F>(&self, build: F, scope: Option<&Scope>) -> RepoResult<Vec<E>>
    where
        F: FnOnce(Query<E>) -> Query<E>,
    {
        self.realize(build(Query::new()), scope, |scope, query| {
            self.fetch(scope, query, 0, None, false)
        })
    }

    pub fn array(&self, scope: Option<&Scope>) -> RepoResult<Box<[E]>> {
        self.list(scope).map(Vec::into_boxed_slice)
    }

    pub fn array_where(&self, predicate: impl Predicate + 'static, scope: Option<&Scope>) -> RepoResult<Box<[E]>> {
        self.list_where(predicate, scope).map(Vec::into_boxed_slice)
    }

    pub fn array_query<F>(&self, build: F, scope: Option<&Scope>) -> RepoResult<Box<[E]>>
    where
        F: FnOnce(Query<E>) -> Query<E>,
    {
        self.list_query(build, scope).map(Vec::into_boxed_slice)
    }

    /// Zero or one row; more than one is `RepoError::AmbiguousResult`.
    pub fn single_or_default(&self, scope: Option<&Scope>) -> RepoResult<Option<E>> {
        self.single_or_default_query(|query| query, scope)
    }

    pub fn single_or_default_where(
        &self,
        predicate: impl Predicate + 'static,
        scope: Option<&Scope>,
    ) -> RepoResult<Option<E>> {
        self.single_or_default_query(|query| query.filter(predicate), scope)
    }

    pub fn single_or_default_query<F>(&self, build: F, scope: Option<&Scope>) -> RepoResult<Option<E>>
    where
        F: FnOnce(Query<E>) -> Query<E>,
    {
        self.realize(build(Query::new()), scope, |scope, query| {
            let rows = self.fetch_rows(scope, query, 0, Some(2), false)?;
            let single = self.at_most_one(rows)?;
            self.load_one(single, query.load_options(), scope)
        })
    }

    pub fn first_or_default(&self, scope: Option<&Scope>) -> RepoResult<Option<E>> {
        self.first_or_default_query(|query| query, scope)
    }

    pub fn first_or_default_where(
        &self,
        predicate: impl Predicate + 'static,
        scope: Option<&Scope>,
    ) -> RepoResult<Option<E>> {
        self.first_or_default_query(|query| query.filter(predicate), scope)
    }

    pub fn first_or_default_query<F>(&self, build: F, scope: Option<&Scope>) -> RepoResult<Option<E>>
    where
        F: FnOnce(Query<E>) -> Query<E>,
    {
        self.realize(build(Query::new()), scope, |scope, query| {
            let first = self.fetch_rows(scope, query, 0, Some(1), false)?.into_iter().next();
            self.load_one(first, query.load_options(), scope)
        })
    }

    /// Last row in query order (key order when unordered).
    pub fn last_or_default(&self, scope: Option<&Scope>) -> RepoResult<Option<E>> {
        self.last_or_default_query(|query| query, scope)
    }

    pub fn last_or_default_where(
        &self,
        predicate: impl Predicate + 'static,
        scope: Option<&Scope>,
    ) -> RepoResult<Option<E>> {
        self.last_or_default_query(|query| query.filter(predicate), scope)
    }

    pub fn last_or_default_query<F>(&self, build: F, scope: Option<&Scope>) -> RepoResult<Option<E>>
    where
        F: FnOnce(Query<E>) -> Query<E>,
    {
        self.realize(build(Query::new()), scope, |scope, query| {
            let last = if query.has_window() {
                self.fetch_rows(scope, query, 0, None, false)?.pop()
            } else {
                self.fetch_rows(scope, query, 0, Some(1), true)?.pop()
            };
            self.load_one(last, query.load_options(), scope)
        })
    }

    pub fn any(&self, scope: Option<&Scope>) -> RepoResult<bool> {
        self.any_query(|query| query, scope)
    }

    pub fn any_where(&self, predicate: impl Predicate + 'static, scope: Option<&Scope>) -> RepoResult<bool> {
        self.any_query(|query| query.filter(predicate), scope)
    }

    pub fn any_query<F>(&self, build: F, scope: Option<&Scope>) -> RepoResult<bool>
    where
        F: FnOnce(Query<E>) -> Query<E>,
    {
        self.realize(build(Query::new()), scope, |scope, query| {
            let (sql, params) = query.exists_sql(&self.metadata);
            let exists: i64 = scope
                .connection()
                .query_row(&sql, params_from_iter(params), |row| row.get(0))?;
            Ok(exists != 0)
        })
    }

    pub fn count(&self, scope: Option<&Scope>) -> RepoResult<u64> {
        self.count_query(|query| query, scope)
    }

    pub fn count_where(&self, predicate: impl Predicate + 'static, scope: Option<&Scope>) -> RepoResult<u64> {
        self.count_query(|query| query.filter(predicate), scope)
    }

    pub fn count_query<F>(&self, build: F, scope: Option<&Scope>) -> RepoResult<u64>
    where
        F: FnOnce(Query<E>) -> Query<E>,
    {
        self.realize(build(Query::new()), scope, |scope, query| {
            self.count_rows(scope, query)
        })
    }

    /// One page of all rows plus the total row count.
    ///
    /// Absent/non-positive `page_size` means all rows; absent/non-positive
    /// `page_index` means the first page.
    pub fn paginated_result(
        &self,
        page_size: Option<i64>,
        page_index: Option<i64>,
        scope: Option<&Scope>,
    ) -> RepoResult<PaginatedResult<E>> {
        self.paginated_result_query(|query| query, page_size, page_index, scope)
    }

    pub fn paginated_result_where(
        &self,
        predicate: impl Predicate + 'static,
        page_size: Option<i64>,
        page_index: Option<i64>,
        scope: Option<&Scope>,
    ) -> RepoResult<PaginatedResult<E>> {
        self.paginated_result_query(|query| query.filter(predicate), page_size, page_index, scope)
    }

    /// Page slice and total count come from two statements in one scope.
    pub fn paginated_result_query<F>(
        &self,
        build: F,
        page_size: Option<i64>,
        page_index: Option<i64>,
        scope: Option<&Scope>,
    ) -> RepoResult<PaginatedResult<E>>
    where
        F: FnOnce(Query<E>) -> Query<E>,
    {
        let size = normalize_page_size(page_size);
        let index = normalize_page_index(page_index);
        let skip = u64::try_from(size.saturating_mul(index)).unwrap_or(u64::MAX);
        let take = u64::try_from(size).unwrap_or(u64::MAX);

        self.realize(build(Query::new()), scope, |scope, query| {
            let records = self.fetch(scope, query, skip, Some(take), false)?;
            let total = self.count_rows(scope, query)?;
            let total = i64::try_from(total).unwrap_or(i64::MAX);
            Ok(PaginatedResult::new(records, Some(size), Some(index), total))
        })
    }

    // ---- internals ----------------------------------------------------

    /// Validates load directives, then runs `terminal` in a read scope.
    fn realize<T, F>(&self, query: Query<E>, scope: Option<&Scope>, terminal: F) -> RepoResult<T>
    where
        F: FnOnce(&Scope, &Query<E>) -> RepoResult<T>,
    {
        query.load_options().validate(&self.metadata)?;
        self.scopes
            .with_scope(scope, false, |scope| terminal(scope, &query))
    }

    fn fetch(
        &self,
        scope: &Scope,
        query: &Query<E>,
        extra_skip: u64,
        extra_take: Option<u64>,
        reverse: bool,
    ) -> RepoResult<Vec<E>> {
        let mut records = self.fetch_rows(scope, query, extra_skip, extra_take, reverse)?;
        apply_load_options(&mut records, query.load_options(), scope)?;
        Ok(records)
    }

    fn fetch_rows(
        &self,
        scope: &Scope,
        query: &Query<E>,
        extra_skip: u64,
        extra_take: Option<u64>,
        reverse: bool,
    ) -> RepoResult<Vec<E>> {
        let (sql, params) = query.select_sql(&self.metadata, extra_skip, extra_take, reverse);
        let mut stmt = scope.connection().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), E::from_row)?;
        let records = rows.collect::<rusqlite::Result<Vec<E>>>()?;
        Ok(records)
    }

    fn count_rows(&self, scope: &Scope, query: &Query<E>) -> RepoResult<u64> {
        let (sql, params) = query.count_sql(&self.metadata);
        let count: i64 = scope
            .connection()
            .query_row(&sql, params_from_iter(params), |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("store reported negative count {count}")))
    }

    fn load_one(&self, record: Option<E>, options: &LoadOptions, scope: &Scope) -> RepoResult<Option<E>> {
        match record {
            Some(mut record) => {
                apply_load_options(std::slice::from_mut(&mut record), options, scope)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn at_most_one(&self, mut rows: Vec<E>) -> RepoResult<Option<E>> {
        if rows.len() > 1 {
            return Err(RepoError::AmbiguousResult {
                table: self.metadata.table_name,
                matched: rows.len(),
            });
        }
        Ok(rows.pop())
    }

    /// Zero-or-one fetch through the single-row template.
    fn fetch_by_key(&self, scope: &Scope, key: &CompositeKey) -> RepoResult<Option<E>> {
        let values = key.ordered_values(&self.metadata)?;
        let mut stmt = scope
            .connection()
            .prepare_cached(&self.metadata.single_row_sql)?;
        let rows = stmt.query_map(params_from_iter(values), E::from_row)?;
        let mut matched = Vec::with_capacity(1);
        for row in rows.take(2) {
            matched.push(row?);
        }
        self.at_most_one(matched)
    }

    fn column_values(&self, entity: &E, names: &[&'static str]) -> RepoResult<Vec<Value>> {
        names
            .iter()
            .map(|name| {
                entity.field_value(name).ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "entity `{}` did not expose column `{name}`",
                        self.metadata.table_name
                    ))
                })
            })
            .collect()
    }

    fn key_columns(&self) -> Vec<&'static str> {
        self.metadata.key_fields.iter().map(|field| field.name).collect()
    }

    fn insert_change(&self, entity: &E) -> RepoResult<PendingChange> {
        let columns: Vec<&'static str> = self
            .metadata
            .column_fields
            .iter()
            .map(|field| field.name)
            .collect();
        let values = self.column_values(entity, &columns)?;
        Ok(PendingChange::Insert {
            table: self.metadata.table_name,
            columns,
            values,
        })
    }

    fn update_change(&self, persisted: &E, copied: &[&'static str]) -> RepoResult<PendingChange> {
        let key_columns = self.key_columns();
        Ok(PendingChange::Update {
            table: self.metadata.table_name,
            columns: copied.to_vec(),
            values: self.column_values(persisted, copied)?,
            key_values: self.column_values(persisted, &key_columns)?,
            key_columns,
        })
    }

    fn delete_change(&self, persisted: &E) -> RepoResult<PendingChange> {
        let key_columns = self.key_columns();
        Ok(PendingChange::Delete {
            table: self.metadata.table_name,
            key_values: self.column_values(persisted, &key_columns)?,
            key_columns,
        })
    }
}

fn apply_load_options<E: Entity>(records: &mut [E], options: &LoadOptions, scope: &Scope) -> RepoResult<()> {
    if options.is_empty() {
        return Ok(());
    }
    for record in records.iter_mut() {
        for directive in options.directives() {
            record.load_related(directive, scope)?;
        }
    }
    Ok(())
}
