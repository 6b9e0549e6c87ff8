//! Query pipeline: base scan, filters, ordering, window and load options.

use super::filter::Predicate;
use super::load::LoadOptions;
use crate::metadata::sql::quote_ident;
use crate::metadata::EntityMetadata;
use crate::model::entity::Entity;
use rusqlite::types::Value;
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Lazy description of a row set of `E`.
///
/// Filters are AND-ed. Without explicit ordering, rows come back in key
/// order so paging is deterministic.
pub struct Query<E> {
    filters: Vec<Box<dyn Predicate>>,
    ordering: Vec<(String, SortOrder)>,
    skip: u64,
    take: Option<u64>,
    load: LoadOptions,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Default for Query<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Query<E> {
    /// Unfiltered scan of `E::TABLE`.
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            ordering: Vec::new(),
            skip: 0,
            take: None,
            load: LoadOptions::default(),
            _entity: PhantomData,
        }
    }

    /// Base scan, then the optional predicate, then the optional directives.
    pub fn compose(predicate: Option<Box<dyn Predicate>>, load: Option<LoadOptions>) -> Self {
        let mut query = Self::new();
        if let Some(predicate) = predicate {
            query.filters.push(predicate);
        }
        if let Some(load) = load {
            query.load = load;
        }
        query
    }

    pub fn filter(mut self, predicate: impl Predicate + 'static) -> Self {
        self.filters.push(Box::new(predicate));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.ordering.push((column.into(), SortOrder::Ascending));
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.ordering.push((column.into(), SortOrder::Descending));
        self
    }

    /// Skips `count` more rows; repeated calls accumulate.
    pub fn skip(mut self, count: u64) -> Self {
        self.skip = self.skip.saturating_add(count);
        self.take = self.take.map(|take| take.saturating_sub(count));
        self
    }

    /// Caps the row count; repeated calls keep the smaller cap.
    pub fn take(mut self, count: u64) -> Self {
        self.take = Some(self.take.map_or(count, |take| take.min(count)));
        self
    }

    pub fn load_with(mut self, field: impl Into<String>) -> Self {
        self.load = std::mem::take(&mut self.load).load_with(field);
        self
    }

    pub fn associate_with(mut self, field: impl Into<String>, filter: impl Predicate + 'static) -> Self {
        self.load = std::mem::take(&mut self.load).associate_with(field, filter);
        self
    }

    pub fn with_load_options(mut self, options: LoadOptions) -> Self {
        self.load.extend(options);
        self
    }

    pub fn load_options(&self) -> &LoadOptions {
        &self.load
    }

    pub(crate) fn has_window(&self) -> bool {
        self.skip > 0 || self.take.is_some()
    }

    /// Row selection with an extra window applied inside this query's own.
    pub(crate) fn select_sql(
        &self,
        metadata: &EntityMetadata,
        extra_skip: u64,
        extra_take: Option<u64>,
        reverse: bool,
    ) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = metadata.select_sql.clone();
        sql.push_str(&self.where_clause(&mut params));
        sql.push_str(&self.order_clause(metadata, reverse));
        let (offset, limit) = self.window(extra_skip, extra_take);
        sql.push_str(&limit_clause(offset, limit, &mut params));
        (sql, params)
    }

    /// Number of rows the pipeline yields, honoring its window.
    pub(crate) fn count_sql(&self, metadata: &EntityMetadata) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let table = quote_ident(metadata.table_name);
        let filter = self.where_clause(&mut params);
        if !self.has_window() {
            return (format!("SELECT COUNT(*) FROM {table}{filter}"), params);
        }
        let order = self.order_clause(metadata, false);
        let limit = limit_clause(self.skip, self.take, &mut params);
        (
            format!("SELECT COUNT(*) FROM (SELECT 1 FROM {table}{filter}{order}{limit})"),
            params,
        )
    }

    pub(crate) fn exists_sql(&self, metadata: &EntityMetadata) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let table = quote_ident(metadata.table_name);
        let filter = self.where_clause(&mut params);
        let order = if self.has_window() {
            self.order_clause(metadata, false)
        } else {
            String::new()
        };
        let (offset, limit) = self.window(0, Some(1));
        let limit = limit_clause(offset, limit, &mut params);
        (
            format!("SELECT EXISTS(SELECT 1 FROM {table}{filter}{order}{limit})"),
            params,
        )
    }

    fn where_clause(&self, params: &mut Vec<Value>) -> String {
        if self.filters.is_empty() {
            return String::new();
        }
        let conditions = self
            .filters
            .iter()
            .map(|filter| format!("({})", filter.to_sql(params)))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!(" WHERE {conditions}")
    }

    /// Caller ordering first, then every key column it does not name.
    fn order_clause(&self, metadata: &EntityMetadata, reverse: bool) -> String {
        let mut terms: Vec<(&str, SortOrder)> = self
            .ordering
            .iter()
            .map(|(column, order)| (column.as_str(), *order))
            .collect();
        for key in &metadata.key_fields {
            if !terms
                .iter()
                .any(|(column, _)| column.eq_ignore_ascii_case(key.name))
            {
                terms.push((key.name, SortOrder::Ascending));
            }
        }
        let rendered = terms
            .into_iter()
            .map(|(column, order)| {
                let order = if reverse { order.reversed() } else { order };
                format!("{} {}", quote_ident(column), order.as_sql())
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(" ORDER BY {rendered}")
    }

    fn window(&self, extra_skip: u64, extra_take: Option<u64>) -> (u64, Option<u64>) {
        let offset = self.skip.saturating_add(extra_skip);
        let limit = match (self.take, extra_take) {
            (None, extra) => extra,
            (Some(take), None) => Some(take.saturating_sub(extra_skip)),
            (Some(take), Some(extra)) => Some(take.saturating_sub(extra_skip).min(extra)),
        };
        (offset, limit)
    }
}

impl<E> Debug for Query<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("entity", &std::any::type_name::<E>())
            .field("filters", &self.filters)
            .field("ordering", &self.ordering)
            .field("skip", &self.skip)
            .field("take", &self.take)
            .field("load", &self.load)
            .finish()
    }
}

fn limit_clause(offset: u64, limit: Option<u64>, params: &mut Vec<Value>) -> String {
    match (limit, offset) {
        (None, 0) => String::new(),
        (None, offset) => {
            params.push(Value::Integer(clamp_i64(offset)));
            " LIMIT -1 OFFSET ?".to_string()
        }
        (Some(limit), offset) => {
            params.push(Value::Integer(clamp_i64(limit)));
            params.push(Value::Integer(clamp_i64(offset)));
            " LIMIT ? OFFSET ?".to_string()
        }
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::Query;
    use crate::metadata::EntityMetadata;
    use crate::model::entity::{Entity, FieldDescriptor};
    use crate::query::filter::Filter;
    use crate::repo::error::RepoResult;
    use rusqlite::types::Value;
    use rusqlite::Row;

    struct Item;

    impl Entity for Item {
        const TABLE: &'static str = "items";
        const FIELDS: &'static [FieldDescriptor] =
            &[FieldDescriptor::key("id"), FieldDescriptor::scalar("name")];

        fn from_row(_row: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Item)
        }

        fn field_value(&self, _field: &str) -> Option<Value> {
            None
        }

        fn set_field_value(&mut self, _field: &str, _value: Value) -> RepoResult<()> {
            Ok(())
        }
    }

    fn metadata() -> EntityMetadata {
        EntityMetadata::for_entity::<Item>().unwrap()
    }

    #[test]
    fn base_scan_orders_by_key() {
        let (sql, params) = Query::<Item>::new().select_sql(&metadata(), 0, None, false);
        assert_eq!(
            sql,
            "SELECT \"id\", \"name\" FROM \"items\" ORDER BY \"id\" ASC"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn page_window_nests_inside_query_window() {
        let query = Query::<Item>::new()
            .filter(Filter::like("name", "a%"))
            .order_by_desc("name")
            .skip(5)
            .take(12);
        let (sql, params) = query.select_sql(&metadata(), 10, Some(10), false);
        assert_eq!(
            sql,
            "SELECT \"id\", \"name\" FROM \"items\" WHERE (\"name\" LIKE ?) \
             ORDER BY \"name\" DESC, \"id\" ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            params,
            vec![
                Value::Text("a%".to_string()),
                Value::Integer(2),
                Value::Integer(15),
            ]
        );
    }

    #[test]
    fn reverse_flips_ordering() {
        let (sql, _) = Query::<Item>::new()
            .order_by("name")
            .select_sql(&metadata(), 0, Some(1), true);
        assert!(sql.ends_with("ORDER BY \"name\" DESC, \"id\" DESC LIMIT ? OFFSET ?"));
    }

    #[test]
    fn key_columns_break_ties_once() {
        let (sql, _) = Query::<Item>::new()
            .order_by("name")
            .select_sql(&metadata(), 0, None, false);
        assert!(sql.ends_with("ORDER BY \"name\" ASC, \"id\" ASC"));

        let (sql, _) = Query::<Item>::new()
            .order_by_desc("ID")
            .select_sql(&metadata(), 0, None, false);
        assert!(sql.ends_with("ORDER BY \"ID\" DESC"));
    }

    #[test]
    fn count_wraps_only_windowed_queries() {
        let (plain, _) = Query::<Item>::new().count_sql(&metadata());
        assert_eq!(plain, "SELECT COUNT(*) FROM \"items\"");

        let (windowed, params) = Query::<Item>::new().skip(3).count_sql(&metadata());
        assert_eq!(
            windowed,
            "SELECT COUNT(*) FROM (SELECT 1 FROM \"items\" ORDER BY \"id\" ASC LIMIT -1 OFFSET ?)"
        );
        assert_eq!(params, vec![Value::Integer(3)]);
    }

    #[test]
    fn skip_then_take_accumulates() {
        let query = Query::<Item>::new().take(10).skip(4).take(20);
        let (_, params) = query.select_sql(&metadata(), 0, None, false);
        assert_eq!(params, vec![Value::Integer(6), Value::Integer(4)]);
    }
}
