//! Predicate seam and a stock filter expression.
//!
//! `Predicate` is the capability "turn a condition over entity fields into a
//! SQL boolean expression". `Filter` is a thin implementation for common
//! comparisons; callers with their own translator implement `Predicate`.

use crate::metadata::sql::quote_ident;
use rusqlite::types::Value;
use std::fmt::Debug;

/// Renders a boolean SQL expression using anonymous `?` placeholders.
///
/// Implementations push one value onto `params` per placeholder, in the
/// order the placeholders appear in the returned text.
pub trait Predicate: Debug + Send + Sync {
    fn to_sql(&self, params: &mut Vec<Value>) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Like => "LIKE",
        }
    }
}

/// Column-level filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    IsNull(String),
    IsNotNull(String),
    In {
        column: String,
        values: Vec<Value>,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// Caller-written SQL fragment with anonymous placeholders.
    Raw { sql: String, params: Vec<Value> },
}

impl Filter {
    fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Le, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ge, value)
    }

    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::Like, pattern.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull(column.into())
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::IsNotNull(column.into())
    }

    pub fn in_list<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self::Raw {
            sql: sql.into(),
            params,
        }
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::And(mut parts) => {
                parts.push(other);
                Self::And(parts)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Self::Or(mut parts) => {
                parts.push(other);
                Self::Or(parts)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

impl Predicate for Filter {
    fn to_sql(&self, params: &mut Vec<Value>) -> String {
        match self {
            Self::Compare {
                column,
                op: CompareOp::Eq,
                value: Value::Null,
            } => format!("{} IS NULL", quote_ident(column)),
            Self::Compare {
                column,
                op: CompareOp::Ne,
                value: Value::Null,
            } => format!("{} IS NOT NULL", quote_ident(column)),
            Self::Compare { column, op, value } => {
                params.push(value.clone());
                format!("{} {} ?", quote_ident(column), op.as_sql())
            }
            Self::IsNull(column) => format!("{} IS NULL", quote_ident(column)),
            Self::IsNotNull(column) => format!("{} IS NOT NULL", quote_ident(column)),
            Self::In { column, values } => {
                if values.is_empty() {
                    return "1 = 0".to_string();
                }
                params.extend(values.iter().cloned());
                let placeholders = vec!["?"; values.len()].join(", ");
                format!("{} IN ({placeholders})", quote_ident(column))
            }
            Self::And(parts) => join_parts(parts, " AND ", "1 = 1", params),
            Self::Or(parts) => join_parts(parts, " OR ", "1 = 0", params),
            Self::Not(inner) => format!("NOT ({})", inner.to_sql(params)),
            Self::Raw { sql, params: bound } => {
                params.extend(bound.iter().cloned());
                format!("({sql})")
            }
        }
    }
}

fn join_parts(parts: &[Filter], separator: &str, empty: &str, params: &mut Vec<Value>) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    parts
        .iter()
        .map(|part| format!("({})", part.to_sql(params)))
        .collect::<Vec<_>>()
        .join(separator)
}
