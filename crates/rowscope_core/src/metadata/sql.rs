//! SQL text generation from field descriptors.
//!
//! # Invariants
//! - Every identifier is double-quoted with embedded quotes doubled.
//! - Generated statements depend only on descriptor tables, never on values.

use crate::model::entity::FieldDescriptor;

/// Quotes one SQLite identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Comma-separated quoted column list.
pub fn column_list(fields: &[FieldDescriptor]) -> String {
    fields
        .iter()
        .map(|field| quote_ident(field.name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn select_statement(table: &str, columns: &[FieldDescriptor]) -> String {
    format!(
        "SELECT {} FROM {}",
        column_list(columns),
        quote_ident(table)
    )
}

/// AND-conjunction of `"<key>" = ?<n>` in key order, numbered from 1.
pub fn key_predicate(keys: &[FieldDescriptor]) -> String {
    numbered_conditions(keys.iter().map(|field| field.name), 1)
}

/// AND-conjunction of `"<name>" = ?<n>` numbered from `first_index`.
pub fn numbered_conditions<'a>(names: impl Iterator<Item = &'a str>, first_index: usize) -> String {
    names
        .enumerate()
        .map(|(offset, name)| format!("{} = ?{}", quote_ident(name), first_index + offset))
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[cfg(test)]
mod tests {
    use super::{key_predicate, numbered_conditions, quote_ident};
    use crate::model::entity::FieldDescriptor;

    #[test]
    fn quote_ident_doubles_embedded_quotes() {
        assert_eq!(quote_ident("name"), "\"name\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn key_predicate_numbers_placeholders_in_order() {
        let keys = [FieldDescriptor::key("a"), FieldDescriptor::key("b")];
        assert_eq!(key_predicate(&keys), "\"a\" = ?1 AND \"b\" = ?2");
        assert_eq!(
            numbered_conditions(["x"].into_iter(), 4),
            "\"x\" = ?4"
        );
    }
}
