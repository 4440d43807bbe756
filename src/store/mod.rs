//! Boundary to the remote relational store: query options and the [`RemoteStore`] trait.
//!
//! Rows cross this boundary as JSON objects. Related rows requested through an
//! [`Expansion`] appear as a nested object under the related table's name, or null when
//! the foreign key matches nothing.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgStore};

use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

pub type Row = Map<String, Value>;

/// Eager, read-only inclusion of a to-one related row.
#[derive(Clone, Debug, PartialEq)]
pub struct Expansion {
    pub table: String,
    /// Column on the parent row.
    pub foreign_key: String,
    /// Column on the related row matched against `foreign_key`.
    pub references: String,
    /// Related columns to include; empty means all.
    pub columns: Vec<String>,
    pub nested: Vec<Expansion>,
}

impl Expansion {
    pub fn new(table: &str, foreign_key: &str, references: &str, columns: &[&str]) -> Self {
        Expansion {
            table: table.to_string(),
            foreign_key: foreign_key.to_string(),
            references: references.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            nested: Vec::new(),
        }
    }

    pub fn nest(mut self, expansion: Expansion) -> Self {
        self.nested.push(expansion);
        self
    }
}

impl fmt::Display for Expansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = if self.columns.is_empty() {
            vec!["*".to_string()]
        } else {
            self.columns.clone()
        };
        parts.extend(self.nested.iter().map(ToString::to_string));
        write!(f, "{}({})", self.table, parts.join(", "))
    }
}

/// Which columns of the base table to return, plus related-row expansions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    /// `None` selects every column of the base table.
    pub columns: Option<Vec<String>>,
    pub expand: Vec<Expansion>,
}

impl Selection {
    pub fn all() -> Self {
        Selection::default()
    }

    pub fn columns(columns: &[&str]) -> Self {
        Selection {
            columns: Some(columns.iter().map(|c| c.to_string()).collect()),
            expand: Vec::new(),
        }
    }

    pub fn expand(mut self, expansion: Expansion) -> Self {
        self.expand.push(expansion);
        self
    }
}

/// Renders the selection as a select expression, e.g. `*, departments(department_name)`.
impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = match &self.columns {
            Some(cols) => cols.clone(),
            None => vec!["*".to_string()],
        };
        parts.extend(self.expand.iter().map(ToString::to_string));
        f.write_str(&parts.join(", "))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter {
            column: column.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn lt(column: &str, value: impl Into<Value>) -> Self {
        Filter {
            column: column.to_string(),
            op: FilterOp::Lt,
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListOptions {
    pub selection: Selection,
    pub order_by: Option<String>,
    pub ascending: bool,
    pub limit: Option<u32>,
    pub filters: Vec<Filter>,
}

impl Default for ListOptions {
    fn default() -> Self {
        ListOptions {
            selection: Selection::all(),
            order_by: None,
            ascending: true,
            limit: None,
            filters: Vec::new(),
        }
    }
}

impl ListOptions {
    pub fn ordered(column: &str, ascending: bool) -> Self {
        ListOptions {
            order_by: Some(column.to_string()),
            ascending,
            ..Self::default()
        }
    }

    /// Every identifier the options reference, for validation before dispatch.
    pub fn identifiers(&self) -> Vec<&str> {
        fn walk<'a>(e: &'a Expansion, out: &mut Vec<&'a str>) {
            out.push(&e.table);
            out.push(&e.foreign_key);
            out.push(&e.references);
            out.extend(e.columns.iter().map(String::as_str));
            for n in &e.nested {
                walk(n, out);
            }
        }
        let mut out = Vec::new();
        if let Some(cols) = &self.selection.columns {
            out.extend(cols.iter().map(String::as_str));
        }
        for e in &self.selection.expand {
            walk(e, &mut out);
        }
        out.extend(self.order_by.as_deref());
        out.extend(self.filters.iter().map(|f| f.column.as_str()));
        out
    }
}

/// Client protocol of the relational store. Keys are matched by the store after coercing
/// them to the key column's type.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select(&self, table: &str, options: &ListOptions) -> Result<Vec<Row>, StoreError>;

    async fn select_by_key(&self, table: &str, column: &str, key: &Value) -> Result<Vec<Row>, StoreError>;

    /// Inserts one row and returns it as stored (generated key and defaults filled in).
    async fn insert(&self, table: &str, fields: &Row) -> Result<Row, StoreError>;

    /// Updates matching rows with `fields` and returns them as stored.
    async fn update(&self, table: &str, column: &str, key: &Value, fields: &Row) -> Result<Vec<Row>, StoreError>;

    /// Deletes matching rows and returns how many were removed.
    async fn delete(&self, table: &str, column: &str, key: &Value) -> Result<u64, StoreError>;

    async fn count(&self, table: &str) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_renders_as_select_expression() {
        let sel = Selection::all()
            .expand(Expansion::new("appointments", "appointment_id", "appointment_id", &["date"]).nest(
                Expansion::new("patients", "patient_id", "patient_id", &["name"]),
            ))
            .expand(Expansion::new("medicines", "medicine_id", "medicine_id", &["medicine_name"]));
        assert_eq!(
            sel.to_string(),
            "*, appointments(date, patients(name)), medicines(medicine_name)"
        );
        assert_eq!(Selection::columns(&["medicine_name", "stock_quantity"]).to_string(), "medicine_name, stock_quantity");
    }

    #[test]
    fn identifiers_cover_every_referenced_name() {
        let mut options = ListOptions::ordered("doctor_id", true);
        options.selection = Selection::all().expand(Expansion::new("departments", "department_id", "department_id", &["department_name"]));
        options.filters.push(Filter::eq("availability", "Mon"));
        let ids = options.identifiers();
        for name in ["departments", "department_id", "department_name", "doctor_id", "availability"] {
            assert!(ids.contains(&name), "missing {name}");
        }
    }
}
