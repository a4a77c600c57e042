//! Relation descriptors and schema introspection.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::dialect::{DbType, Dialect};
use crate::value::Value;

pub mod catalog;
pub mod introspect;
pub mod key;
mod mysql;
mod postgres;
mod sqlite;
mod duckdb;

pub use introspect::{introspect, introspect_sql};

/// A named source of rows: a table, a view or an ad-hoc SELECT.
#[derive(Debug, Clone)]
pub struct Relation {
    pub name: String,
    pub db_type: DbType,
    pub is_view: bool,
    pub columns: Vec<Column>,
    pub column_index: HashMap<String, usize>,
    /// Indices into `columns` forming the lookup key. Empty means read-only.
    pub key: Vec<usize>,
    pub references: Vec<Reference>,
    /// Base tables of a view, by name.
    pub base_tables: BTreeMap<String, Arc<Relation>>,
    pub is_custom_sql: bool,
    /// The SELECT text when `is_custom_sql`.
    pub sql: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Column {
    pub name: String,
    /// Declared type as reported by the backend.
    pub type_name: String,
    pub nullable: bool,
    /// Index into `Relation::references` of the foreign key this column is part of.
    pub reference: Option<usize>,
    pub enum_values: Vec<String>,
    pub custom_type_name: Option<String>,
    /// View lineage; both `None` for derived expressions and for table columns.
    pub source_table: Option<String>,
    pub source_column: Option<String>,
    /// Which occurrence of `source_table` in the view's FROM tree, so
    /// self-joins keep their rows apart.
    pub source_occurrence: Option<usize>,
    pub editable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
            editable: true,
            ..Default::default()
        }
    }
}

/// One foreign-key constraint.
#[derive(Debug, Clone)]
pub struct Reference {
    /// Shallow descriptor of the referenced table (columns only).
    pub foreign_table: Arc<Relation>,
    /// Local column index → referenced column name.
    pub foreign_columns: BTreeMap<usize, String>,
}

impl Relation {
    /// A table descriptor with no key, references or lineage yet.
    pub fn table(name: impl Into<String>, db_type: DbType, columns: Vec<Column>) -> Self {
        let column_index = index_columns(&columns);
        Self {
            name: name.into(),
            db_type,
            is_view: false,
            columns,
            column_index,
            key: Vec::new(),
            references: Vec::new(),
            base_tables: BTreeMap::new(),
            is_custom_sql: false,
            sql: None,
        }
    }

    pub fn is_keyable(&self) -> bool {
        !self.key.is_empty()
    }

    /// Exact match first, then ASCII case-insensitive.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied().or_else(|| {
            self.columns
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(name))
        })
    }

    pub fn key_names(&self) -> Vec<&str> {
        self.key
            .iter()
            .map(|&i| self.columns[i].name.as_str())
            .collect()
    }

    /// Project the key out of a full row.
    pub fn key_values(&self, row: &[Value]) -> Vec<Value> {
        self.key.iter().map(|&i| row[i].clone()).collect()
    }

    pub fn is_editable(&self, col: usize) -> bool {
        self.is_keyable() && self.columns.get(col).is_some_and(|c| c.editable)
    }

    /// The FROM item for this relation.
    pub fn from_clause(&self, dialect: &Dialect) -> String {
        match &self.sql {
            Some(sql) if self.is_custom_sql => format!("({sql}) AS ted_q"),
            _ => dialect.quote_qualified(&self.name),
        }
    }

    /// The single foreign key whose local columns are all in `visible`, if
    /// `col` takes part in exactly one such constraint.
    pub fn previewable_reference(&self, col: usize, visible: &[usize]) -> Option<&Reference> {
        let mut candidates = self.references.iter().filter(|r| {
            r.foreign_columns.contains_key(&col)
                && r.foreign_columns.keys().all(|c| visible.contains(c))
        });
        let first = candidates.next()?;
        candidates.next().is_none().then_some(first)
    }
}

pub(crate) fn index_columns(columns: &[Column]) -> HashMap<String, usize> {
    columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.clone(), i))
        .collect()
}
