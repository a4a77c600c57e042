use std::sync::Arc;

use crate::backend::Backend;
use crate::dialect::DbType;
use crate::error::Result;
use crate::value::Value;

use super::Column;

// ---------- catalog facts ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Table,
    View,
}

/// A primary key or unique constraint/index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCandidate {
    pub name: String,
    pub columns: Vec<String>,
    pub primary: bool,
    /// PostgreSQL `NULLS NOT DISTINCT`: NULLs collide, so nullable columns are fine.
    pub nulls_not_distinct: bool,
}

/// One foreign-key constraint, columns in constraint order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub name: String,
    pub foreign_table: String,
    pub columns: Vec<String>,
    /// `None` entries mean "the referenced table's primary key column at this position".
    pub foreign_columns: Vec<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumInfo {
    pub column: String,
    pub values: Vec<String>,
    pub custom_type_name: Option<String>,
}

// ---------- trait ----------

/// Per-backend system-catalog queries.
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    async fn relation_kind(&self, name: &str) -> Result<Option<RelationKind>>;

    /// Columns in declaration order. Works for views too.
    async fn columns(&self, name: &str) -> Result<Vec<Column>>;

    async fn key_candidates(&self, name: &str) -> Result<Vec<KeyCandidate>>;

    async fn foreign_keys(&self, name: &str) -> Result<Vec<ForeignKey>>;

    /// Enum membership and custom type names for `columns` of `name`.
    async fn enums(&self, name: &str, columns: &[Column]) -> Result<Vec<EnumInfo>>;

    /// The view's SELECT text, or a full `CREATE VIEW` statement.
    async fn view_definition(&self, name: &str) -> Result<String>;
}

// ---------- factory ----------

pub fn for_backend(backend: Arc<dyn Backend>) -> Box<dyn Catalog> {
    match backend.dialect().db_type {
        DbType::Sqlite => Box::new(super::sqlite::SqliteCatalog::new(backend)),
        DbType::Postgres => Box::new(super::postgres::PostgresCatalog::new(backend)),
        DbType::Mysql => Box::new(super::mysql::MysqlCatalog::new(backend)),
        DbType::Duckdb => Box::new(super::duckdb::DuckdbCatalog::new(backend)),
    }
}

// ---------- helpers shared by the catalog modules ----------

/// Split `schema.table` into its parts; the schema is optional.
pub(crate) fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('.') {
        Some((schema, table)) => (Some(schema), table),
        None => (None, name),
    }
}

pub(crate) fn text_params(values: &[Option<&str>]) -> Vec<Value> {
    values
        .iter()
        .map(|v| match v {
            Some(s) => Value::Text(s.to_string()),
            None => Value::Null,
        })
        .collect()
}

pub(crate) fn text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn opt_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Truthiness of catalog flags, which arrive as booleans, integers or `YES`/`NO`.
pub(crate) fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Text(s) => matches!(s.to_ascii_uppercase().as_str(), "YES" | "Y" | "TRUE" | "T" | "1"),
        _ => false,
    }
}

/// Group consecutive rows by their first cell.
pub(crate) fn group_by_first(rows: Vec<Vec<Value>>) -> Vec<(Value, Vec<Vec<Value>>)> {
    let mut groups: Vec<(Value, Vec<Vec<Value>>)> = Vec::new();
    for row in rows {
        let Some(head) = row.first().cloned() else {
            continue;
        };
        match groups.last_mut() {
            Some((k, members)) if *k == head => members.push(row),
            _ => groups.push((head, vec![row])),
        }
    }
    groups
}

/// Values of an `enum('a','b')` style type string.
pub(crate) fn parse_enum_literal(type_name: &str) -> Option<Vec<String>> {
    let lower = type_name.trim().to_ascii_lowercase();
    if !(lower.starts_with("enum(") || lower.starts_with("enum (")) {
        return None;
    }
    let open = type_name.find('(')?;
    let close = type_name.rfind(')')?;
    Some(quoted_literals(&type_name[open + 1..close]))
}

/// All single-quoted SQL string literals in `s`, with `''` unescaped.
pub(crate) fn quoted_literals(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut lit = String::new();
        loop {
            match chars.next() {
                Some('\'') if chars.peek() == Some(&'\'') => {
                    chars.next();
                    lit.push('\'');
                }
                Some('\'') | None => break,
                Some(ch) => lit.push(ch),
            }
        }
        out.push(lit);
    }
    out
}
