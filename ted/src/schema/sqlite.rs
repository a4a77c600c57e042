use std::sync::Arc;

use regex::Regex;

use crate::backend::Backend;
use crate::error::{Result, TedError};
use crate::query::BoundQuery;
use crate::value::Value;

use super::Column;
use super::catalog::{
    Catalog, EnumInfo, ForeignKey, KeyCandidate, RelationKind, group_by_first, opt_text,
    quoted_literals, split_name, text, text_params, truthy,
};

/// `CHECK (col IN ('a', 'b'))`
const CHECK_IN: &str = r#"(?i)CHECK\s*\(\s*[\["`]?(\w+)[\]"`]?\s+IN\s*\(([^)]*)\)\s*\)"#;

pub struct SqliteCatalog {
    backend: Arc<dyn Backend>,
}

impl SqliteCatalog {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// `pragma_xxx(?)`, or `pragma_xxx(?, ?)` for an attached schema.
    fn pragma(function: &str, name: &str) -> (String, Vec<Value>) {
        let (schema, table) = split_name(name);
        match schema {
            Some(schema) => (
                format!("{function}(?, ?)"),
                text_params(&[Some(table), Some(schema)]),
            ),
            None => (format!("{function}(?)"), text_params(&[Some(table)])),
        }
    }

    fn master(&self, name: &str) -> (String, Vec<Value>) {
        let (schema, table) = split_name(name);
        let master = match schema {
            Some(schema) => format!("{}.sqlite_master", self.backend.dialect().quote(schema)),
            None => "sqlite_master".to_string(),
        };
        (master, text_params(&[Some(table)]))
    }

    async fn create_sql(&self, name: &str) -> Result<Option<String>> {
        let (master, params) = self.master(name);
        let q = BoundQuery::with_params(
            format!("SELECT sql FROM {master} WHERE name = ? COLLATE NOCASE"),
            params,
            1,
        );
        let row = self.backend.query_row("introspect", &q).await?;
        Ok(row.and_then(|r| opt_text(&r[0])))
    }
}

#[async_trait::async_trait]
impl Catalog for SqliteCatalog {
    async fn relation_kind(&self, name: &str) -> Result<Option<RelationKind>> {
        let (master, params) = self.master(name);
        let q = BoundQuery::with_params(
            format!(
                "SELECT type FROM {master} WHERE name = ? COLLATE NOCASE AND type IN ('table', 'view')"
            ),
            params,
            1,
        );
        let row = self.backend.query_row("introspect", &q).await?;
        Ok(row.map(|r| match text(&r[0]).as_str() {
            "view" => RelationKind::View,
            _ => RelationKind::Table,
        }))
    }

    async fn columns(&self, name: &str) -> Result<Vec<Column>> {
        let (from, params) = Self::pragma("pragma_table_info", name);
        let q = BoundQuery::with_params(
            format!("SELECT name, type, \"notnull\", pk FROM {from} ORDER BY cid"),
            params,
            4,
        );
        let rows = self.backend.query("introspect", &q).await?;
        let pk_count = rows.iter().filter(|r| truthy(&r[3])).count();
        Ok(rows
            .iter()
            .map(|r| {
                let type_name = text(&r[1]);
                // INTEGER PRIMARY KEY aliases the rowid and is never NULL
                let rowid_alias =
                    pk_count == 1 && truthy(&r[3]) && type_name.eq_ignore_ascii_case("integer");
                Column::new(text(&r[0]), type_name, !truthy(&r[2]) && !rowid_alias)
            })
            .collect())
    }

    async fn key_candidates(&self, name: &str) -> Result<Vec<KeyCandidate>> {
        let mut out = Vec::new();

        let (from, params) = Self::pragma("pragma_table_info", name);
        let q = BoundQuery::with_params(
            format!("SELECT name FROM {from} WHERE pk > 0 ORDER BY pk"),
            params,
            1,
        );
        let pk: Vec<String> = self
            .backend
            .query("introspect", &q)
            .await?
            .iter()
            .map(|r| text(&r[0]))
            .collect();
        if !pk.is_empty() {
            out.push(KeyCandidate {
                name: "primary".to_string(),
                columns: pk,
                primary: true,
                nulls_not_distinct: false,
            });
        }

        let (list, mut params) = Self::pragma("pragma_index_list", name);
        let info = match split_name(name).0 {
            Some(schema) => {
                params.push(Value::Text(schema.to_string()));
                "pragma_index_info(il.name, ?)"
            }
            None => "pragma_index_info(il.name)",
        };
        let q = BoundQuery::with_params(
            format!(
                "SELECT il.name, ii.name FROM {list} AS il, {info} AS ii \
                 WHERE il.\"unique\" = 1 AND il.partial = 0 AND il.origin <> 'pk' \
                 ORDER BY il.name, ii.seqno"
            ),
            params,
            2,
        );
        let rows = self.backend.query("introspect", &q).await?;
        for (index, members) in group_by_first(rows) {
            // expression indexes report NULL column names
            if members.iter().any(|r| r[1].is_null()) {
                continue;
            }
            out.push(KeyCandidate {
                name: text(&index),
                columns: members.iter().map(|r| text(&r[1])).collect(),
                primary: false,
                nulls_not_distinct: false,
            });
        }
        Ok(out)
    }

    async fn foreign_keys(&self, name: &str) -> Result<Vec<ForeignKey>> {
        let (from, params) = Self::pragma("pragma_foreign_key_list", name);
        let q = BoundQuery::with_params(
            format!("SELECT id, \"table\", \"from\", \"to\" FROM {from} ORDER BY id, seq"),
            params,
            4,
        );
        let rows = self.backend.query("introspect", &q).await?;
        Ok(group_by_first(rows)
            .into_iter()
            .map(|(id, members)| ForeignKey {
                name: format!("fk{}", text(&id)),
                foreign_table: text(&members[0][1]),
                columns: members.iter().map(|r| text(&r[2])).collect(),
                foreign_columns: members.iter().map(|r| opt_text(&r[3])).collect(),
            })
            .collect())
    }

    async fn enums(&self, name: &str, columns: &[Column]) -> Result<Vec<EnumInfo>> {
        let Some(sql) = self.create_sql(name).await? else {
            return Ok(Vec::new());
        };
        let re = Regex::new(CHECK_IN).map_err(|e| TedError::query("introspect", e))?;
        Ok(re
            .captures_iter(&sql)
            .filter_map(|cap| {
                let column = columns
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(&cap[1]))?;
                Some(EnumInfo {
                    column: column.name.clone(),
                    values: quoted_literals(&cap[2]),
                    custom_type_name: None,
                })
            })
            .collect())
    }

    async fn view_definition(&self, name: &str) -> Result<String> {
        self.create_sql(name)
            .await?
            .ok_or_else(|| TedError::RelationNotFound(name.to_string()))
    }
}
