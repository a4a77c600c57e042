use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{Result, TedError};
use crate::query::BoundQuery;
use crate::value::Value;

use super::Column;
use super::catalog::{
    Catalog, EnumInfo, ForeignKey, KeyCandidate, RelationKind, group_by_first, opt_text,
    parse_enum_literal, split_name, text, text_params, truthy,
};

const WHERE_RELATION: &str = "schema_name = COALESCE(?, current_schema()) AND table_name = ?";

pub struct DuckdbCatalog {
    backend: Arc<dyn Backend>,
}

impl DuckdbCatalog {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    fn params(name: &str) -> Vec<Value> {
        let (schema, table) = split_name(name);
        text_params(&[schema, Some(table)])
    }

    async fn constraints(&self, name: &str, kinds: &str, width: usize, select: &str) -> Result<Vec<Vec<Value>>> {
        let q = BoundQuery::with_params(
            format!(
                "SELECT constraint_index, {select} FROM duckdb_constraints() \
                 WHERE {WHERE_RELATION} AND constraint_type IN ({kinds}) \
                 ORDER BY constraint_index"
            ),
            Self::params(name),
            width,
        );
        self.backend.query("introspect", &q).await
    }
}

#[async_trait::async_trait]
impl Catalog for DuckdbCatalog {
    async fn relation_kind(&self, name: &str) -> Result<Option<RelationKind>> {
        let q = BoundQuery::with_params(
            "SELECT table_type FROM information_schema.tables \
             WHERE table_schema = COALESCE(?, current_schema()) AND table_name = ?",
            Self::params(name),
            1,
        );
        let row = self.backend.query_row("introspect", &q).await?;
        Ok(row.map(|r| match text(&r[0]).as_str() {
            "VIEW" => RelationKind::View,
            _ => RelationKind::Table,
        }))
    }

    async fn columns(&self, name: &str) -> Result<Vec<Column>> {
        let q = BoundQuery::with_params(
            format!(
                "SELECT column_name, data_type, is_nullable FROM duckdb_columns() \
                 WHERE {WHERE_RELATION} ORDER BY column_index"
            ),
            Self::params(name),
            3,
        );
        let rows = self.backend.query("introspect", &q).await?;
        Ok(rows
            .iter()
            .map(|r| Column::new(text(&r[0]), text(&r[1]), truthy(&r[2])))
            .collect())
    }

    async fn key_candidates(&self, name: &str) -> Result<Vec<KeyCandidate>> {
        let rows = self
            .constraints(
                name,
                "'PRIMARY KEY', 'UNIQUE'",
                3,
                "constraint_type, UNNEST(constraint_column_names)",
            )
            .await?;
        Ok(group_by_first(rows)
            .into_iter()
            .map(|(index, members)| {
                let kind = text(&members[0][1]);
                KeyCandidate {
                    name: format!("{}_{}", kind.to_ascii_lowercase().replace(' ', "_"), text(&index)),
                    primary: kind == "PRIMARY KEY",
                    columns: members.iter().map(|r| text(&r[2])).collect(),
                    nulls_not_distinct: false,
                }
            })
            .collect())
    }

    async fn foreign_keys(&self, name: &str) -> Result<Vec<ForeignKey>> {
        let rows = self
            .constraints(
                name,
                "'FOREIGN KEY'",
                4,
                "referenced_table, UNNEST(constraint_column_names), UNNEST(referenced_column_names)",
            )
            .await?;
        Ok(group_by_first(rows)
            .into_iter()
            .map(|(index, members)| ForeignKey {
                name: format!("fk_{}", text(&index)),
                foreign_table: text(&members[0][1]),
                columns: members.iter().map(|r| text(&r[2])).collect(),
                foreign_columns: members.iter().map(|r| opt_text(&r[3])).collect(),
            })
            .collect())
    }

    async fn enums(&self, _name: &str, columns: &[Column]) -> Result<Vec<EnumInfo>> {
        Ok(columns
            .iter()
            .filter_map(|c| {
                Some(EnumInfo {
                    column: c.name.clone(),
                    values: parse_enum_literal(&c.type_name)?,
                    custom_type_name: None,
                })
            })
            .collect())
    }

    async fn view_definition(&self, name: &str) -> Result<String> {
        let (schema, table) = split_name(name);
        let q = BoundQuery::with_params(
            "SELECT sql FROM duckdb_views() \
             WHERE schema_name = COALESCE(?, current_schema()) AND view_name = ?",
            text_params(&[schema, Some(table)]),
            1,
        );
        let row = self.backend.query_row("introspect", &q).await?;
        row.and_then(|r| opt_text(&r[0]))
            .ok_or_else(|| TedError::RelationNotFound(name.to_string()))
    }
}
