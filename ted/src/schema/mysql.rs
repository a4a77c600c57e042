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

/// Restricts an `information_schema` query to one relation.
const WHERE_RELATION: &str = "table_schema = COALESCE(?, DATABASE()) AND table_name = ?";

pub struct MysqlCatalog {
    backend: Arc<dyn Backend>,
}

impl MysqlCatalog {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    fn params(name: &str) -> Vec<Value> {
        let (schema, table) = split_name(name);
        text_params(&[schema, Some(table)])
    }
}

#[async_trait::async_trait]
impl Catalog for MysqlCatalog {
    async fn relation_kind(&self, name: &str) -> Result<Option<RelationKind>> {
        let q = BoundQuery::with_params(
            format!("SELECT table_type FROM information_schema.tables WHERE {WHERE_RELATION}"),
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
                "SELECT column_name, column_type, is_nullable \
                 FROM information_schema.columns WHERE {WHERE_RELATION} \
                 ORDER BY ordinal_position"
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
        let q = BoundQuery::with_params(
            format!(
                "SELECT index_name, column_name FROM information_schema.statistics \
                 WHERE {WHERE_RELATION} AND non_unique = 0 \
                 ORDER BY index_name, seq_in_index"
            ),
            Self::params(name),
            2,
        );
        let rows = self.backend.query("introspect", &q).await?;
        Ok(group_by_first(rows)
            .into_iter()
            // functional key parts have no column name
            .filter(|(_, members)| members.iter().all(|r| !r[1].is_null()))
            .map(|(index, members)| {
                let name = text(&index);
                KeyCandidate {
                    primary: name == "PRIMARY",
                    name,
                    columns: members.iter().map(|r| text(&r[1])).collect(),
                    nulls_not_distinct: false,
                }
            })
            .collect())
    }

    async fn foreign_keys(&self, name: &str) -> Result<Vec<ForeignKey>> {
        let (schema, _) = split_name(name);
        let q = BoundQuery::with_params(
            format!(
                "SELECT constraint_name, referenced_table_schema, referenced_table_name, \
                 column_name, referenced_column_name \
                 FROM information_schema.key_column_usage \
                 WHERE {WHERE_RELATION} AND referenced_table_name IS NOT NULL \
                 ORDER BY constraint_name, ordinal_position"
            ),
            Self::params(name),
            5,
        );
        let rows = self.backend.query("introspect", &q).await?;
        Ok(group_by_first(rows)
            .into_iter()
            .map(|(con, members)| {
                let foreign_schema = text(&members[0][1]);
                let foreign_name = text(&members[0][2]);
                // qualify only when the name came qualified
                let foreign_table = match schema {
                    Some(_) => format!("{foreign_schema}.{foreign_name}"),
                    None => foreign_name,
                };
                ForeignKey {
                    name: text(&con),
                    foreign_table,
                    columns: members.iter().map(|r| text(&r[3])).collect(),
                    foreign_columns: members.iter().map(|r| opt_text(&r[4])).collect(),
                }
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
        let q = BoundQuery::with_params(
            format!("SELECT view_definition FROM information_schema.views WHERE {WHERE_RELATION}"),
            Self::params(name),
            1,
        );
        let row = self.backend.query_row("introspect", &q).await?;
        row.and_then(|r| opt_text(&r[0]))
            .ok_or_else(|| TedError::RelationNotFound(name.to_string()))
    }
}
