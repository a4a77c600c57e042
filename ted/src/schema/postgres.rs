use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{Result, TedError};
use crate::query::BoundQuery;

use super::Column;
use super::catalog::{
    Catalog, EnumInfo, ForeignKey, KeyCandidate, RelationKind, group_by_first, opt_text, text,
    text_params, truthy,
};

/// Resolves a possibly qualified, quoted relation name through the search path.
const REGCLASS: &str = "to_regclass($1)";

pub struct PostgresCatalog {
    backend: Arc<dyn Backend>,
}

impl PostgresCatalog {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    fn by_name(&self, sql: String, name: &str, width: usize) -> BoundQuery {
        let quoted = self.backend.dialect().quote_qualified(name);
        BoundQuery::with_params(sql, text_params(&[Some(&quoted)]), width)
    }
}

#[async_trait::async_trait]
impl Catalog for PostgresCatalog {
    async fn relation_kind(&self, name: &str) -> Result<Option<RelationKind>> {
        let q = self.by_name(
            format!("SELECT c.relkind::text FROM pg_class c WHERE c.oid = {REGCLASS}"),
            name,
            1,
        );
        let row = self.backend.query_row("introspect", &q).await?;
        Ok(row.and_then(|r| match text(&r[0]).as_str() {
            "r" | "p" | "f" => Some(RelationKind::Table),
            "v" | "m" => Some(RelationKind::View),
            _ => None,
        }))
    }

    async fn columns(&self, name: &str) -> Result<Vec<Column>> {
        let q = self.by_name(
            format!(
                "SELECT a.attname::text, format_type(a.atttypid, a.atttypmod), NOT a.attnotnull, \
                 t.typtype::text, t.typname::text \
                 FROM pg_attribute a JOIN pg_type t ON t.oid = a.atttypid \
                 WHERE a.attrelid = {REGCLASS} AND a.attnum > 0 AND NOT a.attisdropped \
                 ORDER BY a.attnum"
            ),
            name,
            5,
        );
        let rows = self.backend.query("introspect", &q).await?;
        Ok(rows
            .iter()
            .map(|r| {
                let mut col = Column::new(text(&r[0]), text(&r[1]), truthy(&r[2]));
                // enum, domain, composite
                if matches!(text(&r[3]).as_str(), "e" | "d" | "c") {
                    col.custom_type_name = opt_text(&r[4]);
                }
                col
            })
            .collect())
    }

    async fn key_candidates(&self, name: &str) -> Result<Vec<KeyCandidate>> {
        let nnd = if self.backend.dialect().supports_nulls_not_distinct {
            "i.indnullsnotdistinct"
        } else {
            "false"
        };
        let q = self.by_name(
            format!(
                "SELECT ci.relname::text, i.indisprimary, {nnd}, a.attname::text \
                 FROM pg_index i \
                 JOIN pg_class ci ON ci.oid = i.indexrelid \
                 CROSS JOIN LATERAL unnest(i.indkey) WITH ORDINALITY AS k(attnum, ord) \
                 JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = k.attnum \
                 WHERE i.indrelid = {REGCLASS} AND i.indisunique \
                 AND i.indpred IS NULL AND i.indexprs IS NULL \
                 ORDER BY ci.relname, k.ord"
            ),
            name,
            4,
        );
        let rows = self.backend.query("introspect", &q).await?;
        Ok(group_by_first(rows)
            .into_iter()
            .map(|(index, members)| KeyCandidate {
                name: text(&index),
                primary: truthy(&members[0][1]),
                nulls_not_distinct: truthy(&members[0][2]),
                columns: members.iter().map(|r| text(&r[3])).collect(),
            })
            .collect())
    }

    async fn foreign_keys(&self, name: &str) -> Result<Vec<ForeignKey>> {
        let q = self.by_name(
            format!(
                "SELECT con.conname::text, \
                 CASE WHEN fn.nspname = current_schema() THEN fc.relname::text \
                      ELSE fn.nspname::text || '.' || fc.relname::text END, \
                 la.attname::text, fa.attname::text \
                 FROM pg_constraint con \
                 JOIN pg_class fc ON fc.oid = con.confrelid \
                 JOIN pg_namespace fn ON fn.oid = fc.relnamespace \
                 CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(lnum, fnum, ord) \
                 JOIN pg_attribute la ON la.attrelid = con.conrelid AND la.attnum = k.lnum \
                 JOIN pg_attribute fa ON fa.attrelid = con.confrelid AND fa.attnum = k.fnum \
                 WHERE con.conrelid = {REGCLASS} AND con.contype = 'f' \
                 ORDER BY con.conname, k.ord"
            ),
            name,
            4,
        );
        let rows = self.backend.query("introspect", &q).await?;
        Ok(group_by_first(rows)
            .into_iter()
            .map(|(con, members)| ForeignKey {
                name: text(&con),
                foreign_table: text(&members[0][1]),
                columns: members.iter().map(|r| text(&r[2])).collect(),
                foreign_columns: members.iter().map(|r| opt_text(&r[3])).collect(),
            })
            .collect())
    }

    async fn enums(&self, name: &str, _columns: &[Column]) -> Result<Vec<EnumInfo>> {
        let q = self.by_name(
            format!(
                "SELECT a.attname::text, t.typname::text, e.enumlabel::text \
                 FROM pg_attribute a \
                 JOIN pg_type t ON t.oid = a.atttypid \
                 JOIN pg_enum e ON e.enumtypid = t.oid \
                 WHERE a.attrelid = {REGCLASS} AND a.attnum > 0 AND NOT a.attisdropped \
                 ORDER BY a.attnum, e.enumsortorder"
            ),
            name,
            3,
        );
        let rows = self.backend.query("introspect", &q).await?;
        Ok(group_by_first(rows)
            .into_iter()
            .map(|(column, members)| EnumInfo {
                column: text(&column),
                custom_type_name: opt_text(&members[0][1]),
                values: members.iter().map(|r| text(&r[2])).collect(),
            })
            .collect())
    }

    async fn view_definition(&self, name: &str) -> Result<String> {
        let q = self.by_name(format!("SELECT pg_get_viewdef({REGCLASS}, true)"), name, 1);
        let row = self.backend.query_row("introspect", &q).await?;
        let sql = row
            .and_then(|r| opt_text(&r[0]))
            .ok_or_else(|| TedError::RelationNotFound(name.to_string()))?;
        Ok(sql.trim().trim_end_matches(';').to_string())
    }
}
