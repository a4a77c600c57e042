use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{Result, TedError};
use crate::view::{self, ViewAnalysis};

use super::catalog::{self, Catalog, RelationKind};
use super::key::choose_key;
use super::{Column, Reference, Relation, index_columns};

/// Name given to ad-hoc SELECT relations.
const CUSTOM_SQL_NAME: &str = "query";

/// Load a table or view by name into a fully populated [`Relation`].
///
/// A table without a usable key is returned with an empty `key`; callers
/// decide whether that is fatal. A view without a derivable key is an error.
pub async fn introspect(backend: &Arc<dyn Backend>, name: &str) -> Result<Relation> {
    let catalog = catalog::for_backend(backend.clone());
    match catalog.relation_kind(name).await? {
        None => Err(TedError::RelationNotFound(name.to_string())),
        Some(RelationKind::Table) => table(backend, catalog.as_ref(), name).await,
        Some(RelationKind::View) => view(backend, catalog.as_ref(), name).await,
    }
}

/// Describe an ad-hoc SELECT as a view-like relation. Every output column
/// must have a name (bare column, alias or wildcard).
pub async fn introspect_sql(backend: &Arc<dyn Backend>, sql: &str) -> Result<Relation> {
    let parse_err = |message: String| TedError::ViewParse {
        name: CUSTOM_SQL_NAME.to_string(),
        message,
    };
    let db_type = backend.dialect().db_type;
    let query = view::parse(sql, db_type).map_err(parse_err)?;
    let (analysis, bases) = analyze_with_bases(backend, &query, CUSTOM_SQL_NAME).await?;

    let mut columns = Vec::with_capacity(analysis.columns.len());
    for (i, vc) in analysis.columns.iter().enumerate() {
        let name = vc
            .name
            .clone()
            .ok_or_else(|| parse_err(format!("output column {} needs an alias", i + 1)))?;
        let base = vc
            .lineage
            .as_ref()
            .and_then(|l| base_column(&bases, &l.table, &l.column));
        let mut col = match base {
            Some(b) => Column::new(name, b.type_name.clone(), b.nullable),
            None => Column::new(name, "", true),
        };
        if let Some(b) = base {
            col.enum_values = b.enum_values.clone();
            col.custom_type_name = b.custom_type_name.clone();
        }
        columns.push(col);
    }

    let mut relation = view_relation(CUSTOM_SQL_NAME, backend, columns, &analysis, bases)?;
    relation.is_custom_sql = true;
    relation.sql = Some(sql.trim().trim_end_matches(';').to_string());
    Ok(relation)
}

// ---------- tables ----------

async fn table(backend: &Arc<dyn Backend>, catalog: &dyn Catalog, name: &str) -> Result<Relation> {
    let db_type = backend.dialect().db_type;
    let mut columns = catalog.columns(name).await?;
    if columns.is_empty() {
        return Err(TedError::RelationNotFound(name.to_string()));
    }

    match catalog.enums(name, &columns).await {
        Ok(enums) => {
            for info in enums {
                if let Some(col) = columns
                    .iter_mut()
                    .find(|c| c.name.eq_ignore_ascii_case(&info.column))
                {
                    col.enum_values = info.values;
                    if info.custom_type_name.is_some() {
                        col.custom_type_name = info.custom_type_name;
                    }
                }
            }
        }
        Err(e) => tracing::warn!(relation = %name, error = %e, "enum introspection failed"),
    }

    let candidates = catalog.key_candidates(name).await?;
    let key = choose_key(db_type, &columns, &candidates);
    if key.is_empty() {
        tracing::info!(relation = %name, "no usable key; relation is read-only");
    }

    let mut relation = Relation::table(name, db_type, columns);
    relation.key = key;

    match foreign_references(catalog, &relation).await {
        Ok(refs) => attach_references(&mut relation, refs),
        Err(e) => tracing::warn!(relation = %name, error = %e, "foreign key introspection failed"),
    }

    tracing::debug!(
        relation = %name,
        columns = relation.columns.len(),
        key = ?relation.key_names(),
        references = relation.references.len(),
        "introspected table"
    );
    Ok(relation)
}

/// Columns and key of a referenced table; no references of its own.
async fn shallow_table(catalog: &dyn Catalog, db_type: crate::dialect::DbType, name: &str) -> Result<Relation> {
    let columns = catalog.columns(name).await?;
    if columns.is_empty() {
        return Err(TedError::RelationNotFound(name.to_string()));
    }
    let candidates = catalog.key_candidates(name).await?;
    let key = choose_key(db_type, &columns, &candidates);
    let mut relation = Relation::table(name, db_type, columns);
    relation.key = key;
    Ok(relation)
}

async fn foreign_references(catalog: &dyn Catalog, relation: &Relation) -> Result<Vec<Reference>> {
    let mut foreign: HashMap<String, Arc<Relation>> = HashMap::new();
    let mut refs = Vec::new();
    for fk in catalog.foreign_keys(&relation.name).await? {
        let Some(local) = fk
            .columns
            .iter()
            .map(|c| relation.column_position(c))
            .collect::<Option<Vec<usize>>>()
        else {
            tracing::warn!(constraint = %fk.name, "foreign key columns not found; skipped");
            continue;
        };

        let target = match foreign.get(&fk.foreign_table) {
            Some(t) => t.clone(),
            None => {
                let t = Arc::new(shallow_table(catalog, relation.db_type, &fk.foreign_table).await?);
                foreign.insert(fk.foreign_table.clone(), t.clone());
                t
            }
        };

        // an omitted column list refers to the primary key
        let target_key = target.key_names();
        let mut foreign_columns = BTreeMap::new();
        for (i, (&l, f)) in local.iter().zip(&fk.foreign_columns).enumerate() {
            let name = match f {
                Some(f) => f.clone(),
                None => match target_key.get(i) {
                    Some(k) => k.to_string(),
                    None => break,
                },
            };
            foreign_columns.insert(l, name);
        }
        if foreign_columns.len() != local.len() {
            tracing::warn!(constraint = %fk.name, "cannot resolve referenced columns; skipped");
            continue;
        }
        refs.push(Reference {
            foreign_table: target,
            foreign_columns,
        });
    }
    Ok(refs)
}

/// Append `refs`, pointing each participating column at the first constraint it belongs to.
fn attach_references(relation: &mut Relation, refs: Vec<Reference>) {
    for r in refs {
        let index = relation.references.len();
        for &c in r.foreign_columns.keys() {
            relation.columns[c].reference.get_or_insert(index);
        }
        relation.references.push(r);
    }
}

// ---------- views ----------

async fn view(backend: &Arc<dyn Backend>, catalog: &dyn Catalog, name: &str) -> Result<Relation> {
    let db_type = backend.dialect().db_type;
    let catalog_columns = catalog.columns(name).await?;
    let definition = catalog.view_definition(name).await?;
    let parse_err = |message: String| TedError::ViewParse {
        name: name.to_string(),
        message,
    };

    let query = view::parse(&definition, db_type).map_err(parse_err)?;
    let (analysis, bases) = analyze_with_bases(backend, &query, name).await?;
    if analysis.columns.len() != catalog_columns.len() {
        return Err(parse_err(format!(
            "definition yields {} columns, catalog reports {}",
            analysis.columns.len(),
            catalog_columns.len()
        )));
    }

    let columns = catalog_columns
        .into_iter()
        .zip(&analysis.columns)
        .map(|(mut col, vc)| {
            if let Some(b) = vc
                .lineage
                .as_ref()
                .and_then(|l| base_column(&bases, &l.table, &l.column))
            {
                if col.enum_values.is_empty() {
                    col.enum_values = b.enum_values.clone();
                }
                col.custom_type_name = col.custom_type_name.or_else(|| b.custom_type_name.clone());
            }
            col
        })
        .collect();

    view_relation(name, backend, columns, &analysis, bases)
}

/// Two-pass analysis: find the base tables, introspect them, then resolve
/// lineage against their columns.
async fn analyze_with_bases(
    backend: &Arc<dyn Backend>,
    query: &datafusion_sql::sqlparser::ast::Query,
    name: &str,
) -> Result<(ViewAnalysis, BTreeMap<String, Arc<Relation>>)> {
    let parse_err = |message: String| TedError::ViewParse {
        name: name.to_string(),
        message,
    };
    let first = view::analyze(query, &HashMap::new()).map_err(parse_err)?;

    let mut bases = BTreeMap::new();
    for table in &first.base_tables {
        // a base may itself be a view
        let base = Box::pin(introspect(backend, table)).await?;
        bases.insert(table.clone(), Arc::new(base));
    }
    let known: HashMap<String, Vec<String>> = bases
        .iter()
        .map(|(n, r)| (n.clone(), r.columns.iter().map(|c| c.name.clone()).collect()))
        .collect();

    let analysis = view::analyze(query, &known).map_err(parse_err)?;
    Ok((analysis, bases))
}

fn base_column<'a>(
    bases: &'a BTreeMap<String, Arc<Relation>>,
    table: &str,
    column: &str,
) -> Option<&'a Column> {
    let base = bases.get(table)?;
    base.columns.get(base.column_position(column)?)
}

fn view_relation(
    name: &str,
    backend: &Arc<dyn Backend>,
    mut columns: Vec<Column>,
    analysis: &ViewAnalysis,
    bases: BTreeMap<String, Arc<Relation>>,
) -> Result<Relation> {
    let view_key = analysis.derive_key(&bases);
    if view_key.key.is_empty() {
        return Err(TedError::ViewNotKeyable(name.to_string()));
    }

    for ((col, vc), editable) in columns.iter_mut().zip(&analysis.columns).zip(&view_key.editable) {
        col.editable = *editable;
        if let Some(l) = &vc.lineage {
            col.source_table = Some(l.table.clone());
            col.source_column = Some(l.column.clone());
            col.source_occurrence = Some(l.occurrence);
        }
    }

    let refs = view_references(&columns, &bases);
    let mut relation = Relation {
        name: name.to_string(),
        db_type: backend.dialect().db_type,
        is_view: true,
        column_index: index_columns(&columns),
        columns,
        key: view_key.key,
        references: Vec::new(),
        base_tables: bases,
        is_custom_sql: false,
        sql: None,
    };
    attach_references(&mut relation, refs);

    tracing::debug!(
        relation = %name,
        key = ?relation.key_names(),
        bases = ?relation.base_tables.keys().collect::<Vec<_>>(),
        "introspected view"
    );
    Ok(relation)
}

/// Base-table foreign keys whose local columns are all selected from the
/// same occurrence of that table.
fn view_references(columns: &[Column], bases: &BTreeMap<String, Arc<Relation>>) -> Vec<Reference> {
    let mut sources: Vec<(&str, usize)> = Vec::new();
    for c in columns {
        if let (Some(t), Some(o)) = (&c.source_table, c.source_occurrence)
            && !sources.contains(&(t.as_str(), o))
        {
            sources.push((t.as_str(), o));
        }
    }

    let mut refs = Vec::new();
    for (table, occurrence) in sources {
        let Some(base) = bases.get(table) else {
            continue;
        };
        for r in &base.references {
            let mapped: Option<BTreeMap<usize, String>> = r
                .foreign_columns
                .iter()
                .map(|(&local, foreign)| {
                    let base_name = &base.columns[local].name;
                    columns
                        .iter()
                        .position(|c| {
                            c.source_table.as_deref() == Some(table)
                                && c.source_occurrence == Some(occurrence)
                                && c.source_column
                                    .as_deref()
                                    .is_some_and(|s| s.eq_ignore_ascii_case(base_name))
                        })
                        .map(|pos| (pos, foreign.clone()))
                })
                .collect();
            if let Some(foreign_columns) = mapped {
                refs.push(Reference {
                    foreign_table: r.foreign_table.clone(),
                    foreign_columns,
                });
            }
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sea::SeaBackend;
    use crate::dialect::DbType;
    use crate::query::BoundQuery;

    async fn db(ddl: &[&str]) -> Arc<dyn Backend> {
        let backend = SeaBackend::connect("sqlite::memory:", DbType::Sqlite)
            .await
            .unwrap();
        for stmt in ddl {
            backend
                .execute("setup", &BoundQuery::raw(*stmt, 0))
                .await
                .unwrap();
        }
        Arc::new(backend)
    }

    const USERS: &str = "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)";
    const ORDERS: &str = "CREATE TABLE orders (id INTEGER PRIMARY KEY, \
                          user_id INTEGER NOT NULL REFERENCES users(id), total REAL)";

    #[tokio::test]
    async fn table_with_primary_key() {
        let backend = db(&[USERS]).await;
        let r = introspect(&backend, "users").await.unwrap();
        assert!(!r.is_view);
        assert_eq!(r.key_names(), vec!["id"]);
        assert_eq!(r.column_position("age"), Some(2));
        assert!(!r.columns[0].nullable);
    }

    #[tokio::test]
    async fn missing_relation() {
        let backend = db(&[]).await;
        let err = introspect(&backend, "nope").await.unwrap_err();
        assert!(matches!(err, TedError::RelationNotFound(_)));
    }

    #[tokio::test]
    async fn nullable_unique_leaves_table_read_only() {
        let backend = db(&[
            "CREATE TABLE tags (label TEXT, slug TEXT)",
            "CREATE UNIQUE INDEX tags_slug ON tags (slug)",
        ])
        .await;
        let r = introspect(&backend, "tags").await.unwrap();
        assert!(r.key.is_empty());
        assert!(!r.is_editable(0));
    }

    #[tokio::test]
    async fn foreign_keys_become_references() {
        let backend = db(&[USERS, ORDERS]).await;
        let r = introspect(&backend, "orders").await.unwrap();
        assert_eq!(r.references.len(), 1);
        let reference = &r.references[0];
        assert_eq!(reference.foreign_table.name, "users");
        assert_eq!(reference.foreign_columns.get(&1).map(String::as_str), Some("id"));
        assert_eq!(r.columns[1].reference, Some(0));
        assert_eq!(r.columns[0].reference, None);
    }

    #[tokio::test]
    async fn view_lineage_key_and_editability() {
        let backend = db(&[
            USERS,
            "CREATE VIEW users_v AS SELECT u.id, u.name, 1 AS one FROM users u",
        ])
        .await;
        let r = introspect(&backend, "users_v").await.unwrap();
        assert!(r.is_view);
        assert_eq!(r.key_names(), vec!["id"]);
        assert_eq!(r.columns[1].source_table.as_deref(), Some("users"));
        assert_eq!(r.columns[1].source_column.as_deref(), Some("name"));
        assert!(r.is_editable(1));
        assert!(!r.is_editable(2));
        assert!(r.base_tables.contains_key("users"));
    }

    #[tokio::test]
    async fn view_without_key_is_rejected() {
        let backend = db(&[USERS, "CREATE VIEW names AS SELECT name FROM users"]).await;
        let err = introspect(&backend, "names").await.unwrap_err();
        assert!(matches!(err, TedError::ViewNotKeyable(_)));
    }

    #[tokio::test]
    async fn view_references_follow_visible_columns() {
        let backend = db(&[
            USERS,
            ORDERS,
            "CREATE VIEW order_v AS SELECT o.id, o.user_id, o.total FROM orders o",
        ])
        .await;
        let r = introspect(&backend, "order_v").await.unwrap();
        assert_eq!(r.references.len(), 1);
        assert_eq!(r.columns[1].reference, Some(0));
    }

    #[tokio::test]
    async fn custom_sql_relation() {
        let backend = db(&[USERS]).await;
        let r = introspect_sql(&backend, "SELECT id, name AS who FROM users WHERE age > 3")
            .await
            .unwrap();
        assert!(r.is_custom_sql);
        assert_eq!(r.columns[1].name, "who");
        assert_eq!(r.key_names(), vec!["id"]);
        assert!(r.is_editable(1));

        let err = introspect_sql(&backend, "SELECT id, upper(name) FROM users")
            .await
            .unwrap_err();
        assert!(matches!(err, TedError::ViewParse { .. }));
    }
}
