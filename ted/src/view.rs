//! Static analysis of view definitions: base tables, column lineage and
//! the key a view row can be addressed by.
//!
//! Analysis runs twice. The first pass only needs the names of the base
//! tables so they can be introspected; the second pass receives their
//! column lists to expand wildcards and resolve unqualified references.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use datafusion_sql::sqlparser::ast::{
    Expr, GroupByExpr, Ident, JoinOperator, ObjectName, ObjectNamePart, Query, Select, SelectItem,
    SelectItemQualifiedWildcardKind, SetExpr, SetQuantifier, Statement, TableAlias, TableFactor,
    TableWithJoins,
};
use datafusion_sql::sqlparser::dialect::{
    Dialect as SqlDialect, DuckDbDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect,
};
use datafusion_sql::sqlparser::parser::Parser;
use regex::Regex;

use crate::dialect::DbType;
use crate::schema::Relation;

/// `CREATE [OR REPLACE] [TEMP] VIEW name [(cols)] AS <query>`
const CREATE_VIEW: &str = r"(?is)^\s*CREATE\b.*?\bVIEW\b.*?\bAS\s+(.*)$";

/// Where a view column's value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lineage {
    pub table: String,
    pub column: String,
    /// Which reference to `table` in the FROM tree (self-joins have several).
    pub occurrence: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewColumn {
    /// Output name when the SELECT item determines one.
    pub name: Option<String>,
    /// `None` for derived expressions.
    pub lineage: Option<Lineage>,
    expr: String,
}

#[derive(Debug, Clone, PartialEq)]
enum GroupTerm {
    Column(Lineage),
    Position(usize),
    Expr(String),
}

#[derive(Debug, Clone, Default)]
pub struct ViewAnalysis {
    /// Distinct base tables in order of first appearance.
    pub base_tables: Vec<String>,
    pub columns: Vec<ViewColumn>,
    pub has_group_by: bool,
    pub has_distinct: bool,
    group_by: Vec<GroupTerm>,
    /// Table name of each occurrence.
    occurrences: Vec<String>,
    /// Occurrences that cannot contribute to the view key.
    outer: BTreeSet<usize>,
}

/// Key positions and per-column editability derived for a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewKey {
    pub key: Vec<usize>,
    pub editable: Vec<bool>,
}

fn sql_dialect(db_type: DbType) -> Box<dyn SqlDialect> {
    match db_type {
        DbType::Sqlite => Box::new(SQLiteDialect {}),
        DbType::Postgres => Box::new(PostgreSqlDialect {}),
        DbType::Mysql => Box::new(MySqlDialect {}),
        DbType::Duckdb => Box::new(DuckDbDialect {}),
    }
}

/// The SELECT part of a view definition, which may be a full `CREATE VIEW`.
fn view_body(sql: &str) -> String {
    match Regex::new(CREATE_VIEW)
        .ok()
        .and_then(|re| re.captures(sql).map(|c| c[1].to_string()))
    {
        Some(body) => body,
        None => sql.to_string(),
    }
}

/// Parse a view definition (or an ad-hoc SELECT) into a query AST.
pub fn parse(sql: &str, db_type: DbType) -> Result<Query, String> {
    let body = view_body(sql);
    let dialect = sql_dialect(db_type);
    let mut statements = Parser::parse_sql(dialect.as_ref(), body.trim().trim_end_matches(';'))
        .map_err(|e| e.to_string())?;
    if statements.len() != 1 {
        return Err(format!("expected one statement, found {}", statements.len()));
    }
    match statements.remove(0) {
        Statement::Query(q) => Ok(*q),
        other => Err(format!("not a SELECT: {other}")),
    }
}

/// Analyze a parsed query. `known` maps base table names to their columns
/// and may be empty on the first pass.
pub fn analyze(query: &Query, known: &HashMap<String, Vec<String>>) -> Result<ViewAnalysis, String> {
    let mut analyzer = Analyzer {
        known,
        occurrences: Vec::new(),
        outer: BTreeSet::new(),
        base_tables: Vec::new(),
        ctes: Vec::new(),
    };
    let shape = analyzer.query(query)?;
    Ok(ViewAnalysis {
        base_tables: analyzer.base_tables,
        columns: shape.columns,
        has_group_by: shape.has_group_by,
        has_distinct: shape.has_distinct,
        group_by: shape.group_by,
        occurrences: analyzer.occurrences,
        outer: analyzer.outer,
    })
}

// ---------- analysis ----------

struct Shape {
    columns: Vec<ViewColumn>,
    has_group_by: bool,
    has_distinct: bool,
    group_by: Vec<GroupTerm>,
}

struct Cte {
    name: String,
    columns: Vec<ViewColumn>,
    occurrences: std::ops::Range<usize>,
}

enum Source {
    Table {
        binding: String,
        table: String,
        occurrence: usize,
    },
    Derived {
        binding: String,
        columns: Vec<ViewColumn>,
        occurrences: std::ops::Range<usize>,
    },
}

impl Source {
    fn binding(&self) -> &str {
        match self {
            Source::Table { binding, .. } | Source::Derived { binding, .. } => binding,
        }
    }
}

struct Analyzer<'a> {
    known: &'a HashMap<String, Vec<String>>,
    occurrences: Vec<String>,
    outer: BTreeSet<usize>,
    base_tables: Vec<String>,
    ctes: Vec<Cte>,
}

/// Unquoted identifiers compare case-insensitively; fold them.
fn ident_name(ident: &Ident) -> String {
    if ident.quote_style.is_some() {
        ident.value.clone()
    } else {
        ident.value.to_lowercase()
    }
}

fn object_name(name: &ObjectName) -> Result<String, String> {
    name.0
        .iter()
        .map(|part| match part {
            ObjectNamePart::Identifier(ident) => Ok(ident_name(ident)),
            #[allow(unreachable_patterns)]
            other => Err(format!("unsupported name part {other}")),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|parts| parts.join("."))
}

fn unwrap_nested(expr: &Expr) -> &Expr {
    match expr {
        Expr::Nested(inner) => unwrap_nested(inner),
        other => other,
    }
}

fn rename(columns: &mut [ViewColumn], alias: &TableAlias) {
    for (col, def) in columns.iter_mut().zip(&alias.columns) {
        col.name = Some(ident_name(&def.name));
    }
}

impl Analyzer<'_> {
    fn query(&mut self, query: &Query) -> Result<Shape, String> {
        let saved = self.ctes.len();
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                let name = ident_name(&cte.alias.name);
                let start = self.occurrences.len();
                if with.recursive {
                    // self references resolve to an opaque placeholder
                    self.ctes.push(Cte {
                        name: name.clone(),
                        columns: Vec::new(),
                        occurrences: start..start,
                    });
                }
                let mut shape = self.query(&cte.query)?;
                if with.recursive {
                    self.ctes.pop();
                }
                rename(&mut shape.columns, &cte.alias);
                self.ctes.push(Cte {
                    name,
                    columns: shape.columns,
                    occurrences: start..self.occurrences.len(),
                });
            }
        }
        let shape = self.set_expr(&query.body);
        self.ctes.truncate(saved);
        shape
    }

    fn set_expr(&mut self, body: &SetExpr) -> Result<Shape, String> {
        match body {
            SetExpr::Select(select) => self.select(select),
            SetExpr::Query(query) => self.query(query),
            SetExpr::SetOperation {
                set_quantifier,
                left,
                right,
                ..
            } => {
                let left = self.set_expr(left)?;
                self.set_expr(right)?;
                Ok(Shape {
                    columns: left
                        .columns
                        .into_iter()
                        .map(|c| ViewColumn { lineage: None, ..c })
                        .collect(),
                    has_group_by: false,
                    has_distinct: !matches!(
                        set_quantifier,
                        SetQuantifier::All | SetQuantifier::AllByName
                    ),
                    group_by: Vec::new(),
                })
            }
            other => Err(format!("unsupported query body: {other}")),
        }
    }

    fn mark_outer(&mut self, source: &Source) {
        match source {
            Source::Table { occurrence, .. } => {
                self.outer.insert(*occurrence);
            }
            Source::Derived { occurrences, .. } => self.outer.extend(occurrences.clone()),
        }
    }

    fn factor(&mut self, factor: &TableFactor, sources: &mut Vec<Source>) -> Result<(), String> {
        match factor {
            TableFactor::Table {
                name, alias, args, ..
            } => {
                let full = object_name(name)?;
                let binding = match alias {
                    Some(a) => ident_name(&a.name),
                    None => full.rsplit('.').next().unwrap_or(&full).to_string(),
                };
                if args.is_some() {
                    let start = self.occurrences.len();
                    sources.push(Source::Derived {
                        binding,
                        columns: Vec::new(),
                        occurrences: start..start,
                    });
                    return Ok(());
                }
                if let Some(cte) = self.ctes.iter().rev().find(|c| c.name == full) {
                    let mut columns = cte.columns.clone();
                    if let Some(a) = alias {
                        rename(&mut columns, a);
                    }
                    sources.push(Source::Derived {
                        binding,
                        columns,
                        occurrences: cte.occurrences.clone(),
                    });
                    return Ok(());
                }
                let occurrence = self.occurrences.len();
                self.occurrences.push(full.clone());
                if !self.base_tables.contains(&full) {
                    self.base_tables.push(full.clone());
                }
                sources.push(Source::Table {
                    binding,
                    table: full,
                    occurrence,
                });
                Ok(())
            }
            TableFactor::Derived {
                subquery, alias, ..
            } => {
                let start = self.occurrences.len();
                let mut shape = self.query(subquery)?;
                if let Some(a) = alias {
                    rename(&mut shape.columns, a);
                }
                sources.push(Source::Derived {
                    binding: alias.as_ref().map(|a| ident_name(&a.name)).unwrap_or_default(),
                    columns: shape.columns,
                    occurrences: start..self.occurrences.len(),
                });
                Ok(())
            }
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.table_with_joins(table_with_joins, sources),
            other => Err(format!("unsupported FROM item: {other}")),
        }
    }

    fn table_with_joins(&mut self, twj: &TableWithJoins, sources: &mut Vec<Source>) -> Result<(), String> {
        let first = sources.len();
        self.factor(&twj.relation, sources)?;
        for join in &twj.joins {
            let left_end = sources.len();
            self.factor(&join.relation, sources)?;
            let (left_outer, right_outer) = match &join.join_operator {
                JoinOperator::Join(_) | JoinOperator::Inner(_) => (false, false),
                JoinOperator::Left(_) | JoinOperator::LeftOuter(_) => (false, true),
                JoinOperator::Right(_) | JoinOperator::RightOuter(_) => (true, false),
                JoinOperator::FullOuter(_) => (true, true),
                // cross joins, semi/anti joins, APPLY and the like
                _ => (false, true),
            };
            if left_outer {
                for i in first..left_end {
                    let s = std::mem::replace(
                        &mut sources[i],
                        Source::Derived {
                            binding: String::new(),
                            columns: Vec::new(),
                            occurrences: 0..0,
                        },
                    );
                    self.mark_outer(&s);
                    sources[i] = s;
                }
            }
            if right_outer {
                for i in left_end..sources.len() {
                    let s = std::mem::replace(
                        &mut sources[i],
                        Source::Derived {
                            binding: String::new(),
                            columns: Vec::new(),
                            occurrences: 0..0,
                        },
                    );
                    self.mark_outer(&s);
                    sources[i] = s;
                }
            }
        }
        Ok(())
    }

    fn known_columns(&self, table: &str) -> Option<&Vec<String>> {
        self.known.get(table)
    }

    fn column_in(&self, source: &Source, column: &str) -> Option<Option<Lineage>> {
        match source {
            Source::Table {
                table, occurrence, ..
            } => {
                let name = match self.known_columns(table) {
                    Some(cols) => cols.iter().find(|c| c.eq_ignore_ascii_case(column))?.clone(),
                    None => column.to_string(),
                };
                Some(Some(Lineage {
                    table: table.clone(),
                    column: name,
                    occurrence: *occurrence,
                }))
            }
            Source::Derived { columns, .. } => columns
                .iter()
                .find(|c| c.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(column)))
                .map(|c| c.lineage.clone()),
        }
    }

    /// Lineage of a bare column reference; `None` for anything else or when ambiguous.
    fn resolve(&self, expr: &Expr, sources: &[Source]) -> Option<Lineage> {
        match unwrap_nested(expr) {
            Expr::Identifier(ident) => {
                let column = ident_name(ident);
                let mut hits = sources.iter().filter_map(|s| match s {
                    Source::Table { table, .. } if self.known_columns(table).is_none() => {
                        // unknown columns: only a lone source can claim it
                        (sources.len() == 1).then(|| self.column_in(s, &column)).flatten()
                    }
                    _ => self.column_in(s, &column),
                });
                let first = hits.next()?;
                if hits.next().is_some() {
                    return None;
                }
                first
            }
            Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
                let column = ident_name(&parts[parts.len() - 1]);
                let qualifier: Vec<String> = parts[..parts.len() - 1].iter().map(ident_name).collect();
                let joined = qualifier.join(".");
                let binding = qualifier.last()?;
                let source = sources.iter().find(|s| match s {
                    Source::Table { table, binding: b, .. } => b == binding || *table == joined,
                    Source::Derived { binding: b, .. } => b == binding,
                })?;
                self.column_in(source, &column).flatten()
            }
            _ => None,
        }
    }

    fn expand(&self, source: &Source) -> Result<Vec<ViewColumn>, String> {
        match source {
            Source::Table {
                table, occurrence, ..
            } => Ok(self
                .known_columns(table)
                .map(|cols| {
                    cols.iter()
                        .map(|c| ViewColumn {
                            name: Some(c.clone()),
                            lineage: Some(Lineage {
                                table: table.clone(),
                                column: c.clone(),
                                occurrence: *occurrence,
                            }),
                            expr: c.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default()),
            Source::Derived { columns, .. } => Ok(columns.clone()),
        }
    }

    fn select(&mut self, select: &Select) -> Result<Shape, String> {
        let mut sources = Vec::new();
        for twj in &select.from {
            self.table_with_joins(twj, &mut sources)?;
        }

        let mut columns = Vec::new();
        for item in &select.projection {
            match item {
                SelectItem::UnnamedExpr(expr) => {
                    let name = match unwrap_nested(expr) {
                        Expr::Identifier(i) => Some(ident_name(i)),
                        Expr::CompoundIdentifier(parts) => parts.last().map(ident_name),
                        _ => None,
                    };
                    columns.push(ViewColumn {
                        name,
                        lineage: self.resolve(expr, &sources),
                        expr: expr.to_string(),
                    });
                }
                SelectItem::ExprWithAlias { expr, alias } => columns.push(ViewColumn {
                    name: Some(ident_name(alias)),
                    lineage: self.resolve(expr, &sources),
                    expr: expr.to_string(),
                }),
                SelectItem::Wildcard(_) => {
                    for s in &sources {
                        columns.extend(self.expand(s)?);
                    }
                }
                SelectItem::QualifiedWildcard(kind, _) => match kind {
                    SelectItemQualifiedWildcardKind::ObjectName(name) => {
                        let qualifier = object_name(name)?;
                        let binding = qualifier.rsplit('.').next().unwrap_or(&qualifier);
                        let source = sources
                            .iter()
                            .find(|s| s.binding() == binding)
                            .ok_or_else(|| format!("unknown table {qualifier} in {qualifier}.*"))?;
                        columns.extend(self.expand(source)?);
                    }
                    SelectItemQualifiedWildcardKind::Expr(e) => {
                        return Err(format!("unsupported wildcard {e}.*"));
                    }
                },
            }
        }

        let (has_group_by, group_by) = match &select.group_by {
            GroupByExpr::Expressions(exprs, _) => {
                let terms = exprs
                    .iter()
                    .map(|e| self.group_term(e, &sources, &columns))
                    .collect::<Vec<_>>();
                (!exprs.is_empty(), terms)
            }
            GroupByExpr::All(_) => (
                true,
                columns
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.lineage.is_some())
                    .map(|(i, _)| GroupTerm::Position(i))
                    .collect(),
            ),
        };

        Ok(Shape {
            columns,
            has_group_by,
            has_distinct: select.distinct.is_some(),
            group_by,
        })
    }

    fn group_term(&self, expr: &Expr, sources: &[Source], columns: &[ViewColumn]) -> GroupTerm {
        let text = expr.to_string();
        if let Ok(n) = text.parse::<usize>()
            && n >= 1
        {
            return GroupTerm::Position(n - 1);
        }
        if let Some(l) = self.resolve(expr, sources) {
            return GroupTerm::Column(l);
        }
        if let Expr::Identifier(ident) = unwrap_nested(expr) {
            let name = ident_name(ident);
            if let Some(i) = columns.iter().position(|c| c.name.as_deref() == Some(name.as_str())) {
                return GroupTerm::Position(i);
            }
        }
        GroupTerm::Expr(text)
    }
}

// ---------- key derivation ----------

impl ViewAnalysis {
    fn position_of(&self, occurrence: usize, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| {
            c.lineage
                .as_ref()
                .is_some_and(|l| l.occurrence == occurrence && l.column.eq_ignore_ascii_case(column))
        })
    }

    /// View positions of an occurrence's full base key, if all of it is selected.
    fn visible_key(&self, occurrence: usize, bases: &BTreeMap<String, Arc<Relation>>) -> Option<Vec<usize>> {
        let base = bases.get(&self.occurrences[occurrence])?;
        if !base.is_keyable() {
            return None;
        }
        base.key_names()
            .into_iter()
            .map(|k| self.position_of(occurrence, k))
            .collect()
    }

    fn grouped_on(&self, occurrence: usize, column: &str) -> bool {
        self.group_by.iter().any(|t| {
            let lineage = match t {
                GroupTerm::Column(l) => Some(l),
                GroupTerm::Position(p) => self.columns.get(*p).and_then(|c| c.lineage.as_ref()),
                GroupTerm::Expr(_) => None,
            };
            lineage.is_some_and(|l| l.occurrence == occurrence && l.column.eq_ignore_ascii_case(column))
        })
    }

    fn contributing(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.occurrences.len()).filter(|o| !self.outer.contains(o))
    }

    /// Derive the view key and which columns may be edited.
    pub fn derive_key(&self, bases: &BTreeMap<String, Arc<Relation>>) -> ViewKey {
        let mut key: Vec<usize> = Vec::new();

        let grouped_keys = || -> Option<Vec<usize>> {
            let mut out = Vec::new();
            let mut any = false;
            for o in self.contributing() {
                any = true;
                let base = bases.get(&self.occurrences[o])?;
                if !base.is_keyable() || !base.key_names().iter().all(|k| self.grouped_on(o, k)) {
                    return None;
                }
                out.extend(self.visible_key(o, bases)?);
            }
            any.then_some(out)
        };

        if self.has_group_by {
            if let Some(k) = grouped_keys() {
                key = k;
            } else {
                for term in &self.group_by {
                    let pos = match term {
                        GroupTerm::Column(l) => self
                            .columns
                            .iter()
                            .position(|c| c.lineage.as_ref() == Some(l)),
                        GroupTerm::Position(p) => (*p < self.columns.len()).then_some(*p),
                        GroupTerm::Expr(text) => self.columns.iter().position(|c| c.expr == *text),
                    };
                    key.extend(pos);
                }
            }
        } else if self.has_distinct {
            key = (0..self.columns.len()).collect();
        } else {
            for o in self.contributing() {
                if let Some(k) = self.visible_key(o, bases) {
                    key.extend(k);
                }
            }
        }

        let mut seen = BTreeSet::new();
        key.retain(|p| seen.insert(*p));

        let editable = self
            .columns
            .iter()
            .map(|c| {
                c.lineage
                    .as_ref()
                    .is_some_and(|l| self.visible_key(l.occurrence, bases).is_some())
            })
            .collect();

        ViewKey { key, editable }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn table(name: &str, cols: &[&str], key: &[usize]) -> Arc<Relation> {
        let mut r = Relation::table(
            name,
            DbType::Sqlite,
            cols.iter().map(|c| Column::new(*c, "INTEGER", true)).collect(),
        );
        r.key = key.to_vec();
        Arc::new(r)
    }

    fn catalog() -> BTreeMap<String, Arc<Relation>> {
        BTreeMap::from([
            ("users".to_string(), table("users", &["id", "name", "age"], &[0])),
            ("orders".to_string(), table("orders", &["id", "user_id", "total"], &[0])),
            ("pairs".to_string(), table("pairs", &["a", "b", "label"], &[0, 1])),
        ])
    }

    fn known() -> HashMap<String, Vec<String>> {
        catalog()
            .into_iter()
            .map(|(k, r)| (k, r.columns.iter().map(|c| c.name.clone()).collect()))
            .collect()
    }

    fn run(sql: &str) -> (ViewAnalysis, ViewKey) {
        let q = parse(sql, DbType::Sqlite).unwrap();
        let a = analyze(&q, &known()).unwrap();
        let k = a.derive_key(&catalog());
        (a, k)
    }

    fn lineage(a: &ViewAnalysis) -> Vec<Option<(String, String)>> {
        a.columns
            .iter()
            .map(|c| c.lineage.as_ref().map(|l| (l.table.clone(), l.column.clone())))
            .collect()
    }

    fn some(t: &str, c: &str) -> Option<(String, String)> {
        Some((t.to_string(), c.to_string()))
    }

    #[test]
    fn simple_view_with_alias_and_derived_column() {
        let (a, k) = run("CREATE VIEW v AS SELECT u.id, u.name, 1 AS one FROM users u");
        assert_eq!(a.base_tables, vec!["users"]);
        assert_eq!(lineage(&a), vec![some("users", "id"), some("users", "name"), None]);
        assert_eq!(k.key, vec![0]);
        assert_eq!(k.editable, vec![true, true, false]);
    }

    #[test]
    fn first_pass_collects_base_tables_only() {
        let q = parse(
            "SELECT * FROM users u JOIN orders o ON o.user_id = u.id",
            DbType::Sqlite,
        )
        .unwrap();
        let a = analyze(&q, &HashMap::new()).unwrap();
        assert_eq!(a.base_tables, vec!["users", "orders"]);
        assert!(a.columns.is_empty());
    }

    #[test]
    fn wildcard_expands_from_known_columns() {
        let (a, k) = run("SELECT * FROM users");
        assert_eq!(a.columns.len(), 3);
        assert_eq!(k.key, vec![0]);
        assert!(k.editable.iter().all(|e| *e));
    }

    #[test]
    fn join_keys_union_and_hidden_keys_block_edits() {
        let (_, k) = run(
            "SELECT u.id, u.name, o.id AS order_id, o.total \
             FROM users u JOIN orders o ON o.user_id = u.id",
        );
        assert_eq!(k.key, vec![0, 2]);
        assert_eq!(k.editable, vec![true, true, true, true]);

        let (_, k) = run(
            "SELECT u.id, u.name, o.total FROM users u JOIN orders o ON o.user_id = u.id",
        );
        assert_eq!(k.key, vec![0]);
        assert_eq!(k.editable, vec![true, true, false]);
    }

    #[test]
    fn outer_joined_tables_do_not_contribute_keys() {
        let (_, k) = run(
            "SELECT u.id, u.name, o.id AS oid FROM users u LEFT JOIN orders o ON o.user_id = u.id",
        );
        assert_eq!(k.key, vec![0]);
        let (_, k) = run(
            "SELECT u.id, o.id AS oid FROM users u RIGHT JOIN orders o ON o.user_id = u.id",
        );
        assert_eq!(k.key, vec![1]);
        let (_, k) = run("SELECT u.id, o.id AS oid FROM users u CROSS JOIN orders o");
        assert_eq!(k.key, vec![0]);
    }

    #[test]
    fn group_by_covering_base_key() {
        let (_, k) = run("SELECT u.id, u.name, count(*) AS n FROM users u GROUP BY u.id, u.name");
        assert_eq!(k.key, vec![0]);
        assert_eq!(k.editable, vec![true, true, false]);
    }

    #[test]
    fn group_by_without_base_key_uses_group_columns() {
        let (a, k) = run("SELECT age, count(*) AS n FROM users GROUP BY age");
        assert!(a.has_group_by);
        assert_eq!(k.key, vec![0]);
        assert_eq!(k.editable, vec![false, false]);

        let (_, k) = run("SELECT lower(name) AS l, count(*) FROM users GROUP BY 1");
        assert_eq!(k.key, vec![0]);
        let (_, k) = run("SELECT lower(name) AS l, count(*) FROM users GROUP BY lower(name)");
        assert_eq!(k.key, vec![0]);
    }

    #[test]
    fn distinct_keys_every_column() {
        let (a, k) = run("SELECT DISTINCT name, age FROM users");
        assert!(a.has_distinct);
        assert_eq!(k.key, vec![0, 1]);
    }

    #[test]
    fn ctes_and_subqueries_carry_lineage() {
        let (a, k) = run(
            "WITH adults AS (SELECT id, name FROM users WHERE age >= 18) \
             SELECT a.id, a.name FROM adults a",
        );
        assert_eq!(a.base_tables, vec!["users"]);
        assert_eq!(lineage(&a), vec![some("users", "id"), some("users", "name")]);
        assert_eq!(k.key, vec![0]);

        let (a, _) = run("SELECT s.x FROM (SELECT id AS x FROM users) AS s");
        assert_eq!(lineage(&a), vec![some("users", "id")]);
    }

    #[test]
    fn composite_keys_need_every_part() {
        let (_, k) = run("SELECT a, b, label FROM pairs");
        assert_eq!(k.key, vec![0, 1]);
        let (_, k) = run("SELECT a, label FROM pairs");
        assert!(k.key.is_empty());
        assert_eq!(k.editable, vec![false, false]);
    }

    #[test]
    fn self_join_keeps_occurrences_apart() {
        let (_, k) = run(
            "SELECT p.id, p.name, c.id AS child_id, c.name AS child \
             FROM users p JOIN users c ON c.age = p.id",
        );
        assert_eq!(k.key, vec![0, 2]);
        assert!(k.editable.iter().all(|e| *e));
    }

    #[test]
    fn union_all_is_not_keyable_but_union_is() {
        let (a, k) = run("SELECT id FROM users UNION ALL SELECT id FROM orders");
        assert_eq!(a.base_tables, vec!["users", "orders"]);
        assert!(k.key.is_empty());
        let (_, k) = run("SELECT id FROM users UNION SELECT id FROM orders");
        assert_eq!(k.key, vec![0]);
        assert_eq!(k.editable, vec![false]);
    }

    #[test]
    fn ambiguous_unqualified_reference_is_derived() {
        let (a, _) = run("SELECT id FROM users, orders");
        assert_eq!(lineage(&a), vec![None]);
    }

    #[test]
    fn rejects_non_queries() {
        assert!(parse("DELETE FROM users", DbType::Sqlite).is_err());
        assert!(parse("SELECT FROM WHERE", DbType::Sqlite).is_err());
    }

    #[test]
    fn create_view_prefix_is_stripped() {
        assert_eq!(
            view_body("CREATE VIEW IF NOT EXISTS v (a) AS SELECT id FROM users"),
            "SELECT id FROM users"
        );
        assert_eq!(view_body("SELECT 1"), "SELECT 1");
    }
}
