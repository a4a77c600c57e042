//! Parameterized SQL for pagination, lookups and mutations.
//!
//! Every statement the engine issues against a relation is rendered here so
//! quoting, placeholder numbering and parameter order stay consistent.
//! Precondition violations (empty key, unknown column) are programming
//! errors and panic.

use crate::dialect::Dialect;
use crate::schema::Relation;
use crate::value::Value;

/// SQL text plus the parameters bound to its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub params: Vec<Value>,
    /// Number of result columns to decode.
    pub width: usize,
}

impl BoundQuery {
    /// A query with no parameters.
    pub fn raw(sql: impl Into<String>, width: usize) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            width,
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<Value>, width: usize) -> Self {
        Self {
            sql: sql.into(),
            params,
            width,
        }
    }
}

/// A column of the pagination order with its natural (scroll-down) direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: usize,
    pub ascending: bool,
}

/// Optional user sort applied ahead of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortColumn {
    pub column: usize,
    pub ascending: bool,
}

/// Pagination order: the sort column (if any) followed by every key column ascending.
pub fn order_terms(relation: &Relation, sort: Option<SortColumn>) -> Vec<OrderTerm> {
    assert!(relation.is_keyable(), "pagination requires a key");
    sort.map(|s| OrderTerm {
        column: s.column,
        ascending: s.ascending,
    })
    .into_iter()
    .chain(relation.key.iter().map(|&column| OrderTerm {
        column,
        ascending: true,
    }))
    .collect()
}

/// Request for one pagination SELECT.
#[derive(Debug, Clone, Copy)]
pub struct Page<'a> {
    pub order: &'a [OrderTerm],
    pub scroll_down: bool,
    pub inclusive: bool,
    /// Values aligned with `order`; `None` for an initial load.
    pub anchor: Option<&'a [Value]>,
    pub limit: Option<usize>,
}

/// Which side of a lexicographic comparison an operand comes from.
enum Operand<'v> {
    Columns,
    Values(&'v [Value]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nullness {
    Null,
    NotNull,
    Maybe,
}

const TRUE: &str = "1 = 1";
const FALSE: &str = "1 = 0";

fn flip<'a>(op: &'a str) -> &'a str {
    match op {
        ">" => "<",
        ">=" => "<=",
        "<" => ">",
        "<=" => ">=",
        other => other,
    }
}

/// Outcome of `lhs op rhs` when NULLs alone decide it.
fn static_truth(lhs: Nullness, rhs: Nullness, op: &str) -> Option<bool> {
    use Nullness::*;
    match (lhs, rhs) {
        (Null, Null) => Some(op.ends_with('=')),
        (Null, NotNull) => Some(op.starts_with('<')),
        (NotNull, Null) => Some(op.starts_with('>')),
        (Maybe, Null) => match op {
            ">=" => Some(true),
            "<" => Some(false),
            _ => None,
        },
        (Null, Maybe) => static_truth(Maybe, Null, flip(op)),
        _ => None,
    }
}

pub struct QueryBuilder<'a> {
    dialect: &'a Dialect,
    relation: &'a Relation,
    params: Vec<Value>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(dialect: &'a Dialect, relation: &'a Relation) -> Self {
        Self {
            dialect,
            relation,
            params: Vec::new(),
        }
    }

    fn finish(self, sql: String, width: usize) -> BoundQuery {
        BoundQuery {
            sql,
            params: self.params,
            width,
        }
    }

    fn bind(&mut self, value: Value, column: usize) -> String {
        self.params.push(value);
        self.dialect
            .typed_placeholder(self.params.len(), &self.relation.columns[column].type_name)
    }

    fn ident(&self, column: usize) -> String {
        self.dialect.quote(&self.relation.columns[column].name)
    }

    fn projection(&self) -> String {
        self.relation
            .columns
            .iter()
            .map(|c| self.dialect.select_column(&c.name, &c.type_name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn width(&self) -> usize {
        self.relation.columns.len()
    }

    fn returning(&self) -> String {
        if self.dialect.supports_returning {
            format!(" RETURNING {}", self.projection())
        } else {
            String::new()
        }
    }

    fn operand(&mut self, side: &Operand<'_>, i: usize, term: OrderTerm) -> String {
        match side {
            Operand::Columns => self.ident(term.column),
            Operand::Values(values) => self.bind(values[i].clone(), term.column),
        }
    }

    /// Key columns never hold NULL; other columns may when declared nullable.
    fn may_be_null(&self, column: usize) -> bool {
        self.relation.columns[column].nullable && !self.relation.key.contains(&column)
    }

    fn nullness(&self, side: &Operand<'_>, i: usize, term: OrderTerm) -> Nullness {
        match side {
            Operand::Columns if self.may_be_null(term.column) => Nullness::Maybe,
            Operand::Columns => Nullness::NotNull,
            Operand::Values(values) if values[i].is_null() => Nullness::Null,
            Operand::Values(_) => Nullness::NotNull,
        }
    }

    /// One term of a lexicographic comparison with NULL below every value.
    /// Callers resolve the cases [`static_truth`] decides.
    fn compare_term(
        &mut self,
        lhs: &Operand<'_>,
        rhs: &Operand<'_>,
        i: usize,
        term: OrderTerm,
        op: &'static str,
    ) -> String {
        let (ln, rn) = (self.nullness(lhs, i, term), self.nullness(rhs, i, term));
        if rn == Nullness::Maybe && ln != Nullness::Maybe {
            return self.compare_term(rhs, lhs, i, term, flip(op));
        }
        match (ln, rn) {
            (Nullness::Maybe, Nullness::Null) => {
                let col = self.operand(lhs, i, term);
                if op == ">" {
                    format!("{col} IS NOT NULL")
                } else {
                    format!("{col} IS NULL")
                }
            }
            (Nullness::Maybe, Nullness::NotNull) if op.starts_with('<') => {
                let col = self.operand(lhs, i, term);
                let val = self.operand(rhs, i, term);
                format!("({col} IS NULL OR {col} {op} {val})")
            }
            _ => {
                let l = self.operand(lhs, i, term);
                let r = self.operand(rhs, i, term);
                format!("{l} {op} {r}")
            }
        }
    }

    /// `lhs` compared against `rhs` in lexicographic order over `order`.
    /// `greater[i]` selects `>` (true) or `<` for term `i`; `inclusive`
    /// relaxes the comparison of the final term. NULL sorts below every
    /// value, matching [`QueryBuilder::order_by`].
    fn lexicographic(
        &mut self,
        lhs: Operand<'_>,
        rhs: Operand<'_>,
        order: &[OrderTerm],
        greater: &[bool],
        inclusive: bool,
    ) -> String {
        let op = |gt: bool, incl: bool| match (gt, incl) {
            (true, false) => ">",
            (true, true) => ">=",
            (false, false) => "<",
            (false, true) => "<=",
        };
        let n = order.len();
        let uniform = greater.iter().all(|g| *g == greater[0]);
        let nulls_possible = (0..n).any(|i| {
            self.nullness(&lhs, i, order[i]) != Nullness::NotNull
                || self.nullness(&rhs, i, order[i]) != Nullness::NotNull
        });

        if n > 1 && uniform && !nulls_possible && self.dialect.supports_row_value_comparison {
            let l: Vec<String> = (0..n).map(|i| self.operand(&lhs, i, order[i])).collect();
            let r: Vec<String> = (0..n).map(|i| self.operand(&rhs, i, order[i])).collect();
            return format!(
                "({}) {} ({})",
                l.join(", "),
                op(greater[0], inclusive),
                r.join(", ")
            );
        }

        // a > ? OR (a = ? AND b > ?) OR ...; terms decided without SQL are
        // folded first so no parameter is bound for a dropped disjunct
        let mut plans: Vec<Vec<(usize, &'static str)>> = Vec::with_capacity(n);
        for i in 0..n {
            let terms = (0..i)
                .map(|j| (j, "="))
                .chain([(i, op(greater[i], inclusive && i == n - 1))]);
            let mut plan = Vec::with_capacity(i + 1);
            let mut possible = true;
            for (j, term_op) in terms {
                let ln = self.nullness(&lhs, j, order[j]);
                let rn = self.nullness(&rhs, j, order[j]);
                match static_truth(ln, rn, term_op) {
                    Some(true) => {}
                    Some(false) => {
                        possible = false;
                        break;
                    }
                    None => plan.push((j, term_op)),
                }
            }
            if !possible {
                continue;
            }
            if plan.is_empty() {
                return TRUE.to_string();
            }
            plans.push(plan);
        }
        if plans.is_empty() {
            return FALSE.to_string();
        }

        let mut disjuncts = Vec::with_capacity(plans.len());
        for plan in plans {
            let mut conj: Vec<String> = plan
                .into_iter()
                .map(|(j, term_op)| self.compare_term(&lhs, &rhs, j, order[j], term_op))
                .collect();
            if conj.len() == 1 {
                disjuncts.push(conj.remove(0));
            } else {
                disjuncts.push(format!("({})", conj.join(" AND ")));
            }
        }
        if disjuncts.len() == 1 {
            return disjuncts.remove(0);
        }
        format!("({})", disjuncts.join(" OR "))
    }

    fn order_by(&self, order: &[OrderTerm], scroll_down: bool) -> String {
        order
            .iter()
            .map(|t| {
                let asc = t.ascending == scroll_down;
                let nulls = if self.may_be_null(t.column) {
                    self.dialect.nulls_order(asc)
                } else {
                    ""
                };
                format!(
                    "{} {}{nulls}",
                    self.ident(t.column),
                    if asc { "ASC" } else { "DESC" }
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Equality on every key column, `k1 = ? AND k2 = ?`.
    fn key_match(&mut self, key: &[Value]) -> String {
        assert_eq!(key.len(), self.relation.key.len(), "key arity mismatch");
        let cols = self.relation.key.clone();
        cols.iter()
            .zip(key)
            .map(|(&c, v)| {
                let ident = self.ident(c);
                let ph = self.bind(v.clone(), c);
                format!("{ident} = {ph}")
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Key-ordered page, optionally anchored on a row-value cursor.
    pub fn select_page(mut self, page: Page<'_>) -> BoundQuery {
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.projection(),
            self.relation.from_clause(self.dialect)
        );
        if let Some(anchor) = page.anchor {
            assert_eq!(anchor.len(), page.order.len(), "anchor arity mismatch");
            let greater: Vec<bool> = page
                .order
                .iter()
                .map(|t| t.ascending == page.scroll_down)
                .collect();
            let pred = self.lexicographic(
                Operand::Columns,
                Operand::Values(anchor),
                page.order,
                &greater,
                page.inclusive,
            );
            sql.push_str(" WHERE ");
            sql.push_str(&pred);
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&self.order_by(page.order, page.scroll_down));
        if let Some(limit) = page.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        let width = self.width();
        self.finish(sql, width)
    }

    /// One row by key.
    pub fn select_by_key(mut self, key: &[Value]) -> BoundQuery {
        let pred = self.key_match(key);
        let sql = format!(
            "SELECT {} FROM {} WHERE {pred}",
            self.projection(),
            self.relation.from_clause(self.dialect)
        );
        let width = self.width();
        self.finish(sql, width)
    }

    /// Single row matching equalities on `columns`, projecting `display`.
    pub fn select_where_equal(mut self, columns: &[(usize, Value)], display: &[usize]) -> BoundQuery {
        let pred = columns
            .iter()
            .map(|(c, v)| {
                let ident = self.ident(*c);
                if v.is_null() {
                    format!("{ident} IS NULL")
                } else {
                    let ph = self.bind(v.clone(), *c);
                    format!("{ident} = {ph}")
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ");
        let cols = display
            .iter()
            .map(|&c| {
                let col = &self.relation.columns[c];
                self.dialect.select_column(&col.name, &col.type_name)
            })
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {cols} FROM {} WHERE {pred} LIMIT 1",
            self.relation.from_clause(self.dialect)
        );
        self.finish(sql, display.len())
    }

    /// Next row after (or, when wrapping, before) `current` whose `column` equals `needle`.
    pub fn find_match(
        mut self,
        column: usize,
        needle: &Value,
        order: &[OrderTerm],
        current: &[Value],
        wrap: bool,
    ) -> BoundQuery {
        let ident = self.ident(column);
        let test = if needle.is_null() {
            format!("{ident} IS NULL")
        } else {
            let ph = self.bind(needle.clone(), column);
            format!("{ident} = {ph}")
        };
        let scroll_down = !wrap;
        let greater: Vec<bool> = order.iter().map(|t| t.ascending == scroll_down).collect();
        let pred = self.lexicographic(
            Operand::Columns,
            Operand::Values(current),
            order,
            &greater,
            false,
        );
        let sql = format!(
            "SELECT {} FROM {} WHERE {test} AND {pred} ORDER BY {} LIMIT 1",
            self.projection(),
            self.relation.from_clause(self.dialect),
            self.order_by(order, scroll_down),
        );
        let width = self.width();
        self.finish(sql, width)
    }

    /// `SELECT (new before first), (new after last)` in display order.
    pub fn position_probe(
        mut self,
        order: &[OrderTerm],
        new: &[Value],
        first: &[Value],
        last: &[Value],
    ) -> BoundQuery {
        let before: Vec<bool> = order.iter().map(|t| !t.ascending).collect();
        let after: Vec<bool> = order.iter().map(|t| t.ascending).collect();
        let above = self.lexicographic(
            Operand::Values(new),
            Operand::Values(first),
            order,
            &before,
            false,
        );
        let below = self.lexicographic(
            Operand::Values(new),
            Operand::Values(last),
            order,
            &after,
            false,
        );
        let sql = format!(
            "SELECT CASE WHEN {above} THEN 1 ELSE 0 END, CASE WHEN {below} THEN 1 ELSE 0 END"
        );
        self.finish(sql, 2)
    }

    /// `UPDATE … SET col = ? WHERE key` with RETURNING where supported.
    pub fn update(mut self, column: usize, value: Value, key: &[Value]) -> BoundQuery {
        let ident = self.ident(column);
        let ph = self.bind(value, column);
        let pred = self.key_match(key);
        let returning = self.returning();
        let sql = format!(
            "UPDATE {} SET {ident} = {ph} WHERE {pred}{returning}",
            self.dialect.quote_qualified(&self.relation.name)
        );
        let width = if returning.is_empty() { 0 } else { self.width() };
        self.finish(sql, width)
    }

    /// INSERT of the given `(column, value)` pairs; omitted columns take defaults.
    pub fn insert(mut self, values: &[(usize, Value)]) -> BoundQuery {
        let table = self.dialect.quote_qualified(&self.relation.name);
        let body = if values.is_empty() {
            match self.dialect.db_type {
                crate::dialect::DbType::Mysql => "() VALUES ()".to_string(),
                _ => "DEFAULT VALUES".to_string(),
            }
        } else {
            let cols = values
                .iter()
                .map(|(c, _)| self.ident(*c))
                .collect::<Vec<_>>()
                .join(", ");
            let phs = values
                .iter()
                .map(|(c, v)| self.bind(v.clone(), *c))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({cols}) VALUES ({phs})")
        };
        let returning = self.returning();
        let sql = format!("INSERT INTO {table} {body}{returning}");
        let width = if returning.is_empty() { 0 } else { self.width() };
        self.finish(sql, width)
    }

    /// Re-read the row the preceding INSERT on this connection created, for
    /// backends without RETURNING. Requires a single-column key.
    pub fn select_last_inserted(self) -> BoundQuery {
        let (lhs, rhs) = match self.dialect.db_type {
            crate::dialect::DbType::Mysql => (self.ident(self.relation.key[0]), "LAST_INSERT_ID()"),
            _ => ("rowid".to_string(), "last_insert_rowid()"),
        };
        let sql = format!(
            "SELECT {} FROM {} WHERE {lhs} = {rhs}",
            self.projection(),
            self.dialect.quote_qualified(&self.relation.name)
        );
        let width = self.width();
        self.finish(sql, width)
    }

    pub fn delete(mut self, key: &[Value]) -> BoundQuery {
        let pred = self.key_match(key);
        let sql = format!(
            "DELETE FROM {} WHERE {pred}",
            self.dialect.quote_qualified(&self.relation.name)
        );
        self.finish(sql, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DbType;
    use crate::schema::fixtures::{pairs, users};

    fn page<'a>(
        order: &'a [OrderTerm],
        scroll_down: bool,
        inclusive: bool,
        anchor: Option<&'a [Value]>,
    ) -> Page<'a> {
        Page {
            order,
            scroll_down,
            inclusive,
            anchor,
            limit: None,
        }
    }

    #[test]
    fn initial_page_has_no_where() {
        let d = Dialect::new(DbType::Sqlite);
        let r = users(DbType::Sqlite);
        let order = order_terms(&r, None);
        let q = QueryBuilder::new(&d, &r).select_page(Page {
            limit: Some(20),
            ..page(&order, true, false, None)
        });
        assert_eq!(q.sql, "SELECT id, name, age FROM users ORDER BY id ASC LIMIT 20");
        assert!(q.params.is_empty());
        assert_eq!(q.width, 3);
    }

    #[test]
    fn direction_selects_operator_and_order() {
        let d = Dialect::new(DbType::Sqlite);
        let r = users(DbType::Sqlite);
        let order = order_terms(&r, None);
        let anchor = [Value::Int(5)];
        let cases = [
            (true, false, "id > ?", "id ASC"),
            (true, true, "id >= ?", "id ASC"),
            (false, false, "id < ?", "id DESC"),
            (false, true, "id <= ?", "id DESC"),
        ];
        for (down, incl, pred, ord) in cases {
            let q = QueryBuilder::new(&d, &r).select_page(page(&order, down, incl, Some(&anchor)));
            assert_eq!(
                q.sql,
                format!("SELECT id, name, age FROM users WHERE {pred} ORDER BY {ord}")
            );
            assert_eq!(q.params, vec![Value::Int(5)]);
        }
    }

    #[test]
    fn composite_key_uses_row_values() {
        let d = Dialect::new(DbType::Postgres);
        let r = pairs(DbType::Postgres);
        let order = order_terms(&r, None);
        let anchor = [Value::Int(1), Value::Int(3)];
        let q = QueryBuilder::new(&d, &r).select_page(page(&order, true, false, Some(&anchor)));
        assert_eq!(
            q.sql,
            "SELECT a, b, label FROM pairs WHERE (a, b) > (CAST($1 AS integer), CAST($2 AS integer)) \
             ORDER BY a ASC, b ASC"
        );
    }

    #[test]
    fn composite_key_expands_without_row_values() {
        let d = Dialect::new(DbType::Mysql);
        let r = pairs(DbType::Mysql);
        let order = order_terms(&r, None);
        let anchor = [Value::Int(1), Value::Int(3)];
        let q = QueryBuilder::new(&d, &r).select_page(page(&order, false, true, Some(&anchor)));
        assert_eq!(
            q.sql,
            "SELECT a, b, label FROM pairs WHERE (a < ? OR (a = ? AND b <= ?)) ORDER BY a DESC, b DESC"
        );
        assert_eq!(q.params, vec![Value::Int(1), Value::Int(1), Value::Int(3)]);
    }

    #[test]
    fn mixed_sort_direction_expands() {
        let d = Dialect::new(DbType::Sqlite);
        let r = users(DbType::Sqlite);
        let order = order_terms(
            &r,
            Some(SortColumn {
                column: 2,
                ascending: false,
            }),
        );
        let anchor = [Value::Int(30), Value::Int(4)];
        let q = QueryBuilder::new(&d, &r).select_page(page(&order, true, false, Some(&anchor)));
        assert_eq!(
            q.sql,
            "SELECT id, name, age FROM users WHERE ((age IS NULL OR age < ?) OR (age = ? AND id > ?)) \
             ORDER BY age DESC, id ASC"
        );
        assert_eq!(q.params, vec![Value::Int(30), Value::Int(30), Value::Int(4)]);
    }

    fn by_age() -> Option<SortColumn> {
        Some(SortColumn {
            column: 2,
            ascending: true,
        })
    }

    #[test]
    fn null_sort_anchor_is_compared_without_binding() {
        let d = Dialect::new(DbType::Postgres);
        let r = users(DbType::Postgres);
        let order = order_terms(&r, by_age());
        let anchor = [Value::Null, Value::Int(2)];

        let q = QueryBuilder::new(&d, &r).select_page(page(&order, true, false, Some(&anchor)));
        assert_eq!(
            q.sql,
            "SELECT id, name, age FROM users \
             WHERE (age IS NOT NULL OR (age IS NULL AND id > CAST($1 AS INTEGER))) \
             ORDER BY age ASC NULLS FIRST, id ASC"
        );
        assert_eq!(q.params, vec![Value::Int(2)]);

        // nothing sorts below NULL, so only the tied NULLs remain
        let q = QueryBuilder::new(&d, &r).select_page(page(&order, false, false, Some(&anchor)));
        assert_eq!(
            q.sql,
            "SELECT id, name, age FROM users WHERE (age IS NULL AND id < CAST($1 AS INTEGER)) \
             ORDER BY age DESC NULLS LAST, id DESC"
        );
    }

    #[test]
    fn nullable_sort_disables_row_values() {
        let d = Dialect::new(DbType::Sqlite);
        let r = users(DbType::Sqlite);
        let order = order_terms(&r, by_age());
        let anchor = [Value::Int(30), Value::Int(4)];
        let q = QueryBuilder::new(&d, &r).select_page(page(&order, false, true, Some(&anchor)));
        assert_eq!(
            q.sql,
            "SELECT id, name, age FROM users WHERE ((age IS NULL OR age < ?) OR (age = ? AND id <= ?)) \
             ORDER BY age DESC, id DESC"
        );
    }

    #[test]
    fn null_sort_values_when_locating_an_edited_row() {
        let d = Dialect::new(DbType::Sqlite);
        let r = users(DbType::Sqlite);
        let order = order_terms(&r, by_age());
        let q = QueryBuilder::new(&d, &r).position_probe(
            &order,
            &[Value::Null, Value::Int(9)],
            &[Value::Int(20), Value::Int(1)],
            &[Value::Null, Value::Int(3)],
        );
        assert_eq!(
            q.sql,
            "SELECT CASE WHEN 1 = 1 THEN 1 ELSE 0 END, CASE WHEN ? > ? THEN 1 ELSE 0 END"
        );
        assert_eq!(q.params, vec![Value::Int(9), Value::Int(3)]);
    }

    #[test]
    fn update_binds_value_then_key() {
        let d = Dialect::new(DbType::Postgres);
        let r = users(DbType::Postgres);
        let q = QueryBuilder::new(&d, &r).update(1, Value::Text("B".into()), &[Value::Int(2)]);
        assert_eq!(
            q.sql,
            "UPDATE users SET name = CAST($1 AS TEXT) WHERE id = CAST($2 AS INTEGER) \
             RETURNING id, name, age"
        );
        assert_eq!(q.params, vec![Value::Text("B".into()), Value::Int(2)]);
        assert_eq!(q.width, 3);

        let my = Dialect::new(DbType::Mysql);
        let q = QueryBuilder::new(&my, &r).update(1, Value::Text("B".into()), &[Value::Int(2)]);
        assert_eq!(q.sql, "UPDATE users SET name = ? WHERE id = ?");
        assert_eq!(q.width, 0);
    }

    #[test]
    fn insert_lists_only_given_columns() {
        let d = Dialect::new(DbType::Sqlite);
        let r = users(DbType::Sqlite);
        let q = QueryBuilder::new(&d, &r).insert(&[(1, Value::Text("z".into())), (2, Value::Null)]);
        assert_eq!(
            q.sql,
            "INSERT INTO users (name, age) VALUES (?, ?) RETURNING id, name, age"
        );
        let q = QueryBuilder::new(&d, &r).insert(&[]);
        assert_eq!(q.sql, "INSERT INTO users DEFAULT VALUES RETURNING id, name, age");
        let my = Dialect::new(DbType::Mysql);
        let q = QueryBuilder::new(&my, &r).insert(&[]);
        assert_eq!(q.sql, "INSERT INTO users () VALUES ()");
    }

    #[test]
    fn last_inserted_row_without_returning() {
        let my = Dialect::new(DbType::Mysql);
        let r = users(DbType::Mysql);
        let q = QueryBuilder::new(&my, &r).select_last_inserted();
        assert_eq!(q.sql, "SELECT id, name, age FROM users WHERE id = LAST_INSERT_ID()");
        let old = Dialect::sqlite((3, 31));
        let q = QueryBuilder::new(&old, &r).select_last_inserted();
        assert_eq!(q.sql, "SELECT id, name, age FROM users WHERE rowid = last_insert_rowid()");
    }

    #[test]
    fn delete_identifies_by_full_key() {
        let d = Dialect::new(DbType::Sqlite);
        let r = pairs(DbType::Sqlite);
        let q = QueryBuilder::new(&d, &r).delete(&[Value::Int(1), Value::Int(2)]);
        assert_eq!(q.sql, "DELETE FROM pairs WHERE a = ? AND b = ?");
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn find_match_forward_and_wrapped() {
        let d = Dialect::new(DbType::Sqlite);
        let r = users(DbType::Sqlite);
        let order = order_terms(&r, None);
        let current = [Value::Int(6)];
        let q = QueryBuilder::new(&d, &r).find_match(2, &Value::Int(25), &order, &current, false);
        assert_eq!(
            q.sql,
            "SELECT id, name, age FROM users WHERE age = ? AND id > ? ORDER BY id ASC LIMIT 1"
        );
        let q = QueryBuilder::new(&d, &r).find_match(2, &Value::Int(25), &order, &current, true);
        assert_eq!(
            q.sql,
            "SELECT id, name, age FROM users WHERE age = ? AND id < ? ORDER BY id DESC LIMIT 1"
        );
        assert_eq!(q.params, vec![Value::Int(25), Value::Int(6)]);
    }

    #[test]
    fn position_probe_compares_against_both_edges() {
        let d = Dialect::new(DbType::Sqlite);
        let r = users(DbType::Sqlite);
        let order = order_terms(&r, None);
        let q = QueryBuilder::new(&d, &r).position_probe(
            &order,
            &[Value::Int(4)],
            &[Value::Int(1)],
            &[Value::Int(2)],
        );
        assert_eq!(
            q.sql,
            "SELECT CASE WHEN ? < ? THEN 1 ELSE 0 END, CASE WHEN ? > ? THEN 1 ELSE 0 END"
        );
        assert_eq!(
            q.params,
            vec![Value::Int(4), Value::Int(1), Value::Int(4), Value::Int(2)]
        );
    }

    #[test]
    fn lookup_by_equalities() {
        let d = Dialect::new(DbType::Sqlite);
        let r = users(DbType::Sqlite);
        let q = QueryBuilder::new(&d, &r).select_where_equal(&[(0, Value::Int(7))], &[0, 1]);
        assert_eq!(q.sql, "SELECT id, name FROM users WHERE id = ? LIMIT 1");
        assert_eq!(q.width, 2);
    }

    #[test]
    fn quoted_identifiers_flow_through() {
        let d = Dialect::new(DbType::Mysql);
        let mut r = users(DbType::Mysql);
        r.name = "app.Order".into();
        r.columns[1].name = "group".into();
        r.column_index = crate::schema::index_columns(&r.columns);
        let q = QueryBuilder::new(&d, &r).select_by_key(&[Value::Int(1)]);
        assert_eq!(q.sql, "SELECT id, `group`, age FROM app.`Order` WHERE id = ?");
    }
}
