use crate::error::Result;
use crate::query::QueryBuilder;
use crate::schema::Relation;
use crate::value::{Value, logfmt};

use super::RowEngine;

/// A row located by [`RowEngine::find_next`].
#[derive(Debug, Clone, PartialEq)]
pub struct FindResult {
    pub key: Vec<Value>,
    pub row: Vec<Value>,
    /// The match lies before the starting row.
    pub wrapped: bool,
}

impl RowEngine {
    /// Fetch one row of `relation` matching every `(column, value)` equality,
    /// as `(column name, value)` pairs for `display`.
    pub async fn get_foreign_row(
        &mut self,
        relation: &Relation,
        equal: &[(usize, Value)],
        display: &[usize],
    ) -> Result<Option<Vec<(String, Value)>>> {
        self.close_cursor().await;
        let query = QueryBuilder::new(self.backend.dialect(), relation).select_where_equal(equal, display);
        let row = self.backend.query_row("get_foreign_row", &query).await?;
        Ok(row.map(|values| {
            display
                .iter()
                .zip(values)
                .map(|(&c, v)| (relation.columns[c].name.clone(), v))
                .collect()
        }))
    }

    /// logfmt line of the row the selected row references through `col`,
    /// when `col` belongs to exactly one foreign key whose local columns
    /// are all among `visible`.
    pub async fn preview(&mut self, col: usize, visible: &[usize]) -> Result<Option<String>> {
        let Some(data) = self.selected_row().map(|r| r.data.clone()) else {
            return Ok(None);
        };
        let Some(reference) = self.relation.previewable_reference(col, visible) else {
            return Ok(None);
        };
        let foreign = reference.foreign_table.clone();
        let mut equal = Vec::with_capacity(reference.foreign_columns.len());
        for (&local, name) in &reference.foreign_columns {
            // NULL references nothing
            if data[local].is_null() {
                return Ok(None);
            }
            let Some(fc) = foreign.column_position(name) else {
                return Ok(None);
            };
            equal.push((fc, data[local].clone()));
        }

        let display: Vec<usize> = (0..foreign.columns.len()).collect();
        let found = self.get_foreign_row(&foreign, &equal, &display).await?;
        Ok(found.map(|pairs| {
            logfmt(
                pairs.iter().map(|(n, v)| (n.as_str(), v)),
                &self.null_glyph,
            )
        }))
    }

    /// Next row after the selected one (in pagination order) whose `col`
    /// equals `needle`; failing that, the nearest match before it.
    pub async fn find_next(&mut self, col: usize, needle: &Value) -> Result<Option<FindResult>> {
        let Some(current) = self.selected_row().map(|r| self.order_values(&r.data)) else {
            return Ok(None);
        };
        self.close_cursor().await;

        for wrapped in [false, true] {
            let query = QueryBuilder::new(self.backend.dialect(), &self.relation)
                .find_match(col, needle, &self.order, &current, wrapped);
            if let Some(row) = self.backend.query_row("find_next", &query).await? {
                tracing::debug!(column = col, wrapped, "match found");
                return Ok(Some(FindResult {
                    key: self.relation.key_values(&row),
                    row,
                    wrapped,
                }));
            }
        }
        Ok(None)
    }

    /// Find the next match and select it, scrolling the window if needed.
    pub async fn find_and_select(&mut self, col: usize, needle: &Value) -> Result<Option<FindResult>> {
        let found = self.find_next(col, needle).await?;
        if let Some(f) = &found {
            match self.position_of(&f.key) {
                Some(pos) => self.select(pos, col),
                None => {
                    let anchor = self.order_values(&f.row);
                    self.load_from(Some(&anchor), true, col).await?;
                }
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Target;
    use crate::engine::tests::sqlite;

    async fn ages(capacity: usize) -> RowEngine {
        let backend = sqlite(&[
            "CREATE TABLE people (id INTEGER PRIMARY KEY, age INTEGER)",
            "INSERT INTO people VALUES (1, 30), (2, 25), (3, 30), (4, 25), (5, 35), (6, 25)",
        ])
        .await;
        RowEngine::open(backend, &Target::Relation("people".into()), capacity, "NULL")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn find_wraps_to_nearest_preceding_match() {
        let mut e = ages(10).await;
        e.select(5, 1);
        let found = e.find_next(1, &Value::Int(25)).await.unwrap().unwrap();
        assert_eq!(found.key, vec![Value::Int(4)]);
        assert!(found.wrapped);
    }

    #[tokio::test]
    async fn find_moves_forward_first() {
        let mut e = ages(10).await;
        e.select(1, 1);
        let found = e.find_next(1, &Value::Int(25)).await.unwrap().unwrap();
        assert_eq!(found.key, vec![Value::Int(4)]);
        assert!(!found.wrapped);
        assert_eq!(e.find_next(1, &Value::Int(99)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn find_and_select_scrolls_outside_the_window() {
        let mut e = ages(2).await;
        let found = e.find_and_select(1, &Value::Int(35)).await.unwrap().unwrap();
        assert_eq!(found.key, vec![Value::Int(5)]);
        assert_eq!(e.selected_row().unwrap().data[0], Value::Int(5));
    }

    #[tokio::test]
    async fn preview_renders_referenced_row() {
        let backend = sqlite(&[
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER REFERENCES users(id))",
            "INSERT INTO users VALUES (1, 'Ada Lovelace')",
            "INSERT INTO orders VALUES (10, 1), (11, NULL)",
        ])
        .await;
        let mut e = RowEngine::open(backend, &Target::Relation("orders".into()), 5, "NULL")
            .await
            .unwrap();
        let all = [0, 1];
        assert_eq!(
            e.preview(1, &all).await.unwrap().as_deref(),
            Some("id=1 name=\"Ada Lovelace\"")
        );
        assert_eq!(e.preview(0, &all).await.unwrap(), None);
        e.select(1, 1);
        assert_eq!(e.preview(1, &all).await.unwrap(), None);
    }

    #[tokio::test]
    async fn composite_reference_needs_every_local_column_on_screen() {
        let backend = sqlite(&[
            "CREATE TABLE pairs (a INTEGER, b INTEGER, label TEXT, PRIMARY KEY (a, b))",
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, pa INTEGER, pb INTEGER, \
             FOREIGN KEY (pa, pb) REFERENCES pairs (a, b))",
            "INSERT INTO pairs VALUES (1, 2, 'x')",
            "INSERT INTO notes VALUES (7, 1, 2)",
        ])
        .await;
        let mut e = RowEngine::open(backend, &Target::Relation("notes".into()), 5, "NULL")
            .await
            .unwrap();
        assert_eq!(
            e.preview(1, &[0, 1, 2]).await.unwrap().as_deref(),
            Some("a=1 b=2 label=x")
        );
        // pb scrolled off the right edge
        assert_eq!(e.preview(1, &[0, 1]).await.unwrap(), None);
        assert_eq!(e.preview(2, &[2]).await.unwrap(), None);
    }
}
