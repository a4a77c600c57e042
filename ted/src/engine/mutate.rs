use crate::error::{Result, TedError};
use crate::query::QueryBuilder;
use crate::schema::Relation;
use crate::schema::catalog::truthy;
use crate::value::{Value, coerce};
use crate::window::RowState;

use super::RowEngine;

/// One cell of a row being inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InsertCell {
    /// Left out of the INSERT so the column default applies.
    #[default]
    Empty,
    Null,
    Text(String),
}

/// A row being composed in insert mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRow {
    pub cells: Vec<InsertCell>,
}

impl PendingRow {
    pub fn new(width: usize) -> Self {
        Self {
            cells: vec![InsertCell::Empty; width],
        }
    }

    pub fn set_text(&mut self, col: usize, text: impl Into<String>) {
        if let Some(cell) = self.cells.get_mut(col) {
            *cell = InsertCell::Text(text.into());
        }
    }

    /// Set a nullable column to NULL. Returns `false` for NOT NULL columns.
    pub fn set_null(&mut self, relation: &Relation, col: usize) -> bool {
        match (self.cells.get_mut(col), relation.columns.get(col)) {
            (Some(cell), Some(column)) if column.nullable => {
                *cell = InsertCell::Null;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self, col: usize) {
        if let Some(cell) = self.cells.get_mut(col) {
            *cell = InsertCell::Empty;
        }
    }

    /// The `(column, value)` pairs to insert, skipping empty cells.
    fn values(&self, relation: &Relation, null_glyph: &str) -> Vec<(usize, Value)> {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| match cell {
                InsertCell::Empty => None,
                InsertCell::Null => Some((i, Value::Null)),
                InsertCell::Text(t) => Some((i, coerce(t, &relation.columns[i].type_name, null_glyph))),
            })
            .collect()
    }
}

impl RowEngine {
    /// Set `column` of the selected row from user-entered `text`.
    ///
    /// If the row's position in the pagination order changed, the window is
    /// moved so the edited row stays selected.
    pub async fn update_cell(&mut self, column: usize, text: &str) -> Result<()> {
        let row_index = self.selection.row;
        let old = self
            .selected_row()
            .map(|r| r.data.clone())
            .ok_or_else(|| TedError::ReadOnly("no row selected".to_string()))?;
        if !self.relation.is_editable(column) {
            return Err(TedError::ReadOnly(format!(
                "column {} is not editable",
                self.relation.columns[column].name
            )));
        }
        self.close_cursor().await;

        let value = coerce(text, &self.relation.columns[column].type_name, &self.null_glyph);
        let new = if self.relation.is_view {
            self.update_through_view(column, value, &old).await?
        } else {
            let key = self.relation.key_values(&old);
            self.update_table(&self.relation, column, value, &key).await?
        };

        let new_order = self.order_values(&new);
        if self.order_values(&old) == new_order {
            if let Some(row) = self.window.get_mut(row_index) {
                row.data = new;
                row.state = RowState::Normal;
                row.modified.clear();
            }
            return Ok(());
        }
        self.relocate(&new, column).await
    }

    async fn update_table(
        &self,
        relation: &Relation,
        column: usize,
        value: Value,
        key: &[Value],
    ) -> Result<Vec<Value>> {
        let dialect = self.backend.dialect();
        let update = QueryBuilder::new(dialect, relation).update(column, value.clone(), key);
        tracing::debug!(relation = %relation.name, sql = %update.sql, "update");

        if dialect.supports_returning {
            let rows = self.backend.query("update_cell", &update).await?;
            return rows.into_iter().next().ok_or(TedError::NoRowsUpdated);
        }

        // re-read by the key the row has after the update
        let mut new_key = key.to_vec();
        if let Some(p) = relation.key.iter().position(|&k| k == column) {
            new_key[p] = value;
        }
        let fetch = QueryBuilder::new(dialect, relation).select_by_key(&new_key);
        let (outcome, rows) = self
            .backend
            .execute_and_fetch("update_cell", &update, &fetch)
            .await?;
        if outcome.rows_affected == 0 {
            return Err(TedError::NoRowsUpdated);
        }
        rows.into_iter().next().ok_or(TedError::NoRowsUpdated)
    }

    /// Run the update against the base table `column` comes from and
    /// project the base row back into the view row.
    async fn update_through_view(&self, column: usize, value: Value, old: &[Value]) -> Result<Vec<Value>> {
        let view = &self.relation;
        let col = &view.columns[column];
        let not_editable = || TedError::ReadOnly(format!("column {} is not editable", col.name));
        let (Some(table), Some(source), Some(occurrence)) =
            (&col.source_table, &col.source_column, col.source_occurrence)
        else {
            return Err(not_editable());
        };
        let base = view.base_tables.get(table).cloned().ok_or_else(not_editable)?;
        let base_column = base.column_position(source).ok_or_else(not_editable)?;

        let from_base = |c: &crate::schema::Column, name: &str| {
            c.source_table.as_deref() == Some(table.as_str())
                && c.source_occurrence == Some(occurrence)
                && c.source_column
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(name))
        };
        let base_key: Vec<Value> = base
            .key_names()
            .into_iter()
            .map(|k| view.columns.iter().position(|c| from_base(c, k)).map(|p| old[p].clone()))
            .collect::<Option<_>>()
            .ok_or_else(not_editable)?;

        tracing::debug!(view = %view.name, table = %base.name, column = %source, "view update rewritten");
        let base_row = self.update_table(&base, base_column, value, &base_key).await?;

        let mut new = old.to_vec();
        for (p, c) in view.columns.iter().enumerate() {
            if let Some(name) = c.source_column.as_deref()
                && from_base(c, name)
                && let Some(i) = base.column_position(name)
            {
                new[p] = base_row[i].clone();
            }
        }
        Ok(new)
    }

    /// Bring an edited row whose order values changed back into view.
    async fn relocate(&mut self, new: &[Value], col: usize) -> Result<()> {
        let new_order = self.order_values(new);
        let first = self.top_anchor();
        let last = self
            .window
            .last_data_index()
            .and_then(|i| self.anchor_at(i));
        let (Some(first), Some(last)) = (first, last) else {
            return self.load_from(Some(&new_order), true, col).await;
        };

        let probe = QueryBuilder::new(self.backend.dialect(), &self.relation)
            .position_probe(&self.order, &new_order, &first, &last);
        let row = self
            .backend
            .query_row("update_cell", &probe)
            .await?
            .ok_or_else(|| TedError::query("update_cell", "position probe returned no row"))?;
        let (above, below) = (truthy(&row[0]), truthy(&row[1]));
        tracing::debug!(above, below, "edited row moved");

        if above {
            self.load_from(Some(&new_order), true, col).await
        } else if below {
            self.load_from(Some(&new_order), false, col).await
        } else {
            self.reload().await?;
            let key = self.relation.key_values(new);
            if let Some(pos) = self.position_of(&key) {
                self.select(pos, col);
            }
            Ok(())
        }
    }

    /// Insert `pending` and show the new row as the last visible row.
    pub async fn insert_row(&mut self, pending: &PendingRow) -> Result<()> {
        if self.relation.is_view {
            return Err(TedError::ReadOnly(format!(
                "cannot insert into view {}",
                self.relation.name
            )));
        }
        let values = pending.values(&self.relation, &self.null_glyph);
        self.close_cursor().await;

        let dialect = self.backend.dialect();
        let insert = QueryBuilder::new(dialect, &self.relation).insert(&values);
        tracing::debug!(relation = %self.relation.name, sql = %insert.sql, "insert");
        let row = if dialect.supports_returning {
            self.backend.query("insert_row", &insert).await?.into_iter().next()
        } else {
            let given_key: Option<Vec<Value>> = self
                .relation
                .key
                .iter()
                .map(|k| values.iter().find(|(c, _)| c == k).map(|(_, v)| v.clone()))
                .collect();
            let builder = QueryBuilder::new(dialect, &self.relation);
            let fetch = match given_key {
                Some(key) => builder.select_by_key(&key),
                None => builder.select_last_inserted(),
            };
            let (_, rows) = self
                .backend
                .execute_and_fetch("insert_row", &insert, &fetch)
                .await?;
            rows.into_iter().next()
        };
        let row = row.ok_or_else(|| TedError::query("insert_row", "inserted row could not be read back"))?;

        let anchor = self.order_values(&row);
        let col = self.selection.col;
        self.load_from(Some(&anchor), false, col).await
    }

    /// Delete the selected row and reload at the current position.
    pub async fn delete_row(&mut self) -> Result<()> {
        if self.relation.is_view {
            return Err(TedError::ReadOnly(format!(
                "cannot delete from view {}",
                self.relation.name
            )));
        }
        let key = self
            .selected_row()
            .map(|r| self.relation.key_values(&r.data))
            .ok_or_else(|| TedError::ReadOnly("no row selected".to_string()))?;
        self.close_cursor().await;

        let delete = QueryBuilder::new(self.backend.dialect(), &self.relation).delete(&key);
        let outcome = self.backend.execute("delete_row", &delete).await?;
        if outcome.rows_affected == 0 {
            return Err(TedError::NoRowsDeleted);
        }
        tracing::debug!(relation = %self.relation.name, key = ?key, "row deleted");
        self.reload().await
    }
}
