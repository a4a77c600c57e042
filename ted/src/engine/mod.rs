//! Windowed row engine: streams a relation through a bounded window in key
//! order and keeps the window in step with edits and background refreshes.

use std::sync::Arc;

use crate::backend::{Backend, RowStream};
use crate::error::{Result, TedError};
use crate::query::{OrderTerm, Page, QueryBuilder, SortColumn, order_terms};
use crate::schema::{self, Relation};
use crate::session::Timers;
use crate::value::Value;
use crate::window::{Row, RowState, Window};

mod diff;
mod lookup;
mod mutate;

pub use lookup::FindResult;
pub use mutate::{InsertCell, PendingRow};

/// What to open: a named table/view or an ad-hoc SELECT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Relation(String),
    Sql(String),
}

impl Target {
    /// A SELECT statement is run as custom SQL; anything else names a relation.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim_start();
        let is_select = trimmed
            .get(..6)
            .is_some_and(|w| w.eq_ignore_ascii_case("select"))
            || trimmed.get(..4).is_some_and(|w| w.eq_ignore_ascii_case("with"));
        if is_select {
            Target::Sql(s.trim().to_string())
        } else {
            Target::Relation(s.trim().to_string())
        }
    }
}

/// Selected cell, as a logical window row and a column index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pub row: usize,
    pub col: usize,
}

struct Cursor {
    id: u64,
    stream: RowStream,
    scroll_down: bool,
}

pub struct RowEngine {
    backend: Arc<dyn Backend>,
    relation: Arc<Relation>,
    order: Vec<OrderTerm>,
    window: Window,
    cursor: Option<Cursor>,
    cursor_seq: u64,
    /// Rows as last shown, the baseline for the next refresh diff.
    previous: Vec<Row>,
    selection: Selection,
    timers: Option<Timers>,
    null_glyph: String,
}

impl RowEngine {
    /// Describe `target` and load its first window.
    pub async fn open(
        backend: Arc<dyn Backend>,
        target: &Target,
        capacity: usize,
        null_glyph: &str,
    ) -> Result<Self> {
        let relation = match target {
            Target::Relation(name) => schema::introspect(&backend, name).await?,
            Target::Sql(sql) => schema::introspect_sql(&backend, sql).await?,
        };
        let mut engine = Self::new(backend, relation, capacity, null_glyph, None)?;
        engine.load_from(None, true, 0).await?;
        Ok(engine)
    }

    /// Wrap an introspected relation. Nothing is loaded yet.
    pub fn new(
        backend: Arc<dyn Backend>,
        relation: Relation,
        capacity: usize,
        null_glyph: &str,
        sort: Option<SortColumn>,
    ) -> Result<Self> {
        if !relation.is_keyable() {
            return Err(TedError::NoKey(relation.name.clone()));
        }
        let order = order_terms(&relation, sort);
        tracing::info!(
            relation = %relation.name,
            view = relation.is_view,
            key = ?relation.key_names(),
            capacity,
            "relation opened"
        );
        Ok(Self {
            backend,
            relation: Arc::new(relation),
            order,
            window: Window::new(capacity),
            cursor: None,
            cursor_seq: 0,
            previous: Vec::new(),
            selection: Selection::default(),
            timers: None,
            null_glyph: null_glyph.to_string(),
        })
    }

    /// Hand the engine its cursor/refresh timers. Refreshing starts
    /// immediately when no cursor is open.
    pub fn set_timers(&mut self, mut timers: Timers) {
        match &self.cursor {
            Some(c) => timers.cursor_opened(c.id),
            None => timers.cursor_closed(),
        }
        self.timers = Some(timers);
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn null_glyph(&self) -> &str {
        &self.null_glyph
    }

    pub fn cursor_id(&self) -> Option<u64> {
        self.cursor.as_ref().map(|c| c.id)
    }

    /// Select a cell, clamped to the loaded data rows.
    pub fn select(&mut self, row: usize, col: usize) {
        let last = self.window.last_data_index().unwrap_or(0);
        let width = self.relation.columns.len();
        self.selection = Selection {
            row: row.min(last),
            col: col.min(width.saturating_sub(1)),
        };
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.window
            .get(self.selection.row)
            .filter(|r| !r.is_border())
    }

    /// Values of the pagination order columns of `data`.
    pub(crate) fn order_values(&self, data: &[Value]) -> Vec<Value> {
        self.order.iter().map(|t| data[t.column].clone()).collect()
    }

    fn anchor_at(&self, i: usize) -> Option<Vec<Value>> {
        self.window
            .get(i)
            .filter(|r| !r.is_border())
            .map(|r| self.order_values(&r.data))
    }

    /// Order values of the top row; what a reload at the current position starts from.
    pub(crate) fn top_anchor(&self) -> Option<Vec<Value>> {
        self.anchor_at(0)
    }

    fn position_of(&self, key: &[Value]) -> Option<usize> {
        self.window
            .iter()
            .position(|r| !r.is_border() && self.relation.key_values(&r.data) == key)
    }

    fn snapshot_previous(&mut self) {
        self.previous = self
            .window
            .iter()
            .filter(|r| !r.is_border() && r.state != RowState::Deleted)
            .map(|r| Row::new(r.data.clone()))
            .collect();
    }

    // ---------- cursor ----------

    async fn open_cursor(
        &mut self,
        op: &'static str,
        scroll_down: bool,
        inclusive: bool,
        anchor: Option<&[Value]>,
    ) -> Result<()> {
        self.close_cursor().await;
        let query = QueryBuilder::new(self.backend.dialect(), &self.relation).select_page(Page {
            order: &self.order,
            scroll_down,
            inclusive,
            anchor,
            limit: None,
        });
        let stream = self.backend.stream(op, &query).await?;
        self.cursor_seq += 1;
        let id = self.cursor_seq;
        tracing::trace!(cursor = id, scroll_down, sql = %query.sql, "cursor opened");
        self.cursor = Some(Cursor {
            id,
            stream,
            scroll_down,
        });
        if let Some(t) = &mut self.timers {
            t.cursor_opened(id);
        }
        Ok(())
    }

    /// Close the active cursor, if any. Idempotent.
    pub async fn close_cursor(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.stream.close().await;
            tracing::trace!(cursor = cursor.id, "cursor closed");
            if let Some(t) = &mut self.timers {
                t.cursor_closed();
            }
        }
    }

    /// Close the cursor if it is still `cursor_id`; stale timer jobs are ignored.
    pub async fn on_cursor_idle(&mut self, cursor_id: u64) {
        if self.cursor_id() == Some(cursor_id) {
            self.close_cursor().await;
        }
    }

    fn touch_cursor(&mut self) {
        if let (Some(c), Some(t)) = (&self.cursor, &mut self.timers) {
            t.cursor_used(c.id);
        }
    }

    async fn fetch(&mut self) -> Result<Option<Vec<Value>>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        match cursor.stream.next().await {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => {
                self.close_cursor().await;
                Err(e)
            }
            None => Ok(None),
        }
    }

    // ---------- window loading ----------

    /// Start a fresh stream.
    ///
    /// With no anchor, loads from the first row (`from_top`) or the last.
    /// With an anchor, `from_top` makes the anchored row the first row;
    /// otherwise it becomes the last, with rows above it filling the window.
    pub async fn load_from(&mut self, anchor: Option<&[Value]>, from_top: bool, focus_col: usize) -> Result<()> {
        let anchor = anchor.map(<[Value]>::to_vec);
        self.window.clear();
        let n = self.window.capacity();

        let selected = if from_top {
            self.open_cursor("load_from", true, true, anchor.as_deref()).await?;
            self.fill_forward(n).await?;
            0
        } else {
            // leave room for the bottom border when loading the very end,
            // unless that would leave no room for data
            let limit = if anchor.is_some() { n } else { n.saturating_sub(1).max(1) };
            self.open_cursor("load_from", false, true, anchor.as_deref()).await?;
            let mut above = Vec::with_capacity(limit);
            while above.len() < limit {
                match self.fetch().await? {
                    Some(row) => above.push(row),
                    None => break,
                }
            }
            let got = above.len();
            for row in above.into_iter().rev() {
                self.window.push_back(Row::new(row));
            }
            match &anchor {
                None if !self.window.is_full() => {
                    self.window.push_back(Row::border());
                }
                None => {}
                Some(a) if got < n => {
                    let (from, inclusive) = match self.window.last() {
                        Some(last) => (self.order_values(&last.data), false),
                        None => (a.clone(), true),
                    };
                    self.open_cursor("load_from", true, inclusive, Some(&from)).await?;
                    self.fill_forward(n).await?;
                }
                Some(_) => {}
            }
            got.saturating_sub(1)
        };

        self.select(selected, focus_col);
        self.snapshot_previous();
        self.touch_cursor();
        tracing::debug!(
            relation = %self.relation.name,
            from_top,
            anchored = anchor.is_some(),
            rows = self.window.data_len(),
            "window loaded"
        );
        Ok(())
    }

    /// Read from the active (down) cursor until the window is full or the
    /// relation ends.
    async fn fill_forward(&mut self, n: usize) -> Result<()> {
        while self.window.len() < n {
            match self.fetch().await? {
                Some(row) => {
                    self.window.push_back(Row::new(row));
                }
                None => {
                    self.window.push_back(Row::border());
                    break;
                }
            }
        }
        Ok(())
    }

    /// Advance by up to `count` rows. Returns `true` at the end of the relation.
    pub async fn next_rows(&mut self, count: usize) -> Result<bool> {
        let (edge, evicted) = self.scroll_down(count).await?;
        let last = self.window.last_data_index().unwrap_or(0);
        self.selection.row = self.selection.row.saturating_sub(evicted).min(last);
        Ok(edge)
    }

    /// Move back by up to `count` rows. Returns `true` at the start of the relation.
    pub async fn prev_rows(&mut self, count: usize) -> Result<bool> {
        let (edge, prepended) = self.scroll_up(count).await?;
        let last = self.window.last_data_index().unwrap_or(0);
        self.selection.row = (self.selection.row + prepended).min(last);
        Ok(edge)
    }

    /// Returns the edge flag and how many leading rows were evicted.
    async fn scroll_down(&mut self, count: usize) -> Result<(bool, usize)> {
        if self.window.is_empty() || self.window.has_border() {
            return Ok((true, 0));
        }
        let continues = self.cursor.as_ref().is_some_and(|c| c.scroll_down);
        if !continues {
            let Some(anchor) = self.window.last_data_index().and_then(|i| self.anchor_at(i)) else {
                return Ok((true, 0));
            };
            self.open_cursor("next_rows", true, false, Some(&anchor)).await?;
        }

        let mut edge = false;
        let mut evicted = 0;
        for _ in 0..count {
            let row = match self.fetch().await? {
                Some(data) => Row::new(data),
                None => {
                    edge = true;
                    Row::border()
                }
            };
            if self.window.push_back(row) {
                evicted += 1;
            }
            if edge {
                break;
            }
        }
        self.snapshot_previous();
        self.touch_cursor();
        Ok((edge, evicted))
    }

    /// Returns the edge flag and how many rows were prepended.
    async fn scroll_up(&mut self, count: usize) -> Result<(bool, usize)> {
        let continues = self.cursor.as_ref().is_some_and(|c| !c.scroll_down);
        if !continues {
            let Some(anchor) = self.anchor_at(0) else {
                return Ok((true, 0));
            };
            self.open_cursor("prev_rows", false, false, Some(&anchor)).await?;
        }

        let mut edge = false;
        let mut prepended = 0;
        for _ in 0..count {
            match self.fetch().await? {
                Some(data) => {
                    self.window.push_front(Row::new(data));
                    prepended += 1;
                }
                None => {
                    edge = true;
                    break;
                }
            }
        }
        self.snapshot_previous();
        self.touch_cursor();
        Ok((edge, prepended))
    }

    // ---------- navigation ----------

    /// Move the selection down, scrolling when it leaves the window.
    pub async fn move_down(&mut self, n: usize) -> Result<()> {
        let target = self.selection.row + n;
        let last = self.window.last_data_index().unwrap_or(0);
        if target <= last {
            self.selection.row = target;
            return Ok(());
        }
        let (_, evicted) = self.scroll_down(target - last).await?;
        let last = self.window.last_data_index().unwrap_or(0);
        self.selection.row = target.saturating_sub(evicted).min(last);
        Ok(())
    }

    /// Move the selection up, scrolling when it leaves the window.
    pub async fn move_up(&mut self, n: usize) -> Result<()> {
        let row = self.selection.row;
        if row >= n {
            self.selection.row = row - n;
            return Ok(());
        }
        let (_, prepended) = self.scroll_up(n - row).await?;
        self.selection.row = (row + prepended).saturating_sub(n);
        Ok(())
    }

    pub fn move_col(&mut self, delta: isize) {
        let width = self.relation.columns.len() as isize;
        let col = (self.selection.col as isize + delta).clamp(0, width - 1);
        self.selection.col = col as usize;
    }

    pub async fn page_down(&mut self) -> Result<()> {
        self.move_down(self.window.capacity().saturating_sub(1).max(1)).await
    }

    pub async fn page_up(&mut self) -> Result<()> {
        self.move_up(self.window.capacity().saturating_sub(1).max(1)).await
    }

    pub async fn top(&mut self) -> Result<()> {
        self.load_from(None, true, self.selection.col).await
    }

    pub async fn bottom(&mut self) -> Result<()> {
        self.load_from(None, false, self.selection.col).await
    }

    /// The user sort ahead of the key, if any.
    pub fn sort(&self) -> Option<SortColumn> {
        (self.order.len() > self.relation.key.len()).then(|| SortColumn {
            column: self.order[0].column,
            ascending: self.order[0].ascending,
        })
    }

    /// Reorder by `sort` (then the key) and reload from the first row.
    pub async fn set_sort(&mut self, sort: Option<SortColumn>) -> Result<()> {
        self.close_cursor().await;
        self.order = order_terms(&self.relation, sort);
        self.load_from(None, true, self.selection.col).await
    }

    /// Change the window capacity and reload at the current position.
    pub async fn resize(&mut self, capacity: usize) -> Result<()> {
        if capacity == self.window.capacity() {
            return Ok(());
        }
        let anchor = self.top_anchor();
        let row = self.selection.row;
        let col = self.selection.col;
        self.close_cursor().await;
        self.window = Window::new(capacity);
        self.load_from(anchor.as_deref(), true, col).await?;
        self.select(row, col);
        Ok(())
    }

    /// Reload at the current position, keeping the selection where possible.
    pub(crate) async fn reload(&mut self) -> Result<()> {
        let anchor = self.top_anchor();
        let Selection { row, col } = self.selection;
        self.load_from(anchor.as_deref(), true, col).await?;
        self.select(row, col);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::sea::SeaBackend;
    use crate::dialect::DbType;
    use crate::query::BoundQuery;

    pub(crate) async fn sqlite(ddl: &[&str]) -> Arc<dyn Backend> {
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

    pub(crate) fn ids(engine: &RowEngine) -> Vec<Option<i64>> {
        engine
            .window()
            .iter()
            .map(|r| match r.data.first() {
                Some(Value::Int(i)) if !r.is_border() => Some(*i),
                _ => None,
            })
            .collect()
    }

    pub(crate) async fn numbers(count: i64, capacity: usize) -> RowEngine {
        let backend = sqlite(&["CREATE TABLE n (id INTEGER PRIMARY KEY, label TEXT)"]).await;
        for i in 1..=count {
            backend
                .execute(
                    "setup",
                    &BoundQuery::with_params(
                        "INSERT INTO n VALUES (?, ?)",
                        vec![Value::Int(i), Value::Text(format!("r{i}"))],
                        0,
                    ),
                )
                .await
                .unwrap();
        }
        RowEngine::open(backend, &Target::Relation("n".into()), capacity, "NULL")
            .await
            .unwrap()
    }

    #[test]
    fn targets() {
        assert_eq!(Target::parse("users"), Target::Relation("users".into()));
        assert_eq!(
            Target::parse("  select * from users"),
            Target::Sql("select * from users".into())
        );
        assert_eq!(
            Target::parse("WITH a AS (SELECT 1) SELECT * FROM a"),
            Target::Sql("WITH a AS (SELECT 1) SELECT * FROM a".into())
        );
    }

    #[tokio::test]
    async fn empty_relation_loads_a_border_only() {
        let mut e = numbers(0, 3).await;
        assert_eq!(ids(&e), vec![None]);
        assert!(e.window().has_border());
        assert!(e.next_rows(1).await.unwrap());
        assert!(e.prev_rows(1).await.unwrap());
    }

    #[tokio::test]
    async fn load_from_bottom_leaves_room_for_border() {
        let mut e = numbers(10, 4).await;
        e.load_from(None, false, 0).await.unwrap();
        assert_eq!(ids(&e), vec![Some(8), Some(9), Some(10), None]);
        assert_eq!(e.selection().row, 2);
    }

    #[tokio::test]
    async fn bottom_load_with_a_single_slot_shows_the_last_row() {
        let mut e = numbers(5, 1).await;
        e.bottom().await.unwrap();
        assert_eq!(ids(&e), vec![Some(5)]);
        assert_eq!(e.selected_row().unwrap().data[0], Value::Int(5));
    }

    #[tokio::test]
    async fn anchored_bottom_load_fills_forward_when_short() {
        let mut e = numbers(10, 4).await;
        e.load_from(Some(&[Value::Int(2)]), false, 0).await.unwrap();
        assert_eq!(ids(&e), vec![Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(e.selection().row, 1);

        e.load_from(Some(&[Value::Int(7)]), false, 0).await.unwrap();
        assert_eq!(ids(&e), vec![Some(4), Some(5), Some(6), Some(7)]);
        assert_eq!(e.selection().row, 3);
    }

    #[tokio::test]
    async fn walking_down_visits_every_row_once() {
        let mut e = numbers(7, 3).await;
        let mut seen = vec![1, 2, 3];
        loop {
            let edge = e.next_rows(1).await.unwrap();
            if edge {
                break;
            }
            if let Some(Some(i)) = ids(&e).get(2) {
                seen.push(*i);
            }
        }
        assert_eq!(seen, (1..=7).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn prev_then_next_restores_the_window() {
        let mut e = numbers(20, 4).await;
        e.load_from(Some(&[Value::Int(10)]), true, 0).await.unwrap();
        let before = ids(&e);
        assert!(!e.prev_rows(3).await.unwrap());
        assert_eq!(ids(&e), vec![Some(7), Some(8), Some(9), Some(10)]);
        assert!(!e.next_rows(3).await.unwrap());
        assert_eq!(ids(&e), before);
    }

    #[tokio::test]
    async fn single_row_does_not_scroll() {
        let mut e = numbers(1, 3).await;
        assert!(e.next_rows(1).await.unwrap());
        assert!(e.prev_rows(1).await.unwrap());
        assert_eq!(ids(&e), vec![Some(1), None]);
        assert_eq!(e.selection().row, 0);
    }

    #[tokio::test]
    async fn anchored_top_load_equals_initial_load() {
        let mut e = numbers(5, 3).await;
        let initial = ids(&e);
        e.load_from(Some(&[Value::Int(1)]), true, 0).await.unwrap();
        assert_eq!(ids(&e), initial);
    }

    #[tokio::test]
    async fn navigation_scrolls_the_window() {
        let mut e = numbers(10, 3).await;
        e.move_down(4).await.unwrap();
        let selected = e.selected_row().unwrap().data[0].clone();
        assert_eq!(selected, Value::Int(5));
        e.move_up(4).await.unwrap();
        assert_eq!(e.selected_row().unwrap().data[0], Value::Int(1));
        e.bottom().await.unwrap();
        assert_eq!(e.selected_row().unwrap().data[0], Value::Int(10));
        e.top().await.unwrap();
        assert_eq!(e.selected_row().unwrap().data[0], Value::Int(1));
    }

    #[tokio::test]
    async fn sort_column_leads_the_order() {
        let mut e = numbers(6, 3).await;
        e.set_sort(Some(SortColumn {
            column: 0,
            ascending: false,
        }))
        .await
        .unwrap();
        assert_eq!(ids(&e), vec![Some(6), Some(5), Some(4)]);
        assert!(!e.next_rows(2).await.unwrap());
        assert_eq!(ids(&e), vec![Some(4), Some(3), Some(2)]);
        assert_eq!(e.sort().map(|s| s.ascending), Some(false));

        e.set_sort(None).await.unwrap();
        assert_eq!(e.sort(), None);
        assert_eq!(ids(&e), vec![Some(1), Some(2), Some(3)]);
    }

    #[tokio::test]
    async fn relation_without_key_cannot_be_opened() {
        let backend = sqlite(&[
            "CREATE TABLE tags (label TEXT, slug TEXT)",
            "CREATE UNIQUE INDEX tags_slug ON tags (slug)",
        ])
        .await;
        let err = RowEngine::open(backend, &Target::Relation("tags".into()), 3, "NULL")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TedError::NoKey(_)));
    }

    /// `p(id, age)` sorted by the nullable `age`.
    async fn nullable_ages(capacity: usize, ascending: bool) -> RowEngine {
        let backend = sqlite(&[
            "CREATE TABLE p (id INTEGER PRIMARY KEY, age INTEGER)",
            "INSERT INTO p VALUES (1, NULL), (2, NULL), (3, 10), (4, 20), (5, NULL)",
        ])
        .await;
        let mut e = RowEngine::open(backend, &Target::Relation("p".into()), capacity, "NULL")
            .await
            .unwrap();
        e.set_sort(Some(SortColumn {
            column: 1,
            ascending,
        }))
        .await
        .unwrap();
        e
    }

    async fn walk_with_idle_cursor(e: &mut RowEngine) -> Vec<i64> {
        let mut seen: Vec<i64> = ids(e).into_iter().flatten().collect();
        loop {
            e.close_cursor().await;
            if e.next_rows(1).await.unwrap() {
                break;
            }
            if let Some(Some(i)) = ids(e).last() {
                seen.push(*i);
            }
        }
        seen
    }

    #[tokio::test]
    async fn nullable_sort_column_visits_every_row() {
        let mut e = nullable_ages(2, true).await;
        assert_eq!(ids(&e), vec![Some(1), Some(2)]);
        assert_eq!(walk_with_idle_cursor(&mut e).await, vec![1, 2, 5, 3, 4]);

        let mut e = nullable_ages(2, false).await;
        assert_eq!(ids(&e), vec![Some(4), Some(3)]);
        assert_eq!(walk_with_idle_cursor(&mut e).await, vec![4, 3, 1, 2, 5]);
    }

    #[tokio::test]
    async fn nullable_sort_column_scrolls_back_from_a_null_row() {
        let mut e = nullable_ages(2, true).await;
        e.close_cursor().await;
        assert!(!e.next_rows(2).await.unwrap());
        assert_eq!(ids(&e), vec![Some(5), Some(3)]);
        e.close_cursor().await;
        assert!(!e.prev_rows(2).await.unwrap());
        assert_eq!(ids(&e), vec![Some(1), Some(2)]);
    }

    #[tokio::test]
    async fn nullable_sort_column_refreshes_and_finds() {
        let mut e = nullable_ages(3, true).await;
        e.close_cursor().await;
        e.refresh().await.unwrap();
        assert_eq!(ids(&e), vec![Some(1), Some(2), Some(5)]);
        assert!(e.window().iter().all(|r| r.state == RowState::Normal));

        e.select(2, 1);
        let found = e.find_next(1, &Value::Int(20)).await.unwrap().unwrap();
        assert_eq!(found.key, vec![Value::Int(4)]);
        assert!(!found.wrapped);
        let found = e.find_next(1, &Value::Null).await.unwrap().unwrap();
        assert_eq!(found.key, vec![Value::Int(2)]);
        assert!(found.wrapped);
    }
}
