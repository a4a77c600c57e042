use std::cmp::Ordering;

use crate::error::Result;
use crate::query::{OrderTerm, Page, QueryBuilder};
use crate::value::Value;
use crate::window::{Row, RowState};

use super::{RowEngine, Selection};

impl RowEngine {
    /// Re-read the window from its top row and mark what changed since the
    /// previous refresh. Does nothing while a cursor is open.
    pub async fn refresh(&mut self) -> Result<()> {
        if self.cursor.is_some() {
            return Ok(());
        }
        let n = self.window.capacity();
        let anchor = self.top_anchor();
        let query = QueryBuilder::new(self.backend.dialect(), &self.relation).select_page(Page {
            order: &self.order,
            scroll_down: true,
            inclusive: true,
            anchor: anchor.as_deref(),
            limit: Some(n),
        });
        let current = self.backend.query("refresh", &query).await?;
        let reached_end = current.len() < n;

        let key = &self.relation.key;
        let rows = diff(&self.order, key, &self.previous, &current, reached_end);
        let changed = rows.iter().filter(|r| r.state != RowState::Normal).count();
        if changed > 0 {
            tracing::debug!(relation = %self.relation.name, changed, "refresh found changes");
        }

        let selected_key = self
            .selected_row()
            .map(|r| self.relation.key_values(&r.data));
        self.window.clear();
        for row in rows.into_iter().take(n) {
            self.window.push_back(row);
        }
        if reached_end && !self.window.is_full() {
            self.window.push_back(Row::border());
        }
        self.previous = current.into_iter().map(Row::new).collect();

        let Selection { row, col } = self.selection;
        let row = selected_key
            .and_then(|k| self.position_of(&k))
            .unwrap_or(row);
        self.select(row, col);
        Ok(())
    }
}

/// Merge `current` with `previous`, marking new, modified and deleted rows.
///
/// A row missing from `current` is reported deleted only when it falls
/// inside the range `current` covers: before its last row, or anywhere if
/// `current` reached the end of the relation. Deleted rows keep the
/// position they had in `previous`.
pub(crate) fn diff(
    order: &[OrderTerm],
    key: &[usize],
    previous: &[Row],
    current: &[Vec<Value>],
    reached_end: bool,
) -> Vec<Row> {
    let key_of = |data: &[Value]| -> Vec<Value> { key.iter().map(|&i| data[i].clone()).collect() };
    let before: Vec<(Vec<Value>, &Row)> = previous.iter().map(|r| (key_of(&r.data), r)).collect();
    let now: Vec<Vec<Value>> = current.iter().map(|d| key_of(d)).collect();
    let present = |k: &Vec<Value>| now.contains(k);

    let mut out: Vec<Row> = current
        .iter()
        .map(|data| {
            let k = key_of(data);
            (data, before.iter().find(|(pk, _)| *pk == k).map(|(_, r)| *r))
        })
        .map(|(data, old)| match old {
            None => Row {
                state: RowState::New,
                data: data.clone(),
                modified: Vec::new(),
            },
            Some(old) => {
                let modified: Vec<usize> = data
                    .iter()
                    .zip(&old.data)
                    .enumerate()
                    .filter(|(_, (a, b))| a != b)
                    .map(|(i, _)| i)
                    .collect();
                Row {
                    state: if modified.is_empty() {
                        RowState::Normal
                    } else {
                        RowState::Modified
                    },
                    data: data.clone(),
                    modified,
                }
            }
        })
        .collect();

    let last = current.last();
    for (i, old) in previous.iter().enumerate() {
        if present(&key_of(&old.data)) {
            continue;
        }
        let later_survivor = previous[i + 1..]
            .iter()
            .any(|r| present(&key_of(&r.data)));
        let in_range = reached_end
            || later_survivor
            || last.is_some_and(|l| compare_order(order, &old.data, l) == Ordering::Less);
        if in_range {
            let ghost = Row {
                state: RowState::Deleted,
                data: old.data.clone(),
                modified: Vec::new(),
            };
            out.insert(i.min(out.len()), ghost);
        }
    }
    out
}

/// Compare two rows under the pagination order.
fn compare_order(order: &[OrderTerm], a: &[Value], b: &[Value]) -> Ordering {
    for t in order {
        let o = compare_values(&a[t.column], &b[t.column]);
        let o = if t.ascending { o } else { o.reverse() };
        if o != Ordering::Equal {
            return o;
        }
    }
    Ordering::Equal
}

/// Total order over values; NULL sorts first, numbers compare across int/float.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    use Value::*;
    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Int(x), Int(y)) => x.cmp(y),
        (Int(x), Float(y)) => (*x as f64).total_cmp(y),
        (Float(x), Int(y)) => x.total_cmp(&(*y as f64)),
        (Float(x), Float(y)) => x.total_cmp(y),
        (Bool(x), Bool(y)) => x.cmp(y),
        (Text(x), Text(y)) => x.cmp(y),
        (Bytes(x), Bytes(y)) => x.cmp(y),
        (Timestamp(x), Timestamp(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
