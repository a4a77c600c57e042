//! Fixed-capacity circular buffer of rows.
//!
//! Logical row `i` lives at `buffer[(pointer + i) % capacity]`. Pushing at
//! the back of a full window evicts the first row; pushing at the front
//! evicts the last.

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowState {
    #[default]
    Normal,
    New,
    Deleted,
    Modified,
    Insert,
    /// End-of-relation marker; never data.
    BottomBorder,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub state: RowState,
    pub data: Vec<Value>,
    /// Changed column indices of a `Modified` row.
    pub modified: Vec<usize>,
}

impl Row {
    pub fn new(data: Vec<Value>) -> Self {
        Self {
            state: RowState::Normal,
            data,
            modified: Vec::new(),
        }
    }

    pub fn border() -> Self {
        Self {
            state: RowState::BottomBorder,
            ..Default::default()
        }
    }

    pub fn is_border(&self) -> bool {
        self.state == RowState::BottomBorder
    }
}

#[derive(Debug, Clone)]
pub struct Window {
    buffer: Vec<Row>,
    capacity: usize,
    pointer: usize,
    len: usize,
}

impl Window {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![Row::default(); capacity],
            capacity,
            pointer: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    fn slot(&self, i: usize) -> usize {
        (self.pointer + i) % self.capacity
    }

    pub fn get(&self, i: usize) -> Option<&Row> {
        (i < self.len).then(|| &self.buffer[self.slot(i)])
    }

    pub fn get_mut(&mut self, i: usize) -> Option<&mut Row> {
        if i < self.len {
            let s = self.slot(i);
            Some(&mut self.buffer[s])
        } else {
            None
        }
    }

    /// Append at the logical end. Returns `true` if the first row was evicted.
    pub fn push_back(&mut self, row: Row) -> bool {
        if self.len < self.capacity {
            let s = self.slot(self.len);
            self.buffer[s] = row;
            self.len += 1;
            false
        } else {
            self.buffer[self.pointer] = row;
            self.pointer = (self.pointer + 1) % self.capacity;
            true
        }
    }

    /// Prepend at the logical start. Returns `true` if the last row was evicted.
    pub fn push_front(&mut self, row: Row) -> bool {
        self.pointer = (self.pointer + self.capacity - 1) % self.capacity;
        self.buffer[self.pointer] = row;
        if self.len < self.capacity {
            self.len += 1;
            false
        } else {
            true
        }
    }

    pub fn clear(&mut self) {
        self.pointer = 0;
        self.len = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> + '_ {
        (0..self.len).map(|i| &self.buffer[self.slot(i)])
    }

    pub fn first(&self) -> Option<&Row> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&Row> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn has_border(&self) -> bool {
        self.last().is_some_and(Row::is_border)
    }

    /// Index of the last row that is not the bottom border.
    pub fn last_data_index(&self) -> Option<usize> {
        let n = if self.has_border() { self.len - 1 } else { self.len };
        n.checked_sub(1)
    }

    /// Number of rows before the bottom border.
    pub fn data_len(&self) -> usize {
        self.last_data_index().map_or(0, |i| i + 1)
    }

    /// Change capacity, keeping the leading rows that still fit.
    pub fn resize(&mut self, capacity: usize) {
        let rows: Vec<Row> = self.iter().cloned().collect();
        *self = Window::new(capacity);
        for row in rows.into_iter().take(self.capacity) {
            self.push_back(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(i: i64) -> Row {
        Row::new(vec![Value::Int(i)])
    }

    fn ids(w: &Window) -> Vec<Option<i64>> {
        w.iter()
            .map(|r| match r.data.first() {
                Some(Value::Int(i)) => Some(*i),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn grows_until_full_then_evicts_front() {
        let mut w = Window::new(3);
        assert!(!w.push_back(row(1)));
        assert!(!w.push_back(row(2)));
        assert!(!w.push_back(row(3)));
        assert!(w.is_full());
        assert!(w.push_back(row(4)));
        assert_eq!(ids(&w), vec![Some(2), Some(3), Some(4)]);
    }

    #[test]
    fn push_front_evicts_last() {
        let mut w = Window::new(3);
        for i in 2..=4 {
            w.push_back(row(i));
        }
        assert!(w.push_front(row(1)));
        assert_eq!(ids(&w), vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn push_front_into_partial_window() {
        let mut w = Window::new(4);
        w.push_back(row(5));
        w.push_front(row(4));
        w.push_front(row(3));
        assert_eq!(ids(&w), vec![Some(3), Some(4), Some(5)]);
        assert_eq!(w.get(3), None);
    }

    #[test]
    fn border_tracking() {
        let mut w = Window::new(3);
        assert_eq!(w.last_data_index(), None);
        w.push_back(Row::border());
        assert!(w.has_border());
        assert_eq!(w.data_len(), 0);

        let mut w = Window::new(3);
        w.push_back(row(1));
        w.push_back(Row::border());
        assert_eq!(w.last_data_index(), Some(0));
        // scrolling up past a border evicts it
        w.push_front(row(0));
        w.push_front(row(-1));
        assert!(!w.has_border());
        assert_eq!(ids(&w), vec![Some(-1), Some(0), Some(1)]);
    }

    #[test]
    fn wraps_many_times() {
        let mut w = Window::new(2);
        for i in 0..10 {
            w.push_back(row(i));
        }
        assert_eq!(ids(&w), vec![Some(8), Some(9)]);
        for i in (0..8).rev() {
            w.push_front(row(i));
        }
        assert_eq!(ids(&w), vec![Some(0), Some(1)]);
    }

    #[test]
    fn resize_keeps_leading_rows() {
        let mut w = Window::new(4);
        for i in 0..4 {
            w.push_back(row(i));
        }
        w.resize(2);
        assert_eq!(ids(&w), vec![Some(0), Some(1)]);
        w.resize(5);
        assert_eq!(w.capacity(), 5);
        assert_eq!(w.len(), 2);
    }
}
