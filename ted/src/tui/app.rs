//! Key handling and UI state. Everything here is synchronous; database work
//! is requested by returning a [`Command`] for the session queue.

use std::ops::Range;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::config::Config;
use crate::engine::{InsertCell, PendingRow};
use crate::query::SortColumn;
use crate::session::{Command, Snapshot};

/// Lines used by the header, status line and palette.
pub const CHROME: u16 = 3;
const WHEEL_ROWS: isize = 3;
/// Blank cells between columns.
pub const GAP: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    /// Editing the selected cell.
    Edit { buffer: String },
    /// Composing a new row; `buffer` is the text of column `col`.
    Insert {
        pending: PendingRow,
        col: usize,
        buffer: String,
    },
    Find { buffer: String },
}

pub struct App {
    pub snapshot: Snapshot,
    pub mode: Mode,
    /// Display width of each column.
    pub widths: Vec<u16>,
    /// Local hint, shown when the session has nothing to say.
    pub message: Option<String>,
    pub size: (u16, u16),
    pub should_quit: bool,
    config: Config,
    pending_delete: bool,
}

impl App {
    pub fn new(config: Config, size: (u16, u16)) -> Self {
        Self {
            snapshot: Snapshot::default(),
            mode: Mode::Normal,
            widths: Vec::new(),
            message: None,
            size,
            should_quit: false,
            config,
            pending_delete: false,
        }
    }

    /// Window capacity for a terminal `height` lines tall.
    pub fn capacity_for(height: u16) -> usize {
        usize::from(height.saturating_sub(CHROME).max(1))
    }

    pub fn set_snapshot(&mut self, snapshot: Snapshot) {
        if snapshot.headers != self.snapshot.headers {
            self.widths = snapshot
                .headers
                .iter()
                .map(|h| {
                    let name = unicode_width::UnicodeWidthStr::width(h.name.as_str()) as u16;
                    self.config.width_for(&h.type_name).max(name.min(32))
                })
                .collect();
        }
        if snapshot.epoch != self.snapshot.epoch {
            self.mode = Mode::Normal;
        }
        if snapshot.status.is_some() {
            self.message = None;
        }
        self.snapshot = snapshot;
    }

    /// Columns that fit in `width` cells with the selected column visible.
    pub fn visible_columns(&self, width: u16) -> Range<usize> {
        let n = self.widths.len();
        let selected = self.snapshot.selection.col.min(n.saturating_sub(1));
        let fits = |range: Range<usize>| -> bool {
            let total: u32 = self.widths[range].iter().map(|w| u32::from(*w + GAP)).sum();
            total <= u32::from(width)
        };
        let mut start = 0;
        while start < selected && !fits(start..selected + 1) {
            start += 1;
        }
        let mut end = start;
        while end < n && (end == start || fits(start..end + 1)) {
            end += 1;
        }
        start..end
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return None;
        }
        let mode = std::mem::replace(&mut self.mode, Mode::Normal);
        match mode {
            Mode::Normal => self.normal_key(key),
            Mode::Edit { buffer } => self.edit_key(key, buffer),
            Mode::Insert { pending, col, buffer } => self.insert_key(key, pending, col, buffer),
            Mode::Find { buffer } => self.find_key(key, buffer),
        }
    }

    fn normal_key(&mut self, key: KeyEvent) -> Option<Command> {
        let delete = std::mem::take(&mut self.pending_delete);
        self.message = None;
        let command = match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return None;
            }
            KeyCode::Up | KeyCode::Char('k') => Command::MoveRows(-1),
            KeyCode::Down | KeyCode::Char('j') => Command::MoveRows(1),
            KeyCode::Left | KeyCode::Char('h') => Command::MoveCols(-1),
            KeyCode::Right | KeyCode::Char('l') => Command::MoveCols(1),
            KeyCode::PageDown => Command::PageDown,
            KeyCode::PageUp => Command::PageUp,
            KeyCode::Char('g') | KeyCode::Home => Command::Top,
            KeyCode::Char('G') | KeyCode::End => Command::Bottom,
            KeyCode::Char('p') => Command::TogglePreview,
            KeyCode::Char('s') => Command::Sort(self.next_sort()),
            KeyCode::Char('d') if delete => {
                if self.snapshot.read_only {
                    self.message = Some("read-only: rows cannot be deleted here".to_string());
                    return None;
                }
                Command::Delete
            }
            KeyCode::Char('d') => {
                self.pending_delete = true;
                return None;
            }
            KeyCode::Enter => {
                self.begin_edit();
                return None;
            }
            KeyCode::Char('o') => {
                self.begin_insert();
                return None;
            }
            KeyCode::Char('/') => {
                self.mode = Mode::Find { buffer: String::new() };
                return None;
            }
            _ => return None,
        };
        Some(command)
    }

    fn begin_edit(&mut self) {
        let s = &self.snapshot;
        let col = s.selection.col;
        let Some(header) = s.headers.get(col) else {
            return;
        };
        if !header.editable {
            self.message = Some(format!("read-only: {} cannot be edited", header.name));
            return;
        }
        let Some(row) = s.rows.get(s.selection.row).filter(|r| !r.is_border()) else {
            return;
        };
        let buffer = row.data[col].format(&s.null_glyph);
        self.mode = Mode::Edit { buffer };
    }

    fn begin_insert(&mut self) {
        if self.snapshot.read_only || self.snapshot.headers.is_empty() {
            self.message = Some("read-only: rows cannot be inserted here".to_string());
            return;
        }
        self.mode = Mode::Insert {
            pending: PendingRow::new(self.snapshot.headers.len()),
            col: 0,
            buffer: String::new(),
        };
    }

    /// Cycle the focused column through ascending, descending and unsorted.
    fn next_sort(&self) -> Option<SortColumn> {
        let column = self.snapshot.selection.col;
        match self.snapshot.sort {
            Some(s) if s.column == column && s.ascending => Some(SortColumn {
                column,
                ascending: false,
            }),
            Some(s) if s.column == column => None,
            _ => Some(SortColumn {
                column,
                ascending: true,
            }),
        }
    }

    fn edit_key(&mut self, key: KeyEvent, mut buffer: String) -> Option<Command> {
        match key.code {
            KeyCode::Esc => None,
            KeyCode::Enter => Some(Command::Update(buffer)),
            code => {
                edit_text(&mut buffer, code);
                self.mode = Mode::Edit { buffer };
                None
            }
        }
    }

    fn insert_key(&mut self, key: KeyEvent, mut pending: PendingRow, mut col: usize, mut buffer: String) -> Option<Command> {
        let width = pending.cells.len();
        match key.code {
            KeyCode::Esc => return None,
            KeyCode::Enter => {
                commit(&mut pending, col, buffer);
                return Some(Command::Insert(pending));
            }
            KeyCode::Char('0') if key.modifiers.contains(KeyModifiers::ALT) => {
                let nullable = self.snapshot.headers.get(col).is_some_and(|h| h.nullable);
                if nullable {
                    pending.cells[col] = InsertCell::Null;
                    buffer.clear();
                } else {
                    self.message = Some("column is NOT NULL".to_string());
                }
            }
            KeyCode::Tab | KeyCode::BackTab => {
                commit(&mut pending, col, std::mem::take(&mut buffer));
                col = if key.code == KeyCode::Tab {
                    (col + 1) % width
                } else {
                    (col + width - 1) % width
                };
                if let InsertCell::Text(t) = &pending.cells[col] {
                    buffer = t.clone();
                }
            }
            code => {
                if pending.cells[col] == InsertCell::Null {
                    pending.cells[col] = InsertCell::Empty;
                }
                edit_text(&mut buffer, code);
            }
        }
        self.mode = Mode::Insert { pending, col, buffer };
        None
    }

    fn find_key(&mut self, key: KeyEvent, mut buffer: String) -> Option<Command> {
        match key.code {
            KeyCode::Esc => None,
            KeyCode::Enter if buffer.is_empty() => Some(Command::Find(None)),
            KeyCode::Enter => Some(Command::Find(Some(buffer))),
            code => {
                edit_text(&mut buffer, code);
                self.mode = Mode::Find { buffer };
                None
            }
        }
    }

    /// Wheel scrolls; a click selects the cell under the pointer.
    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> Option<Command> {
        if self.mode != Mode::Normal {
            return None;
        }
        match mouse.kind {
            MouseEventKind::ScrollDown => Some(Command::MoveRows(WHEEL_ROWS)),
            MouseEventKind::ScrollUp => Some(Command::MoveRows(-WHEEL_ROWS)),
            MouseEventKind::Down(MouseButton::Left) => {
                // first line is the header
                let row = usize::from(mouse.row.checked_sub(1)?);
                if row >= self.snapshot.rows.len() {
                    return None;
                }
                let mut x = 0;
                for c in self.visible_columns(self.size.0) {
                    x += self.widths[c] + GAP;
                    if mouse.column < x {
                        return Some(Command::Select { row, col: c });
                    }
                }
                None
            }
            _ => None,
        }
    }
}

fn commit(pending: &mut PendingRow, col: usize, buffer: String) {
    if !buffer.is_empty() {
        pending.set_text(col, buffer);
    }
}

fn edit_text(buffer: &mut String, code: KeyCode) {
    match code {
        KeyCode::Char(c) => buffer.push(c),
        KeyCode::Backspace => {
            buffer.pop();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Selection;
    use crate::session::Header;
    use crate::value::Value;
    use crate::window::Row;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn header(name: &str, nullable: bool) -> Header {
        Header {
            name: name.into(),
            type_name: "TEXT".into(),
            nullable,
            editable: true,
            key: false,
        }
    }

    fn app() -> App {
        let mut app = App::new(Config::default(), (80, 24));
        app.set_snapshot(Snapshot {
            epoch: 1,
            title: "users".into(),
            headers: vec![header("id", false), header("name", true)],
            rows: vec![
                Row::new(vec![Value::Int(1), Value::Text("a".into())]),
                Row::new(vec![Value::Int(2), Value::Null]),
                Row::border(),
            ],
            null_glyph: "NULL".into(),
            ..Default::default()
        });
        app
    }

    fn typed(app: &mut App, text: &str) {
        for c in text.chars() {
            assert!(app.handle_key(key(KeyCode::Char(c))).is_none());
        }
    }

    #[test]
    fn movement_keys() {
        let mut a = app();
        assert!(matches!(a.handle_key(key(KeyCode::Char('j'))), Some(Command::MoveRows(1))));
        assert!(matches!(a.handle_key(key(KeyCode::Up)), Some(Command::MoveRows(-1))));
        assert!(matches!(a.handle_key(key(KeyCode::Char('G'))), Some(Command::Bottom)));
        assert!(a.handle_key(key(KeyCode::Char('q'))).is_none());
        assert!(a.should_quit);
    }

    #[test]
    fn dd_deletes() {
        let mut a = app();
        assert!(a.handle_key(key(KeyCode::Char('d'))).is_none());
        assert!(matches!(a.handle_key(key(KeyCode::Char('d'))), Some(Command::Delete)));
        // an interrupted pair does nothing
        a.handle_key(key(KeyCode::Char('d')));
        a.handle_key(key(KeyCode::Char('j')));
        assert!(a.handle_key(key(KeyCode::Char('d'))).is_none());
    }

    #[test]
    fn editing_starts_from_the_cell_text() {
        let mut a = app();
        a.snapshot.selection = Selection { row: 1, col: 1 };
        a.handle_key(key(KeyCode::Enter));
        assert_eq!(a.mode, Mode::Edit { buffer: "NULL".into() });
        for _ in 0..4 {
            a.handle_key(key(KeyCode::Backspace));
        }
        typed(&mut a, "bob");
        match a.handle_key(key(KeyCode::Enter)) {
            Some(Command::Update(text)) => assert_eq!(text, "bob"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(a.mode, Mode::Normal);
    }

    #[test]
    fn insert_mode_collects_cells() {
        let mut a = app();
        a.handle_key(key(KeyCode::Char('o')));
        typed(&mut a, "7");
        a.handle_key(key(KeyCode::Tab));
        let alt_zero = KeyEvent::new(KeyCode::Char('0'), KeyModifiers::ALT);
        a.handle_key(alt_zero);
        match a.handle_key(key(KeyCode::Enter)) {
            Some(Command::Insert(p)) => {
                assert_eq!(p.cells, vec![InsertCell::Text("7".into()), InsertCell::Null]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn null_is_refused_for_not_null_columns() {
        let mut a = app();
        a.handle_key(key(KeyCode::Char('o')));
        a.handle_key(KeyEvent::new(KeyCode::Char('0'), KeyModifiers::ALT));
        assert!(a.message.is_some());
        match &a.mode {
            Mode::Insert { pending, .. } => assert_eq!(pending.cells[0], InsertCell::Empty),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn read_only_relations_refuse_row_changes() {
        let mut a = app();
        a.snapshot.read_only = true;
        a.handle_key(key(KeyCode::Char('o')));
        assert_eq!(a.mode, Mode::Normal);
        a.handle_key(key(KeyCode::Char('d')));
        assert!(a.handle_key(key(KeyCode::Char('d'))).is_none());
    }

    #[test]
    fn find_with_empty_text_uses_the_cell() {
        let mut a = app();
        a.handle_key(key(KeyCode::Char('/')));
        assert!(matches!(a.handle_key(key(KeyCode::Enter)), Some(Command::Find(None))));
        a.handle_key(key(KeyCode::Char('/')));
        typed(&mut a, "x");
        assert!(matches!(a.handle_key(key(KeyCode::Enter)), Some(Command::Find(Some(t))) if t == "x"));
    }

    #[test]
    fn sort_cycles() {
        let mut a = app();
        let Some(Command::Sort(Some(s))) = a.handle_key(key(KeyCode::Char('s'))) else {
            panic!("expected a sort");
        };
        assert!(s.ascending);
        a.snapshot.sort = Some(s);
        let Some(Command::Sort(Some(s))) = a.handle_key(key(KeyCode::Char('s'))) else {
            panic!("expected a sort");
        };
        assert!(!s.ascending);
        a.snapshot.sort = Some(s);
        assert!(matches!(a.handle_key(key(KeyCode::Char('s'))), Some(Command::Sort(None))));
    }

    #[test]
    fn visible_columns_follow_the_selection() {
        let mut a = app();
        a.widths = vec![10, 10, 10, 10];
        assert_eq!(a.visible_columns(25), 0..2);
        a.snapshot.selection.col = 3;
        assert_eq!(a.visible_columns(25), 2..4);
        assert_eq!(a.visible_columns(5), 3..4);
    }

    #[test]
    fn capacity_leaves_room_for_chrome() {
        assert_eq!(App::capacity_for(24), 21);
        assert_eq!(App::capacity_for(2), 1);
    }
}
