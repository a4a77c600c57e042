//! Rendering.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Cell, Paragraph, Row as TableRow, Table};
use unicode_width::UnicodeWidthChar;

use crate::engine::InsertCell;
use crate::window::{Row, RowState};

use super::app::{App, GAP, Mode};

pub fn draw(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(2), Constraint::Length(1), Constraint::Length(1)])
        .split(frame.area());

    draw_table(frame, app, chunks[0]);
    draw_status(frame, app, chunks[1]);
    draw_palette(frame, app, chunks[2]);
}

fn draw_table(frame: &mut Frame, app: &App, area: Rect) {
    let s = &app.snapshot;
    let columns = app.visible_columns(area.width);

    let header = TableRow::new(columns.clone().map(|c| {
        let h = &s.headers[c];
        let mut style = Style::default().add_modifier(Modifier::BOLD);
        if h.key {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        if let Some(sort) = s.sort.filter(|sort| sort.column == c) {
            let arrow = if sort.ascending { "▲" } else { "▼" };
            return Cell::from(format!("{}{arrow}", h.name)).style(style);
        }
        Cell::from(h.name.clone()).style(style)
    }));

    let rows = s.rows.iter().enumerate().map(|(i, row)| {
        if row.is_border() {
            let width = usize::from(area.width);
            return TableRow::new([Cell::from("─".repeat(width))]).style(Style::default().fg(Color::DarkGray));
        }
        TableRow::new(columns.clone().map(|c| {
            let text = row.data.get(c).map(|v| v.format(&s.null_glyph)).unwrap_or_default();
            let text = clip(&text, app.widths[c]);
            let mut style = cell_style(row, c);
            if i == s.selection.row && c == s.selection.col {
                style = style.add_modifier(Modifier::REVERSED);
            }
            Cell::from(text).style(style)
        }))
        .style(row_style(row.state))
    });

    let widths: Vec<Constraint> = columns.clone().map(|c| Constraint::Length(app.widths[c])).collect();
    let table = Table::new(rows, widths).header(header).column_spacing(GAP);
    frame.render_widget(table, area);
}

fn row_style(state: RowState) -> Style {
    match state {
        RowState::New => Style::default().fg(Color::Green),
        RowState::Deleted => Style::default().fg(Color::Red).add_modifier(Modifier::CROSSED_OUT),
        RowState::Insert => Style::default().fg(Color::Cyan),
        RowState::Normal | RowState::Modified | RowState::BottomBorder => Style::default(),
    }
}

fn cell_style(row: &Row, col: usize) -> Style {
    if row.state == RowState::Modified && row.modified.contains(&col) {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    }
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let s = &app.snapshot;
    let (text, style) = match (&s.status, &app.message) {
        (Some(status), _) if s.error => (status.clone(), Style::default().fg(Color::Red)),
        (Some(status), _) => (status.clone(), Style::default()),
        (None, Some(message)) => (message.clone(), Style::default().fg(Color::Yellow)),
        (None, None) => {
            let mut parts = vec![s.title.clone()];
            if s.read_only {
                parts.push("[read-only]".to_string());
            }
            if let Some(h) = s.headers.get(s.selection.col) {
                parts.push(format!("{} {}", h.name, h.type_name));
            }
            (parts.join("  "), Style::default().fg(Color::DarkGray))
        }
    };
    frame.render_widget(Paragraph::new(text).style(style), area);
}

fn draw_palette(frame: &mut Frame, app: &App, area: Rect) {
    let s = &app.snapshot;
    let line = match &app.mode {
        Mode::Edit { buffer } => Line::from(vec![Span::styled("edit: ", Style::default().fg(Color::Cyan)), Span::raw(buffer.clone())]),
        Mode::Find { buffer } => Line::from(vec![Span::styled("/", Style::default().fg(Color::Cyan)), Span::raw(buffer.clone())]),
        Mode::Insert { pending, col, buffer } => {
            let mut spans = vec![Span::styled("insert: ", Style::default().fg(Color::Cyan))];
            for (i, (h, cell)) in s.headers.iter().zip(&pending.cells).enumerate() {
                let value = match cell {
                    _ if i == *col && !buffer.is_empty() => buffer.clone(),
                    InsertCell::Empty => String::new(),
                    InsertCell::Null => s.null_glyph.clone(),
                    InsertCell::Text(t) => t.clone(),
                };
                let style = if i == *col {
                    Style::default().add_modifier(Modifier::REVERSED)
                } else {
                    Style::default()
                };
                spans.push(Span::styled(format!("{}={value}", h.name), style));
                spans.push(Span::raw(" "));
            }
            Line::from(spans)
        }
        Mode::Normal => match &s.preview {
            Some(preview) => Line::from(Span::styled(preview.clone(), Style::default().fg(Color::Magenta))),
            None => Line::from(Span::styled(
                "q quit  enter edit  o insert  dd delete  / find  s sort  p preview",
                Style::default().fg(Color::DarkGray),
            )),
        },
    };
    frame.render_widget(Paragraph::new(line), area);
}

/// Cut `text` to `width` display cells.
fn clip(text: &str, width: u16) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let c = if c.is_control() { ' ' } else { c };
        let w = c.width().unwrap_or(0);
        if used + w > usize::from(width) {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}
