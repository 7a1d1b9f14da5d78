use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Tabs, Wrap};
use time::OffsetDateTime;

use crate::cascade::CascadeStage;
use crate::view::ViewState;

use super::*;

pub(super) fn draw(frame: &mut ratatui::Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    draw_tabs(frame, app, chunks[0]);
    draw_table(frame, app, chunks[1]);
    draw_log(frame, app, chunks[2]);
    draw_keys(frame, app, chunks[3]);

    if let Some(plan) = app.console.delete_plan() {
        let mut lines = plan.prompt_lines();
        lines.push(String::new());
        lines.push(match plan.stage() {
            CascadeStage::Resolving | CascadeStage::Deleting | CascadeStage::Done => {
                "please wait…".to_string()
            }
            CascadeStage::Plain => "y/Enter: delete   n/Esc: cancel".to_string(),
            CascadeStage::Decide => "1-9: toggle   y/Enter: delete   n/Esc: cancel".to_string(),
        });
        let inner = modal::draw_box(frame, "Delete", lines.len() as u16 + 2);
        let lines: Vec<Line> = lines.into_iter().map(Line::from).collect();
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
    } else if let Some(modal) = &app.modal {
        modal::draw_modal(frame, modal);
    }
}

fn draw_tabs(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let titles: Vec<Line> = EntityKind::ALL
        .iter()
        .map(|k| Line::from(k.schema().title))
        .collect();
    let tabs = Tabs::new(titles)
        .select(app.tab)
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .divider("|");

    let parts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(16)])
        .split(area);
    frame.render_widget(tabs, parts[0]);

    let (text, color) = match app.connected() {
        Some(true) => ("● live", Color::Green),
        Some(false) => ("○ reconnecting", Color::Red),
        None => ("offline", Color::Gray),
    };
    frame.render_widget(
        Paragraph::new(Span::styled(text, Style::default().fg(color))),
        parts[1],
    );
}

fn draw_table(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let kind = app.kind();
    let view = app.console.view(kind);
    let schema = view.schema();

    let sort = view.sort();
    let header = Row::new(schema.columns.iter().map(|c| {
        let arrow = match (sort, c.sort_key) {
            (Some(s), Some(key)) if s.field == key => format!(" {}", s.direction.arrow()),
            _ => String::new(),
        };
        Cell::from(format!("{}{}", c.title, arrow))
    }))
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = (0..view.records().len()).map(|i| {
        let cells = schema.columns.iter().enumerate().map(|(j, c)| {
            let text = app.console.cell_text(kind, i, c.field);
            let focused = i == app.row() && j == app.col();
            let editing = focused && app.editing.is_some();
            let style = if editing {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else if focused {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            Cell::from(text).style(style)
        });
        let row = Row::new(cells);
        if i == app.row() {
            row.style(Style::default().fg(Color::Cyan))
        } else {
            row
        }
    });

    let widths: Vec<Constraint> = schema
        .columns
        .iter()
        .map(|c| Constraint::Length(c.width))
        .collect();

    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title(view_title(app)));
    frame.render_widget(table, area);
}

fn view_title(app: &App) -> Line<'static> {
    let view = app.console.view(app.kind());
    let pages = if view.total_pages() == 0 {
        "no records".to_string()
    } else {
        format!("page {}/{}", view.index() + 1, view.total_pages())
    };
    let mut spans = vec![
        Span::styled(
            view.schema().title.to_string(),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(format!("  {}  size {}", pages, view.size())),
    ];
    if let Some(filter) = view.filter() {
        spans.push(Span::raw(format!("  name~\"{}\"", filter)));
    }
    let (state, color) = match view.state() {
        ViewState::Idle => ("idle".to_string(), Color::Gray),
        ViewState::Loading => ("loading…".to_string(), Color::Gray),
        ViewState::Ready => (
            view.loaded_at()
                .map(|at| fmt_since(at, OffsetDateTime::now_utc()))
                .unwrap_or_default(),
            Color::Gray,
        ),
        ViewState::Error => ("load failed".to_string(), Color::Red),
    };
    spans.push(Span::raw("  "));
    spans.push(Span::styled(state, Style::default().fg(color)));
    Line::from(spans)
}

fn fmt_since(at: OffsetDateTime, now: OffsetDateTime) -> String {
    let secs = (now - at).whole_seconds().max(0);
    if secs < 5 {
        "updated just now".to_string()
    } else if secs < 60 {
        format!("updated {}s ago", secs)
    } else {
        format!("updated {}m ago", secs / 60)
    }
}

fn draw_log(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .log
        .iter()
        .rev()
        .take(area.height.saturating_sub(2) as usize)
        .map(|n| {
            let color = match n.level {
                NoticeLevel::Info => Color::Green,
                NoticeLevel::Error => Color::Red,
            };
            Line::from(Span::styled(n.text.clone(), Style::default().fg(color)))
        })
        .collect();
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Notices")),
        area,
    );
}

fn draw_keys(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let text = if app.editing.is_some() {
        "Enter: submit  Esc: cancel  ↑/↓: choose  arrows/Tab: leave cell"
    } else {
        concat!(
            "Tab: view  Enter: edit  s: sort  n/p: page  +/-/z: size  f: filter  ",
            "c/u: form  d: delete  r: reload  a/b//: reports  x: unassign  q: quit"
        )
    };
    frame.render_widget(
        Paragraph::new(Span::styled(text, Style::default().fg(Color::Gray))),
        area,
    );
}
