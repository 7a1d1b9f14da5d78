use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::remote::{Report, check_health_bound, check_name_fragment};
use crate::schema::FieldDef;

use super::*;

pub(super) struct Modal {
    pub(super) kind: ModalKind,
    pub(super) title: String,
    pub(super) lines: Vec<String>,
}

pub(super) enum ModalKind {
    ConfirmEdit {
        cell: CellRef,
    },
    Filter {
        kind: EntityKind,
        input: Input,
    },
    PageSize {
        kind: EntityKind,
        input: Input,
    },
    Form {
        kind: EntityKind,
        target: Option<RecordId>,
        fields: &'static [FieldDef],
        values: Vec<String>,
        field: usize,
        input: Input,
    },
    HealthBound {
        input: Input,
    },
    NameSearch {
        input: Input,
    },
    ConfirmUnassign {
        id: RecordId,
    },
    Answer,
}

impl Modal {
    pub(super) fn confirm_edit(console: &Console, cell: CellRef) -> Self {
        let prompt = console
            .session(&cell)
            .and_then(|s| s.pending())
            .map(|p| p.prompt.clone())
            .unwrap_or_default();
        Self {
            kind: ModalKind::ConfirmEdit { cell },
            title: "Confirm change".to_string(),
            lines: vec![prompt, String::new(), "y/Enter: apply   n/Esc: discard".to_string()],
        }
    }

    pub(super) fn filter(kind: EntityKind, current: &str) -> Self {
        Self {
            kind: ModalKind::Filter {
                kind,
                input: Input::with(current),
            },
            title: format!("Filter {} by name", kind.schema().title),
            lines: vec!["Enter: apply (empty clears)   Esc: cancel".to_string()],
        }
    }

    pub(super) fn page_size(kind: EntityKind, current: usize) -> Self {
        Self {
            kind: ModalKind::PageSize {
                kind,
                input: Input::with(&current.to_string()),
            },
            title: format!("{} page size", kind.schema().title),
            lines: vec![format!(
                "1 to {}. Enter: apply   Esc: cancel",
                crate::view::MAX_PAGE_SIZE
            )],
        }
    }

    pub(super) fn health_bound() -> Self {
        Self {
            kind: ModalKind::HealthBound {
                input: Input::default(),
            },
            title: "Count units with health below".to_string(),
            lines: vec!["Enter: count   Esc: cancel".to_string()],
        }
    }

    pub(super) fn name_search() -> Self {
        Self {
            kind: ModalKind::NameSearch {
                input: Input::default(),
            },
            title: "Search units by name".to_string(),
            lines: vec!["Enter: search   Esc: cancel".to_string()],
        }
    }

    pub(super) fn confirm_unassign(id: RecordId, prompt: String) -> Self {
        Self {
            kind: ModalKind::ConfirmUnassign { id },
            title: "Remove from chapter".to_string(),
            lines: vec![prompt, String::new(), "y/Enter: remove   n/Esc: keep".to_string()],
        }
    }

    /// Search results; tabs in the detail lines become spacing.
    pub(super) fn answer(summary: String, details: &[String]) -> Self {
        let mut lines: Vec<String> = details.iter().map(|l| l.replace('\t', "  ")).collect();
        lines.push(String::new());
        lines.push("Esc/Enter: close".to_string());
        Self {
            kind: ModalKind::Answer,
            title: summary,
            lines,
        }
    }

    pub(super) fn form(
        kind: EntityKind,
        target: Option<RecordId>,
        initial: &BTreeMap<String, String>,
    ) -> Self {
        let schema = kind.schema();
        let fields = schema.fields;
        let values: Vec<String> = fields
            .iter()
            .map(|f| initial.get(f.name).cloned().unwrap_or_default())
            .collect();
        let input = Input::with(values.first().map(String::as_str).unwrap_or(""));
        let title = match target {
            Some(id) => format!("Update {} {}", schema.singular, id),
            None => format!("New {}", schema.singular),
        };
        Self {
            kind: ModalKind::Form {
                kind,
                target,
                fields,
                values,
                field: 0,
                input,
            },
            title,
            lines: vec!["Up/Down: field   Enter: save   Esc: cancel".to_string()],
        }
    }
}

/// Returns whether the modal stays open.
pub(super) fn handle_key(app: &mut App, modal: &mut Modal, key: KeyEvent) -> bool {
    match &mut modal.kind {
        ModalKind::ConfirmEdit { cell } => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                app.console.confirm_edit(cell, true);
                false
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                app.console.confirm_edit(cell, false);
                false
            }
            _ => true,
        },

        ModalKind::Filter { kind, input } => match key.code {
            KeyCode::Esc => false,
            KeyCode::Enter => {
                let text = input.take();
                let filter = Some(text).filter(|t| !t.trim().is_empty());
                if app.console.set_filter(*kind, filter) {
                    app.rows[app.tab] = 0;
                }
                false
            }
            _ => {
                edit_input(input, key);
                true
            }
        },

        ModalKind::PageSize { kind, input } => match key.code {
            KeyCode::Esc => false,
            KeyCode::Enter => match input.buf.trim().parse::<usize>() {
                Ok(size) if (1..=crate::view::MAX_PAGE_SIZE).contains(&size) => {
                    if app.console.set_page_size(*kind, size) {
                        app.rows[app.tab] = 0;
                    }
                    false
                }
                _ => {
                    modal.lines = vec![format!(
                        "Page size must be a number from 1 to {}",
                        crate::view::MAX_PAGE_SIZE
                    )];
                    true
                }
            },
            _ => {
                edit_input(input, key);
                true
            }
        },

        ModalKind::Form {
            kind,
            target,
            fields,
            values,
            field,
            input,
        } => match key.code {
            KeyCode::Esc => false,
            KeyCode::Up | KeyCode::BackTab => {
                values[*field] = input.take();
                *field = field.checked_sub(1).unwrap_or(fields.len() - 1);
                input.set(values[*field].clone());
                true
            }
            KeyCode::Down | KeyCode::Tab => {
                values[*field] = input.take();
                *field = (*field + 1) % fields.len();
                input.set(values[*field].clone());
                true
            }
            KeyCode::Enter => {
                values[*field] = input.buf.clone();
                let draft: BTreeMap<String, String> = fields
                    .iter()
                    .zip(values.iter())
                    .map(|(f, v)| (f.name.to_string(), v.clone()))
                    .collect();
                match kind.schema().form_payload(&draft) {
                    Ok(_) => {
                        app.console.save_form(*kind, *target, &draft);
                        false
                    }
                    Err(err) => {
                        modal.lines = vec![err.to_string()];
                        true
                    }
                }
            }
            _ => {
                edit_input(input, key);
                true
            }
        },

        ModalKind::HealthBound { input } => match key.code {
            KeyCode::Esc => false,
            KeyCode::Enter => {
                let parsed = input.buf.trim().parse::<i64>().ok();
                match parsed.map(check_health_bound) {
                    Some(Ok(health)) => {
                        app.console.run_report(Report::CountBelowHealth(health));
                        false
                    }
                    Some(Err(err)) => {
                        modal.lines = vec![err.to_string()];
                        true
                    }
                    None => {
                        modal.lines = vec!["Health bound must be a whole number".to_string()];
                        true
                    }
                }
            }
            _ => {
                edit_input(input, key);
                true
            }
        },

        ModalKind::NameSearch { input } => match key.code {
            KeyCode::Esc => false,
            KeyCode::Enter => match check_name_fragment(&input.buf) {
                Ok(fragment) => {
                    app.console.run_report(Report::SearchByName(fragment.to_string()));
                    false
                }
                Err(err) => {
                    modal.lines = vec![err.to_string()];
                    true
                }
            },
            _ => {
                edit_input(input, key);
                true
            }
        },

        ModalKind::ConfirmUnassign { id } => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                app.console.remove_from_chapter(*id);
                false
            }
            KeyCode::Char('n') | KeyCode::Esc => false,
            _ => true,
        },

        ModalKind::Answer => !matches!(
            key.code,
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')
        ),
    }
}

fn edit_input(input: &mut Input, key: KeyEvent) {
    match key.code {
        KeyCode::Char(c) => input.insert_char(c),
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.move_left(),
        KeyCode::Right => input.move_right(),
        _ => {}
    }
}

/// Clears and frames a centered box; returns its inner area.
pub(super) fn draw_box(frame: &mut ratatui::Frame, title: &str, height: u16) -> Rect {
    let area = frame.area();
    let w = area.width.saturating_sub(6).clamp(20, 90);
    let h = height.clamp(5, area.height.saturating_sub(2).max(5));
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    let box_area = Rect {
        x,
        y,
        width: w,
        height: h,
    };

    frame.render_widget(ratatui::widgets::Clear, box_area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            title.to_string(),
            Style::default().fg(Color::Yellow),
        ));
    let inner = block.inner(box_area);
    frame.render_widget(block, box_area);
    inner
}

pub(super) fn draw_modal(frame: &mut ratatui::Frame, modal: &Modal) {
    let lines: Vec<Line> = modal.lines.iter().map(|s| Line::from(s.as_str())).collect();
    match &modal.kind {
        ModalKind::ConfirmEdit { .. } | ModalKind::ConfirmUnassign { .. } => {
            let inner = draw_box(frame, &modal.title, 7);
            frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
        }

        ModalKind::Answer => {
            let inner = draw_box(frame, &modal.title, lines.len() as u16 + 2);
            frame.render_widget(Paragraph::new(lines), inner);
        }

        ModalKind::Filter { input, .. }
        | ModalKind::PageSize { input, .. }
        | ModalKind::HealthBound { input }
        | ModalKind::NameSearch { input } => {
            let inner = draw_box(frame, &modal.title, 7);
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(3)])
                .split(inner);
            frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), parts[0]);
            frame.render_widget(
                Paragraph::new(input.buf.as_str()).block(Block::default().borders(Borders::ALL)),
                parts[1],
            );
            frame.set_cursor_position((parts[1].x + 1 + input.cursor as u16, parts[1].y + 1));
        }

        ModalKind::Form {
            fields,
            values,
            field,
            input,
            ..
        } => {
            let inner = draw_box(frame, &modal.title, fields.len() as u16 + 5);
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(0), Constraint::Length(2)])
                .split(inner);

            let label_width = fields.iter().map(|f| f.label.len()).max().unwrap_or(0) + 2;
            let rows: Vec<Line> = fields
                .iter()
                .enumerate()
                .map(|(i, f)| {
                    let active = i == *field;
                    let value = if active {
                        input.buf.as_str()
                    } else {
                        values[i].as_str()
                    };
                    let label = format!("{:<width$}", f.label, width = label_width);
                    let style = if active {
                        Style::default().add_modifier(Modifier::BOLD)
                    } else {
                        Style::default()
                    };
                    Line::from(vec![
                        Span::styled(label, Style::default().fg(Color::Gray)),
                        Span::styled(value.to_string(), style),
                    ])
                })
                .collect();
            frame.render_widget(Paragraph::new(rows), parts[0]);
            frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), parts[1]);

            let x = parts[0].x + label_width as u16 + input.cursor as u16;
            frame.set_cursor_position((x, parts[0].y + *field as u16));
        }
    }
}
