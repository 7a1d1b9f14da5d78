use super::*;

use crate::cascade::CascadeStage;
use crate::remote::Report;
use crate::schema::raw_value;

const LOG_LIMIT: usize = 200;
const PAGE_SIZE_STEP: usize = 5;

pub(super) struct App {
    pub(super) console: Console,
    channel: Option<PushChannel>,
    subscription: Option<Subscription>,
    pub(super) tab: usize,
    pub(super) rows: [usize; 3],
    pub(super) cols: [usize; 3],
    /// The cell with keyboard focus while editing.
    pub(super) editing: Option<CellRef>,
    pub(super) modal: Option<Modal>,
    pub(super) log: Vec<Notice>,
    pub(super) quit: bool,
}

impl App {
    pub(super) fn new(
        console: Console,
        channel: Option<PushChannel>,
        subscription: Option<Subscription>,
    ) -> Self {
        Self {
            console,
            channel,
            subscription,
            tab: 0,
            rows: [0; 3],
            cols: [1; 3],
            editing: None,
            modal: None,
            log: Vec::new(),
            quit: false,
        }
    }

    pub(super) fn shutdown(&mut self) {
        if let Some(mut sub) = self.subscription.take() {
            sub.dispose();
        }
        if let Some(mut channel) = self.channel.take() {
            channel.shutdown();
        }
    }

    pub(super) fn connected(&self) -> Option<bool> {
        self.channel.as_ref().map(PushChannel::is_connected)
    }

    pub(super) fn kind(&self) -> EntityKind {
        EntityKind::ALL[self.tab]
    }

    pub(super) fn row(&self) -> usize {
        self.rows[self.tab]
    }

    pub(super) fn col(&self) -> usize {
        self.cols[self.tab]
    }

    fn focused_id(&self) -> Option<RecordId> {
        self.console
            .view(self.kind())
            .records()
            .get(self.row())
            .and_then(|r| r.id())
    }

    fn focused_cell(&self) -> Option<CellRef> {
        let column = self.kind().schema().columns.get(self.col())?;
        CellRef::new(self.kind(), self.focused_id()?, column.field)
    }

    pub(super) fn collect_notices(&mut self) {
        self.log.extend(self.console.take_notices());
        if self.log.len() > LOG_LIMIT {
            let excess = self.log.len() - LOG_LIMIT;
            self.log.drain(..excess);
        }
    }

    /// Opens the prompt for any edit waiting on confirmation (Enter or a blur commit).
    pub(super) fn sync_modal(&mut self) {
        if self.modal.is_some() || self.console.delete_plan().is_some() {
            return;
        }
        let confirming = self
            .console
            .sessions()
            .find(|s| s.state() == EditState::Confirming)
            .map(|s| s.cell());
        if let Some(cell) = confirming {
            self.modal = Some(Modal::confirm_edit(&self.console, cell));
            return;
        }
        if let Some((report, answer)) = self.console.take_answer() {
            let details = answer.lines();
            if !details.is_empty() {
                self.modal = Some(Modal::answer(report.summary(&answer), &details));
            }
        }
    }

    pub(super) fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit = true;
            return;
        }
        if self.modal.is_some() {
            self.handle_modal_key(key);
            return;
        }
        if self.console.delete_plan().is_some() {
            self.handle_delete_key(key);
            return;
        }
        if let Some(cell) = self.editing {
            self.handle_edit_key(cell, key);
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit = true,
            KeyCode::Tab => self.switch_tab(1),
            KeyCode::BackTab => self.switch_tab(EntityKind::ALL.len() - 1),
            KeyCode::Up | KeyCode::Char('k') => self.move_row(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_row(1),
            KeyCode::Left | KeyCode::Char('h') => self.move_col(-1),
            KeyCode::Right | KeyCode::Char('l') => self.move_col(1),
            KeyCode::Enter => self.begin_edit(),
            KeyCode::Char('s') => {
                let kind = self.kind();
                let sort_key = kind
                    .schema()
                    .columns
                    .get(self.col())
                    .and_then(|c| c.sort_key);
                if let Some(field) = sort_key {
                    self.console.sort_toggle(kind, field);
                    self.rows[self.tab] = 0;
                }
            }
            KeyCode::Char('n') | KeyCode::PageDown => {
                if self.console.next_page(self.kind()) {
                    self.rows[self.tab] = 0;
                }
            }
            KeyCode::Char('p') | KeyCode::PageUp => {
                if self.console.prev_page(self.kind()) {
                    self.rows[self.tab] = 0;
                }
            }
            KeyCode::Char('+') => {
                let size = self.console.view(self.kind()).size() + PAGE_SIZE_STEP;
                self.console.set_page_size(self.kind(), size);
            }
            KeyCode::Char('-') => {
                let size = self
                    .console
                    .view(self.kind())
                    .size()
                    .saturating_sub(PAGE_SIZE_STEP)
                    .max(1);
                self.console.set_page_size(self.kind(), size);
            }
            KeyCode::Char('z') => {
                let size = self.console.view(self.kind()).size();
                self.modal = Some(Modal::page_size(self.kind(), size));
            }
            KeyCode::Char('f') => {
                let kind = self.kind();
                if kind.schema().filter_param.is_some() {
                    let current = self.console.view(kind).filter().unwrap_or("").to_string();
                    self.modal = Some(Modal::filter(kind, &current));
                } else {
                    self.note(format!("{} cannot be filtered", kind.schema().title));
                }
            }
            KeyCode::Char('r') => self.console.load(self.kind()),
            KeyCode::Char('d') => {
                if let Some(id) = self.focused_id() {
                    self.console.begin_delete(self.kind(), id);
                }
            }
            KeyCode::Char('c') => {
                self.modal = Some(Modal::form(self.kind(), None, &BTreeMap::new()));
            }
            KeyCode::Char('a') => self.console.run_report(Report::AverageHeartCount),
            KeyCode::Char('b') => self.modal = Some(Modal::health_bound()),
            KeyCode::Char('/') => self.modal = Some(Modal::name_search()),
            KeyCode::Char('x') => self.begin_unassign(),
            KeyCode::Char('u') => {
                let kind = self.kind();
                let Some(id) = self.focused_id() else {
                    return;
                };
                let values: BTreeMap<String, String> = match self.console.view(kind).row(id) {
                    Some(record) => {
                        let mut current = record.clone();
                        kind.schema().normalize(&mut current);
                        kind.schema()
                            .fields
                            .iter()
                            .map(|f| (f.name.to_string(), raw_value(current.get(f.name))))
                            .collect()
                    }
                    None => BTreeMap::new(),
                };
                self.modal = Some(Modal::form(kind, Some(id), &values));
            }
            _ => {}
        }
    }

    fn begin_unassign(&mut self) {
        if self.kind() != EntityKind::Units {
            self.note("Only units can be removed from a chapter".to_string());
            return;
        }
        let Some(id) = self.focused_id() else {
            return;
        };
        match self.console.unassign_prompt(id) {
            Some(prompt) => self.modal = Some(Modal::confirm_unassign(id, prompt)),
            None => self.note(format!("Unit {} has no chapter", id)),
        }
    }

    fn note(&mut self, text: String) {
        self.log.push(Notice {
            level: NoticeLevel::Info,
            text,
        });
    }

    fn switch_tab(&mut self, step: usize) {
        self.tab = (self.tab + step) % EntityKind::ALL.len();
        self.sync_selection();
    }

    fn move_row(&mut self, delta: isize) {
        let len = self.console.view(self.kind()).records().len();
        if len == 0 {
            return;
        }
        let row = self.row().saturating_add_signed(delta).min(len - 1);
        self.rows[self.tab] = row;
        self.sync_selection();
    }

    fn move_col(&mut self, delta: isize) {
        let len = self.kind().schema().columns.len();
        let col = self.col().saturating_add_signed(delta).min(len.saturating_sub(1));
        self.cols[self.tab] = col;
    }

    fn sync_selection(&mut self) {
        let len = self.console.view(self.kind()).records().len();
        if self.rows[self.tab] >= len {
            self.rows[self.tab] = len.saturating_sub(1);
        }
        match self.focused_id() {
            Some(id) => {
                self.console.select(self.kind(), id);
            }
            None => self.console.clear_selection(),
        }
    }

    fn begin_edit(&mut self) {
        self.sync_selection();
        let Some(cell) = self.focused_cell() else {
            return;
        };
        match self.console.session(&cell).map(|s| s.state()) {
            Some(EditState::Editing) => {
                self.console.refocus_edit(&cell);
                self.editing = Some(cell);
            }
            Some(_) => {}
            None => {
                if self.console.open_edit(cell) {
                    self.editing = Some(cell);
                }
            }
        }
    }

    /// Focus leaves the cell; the session commits after its grace delay.
    fn blur(&mut self, cell: CellRef) {
        self.console.blur_edit(&cell, Instant::now());
        self.editing = None;
    }

    fn handle_edit_key(&mut self, cell: CellRef, key: KeyEvent) {
        let choices = matches!(
            self.console.session(&cell).map(|s| s.input()),
            Some(EditInput::Choices { .. })
        );
        match key.code {
            KeyCode::Enter => {
                self.editing = None;
                self.console.submit_edit(&cell);
            }
            KeyCode::Esc => {
                self.editing = None;
                self.console.cancel_edit(&cell);
            }
            KeyCode::Up if choices => {
                if let Some(s) = self.console.session_mut(&cell) {
                    s.select_prev();
                }
            }
            KeyCode::Down if choices => {
                if let Some(s) = self.console.session_mut(&cell) {
                    s.select_next();
                }
            }
            KeyCode::Up | KeyCode::Down | KeyCode::Left | KeyCode::Right | KeyCode::Tab => {
                self.blur(cell);
                match key.code {
                    KeyCode::Up => self.move_row(-1),
                    KeyCode::Down => self.move_row(1),
                    KeyCode::Left => self.move_col(-1),
                    KeyCode::Right => self.move_col(1),
                    _ => self.switch_tab(1),
                }
            }
            KeyCode::Backspace => {
                if let Some(s) = self.console.session_mut(&cell) {
                    s.backspace();
                }
            }
            KeyCode::Char(c) => {
                if let Some(s) = self.console.session_mut(&cell) {
                    s.type_char(c);
                }
            }
            _ => {}
        }
        if self.console.session(&cell).is_none() {
            self.editing = None;
        }
    }

    fn handle_delete_key(&mut self, key: KeyEvent) {
        let stage = self.console.delete_plan().map(|p| p.stage());
        match key.code {
            KeyCode::Esc | KeyCode::Char('n') => self.console.cancel_delete(),
            KeyCode::Enter | KeyCode::Char('y') => {
                if matches!(stage, Some(CascadeStage::Plain | CascadeStage::Decide)) {
                    self.console.confirm_delete();
                }
            }
            KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
                let idx = c as usize - '1' as usize;
                self.console.toggle_cascade(idx);
            }
            _ => {}
        }
    }

    fn handle_modal_key(&mut self, key: KeyEvent) {
        let Some(mut modal) = self.modal.take() else {
            return;
        };
        let keep = modal::handle_key(self, &mut modal, key);
        if keep {
            self.modal = Some(modal);
        }
    }
}
