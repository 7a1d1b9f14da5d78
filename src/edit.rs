//! Optimistic in-place edit of one cell.
//!
//! The session is a pure state machine: it never calls a store. The console feeds it input,
//! focus changes, reference options, and commit results, and acts on what it returns.

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::ValidationError;
use crate::model::{EntityKind, Record, RecordId};
use crate::schema::{EntitySchema, FieldDef, FieldKind, display_value, raw_value};

pub const LOADING_TEXT: &str = "loading…";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditState {
    Editing,
    Confirming,
    Committing,
    RolledBack,
    Committed,
}

/// One editable cell: a field of one record in one collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub kind: EntityKind,
    pub id: RecordId,
    pub field: &'static str,
}

impl CellRef {
    /// `None` unless `field` is one of the kind's editable fields.
    pub fn new(kind: EntityKind, id: RecordId, field: &str) -> Option<Self> {
        let def = kind.schema().field(field)?;
        Some(Self {
            kind,
            id,
            field: def.name,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Choice {
    pub value: Value,
    pub label: String,
    /// The referenced record, so a committed reference edit can embed it.
    pub record: Option<Record>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EditInput {
    Text(String),
    Choices { options: Vec<Choice>, selected: usize },
    /// Reference options are still being fetched.
    Loading,
}

/// A validated change waiting for the operator, then for the server.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingChange {
    pub value: Value,
    pub display: String,
    pub embedded: Option<(&'static str, Value)>,
    pub prompt: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    /// Not in `Editing`; a commit trigger already fired.
    Ignored,
    /// Closed without a network call.
    Unchanged,
    Invalid(ValidationError),
    Confirm(String),
}

#[derive(Debug)]
pub struct EditSession {
    cell: CellRef,
    schema: &'static EntitySchema,
    def: &'static FieldDef,
    original: Value,
    original_display: String,
    input: EditInput,
    state: EditState,
    pending: Option<PendingChange>,
    blur_deadline: Option<Instant>,
    grace: Duration,
}

impl EditSession {
    /// `None` when the field is not editable for this kind (`id`, unknown names).
    pub fn open(
        schema: &'static EntitySchema,
        cell: CellRef,
        record: &Record,
        grace: Duration,
    ) -> Option<Self> {
        let def = schema.field(cell.field)?;
        let original = record.get(cell.field).cloned().unwrap_or(Value::Null);
        let input = match def.kind {
            FieldKind::Text | FieldKind::Integer { .. } | FieldKind::Float => {
                EditInput::Text(raw_value(Some(&original)))
            }
            FieldKind::Enumerated(values) => {
                let mut options: Vec<Choice> = Vec::new();
                if def.nullable {
                    options.push(empty_choice());
                }
                options.extend(values.iter().map(|v| Choice {
                    value: Value::String(v.to_string()),
                    label: v.to_string(),
                    record: None,
                }));
                let selected = options
                    .iter()
                    .position(|c| c.value == original)
                    .unwrap_or(0);
                EditInput::Choices { options, selected }
            }
            FieldKind::Reference { .. } => EditInput::Loading,
        };
        Some(Self {
            cell,
            schema,
            def,
            original_display: schema.cell_text(record, cell.field),
            original,
            input,
            state: EditState::Editing,
            pending: None,
            blur_deadline: None,
            grace,
        })
    }

    pub fn cell(&self) -> CellRef {
        self.cell
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn input(&self) -> &EditInput {
        &self.input
    }

    pub fn field(&self) -> &'static FieldDef {
        self.def
    }

    pub fn pending(&self) -> Option<&PendingChange> {
        self.pending.as_ref()
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            EditState::Editing | EditState::Confirming | EditState::Committing
        )
    }

    /// The referenced collection whose options this session is waiting on.
    pub fn options_needed(&self) -> Option<EntityKind> {
        match (self.def.kind, &self.input) {
            (FieldKind::Reference { target, .. }, EditInput::Loading) => Some(target),
            _ => None,
        }
    }

    pub fn supply_options(&mut self, records: Vec<Record>) {
        let FieldKind::Reference { target, .. } = self.def.kind else {
            return;
        };
        if self.state != EditState::Editing || !matches!(self.input, EditInput::Loading) {
            return;
        }
        let target_schema = target.schema();
        let mut options: Vec<Choice> = Vec::new();
        if self.def.nullable {
            options.push(empty_choice());
        }
        for record in records {
            let Some(id) = record.id() else {
                continue;
            };
            options.push(Choice {
                value: id.to_value(),
                label: target_schema.label_of(&record),
                record: Some(record),
            });
        }
        let current = RecordId::from_value(&self.original);
        let selected = options
            .iter()
            .position(|c| RecordId::from_value(&c.value) == current)
            .unwrap_or(0);
        self.input = EditInput::Choices { options, selected };
    }

    /// The option list could not be loaded; the cell goes back to its original value.
    pub fn options_failed(&mut self) {
        if self.state == EditState::Editing {
            self.state = EditState::RolledBack;
        }
    }

    pub fn type_char(&mut self, c: char) {
        if let (EditState::Editing, EditInput::Text(text)) = (self.state, &mut self.input) {
            text.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let (EditState::Editing, EditInput::Text(text)) = (self.state, &mut self.input) {
            text.pop();
        }
    }

    pub fn set_text(&mut self, value: &str) {
        if let (EditState::Editing, EditInput::Text(text)) = (self.state, &mut self.input) {
            *text = value.to_string();
        }
    }

    pub fn select_next(&mut self) {
        if let (EditState::Editing, EditInput::Choices { options, selected }) =
            (self.state, &mut self.input)
        {
            if *selected + 1 < options.len() {
                *selected += 1;
            }
        }
    }

    pub fn select_prev(&mut self) {
        if let (EditState::Editing, EditInput::Choices { selected, .. }) =
            (self.state, &mut self.input)
        {
            *selected = selected.saturating_sub(1);
        }
    }

    /// Picks the option whose value matches; ignored if there is none.
    pub fn select_value(&mut self, value: &Value) {
        if let (EditState::Editing, EditInput::Choices { options, selected }) =
            (self.state, &mut self.input)
        {
            if let Some(i) = options.iter().position(|c| same_value(&c.value, value)) {
                *selected = i;
            }
        }
    }

    /// Focus left the cell: commit once the grace delay passes unless focus comes back.
    pub fn focus_lost(&mut self, now: Instant) {
        if self.state == EditState::Editing && self.blur_deadline.is_none() {
            self.blur_deadline = Some(now + self.grace);
        }
    }

    pub fn focus_regained(&mut self) {
        self.blur_deadline = None;
    }

    pub fn blur_pending(&self) -> bool {
        self.blur_deadline.is_some()
    }

    /// Fires the deferred blur commit when its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<SubmitOutcome> {
        let deadline = self.blur_deadline?;
        if now < deadline {
            return None;
        }
        self.blur_deadline = None;
        Some(self.submit())
    }

    pub fn submit(&mut self) -> SubmitOutcome {
        if self.state != EditState::Editing {
            return SubmitOutcome::Ignored;
        }
        self.blur_deadline = None;

        let value = match &self.input {
            EditInput::Loading => {
                self.state = EditState::RolledBack;
                return SubmitOutcome::Unchanged;
            }
            EditInput::Text(text) => {
                let raw = text.trim();
                if raw == raw_value(Some(&self.original)).trim()
                    || (raw.is_empty() && !self.def.nullable)
                {
                    self.state = EditState::RolledBack;
                    return SubmitOutcome::Unchanged;
                }
                match self.schema.parse_input(self.def, raw) {
                    Ok(v) => v,
                    Err(err) => {
                        self.state = EditState::RolledBack;
                        return SubmitOutcome::Invalid(err);
                    }
                }
            }
            EditInput::Choices { options, selected } => match options.get(*selected) {
                Some(choice) => choice.value.clone(),
                None => Value::Null,
            },
        };

        if same_value(&value, &self.original) || (value.is_null() && !self.def.nullable) {
            self.state = EditState::RolledBack;
            return SubmitOutcome::Unchanged;
        }

        let (display, embedded) = match self.def.kind {
            FieldKind::Reference { embedded, .. } => {
                let choice = self.selected_choice();
                let display = choice
                    .map(|c| c.label.clone())
                    .unwrap_or_else(|| "-".to_string());
                let body = choice
                    .and_then(|c| c.record.clone())
                    .map(Record::into_value)
                    .unwrap_or(Value::Null);
                (display, Some((embedded, body)))
            }
            _ => (display_value(Some(&value)), None),
        };

        let prompt = match self.def.kind {
            FieldKind::Reference { .. } => format!("Change {} to \"{}\"?", self.def.label, display),
            _ => format!(
                "Change {} from \"{}\" to \"{}\"?",
                self.def.label, self.original_display, display
            ),
        };
        self.pending = Some(PendingChange {
            value,
            display,
            embedded,
            prompt: prompt.clone(),
        });
        self.state = EditState::Confirming;
        SubmitOutcome::Confirm(prompt)
    }

    fn selected_choice(&self) -> Option<&Choice> {
        match &self.input {
            EditInput::Choices { options, selected } => options.get(*selected),
            _ => None,
        }
    }

    /// Explicit cancel: restores the original without confirmation.
    pub fn cancel(&mut self) -> bool {
        if self.state != EditState::Editing {
            return false;
        }
        self.blur_deadline = None;
        self.state = EditState::RolledBack;
        true
    }

    /// Operator answered the confirmation prompt. Accepting hands back the change to send.
    pub fn decide(&mut self, accept: bool) -> Option<PendingChange> {
        if self.state != EditState::Confirming {
            return None;
        }
        if accept {
            self.state = EditState::Committing;
            self.pending.clone()
        } else {
            self.state = EditState::RolledBack;
            None
        }
    }

    pub fn finish(&mut self, ok: bool) {
        if self.state == EditState::Committing {
            self.state = if ok {
                EditState::Committed
            } else {
                EditState::RolledBack
            };
        }
    }

    /// What the cell shows while this session exists.
    pub fn cell_text(&self) -> String {
        match self.state {
            EditState::Editing => match &self.input {
                EditInput::Text(text) => text.clone(),
                EditInput::Choices { options, selected } => options
                    .get(*selected)
                    .map(|c| c.label.clone())
                    .unwrap_or_default(),
                EditInput::Loading => LOADING_TEXT.to_string(),
            },
            EditState::Confirming | EditState::Committing | EditState::Committed => self
                .pending
                .as_ref()
                .map(|p| p.display.clone())
                .unwrap_or_else(|| self.original_display.clone()),
            EditState::RolledBack => self.original_display.clone(),
        }
    }

    pub fn original_display(&self) -> &str {
        &self.original_display
    }
}

fn empty_choice() -> Choice {
    Choice {
        value: Value::Null,
        label: "-".to_string(),
        record: None,
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            RecordId::from_value(a).is_some() && RecordId::from_value(a) == RecordId::from_value(b)
        }
        _ => a == b,
    }
}

#[cfg(test)]
#[path = "tests/edit_tests.rs"]
mod tests;
