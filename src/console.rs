//! The console context: views, stores, open edits, the pending delete, and the one event
//! queue everything funnels through.
//!
//! Network calls run as jobs. With [`Dispatch::Background`] each job runs on its own thread and
//! posts its [`Completion`] back to the queue, which the event loop drains with
//! [`Console::pump`]. With [`Dispatch::Inline`] a job runs inside the call that issued it, so
//! scenarios can be driven step by step.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::cascade::{CascadePlan, CascadeStage};
use crate::channel::{PushChannel, Subscription};
use crate::config::ConsoleConfig;
use crate::edit::{CellRef, EditSession, PendingChange, SubmitOutcome};
use crate::error::{ConsoleError, ConsoleResult};
use crate::model::{EntityKind, Notification, Page, PageQuery, Record, RecordId, Selection};
use crate::remote::{DeleteOutcome, RelatedSummary, Report, ReportAnswer, StoreSet};
use crate::router;
use crate::view::{LoadOutcome, MAX_PAGE_SIZE, ReplicatedView};

mod completion;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    Inline,
    Background,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

/// Result of one network job.
#[derive(Debug)]
pub enum Completion {
    Loaded {
        kind: EntityKind,
        generation: u64,
        result: ConsoleResult<Page>,
    },
    Options {
        cell: CellRef,
        result: ConsoleResult<Page>,
    },
    Committed {
        cell: CellRef,
        change: PendingChange,
        result: ConsoleResult<Record>,
    },
    Related {
        kind: EntityKind,
        id: RecordId,
        result: ConsoleResult<RelatedSummary>,
    },
    Removed {
        kind: EntityKind,
        id: RecordId,
        result: ConsoleResult<DeleteOutcome>,
    },
    Saved {
        kind: EntityKind,
        created: bool,
        result: ConsoleResult<Record>,
    },
    Reported {
        report: Report,
        result: ConsoleResult<ReportAnswer>,
    },
    Unassigned {
        id: RecordId,
        result: ConsoleResult<()>,
    },
}

#[derive(Debug)]
pub enum ConsoleEvent {
    Completed(Completion),
    Pushed(Notification),
}

type Job = Box<dyn FnOnce() -> Completion + Send>;

pub struct Console {
    stores: StoreSet,
    units: ReplicatedView,
    chapters: ReplicatedView,
    coordinates: ReplicatedView,
    sessions: HashMap<CellRef, EditSession>,
    selection: Option<Selection>,
    delete: Option<CascadePlan>,
    saving: bool,
    answer: Option<(Report, ReportAnswer)>,
    notices: VecDeque<Notice>,
    dispatch: Dispatch,
    grace: Duration,
    tx: Sender<ConsoleEvent>,
    rx: Receiver<ConsoleEvent>,
    in_flight: usize,
}

/// Rows fetched to populate a reference field's option list.
const OPTION_LIMIT: usize = MAX_PAGE_SIZE;

impl Console {
    pub fn new(stores: StoreSet, cfg: &ConsoleConfig, dispatch: Dispatch) -> Self {
        let (tx, rx) = mpsc::channel();
        let view = |kind: EntityKind| ReplicatedView::new(kind.schema(), cfg.page_size);
        Self {
            stores,
            units: view(EntityKind::Units),
            chapters: view(EntityKind::Chapters),
            coordinates: view(EntityKind::Coordinates),
            sessions: HashMap::new(),
            selection: None,
            delete: None,
            saving: false,
            answer: None,
            notices: VecDeque::new(),
            dispatch,
            grace: cfg.commit_grace(),
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn view(&self, kind: EntityKind) -> &ReplicatedView {
        match kind {
            EntityKind::Units => &self.units,
            EntityKind::Chapters => &self.chapters,
            EntityKind::Coordinates => &self.coordinates,
        }
    }

    fn view_mut(&mut self, kind: EntityKind) -> &mut ReplicatedView {
        match kind {
            EntityKind::Units => &mut self.units,
            EntityKind::Chapters => &mut self.chapters,
            EntityKind::Coordinates => &mut self.coordinates,
        }
    }

    pub fn sender(&self) -> Sender<ConsoleEvent> {
        self.tx.clone()
    }

    /// Feeds push notifications into the event queue. Dispose the subscription to detach.
    pub fn attach(&self, channel: &PushChannel) -> Subscription {
        let tx = self.tx.clone();
        channel.subscribe(Arc::new(move |n: &Notification| {
            tx.send(ConsoleEvent::Pushed(n.clone()))
                .map_err(|_| anyhow::anyhow!("console event queue closed"))
        }))
    }

    fn spawn(&mut self, job: Job) {
        match self.dispatch {
            Dispatch::Inline => {
                let completion = job();
                self.handle_completion(completion);
            }
            Dispatch::Background => {
                self.in_flight += 1;
                let tx = self.tx.clone();
                std::thread::spawn(move || {
                    let _ = tx.send(ConsoleEvent::Completed(job()));
                });
            }
        }
    }

    pub fn load(&mut self, kind: EntityKind) {
        let ticket = self.view_mut(kind).begin_load();
        tracing::debug!(%kind, generation = ticket.generation, query = ?ticket.query, "load");
        let store = self.stores.get(kind);
        self.spawn(Box::new(move || Completion::Loaded {
            kind,
            generation: ticket.generation,
            result: store.fetch_page(&ticket.query),
        }));
    }

    pub fn load_all(&mut self) {
        for kind in EntityKind::ALL {
            self.load(kind);
        }
    }

    pub fn sort_toggle(&mut self, kind: EntityKind, field: &str) -> bool {
        let changed = self.view_mut(kind).sort_toggle(field);
        if changed {
            self.load(kind);
        }
        changed
    }

    pub fn go_to_page(&mut self, kind: EntityKind, n: i64) -> bool {
        let moved = self.view_mut(kind).go_to_page(n);
        if moved {
            self.load(kind);
        }
        moved
    }

    pub fn next_page(&mut self, kind: EntityKind) -> bool {
        let n = self.view(kind).index() as i64 + 1;
        self.go_to_page(kind, n)
    }

    pub fn prev_page(&mut self, kind: EntityKind) -> bool {
        let n = self.view(kind).index() as i64 - 1;
        self.go_to_page(kind, n)
    }

    pub fn set_page_size(&mut self, kind: EntityKind, size: usize) -> bool {
        let changed = self.view_mut(kind).set_page_size(size);
        if changed {
            self.load(kind);
        }
        changed
    }

    pub fn set_filter(&mut self, kind: EntityKind, filter: Option<String>) -> bool {
        let changed = self.view_mut(kind).set_filter(filter);
        if changed {
            self.load(kind);
        }
        changed
    }

    pub fn select(&mut self, kind: EntityKind, id: RecordId) -> bool {
        match self.view(kind).row(id).cloned() {
            Some(record) => {
                self.selection = Some(Selection { kind, record });
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Opening a cell that already has a session (including one that is committing) is a
    /// no-op and returns false.
    pub fn open_edit(&mut self, cell: CellRef) -> bool {
        if self.sessions.contains_key(&cell) {
            return false;
        }
        let view = self.view(cell.kind);
        let Some(record) = view.row(cell.id) else {
            return false;
        };
        let Some(session) = EditSession::open(view.schema(), cell, record, self.grace) else {
            return false;
        };
        let target = session.options_needed();
        self.view_mut(cell.kind).hold(cell.id);
        self.sessions.insert(cell, session);

        if let Some(target) = target {
            let store = self.stores.get(target);
            self.spawn(Box::new(move || Completion::Options {
                cell,
                result: store.fetch_page(&PageQuery::first(OPTION_LIMIT)),
            }));
        }
        true
    }

    pub fn session(&self, cell: &CellRef) -> Option<&EditSession> {
        self.sessions.get(cell)
    }

    /// For feeding keystrokes and selection changes to an open session.
    pub fn session_mut(&mut self, cell: &CellRef) -> Option<&mut EditSession> {
        self.sessions.get_mut(cell)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &EditSession> {
        self.sessions.values()
    }

    /// The affirmative key.
    pub fn submit_edit(&mut self, cell: &CellRef) -> SubmitOutcome {
        let outcome = match self.sessions.get_mut(cell) {
            Some(session) => session.submit(),
            None => return SubmitOutcome::Ignored,
        };
        self.after_submit(*cell, &outcome);
        outcome
    }

    fn after_submit(&mut self, cell: CellRef, outcome: &SubmitOutcome) {
        match outcome {
            SubmitOutcome::Ignored | SubmitOutcome::Confirm(_) => {}
            SubmitOutcome::Unchanged => self.close_session(cell),
            SubmitOutcome::Invalid(err) => {
                self.error(ConsoleError::Validation(err.clone()).to_string());
                self.close_session(cell);
            }
        }
    }

    pub fn blur_edit(&mut self, cell: &CellRef, now: Instant) {
        if let Some(session) = self.sessions.get_mut(cell) {
            session.focus_lost(now);
        }
    }

    pub fn refocus_edit(&mut self, cell: &CellRef) {
        if let Some(session) = self.sessions.get_mut(cell) {
            session.focus_regained();
        }
    }

    pub fn cancel_edit(&mut self, cell: &CellRef) -> bool {
        let cancelled = self
            .sessions
            .get_mut(cell)
            .is_some_and(|session| session.cancel());
        if cancelled {
            self.close_session(*cell);
        }
        cancelled
    }

    /// Answer to the confirmation prompt. Accepting sends the update.
    pub fn confirm_edit(&mut self, cell: &CellRef, accept: bool) -> bool {
        let Some(session) = self.sessions.get_mut(cell) else {
            return false;
        };
        if session.state() != crate::edit::EditState::Confirming {
            return false;
        }
        let Some(change) = session.decide(accept) else {
            self.close_session(*cell);
            return false;
        };

        let cell = *cell;
        let store = self.stores.get(cell.kind);
        let schema = cell.kind.schema();
        self.spawn(Box::new(move || {
            let result = (|| {
                let mut current = store.fetch_one(cell.id)?;
                schema.normalize(&mut current);
                current.set(cell.field, change.value.clone());
                store.update(cell.id, &schema.payload(&current))
            })();
            Completion::Committed {
                cell,
                change,
                result,
            }
        }));
        true
    }

    /// Fires blur commits whose grace delay has passed.
    pub fn tick(&mut self, now: Instant) {
        let due: Vec<(CellRef, SubmitOutcome)> = self
            .sessions
            .iter_mut()
            .filter_map(|(cell, session)| session.poll(now).map(|o| (*cell, o)))
            .collect();
        for (cell, outcome) in due {
            self.after_submit(cell, &outcome);
        }
    }

    /// What a cell shows: the open session's text, else the row's value.
    pub fn cell_text(&self, kind: EntityKind, row: usize, field: &str) -> String {
        let view = self.view(kind);
        let session = view
            .records()
            .get(row)
            .and_then(Record::id)
            .and_then(|id| CellRef::new(kind, id, field))
            .and_then(|cell| self.sessions.get(&cell));
        match session {
            Some(session) => session.cell_text(),
            None => view.cell_text(row, field),
        }
    }

    fn close_session(&mut self, cell: CellRef) {
        if self.sessions.remove(&cell).is_some() {
            self.view_mut(cell.kind).release(cell.id);
        }
    }

    /// Starts the delete flow: fetch dependents, then confirm or decide.
    pub fn begin_delete(&mut self, kind: EntityKind, id: RecordId) -> bool {
        if self.delete.is_some() {
            return false;
        }
        let view = self.view(kind);
        let Some(record) = view.row(id) else {
            return false;
        };
        let label = view.schema().label_of(record);
        self.delete = Some(CascadePlan::new(kind, id, label));

        let store = self.stores.get(kind);
        self.spawn(Box::new(move || Completion::Related {
            kind,
            id,
            result: store.fetch_related(id),
        }));
        true
    }

    pub fn delete_plan(&self) -> Option<&CascadePlan> {
        self.delete.as_ref()
    }

    pub fn toggle_cascade(&mut self, choice: usize) -> bool {
        self.delete.as_mut().is_some_and(|plan| plan.toggle(choice))
    }

    /// Sends the DELETE once the decision is complete.
    pub fn confirm_delete(&mut self) -> bool {
        let Some(plan) = self.delete.as_mut() else {
            return false;
        };
        let Some(flags) = plan.confirm() else {
            if plan.stage() == CascadeStage::Decide {
                let msg = "Accept deleting the listed records first, or cancel.".to_string();
                self.info(msg);
            }
            return false;
        };
        let (kind, id) = (plan.kind(), plan.id());
        let store = self.stores.get(kind);
        self.spawn(Box::new(move || Completion::Removed {
            kind,
            id,
            result: store.remove(id, &flags),
        }));
        true
    }

    pub fn cancel_delete(&mut self) {
        if let Some(plan) = self.delete.as_ref() {
            if plan.stage() == CascadeStage::Deleting {
                return;
            }
        }
        self.delete = None;
    }

    /// Create (`target == None`) or update from a full form. Rejected while a save is pending.
    pub fn save_form(
        &mut self,
        kind: EntityKind,
        target: Option<RecordId>,
        draft: &BTreeMap<String, String>,
    ) -> bool {
        if self.saving {
            tracing::warn!(%kind, "save already in progress");
            return false;
        }
        let payload = match kind.schema().form_payload(draft) {
            Ok(payload) => payload,
            Err(err) => {
                self.error(err.to_string());
                return false;
            }
        };
        self.saving = true;
        let store = self.stores.get(kind);
        self.spawn(Box::new(move || {
            let result = match target {
                Some(id) => store.update(id, &payload),
                None => store.create(&payload),
            };
            Completion::Saved {
                kind,
                created: target.is_none(),
                result,
            }
        }));
        true
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Asks the server for a report; the answer lands in a notice and in [`Console::take_answer`].
    pub fn run_report(&mut self, report: Report) {
        let ops = self.stores.special();
        self.spawn(Box::new(move || {
            let result = report.run(ops.as_ref());
            Completion::Reported { report, result }
        }));
    }

    /// The last report answer, once.
    pub fn take_answer(&mut self) -> Option<(Report, ReportAnswer)> {
        self.answer.take()
    }

    /// Confirmation text for taking a unit out of its chapter; `None` when the row is not
    /// shown or has no chapter.
    pub fn unassign_prompt(&self, id: RecordId) -> Option<String> {
        let schema = EntityKind::Units.schema();
        let mut record = self.units.row(id)?.clone();
        schema.normalize(&mut record);
        let assigned = record
            .get("chapterId")
            .and_then(RecordId::from_value)
            .is_some();
        assigned.then(|| {
            format!(
                "Remove unit \"{}\" from chapter \"{}\"?",
                schema.label_of(&record),
                schema.cell_text(&record, "chapterId")
            )
        })
    }

    pub fn remove_from_chapter(&mut self, id: RecordId) -> bool {
        if self.unassign_prompt(id).is_none() {
            self.error(format!("Unit {} has no chapter", id));
            return false;
        }
        let ops = self.stores.special();
        self.spawn(Box::new(move || Completion::Unassigned {
            id,
            result: ops.remove_from_chapter(id),
        }));
        true
    }

    /// Routes a push notification to the views it invalidates.
    pub fn notify(&mut self, notification: &Notification) {
        for kind in router::route(notification) {
            self.load(*kind);
        }
    }

    pub fn handle_event(&mut self, event: ConsoleEvent) {
        match event {
            ConsoleEvent::Completed(completion) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.handle_completion(completion);
            }
            ConsoleEvent::Pushed(notification) => self.notify(&notification),
        }
    }

    /// Handles every queued event without blocking.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Blocks until no background job is outstanding or the timeout passes.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(left) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return false;
                }
            }
        }
        self.pump();
        true
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    fn info(&mut self, text: String) {
        tracing::info!("{}", text);
        self.notices.push_back(Notice {
            level: NoticeLevel::Info,
            text,
        });
    }

    fn error(&mut self, text: String) {
        tracing::warn!("{}", text);
        self.notices.push_back(Notice {
            level: NoticeLevel::Error,
            text,
        });
    }
}

#[cfg(test)]
#[path = "tests/console/console_tests.rs"]
mod tests;
