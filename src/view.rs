//! Replicated view: the local, paginated projection of one server collection.
//!
//! A view never talks to the network itself. The console asks it for a [`LoadTicket`], runs
//! the fetch, and hands the result back through [`ReplicatedView::finish_load`], which is the
//! only place the page is replaced.

use std::collections::BTreeMap;

use serde_json::Value;
use time::OffsetDateTime;

use crate::error::ConsoleResult;
use crate::model::{EntityKind, Page, PageQuery, Record, RecordId, SortDescriptor, SortDirection};
use crate::schema::EntitySchema;

mod sort;
pub use self::sort::{SortValue, compare, sort_records};

pub const MAX_PAGE_SIZE: usize = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    Loading,
    Ready,
    /// Last load failed; the previously ready rows are still shown.
    Error,
}

/// A load the view has issued and is waiting on.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadTicket {
    pub kind: EntityKind,
    pub generation: u64,
    pub query: PageQuery,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load was issued after this one; the result was dropped.
    Stale,
    /// The collection shrank below the current index; the index was clamped and the caller
    /// should load again.
    Reissue,
    Failed(String),
}

#[derive(Debug)]
enum Parked {
    Unchanged,
    Fresh(Record),
    Gone,
}

#[derive(Debug)]
struct Hold {
    sessions: usize,
    parked: Parked,
}

#[derive(Debug)]
pub struct ReplicatedView {
    schema: &'static EntitySchema,
    state: ViewState,
    records: Vec<Record>,
    index: usize,
    size: usize,
    total_pages: usize,
    sort: Option<SortDescriptor>,
    filter: Option<String>,
    issued: u64,
    last_error: Option<String>,
    loaded_at: Option<OffsetDateTime>,
    /// Query of the page currently shown.
    shown: Option<PageQuery>,
    held: BTreeMap<RecordId, Hold>,
    evicted: Vec<RecordId>,
}

impl ReplicatedView {
    pub fn new(schema: &'static EntitySchema, size: usize) -> Self {
        Self {
            schema,
            state: ViewState::Idle,
            records: Vec::new(),
            index: 0,
            size: size.clamp(1, MAX_PAGE_SIZE),
            total_pages: 0,
            sort: None,
            filter: None,
            issued: 0,
            last_error: None,
            loaded_at: None,
            shown: None,
            held: BTreeMap::new(),
            evicted: Vec::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.schema.kind
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn sort(&self) -> Option<&SortDescriptor> {
        self.sort.as_ref()
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn loaded_at(&self) -> Option<OffsetDateTime> {
        self.loaded_at
    }

    pub fn row(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id() == Some(id))
    }

    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id() == Some(id))
    }

    pub fn cell_text(&self, row: usize, field: &str) -> String {
        self.records
            .get(row)
            .map(|r| self.schema.cell_text(r, field))
            .unwrap_or_default()
    }

    /// Moves to Loading and returns the query to run.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.issued += 1;
        self.state = ViewState::Loading;
        LoadTicket {
            kind: self.schema.kind,
            generation: self.issued,
            query: self.query(),
        }
    }

    fn query(&self) -> PageQuery {
        PageQuery {
            index: self.index,
            size: self.size,
            sort: self.sort.clone(),
            filter: self.filter.clone(),
        }
    }

    pub fn finish_load(&mut self, generation: u64, result: ConsoleResult<Page>) -> LoadOutcome {
        if generation < self.issued {
            tracing::debug!(
                kind = %self.schema.kind,
                generation,
                latest = self.issued,
                "discarding stale load"
            );
            return LoadOutcome::Stale;
        }

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                let msg = format!("Failed to load {}: {}", self.schema.title, err);
                self.state = ViewState::Error;
                self.last_error = Some(msg.clone());
                return LoadOutcome::Failed(msg);
            }
        };

        if self.index > 0 && self.index >= page.total_pages {
            self.total_pages = page.total_pages;
            self.index = page.total_pages.saturating_sub(1);
            return LoadOutcome::Reissue;
        }

        let mut records = page.records;
        records.truncate(self.size);
        for record in &mut records {
            self.schema.normalize(record);
        }
        if let Some(sort) = &self.sort {
            if let Some(key) = self.schema.column(&sort.field).and_then(|c| c.client_key) {
                sort_records(&mut records, key, sort.direction);
            }
        }
        let query = self.query();
        let same_page = self.shown.as_ref() == Some(&query);
        self.merge_held(&mut records, same_page);

        self.records = records;
        self.shown = Some(query);
        self.total_pages = page.total_pages;
        self.state = ViewState::Ready;
        self.last_error = None;
        self.loaded_at = Some(OffsetDateTime::now_utc());
        LoadOutcome::Applied
    }

    /// Keeps the local copy of every held row; the fresh copy waits in the hold.
    ///
    /// A held row the fresh page no longer contains stays only on a reload of the same page
    /// with room left. Otherwise it is evicted and its sessions have to be closed by the owner.
    fn merge_held(&mut self, fresh: &mut Vec<Record>, same_page: bool) {
        let mut evicted = Vec::new();
        for local in &self.records {
            let Some(id) = local.id() else {
                continue;
            };
            let Some(hold) = self.held.get_mut(&id) else {
                continue;
            };
            let has_room = fresh.len() < self.size;
            match fresh.iter_mut().find(|r| r.id() == Some(id)) {
                Some(slot) => {
                    let incoming = std::mem::replace(slot, local.clone());
                    hold.parked = Parked::Fresh(incoming);
                }
                None if same_page && has_room => {
                    fresh.push(local.clone());
                    hold.parked = Parked::Gone;
                }
                None => evicted.push(id),
            }
        }
        for id in evicted {
            tracing::debug!(kind = %self.schema.kind, %id, "held row left the page");
            self.held.remove(&id);
            self.evicted.push(id);
        }
    }

    /// Held rows dropped by the last loads; their edit sessions are stale.
    pub fn take_evicted(&mut self) -> Vec<RecordId> {
        std::mem::take(&mut self.evicted)
    }

    /// Returns false when the field is not sortable for this kind.
    pub fn sort_toggle(&mut self, field: &str) -> bool {
        if !self.schema.is_sortable(field) {
            return false;
        }
        self.sort = match self.sort.take() {
            Some(s) if s.field == field => match s.direction {
                SortDirection::Ascending => Some(SortDescriptor::descending(field)),
                SortDirection::Descending => None,
            },
            _ => Some(SortDescriptor::ascending(field)),
        };
        self.index = 0;
        true
    }

    pub fn go_to_page(&mut self, n: i64) -> bool {
        if n < 0 || n as u64 >= self.total_pages as u64 {
            return false;
        }
        self.index = n as usize;
        true
    }

    pub fn set_page_size(&mut self, size: usize) -> bool {
        let size = size.clamp(1, MAX_PAGE_SIZE);
        if size == self.size {
            return false;
        }
        self.size = size;
        self.index = 0;
        true
    }

    /// Kinds without a filter parameter ignore filters.
    pub fn set_filter(&mut self, filter: Option<String>) -> bool {
        if self.schema.filter_param.is_none() {
            return false;
        }
        let filter = filter
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        if filter == self.filter {
            return false;
        }
        self.filter = filter;
        self.index = 0;
        true
    }

    /// An edit session opened on this row; loads will not overwrite it until released.
    pub fn hold(&mut self, id: RecordId) {
        self.held
            .entry(id)
            .and_modify(|h| h.sessions += 1)
            .or_insert(Hold {
                sessions: 1,
                parked: Parked::Unchanged,
            });
    }

    pub fn is_held(&self, id: RecordId) -> bool {
        self.held.contains_key(&id)
    }

    /// Last session on the row closed: apply whatever load arrived meanwhile.
    pub fn release(&mut self, id: RecordId) {
        let Some(hold) = self.held.get_mut(&id) else {
            return;
        };
        hold.sessions = hold.sessions.saturating_sub(1);
        if hold.sessions > 0 {
            return;
        }
        let Some(hold) = self.held.remove(&id) else {
            return;
        };
        match hold.parked {
            Parked::Unchanged => {}
            Parked::Fresh(record) => {
                if let Some(slot) = self.records.iter_mut().find(|r| r.id() == Some(id)) {
                    *slot = record;
                }
            }
            Parked::Gone => self.records.retain(|r| r.id() != Some(id)),
        }
    }

    /// Patches a confirmed edit into the row, and into a parked fresh copy if one is waiting.
    pub fn apply_commit(
        &mut self,
        id: RecordId,
        field: &str,
        value: &Value,
        embedded: Option<(&str, &Value)>,
    ) -> bool {
        let patch = |record: &mut Record| {
            record.set(field, value.clone());
            if let Some((name, body)) = embedded {
                record.set(name, body.clone());
            }
        };
        if let Some(Hold {
            parked: Parked::Fresh(record),
            ..
        }) = self.held.get_mut(&id)
        {
            patch(record);
        }
        match self.records.iter_mut().find(|r| r.id() == Some(id)) {
            Some(record) => {
                patch(record);
                true
            }
            None => false,
        }
    }

    pub fn remove_row(&mut self, id: RecordId) -> bool {
        self.held.remove(&id);
        let before = self.records.len();
        self.records.retain(|r| r.id() != Some(id));
        self.records.len() != before
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
