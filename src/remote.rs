//! Remote collection stores: one per entity kind, over the REST API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::{Map, Value};

use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, ConsoleResult};
use crate::model::{EntityKind, Page, PageQuery, Record, RecordId};
use crate::schema::EntitySchema;

mod http_client;
pub use self::http_client::{parse_page, rejection_message};

mod types;
pub use self::types::*;
mod operations;
mod special;
pub use self::special::{
    HttpSpecialOperations, NameMatch, Report, ReportAnswer, SpecialOperations,
    check_health_bound, check_name_fragment, parse_average, parse_count, parse_matches,
};

/// Uniform access to one server-owned collection.
///
/// Implementations never touch caller-owned state; every effect is the network call.
pub trait CollectionStore: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn fetch_page(&self, query: &PageQuery) -> ConsoleResult<Page>;

    fn fetch_one(&self, id: RecordId) -> ConsoleResult<Record>;

    fn create(&self, payload: &Map<String, Value>) -> ConsoleResult<Record>;

    fn update(&self, id: RecordId, payload: &Map<String, Value>) -> ConsoleResult<Record>;

    fn remove(&self, id: RecordId, flags: &CascadeFlags) -> ConsoleResult<DeleteOutcome>;

    fn fetch_related(&self, id: RecordId) -> ConsoleResult<RelatedSummary>;
}

pub struct HttpCollectionStore {
    schema: &'static EntitySchema,
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpCollectionStore {
    pub fn new(kind: EntityKind, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = http_client::build_client(timeout)?;
        Ok(Self {
            schema: kind.schema(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }
}

/// The three stores a console works against, plus the special operations.
#[derive(Clone)]
pub struct StoreSet {
    units: Arc<dyn CollectionStore>,
    chapters: Arc<dyn CollectionStore>,
    coordinates: Arc<dyn CollectionStore>,
    special: Arc<dyn SpecialOperations>,
}

impl StoreSet {
    pub fn from_fn(
        special: Arc<dyn SpecialOperations>,
        mut make: impl FnMut(EntityKind) -> Arc<dyn CollectionStore>,
    ) -> Self {
        Self {
            units: make(EntityKind::Units),
            chapters: make(EntityKind::Chapters),
            coordinates: make(EntityKind::Coordinates),
            special,
        }
    }

    pub fn http(cfg: &ConsoleConfig) -> anyhow::Result<Self> {
        let timeout = cfg.request_timeout();
        let units = HttpCollectionStore::new(EntityKind::Units, &cfg.base_url, timeout)?;
        let chapters = HttpCollectionStore::new(EntityKind::Chapters, &cfg.base_url, timeout)?;
        let coordinates =
            HttpCollectionStore::new(EntityKind::Coordinates, &cfg.base_url, timeout)?;
        let special = HttpSpecialOperations::new(&cfg.base_url, timeout)?;
        Ok(Self {
            units: Arc::new(units),
            chapters: Arc::new(chapters),
            coordinates: Arc::new(coordinates),
            special: Arc::new(special),
        })
    }

    pub fn get(&self, kind: EntityKind) -> Arc<dyn CollectionStore> {
        match kind {
            EntityKind::Units => Arc::clone(&self.units),
            EntityKind::Chapters => Arc::clone(&self.chapters),
            EntityKind::Coordinates => Arc::clone(&self.coordinates),
        }
    }

    pub fn special(&self) -> Arc<dyn SpecialOperations> {
        Arc::clone(&self.special)
    }
}

#[cfg(test)]
#[path = "tests/remote/remote_tests.rs"]
mod tests;
