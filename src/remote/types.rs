//! Response DTOs and the values stores hand back to the console.

use std::collections::BTreeSet;

use super::*;
use crate::schema::CascadeShape;

/// Cascade flags forwarded on DELETE; only set flags go on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CascadeFlags {
    set: BTreeSet<&'static str>,
}

impl CascadeFlags {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, flag: &'static str) -> Self {
        self.set.insert(flag);
        self
    }

    pub fn insert(&mut self, flag: &'static str) {
        self.set.insert(flag);
    }

    pub fn is_set(&self, flag: &str) -> bool {
        self.set.contains(flag)
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub(super) fn query_pairs(&self) -> Vec<(&'static str, &'static str)> {
        self.set.iter().map(|f| (*f, "true")).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteOutcome {
    pub message: Option<String>,
    pub coordinates_deleted: bool,
    pub chapter_deleted: bool,
}

/// A record that a delete would orphan or could take along.
#[derive(Clone, Debug, PartialEq)]
pub struct Dependent {
    pub kind: EntityKind,
    pub id: Option<RecordId>,
    pub label: String,
    /// Query flag that asks the server to cascade into this dependent.
    pub flag: &'static str,
    /// The server removes it regardless; the operator may only accept or abort.
    pub required: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelatedSummary {
    pub dependents: Vec<Dependent>,
}

impl RelatedSummary {
    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}

pub const DELETE_COORDINATES: &str = "deleteCoordinates";
pub const DELETE_CHAPTER: &str = "deleteChapter";

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct RelatedResponse {
    pub(super) has_coordinates: bool,
    pub(super) coordinates: Option<Map<String, Value>>,
    pub(super) has_chapter: bool,
    pub(super) chapter: Option<Map<String, Value>>,
    pub(super) related_space_marines: Option<Vec<Map<String, Value>>>,
}

impl RelatedResponse {
    pub(super) fn into_summary(self, schema: &EntitySchema) -> RelatedSummary {
        let mut dependents = Vec::new();
        match schema.cascade {
            CascadeShape::References => {
                let referenced = [
                    (
                        self.has_coordinates,
                        self.coordinates,
                        EntityKind::Coordinates,
                        DELETE_COORDINATES,
                    ),
                    (
                        self.has_chapter,
                        self.chapter,
                        EntityKind::Chapters,
                        DELETE_CHAPTER,
                    ),
                ];
                for (present, body, kind, flag) in referenced {
                    let Some(body) = body.filter(|_| present) else {
                        continue;
                    };
                    let record = Record::from_map(body);
                    dependents.push(Dependent {
                        kind,
                        id: record.id(),
                        label: kind.schema().label_of(&record),
                        flag,
                        required: false,
                    });
                }
            }
            CascadeShape::Dependents { flag } => {
                for body in self.related_space_marines.unwrap_or_default() {
                    let record = Record::from_map(body);
                    dependents.push(Dependent {
                        kind: EntityKind::Units,
                        id: record.id(),
                        label: EntityKind::Units.schema().label_of(&record),
                        flag,
                        required: true,
                    });
                }
            }
        }
        RelatedSummary { dependents }
    }
}
