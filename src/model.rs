use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-assigned record id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl RecordId {
    /// Accepts JSON numbers and numeric strings (form inputs arrive as text).
    pub fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(RecordId),
            Value::String(s) => s.trim().parse::<i64>().ok().map(RecordId),
            _ => None,
        }
    }

    pub fn to_value(self) -> Value {
        Value::from(self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Units,
    Chapters,
    Coordinates,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [
        EntityKind::Units,
        EntityKind::Chapters,
        EntityKind::Coordinates,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Units => "units",
            EntityKind::Chapters => "chapters",
            EntityKind::Coordinates => "coordinates",
        }
    }

    pub fn schema(self) -> &'static crate::schema::EntitySchema {
        crate::schema::schema_for(self)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "units" | "unit" | "marines" | "spacemarines" => Ok(EntityKind::Units),
            "chapters" | "chapter" => Ok(EntityKind::Chapters),
            "coordinates" | "coords" => Ok(EntityKind::Coordinates),
            other => anyhow::bail!(
                "unknown collection `{}` (expected units, chapters, or coordinates)",
                other
            ),
        }
    }
}

/// One entity instance as held locally: a JSON object keyed by field name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// `None` means the record is pending creation.
    pub fn id(&self) -> Option<RecordId> {
        self.0.get("id").and_then(RecordId::from_value)
    }

    pub fn is_pending(&self) -> bool {
        self.id().is_none()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Present and not JSON `null`.
    pub fn has(&self, field: &str) -> bool {
        !matches!(self.0.get(field), None | Some(Value::Null))
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.0.insert(field.into(), value);
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// A nested object such as the embedded `chapter` of a unit.
    pub fn embedded(&self, field: &str) -> Option<Record> {
        match self.0.get(field) {
            Some(Value::Object(m)) => Some(Record(m.clone())),
            _ => None,
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_param(self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "▲",
            SortDirection::Descending => "▼",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortDescriptor {
    pub field: String,
    pub direction: SortDirection,
}

impl SortDescriptor {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// What a view asks its store for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageQuery {
    pub index: usize,
    pub size: usize,
    pub sort: Option<SortDescriptor>,
    pub filter: Option<String>,
}

impl PageQuery {
    pub fn first(size: usize) -> Self {
        Self {
            index: 0,
            size,
            sort: None,
            filter: None,
        }
    }
}

/// One page of a collection.
///
/// `index < total_pages` once `total_pages > 0`, and `records.len() <= size`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    pub index: usize,
    pub size: usize,
    pub total_pages: usize,
}

/// A decoded push-channel message identifying what changed server-side.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Notification {
    pub kind: String,
    pub subject_id: Option<String>,
}

impl Notification {
    pub fn new(kind: impl Into<String>, subject_id: Option<&str>) -> Self {
        Self {
            kind: kind.into(),
            subject_id: subject_id.map(str::to_string),
        }
    }
}

/// Operator-chosen selection; edits commit through it when they alias the same record.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub kind: EntityKind,
    pub record: Record,
}
