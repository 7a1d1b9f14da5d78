//! Per-kind capability configuration.
//!
//! A view, an edit session, and a store never special-case an entity kind; everything that
//! differs between units, chapters, and coordinates (fields, validation, payload shape, cell
//! rendering, client-side sort keys, cascade shape) is read from an [`EntitySchema`].

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::model::{EntityKind, Record, RecordId};
use crate::view::SortValue;

mod chapters;
mod coordinates;
mod units;

pub use self::chapters::CHAPTERS;
pub use self::coordinates::COORDINATES;
pub use self::units::UNITS;

pub fn schema_for(kind: EntityKind) -> &'static EntitySchema {
    match kind {
        EntityKind::Units => &UNITS,
        EntityKind::Chapters => &CHAPTERS,
        EntityKind::Coordinates => &COORDINATES,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldKind {
    Text,
    Integer { min: i64, max: i64 },
    Float,
    Enumerated(&'static [&'static str]),
    /// Id of a record in `target`; the server also embeds that record under `embedded`.
    Reference {
        target: EntityKind,
        embedded: &'static str,
    },
}

#[derive(Debug)]
pub struct FieldDef {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldDef {
    pub fn is_reference(&self) -> bool {
        matches!(self.kind, FieldKind::Reference { .. })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, FieldKind::Integer { .. } | FieldKind::Float)
    }
}

pub struct ColumnDef {
    pub title: &'static str,
    /// Flat field the cell shows and edits (`id` is read-only).
    pub field: &'static str,
    pub sort_key: Option<&'static str>,
    /// Set for columns the server cannot sort; the view sorts the fetched page with it.
    pub client_key: Option<fn(&Record) -> SortValue>,
    pub width: u16,
}

impl std::fmt::Debug for ColumnDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnDef")
            .field("title", &self.title)
            .field("field", &self.field)
            .field("sort_key", &self.sort_key)
            .field("client_sorted", &self.client_key.is_some())
            .finish()
    }
}

/// How deleting a record of this kind can orphan other records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadeShape {
    /// The record references others (a unit's coordinates and chapter); each may be deleted
    /// along with it, opt-in per referenced kind.
    References,
    /// Other records reference this one; the server removes them unconditionally, so the
    /// operator must accept `flag` before the delete is sent.
    Dependents { flag: &'static str },
}

#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub collection: &'static str,
    pub title: &'static str,
    pub singular: &'static str,
    pub fields: &'static [FieldDef],
    pub columns: &'static [ColumnDef],
    pub filter_param: Option<&'static str>,
    pub label: fn(&Record) -> String,
    pub cascade: CascadeShape,
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        let fields: &'static [FieldDef] = self.fields;
        fields.iter().find(|f| f.name == name)
    }

    pub fn column(&self, sort_key: &str) -> Option<&'static ColumnDef> {
        let columns: &'static [ColumnDef] = self.columns;
        columns.iter().find(|c| c.sort_key == Some(sort_key))
    }

    pub fn is_sortable(&self, sort_key: &str) -> bool {
        self.column(sort_key).is_some()
    }

    pub fn is_server_sortable(&self, sort_key: &str) -> bool {
        self.column(sort_key)
            .is_some_and(|c| c.client_key.is_none())
    }

    pub fn label_of(&self, record: &Record) -> String {
        (self.label)(record)
    }

    /// Copies embedded reference ids onto the flat fields the renderer and edit sessions
    /// address (`coordinates.id` -> `coordinatesId`).
    pub fn normalize(&self, record: &mut Record) {
        for def in self.fields {
            let FieldKind::Reference { embedded, .. } = def.kind else {
                continue;
            };
            if record.has(def.name) {
                continue;
            }
            if let Some(id) = record.embedded(embedded).and_then(|e| e.id()) {
                record.set(def.name, id.to_value());
            }
        }
    }

    pub fn cell_text(&self, record: &Record, field: &str) -> String {
        if field == "id" {
            return record
                .id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string());
        }
        match self.field(field).map(|d| d.kind) {
            Some(FieldKind::Reference { target, embedded }) => record
                .embedded(embedded)
                .map(|e| target.schema().label_of(&e))
                .or_else(|| {
                    record
                        .get(field)
                        .and_then(RecordId::from_value)
                        .map(|id| format!("#{}", id))
                })
                .unwrap_or_else(|| "-".to_string()),
            _ => display_value(record.get(field)),
        }
    }

    /// Strict parse of operator input for one field.
    pub fn parse_input(&self, def: &FieldDef, raw: &str) -> Result<Value, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            if def.nullable {
                return Ok(Value::Null);
            }
            return Err(ValidationError::new(
                def.name,
                format!("{} is required", def.label),
            ));
        }

        match def.kind {
            FieldKind::Text => Ok(Value::String(raw.to_string())),
            FieldKind::Integer { min, max } => {
                let n: i64 = raw.parse().map_err(|_| {
                    ValidationError::new(def.name, format!("{} must be a whole number", def.label))
                })?;
                if n < min || n > max {
                    let msg = if max == i64::MAX {
                        format!("{} must be at least {}", def.label, min)
                    } else {
                        format!("{} must be between {} and {}", def.label, min, max)
                    };
                    return Err(ValidationError::new(def.name, msg));
                }
                Ok(Value::from(n))
            }
            FieldKind::Float => {
                let n: f64 = raw.parse().map_err(|_| {
                    ValidationError::new(def.name, format!("{} must be a number", def.label))
                })?;
                if !n.is_finite() {
                    return Err(ValidationError::new(
                        def.name,
                        format!("{} must be a finite number", def.label),
                    ));
                }
                Ok(Value::from(n))
            }
            FieldKind::Enumerated(options) => {
                if options.contains(&raw) {
                    Ok(Value::String(raw.to_string()))
                } else {
                    Err(ValidationError::new(
                        def.name,
                        format!("{} must be one of {}", def.label, options.join(", ")),
                    ))
                }
            }
            FieldKind::Reference { target, .. } => RecordId::from_value(&Value::String(
                raw.to_string(),
            ))
            .map(RecordId::to_value)
            .ok_or_else(|| {
                ValidationError::new(
                    def.name,
                    format!("{} must be a {} id", def.label, target.schema().singular),
                )
            }),
        }
    }

    /// Request body for create/update: only this kind's fields, numbers coerced.
    pub fn payload(&self, record: &Record) -> Map<String, Value> {
        let mut out = Map::new();
        for def in self.fields {
            let v = record.get(def.name).cloned().unwrap_or(Value::Null);
            out.insert(def.name.to_string(), coerce(def, v));
        }
        out
    }

    /// Validates a full create/update form and builds its payload.
    pub fn form_payload(
        &self,
        draft: &BTreeMap<String, String>,
    ) -> Result<Map<String, Value>, ValidationError> {
        let mut record = Record::new();
        for def in self.fields {
            let raw = draft.get(def.name).map(String::as_str).unwrap_or("");
            record.set(def.name, self.parse_input(def, raw)?);
        }
        Ok(self.payload(&record))
    }
}

fn coerce(def: &FieldDef, v: Value) -> Value {
    let fallback = if def.nullable {
        Value::Null
    } else {
        Value::from(0)
    };
    match def.kind {
        FieldKind::Text => match v {
            Value::String(s) => Value::String(s),
            Value::Null => Value::String(String::new()),
            other => Value::String(other.to_string()),
        },
        FieldKind::Integer { .. } => match number_of(&v) {
            Some(n) => Value::from(n.trunc() as i64),
            None => fallback,
        },
        FieldKind::Float => match number_of(&v) {
            Some(n) => Value::from(n),
            None => fallback,
        },
        FieldKind::Enumerated(_) => match v {
            Value::String(s) if !s.is_empty() => Value::String(s),
            _ => Value::Null,
        },
        FieldKind::Reference { .. } => RecordId::from_value(&v)
            .map(RecordId::to_value)
            .unwrap_or(Value::Null),
    }
}

fn number_of(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// How a scalar renders in a cell; absent values render as `-`.
pub fn display_value(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) if s.is_empty() => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// The text an input is seeded with; absent values seed an empty input.
pub fn raw_value(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/schema_tests.rs"]
mod tests;
