//! Which views a push notification invalidates.
//!
//! Unit rows embed the chapter and coordinates they reference, so a change to either of those
//! reloads the units view too. Nothing reloads the referenced views on a unit change.

use crate::model::{EntityKind, Notification};

const UNITS: &[EntityKind] = &[EntityKind::Units];
const CHAPTERS_AND_UNITS: &[EntityKind] = &[EntityKind::Chapters, EntityKind::Units];
const COORDINATES_AND_UNITS: &[EntityKind] = &[EntityKind::Coordinates, EntityKind::Units];

pub fn targets(kind: &str) -> &'static [EntityKind] {
    match kind {
        "created" | "updated" | "deleted" => UNITS,
        "chapter_created" | "chapter_updated" | "chapter_deleted" => CHAPTERS_AND_UNITS,
        "coordinates_created" | "coordinates_updated" | "coordinates_deleted" => {
            COORDINATES_AND_UNITS
        }
        _ => &[],
    }
}

pub fn route(notification: &Notification) -> &'static [EntityKind] {
    let views = targets(&notification.kind);
    if views.is_empty() {
        tracing::debug!(kind = %notification.kind, "ignoring unknown notification");
    }
    views
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
