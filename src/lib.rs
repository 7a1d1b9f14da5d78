//! Replicated-view console for unit, chapter, and coordinates records.
//!
//! The core keeps a paged, sorted, filtered projection of each server collection, applies
//! optimistic inline edits, and reloads views when the push channel reports a change.

pub mod cascade;
pub mod channel;
pub mod config;
pub mod console;
pub mod edit;
pub mod error;
pub mod logging;
pub mod model;
pub mod remote;
pub mod router;
pub mod schema;
pub mod tui;
pub mod view;

mod tui_shell;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
