//! Pre-delete dependency check and cascade decision.

use crate::model::{EntityKind, RecordId};
use crate::remote::{CascadeFlags, Dependent, RelatedSummary};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadeStage {
    /// Waiting for the dependency summary.
    Resolving,
    /// No dependents: a plain yes/no confirmation.
    Plain,
    /// Dependents listed; every required choice must be accepted before confirming.
    Decide,
    Deleting,
    Done,
}

/// One cascade flag and the dependents it covers.
#[derive(Clone, Debug, PartialEq)]
pub struct CascadeChoice {
    pub flag: &'static str,
    pub kind: EntityKind,
    pub required: bool,
    pub chosen: bool,
    pub dependents: Vec<Dependent>,
}

#[derive(Clone, Debug)]
pub struct CascadePlan {
    kind: EntityKind,
    id: RecordId,
    label: String,
    stage: CascadeStage,
    choices: Vec<CascadeChoice>,
}

impl CascadePlan {
    pub fn new(kind: EntityKind, id: RecordId, label: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            label: label.into(),
            stage: CascadeStage::Resolving,
            choices: Vec::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stage(&self) -> CascadeStage {
        self.stage
    }

    pub fn choices(&self) -> &[CascadeChoice] {
        &self.choices
    }

    pub fn dependents(&self) -> impl Iterator<Item = &Dependent> {
        self.choices.iter().flat_map(|c| c.dependents.iter())
    }

    pub fn resolve(&mut self, summary: RelatedSummary) {
        if self.stage != CascadeStage::Resolving {
            return;
        }
        for dep in summary.dependents {
            match self.choices.iter_mut().find(|c| c.flag == dep.flag) {
                Some(choice) => {
                    choice.required |= dep.required;
                    choice.dependents.push(dep);
                }
                None => self.choices.push(CascadeChoice {
                    flag: dep.flag,
                    kind: dep.kind,
                    required: dep.required,
                    chosen: false,
                    dependents: vec![dep],
                }),
            }
        }
        self.stage = if self.choices.is_empty() {
            CascadeStage::Plain
        } else {
            CascadeStage::Decide
        };
    }

    pub fn toggle(&mut self, choice: usize) -> bool {
        if self.stage != CascadeStage::Decide {
            return false;
        }
        match self.choices.get_mut(choice) {
            Some(c) => {
                c.chosen = !c.chosen;
                true
            }
            None => false,
        }
    }

    /// Whether confirming right now would issue the delete.
    pub fn ready(&self) -> bool {
        match self.stage {
            CascadeStage::Plain => true,
            CascadeStage::Decide => self.choices.iter().all(|c| c.chosen || !c.required),
            _ => false,
        }
    }

    /// Returns the flags to send, or `None` while the decision is incomplete.
    pub fn confirm(&mut self) -> Option<CascadeFlags> {
        if !self.ready() {
            return None;
        }
        let mut flags = CascadeFlags::none();
        for c in self.choices.iter().filter(|c| c.chosen) {
            flags.insert(c.flag);
        }
        self.stage = CascadeStage::Deleting;
        Some(flags)
    }

    pub fn finish(&mut self) {
        self.stage = CascadeStage::Done;
    }

    /// Dialog text: the question, then one line per choice and its dependents.
    pub fn prompt_lines(&self) -> Vec<String> {
        let singular = self.kind.schema().singular;
        let mut lines = vec![format!("Delete {} \"{}\"?", singular, self.label)];
        match self.stage {
            CascadeStage::Resolving => lines.push("checking related records…".to_string()),
            CascadeStage::Plain | CascadeStage::Deleting | CascadeStage::Done => {}
            CascadeStage::Decide => {
                for (i, c) in self.choices.iter().enumerate() {
                    let mark = if c.chosen { "x" } else { " " };
                    let what = c.kind.schema().singular;
                    let text = if c.required {
                        format!(
                            "[{}] {}. delete together with {} dependent {} (required)",
                            mark,
                            i + 1,
                            c.dependents.len(),
                            what
                        )
                    } else {
                        format!("[{}] {}. also delete {}", mark, i + 1, what)
                    };
                    lines.push(text);
                    for d in &c.dependents {
                        lines.push(format!("      {}", d.label));
                    }
                }
            }
        }
        lines
    }
}

#[cfg(test)]
#[path = "tests/cascade_tests.rs"]
mod tests;
