use super::*;

impl Console {
    pub(super) fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Loaded {
                kind,
                generation,
                result,
            } => match self.view_mut(kind).finish_load(generation, result) {
                LoadOutcome::Applied => self.discard_evicted(kind),
                LoadOutcome::Stale => {}
                LoadOutcome::Reissue => self.load(kind),
                LoadOutcome::Failed(msg) => self.error(msg),
            },

            Completion::Options { cell, result } => {
                let Some(session) = self.sessions.get_mut(&cell) else {
                    return;
                };
                match result {
                    Ok(page) => session.supply_options(page.records),
                    Err(err) => {
                        session.options_failed();
                        self.close_session(cell);
                        self.error(format!("Failed to load {} options: {}", cell.field, err));
                    }
                }
            }

            Completion::Committed {
                cell,
                change,
                result,
            } => {
                let ok = result.is_ok();
                if let Some(session) = self.sessions.get_mut(&cell) {
                    session.finish(ok);
                }
                match result {
                    Ok(_) => {
                        let embedded = change.embedded.as_ref().map(|(name, body)| (*name, body));
                        self.view_mut(cell.kind)
                            .apply_commit(cell.id, cell.field, &change.value, embedded);
                        if let Some(selection) = self.selection.as_mut() {
                            if selection.kind == cell.kind && selection.record.id() == Some(cell.id)
                            {
                                selection.record.set(cell.field, change.value.clone());
                                if let Some((name, body)) = embedded {
                                    selection.record.set(name, body.clone());
                                }
                            }
                        }
                        tracing::info!(
                            kind = %cell.kind,
                            id = %cell.id,
                            field = cell.field,
                            "edit committed"
                        );
                    }
                    Err(err) => self.error(err.to_string()),
                }
                self.close_session(cell);
            }

            Completion::Related { kind, id, result } => {
                let Some(plan) = self.delete.as_mut() else {
                    return;
                };
                if plan.kind() != kind || plan.id() != id {
                    return;
                }
                match result {
                    Ok(summary) => plan.resolve(summary),
                    Err(err) => {
                        self.delete = None;
                        self.error(format!("Could not check related records: {}", err));
                    }
                }
            }

            Completion::Removed { kind, id, result } => {
                self.delete = None;
                match result {
                    Ok(outcome) => {
                        let schema = kind.schema();
                        let msg = outcome.message.clone().unwrap_or_else(|| {
                            format!("Deleted {} {}", schema.singular, id)
                        });
                        self.info(msg);
                        self.view_mut(kind).remove_row(id);
                        if self
                            .selection
                            .as_ref()
                            .is_some_and(|s| s.kind == kind && s.record.id() == Some(id))
                        {
                            self.selection = None;
                        }
                        self.load(kind);
                        if outcome.coordinates_deleted {
                            self.load(EntityKind::Coordinates);
                        }
                        if outcome.chapter_deleted {
                            self.load(EntityKind::Chapters);
                        }
                    }
                    Err(err) => self.error(err.to_string()),
                }
            }

            Completion::Saved {
                kind,
                created,
                result,
            } => {
                self.saving = false;
                match result {
                    Ok(record) => {
                        let schema = kind.schema();
                        let verb = if created { "Created" } else { "Updated" };
                        let label = schema.label_of(&record);
                        self.info(format!("{} {} {}", verb, schema.singular, label));
                        self.load(kind);
                    }
                    Err(err) => self.error(err.to_string()),
                }
            }

            Completion::Reported { report, result } => match result {
                Ok(answer) => {
                    self.info(report.summary(&answer));
                    self.answer = Some((report, answer));
                }
                Err(err) => self.error(err.to_string()),
            },

            Completion::Unassigned { id, result } => match result {
                Ok(()) => {
                    self.info(format!("Removed unit {} from its chapter", id));
                    self.load(EntityKind::Units);
                    self.load(EntityKind::Chapters);
                }
                Err(err) => self.error(err.to_string()),
            },
        }
    }

    /// Drops the edit sessions on rows a load pushed off the page.
    fn discard_evicted(&mut self, kind: EntityKind) {
        for id in self.view_mut(kind).take_evicted() {
            let cells: Vec<CellRef> = self
                .sessions
                .keys()
                .filter(|c| c.kind == kind && c.id == id)
                .copied()
                .collect();
            for cell in cells {
                self.sessions.remove(&cell);
                self.info(format!(
                    "Edit of {} on {} {} discarded: the row left the page",
                    cell.field,
                    kind.schema().singular,
                    id
                ));
            }
        }
    }
}
