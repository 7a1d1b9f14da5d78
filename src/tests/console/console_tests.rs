    use super::*;
    use crate::channel::ChannelSettings;
    use crate::edit::{EditInput, EditState};
    use crate::remote::{CascadeFlags, Dependent, NameMatch, Report, ReportAnswer};
    use crate::test_support::{Call, Fixture, config};
    use crate::view::ViewState;
    use serde_json::json;

    fn console(fx: &Fixture) -> Console {
        let mut console = Console::new(fx.stores(), &config(), Dispatch::Inline);
        console.load_all();
        fx.units.clear_calls();
        fx.chapters.clear_calls();
        fx.coordinates.clear_calls();
        console
    }

    fn cell(kind: EntityKind, id: i64, field: &str) -> CellRef {
        CellRef::new(kind, RecordId(id), field).expect("editable cell")
    }

    fn row_value(console: &Console, kind: EntityKind, id: i64, field: &str) -> serde_json::Value {
        console
            .view(kind)
            .row(RecordId(id))
            .and_then(|r| r.get(field))
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }

    fn errors(console: &mut Console) -> Vec<String> {
        console
            .take_notices()
            .into_iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .map(|n| n.text)
            .collect()
    }

    #[test]
    fn load_all_fills_every_view() {
        let fx = Fixture::standard();
        let console = console(&fx);
        let units = console.view(EntityKind::Units);
        assert_eq!(units.state(), ViewState::Ready);
        assert_eq!(
            (units.index(), units.size(), units.total_pages()),
            (0, 10, 3)
        );
        assert_eq!(units.records().len(), 10);
        assert_eq!(console.view(EntityKind::Chapters).records().len(), 2);
        assert_eq!(console.view(EntityKind::Coordinates).records().len(), 3);
    }

    #[test]
    fn paging_reloads_only_valid_pages() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        assert!(console.next_page(EntityKind::Units));
        assert!(console.next_page(EntityKind::Units));
        assert!(!console.next_page(EntityKind::Units));
        assert_eq!(console.view(EntityKind::Units).index(), 2);
        assert_eq!(console.view(EntityKind::Units).records().len(), 5);
        assert_eq!(fx.units.page_loads(), 2);

        assert!(!console.go_to_page(EntityKind::Units, -1));
        assert!(console.prev_page(EntityKind::Units));
        assert_eq!(fx.units.page_loads(), 3);
    }

    #[test]
    fn paging_away_discards_edits_on_rows_that_left() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        let health = cell(EntityKind::Units, 1, "health");
        assert!(console.open_edit(health));
        console.session_mut(&health).unwrap().set_text("150");

        assert!(console.next_page(EntityKind::Units));
        let units = console.view(EntityKind::Units);
        assert_eq!(units.records().len(), 10);
        assert!(units.row(RecordId(1)).is_none());
        assert!(!units.is_held(RecordId(1)));
        assert!(console.session(&health).is_none());

        let notices = console.take_notices();
        assert_eq!(
            notices.last().map(|n| n.text.as_str()),
            Some("Edit of health on unit 1 discarded: the row left the page")
        );
        assert!(fx.units.updates().is_empty());
    }

    #[test]
    fn committed_edit_sends_full_payload_and_updates_row() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        assert!(console.sort_toggle(EntityKind::Units, "name"));
        match fx.units.calls().last() {
            Some(Call::FetchPage(q)) => {
                assert_eq!(q.sort.as_ref().map(|s| s.field.as_str()), Some("name"))
            }
            other => panic!("expected a page load, got {:?}", other),
        }
        let view = console.view(EntityKind::Units);
        assert_eq!(
            (view.index(), view.size(), view.total_pages()),
            (0, 10, 3)
        );

        let health = cell(EntityKind::Units, 1, "health");
        assert!(console.select(EntityKind::Units, RecordId(1)));
        assert!(console.open_edit(health));
        console.session_mut(&health).unwrap().set_text("150");
        assert_eq!(
            console.submit_edit(&health),
            SubmitOutcome::Confirm("Change health from \"100\" to \"150\"?".to_string())
        );
        assert!(console.confirm_edit(&health, true));

        let updates = fx.units.updates();
        assert_eq!(updates.len(), 1);
        let (id, body) = &updates[0];
        assert_eq!(*id, RecordId(1));
        assert_eq!(body["health"], json!(150));
        assert_eq!(body["name"], json!("Marine 01"));
        assert_eq!(body["category"], json!("ASSAULT"));
        assert_eq!(body["coordinatesId"], json!(101));
        assert_eq!(body["chapterId"], json!(7));
        assert!(!body.contains_key("id"));

        assert_eq!(row_value(&console, EntityKind::Units, 1, "health"), json!(150));
        assert_eq!(console.cell_text(EntityKind::Units, 0, "health"), "150");
        assert!(console.session(&health).is_none());
        assert!(!console.view(EntityKind::Units).is_held(RecordId(1)));
        assert_eq!(
            console.selection().unwrap().record.get("health"),
            Some(&json!(150))
        );
        assert!(errors(&mut console).is_empty());
    }

    #[test]
    fn rejected_edit_rolls_back_and_shows_server_message() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        fx.units.reject_updates(400, "Health must be greater than 0");

        let health = cell(EntityKind::Units, 1, "health");
        console.open_edit(health);
        console.session_mut(&health).unwrap().set_text("150");
        console.submit_edit(&health);
        console.confirm_edit(&health, true);

        assert_eq!(row_value(&console, EntityKind::Units, 1, "health"), json!(100));
        assert_eq!(console.cell_text(EntityKind::Units, 0, "health"), "100");
        assert!(console.session(&health).is_none());
        assert_eq!(errors(&mut console), vec!["Health must be greater than 0"]);
    }

    #[test]
    fn declined_edit_sends_nothing() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        let name = cell(EntityKind::Units, 2, "name");
        console.open_edit(name);
        console.session_mut(&name).unwrap().set_text("Cato");
        console.submit_edit(&name);
        assert!(!console.confirm_edit(&name, false));
        assert!(console.session(&name).is_none());
        assert!(fx.units.updates().is_empty());
        assert_eq!(console.cell_text(EntityKind::Units, 1, "name"), "Marine 02");
    }

    #[test]
    fn submit_and_blur_inside_grace_commit_once() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        let start = Instant::now();
        let health = cell(EntityKind::Units, 1, "health");
        console.open_edit(health);
        console.session_mut(&health).unwrap().set_text("150");

        console.blur_edit(&health, start);
        assert!(matches!(
            console.submit_edit(&health),
            SubmitOutcome::Confirm(_)
        ));
        console.tick(start + Duration::from_millis(500));
        assert_eq!(console.submit_edit(&health), SubmitOutcome::Ignored);
        assert!(console.confirm_edit(&health, true));
        assert!(!console.confirm_edit(&health, true));
        assert_eq!(fx.units.updates().len(), 1);
    }

    #[test]
    fn blur_alone_prompts_after_grace() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        let start = Instant::now();
        let health = cell(EntityKind::Units, 1, "health");
        console.open_edit(health);
        console.session_mut(&health).unwrap().set_text("120");
        console.blur_edit(&health, start);

        console.tick(start + Duration::from_millis(10));
        assert_eq!(console.session(&health).unwrap().state(), EditState::Editing);
        console.tick(start + Duration::from_millis(100));
        assert_eq!(
            console.session(&health).unwrap().state(),
            EditState::Confirming
        );
    }

    #[test]
    fn refocus_cancels_blur_commit() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        let start = Instant::now();
        let health = cell(EntityKind::Units, 1, "health");
        console.open_edit(health);
        console.blur_edit(&health, start);
        console.refocus_edit(&health);
        console.tick(start + Duration::from_secs(1));
        assert_eq!(console.session(&health).unwrap().state(), EditState::Editing);
    }

    #[test]
    fn unchanged_and_invalid_edits_close_without_update() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        let health = cell(EntityKind::Units, 1, "health");
        console.open_edit(health);
        assert_eq!(console.submit_edit(&health), SubmitOutcome::Unchanged);
        assert!(console.session(&health).is_none());

        console.open_edit(health);
        console.session_mut(&health).unwrap().set_text("lots");
        assert!(matches!(
            console.submit_edit(&health),
            SubmitOutcome::Invalid(_)
        ));
        assert!(console.session(&health).is_none());
        assert_eq!(errors(&mut console), vec!["health must be a whole number"]);
        assert!(fx.units.calls().is_empty());
    }

    #[test]
    fn second_open_on_same_cell_is_a_no_op() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        let health = cell(EntityKind::Units, 1, "health");
        assert!(console.open_edit(health));
        console.session_mut(&health).unwrap().set_text("130");
        assert!(!console.open_edit(health));
        assert_eq!(console.cell_text(EntityKind::Units, 0, "health"), "130");
        assert!(console.cancel_edit(&health));
        assert!(!console.cancel_edit(&health));
        assert_eq!(console.cell_text(EntityKind::Units, 0, "health"), "100");
    }

    #[test]
    fn reload_does_not_clobber_row_under_edit() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        let health = cell(EntityKind::Units, 1, "health");
        console.open_edit(health);
        console.session_mut(&health).unwrap().set_text("150");

        fx.units.set_field(1, "health", json!(300));
        fx.units.set_field(2, "health", json!(310));
        console.notify(&Notification::new("updated", Some("1")));

        assert_eq!(row_value(&console, EntityKind::Units, 1, "health"), json!(100));
        assert_eq!(row_value(&console, EntityKind::Units, 2, "health"), json!(310));
        assert_eq!(console.cell_text(EntityKind::Units, 0, "health"), "150");

        console.cancel_edit(&health);
        assert_eq!(row_value(&console, EntityKind::Units, 1, "health"), json!(300));
    }

    #[test]
    fn reference_edit_loads_options_and_embeds_choice() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        let chapter = cell(EntityKind::Units, 1, "chapterId");
        assert!(console.open_edit(chapter));

        match fx.chapters.calls().as_slice() {
            [Call::FetchPage(q)] => assert_eq!(q.size, MAX_PAGE_SIZE),
            other => panic!("expected one option load, got {:?}", other),
        }
        let session = console.session_mut(&chapter).unwrap();
        assert!(matches!(session.input(), EditInput::Choices { .. }));
        session.select_value(&json!(8));
        assert_eq!(
            console.submit_edit(&chapter),
            SubmitOutcome::Confirm("Change chapter to \"Blood Angels\"?".to_string())
        );
        console.confirm_edit(&chapter, true);

        let updates = fx.units.updates();
        assert_eq!(updates[0].1["chapterId"], json!(8));
        assert_eq!(console.cell_text(EntityKind::Units, 0, "chapterId"), "Blood Angels");
    }

    #[test]
    fn failed_option_load_closes_session() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        fx.coordinates.fail_pages("coordinates offline");
        let coords = cell(EntityKind::Units, 1, "coordinatesId");
        assert!(console.open_edit(coords));
        assert!(console.session(&coords).is_none());
        assert!(!console.view(EntityKind::Units).is_held(RecordId(1)));
        assert_eq!(
            errors(&mut console),
            vec!["Failed to load coordinatesId options: coordinates offline"]
        );
    }

    #[test]
    fn unit_delete_without_dependents_sends_no_flags() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        console.select(EntityKind::Units, RecordId(3));
        assert!(console.begin_delete(EntityKind::Units, RecordId(3)));
        let plan = console.delete_plan().expect("plan");
        assert_eq!(plan.stage(), CascadeStage::Plain);
        assert_eq!(plan.prompt_lines(), vec!["Delete unit \"Marine 03 (ID: 3)\"?"]);

        assert!(console.confirm_delete());
        assert_eq!(fx.units.removals(), vec![(RecordId(3), CascadeFlags::none())]);
        assert!(console.delete_plan().is_none());
        assert!(console.selection().is_none());
        assert!(console.view(EntityKind::Units).row(RecordId(3)).is_none());
        assert_eq!(fx.units.page_loads(), 1);
        let notices = console.take_notices();
        assert_eq!(notices[0].text, "removed 3");
    }

    #[test]
    fn unit_delete_can_take_references_along() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        fx.units.set_related(
            4,
            RelatedSummary {
                dependents: vec![Dependent {
                    kind: EntityKind::Chapters,
                    id: Some(RecordId(7)),
                    label: "Ultramarines".to_string(),
                    flag: crate::remote::DELETE_CHAPTER,
                    required: false,
                }],
            },
        );
        console.begin_delete(EntityKind::Units, RecordId(4));
        assert!(console.toggle_cascade(0));
        assert!(console.confirm_delete());
        let removals = fx.units.removals();
        assert!(removals[0].1.is_set(crate::remote::DELETE_CHAPTER));
    }

    #[test]
    fn chapter_delete_waits_for_cascade_decision() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        let marine = |id: i64| Dependent {
            kind: EntityKind::Units,
            id: Some(RecordId(id)),
            label: format!("Marine {:02} (ID: {})", id, id),
            flag: "deleteMarines",
            required: true,
        };
        fx.chapters.set_related(
            7,
            RelatedSummary {
                dependents: vec![marine(1), marine(2)],
            },
        );

        assert!(console.begin_delete(EntityKind::Chapters, RecordId(7)));
        let lines = console.delete_plan().unwrap().prompt_lines();
        assert!(lines.iter().any(|l| l.contains("Marine 01 (ID: 1)")));
        assert!(lines.iter().any(|l| l.contains("Marine 02 (ID: 2)")));

        assert!(!console.confirm_delete());
        assert!(fx.chapters.removals().is_empty());
        assert_eq!(
            console.take_notices()[0].text,
            "Accept deleting the listed records first, or cancel."
        );

        assert!(console.toggle_cascade(0));
        assert!(console.confirm_delete());
        let removals = fx.chapters.removals();
        assert_eq!(removals.len(), 1);
        assert_eq!(removals[0].0, RecordId(7));
        assert!(removals[0].1.is_set("deleteMarines"));
    }

    #[test]
    fn cancelled_delete_sends_nothing() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        console.begin_delete(EntityKind::Coordinates, RecordId(2));
        assert!(!console.begin_delete(EntityKind::Coordinates, RecordId(3)));
        console.cancel_delete();
        assert!(console.delete_plan().is_none());
        assert!(fx.coordinates.removals().is_empty());
        assert!(!console.confirm_delete());
    }

    #[test]
    fn notifications_reload_the_routed_views() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        console.notify(&Notification::new("chapter_updated", Some("7")));
        assert_eq!(fx.chapters.page_loads(), 1);
        assert_eq!(fx.units.page_loads(), 1);
        assert_eq!(fx.coordinates.page_loads(), 0);

        console.notify(&Notification::new("created", Some("26")));
        assert_eq!(fx.units.page_loads(), 2);
        assert_eq!(fx.chapters.page_loads(), 1);

        console.notify(&Notification::new("import_finished", None));
        assert_eq!(fx.units.page_loads() + fx.chapters.page_loads(), 3);
    }

    #[test]
    fn shrinking_collection_moves_back_a_page() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        console.go_to_page(EntityKind::Units, 2);
        fx.units.truncate(15);
        console.notify(&Notification::new("deleted", Some("20")));

        let view = console.view(EntityKind::Units);
        assert_eq!(view.index(), 1);
        assert_eq!(view.total_pages(), 2);
        let ids: Vec<i64> = view.records().iter().filter_map(|r| r.id()).map(|i| i.0).collect();
        assert_eq!(ids, (11..=15).collect::<Vec<_>>());
    }

    #[test]
    fn failed_load_keeps_rows_and_recovers() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        fx.units.fail_pages("database unavailable");
        console.load(EntityKind::Units);
        assert_eq!(console.view(EntityKind::Units).state(), ViewState::Error);
        assert_eq!(console.view(EntityKind::Units).records().len(), 10);
        assert_eq!(
            errors(&mut console),
            vec!["Failed to load Units: database unavailable"]
        );

        fx.units.heal();
        console.load(EntityKind::Units);
        assert_eq!(console.view(EntityKind::Units).state(), ViewState::Ready);
    }

    #[test]
    fn filter_reaches_the_store() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        assert!(console.set_filter(EntityKind::Units, Some("marine 2".to_string())));
        let view = console.view(EntityKind::Units);
        assert_eq!(view.records().len(), 6);
        assert!(!console.set_filter(EntityKind::Chapters, Some("x".to_string())));
        assert_eq!(fx.chapters.page_loads(), 0);
    }

    #[test]
    fn form_save_creates_and_reloads() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        let mut draft = BTreeMap::new();
        draft.insert("name".to_string(), "Dark Angels".to_string());
        draft.insert("marinesCount".to_string(), "900".to_string());

        assert!(console.save_form(EntityKind::Chapters, None, &draft));
        assert!(!console.is_saving());
        assert!(matches!(fx.chapters.calls().first(), Some(Call::Create(_))));
        assert_eq!(console.view(EntityKind::Chapters).records().len(), 3);
        assert_eq!(
            console.take_notices()[0].text,
            "Created chapter Dark Angels"
        );

        draft.insert("marinesCount".to_string(), "0".to_string());
        assert!(!console.save_form(EntityKind::Chapters, Some(RecordId(7)), &draft));
        assert_eq!(
            errors(&mut console),
            vec!["marines count must be between 1 and 1000"]
        );
    }

    #[test]
    fn form_update_targets_the_record() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        let mut draft = BTreeMap::new();
        draft.insert("x".to_string(), "9.5".to_string());
        draft.insert("y".to_string(), "".to_string());
        assert!(console.save_form(EntityKind::Coordinates, Some(RecordId(1)), &draft));
        let updates = fx.coordinates.updates();
        assert_eq!(updates[0].0, RecordId(1));
        assert_eq!(updates[0].1["y"], serde_json::Value::Null);
        assert_eq!(
            fx.coordinates.record(1).unwrap().get("x"),
            Some(&json!(9.5))
        );
    }

    #[test]
    fn attached_channel_feeds_the_queue() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        let settings = ChannelSettings {
            reconnect_delay: Duration::from_secs(30),
            ..Default::default()
        };
        let mut channel = PushChannel::connect("ws://127.0.0.1:9/ws/marines", settings);
        let mut subscription = console.attach(&channel);

        channel
            .listeners()
            .dispatch(&Notification::new("coordinates_created", Some("4")));
        assert_eq!(console.pump(), 1);
        assert_eq!(fx.coordinates.page_loads(), 1);
        assert_eq!(fx.units.page_loads(), 1);

        subscription.dispose();
        assert_eq!(
            channel
                .listeners()
                .dispatch(&Notification::new("created", None)),
            0
        );
        channel.shutdown();
    }

    #[test]
    fn background_dispatch_settles_through_the_queue() {
        let fx = Fixture::standard();
        let mut console = Console::new(fx.stores(), &config(), Dispatch::Background);
        console.load_all();
        assert!(console.wait_idle(Duration::from_secs(5)));
        assert_eq!(console.in_flight(), 0);
        for kind in EntityKind::ALL {
            assert_eq!(console.view(kind).state(), ViewState::Ready, "{}", kind);
        }

        console
            .sender()
            .send(ConsoleEvent::Pushed(Notification::new("updated", None)))
            .expect("queue open");
        assert!(console.pump() >= 1);
        assert!(console.wait_idle(Duration::from_secs(5)));
        assert_eq!(fx.units.page_loads(), 2);
    }

    #[test]
    fn average_heart_count_lands_in_notice_and_answer() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        console.run_report(Report::AverageHeartCount);

        let notices = console.take_notices();
        assert_eq!(notices.last().unwrap().text, "Average heart count: 2.00");
        assert_eq!(
            console.take_answer(),
            Some((Report::AverageHeartCount, ReportAnswer::Average(Some(2.0))))
        );
        assert!(console.take_answer().is_none());
    }

    #[test]
    fn health_count_is_validated_before_the_server_sees_it() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        fx.units.set_field(3, "health", json!(40));

        console.run_report(Report::CountBelowHealth(50));
        assert_eq!(
            console.take_notices().last().unwrap().text,
            "1 units with health below 50"
        );

        console.run_report(Report::CountBelowHealth(0));
        assert_eq!(errors(&mut console), vec!["Health bound must be greater than 0"]);
        assert!(console.take_answer().is_some_and(|(r, _)| r == Report::CountBelowHealth(50)));
    }

    #[test]
    fn name_search_lists_matches() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        console.run_report(Report::SearchByName(" marine 2".to_string()));

        let (report, answer) = console.take_answer().expect("answer");
        assert_eq!(report.summary(&answer), "6 units match \"marine 2\"");
        let ReportAnswer::Matches(found) = &answer else {
            panic!("expected matches, got {:?}", answer);
        };
        assert_eq!(
            found[0],
            NameMatch {
                id: RecordId(20),
                name: "Marine 20".to_string()
            }
        );
        assert_eq!(answer.lines()[5], "25\tMarine 25");
    }

    #[test]
    fn report_failure_becomes_an_error_notice() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        fx.special.fail_with("reports are offline");
        console.run_report(Report::AverageHeartCount);
        assert_eq!(errors(&mut console), vec!["reports are offline"]);
        assert!(console.take_answer().is_none());
    }

    #[test]
    fn removing_from_chapter_reloads_units_and_chapters() {
        let fx = Fixture::standard();
        let mut console = console(&fx);
        assert_eq!(
            console.unassign_prompt(RecordId(1)).as_deref(),
            Some("Remove unit \"Marine 01 (ID: 1)\" from chapter \"Ultramarines\"?")
        );

        assert!(console.remove_from_chapter(RecordId(1)));
        assert_eq!(fx.special.removed(), vec![RecordId(1)]);
        assert_eq!(fx.units.page_loads(), 1);
        assert_eq!(fx.chapters.page_loads(), 1);
        assert_eq!(
            console.take_notices().last().unwrap().text,
            "Removed unit 1 from its chapter"
        );

        assert!(console.unassign_prompt(RecordId(1)).is_none());
        assert!(!console.remove_from_chapter(RecordId(1)));
        assert_eq!(errors(&mut console), vec!["Unit 1 has no chapter"]);
        assert_eq!(fx.special.removed().len(), 1);
    }
