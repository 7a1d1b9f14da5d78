    use super::*;
    use serde_json::json;

    fn ids(page: &Page) -> Vec<i64> {
        page.records.iter().filter_map(|r| r.id()).map(|id| id.0).collect()
    }

    #[test]
    fn envelope_with_total_pages() {
        let body = json!({
            "content": [{ "id": 1 }, { "id": 2 }],
            "totalPages": 4,
            "totalElements": 38,
        });
        let page = parse_page(body, 1, 10).expect("envelope parses");
        assert_eq!(ids(&page), vec![1, 2]);
        assert_eq!((page.index, page.size, page.total_pages), (1, 10, 4));
    }

    #[test]
    fn envelope_with_nested_page_metadata() {
        let body = json!({
            "content": [{ "id": 5 }],
            "page": { "size": 1, "number": 0, "totalPages": 9 },
        });
        let page = parse_page(body, 0, 1).expect("envelope parses");
        assert_eq!(page.total_pages, 9);
    }

    #[test]
    fn envelope_without_total_guesses_from_content() {
        let page = parse_page(json!({ "content": [{ "id": 5 }] }), 2, 10).unwrap();
        assert_eq!(page.total_pages, 3);
        let page = parse_page(json!({ "content": [] }), 0, 10).unwrap();
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn envelope_content_is_capped_at_page_size() {
        let body = json!({ "content": [{ "id": 1 }, { "id": 2 }, { "id": 3 }], "totalPages": 2 });
        let page = parse_page(body, 0, 2).unwrap();
        assert_eq!(ids(&page), vec![1, 2]);
    }

    #[test]
    fn bare_list_is_paged_locally() {
        let all: Vec<Value> = (1..=7).map(|i| json!({ "id": i })).collect();
        let page = parse_page(Value::Array(all.clone()), 1, 3).unwrap();
        assert_eq!(ids(&page), vec![4, 5, 6]);
        assert_eq!(page.total_pages, 3);

        let page = parse_page(Value::Array(all), 5, 3).unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.total_pages, 3);

        let page = parse_page(json!([]), 0, 3).unwrap();
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn malformed_pages_are_format_errors() {
        let err = parse_page(json!({ "items": [] }), 0, 10).unwrap_err();
        assert!(matches!(err, ConsoleError::Format(_)), "{}", err);
        assert!(err.to_string().contains("content"), "{}", err);

        let err = parse_page(json!({ "content": "nope" }), 0, 10).unwrap_err();
        assert!(matches!(err, ConsoleError::Format(_)), "{}", err);

        let err = parse_page(json!("page"), 0, 10).unwrap_err();
        assert!(matches!(err, ConsoleError::Format(_)), "{}", err);

        let err = parse_page(json!([{ "id": 1 }, 7]), 0, 10).unwrap_err();
        assert!(err.to_string().contains("a number"), "{}", err);
    }

    #[test]
    fn rejection_prefers_json_error_field() {
        assert_eq!(
            rejection_message(400, true, r#"{"error":"Name must not be empty"}"#),
            "Name must not be empty"
        );
        assert_eq!(
            rejection_message(404, true, r#"{"message":"Chapter 9 not found"}"#),
            "Chapter 9 not found"
        );
        assert_eq!(
            rejection_message(409, true, r#"{"error":"  ","message":"Conflict"}"#),
            "Conflict"
        );
    }

    #[test]
    fn rejection_falls_back_to_text_then_status() {
        assert_eq!(rejection_message(500, false, " boom \n"), "boom");
        assert_eq!(rejection_message(500, true, "not json"), "not json");
        assert_eq!(rejection_message(502, false, ""), "HTTP 502");
    }

    #[test]
    fn cascade_flags_only_send_set_flags() {
        assert!(CascadeFlags::none().query_pairs().is_empty());
        let flags = CascadeFlags::none()
            .with(DELETE_COORDINATES)
            .with(DELETE_CHAPTER);
        assert_eq!(
            flags.query_pairs(),
            vec![("deleteChapter", "true"), ("deleteCoordinates", "true")]
        );
    }

    #[test]
    fn unit_related_response_lists_optional_references() {
        let related: RelatedResponse = serde_json::from_value(json!({
            "hasCoordinates": true,
            "coordinates": { "id": 4, "x": 1.5, "y": null },
            "hasChapter": false,
            "chapter": { "id": 7, "name": "Ultramarines" },
        }))
        .unwrap();
        let summary = related.into_summary(EntityKind::Units.schema());
        assert_eq!(summary.dependents.len(), 1);
        let dep = &summary.dependents[0];
        assert_eq!(dep.kind, EntityKind::Coordinates);
        assert_eq!(dep.id, Some(RecordId(4)));
        assert_eq!(dep.label, "x:1.5, y:null");
        assert_eq!(dep.flag, DELETE_COORDINATES);
        assert!(!dep.required);
    }

    #[test]
    fn chapter_related_response_lists_required_units() {
        let related: RelatedResponse = serde_json::from_value(json!({
            "relatedSpaceMarines": [
                { "id": 1, "name": "Titus" },
                { "id": 2, "name": "Cato" },
            ],
        }))
        .unwrap();
        let summary = related.into_summary(EntityKind::Chapters.schema());
        let labels: Vec<&str> = summary.dependents.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["Titus (ID: 1)", "Cato (ID: 2)"]);
        assert!(summary.dependents.iter().all(|d| d.required && d.flag == "deleteMarines"));

        let empty = RelatedResponse::default().into_summary(EntityKind::Coordinates.schema());
        assert!(empty.is_empty());
    }

    #[test]
    fn delete_outcome_reads_camel_case_flags() {
        let outcome: DeleteOutcome = serde_json::from_value(json!({
            "message": "Space marine deleted",
            "coordinatesDeleted": true,
        }))
        .unwrap();
        assert_eq!(outcome.message.as_deref(), Some("Space marine deleted"));
        assert!(outcome.coordinates_deleted);
        assert!(!outcome.chapter_deleted);
    }

    #[test]
    fn store_urls_join_base_and_collection() {
        let timeout = Duration::from_secs(1);
        let store = HttpCollectionStore::new(EntityKind::Chapters, "http://host:8080/", timeout)
            .expect("client builds");
        assert_eq!(store.url("/7/related"), "http://host:8080/api/chapters/7/related");
        assert_eq!(store.kind(), EntityKind::Chapters);
    }

    #[test]
    fn store_set_hands_out_each_kind() {
        let cfg = ConsoleConfig::default();
        let stores = StoreSet::http(&cfg).expect("stores build");
        for kind in EntityKind::ALL {
            assert_eq!(stores.get(kind).kind(), kind);
        }
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        let timeout = Duration::from_secs(2);
        let store =
            HttpCollectionStore::new(EntityKind::Units, "http://127.0.0.1:9", timeout).unwrap();
        let err = store.fetch_page(&PageQuery::first(10)).unwrap_err();
        assert!(matches!(err, ConsoleError::Transport { .. }), "{}", err);
        assert!(!err.is_rejection());
        assert!(err.to_string().starts_with("fetch page request"), "{}", err);
    }

    #[test]
    fn report_bodies_parse() {
        assert_eq!(parse_average(json!({ "average": 2.5 })).unwrap(), Some(2.5));
        assert_eq!(parse_average(json!({ "average": null })).unwrap(), None);
        assert!(matches!(
            parse_average(json!({ "mean": 2 })),
            Err(ConsoleError::Format(_))
        ));
        assert_eq!(parse_count(json!({ "count": 4 })).unwrap(), 4);
        assert!(parse_count(json!({ "count": "four" })).is_err());
    }

    #[test]
    fn search_matches_accept_pairs_and_objects() {
        let found = parse_matches(json!({
            "marines": [["Marine 20", 6], { "id": 7, "name": "Marine 19" }],
        }))
        .unwrap();
        let ids: Vec<i64> = found.iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![6, 7]);
        assert_eq!(found[1].name, "Marine 19");
        assert!(parse_matches(json!({})).unwrap().is_empty());
        assert!(parse_matches(json!({ "marines": [["no id"]] })).is_err());
    }

    #[test]
    fn report_arguments_are_checked_before_sending() {
        let timeout = Duration::from_secs(2);
        let ops = HttpSpecialOperations::new("http://127.0.0.1:9", timeout).unwrap();
        let err = ops.count_below_health(0).unwrap_err();
        assert!(matches!(err, ConsoleError::Validation(_)), "{}", err);
        let err = ops.search_by_name("   ").unwrap_err();
        assert_eq!(err.to_string(), "Enter part of a name to search for");
        let err = ops.average_heart_count().unwrap_err();
        assert!(matches!(err, ConsoleError::Transport { .. }), "{}", err);
    }

    #[test]
    fn report_summaries_read_naturally() {
        let avg = Report::AverageHeartCount;
        assert_eq!(
            avg.summary(&ReportAnswer::Average(None)),
            "Average heart count: no units"
        );
        assert_eq!(
            avg.summary(&ReportAnswer::Average(Some(1.0 / 3.0))),
            "Average heart count: 0.33"
        );
        assert!(ReportAnswer::Count(3).lines().is_empty());
    }
