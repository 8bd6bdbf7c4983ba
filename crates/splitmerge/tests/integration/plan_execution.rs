//! Building targets from plans.

use std::sync::Arc;

use rstest::rstest;
use splitmerge::error::{PlanValidationError, SplitMergeError};
use splitmerge::store::DocumentStore;
use splitmerge::{ExecutionOptions, Plan, SplitMergeExecutor};

use crate::common::{Library, PdfSpec, RecordingDispatcher, image_count, page_markers};

fn executor(library: &Library, dispatcher: &Arc<RecordingDispatcher>) -> SplitMergeExecutor {
    SplitMergeExecutor::new(library.store.clone(), dispatcher.clone())
}

#[test]
fn test_ascending_and_descending_ranges_across_sources() {
    let library = Library::new();
    library.add(1, 3);
    library.add(2, 3);
    let dispatcher = RecordingDispatcher::new();

    let plan = Plan::from_json(
        r#"[[{"document": 1, "pages": "1-2"}, {"document": 2, "pages": "3-1"}]]"#,
    )
    .unwrap();
    let outcome = executor(&library, &dispatcher)
        .execute(&plan, &ExecutionOptions::new(&library.scratch))
        .unwrap();

    assert_eq!(outcome.targets.len(), 1);
    assert_eq!(outcome.targets[0].page_count, 5);
    assert_eq!(
        page_markers(&outcome.targets[0].output_path),
        vec![(1, 1), (1, 2), (2, 3), (2, 2), (2, 1)]
    );
}

#[test]
fn test_absent_selection_takes_every_page_in_order() {
    let library = Library::new();
    library.add(4, 3);
    let dispatcher = RecordingDispatcher::new();

    let plan = Plan::from_json(r#"[[{"document": 4}], [{"document": 4, "pages": ""}]]"#).unwrap();
    let outcome = executor(&library, &dispatcher)
        .execute(&plan, &ExecutionOptions::new(&library.scratch))
        .unwrap();

    for target in &outcome.targets {
        assert_eq!(page_markers(&target.output_path), vec![(4, 1), (4, 2), (4, 3)]);
    }
}

#[test]
fn test_repeated_pages_are_kept() {
    let library = Library::new();
    library.add(1, 2);
    let dispatcher = RecordingDispatcher::new();

    let plan = Plan::from_json(r#"[[{"document": 1, "pages": "2,1,2"}]]"#).unwrap();
    let outcome = executor(&library, &dispatcher)
        .execute(&plan, &ExecutionOptions::new(&library.scratch))
        .unwrap();

    assert_eq!(
        page_markers(&outcome.targets[0].output_path),
        vec![(1, 2), (1, 1), (1, 2)]
    );
}

#[test]
fn test_split_into_several_targets() {
    let library = Library::new();
    library.add(7, 4);
    let dispatcher = RecordingDispatcher::new();

    let plan = Plan::from_json(
        r#"[[{"document": 7, "pages": "1-2"}], [{"document": 7, "pages": "3"}], [{"document": 7, "pages": "4"}]]"#,
    )
    .unwrap();
    let outcome = executor(&library, &dispatcher)
        .execute(&plan, &ExecutionOptions::new(&library.scratch))
        .unwrap();

    let files = outcome.files();
    assert_eq!(files.len(), 3);
    assert_eq!(page_markers(files[0]), vec![(7, 1), (7, 2)]);
    assert_eq!(page_markers(files[1]), vec![(7, 3)]);
    assert_eq!(page_markers(files[2]), vec![(7, 4)]);
    assert_eq!(library.scratch_files().len(), 3);
}

#[test]
fn test_unreferenced_resources_are_dropped() {
    let library = Library::new();
    library.add(1, 10);
    let dispatcher = RecordingDispatcher::new();

    let plan = Plan::from_json(r#"[[{"document": 1, "pages": "4"}]]"#).unwrap();
    let outcome = executor(&library, &dispatcher)
        .execute(&plan, &ExecutionOptions::new(&library.scratch))
        .unwrap();

    assert_eq!(image_count(&outcome.targets[0].output_path), 1);
}

#[test]
fn test_same_source_is_opened_once() {
    let library = Library::new();
    library.add(1, 3);
    let dispatcher = RecordingDispatcher::new();

    let plan = Plan::from_json(
        r#"[[{"document": 1, "pages": "1"}], [{"document": 1, "pages": "2-3"}]]"#,
    )
    .unwrap();
    let outcome = executor(&library, &dispatcher)
        .execute(&plan, &ExecutionOptions::new(&library.scratch))
        .unwrap();

    let stats = &outcome.statistics;
    assert_eq!(stats.sources_opened, 1);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.handles_closed, 1);
    assert_eq!(stats.targets_built, 2);
    assert_eq!(stats.pages_written, 3);
}

#[rstest]
#[case("1.3", "1.7", "1.7")]
#[case("1.3", "1.2", "1.4")]
#[case("1.6", "1.5", "1.6")]
fn test_output_version_is_highest_of_sources(
    #[case] first: &'static str,
    #[case] second: &'static str,
    #[case] expected: &str,
) {
    let library = Library::new();
    library.add_spec(1, &PdfSpec::new(1, 1).version(first));
    library.add_spec(2, &PdfSpec::new(2, 1).version(second));
    let dispatcher = RecordingDispatcher::new();

    let plan = Plan::from_json(r#"[[{"document": 1}, {"document": 2}]]"#).unwrap();
    let outcome = executor(&library, &dispatcher)
        .execute(&plan, &ExecutionOptions::new(&library.scratch))
        .unwrap();

    assert_eq!(outcome.targets[0].version.to_string(), expected);
    let written = lopdf::Document::load(&outcome.targets[0].output_path).unwrap();
    assert_eq!(written.version, expected);
}

#[rstest]
#[case("0")]
#[case("4")]
#[case("2-4")]
#[case("3-4000000000")]
fn test_out_of_range_page_aborts_whole_plan(#[case] pages: &str) {
    let library = Library::new();
    library.add(1, 3);
    library.add(2, 3);
    let dispatcher = RecordingDispatcher::new();

    let raw = format!(
        r#"[[{{"document": 1, "pages": "1-3"}}], [{{"document": 2, "pages": "{pages}"}}]]"#
    );
    let plan = Plan::from_json(&raw).unwrap();
    let mut options = ExecutionOptions::new(&library.scratch);
    options.preview = false;

    let err = executor(&library, &dispatcher)
        .execute(&plan, &options)
        .unwrap_err();

    assert!(matches!(
        err.as_validation(),
        Some(PlanValidationError::PageOutOfRange {
            document: 2,
            page_count: 3,
            ..
        })
    ));
    assert!(err.to_string().starts_with("page "));
    assert_eq!(dispatcher.calls(), 0);
    assert!(library.scratch_files().is_empty());
}

#[test]
fn test_huge_range_is_rejected_before_listing_pages() {
    let library = Library::new();
    library.add(1, 3);
    let dispatcher = RecordingDispatcher::new();

    let plan = Plan::from_json(r#"[[{"document": 1, "pages": "1-4000000000"}]]"#).unwrap();
    let err = executor(&library, &dispatcher)
        .execute(&plan, &ExecutionOptions::new(&library.scratch))
        .unwrap_err();

    assert_eq!(
        err.as_validation(),
        Some(&PlanValidationError::PageOutOfRange {
            document: 1,
            page: 4,
            page_count: 3,
        })
    );
    assert!(library.scratch_files().is_empty());
}

#[test]
fn test_malformed_selection_names_the_expression() {
    let library = Library::new();
    library.add(1, 3);
    let dispatcher = RecordingDispatcher::new();

    let plan = Plan::from_json(r#"[[{"document": 1, "pages": "1,3-"}]]"#).unwrap();
    let err = executor(&library, &dispatcher)
        .execute(&plan, &ExecutionOptions::new(&library.scratch))
        .unwrap_err();

    assert_eq!(err.to_string(), "invalid page range: 1,3-");
    assert!(library.scratch_files().is_empty());
}

#[test]
fn test_missing_source_file() {
    let library = Library::new();
    let record = library.add(1, 2);
    std::fs::remove_file(&record.source_path).unwrap();
    let dispatcher = RecordingDispatcher::new();

    let plan = Plan::from_json(r#"[[{"document": 1}]]"#).unwrap();
    let err = executor(&library, &dispatcher)
        .execute(&plan, &ExecutionOptions::new(&library.scratch))
        .unwrap_err();

    assert!(matches!(
        err,
        SplitMergeError::Validation(PlanValidationError::SourceFileMissing { document: 1, .. })
    ));
}

#[test]
fn test_non_pdf_document_uses_archive_rendition() {
    let library = Library::new();
    let mut record = library.add(3, 2);
    record.archive_path = Some(record.source_path.clone());
    record.source_path = library.dir.path().join("scan.tiff");
    record.mime_type = "image/tiff".to_string();
    library.store.insert(record);
    let dispatcher = RecordingDispatcher::new();

    let plan = Plan::from_json(r#"[[{"document": 3, "pages": "2"}]]"#).unwrap();
    let outcome = executor(&library, &dispatcher)
        .execute(&plan, &ExecutionOptions::new(&library.scratch))
        .unwrap();

    assert_eq!(page_markers(&outcome.targets[0].output_path), vec![(3, 2)]);
}

#[test]
fn test_non_pdf_document_without_archive() {
    let library = Library::new();
    let mut record = library.add(5, 1);
    record.mime_type = "image/png".to_string();
    library.store.insert(record);
    let dispatcher = RecordingDispatcher::new();

    let plan = Plan::from_json(r#"[[{"document": 5}]]"#).unwrap();
    let err = executor(&library, &dispatcher)
        .execute(&plan, &ExecutionOptions::new(&library.scratch))
        .unwrap_err();

    assert_eq!(
        err.as_validation(),
        Some(&PlanValidationError::NoPdfRepresentation { document: 5 })
    );
    assert!(library.store.find_document(5).is_some());
}

#[test]
fn test_unreadable_source_is_not_a_validation_error() {
    let library = Library::new();
    let record = library.add(1, 1);
    std::fs::write(&record.source_path, b"not a pdf").unwrap();
    let dispatcher = RecordingDispatcher::new();

    let plan = Plan::from_json(r#"[[{"document": 1}]]"#).unwrap();
    let err = executor(&library, &dispatcher)
        .execute(&plan, &ExecutionOptions::new(&library.scratch))
        .unwrap_err();

    assert!(!err.is_validation());
    assert_eq!(err.exit_code(), 3);
}
