//! Metadata carried into built targets.

use std::collections::BTreeSet;

use lopdf::{Object, StringFormat, dictionary};
use splitmerge::{ExecutionOptions, MetadataPolicy, Plan, SplitMergeExecutor};

use crate::common::{Library, PdfSpec, RecordingDispatcher};

/// Documents 1 and 2, both classified differently.
fn classified_library() -> Library {
    let library = Library::new();

    let mut first = library.add_spec(
        1,
        &PdfSpec::new(1, 2).info(dictionary! {
            "Title" => Object::String(b"Lease agreement".to_vec(), StringFormat::Literal),
            "Author" => Object::String(b"Landlord".to_vec(), StringFormat::Literal),
            "Custom" => vec![Object::Integer(1)],
        }),
    );
    first.correspondent = Some(11);
    first.document_type = Some(3);
    first.tags = vec![5, 2];
    library.store.insert(first);

    let mut second = library.add(2, 2);
    second.correspondent = Some(99);
    second.tags = vec![42];
    library.store.insert(second);

    library
}

fn run(library: &Library, policy: MetadataPolicy, raw_plan: &str) -> splitmerge::ExecutionOutcome {
    let mut options = ExecutionOptions::new(&library.scratch);
    options.metadata = policy;
    SplitMergeExecutor::new(library.store.clone(), RecordingDispatcher::new())
        .execute(&Plan::from_json(raw_plan).unwrap(), &options)
        .unwrap()
}

#[test]
fn test_redo_sets_only_title_and_date() {
    let library = classified_library();
    let outcome = run(
        &library,
        MetadataPolicy::Redo,
        r#"[[{"document": 1}, {"document": 2}]]"#,
    );

    let overrides = &outcome.targets[0].overrides;
    assert_eq!(overrides.title.as_deref(), Some("Document 1"));
    assert_eq!(overrides.created, Some("2020-01-01T08:00:00Z".parse().unwrap()));
    assert_eq!(overrides.correspondent, None);
    assert_eq!(overrides.document_type, None);
    assert_eq!(overrides.tags, None);
}

#[test]
fn test_copy_first_takes_fields_of_first_source() {
    let library = classified_library();
    let outcome = run(
        &library,
        MetadataPolicy::CopyFirst,
        r#"[[{"document": 1}, {"document": 2}], [{"document": 2}, {"document": 1}]]"#,
    );

    let first = &outcome.targets[0].overrides;
    assert_eq!(first.correspondent, Some(11));
    assert_eq!(first.document_type, Some(3));
    assert_eq!(first.tags, Some(BTreeSet::from([2, 5])));
    assert_eq!(first.created, Some("2020-01-01T08:00:00Z".parse().unwrap()));

    let second = &outcome.targets[1].overrides;
    assert_eq!(second.title.as_deref(), Some("Document 2"));
    assert_eq!(second.correspondent, Some(99));
    assert_eq!(second.document_type, None);
    assert_eq!(second.tags, Some(BTreeSet::from([42])));
    assert_eq!(second.created, Some("2020-01-02T08:00:00Z".parse().unwrap()));
}

#[test]
fn test_pdf_properties_of_first_source_are_written() {
    let library = classified_library();
    let outcome = run(
        &library,
        MetadataPolicy::Redo,
        r#"[[{"document": 1, "pages": "2"}, {"document": 2}]]"#,
    );

    let target = &outcome.targets[0];
    assert_eq!(target.warnings.len(), 1);
    assert!(target.warnings[0].contains("Custom"));

    let written = lopdf::Document::load(&target.output_path).unwrap();
    let info_id = written.trailer.get(b"Info").unwrap().as_reference().unwrap();
    let info = written.get_dictionary(info_id).unwrap();
    assert_eq!(info.get(b"Title").unwrap().as_str().unwrap(), b"Lease agreement");
    assert_eq!(info.get(b"Author").unwrap().as_str().unwrap(), b"Landlord");
    assert!(!info.has(b"Custom"));
}

#[test]
fn test_properties_of_later_sources_are_ignored() {
    let library = classified_library();
    let outcome = run(
        &library,
        MetadataPolicy::CopyFirst,
        r#"[[{"document": 2}, {"document": 1}]]"#,
    );

    let target = &outcome.targets[0];
    assert!(target.warnings.is_empty());
    let written = lopdf::Document::load(&target.output_path).unwrap();
    assert!(!written.trailer.has(b"Info"));
}
