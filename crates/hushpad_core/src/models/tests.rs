//! Model-level unit tests.

use super::document::*;
use crate::constants::{MAX_TITLE_CHARS, UNTITLED_TITLE};
use chrono::{TimeZone, Utc};

#[test]
fn document_new_derives_title_and_word_count() {
    let doc = Document::new("\n\n# Morning pages\nthree words here".to_string());

    assert!(!doc.id.is_empty());
    assert_eq!(doc.title, "Morning pages");
    assert_eq!(doc.word_count, 6);
    assert_eq!(doc.created_at, doc.updated_at);
}

#[test]
fn derive_title_strips_block_markers() {
    let cases = [
        ("## Heading two", "Heading two"),
        ("> quoted line", "quoted line"),
        ("- list item", "list item"),
        ("   \n  * starred", "starred"),
        ("plain text\nsecond", "plain text"),
    ];
    for (content, expected) in cases {
        assert_eq!(derive_title(content), expected, "content: {:?}", content);
    }
}

#[test]
fn derive_title_falls_back_for_blank_content() {
    assert_eq!(derive_title(""), UNTITLED_TITLE);
    assert_eq!(derive_title("  \n\t\n#  \n"), UNTITLED_TITLE);
}

#[test]
fn derive_title_truncates_on_char_boundary() {
    let long = "é".repeat(MAX_TITLE_CHARS + 10);
    let title = derive_title(&long);
    assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
}

#[test]
fn apply_patch_keeps_title_consistent_with_content() {
    let mut doc = Document::new("Draft".to_string());
    let stamp = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).single().expect("stamp");

    doc.apply_patch(&DocumentPatch {
        content: Some("Final title\nbody text".to_string()),
        title: None,
        updated_at: Some(stamp),
    });

    assert_eq!(doc.title, "Final title");
    assert_eq!(doc.word_count, 4);
    assert_eq!(doc.updated_at, stamp);
}

#[test]
fn apply_patch_prefers_explicit_title() {
    let mut doc = Document::new("Draft".to_string());
    doc.apply_patch(&DocumentPatch {
        content: Some("body".to_string()),
        title: Some("Pinned".to_string()),
        updated_at: None,
    });
    assert_eq!(doc.title, "Pinned");
    assert_eq!(doc.content, "body");
}

#[test]
fn content_patch_carries_derived_title() {
    let mut doc = Document::new(String::new());
    doc.content = "Fresh start\nmore".to_string();
    let stamp = Utc::now();

    let patch = doc.content_patch(stamp);
    assert_eq!(patch.content.as_deref(), Some("Fresh start\nmore"));
    assert_eq!(patch.title.as_deref(), Some("Fresh start"));
    assert_eq!(patch.updated_at, Some(stamp));
}

#[test]
fn summary_mirrors_document_fields() {
    let doc = Document::new("Summary source words".to_string());
    let summary = DocumentSummary::from(&doc);
    assert_eq!(summary.id, doc.id);
    assert_eq!(summary.title, "Summary source words");
    assert_eq!(summary.word_count, 3);
    assert_eq!(summary.updated_at, doc.updated_at);
}
