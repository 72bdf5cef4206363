//! End-to-end editing sessions against the redb store.

use hushpad_core::models::document::Document;
use hushpad_core::{Database, DocumentStore};
use hushpad_editor::surface::SurfaceLifecycle;
use hushpad_editor::{
    spawn_backend, EditorSession, HeadlessSurface, SaveStatus, SessionOptions, TypewriterConfig,
};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(2);

fn options() -> SessionOptions {
    SessionOptions {
        selection_throttle: Duration::from_millis(50),
        auto_save_delay: Duration::from_millis(1_000),
        save_flush_timeout: WAIT,
        focus_dim_opacity: 0.3,
        typewriter: TypewriterConfig::default(),
        focus_mode: true,
        typewriter_mode: true,
    }
}

fn setup_db() -> (Database, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let db = Database::new(dir.path().join("db").to_str().expect("db path")).expect("db");
    (db, dir)
}

#[test]
fn writing_session_persists_to_disk_and_survives_reopen() {
    let (db, dir) = setup_db();
    let reader = db.share();
    let document = Document::new("# Morning pages\n".to_string());
    db.create(&document).expect("seed");

    let mut session = EditorSession::new(HeadlessSurface::default(), spawn_backend(db), options());
    session.open_document(&document.id).expect("open");
    session.wait_for_document(WAIT).expect("mounted");

    let start = Instant::now();
    let mut now = start;
    for ch in "Today I wrote **a lot**.\nThen more.".chars() {
        now += Duration::from_millis(40);
        let events = session
            .surface_mut()
            .insert_text(&ch.to_string())
            .expect("type");
        session.handle_events(events, now);
        session.on_frame(now);
    }
    // Caret sits in the last block, which is the only undimmed one.
    let surface = session.surface();
    assert_eq!(surface.block_count(), 3);
    assert_eq!(surface.block_opacity(2), 1.0);
    assert_eq!(surface.block_opacity(1), 0.3);
    assert_eq!(session.save_status(), SaveStatus::Unsaved);

    session.shutdown(WAIT).expect("shutdown");
    let stored = reader.get(&document.id).expect("get").expect("row");
    assert_eq!(stored.content, "# Morning pages\nToday I wrote **a lot**.\nThen more.");
    assert_eq!(stored.title, "Morning pages");
    assert_eq!(stored.word_count, 10);
    drop(session);
    drop(reader);

    let reopened = Database::new(dir.path().join("db").to_str().expect("db path")).expect("reopen");
    let listed = reopened.list_all().expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, document.id);
}

#[test]
fn documents_can_be_created_listed_and_deleted_through_a_session() {
    let (db, _dir) = setup_db();
    let reader = db.share();
    let mut session = EditorSession::new(HeadlessSurface::default(), spawn_backend(db), options());

    session.create_document("first draft").expect("create");
    session.wait_for_document(WAIT).expect("mounted");
    let first_id = session.active_document().expect("active").id.clone();

    session.create_document("second draft").expect("create");
    session.wait_for_document(WAIT).expect("mounted");
    let second_id = session.active_document().expect("active").id.clone();
    assert_eq!(session.surface().mounted_document(), Some(second_id.as_str()));

    let ids: Vec<String> = session
        .persistence()
        .documents()
        .iter()
        .map(|item| item.id.clone())
        .collect();
    assert_eq!(ids, vec![second_id.clone(), first_id.clone()]);

    session.persistence_mut().request_delete(&first_id);
    let deadline = Instant::now() + WAIT;
    while session.persistence().documents().len() != 1 {
        assert!(Instant::now() < deadline, "delete never acknowledged");
        session.on_frame(Instant::now());
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(reader.get(&first_id).expect("get").is_none());
    assert_eq!(session.active_document().map(|d| d.id.as_str()), Some(second_id.as_str()));
}
