use super::*;
use crate::backend::spawn_backend;
use hushpad_core::{DocumentStore, MemoryStore};

const AUTOSAVE: Duration = Duration::from_millis(1_000);

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

struct Scripted {
    persistence: EditPersistence,
    cmd_rx: Receiver<StoreCmd>,
    evt_tx: Sender<StoreEvent>,
}

fn scripted(flush_timeout: Duration) -> Scripted {
    let (cmd_tx, cmd_rx) = unbounded();
    let (evt_tx, evt_rx) = unbounded();
    let backend = BackendHandle::from_test_channels(cmd_tx, evt_rx);
    Scripted {
        persistence: EditPersistence::new(backend, AUTOSAVE, flush_timeout),
        cmd_rx,
        evt_tx,
    }
}

fn take_save(cmd_rx: &Receiver<StoreCmd>) -> (String, String, u64) {
    match cmd_rx.try_recv().expect("save command") {
        StoreCmd::SaveDocument {
            id,
            patch,
            revision,
        } => (id, patch.content.expect("content"), revision),
        other => panic!("unexpected command: {:?}", other),
    }
}

fn ack(document: &Document, content: &str, revision: u64) -> StoreEvent {
    let mut saved = document.clone();
    saved.content = content.to_string();
    saved.title = derive_title(content);
    saved.word_count = count_words(content);
    StoreEvent::DocumentSaved {
        document: saved,
        revision,
    }
}

#[test]
fn burst_of_edits_coalesces_into_one_write() {
    let mut s = scripted(ms(100));
    let start = Instant::now();
    s.persistence.open(Document::new(String::new()));

    let mut text = String::new();
    for i in 0..10u64 {
        text.push_str("word ");
        let now = start + ms(i * 100);
        s.persistence.on_content_changed(text.clone(), now);
        s.persistence.poll(now);
        assert_eq!(s.persistence.status(), SaveStatus::Unsaved);
    }
    assert!(s.cmd_rx.try_recv().is_err(), "nothing written mid-burst");

    s.persistence.poll(start + ms(900 + 999));
    assert!(s.cmd_rx.try_recv().is_err(), "quiet period not over");

    s.persistence.poll(start + ms(900 + 1_000));
    let (_, content, revision) = take_save(&s.cmd_rx);
    assert_eq!(content, text);
    assert_eq!(revision, 10);
    assert!(s.cmd_rx.try_recv().is_err(), "exactly one write");
    assert_eq!(s.persistence.status(), SaveStatus::Saving);
    assert_eq!(s.persistence.writes_dispatched(), 1);
}

#[test]
fn edits_refresh_title_and_word_count_optimistically() {
    let mut s = scripted(ms(100));
    s.persistence.open(Document::new("old".to_string()));
    s.persistence
        .on_content_changed("# Fresh title\nthree more words".to_string(), Instant::now());
    let doc = s.persistence.document().expect("active");
    assert_eq!(doc.title, "Fresh title");
    assert_eq!(doc.word_count, 6);
}

#[test]
fn identical_content_does_not_dirty() {
    let mut s = scripted(ms(100));
    s.persistence.open(Document::new("same".to_string()));
    s.persistence
        .on_content_changed("same".to_string(), Instant::now());
    assert_eq!(s.persistence.status(), SaveStatus::Saved);
    assert_eq!(s.persistence.revision(), 0);
}

#[test]
fn ack_for_latest_revision_marks_saved() {
    let mut s = scripted(ms(100));
    let start = Instant::now();
    let document = Document::new(String::new());
    s.persistence.open(document.clone());
    s.persistence.on_content_changed("hello".to_string(), start);
    s.persistence.poll(start + AUTOSAVE);
    let (_, content, revision) = take_save(&s.cmd_rx);

    s.evt_tx.send(ack(&document, &content, revision)).expect("ack");
    s.persistence.poll(start + AUTOSAVE + ms(10));
    assert_eq!(s.persistence.status(), SaveStatus::Saved);
    assert_eq!(s.persistence.documents()[0].title, "hello");
}

#[test]
fn stale_ack_with_newer_edits_stays_unsaved_and_resaves() {
    let mut s = scripted(ms(100));
    let start = Instant::now();
    let document = Document::new(String::new());
    s.persistence.open(document.clone());
    s.persistence.on_content_changed("one".to_string(), start);
    s.persistence.poll(start + AUTOSAVE);
    let (_, first, first_revision) = take_save(&s.cmd_rx);

    let edit_at = start + AUTOSAVE + ms(50);
    s.persistence.on_content_changed("one two".to_string(), edit_at);
    assert_eq!(s.persistence.status(), SaveStatus::Saving);

    s.evt_tx
        .send(ack(&document, &first, first_revision))
        .expect("ack");
    s.persistence.poll(edit_at + ms(10));
    assert_eq!(s.persistence.status(), SaveStatus::Unsaved);
    assert!(s.cmd_rx.try_recv().is_err());

    s.persistence.poll(edit_at + AUTOSAVE);
    let (_, second, second_revision) = take_save(&s.cmd_rx);
    assert_eq!(second, "one two");
    assert!(second_revision > first_revision);
}

#[test]
fn failed_save_is_unsaved_and_not_retried_until_next_edit() {
    let mut s = scripted(ms(100));
    let start = Instant::now();
    s.persistence.open(Document::new(String::new()));
    s.persistence.on_content_changed("draft".to_string(), start);
    s.persistence.poll(start + AUTOSAVE);
    let (id, _, revision) = take_save(&s.cmd_rx);

    s.evt_tx
        .send(StoreEvent::SaveFailed {
            id,
            revision,
            message: "Save failed: disk full".to_string(),
        })
        .expect("error");
    s.persistence.poll(start + AUTOSAVE + ms(1));
    assert_eq!(s.persistence.status(), SaveStatus::Unsaved);
    assert_eq!(s.persistence.last_error(), Some("Save failed: disk full"));
    assert!(!s.persistence.is_save_in_flight());

    s.persistence.poll(start + AUTOSAVE * 10);
    assert!(s.cmd_rx.try_recv().is_err(), "no automatic retry");

    let retry_at = start + AUTOSAVE * 11;
    s.persistence.on_content_changed("draft two".to_string(), retry_at);
    s.persistence.poll(retry_at + AUTOSAVE);
    let (_, content, _) = take_save(&s.cmd_rx);
    assert_eq!(content, "draft two");
}

#[test]
fn failure_of_a_different_save_is_ignored() {
    let mut s = scripted(ms(100));
    let start = Instant::now();
    s.persistence.open(Document::new(String::new()));
    s.persistence.on_content_changed("draft".to_string(), start);
    s.persistence.poll(start + AUTOSAVE);
    let (id, _, revision) = take_save(&s.cmd_rx);

    s.evt_tx
        .send(StoreEvent::SaveFailed {
            id: id.clone(),
            revision: revision + 5,
            message: "Save failed: old revision".to_string(),
        })
        .expect("stale revision");
    s.evt_tx
        .send(StoreEvent::SaveFailed {
            id: "some-other-document".to_string(),
            revision,
            message: "Save failed: other document".to_string(),
        })
        .expect("other document");
    s.persistence.poll(start + AUTOSAVE);
    assert_eq!(s.persistence.status(), SaveStatus::Saving);
    assert!(s.persistence.is_save_in_flight());
    assert!(s.persistence.last_error().is_none());
}

#[test]
fn status_subscribers_see_every_transition() {
    let mut s = scripted(ms(100));
    let start = Instant::now();
    let rx = s.persistence.subscribe_status();
    let document = Document::new(String::new());
    s.persistence.open(document.clone());
    s.persistence.on_content_changed("a".to_string(), start);
    s.persistence.on_content_changed("ab".to_string(), start + ms(5));
    s.persistence.poll(start + ms(5) + AUTOSAVE);
    let (_, content, revision) = take_save(&s.cmd_rx);
    s.evt_tx.send(ack(&document, &content, revision)).expect("ack");
    s.persistence.poll(start + ms(5) + AUTOSAVE);

    let seen: Vec<SaveStatus> = rx.try_iter().collect();
    assert_eq!(
        seen,
        vec![SaveStatus::Unsaved, SaveStatus::Saving, SaveStatus::Saved]
    );
}

#[test]
fn missing_document_during_save_reports_error() {
    let mut s = scripted(ms(100));
    let start = Instant::now();
    let document = Document::new(String::new());
    let id = document.id.clone();
    s.persistence.open(document);
    s.persistence.on_content_changed("x".to_string(), start);
    s.persistence.poll(start + AUTOSAVE);
    take_save(&s.cmd_rx);

    s.evt_tx
        .send(StoreEvent::DocumentMissing { id: id.clone() })
        .expect("missing");
    s.persistence.poll(start + AUTOSAVE);
    assert_eq!(s.persistence.status(), SaveStatus::Unsaved);
    assert!(s
        .persistence
        .last_error()
        .is_some_and(|message| message.contains("no longer exists")));
    assert!(s.persistence.documents().iter().all(|item| item.id != id));
}

#[test]
fn document_deleted_elsewhere_stops_saving_and_fails_flush() {
    let mut s = scripted(ms(100));
    let start = Instant::now();
    let document = Document::new(String::new());
    let id = document.id.clone();
    s.persistence.open(document);
    s.persistence.on_content_changed("x".to_string(), start);
    s.persistence.poll(start + AUTOSAVE);
    take_save(&s.cmd_rx);
    s.evt_tx
        .send(StoreEvent::DocumentMissing { id: id.clone() })
        .expect("missing");
    s.persistence.poll(start + AUTOSAVE);
    assert!(s.persistence.is_active_missing());

    s.persistence
        .on_content_changed("xy".to_string(), start + AUTOSAVE * 2);
    s.persistence.poll(start + AUTOSAVE * 10);
    assert!(s.cmd_rx.try_recv().is_err(), "no saves into a deleted row");
    assert_eq!(s.persistence.status(), SaveStatus::Unsaved);

    let err = s.persistence.flush_now().expect_err("row is gone");
    assert_eq!(err, PersistenceError::DocumentMissing(id));
    assert!(s.cmd_rx.try_recv().is_err());

    s.persistence.open(Document::new("next".to_string()));
    assert!(!s.persistence.is_active_missing());
}

#[test]
fn load_events_only_open_the_pending_request() {
    let mut s = scripted(ms(100));
    let wanted = Document::new("wanted".to_string());
    let stale = Document::new("stale".to_string());

    s.persistence.request_open(&wanted.id);
    s.evt_tx
        .send(StoreEvent::DocumentLoaded { document: stale })
        .expect("stale");
    s.evt_tx
        .send(StoreEvent::DocumentLoaded {
            document: wanted.clone(),
        })
        .expect("wanted");
    s.persistence.poll(Instant::now());

    assert_eq!(s.persistence.active_id(), Some(wanted.id.as_str()));
    assert_eq!(s.persistence.take_opened().map(|d| d.id), Some(wanted.id));
    assert!(s.persistence.take_opened().is_none());
    assert!(!s.persistence.is_open_pending());
}

#[test]
fn deleting_active_document_closes_it() {
    let mut s = scripted(ms(100));
    let document = Document::new("bye".to_string());
    s.persistence.open(document.clone());
    s.persistence.on_content_changed("bye now".to_string(), Instant::now());
    s.evt_tx
        .send(StoreEvent::DocumentDeleted {
            id: document.id.clone(),
        })
        .expect("deleted");
    s.persistence.poll(Instant::now());
    assert!(s.persistence.document().is_none());
    assert_eq!(s.persistence.status(), SaveStatus::Saved);
    assert!(s.persistence.documents().is_empty());
}

#[test]
fn flush_now_writes_through_real_worker() {
    let store = MemoryStore::new();
    let document = Document::new(String::new());
    store.create(&document).expect("create");
    let mut persistence = EditPersistence::new(spawn_backend(store.clone()), AUTOSAVE, ms(2_000));
    persistence.open(document.clone());

    persistence.on_content_changed("flushed text".to_string(), Instant::now());
    persistence.flush_now().expect("flush");
    assert_eq!(persistence.status(), SaveStatus::Saved);
    assert_eq!(
        store.get(&document.id).expect("get").expect("row").content,
        "flushed text"
    );
    assert_eq!(store.put_count(), 1);
}

#[test]
fn flush_now_with_clean_document_is_a_no_op() {
    let mut s = scripted(ms(100));
    s.persistence.open(Document::new("clean".to_string()));
    s.persistence.flush_now().expect("nothing to flush");
    assert!(s.cmd_rx.try_recv().is_err());
}

#[test]
fn flush_now_surfaces_store_failure() {
    let store = MemoryStore::new();
    let document = Document::new(String::new());
    store.create(&document).expect("create");
    store.set_fail_writes(true);
    let mut persistence = EditPersistence::new(spawn_backend(store.clone()), AUTOSAVE, ms(2_000));
    persistence.open(document);

    persistence.on_content_changed("doomed".to_string(), Instant::now());
    let err = persistence.flush_now().expect_err("store rejects writes");
    assert!(matches!(err, PersistenceError::SaveFailed(message) if message.contains("Save failed")));
    assert_eq!(persistence.status(), SaveStatus::Unsaved);
}

#[test]
fn flush_now_times_out_without_ack() {
    let mut s = scripted(ms(60));
    s.persistence.open(Document::new(String::new()));
    s.persistence
        .on_content_changed("waiting".to_string(), Instant::now());
    let err = s.persistence.flush_now().expect_err("no ack");
    assert_eq!(err, PersistenceError::Timeout(ms(60)));
    assert_eq!(s.persistence.status(), SaveStatus::Saving);
    assert!(s.persistence.is_save_in_flight());
}

#[test]
fn flush_now_reports_missing_worker() {
    let mut s = scripted(ms(100));
    s.persistence.open(Document::new(String::new()));
    s.persistence
        .on_content_changed("orphaned".to_string(), Instant::now());
    drop(s.cmd_rx);
    let err = s.persistence.flush_now().expect_err("worker gone");
    assert_eq!(err, PersistenceError::BackendUnavailable);
    assert_eq!(s.persistence.status(), SaveStatus::Unsaved);
}

#[test]
fn worker_disconnect_during_save_returns_to_unsaved() {
    let Scripted {
        mut persistence,
        cmd_rx,
        evt_tx,
    } = scripted(ms(100));
    let start = Instant::now();
    persistence.open(Document::new(String::new()));
    persistence.on_content_changed("Hello".to_string(), start);
    persistence.poll(start + AUTOSAVE);
    take_save(&cmd_rx);
    assert_eq!(persistence.status(), SaveStatus::Saving);

    drop(evt_tx);
    persistence.poll(start + AUTOSAVE + ms(16));
    assert_eq!(persistence.status(), SaveStatus::Unsaved);
    assert!(!persistence.is_save_in_flight());
    assert!(persistence.is_backend_lost());
    assert!(persistence
        .last_error()
        .is_some_and(|message| message.contains("unavailable")));

    let mut now = start + AUTOSAVE * 2;
    for i in 0..20u64 {
        persistence.on_content_changed(format!("Hello {}", i), now);
        now += AUTOSAVE * 2;
        persistence.poll(now);
        assert_ne!(persistence.status(), SaveStatus::Saving);
    }
    assert!(cmd_rx.try_recv().is_err(), "nothing sent to a dead worker");
    assert_eq!(
        persistence.flush_now(),
        Err(PersistenceError::BackendUnavailable)
    );
}
