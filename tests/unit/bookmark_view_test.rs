//! Unit tests for the mounted bookmark view.
//!
//! Most tests drive the view against `ScriptedStore`, an in-memory store whose
//! answers, failures and timing are controlled by the test. The cross-session
//! tests at the bottom use the real SQLite store publishing on a shared feed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::timeout;

use linkshelf::database::Database;
use linkshelf::managers::bookmark_view::{BookmarkView, ViewHandle};
use linkshelf::services::bookmark_store::{BookmarkStore, SqliteStore};
use linkshelf::services::change_feed::ChangeFeed;
use linkshelf::services::identity::StaticIdentity;
use linkshelf::types::bookmark::{Bookmark, BookmarkDraft};
use linkshelf::types::errors::{BookmarkError, SessionError, StoreError};
use linkshelf::types::session::UserIdentity;
use linkshelf::types::settings::ViewSettings;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct ScriptedStore {
    rows: Mutex<Vec<Bookmark>>,
    next_created: Mutex<VecDeque<Bookmark>>,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
    fail_list: AtomicBool,
    create_gate: Mutex<()>,
    delete_gate: Mutex<()>,
    list_gate: Mutex<()>,
    create_calls: AtomicUsize,
    list_reads: AtomicUsize,
}

impl ScriptedStore {
    fn with_rows(rows: Vec<Bookmark>) -> Self {
        let store = Self::default();
        *store.rows.lock().unwrap() = rows;
        store
    }

    fn script_create(&self, bookmark: Bookmark) {
        self.next_created.lock().unwrap().push_back(bookmark);
    }
}

impl BookmarkStore for ScriptedStore {
    fn create(&self, owner: &str, draft: &BookmarkDraft) -> Result<Bookmark, StoreError> {
        let _gate = self.create_gate.lock().unwrap();
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("create refused".to_string()));
        }
        let mut bookmark = self
            .next_created
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| StoreError::Unavailable("nothing scripted".to_string()))?;
        bookmark.owner = owner.to_string();
        bookmark.title = draft.title.clone();
        bookmark.target = draft.target.clone();
        bookmark.note = draft.note.clone();
        self.rows.lock().unwrap().push(bookmark.clone());
        Ok(bookmark)
    }

    fn delete(&self, owner: &str, id: &str) -> Result<(), StoreError> {
        let _gate = self.delete_gate.lock().unwrap();
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("delete refused".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|b| !(b.id == id && b.owner == owner));
        if rows.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<Bookmark>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("list refused".to_string()));
        }
        // Oldest first on purpose; the view must sort.
        let mut rows: Vec<Bookmark> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.owner == owner)
            .cloned()
            .collect();
        rows.sort_by_key(|b| b.created_at);
        self.list_reads.fetch_add(1, Ordering::SeqCst);
        // Rows were read above, so a held gate returns a stale answer.
        let _gate = self.list_gate.lock().unwrap();
        Ok(rows)
    }
}

fn bookmark(id: &str, created_at: i64) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        owner: "u1".to_string(),
        title: format!("Title {}", id),
        target: "example.com".to_string(),
        note: String::new(),
        created_at,
    }
}

fn identity(user: &str) -> StaticIdentity {
    StaticIdentity::signed_in(UserIdentity::new(user, format!("{}@example.com", user)))
}

fn mount(store: Arc<dyn BookmarkStore>, feed: &ChangeFeed, initial: Vec<Bookmark>) -> ViewHandle {
    BookmarkView::mount(&identity("u1"), store, feed, &ViewSettings::default(), initial)
        .expect("mount should succeed for a signed-in user")
}

fn ids(list: &[Bookmark]) -> Vec<&str> {
    list.iter().map(|b| b.id.as_str()).collect()
}

/// Waits until the view's list satisfies `pred`.
async fn wait_for(view: &ViewHandle, what: &str, pred: impl Fn(&[Bookmark]) -> bool) {
    let mut changes = view.subscribe_changes();
    let waited = timeout(WAIT, async {
        loop {
            if pred(&changes.borrow_and_update()) {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {}", what);
}

async fn wait_for_list_reads(store: &ScriptedStore, reads: usize) {
    let waited = timeout(WAIT, async {
        while store.list_reads.load(Ordering::SeqCst) < reads {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "reload never read the store");
}

async fn wait_until_submitting(view: &ViewHandle) {
    let waited = timeout(WAIT, async {
        while !view.status().await.unwrap().submitting {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "create never reached the store");
}

// ─── Mount / unmount ───

#[tokio::test]
async fn test_mount_without_user_is_rejected_and_acquires_nothing() {
    let feed = ChangeFeed::new(16);
    let store: Arc<dyn BookmarkStore> = Arc::new(ScriptedStore::default());

    let result = BookmarkView::mount(
        &StaticIdentity::signed_out(),
        store,
        &feed,
        &ViewSettings::default(),
        Vec::new(),
    );

    assert!(matches!(result, Err(SessionError::NotAuthenticated)));
    assert_eq!(feed.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_unmount_releases_subscription() {
    let feed = ChangeFeed::new(16);
    let view = mount(Arc::new(ScriptedStore::default()), &feed, Vec::new());
    assert_eq!(feed.active_subscriptions(), 1);
    assert_eq!(view.user().id, "u1");

    view.unmount().await;
    assert_eq!(feed.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_dropping_handle_releases_subscription() {
    let feed = ChangeFeed::new(16);
    let view = mount(Arc::new(ScriptedStore::default()), &feed, Vec::new());
    drop(view);

    let released = timeout(WAIT, async {
        while feed.active_subscriptions() != 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "subscription still held after handle was dropped");
}

#[tokio::test]
async fn test_mount_always_resyncs_over_initial_snapshot() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::with_rows(vec![bookmark("fresh", 200)]));

    let view = mount(store, &feed, vec![bookmark("stale", 100)]);
    wait_for(&view, "initial resync", |list| ids(list) == vec!["fresh"]).await;
    view.unmount().await;
}

#[tokio::test]
async fn test_initial_snapshot_is_filtered_to_user() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::default());
    store.fail_list.store(true, Ordering::SeqCst);

    let mut foreign = bookmark("x", 300);
    foreign.owner = "u2".to_string();
    let view = mount(store, &feed, vec![bookmark("a", 100), foreign, bookmark("b", 200)]);

    assert_eq!(ids(&view.snapshot()), vec!["b", "a"]);
    view.unmount().await;
}

// ─── Create ───

#[tokio::test]
async fn test_create_success_scenario() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::default());
    store.script_create(bookmark("1", 1_700_000_000_000));
    let view = mount(store, &feed, Vec::new());
    assert_eq!(view.refresh().await, Ok(0));

    let created = view
        .create(BookmarkDraft::new("Docs", "example.com", ""))
        .await
        .unwrap();

    assert_eq!(created.id, "1");
    assert_eq!(created.owner, "u1");
    assert_eq!(created.title, "Docs");
    assert_eq!(view.snapshot(), vec![created]);
    view.unmount().await;
}

#[tokio::test]
async fn test_create_trims_input() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::default());
    store.script_create(bookmark("1", 10));
    let view = mount(store, &feed, Vec::new());
    view.refresh().await.unwrap();

    let created = view
        .create(BookmarkDraft::new("  Docs ", " example.com\n", "  note "))
        .await
        .unwrap();

    assert_eq!(created.title, "Docs");
    assert_eq!(created.target, "example.com");
    assert_eq!(created.note, "note");
    view.unmount().await;
}

#[tokio::test]
async fn test_blank_fields_never_reach_the_store() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::default());
    let view = mount(store.clone(), &feed, Vec::new());

    for draft in [
        BookmarkDraft::new("   ", "example.com", ""),
        BookmarkDraft::new("Docs", "", "note"),
    ] {
        assert!(matches!(view.create(draft).await, Err(BookmarkError::Validation(_))));
    }

    assert_eq!(store.create_calls.load(Ordering::SeqCst), 0);
    assert!(view.snapshot().is_empty());
    view.unmount().await;
}

#[tokio::test]
async fn test_create_failure_leaves_list_untouched() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::with_rows(vec![bookmark("a", 100)]));
    store.fail_create.store(true, Ordering::SeqCst);
    let view = mount(store, &feed, Vec::new());
    view.refresh().await.unwrap();

    let result = view.create(BookmarkDraft::new("Docs", "example.com", "")).await;

    assert!(matches!(result, Err(BookmarkError::CreateFailed(_))));
    assert_eq!(ids(&view.snapshot()), vec!["a"]);
    assert!(!view.status().await.unwrap().submitting);
    view.unmount().await;
}

#[tokio::test]
async fn test_second_create_rejected_while_first_in_flight() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::default());
    store.script_create(bookmark("1", 10));
    let view = Arc::new(mount(store.clone(), &feed, Vec::new()));
    view.refresh().await.unwrap();

    let gate = store.create_gate.lock().unwrap();
    let first = {
        let view = view.clone();
        tokio::spawn(async move { view.create(BookmarkDraft::new("One", "one.example", "")).await })
    };
    wait_until_submitting(&view).await;

    let second = view.create(BookmarkDraft::new("Two", "two.example", "")).await;
    assert_eq!(second, Err(BookmarkError::CreateInFlight));

    drop(gate);
    let first = first.await.unwrap().unwrap();
    assert_eq!(view.snapshot(), vec![first]);
    assert!(!view.status().await.unwrap().submitting);
}

/// Push delivers the new bookmark while the create request is still
/// outstanding; the confirmation that follows must not add a second copy.
#[tokio::test]
async fn test_duplicate_arrival_push_first() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::default());
    let record = bookmark("2", 2_000);
    store.script_create(record.clone());
    let view = Arc::new(mount(store.clone(), &feed, Vec::new()));
    view.refresh().await.unwrap();

    let gate = store.create_gate.lock().unwrap();
    let pending = {
        let view = view.clone();
        tokio::spawn(async move { view.create(BookmarkDraft::new("Title 2", "example.com", "")).await })
    };
    wait_until_submitting(&view).await;

    feed.publish_created(&record);
    wait_for(&view, "pushed create", |list| list.len() == 1).await;

    drop(gate);
    let confirmed = pending.await.unwrap().unwrap();
    assert_eq!(confirmed.id, "2");
    assert_eq!(view.snapshot(), vec![record]);
}

#[tokio::test]
async fn test_duplicate_arrival_confirmation_first() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::default());
    store.script_create(bookmark("2", 2_000));
    let view = mount(store, &feed, Vec::new());
    view.refresh().await.unwrap();

    let created = view
        .create(BookmarkDraft::new("Title 2", "example.com", ""))
        .await
        .unwrap();
    feed.publish_created(&created);
    feed.publish_created(&created);
    feed.publish_created(&bookmark("marker", 3_000));

    wait_for(&view, "marker", |list| list.iter().any(|b| b.id == "marker")).await;
    assert_eq!(ids(&view.snapshot()), vec!["marker", "2"]);
    view.unmount().await;
}

// ─── Delete ───

#[tokio::test]
async fn test_delete_success() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::with_rows(vec![bookmark("a", 100), bookmark("b", 200)]));
    let view = mount(store.clone(), &feed, Vec::new());
    view.refresh().await.unwrap();

    view.delete("a").await.unwrap();
    assert_eq!(ids(&view.snapshot()), vec!["b"]);
    assert_eq!(ids(&store.list_by_owner("u1").unwrap()), vec!["b"]);

    // The push echo for the same delete is harmless.
    feed.publish_deleted("u1", "a");
    feed.publish_created(&bookmark("marker", 300));
    wait_for(&view, "marker", |list| list.len() == 2).await;
    assert_eq!(ids(&view.snapshot()), vec!["marker", "b"]);
    view.unmount().await;
}

#[tokio::test]
async fn test_delete_rollback_scenario() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::with_rows(vec![bookmark("3", 300)]));
    store.fail_delete.store(true, Ordering::SeqCst);
    let view = Arc::new(mount(store.clone(), &feed, Vec::new()));
    view.refresh().await.unwrap();
    assert_eq!(ids(&view.snapshot()), vec!["3"]);

    let gate = store.delete_gate.lock().unwrap();
    let pending = {
        let view = view.clone();
        tokio::spawn(async move { view.delete("3").await })
    };

    wait_for(&view, "optimistic removal", |list| list.is_empty()).await;
    assert_eq!(view.status().await.unwrap().deleting, vec!["3".to_string()]);
    assert_eq!(
        view.delete("3").await,
        Err(BookmarkError::DeleteInFlight("3".to_string()))
    );

    drop(gate);
    let result = pending.await.unwrap();
    assert!(matches!(result, Err(BookmarkError::DeleteFailed(_))));
    assert_eq!(ids(&view.snapshot()), vec!["3"]);
    assert!(view.status().await.unwrap().deleting.is_empty());
}

#[tokio::test]
async fn test_delete_rollback_when_refresh_also_fails() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::with_rows(vec![bookmark("3", 300), bookmark("4", 400)]));
    let view = mount(store.clone(), &feed, Vec::new());
    view.refresh().await.unwrap();

    store.fail_delete.store(true, Ordering::SeqCst);
    store.fail_list.store(true, Ordering::SeqCst);
    let result = view.delete("3").await;

    assert!(matches!(result, Err(BookmarkError::DeleteFailed(_))));
    assert_eq!(ids(&view.snapshot()), vec!["4"]);
    assert!(view.status().await.unwrap().deleting.is_empty());
    view.unmount().await;
}

#[tokio::test]
async fn test_delete_of_missing_bookmark_succeeds() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::with_rows(vec![bookmark("a", 100)]));
    let view = mount(store.clone(), &feed, Vec::new());
    view.refresh().await.unwrap();
    let reads = store.list_reads.load(Ordering::SeqCst);

    assert_eq!(view.delete("ghost").await, Ok(()));
    assert_eq!(ids(&view.snapshot()), vec!["a"]);
    assert!(view.status().await.unwrap().deleting.is_empty());
    assert_eq!(store.list_reads.load(Ordering::SeqCst), reads, "no rollback reload");
    view.unmount().await;
}

#[tokio::test]
async fn test_delete_after_another_session_deleted_it() {
    let feed = ChangeFeed::new(64);
    let sqlite = Arc::new(SqliteStore::new(Database::open_in_memory().unwrap()));
    let store: Arc<dyn BookmarkStore> = sqlite.clone();
    let view = mount(store, &feed, Vec::new());
    view.refresh().await.unwrap();

    let created = view
        .create(BookmarkDraft::new("Docs", "example.com", ""))
        .await
        .unwrap();
    // Removed elsewhere, and this session never saw the push.
    sqlite.delete("u1", &created.id).unwrap();

    assert_eq!(view.delete(&created.id).await, Ok(()));
    assert!(view.snapshot().is_empty());
    assert!(sqlite.list_by_owner("u1").unwrap().is_empty());
    view.unmount().await;
}

// ─── Refresh / listener ───

#[tokio::test]
async fn test_refresh_failure_keeps_last_known_state() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::with_rows(vec![bookmark("a", 100)]));
    let view = mount(store.clone(), &feed, Vec::new());
    assert_eq!(view.refresh().await, Ok(1));

    store.fail_list.store(true, Ordering::SeqCst);
    assert!(matches!(view.refresh().await, Err(BookmarkError::RefreshFailed(_))));
    assert_eq!(ids(&view.snapshot()), vec!["a"]);
    view.unmount().await;
}

/// The mount reload reads the store, then another session commits `x` and
/// its push is applied before the reload's answer arrives.
#[tokio::test]
async fn test_push_applied_during_reload_survives_stale_result() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::with_rows(vec![bookmark("a", 100)]));
    let gate = store.list_gate.lock().unwrap();
    let view = mount(store.clone(), &feed, Vec::new());
    wait_for_list_reads(&store, 1).await;

    let x = bookmark("x", 200);
    store.rows.lock().unwrap().push(x.clone());
    feed.publish_created(&x);
    wait_for(&view, "pushed create", |list| ids(list) == vec!["x"]).await;

    drop(gate);
    wait_for(&view, "mount reload", |list| list.iter().any(|b| b.id == "a")).await;
    assert_eq!(ids(&view.snapshot()), vec!["x", "a"]);
    view.unmount().await;
}

#[tokio::test]
async fn test_delete_during_reload_is_not_undone() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::with_rows(vec![bookmark("a", 100), bookmark("b", 200)]));
    let view = Arc::new(mount(store.clone(), &feed, Vec::new()));
    view.refresh().await.unwrap();

    let gate = store.list_gate.lock().unwrap();
    let reads = store.list_reads.load(Ordering::SeqCst);
    let pending = {
        let view = view.clone();
        tokio::spawn(async move { view.refresh().await })
    };
    wait_for_list_reads(&store, reads + 1).await;

    view.delete("b").await.unwrap();
    drop(gate);

    assert_eq!(pending.await.unwrap(), Ok(1));
    assert_eq!(ids(&view.snapshot()), vec!["a"]);
}

#[tokio::test]
async fn test_refresh_sorts_store_result() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::with_rows(vec![
        bookmark("a", 100),
        bookmark("c", 300),
        bookmark("b", 200),
    ]));
    let view = mount(store, &feed, Vec::new());

    assert_eq!(view.refresh().await, Ok(3));
    assert_eq!(ids(&view.snapshot()), vec!["c", "b", "a"]);
    view.unmount().await;
}

#[tokio::test]
async fn test_push_delete_and_create_from_another_session() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::with_rows(vec![bookmark("a", 100)]));
    let view = mount(store, &feed, Vec::new());
    view.refresh().await.unwrap();

    feed.publish_created(&bookmark("b", 200));
    feed.publish_deleted("u1", "a");
    feed.publish_deleted("u1", "never-held");

    wait_for(&view, "remote changes", |list| ids(list) == vec!["b"]).await;
    view.unmount().await;
}

#[tokio::test]
async fn test_lagged_feed_triggers_resync() {
    let feed = ChangeFeed::new(2);
    let store = Arc::new(ScriptedStore::with_rows(vec![bookmark("a", 100)]));
    let view = mount(store.clone(), &feed, Vec::new());
    view.refresh().await.unwrap();

    // Committed elsewhere; its push is among the events this view misses.
    store.rows.lock().unwrap().push(bookmark("b", 200));
    for i in 0..8 {
        feed.publish_deleted("u1", &format!("noise-{}", i));
    }

    wait_for(&view, "resync after lag", |list| ids(list) == vec!["b", "a"]).await;
    view.unmount().await;
}

#[tokio::test]
async fn test_view_keeps_working_after_feed_closes() {
    let feed = ChangeFeed::new(16);
    let store = Arc::new(ScriptedStore::with_rows(vec![bookmark("a", 100)]));
    let view = mount(store, &feed, Vec::new());
    drop(feed);

    assert_eq!(view.refresh().await, Ok(1));
    view.delete("a").await.unwrap();
    assert!(view.snapshot().is_empty());
    view.unmount().await;
}

// ─── Two sessions, one user ───

#[tokio::test]
async fn test_two_sessions_converge_through_sqlite_store() {
    let feed = ChangeFeed::new(64);
    let store: Arc<dyn BookmarkStore> = Arc::new(SqliteStore::with_feed(
        Database::open_in_memory().unwrap(),
        feed.clone(),
    ));
    let first = mount(store.clone(), &feed, Vec::new());
    let second = mount(store.clone(), &feed, Vec::new());
    assert_eq!(feed.active_subscriptions(), 2);
    first.refresh().await.unwrap();
    second.refresh().await.unwrap();

    let created = first
        .create(BookmarkDraft::new("Docs", "example.com", ""))
        .await
        .unwrap();
    wait_for(&second, "create seen by second session", |list| {
        list.iter().any(|b| b.id == created.id)
    })
    .await;

    second.delete(&created.id).await.unwrap();
    wait_for(&first, "delete seen by first session", |list| list.is_empty()).await;

    assert_eq!(first.refresh().await, Ok(0));
    assert_eq!(second.snapshot().len(), 0);

    first.unmount().await;
    second.unmount().await;
    assert_eq!(feed.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_other_users_changes_are_invisible() {
    let feed = ChangeFeed::new(64);
    let store: Arc<dyn BookmarkStore> = Arc::new(SqliteStore::with_feed(
        Database::open_in_memory().unwrap(),
        feed.clone(),
    ));
    let mine = mount(store.clone(), &feed, Vec::new());
    let theirs = BookmarkView::mount(
        &identity("u2"),
        store.clone(),
        &feed,
        &ViewSettings::default(),
        Vec::new(),
    )
    .unwrap();
    mine.refresh().await.unwrap();
    theirs.refresh().await.unwrap();

    theirs
        .create(BookmarkDraft::new("Private", "secret.example", ""))
        .await
        .unwrap();
    let own = mine
        .create(BookmarkDraft::new("Mine", "mine.example", ""))
        .await
        .unwrap();

    assert_eq!(mine.refresh().await, Ok(1));
    assert_eq!(mine.snapshot(), vec![own]);
    assert!(mine.snapshot().iter().all(|b| b.owner == "u1"));

    mine.unmount().await;
    theirs.unmount().await;
}
