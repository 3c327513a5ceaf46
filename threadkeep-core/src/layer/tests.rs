use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::*;
use crate::storage::error::StoreError;
use crate::storage::implementations::memory::{WriteKind, WriteRecord};
use crate::storage::implementations::MemoryDocumentStore;
use crate::storage::types::{DocMap, DocValue};

const DB: &str = "threadkeep";

async fn setup() -> (Arc<MemoryDocumentStore>, DocumentDataLayer) {
    let store = Arc::new(MemoryDocumentStore::new());
    let handle = Arc::new(StoreHandle::new(store.clone(), DB));
    let layer = DocumentDataLayer::new(handle).await.unwrap();
    (store, layer)
}

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn step(id: &str, thread: &str, minutes: i64) -> StepDict {
    StepDict::new(id, thread, "assistant_message").with_created_at(at(minutes))
}

fn step_ids(steps: &[StepDict]) -> Vec<&str> {
    steps.iter().map(|s| s.id.as_str()).collect()
}

/// Write steps on a session that is released up front
async fn seed_steps(layer: &DocumentDataLayer, steps: Vec<StepDict>) {
    let session = SessionId::new();
    layer.release(&session).await;
    for s in steps {
        layer.create_step(&session, s).await;
    }
}

#[tokio::test]
async fn test_new_propagates_provisioning_failure() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.set_offline(true);
    let handle = Arc::new(StoreHandle::new(store, DB));

    let err = DocumentDataLayer::new(handle).await.err().unwrap();
    assert!(matches!(err, AdapterError::Store(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn test_user_lifecycle() {
    let (_store, layer) = setup().await;
    assert!(layer.get_user("alice").await.is_none());

    let created = layer
        .create_user(&User::new("alice").with_display_name("Alice"))
        .await
        .unwrap();
    assert_eq!(created.id.as_str(), "alice");
    assert_eq!(created.identifier, "Alice");

    // A second create returns the stored user instead of failing
    let again = layer.create_user(&User::new("alice")).await.unwrap();
    assert_eq!(again.identifier, "Alice");

    let fetched = layer.get_or_create_user(&User::new("alice")).await.unwrap();
    assert_eq!(fetched, created);

    let bob = layer.get_or_create_user(&User::new("bob")).await.unwrap();
    assert_eq!(bob.identifier, "bob");
}

#[tokio::test]
async fn test_steps_read_back_in_creation_order() {
    let (_store, layer) = setup().await;
    layer.update_thread(&"t1".into(), ThreadPatch::new().name("chat")).await;

    let session = SessionId::from("sess");
    for (id, minutes) in [("late", 30), ("early", 1), ("middle", 10)] {
        layer.create_step(&session, step(id, "t1", minutes)).await;
    }
    assert!(layer.get_steps(&"t1".into()).await.is_empty());

    let report = layer.release(&session).await;
    assert_eq!(report.applied, 3);
    assert!(report.is_clean());

    let steps = layer.get_steps(&"t1".into()).await;
    assert_eq!(step_ids(&steps), vec!["early", "middle", "late"]);
}

#[tokio::test]
async fn test_buffered_update_lands_after_release() {
    let (store, layer) = setup().await;
    let session = SessionId::from("sess");

    layer.create_step(&session, step("s1", "t1", 1)).await;
    layer.create_step(&session, step("s2", "t1", 2)).await;
    layer.create_step(&session, step("s3", "t1", 3)).await;
    layer
        .update_step(&session, step("s2", "t1", 2).with_output("final answer"))
        .await;

    // Nothing reaches the store before the barrier
    assert!(store.write_log().is_empty());
    assert_eq!(layer.coordinator().pending(&session), 4);

    let report = layer.release(&session).await;
    assert_eq!(report.total(), 4);
    assert!(report.is_clean());

    let steps = layer.get_steps(&"t1".into()).await;
    assert_eq!(step_ids(&steps), vec!["s1", "s2", "s3"]);
    assert_eq!(steps[1].output.as_deref(), Some("final answer"));

    let s2_writes: Vec<WriteKind> = store
        .write_log()
        .into_iter()
        .filter(|w| w.id == "s2")
        .map(|w| w.kind)
        .collect();
    assert_eq!(s2_writes, vec![WriteKind::Create, WriteKind::Upsert]);
}

#[tokio::test]
async fn test_teardown_before_release_persists_nothing() {
    let (store, layer) = setup().await;
    let session = SessionId::from("sess");

    layer.create_step(&session, step("s1", "t1", 1)).await;
    layer.create_step(&session, step("s2", "t1", 2)).await;
    layer.create_element(&session, ElementDict::new("e1", "t1")).await;

    assert_eq!(layer.end_session(&session).await, 3);
    assert!(store.write_log().is_empty());
    assert!(layer.get_steps(&"t1".into()).await.is_empty());
}

#[tokio::test]
async fn test_released_session_writes_immediately() {
    let (store, layer) = setup().await;
    let session = SessionId::from("sess");
    let report = layer.release(&session).await;
    assert_eq!(report.total(), 0);

    layer.create_step(&session, step("s1", "t1", 1)).await;
    assert_eq!(store.document_count(DB, "steps"), 1);
}

#[tokio::test]
async fn test_flush_reports_failures_without_rollback() {
    let (_store, layer) = setup().await;
    seed_steps(&layer, vec![step("dup", "t1", 0)]).await;

    let session = SessionId::from("sess");
    layer.create_step(&session, step("dup", "t1", 5)).await;
    layer.create_step(&session, step("fresh", "t1", 6)).await;

    let report = layer.release(&session).await;
    assert_eq!(report.applied, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].operation, "create_step");
    assert_eq!(report.failures[0].target, "dup");

    let steps = layer.get_steps(&"t1".into()).await;
    assert_eq!(step_ids(&steps), vec!["dup", "fresh"]);
}

#[tokio::test]
async fn test_delete_step_resolves_thread() {
    let (_store, layer) = setup().await;
    seed_steps(&layer, vec![step("s1", "t1", 1), step("s2", "t2", 1)]).await;

    let session = SessionId::new();
    layer.delete_step(&session, &"s2".into()).await;
    layer.release(&session).await;

    assert!(layer.get_steps(&"t2".into()).await.is_empty());
    assert_eq!(layer.get_steps(&"t1".into()).await.len(), 1);

    // Deleting a missing step is not a failure
    let session = SessionId::new();
    layer.delete_step(&session, &"ghost".into()).await;
    assert!(layer.release(&session).await.is_clean());
}

#[tokio::test]
async fn test_thread_assembly() {
    let (_store, layer) = setup().await;
    assert!(layer.get_thread(&"t1".into()).await.is_none());

    layer
        .update_thread(&"t1".into(), ThreadPatch::new().name("Budget").user_id("alice"))
        .await;
    let session = SessionId::new();
    layer.create_step(&session, step("s2", "t1", 2)).await;
    layer.create_step(&session, step("s1", "t1", 1)).await;
    layer
        .create_element(&session, ElementDict::new("e1", "t1").with_type("image").for_step("s2"))
        .await;
    layer.release(&session).await;

    let thread = layer.get_thread(&"t1".into()).await.unwrap();
    assert_eq!(thread.name.as_deref(), Some("Budget"));
    assert_eq!(thread.user_id.as_ref().map(UserId::as_str), Some("alice"));
    assert_eq!(thread.user_identifier.as_deref(), Some("alice"));
    assert!(thread.created_at.is_some());
    assert_eq!(step_ids(&thread.steps), vec!["s1", "s2"]);
    assert_eq!(thread.elements.len(), 1);
    assert_eq!(thread.elements[0].for_id.as_ref().map(StepId::as_str), Some("s2"));

    let element = layer.get_element(&"t1".into(), &"e1".into()).await.unwrap();
    assert_eq!(element.element_type.as_deref(), Some("image"));
    assert!(layer.get_element(&"t2".into(), &"e1".into()).await.is_none());
}

#[tokio::test]
async fn test_update_thread_merges_metadata() {
    let (_store, layer) = setup().await;
    let mut first = DocMap::new();
    first.insert("env".into(), DocValue::from("prod"));
    first.insert("seenAt".into(), DocValue::Time(at(0)));
    layer
        .update_thread(&"t1".into(), ThreadPatch::new().metadata(first).tags(vec!["a".into()]))
        .await;

    let mut second = DocMap::new();
    second.insert("lang".into(), DocValue::from("en"));
    layer
        .update_thread(&"t1".into(), ThreadPatch::new().metadata(second).name("renamed"))
        .await;

    let thread = layer.get_thread(&"t1".into()).await.unwrap();
    let metadata = thread.metadata.unwrap();
    assert_eq!(metadata.get("env"), Some(&DocValue::from("prod")));
    assert_eq!(metadata.get("lang"), Some(&DocValue::from("en")));
    assert_eq!(
        metadata.get("seenAt"),
        Some(&DocValue::from("2024-03-01T12:00:00.000000Z"))
    );
    assert_eq!(thread.tags, Some(vec!["a".to_string()]));
    assert_eq!(thread.name.as_deref(), Some("renamed"));
}

#[tokio::test]
async fn test_thread_author() {
    let (_store, layer) = setup().await;
    assert_eq!(layer.get_thread_author(&"t1".into()).await, "");

    layer.update_thread(&"t1".into(), ThreadPatch::new()).await;
    assert_eq!(layer.get_thread_author(&"t1".into()).await, "");

    layer.update_thread(&"t1".into(), ThreadPatch::new().user_id("alice")).await;
    assert_eq!(layer.get_thread_author(&"t1".into()).await, "alice");
}

#[tokio::test]
async fn test_delete_thread_does_not_cascade() {
    let (_store, layer) = setup().await;
    layer.update_thread(&"t1".into(), ThreadPatch::new().user_id("alice")).await;
    let session = SessionId::new();
    layer.create_step(&session, step("s1", "t1", 1)).await;
    layer.create_element(&session, ElementDict::new("e1", "t1")).await;
    layer.release(&session).await;

    layer.delete_thread(&"t1".into()).await;
    assert!(layer.get_thread(&"t1".into()).await.is_none());
    assert_eq!(step_ids(&layer.get_steps(&"t1".into()).await), vec!["s1"]);
    assert!(layer.get_element(&"t1".into(), &"e1".into()).await.is_some());

    // Second delete is a logged no-op
    layer.delete_thread(&"t1".into()).await;
}

#[tokio::test]
async fn test_list_threads_pages() {
    let (_store, layer) = setup().await;
    let created = |minutes| DocValue::Time(at(minutes));
    for i in 0..7 {
        let id = ThreadId::from(format!("t{i}"));
        layer
            .update_thread(&id, ThreadPatch::new().user_id("alice").name(format!("chat {i}")))
            .await;
        // Pin createdAt so listing order is deterministic
        let handle = layer.handle().collection(CollectionKind::Threads).unwrap();
        let mut doc = crate::storage::normalize::strip_internal(
            &handle.read(id.as_str(), id.as_str()).await.unwrap(),
        );
        let mut pinned = DocMap::new();
        pinned.insert("createdAt".into(), created(i));
        doc.extend(crate::storage::normalize::normalize_for_write(pinned));
        handle.upsert(doc).await.unwrap();
    }
    layer.update_thread(&"other".into(), ThreadPatch::new().user_id("bob")).await;

    let filter = ThreadFilter::for_user("alice");
    let mut pagination = Pagination::first(3);
    let mut seen = Vec::new();
    let mut pages = 0;
    loop {
        let page = layer.list_threads(&pagination, &filter).await.unwrap();
        pages += 1;
        seen.extend(page.data.iter().map(|t| t.id.to_string()));
        match page.page_info.end_cursor {
            Some(cursor) => {
                assert!(page.page_info.has_next_page);
                pagination = Pagination::first(3).after(cursor);
            }
            None => {
                assert!(!page.page_info.has_next_page);
                break;
            }
        }
    }
    assert_eq!(pages, 3);
    assert_eq!(seen, vec!["t6", "t5", "t4", "t3", "t2", "t1", "t0"]);

    let searched = layer
        .list_threads(&Pagination::first(10), &ThreadFilter::for_user("alice").with_search("CHAT 3"))
        .await
        .unwrap();
    assert_eq!(searched.data.len(), 1);
    assert_eq!(searched.data[0].name.as_deref(), Some("chat 3"));
}

#[tokio::test]
async fn test_list_threads_validation_and_outage() {
    let (store, layer) = setup().await;
    let filter = ThreadFilter::for_user("alice");

    let err = layer
        .list_threads(&Pagination::first(5).after("next"), &filter)
        .await
        .unwrap_err();
    assert_eq!(
        err.as_validation(),
        Some(&ValidationError::InvalidCursor("next".into()))
    );

    store.set_offline(true);
    let page = layer.list_threads(&Pagination::first(5), &filter).await.unwrap();
    assert_eq!(page, PaginatedResponse::empty());
}

#[tokio::test]
async fn test_feedback_lands_on_reply_and_round_trips() {
    let (_store, layer) = setup().await;
    seed_steps(
        &layer,
        vec![
            StepDict::new("s1", "t1", "user_message").with_created_at(at(1)),
            step("s2", "t1", 2).with_parent("s1"),
        ],
    )
    .await;

    let id = layer
        .upsert_feedback(&Feedback::new("t1", "s1", 1).with_comment("helpful"))
        .await
        .unwrap();
    assert_eq!(id.as_str(), "t1::s1");

    let steps = layer.get_steps(&"t1".into()).await;
    assert!(steps[0].feedback.is_none());
    let feedback = steps[1].feedback.as_ref().unwrap();
    assert_eq!(feedback.id.as_deref(), Some("t1::s1"));
    assert_eq!(feedback.value, 1);
    assert_eq!(feedback.comment.as_deref(), Some("helpful"));

    assert!(layer.delete_feedback("t1::s1").await.unwrap());
    assert!(layer.get_steps(&"t1".into()).await[1].feedback.is_none());
    assert!(!layer.delete_feedback("t1::s1").await.unwrap());
}

#[tokio::test]
async fn test_feedback_falls_back_to_target_step() {
    let (_store, layer) = setup().await;
    seed_steps(&layer, vec![step("solo", "t1", 1)]).await;

    let id = layer
        .upsert_feedback(&Feedback::new("t1", "solo", -1))
        .await
        .unwrap();
    assert_eq!(id.as_str(), "t1::solo");
    assert_eq!(
        layer.get_steps(&"t1".into()).await[0].feedback.as_ref().map(|f| f.value),
        Some(-1)
    );

    let err = layer
        .upsert_feedback(&Feedback::new("t1", "missing", 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err.as_validation(),
        Some(ValidationError::UnresolvedFeedbackTarget { .. })
    ));

    let err = layer.upsert_feedback(&Feedback::new("", "solo", 1)).await.unwrap_err();
    assert_eq!(err.as_validation(), Some(&ValidationError::MissingFeedbackTarget));
}

#[tokio::test]
async fn test_malformed_feedback_id_mutates_nothing() {
    let (store, layer) = setup().await;
    seed_steps(&layer, vec![step("s1", "t1", 1)]).await;
    store.clear_write_log();

    for raw in ["no-separator", "a::b::c", "::s1"] {
        let err = layer.delete_feedback(raw).await.unwrap_err();
        assert_eq!(
            err.as_validation(),
            Some(&ValidationError::MalformedFeedbackId(raw.to_string()))
        );
    }
    assert_eq!(store.write_log(), Vec::<WriteRecord>::new());
}

#[tokio::test]
async fn test_feedback_during_outage() {
    let (store, layer) = setup().await;
    seed_steps(&layer, vec![step("s1", "t1", 1)]).await;
    store.set_offline(true);

    assert!(!layer.delete_feedback("t1::s1").await.unwrap());
    let err = layer.upsert_feedback(&Feedback::new("t1", "s1", 1)).await.unwrap_err();
    assert!(matches!(err, AdapterError::Store(StoreError::Unavailable(_))));
}

#[tokio::test]
async fn test_delete_element() {
    let (store, layer) = setup().await;
    let session = SessionId::new();

    let err = layer
        .delete_element(&session, &"e1".into(), None)
        .await
        .unwrap_err();
    assert_eq!(
        err.as_validation(),
        Some(&ValidationError::MissingThreadId("e1".into()))
    );
    assert_eq!(layer.coordinator().pending(&session), 0);

    layer.create_element(&session, ElementDict::new("e1", "t1")).await;
    layer
        .delete_element(&session, &"e1".into(), Some(&"t1".into()))
        .await
        .unwrap();
    let report = layer.release(&session).await;
    assert_eq!(report.applied, 2);
    assert_eq!(store.document_count(DB, "elements"), 0);
}

#[tokio::test]
async fn test_reads_degrade_when_store_is_down() {
    let (store, layer) = setup().await;
    layer.update_thread(&"t1".into(), ThreadPatch::new().user_id("alice")).await;
    store.set_offline(true);

    assert!(layer.get_user("alice").await.is_none());
    assert!(layer.create_user(&User::new("alice")).await.is_none());
    assert!(layer.get_thread(&"t1".into()).await.is_none());
    assert!(layer.get_steps(&"t1".into()).await.is_empty());
    assert!(layer.get_element(&"t1".into(), &"e1".into()).await.is_none());
    assert_eq!(layer.get_thread_author(&"t1".into()).await, "");
    assert!(layer.get_favorite_steps(&"alice".into()).await.is_empty());
    layer.delete_thread(&"t1".into()).await;
}

#[tokio::test]
async fn test_favorite_steps_newest_first() {
    let (_store, layer) = setup().await;
    layer.update_thread(&"t1".into(), ThreadPatch::new().user_id("alice")).await;
    layer.update_thread(&"t2".into(), ThreadPatch::new().user_id("alice")).await;
    layer.update_thread(&"t3".into(), ThreadPatch::new().user_id("bob")).await;

    let favorite = || {
        let mut metadata = DocMap::new();
        metadata.insert("favorite".into(), DocValue::from(true));
        metadata
    };
    seed_steps(
        &layer,
        vec![
            step("old", "t1", 1).with_metadata(favorite()),
            step("plain", "t1", 2),
            step("new", "t2", 3).with_metadata(favorite()),
            step("foreign", "t3", 4).with_metadata(favorite()),
        ],
    )
    .await;

    let favorites = layer.get_favorite_steps(&"alice".into()).await;
    assert_eq!(step_ids(&favorites), vec!["new", "old"]);
    assert!(layer.get_favorite_steps(&"nobody".into()).await.is_empty());
}

#[tokio::test]
async fn test_debug_url_and_close() {
    let (_store, layer) = setup().await;
    assert_eq!(layer.build_debug_url(), "memory - database: threadkeep");

    layer.close().await;
    assert!(layer.get_user("alice").await.is_none());
}
