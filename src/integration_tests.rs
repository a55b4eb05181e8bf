//! End-to-end tests of the chat session and task list against the
//! scripted mock backend.

use std::sync::Arc;

use chrono::Utc;

use crate::chat::ChatSession;
use crate::store::{ConversationSnapshot, LocalStore};
use crate::tasks::TaskListController;
use crate::testing::{chat_reply, history_message, sample_task, MockApi};
use crate::types::{ChatStatus, Role};

const USER: &str = "me@example.com";

fn temp_store() -> (tempfile::TempDir, Arc<LocalStore>) {
    let dir = tempfile::TempDir::new().unwrap();
    let store = Arc::new(LocalStore::new(dir.path().to_path_buf()));
    (dir, store)
}

// ---------------------------------------------------------------------------
// ChatSession
// ---------------------------------------------------------------------------

#[tokio::test]
async fn send_appends_user_then_assistant_and_adopts_conversation_id() {
    let (_dir, store) = temp_store();
    let mock = Arc::new(MockApi::new());
    MockApi::script(&mock.send_results, vec![Ok(chat_reply(42, "Task added!"))]);

    let mut session = ChatSession::new(mock.clone(), store.clone(), USER);
    assert_eq!(session.conversation_id(), None);

    session.send("add a task to buy milk").await.unwrap();

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "add a task to buy milk");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Task added!");
    assert_eq!(session.conversation_id(), Some(42));
    assert_eq!(session.status(), ChatStatus::Connected);
    assert!(session.error().is_none());

    // The snapshot mirrors the in-memory state.
    let snapshot = store.load_conversation().unwrap();
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.conversation_id, Some(42));
}

#[tokio::test(start_paused = true)]
async fn failed_send_retries_three_times_with_backoff_then_gives_up() {
    let (_dir, store) = temp_store();
    let mock = Arc::new(MockApi::new());
    MockApi::script(
        &mock.send_results,
        (0..4).map(|_| Err("server down".to_string())).collect(),
    );

    let mut session = ChatSession::new(mock.clone(), store, USER);
    let started = tokio::time::Instant::now();
    let result = session.send("hello").await;
    let elapsed = started.elapsed();

    assert!(result.is_err());
    // Initial attempt plus three retries.
    assert_eq!(mock.call_count("send_message"), 4);
    // Backoff schedule 1s + 2s + 4s.
    assert!(elapsed >= std::time::Duration::from_secs(7), "elapsed {:?}", elapsed);
    assert!(elapsed < std::time::Duration::from_secs(8), "elapsed {:?}", elapsed);

    // Exactly the one optimistic user entry, no assistant entry.
    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.messages()[0].role, Role::User);
    assert_eq!(session.status(), ChatStatus::Error);
    assert!(session.error().unwrap().contains("server down"));

    // The counter only resets on success: another send gets a single
    // attempt, no further automatic retries.
    MockApi::script(&mock.send_results, vec![Err("still down".to_string())]);
    assert!(session.send("retry?").await.is_err());
    assert_eq!(mock.call_count("send_message"), 5);
}

#[tokio::test(start_paused = true)]
async fn send_recovers_after_transient_failure_and_resets_counter() {
    let (_dir, store) = temp_store();
    let mock = Arc::new(MockApi::new());
    MockApi::script(
        &mock.send_results,
        vec![
            Err("blip".to_string()),
            Ok(chat_reply(7, "first")),
            Err("blip".to_string()),
            Ok(chat_reply(7, "second")),
        ],
    );

    let mut session = ChatSession::new(mock.clone(), store, USER);
    session.send("one").await.unwrap();
    assert_eq!(mock.call_count("send_message"), 2);
    assert_eq!(session.status(), ChatStatus::Connected);

    // The success above reset the retry counter, so the next failure is
    // retried again rather than giving up immediately.
    session.send("two").await.unwrap();
    assert_eq!(mock.call_count("send_message"), 4);

    let assistant: Vec<_> = session
        .messages()
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .collect();
    assert_eq!(assistant.len(), 2);
}

#[tokio::test]
async fn dismissing_error_returns_to_idle() {
    let (_dir, store) = temp_store();
    let mock = Arc::new(MockApi::new());
    MockApi::script(
        &mock.history_results,
        vec![Err("unreachable".to_string())],
    );

    let mut session = ChatSession::new(mock, store, USER);
    session.activate().await;
    assert_eq!(session.status(), ChatStatus::Error);
    assert!(session.error().is_some());

    session.dismiss_error();
    assert_eq!(session.status(), ChatStatus::Idle);
    assert!(session.error().is_none());
}

#[tokio::test]
async fn restored_snapshot_suppresses_history_fetch() {
    let (_dir, store) = temp_store();
    store
        .save_conversation(&ConversationSnapshot {
            messages: vec![history_message("m1", Role::User, "earlier", 7)],
            conversation_id: Some(7),
            updated_at: Utc::now(),
        })
        .unwrap();

    let mock = Arc::new(MockApi::new());
    let mut session = ChatSession::new(mock.clone(), store, USER);
    assert_eq!(session.messages().len(), 1);
    assert_eq!(session.conversation_id(), Some(7));

    session.activate().await;
    assert_eq!(mock.call_count("conversation_history"), 0);
}

#[tokio::test]
async fn empty_store_fetches_history_exactly_once() {
    let (_dir, store) = temp_store();
    let mock = Arc::new(MockApi::new());
    MockApi::script(
        &mock.history_results,
        vec![Ok(vec![
            history_message("m1", Role::User, "add a task", 9),
            history_message("m2", Role::Assistant, "done", 9),
        ])],
    );

    let mut session = ChatSession::new(mock.clone(), store.clone(), USER);
    session.activate().await;
    assert_eq!(session.messages().len(), 2);
    // First message's conversation id becomes the session's.
    assert_eq!(session.conversation_id(), Some(9));
    assert_eq!(session.status(), ChatStatus::Connected);

    session.activate().await;
    assert_eq!(mock.call_count("conversation_history"), 1);

    // The fetched history was mirrored locally, so a fresh session
    // resumes without another fetch.
    let resumed = ChatSession::new(mock.clone(), store, USER);
    assert_eq!(resumed.messages().len(), 2);
}

#[tokio::test]
async fn empty_history_leaves_session_fresh_but_connected() {
    let (_dir, store) = temp_store();
    let mock = Arc::new(MockApi::new());
    MockApi::script(&mock.history_results, vec![Ok(vec![])]);

    let mut session = ChatSession::new(mock, store, USER);
    session.activate().await;
    assert!(session.messages().is_empty());
    assert_eq!(session.conversation_id(), None);
    assert_eq!(session.status(), ChatStatus::Connected);
}

// ---------------------------------------------------------------------------
// TaskListController
// ---------------------------------------------------------------------------

#[tokio::test]
async fn toggle_failure_leaves_list_unchanged_and_surfaces_error() {
    let mock = Arc::new(MockApi::new());
    MockApi::script(
        &mock.list_results,
        vec![Ok(vec![sample_task(1, "Buy milk", false)])],
    );
    MockApi::script(
        &mock.set_completed_results,
        vec![Err("backend rejected".to_string())],
    );

    let mut controller = TaskListController::new(mock, USER);
    controller.load().await.unwrap();

    assert!(controller.toggle_complete(1).await.is_err());
    assert_eq!(controller.visible().len(), 1);
    assert!(!controller.visible()[0].completed);
    assert!(controller.error().unwrap().contains("backend rejected"));
}

#[tokio::test]
async fn toggle_success_replaces_task_with_server_representation() {
    let mock = Arc::new(MockApi::new());
    MockApi::script(
        &mock.list_results,
        vec![Ok(vec![
            sample_task(1, "Buy milk", false),
            sample_task(2, "Write report", false),
        ])],
    );
    let mut server_copy = sample_task(1, "Buy milk (renamed server-side)", true);
    server_copy.updated_at = Utc::now();
    MockApi::script(&mock.set_completed_results, vec![Ok(server_copy)]);

    let mut controller = TaskListController::new(mock, USER);
    controller.load().await.unwrap();
    controller.toggle_complete(1).await.unwrap();

    let toggled = controller.visible().iter().find(|t| t.id == 1).unwrap();
    assert!(toggled.completed);
    // The whole representation comes from the server, not a local flip.
    assert_eq!(toggled.title, "Buy milk (renamed server-side)");

    let other = controller.visible().iter().find(|t| t.id == 2).unwrap();
    assert!(!other.completed);
}

#[tokio::test]
async fn toggle_unknown_id_fails_without_network_call() {
    let mock = Arc::new(MockApi::new());
    MockApi::script(&mock.list_results, vec![Ok(vec![])]);

    let mut controller = TaskListController::new(mock.clone(), USER);
    controller.load().await.unwrap();

    assert!(controller.toggle_complete(99).await.is_err());
    assert_eq!(mock.call_count("set_completed"), 0);
}

#[tokio::test]
async fn update_is_call_first_and_adopts_server_representation() {
    let mock = Arc::new(MockApi::new());
    MockApi::script(
        &mock.list_results,
        vec![Ok(vec![sample_task(1, "Buy milk", false)])],
    );
    let mut server_copy = sample_task(1, "Buy oat milk", false);
    server_copy.updated_at = Utc::now();
    MockApi::script(
        &mock.update_results,
        vec![Err("backend rejected".to_string()), Ok(server_copy)],
    );

    let mut controller = TaskListController::new(mock, USER);
    controller.load().await.unwrap();

    let req = crate::types::UpdateTaskRequest {
        title: Some("Buy oat milk".to_string()),
        ..Default::default()
    };

    // Failure: the in-memory entry is untouched.
    assert!(controller.update(1, &req).await.is_err());
    assert_eq!(controller.visible()[0].title, "Buy milk");
    assert!(controller.error().is_some());

    // Success: the server's copy replaces it.
    controller.update(1, &req).await.unwrap();
    assert_eq!(controller.visible()[0].title, "Buy oat milk");
    assert!(controller.error().is_none());
}

#[tokio::test]
async fn delete_is_call_first() {
    let mock = Arc::new(MockApi::new());
    MockApi::script(
        &mock.list_results,
        vec![Ok(vec![
            sample_task(1, "Buy milk", false),
            sample_task(2, "Write report", false),
        ])],
    );
    MockApi::script(
        &mock.delete_results,
        vec![Err("nope".to_string()), Ok(())],
    );

    let mut controller = TaskListController::new(mock, USER);
    controller.load().await.unwrap();

    // Failure: nothing removed.
    assert!(controller.delete(1).await.is_err());
    assert_eq!(controller.visible().len(), 2);
    assert!(controller.error().is_some());

    // Success: exactly the targeted task disappears.
    controller.delete(1).await.unwrap();
    assert_eq!(controller.visible().len(), 1);
    assert_eq!(controller.visible()[0].id, 2);
    assert!(controller.error().is_none());
}

#[tokio::test]
async fn create_appends_server_returned_task() {
    let mock = Arc::new(MockApi::new());
    MockApi::script(&mock.list_results, vec![Ok(vec![])]);
    MockApi::script(
        &mock.create_results,
        vec![Ok(sample_task(5, "Plan trip", false))],
    );

    let mut controller = TaskListController::new(mock, USER);
    controller.load().await.unwrap();

    let created = controller
        .create(&crate::types::CreateTaskRequest {
            title: "Plan trip".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.id, 5);
    assert_eq!(controller.visible().len(), 1);
}
