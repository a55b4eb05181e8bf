//! Test infrastructure: a scripted mock backend implementing
//! [`TaskApi`] and [`ChatApi`], plus fixture helpers.
//!
//! Each operation pops from its own FIFO queue of scripted outcomes and
//! records the call, so tests can assert both behavior and call counts.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::traits::{ChatApi, TaskApi};
use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, CreateTaskRequest, Priority, Role, Task,
    UpdateTaskRequest,
};

type Scripted<T> = Mutex<VecDeque<Result<T, String>>>;

#[derive(Default)]
pub struct MockApi {
    pub list_results: Scripted<Vec<Task>>,
    pub create_results: Scripted<Task>,
    pub get_results: Scripted<Task>,
    pub update_results: Scripted<Task>,
    pub delete_results: Scripted<()>,
    pub set_completed_results: Scripted<Task>,
    pub send_results: Scripted<ChatResponse>,
    pub history_results: Scripted<Vec<ChatMessage>>,
    /// Operation names in invocation order.
    pub calls: Mutex<Vec<String>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script<T>(queue: &Scripted<T>, results: Vec<Result<T, String>>) {
        queue.lock().unwrap().extend(results);
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    fn pop<T>(&self, name: &str, queue: &Scripted<T>) -> anyhow::Result<T> {
        let scripted = queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response for {}", name));
        scripted.map_err(|msg| anyhow::anyhow!(msg))
    }
}

#[async_trait]
impl TaskApi for MockApi {
    async fn list_tasks(&self, _user_id: &str) -> anyhow::Result<Vec<Task>> {
        self.record("list_tasks");
        self.pop("list_tasks", &self.list_results)
    }

    async fn create_task(&self, _user_id: &str, _req: &CreateTaskRequest) -> anyhow::Result<Task> {
        self.record("create_task");
        self.pop("create_task", &self.create_results)
    }

    async fn get_task(&self, _user_id: &str, _task_id: i64) -> anyhow::Result<Task> {
        self.record("get_task");
        self.pop("get_task", &self.get_results)
    }

    async fn update_task(
        &self,
        _user_id: &str,
        _task_id: i64,
        _req: &UpdateTaskRequest,
    ) -> anyhow::Result<Task> {
        self.record("update_task");
        self.pop("update_task", &self.update_results)
    }

    async fn delete_task(&self, _user_id: &str, _task_id: i64) -> anyhow::Result<()> {
        self.record("delete_task");
        self.pop("delete_task", &self.delete_results)
    }

    async fn set_completed(
        &self,
        _user_id: &str,
        _task_id: i64,
        _completed: bool,
    ) -> anyhow::Result<Task> {
        self.record("set_completed");
        self.pop("set_completed", &self.set_completed_results)
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn send_message(
        &self,
        _user_id: &str,
        _req: &ChatRequest,
    ) -> anyhow::Result<ChatResponse> {
        self.record("send_message");
        self.pop("send_message", &self.send_results)
    }

    async fn conversation_history(
        &self,
        _user_id: &str,
        _conversation_id: Option<i64>,
    ) -> anyhow::Result<Vec<ChatMessage>> {
        self.record("conversation_history");
        self.pop("conversation_history", &self.history_results)
    }
}

/// Fixture task with fixed timestamps.
pub fn sample_task(id: i64, title: &str, completed: bool) -> Task {
    Task {
        id,
        title: title.to_string(),
        description: None,
        completed,
        user_id: "me@example.com".to_string(),
        priority: Priority::Medium,
        tags: None,
        due_date: None,
        recurrence: None,
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
    }
}

/// Fixture assistant reply without tool calls.
pub fn chat_reply(conversation_id: i64, message: &str) -> ChatResponse {
    ChatResponse {
        conversation_id,
        message: message.to_string(),
        tool_calls: None,
    }
}

/// Fixture history entry as the server would return it.
pub fn history_message(id: &str, role: Role, content: &str, conversation_id: i64) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        role,
        content: content.to_string(),
        timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
        conversation_id: Some(conversation_id),
    }
}
