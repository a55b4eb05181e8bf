//! Backend seams. The real `ApiClient` implements both traits; tests
//! substitute a scripted mock.

use async_trait::async_trait;

use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, CreateTaskRequest, Task, UpdateTaskRequest,
};

/// Task CRUD against the REST backend.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self, user_id: &str) -> anyhow::Result<Vec<Task>>;

    async fn create_task(&self, user_id: &str, req: &CreateTaskRequest) -> anyhow::Result<Task>;

    async fn get_task(&self, user_id: &str, task_id: i64) -> anyhow::Result<Task>;

    async fn update_task(
        &self,
        user_id: &str,
        task_id: i64,
        req: &UpdateTaskRequest,
    ) -> anyhow::Result<Task>;

    async fn delete_task(&self, user_id: &str, task_id: i64) -> anyhow::Result<()>;

    /// Dedicated partial update for the completion flag. Returns the
    /// server's full representation of the task.
    async fn set_completed(
        &self,
        user_id: &str,
        task_id: i64,
        completed: bool,
    ) -> anyhow::Result<Task>;
}

/// Conversation endpoints of the assistant backend.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(&self, user_id: &str, req: &ChatRequest)
        -> anyhow::Result<ChatResponse>;

    async fn conversation_history(
        &self,
        user_id: &str,
        conversation_id: Option<i64>,
    ) -> anyhow::Result<Vec<ChatMessage>>;
}
