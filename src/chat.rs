//! Conversation state for the assistant chat.
//!
//! Messages are inserted optimistically: the user's entry appears in
//! the in-memory list before the network call resolves. Failed sends
//! are retried automatically with exponential backoff before the error
//! is left standing. Every change to the message list or conversation
//! id is mirrored into the local snapshot; the snapshot is only read
//! back at session start and the server's history stays authoritative.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::store::{ConversationSnapshot, LocalStore};
use crate::traits::ChatApi;
use crate::types::{ChatMessage, ChatRequest, ChatStatus, Role, ToolCallResult};
use crate::utils::truncate_str;

/// Retries per send after the initial attempt.
const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 1_000;
const MAX_DELAY_MS: u64 = 10_000;

/// delay = min(1000 * 2^attempt, 10000) milliseconds.
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64 << attempt.min(16);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(factor).min(MAX_DELAY_MS))
}

pub struct ChatSession {
    api: Arc<dyn ChatApi>,
    store: Arc<LocalStore>,
    user_id: String,
    messages: Vec<ChatMessage>,
    conversation_id: Option<i64>,
    status: ChatStatus,
    error: Option<String>,
    retry_count: u32,
    history_fetched: bool,
    /// Tool invocations reported with the most recent assistant reply.
    last_tool_calls: Vec<ToolCallResult>,
}

impl ChatSession {
    /// Restores the persisted snapshot, if any. The session resumes the
    /// stored conversation; nothing is cleared on close.
    pub fn new(api: Arc<dyn ChatApi>, store: Arc<LocalStore>, user_id: &str) -> Self {
        let mut messages = Vec::new();
        let mut conversation_id = None;
        if let Some(snapshot) = store.load_conversation() {
            debug!(
                messages = snapshot.messages.len(),
                conversation_id = ?snapshot.conversation_id,
                "Restored conversation snapshot"
            );
            messages = snapshot.messages;
            conversation_id = snapshot.conversation_id;
        }

        Self {
            api,
            store,
            user_id: user_id.to_string(),
            messages,
            conversation_id,
            status: ChatStatus::Idle,
            error: None,
            retry_count: 0,
            history_fetched: false,
            last_tool_calls: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn conversation_id(&self) -> Option<i64> {
        self.conversation_id
    }

    pub fn status(&self) -> ChatStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_tool_calls(&self) -> &[ToolCallResult] {
        &self.last_tool_calls
    }

    /// Manual dismiss: clears the error banner and returns to idle.
    pub fn dismiss_error(&mut self) {
        self.error = None;
        self.status = ChatStatus::Idle;
    }

    /// First activation: when no messages are in memory, fetch history
    /// from the backend exactly once. A restored non-empty snapshot
    /// suppresses the fetch entirely.
    pub async fn activate(&mut self) {
        if !self.messages.is_empty() || self.history_fetched {
            return;
        }
        self.history_fetched = true;
        self.status = ChatStatus::Loading;

        match self.api.conversation_history(&self.user_id, None).await {
            Ok(history) => {
                if !history.is_empty() {
                    // Adopt the conversation the history belongs to.
                    self.conversation_id = history[0].conversation_id;
                    self.messages = history;
                    self.persist();
                }
                self.status = ChatStatus::Connected;
            }
            Err(e) => {
                warn!("Failed to load conversation history: {}", e);
                self.status = ChatStatus::Error;
                self.error = Some(format!("Failed to load conversation history: {}", e));
            }
        }
    }

    /// Send a message. Exactly one user entry is appended before the
    /// network call; on success exactly one assistant entry follows. A
    /// failed call is retried up to [`MAX_RETRIES`] times with backoff;
    /// the optimistic entry is never duplicated. After the final retry
    /// the error stays visible and the caller gets it back.
    pub async fn send(&mut self, content: &str) -> anyhow::Result<()> {
        let user_message = ChatMessage {
            id: format!("user-{}", Uuid::new_v4()),
            role: Role::User,
            content: content.to_string(),
            timestamp: Utc::now(),
            conversation_id: self.conversation_id,
        };
        self.messages.push(user_message);
        self.persist();
        self.error = None;

        let request = ChatRequest {
            message: content.to_string(),
            conversation_id: self.conversation_id,
        };

        loop {
            self.status = ChatStatus::Loading;
            match self.api.send_message(&self.user_id, &request).await {
                Ok(resp) => {
                    info!(
                        conversation_id = resp.conversation_id,
                        "Assistant replied: {}",
                        truncate_str(&resp.message, 120)
                    );
                    self.messages.push(ChatMessage {
                        id: format!("assistant-{}", Uuid::new_v4()),
                        role: Role::Assistant,
                        content: resp.message,
                        timestamp: Utc::now(),
                        conversation_id: Some(resp.conversation_id),
                    });
                    if self.conversation_id.is_none() {
                        self.conversation_id = Some(resp.conversation_id);
                    }
                    self.last_tool_calls = resp.tool_calls.unwrap_or_default();
                    self.persist();
                    self.status = ChatStatus::Connected;
                    self.retry_count = 0;
                    return Ok(());
                }
                Err(e) => {
                    self.status = ChatStatus::Error;
                    self.error = Some(format!("Failed to send message: {}", e));

                    if self.retry_count >= MAX_RETRIES {
                        return Err(e);
                    }
                    let delay = backoff_delay(self.retry_count);
                    self.retry_count += 1;
                    warn!(
                        attempt = self.retry_count,
                        delay_ms = delay.as_millis() as u64,
                        "Send failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Mirror messages and conversation id into the local snapshot.
    fn persist(&self) {
        let snapshot = ConversationSnapshot {
            messages: self.messages.clone(),
            conversation_id: self.conversation_id,
            updated_at: Utc::now(),
        };
        if let Err(e) = self.store.save_conversation(&snapshot) {
            warn!("Failed to persist conversation snapshot: {}", e);
        }
    }
}
