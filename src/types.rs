//! Wire and domain types shared across the client.
//!
//! Everything here mirrors the server's JSON shapes; the client does no
//! schema validation beyond what serde enforces during deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task priority as stored by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Numeric rank for sorting: high > medium > low.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority '{}'", other)),
        }
    }
}

/// Recurrence pattern for repeating tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    None,
    Daily,
    Weekly,
    Monthly,
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recurrence::None => write!(f, "none"),
            Recurrence::Daily => write!(f, "daily"),
            Recurrence::Weekly => write!(f, "weekly"),
            Recurrence::Monthly => write!(f, "monthly"),
        }
    }
}

impl std::str::FromStr for Recurrence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Recurrence::None),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            other => Err(format!("unknown recurrence '{}'", other)),
        }
    }
}

/// A task as returned by the server. IDs and timestamps are
/// server-assigned; the client never fabricates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    pub user_id: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body for `POST /{user}/tasks`. Unset optional fields are omitted so
/// the server applies its own defaults.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
}

/// Body for `PUT /{user}/tasks/{id}`. Only the supplied fields change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// A single chat message. IDs are client-generated for optimistic
/// entries and server-assigned in fetched history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<i64>,
}

/// Body for `POST /{user}/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: Option<i64>,
}

/// One executed assistant tool invocation, reported back verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool: String,
    pub result: Value,
}

/// Response from `POST /{user}/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: i64,
    pub message: String,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallResult>>,
}

/// Response from `POST /auth/login` (dev-mode auth).
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_id: String,
}

/// Lightweight user record cached locally for display purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Chat connection status surfaced next to the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    Idle,
    Loading,
    Connected,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
        let p: Priority = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(p, Priority::Medium);
    }

    #[test]
    fn priority_rank_orders_high_first() {
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
    }

    #[test]
    fn recurrence_display_matches_wire_casing() {
        for recurrence in [
            Recurrence::None,
            Recurrence::Daily,
            Recurrence::Weekly,
            Recurrence::Monthly,
        ] {
            let displayed = recurrence.to_string();
            let wire = serde_json::to_string(&recurrence).unwrap();
            assert_eq!(wire, format!("\"{}\"", displayed));
            assert_eq!(displayed.parse::<Recurrence>().unwrap(), recurrence);
        }
    }

    #[test]
    fn create_request_omits_unset_fields() {
        let req = CreateTaskRequest {
            title: "Buy milk".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({ "title": "Buy milk" }));
    }

    #[test]
    fn chat_response_tolerates_missing_tool_calls() {
        let resp: ChatResponse =
            serde_json::from_str(r#"{"conversation_id": 7, "message": "done"}"#).unwrap();
        assert_eq!(resp.conversation_id, 7);
        assert!(resp.tool_calls.is_none());
    }

    #[test]
    fn task_roundtrips_optional_fields() {
        let json = r#"{
            "id": 1,
            "title": "Write report",
            "completed": false,
            "user_id": "me@example.com",
            "priority": "low",
            "created_at": "2026-01-02T03:04:05Z",
            "updated_at": "2026-01-02T03:04:05Z"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert!(task.description.is_none());
        assert!(task.due_date.is_none());
        assert!(task.recurrence.is_none());
    }
}
