//! File-backed key-value persistence for session state.
//!
//! Holds the bearer token, the cached current-user record and the chat
//! conversation snapshot. The snapshot is a mirror of in-memory chat
//! state, never the source of truth; the server's history wins on a
//! fresh session.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{ChatMessage, CurrentUser};

const TOKEN_FILE: &str = "session.token";
const USER_FILE: &str = "current-user.json";
const CONVERSATION_FILE: &str = "conversation.json";

/// Locally persisted copy of a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub messages: Vec<ChatMessage>,
    pub conversation_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn load_token(&self) -> Option<String> {
        let raw = fs::read_to_string(self.dir.join(TOKEN_FILE)).ok()?;
        let token = raw.trim().to_string();
        if token.is_empty() {
            None
        } else {
            Some(token)
        }
    }

    pub fn save_token(&self, token: &str) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(TOKEN_FILE), token)?;
        Ok(())
    }

    pub fn clear_token(&self) {
        remove_if_present(self.dir.join(TOKEN_FILE));
    }

    pub fn load_user(&self) -> Option<CurrentUser> {
        self.read_json(USER_FILE)
    }

    pub fn save_user(&self, user: &CurrentUser) -> anyhow::Result<()> {
        self.write_json(USER_FILE, user)
    }

    pub fn clear_user(&self) {
        remove_if_present(self.dir.join(USER_FILE));
    }

    pub fn load_conversation(&self) -> Option<ConversationSnapshot> {
        self.read_json(CONVERSATION_FILE)
    }

    pub fn save_conversation(&self, snapshot: &ConversationSnapshot) -> anyhow::Result<()> {
        self.write_json(CONVERSATION_FILE, snapshot)
    }

    /// Absent file means absent value; a corrupt file is logged and
    /// treated the same so a bad write never wedges the client.
    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(file = %path.display(), "Discarding unreadable state file: {}", e);
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let data = serde_json::to_string_pretty(value)?;
        fs::write(self.dir.join(name), data)?;
        Ok(())
    }
}

fn remove_if_present(path: PathBuf) {
    if let Err(e) = fs::remove_file(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(file = %path.display(), "Failed to remove state file: {}", e);
        }
    }
}
