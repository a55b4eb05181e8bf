//! Authentication session: bearer-token storage and dev-mode login.
//!
//! The token is an opaque credential. `unverified_user_id` decodes the
//! JWT payload without checking the signature; it exists purely to
//! recover the user identifier the server put there and must never be
//! treated as proof of authentication.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::info;

use crate::api::ApiError;
use crate::store::LocalStore;
use crate::types::{CurrentUser, LoginResponse};

pub struct AuthSession {
    store: Arc<LocalStore>,
    base_url: String,
    client: Client,
}

impl AuthSession {
    pub fn new(store: Arc<LocalStore>, base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            store,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn token(&self) -> Option<String> {
        self.store.load_token()
    }

    pub fn set_token(&self, token: &str) -> anyhow::Result<()> {
        self.store.save_token(token)
    }

    /// Removes the token and the cached user record. Used on logout.
    pub fn clear_session(&self) {
        self.store.clear_token();
        self.store.clear_user();
    }

    /// True iff a token is present. No validity check: a stale token is
    /// only detected by the next API call failing.
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        self.store.load_user()
    }

    pub fn set_current_user(&self, user: &CurrentUser) -> anyhow::Result<()> {
        self.store.save_user(user)
    }

    /// The user identifier claimed by the stored token, without any
    /// signature verification. `None` covers both "no token" and
    /// "token whose payload cannot be decoded".
    pub fn unverified_user_id(&self) -> Option<String> {
        self.token().and_then(|t| unverified_user_id(&t))
    }

    /// Dev-mode login: the email is the identity, the server issues a
    /// token without password verification. Stores the token and a small
    /// user record on success.
    pub async fn login(&self, email: &str) -> anyhow::Result<LoginResponse> {
        let url = format!("{}/auth/login", self.base_url);
        let body = json!({ "user_id": email });

        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::network(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_response(status, &text).into());
        }

        let data: LoginResponse = resp.json().await.map_err(|e| ApiError::network(&e))?;
        self.set_token(&data.access_token)?;
        self.set_current_user(&CurrentUser {
            email: data.user_id.clone(),
            name: None,
        })?;
        info!(user_id = %data.user_id, "Logged in");
        Ok(data)
    }

    /// Dev-mode signup: requests a token exactly like login, then keeps
    /// the provided display name alongside the email.
    pub async fn signup(&self, email: &str, name: &str) -> anyhow::Result<LoginResponse> {
        let data = self.login(email).await?;
        self.set_current_user(&CurrentUser {
            email: data.user_id.clone(),
            name: Some(name.to_string()),
        })?;
        Ok(data)
    }
}

/// Decode the user identifier from a JWT's payload segment without
/// verifying the signature.
///
/// Returns `None` for anything other than a three-segment token whose
/// middle segment base64-decodes to JSON carrying a non-empty `user_id`
/// or `sub` claim. Malformed input never panics or errors loudly so a
/// bad token degrades to "no identity".
pub fn unverified_user_id(token: &str) -> Option<String> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    // JWT payloads are base64url without padding; pad back to a multiple
    // of four. Fall back to the standard alphabet for tolerance.
    let payload = parts[1];
    let padded = format!("{}{}", payload, "=".repeat((4 - payload.len() % 4) % 4));
    let bytes = URL_SAFE
        .decode(padded.as_bytes())
        .or_else(|_| STANDARD.decode(padded.as_bytes()))
        .ok()?;

    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims
        .get("user_id")
        .and_then(Value::as_str)
        .or_else(|| claims.get("sub").and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
