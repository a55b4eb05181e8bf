//! HTTP client for the task and chat endpoints.
//!
//! Every call attaches the bearer token when one is stored and
//! normalizes any failure, transport or HTTP, into a single
//! [`ApiError`] carrying a human-readable message. Successful bodies
//! are deserialized as-is; the client does no further validation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::auth::AuthSession;
use crate::traits::{ChatApi, TaskApi};
use crate::types::{
    ChatMessage, ChatRequest, ChatResponse, CreateTaskRequest, Task, UpdateTaskRequest,
};
use crate::utils::truncate_str;

/// Normalized request failure: either a transport error or a
/// non-success HTTP status with whatever message the server supplied.
#[derive(Debug)]
pub struct ApiError {
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    /// Build from a non-success response. Prefers the JSON body's
    /// `detail` field, then the canonical status reason.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string));

        let message = detail.unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP error {}", status.as_u16()))
        });

        Self {
            status: Some(status.as_u16()),
            message,
        }
    }

    pub fn network(err: &reqwest::Error) -> Self {
        Self {
            status: None,
            message: err.to_string(),
        }
    }

    fn malformed(err: impl fmt::Display) -> Self {
        Self {
            status: None,
            message: format!("invalid response body: {}", err),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request failed: {}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Validate the API base URL.
/// - HTTPS is always allowed
/// - HTTP is allowed only for localhost (the development backend)
fn validate_base_url(base_url: &str) -> Result<(), String> {
    let parsed = reqwest::Url::parse(base_url)
        .map_err(|e| format!("Invalid base_url '{}': {}", base_url, e))?;

    let scheme = parsed.scheme();
    let host = parsed.host_str().unwrap_or("");

    match scheme {
        "https" => Ok(()),
        "http" => {
            let is_localhost =
                host == "localhost" || host == "127.0.0.1" || host == "[::1]" || host == "::1";

            if is_localhost {
                warn!(
                    "Using unencrypted HTTP for local backend at '{}'. \
                     The bearer token will be transmitted in cleartext.",
                    base_url
                );
                Ok(())
            } else {
                Err(format!(
                    "HTTP is not allowed for remote URLs (base_url: '{}'). \
                     Use HTTPS so the bearer token is protected in transit.",
                    base_url
                ))
            }
        }
        _ => Err(format!(
            "Unsupported URL scheme '{}' in base_url '{}'. Only http and https are allowed.",
            scheme, base_url
        )),
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Arc<AuthSession>,
}

impl ApiClient {
    pub fn new(base_url: &str, auth: Arc<AuthSession>) -> anyhow::Result<Self> {
        validate_base_url(base_url).map_err(|e| anyhow::anyhow!(e))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "API request");
        let mut builder = self
            .client
            .request(method, &url)
            .header("Content-Type", "application/json");
        if let Some(token) = self.auth.token() {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder
    }

    /// Send a request and normalize the outcome. `Ok(None)` means the
    /// server answered 204 (or an empty body) and there is nothing to
    /// parse.
    async fn dispatch(&self, builder: RequestBuilder) -> Result<Option<String>, ApiError> {
        let resp = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                error!("HTTP request failed: {}", e);
                return Err(ApiError::network(&e));
            }
        };

        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let text = resp.text().await.map_err(|e| ApiError::network(&e))?;
        if !status.is_success() {
            error!(status = %status, "API error: {}", truncate_str(&text, 500));
            return Err(ApiError::from_response(status, &text));
        }

        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }

    async fn expect_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self
            .dispatch(builder)
            .await?
            .ok_or_else(|| ApiError::malformed("unexpected empty response"))?;
        serde_json::from_str(&body).map_err(ApiError::malformed)
    }
}

#[async_trait]
impl TaskApi for ApiClient {
    async fn list_tasks(&self, user_id: &str) -> anyhow::Result<Vec<Task>> {
        let builder = self.request(Method::GET, &format!("/{}/tasks", user_id));
        Ok(self.expect_json(builder).await?)
    }

    async fn create_task(&self, user_id: &str, req: &CreateTaskRequest) -> anyhow::Result<Task> {
        let builder = self
            .request(Method::POST, &format!("/{}/tasks", user_id))
            .json(req);
        Ok(self.expect_json(builder).await?)
    }

    async fn get_task(&self, user_id: &str, task_id: i64) -> anyhow::Result<Task> {
        let builder = self.request(Method::GET, &format!("/{}/tasks/{}", user_id, task_id));
        Ok(self.expect_json(builder).await?)
    }

    async fn update_task(
        &self,
        user_id: &str,
        task_id: i64,
        req: &UpdateTaskRequest,
    ) -> anyhow::Result<Task> {
        let builder = self
            .request(Method::PUT, &format!("/{}/tasks/{}", user_id, task_id))
            .json(req);
        Ok(self.expect_json(builder).await?)
    }

    async fn delete_task(&self, user_id: &str, task_id: i64) -> anyhow::Result<()> {
        let builder = self.request(Method::DELETE, &format!("/{}/tasks/{}", user_id, task_id));
        self.dispatch(builder).await?;
        Ok(())
    }

    async fn set_completed(
        &self,
        user_id: &str,
        task_id: i64,
        completed: bool,
    ) -> anyhow::Result<Task> {
        let builder = self.request(
            Method::PATCH,
            &format!("/{}/tasks/{}/complete?completed={}", user_id, task_id, completed),
        );
        Ok(self.expect_json(builder).await?)
    }
}

#[async_trait]
impl ChatApi for ApiClient {
    async fn send_message(
        &self,
        user_id: &str,
        req: &ChatRequest,
    ) -> anyhow::Result<ChatResponse> {
        let builder = self
            .request(Method::POST, &format!("/{}/chat", user_id))
            .json(req);
        let resp: ChatResponse = self.expect_json(builder).await?;
        debug!(
            conversation_id = resp.conversation_id,
            "Assistant reply: {}",
            truncate_str(&resp.message, 200)
        );
        Ok(resp)
    }

    async fn conversation_history(
        &self,
        user_id: &str,
        conversation_id: Option<i64>,
    ) -> anyhow::Result<Vec<ChatMessage>> {
        let path = match conversation_id {
            Some(id) => format!("/{}/chat/{}", user_id, id),
            None => format!("/{}/chat", user_id),
        };
        let builder = self.request(Method::GET, &path);
        Ok(self.expect_json(builder).await?)
    }
}
