use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    /// Base URL of the auth service. Defaults to the API base URL with
    /// its `/api` suffix stripped (the auth endpoint is not under `/api`).
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StateConfig {
    /// Directory for locally persisted state (token, cached user,
    /// conversation snapshot). Defaults to the platform config dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load `config.toml` if present, otherwise fall back to defaults.
    /// `TICKTASK_API_URL` and `TICKTASK_AUTH_URL` override the file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            AppConfig::default()
        };

        if let Ok(url) = std::env::var("TICKTASK_API_URL") {
            if !url.is_empty() {
                config.api.base_url = url;
            }
        }
        if let Ok(url) = std::env::var("TICKTASK_AUTH_URL") {
            if !url.is_empty() {
                config.auth.base_url = Some(url);
            }
        }

        Ok(config)
    }

    pub fn auth_base_url(&self) -> String {
        match &self.auth.base_url {
            Some(url) => url.clone(),
            None => {
                let trimmed = self.api.base_url.trim_end_matches('/');
                trimmed.strip_suffix("/api").unwrap_or(trimmed).to_string()
            }
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        match &self.state.dir {
            Some(dir) => dir.clone(),
            None => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ticktask"),
        }
    }
}
