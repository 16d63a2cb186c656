use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which identity provider backs the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthProviderKind {
    Cognito,
    #[default]
    Dev,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub provider: AuthProviderKind,
    pub region: Option<String>,
    pub user_pool_id: Option<String>,
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimecardConfig {
    /// Base URL of the task service; `/api` is appended per request.
    pub api_url: String,
    pub auth: AuthConfig,
}

impl Default for TimecardConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            auth: AuthConfig::default(),
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("timecard")
        .join("config.toml")
}

impl TimecardConfig {
    /// Load the user config, apply environment overrides, and validate.
    /// A missing file is fine (defaults apply); a malformed file, or a
    /// Cognito selection without its settings, halts startup.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file(&config_path())?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("TIMECARD_API_URL") {
            self.api_url = url;
        }
        if let Some(provider) = var("TIMECARD_AUTH_PROVIDER") {
            match provider.to_ascii_lowercase().as_str() {
                "cognito" => self.auth.provider = AuthProviderKind::Cognito,
                "dev" => self.auth.provider = AuthProviderKind::Dev,
                other => log::warn!("Ignoring unknown TIMECARD_AUTH_PROVIDER {:?}", other),
            }
        }
        if let Some(region) = var("TIMECARD_AWS_REGION") {
            self.auth.region = Some(region);
        }
        if let Some(pool) = var("TIMECARD_USER_POOL_ID") {
            self.auth.user_pool_id = Some(pool);
        }
        if let Some(client) = var("TIMECARD_CLIENT_ID") {
            self.auth.client_id = Some(client);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_url must not be empty".into()));
        }
        if self.auth.provider == AuthProviderKind::Cognito {
            let missing: Vec<&str> = [
                ("auth.region", &self.auth.region),
                ("auth.user_pool_id", &self.auth.user_pool_id),
                ("auth.client_id", &self.auth.client_id),
            ]
            .iter()
            .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect();
            if !missing.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "cognito provider requires {}",
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }
}
