//! Configuration settings for Closer.

use crate::error::{CloserError, Result};
use crate::tools::ProductRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the OpenAI API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub openai: OpenAISettings,
    pub agent: AgentSettings,
    pub google: GoogleSettings,
    pub meetings: MeetingSettings,
    pub catalog: CatalogSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.closer".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAISettings {
    /// Chat model used by the agent.
    pub model: String,
    /// Sampling temperature. Zero keeps tool selection deterministic.
    pub temperature: f32,
    /// API key. The OPENAI_API_KEY environment variable takes precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            api_key: None,
            timeout_seconds: 300,
        }
    }
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum model calls per user message.
    pub max_iterations: usize,
    /// Conversation memory size before old exchanges are dropped.
    pub max_history_messages: usize,
    /// Replaces the default system prompt when set.
    pub system_prompt: Option<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            max_history_messages: 40,
            system_prompt: None,
        }
    }
}

/// Google OAuth and API endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client secrets downloaded from the Google Cloud console.
    pub client_secrets_path: String,
    /// Where the authorized token record is persisted.
    pub token_path: String,
    /// Scopes requested during consent.
    pub scopes: Vec<String>,
    /// Consent endpoint, used when the client secrets file omits it.
    pub auth_uri: String,
    /// Token endpoint, used when the client secrets file omits it.
    pub token_uri: String,
    /// Gmail API base URL.
    pub gmail_api_base: String,
    /// Calendar API base URL.
    pub calendar_api_base: String,
    /// Calendar that receives scheduled meetings.
    pub calendar_id: String,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            client_secrets_path: "~/.closer/credentials.json".to_string(),
            token_path: "~/.closer/token.json".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/gmail.send".to_string(),
                "https://www.googleapis.com/auth/calendar".to_string(),
            ],
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            gmail_api_base: "https://gmail.googleapis.com/gmail/v1".to_string(),
            calendar_api_base: "https://www.googleapis.com/calendar/v3".to_string(),
            calendar_id: "primary".to_string(),
        }
    }
}

/// Defaults for scheduled meetings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingSettings {
    /// Event title.
    pub summary: String,
    /// Event description.
    pub description: String,
    /// Duration used when the request does not give one.
    pub default_duration_minutes: i64,
    /// Time zone label attached to start and end.
    pub time_zone: String,
}

impl Default for MeetingSettings {
    fn default() -> Self {
        Self {
            summary: "Sales Meeting".to_string(),
            description: "Sales meeting scheduled by AI Sales Agent".to_string(),
            default_duration_minutes: 60,
            time_zone: "UTC".to_string(),
        }
    }
}

/// Product catalog additions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CatalogSettings {
    /// Records merged over the built-in table, keyed by id.
    pub products: Vec<ProductRecord>,
}

/// HTTP session server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CloserError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("closer")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded client secrets path.
    pub fn client_secrets_path(&self) -> PathBuf {
        Self::expand_path(&self.google.client_secrets_path)
    }

    /// Get the expanded token file path.
    pub fn token_path(&self) -> PathBuf {
        Self::expand_path(&self.google.token_path)
    }

    /// Resolve the OpenAI API key.
    ///
    /// The environment wins over the config file. A missing or blank key is
    /// a configuration error so startup fails before any request is made.
    pub fn api_key(&self) -> Result<String> {
        let from_env = std::env::var(API_KEY_ENV).ok();
        Self::resolve_api_key(from_env, self.openai.api_key.clone())
    }

    fn resolve_api_key(from_env: Option<String>, from_file: Option<String>) -> Result<String> {
        from_env
            .into_iter()
            .chain(from_file)
            .map(|k| k.trim().to_string())
            .find(|k| !k.is_empty())
            .ok_or_else(|| {
                CloserError::Config(format!(
                    "{} not set. Set it with: export {}='sk-...' or add it to .env",
                    API_KEY_ENV, API_KEY_ENV
                ))
            })
    }
}
