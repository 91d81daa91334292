//! Service configuration.
//!
//! Loaded once at startup from `~/.gardenia/config.json` (camelCase keys)
//! and handed to `AppState` — call sites receive the config explicitly
//! rather than reading ambient globals. Credentials may also come from the
//! environment (`GARDENIA_LLM_API_KEY`, `GARDENIA_EMAIL_API_KEY`), which
//! takes precedence over the file so deployments never have to write
//! secrets to disk.

use std::fs;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Explicit database path. Defaults to `~/.gardenia/gardenia.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    #[serde(default = "default_llm_base")]
    pub api_base: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    #[serde(default = "default_email_base")]
    pub api_base: String,
    #[serde(default = "default_email_sender")]
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_llm_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_email_base() -> String {
    "https://api.resend.com".to_string()
}

fn default_email_sender() -> String {
    "Gardenia Concierge <concierge@gardenia.example>".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_llm_base(),
            model: default_llm_model(),
            api_key: None,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_base: default_email_base(),
            sender: default_email_sender(),
            api_key: None,
        }
    }
}

/// Load the config file, falling back to defaults when it does not exist.
/// A present-but-malformed file is an error — silently ignoring it would
/// start the server against the wrong database.
pub fn load_config() -> Result<Config, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    let config_path = home.join(".gardenia").join("config.json");

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .map_err(|e| format!("Failed to read config: {}", e))?;
        serde_json::from_str::<Config>(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?
    } else {
        log::info!(
            "No config file at {}; using defaults",
            config_path.display()
        );
        Config {
            bind_addr: default_bind_addr(),
            ..Default::default()
        }
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(key) = std::env::var("GARDENIA_LLM_API_KEY") {
        if !key.trim().is_empty() {
            config.llm.api_key = Some(key);
        }
    }
    if let Ok(key) = std::env::var("GARDENIA_EMAIL_API_KEY") {
        if !key.trim().is_empty() {
            config.email.api_key = Some(key);
        }
    }
}
