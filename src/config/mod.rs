// Environment-driven configuration
// All settings come from the process environment, with a local .env file
// taking precedence so a checked-out project can override a shell profile.


use std::env;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_STORE_PATH: &str = "./.lancedb";
pub const DEFAULT_COLLECTION: &str = "book_summaries";
pub const DEFAULT_CATALOG_PATH: &str = "data/book_summaries.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid API base URL: {0}")]
    InvalidApiBase(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid collection name: {0} (cannot be empty)")]
    InvalidCollection(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// API key for the embedding and chat provider. Absence is not fatal
    /// here; it is surfaced by the health diagnostic and by provider
    /// authentication failures.
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub api_base: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub store_path: PathBuf,
    pub collection: String,
    pub catalog_path: PathBuf,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            api_key: None,
            organization: None,
            api_base: DEFAULT_API_BASE.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            collection: DEFAULT_COLLECTION.to_string(),
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
        }
    }
}

impl Config {
    /// Read configuration from the environment, after loading `.env` with
    /// override semantics (values in the file win over inherited ones).
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv_override() {
            Ok(path) => debug!("Loaded environment overrides from {}", path.display()),
            Err(e) if e.not_found() => debug!("No .env file found"),
            Err(e) => debug!("Ignoring unreadable .env file: {}", e),
        }

        let config = Self {
            api_key: non_empty_var("OPENAI_API_KEY"),
            organization: non_empty_var("OPENAI_ORG_ID"),
            api_base: var_or("OPENAI_BASE_URL", DEFAULT_API_BASE),
            embedding_model: var_or("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            chat_model: var_or("CHAT_MODEL", DEFAULT_CHAT_MODEL),
            store_path: PathBuf::from(var_or("VECTOR_STORE_PATH", DEFAULT_STORE_PATH)),
            collection: var_or("VECTOR_COLLECTION", DEFAULT_COLLECTION),
            catalog_path: PathBuf::from(var_or("BOOK_CATALOG_PATH", DEFAULT_CATALOG_PATH)),
        };

        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.api_base)
            .map_err(|_| ConfigError::InvalidApiBase(self.api_base.clone()))?;

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }
        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }
        if self.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(self.collection.clone()));
        }

        Ok(())
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Render a credential for display without revealing it.
#[inline]
pub fn mask_key(key: Option<&str>) -> String {
    let Some(k) = key else {
        return "(none)".to_string();
    };
    let chars: Vec<char> = k.chars().collect();
    let (head, tail) = if chars.len() <= 12 { (4, 2) } else { (6, 4) };
    let head: String = chars.iter().take(head).collect();
    let tail: String = chars[chars.len().saturating_sub(tail)..].iter().collect();
    format!("{}...{}", head, tail)
}
