//! Application configuration: environment/file loading, validation,
//! and the secret-strength check, ported from `config.rs`'s `Config`.

use crate::compliance::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub api_version: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            endpoint: "https://api.anthropic.com".to_string(),
            api_key: None,
            model: "claude-sonnet-4".to_string(),
            api_version: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub engine_id: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            engine_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub ttl_hours: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/cache"),
            ttl_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub path: PathBuf,
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/history.json"),
            max_entries: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Top-level configuration. Region and prompt assets are files on disk
/// rather than embedded config so they can be edited without a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub regions: PathBuf,
    pub prompts: PathBuf,
    pub cache: CacheConfig,
    pub history: HistoryConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            regions: PathBuf::from("./config/regions.yaml"),
            prompts: PathBuf::from("./config/prompts"),
            cache: CacheConfig::default(),
            history: HistoryConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads defaults, then overlays environment variables. An invalid
    /// `LLM_API_KEY`/`SEARCH_API_KEY` is logged and dropped rather than
    /// failing startup, mirroring the original's auth-token handling.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(provider) = env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(endpoint) = env::var("LLM_ENDPOINT") {
            config.llm.endpoint = endpoint;
        }
        if let Ok(model) = env::var("LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(api_version) = env::var("LLM_API_VERSION") {
            config.llm.api_version = Some(api_version);
        }
        if let Ok(key) = env::var("LLM_API_KEY") {
            match Self::validate_secret(&key) {
                Ok(validated) => config.llm.api_key = Some(validated),
                Err(e) => {
                    tracing::error!("invalid LLM_API_KEY: {e}");
                    eprintln!("ERROR: invalid LLM_API_KEY: {e}");
                }
            }
        }

        if let Ok(key) = env::var("SEARCH_API_KEY") {
            match Self::validate_secret(&key) {
                Ok(validated) => config.search.api_key = Some(validated),
                Err(e) => {
                    tracing::error!("invalid SEARCH_API_KEY: {e}");
                    eprintln!("ERROR: invalid SEARCH_API_KEY: {e}");
                }
            }
        }
        if let Ok(engine_id) = env::var("SEARCH_ENGINE_ID") {
            config.search.engine_id = Some(engine_id);
        }

        if let Ok(regions) = env::var("COMPLIANCE_REGIONS_PATH") {
            config.regions = PathBuf::from(regions);
        }
        if let Ok(prompts) = env::var("COMPLIANCE_PROMPTS_PATH") {
            config.prompts = PathBuf::from(prompts);
        }
        if let Ok(cache_dir) = env::var("COMPLIANCE_CACHE_DIR") {
            config.cache.dir = PathBuf::from(cache_dir);
        }
        if let Ok(ttl) = env::var("COMPLIANCE_CACHE_TTL_HOURS") {
            config.cache.ttl_hours = ttl.parse().map_err(|_| ConfigError::InvalidValue {
                field: "COMPLIANCE_CACHE_TTL_HOURS".to_string(),
                reason: "must be an integer".to_string(),
            })?;
        }
        if let Ok(history_path) = env::var("COMPLIANCE_HISTORY_PATH") {
            config.history.path = PathBuf::from(history_path);
        }

        if let Ok(host) = env::var("COMPLIANCE_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("COMPLIANCE_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                field: "COMPLIANCE_PORT".to_string(),
                reason: "invalid port number".to_string(),
            })?;
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileNotFound(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFailure(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                reason: "port cannot be 0".to_string(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        if self.cache.ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_hours".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        if let Some(key) = &self.llm.api_key {
            Self::validate_secret(key)?;
        }
        if let Some(key) = &self.search.api_key {
            Self::validate_secret(key)?;
        }

        Ok(())
    }

    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        self.llm
            .api_key
            .clone()
            .ok_or_else(|| ConfigError::MissingField("LLM_API_KEY".to_string()))
    }

    /// Rejects empty, too-short (<8 chars), known-weak/default, and
    /// space-containing tokens; returns the trimmed token otherwise.
    fn validate_secret(token: &str) -> Result<String, ConfigError> {
        let trimmed = token.trim();

        if trimmed.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_key".to_string(),
                reason: "key cannot be empty".to_string(),
            });
        }

        const WEAK_TOKENS: &[&str] = &[
            "dev",
            "test",
            "password",
            "secret",
            "token",
            "api_key",
            "12345678",
            "admin",
            "root",
            "default",
            "changeme",
            "letmein",
            "qwerty",
            "abc123",
            "password123",
        ];
        if WEAK_TOKENS.contains(&trimmed.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "api_key".to_string(),
                reason: format!("'{trimmed}' is a known weak/default key; use a real secret"),
            });
        }

        if trimmed.len() < 8 {
            return Err(ConfigError::InvalidValue {
                field: "api_key".to_string(),
                reason: "key must be at least 8 characters".to_string(),
            });
        }

        if trimmed.chars().all(|c| c == trimmed.chars().next().unwrap()) {
            tracing::warn!("api key appears weak (all same character)");
        }

        if trimmed.contains(' ') && !trimmed.starts_with("Bearer ") {
            return Err(ConfigError::InvalidValue {
                field: "api_key".to_string(),
                reason: "key should not contain spaces (unless a Bearer token)".to_string(),
            });
        }

        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn from_env_picks_up_overrides() {
        env::set_var("COMPLIANCE_PORT", "9091");
        env::set_var("LLM_MODEL", "claude-opus-4");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.server.port, 9091);
        assert_eq!(config.llm.model, "claude-opus-4");
        env::remove_var("COMPLIANCE_PORT");
        env::remove_var("LLM_MODEL");
    }

    #[test]
    #[serial]
    fn from_env_drops_weak_api_key_but_does_not_fail() {
        env::set_var("LLM_API_KEY", "test");
        let config = AppConfig::from_env().unwrap();
        assert!(config.llm.api_key.is_none());
        env::remove_var("LLM_API_KEY");
    }

    #[test]
    fn validate_secret_rejects_empty_and_short() {
        assert!(AppConfig::validate_secret("").is_err());
        assert!(AppConfig::validate_secret("short").is_err());
    }

    #[test]
    fn validate_secret_rejects_known_weak_tokens_case_insensitively() {
        assert!(AppConfig::validate_secret("ADMIN").is_err());
        assert!(AppConfig::validate_secret("ChangeMe").is_err());
    }

    #[test]
    fn validate_secret_trims_whitespace() {
        let result = AppConfig::validate_secret("  sk-real-looking-key-123  ").unwrap();
        assert_eq!(result, "sk-real-looking-key-123");
    }

    #[test]
    fn validate_secret_rejects_embedded_spaces() {
        assert!(AppConfig::validate_secret("has a space in it").is_err());
    }

    #[test]
    fn validate_secret_accepts_real_looking_key() {
        assert!(AppConfig::validate_secret("sk-ant-api03-abcdef123456").is_ok());
    }

    #[test]
    fn validate_rejects_bad_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
