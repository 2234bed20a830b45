//! Configuration management for the journal services.
//!
//! The server reads a single configuration file at `~/.journal/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `JOURNAL_BIND_ADDRESS` → network.bind
//! - `JOURNAL_PORT` → network.port
//! - `JOURNAL_JWT_SECRET` → auth.jwt_secret
//! - `JOURNAL_DB_PATH` → database.path
//! - `JOURNAL_LOG_LEVEL` → observability.log_level
//! - `JOURNAL_LOG_FORMAT` → observability.log_format
//! - `OPENAI_API_KEY` → llm.api_key
//! - `OPENAI_BASE_URL` → llm.base_url
//! - `OPENAI_MODEL` → llm.model

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Placeholder shipped in sample `.env` files; treated as "no key".
pub const PLACEHOLDER_API_KEY: &str = "your-openai-api-key-here";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".journal"),
        |dirs| dirs.home_dir().join(".journal"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Listen address of the HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address. Default is `127.0.0.1` (local only).
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

// ============================================================================
// Auth Configuration
// ============================================================================

/// Token issuance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// JWT secret (a development default is used if not set)
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Token expiry in seconds
    #[serde(default = "default_token_expiry")]
    pub token_expiry_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_expiry_secs: default_token_expiry(),
        }
    }
}

fn default_token_expiry() -> u64 {
    3600
}

const DEV_JWT_SECRET: &str = "journal-default-secret-change-me!";

impl AuthConfig {
    /// Whether tokens would be signed with the built-in development secret.
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret.as_deref().map_or(true, str::is_empty)
    }

    /// Secret used to sign tokens.
    pub fn secret(&self) -> String {
        match self.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => secret.to_string(),
            None => {
                tracing::warn!(
                    "No JWT secret configured, signing tokens with the development secret; set JOURNAL_JWT_SECRET"
                );
                DEV_JWT_SECRET.to_string()
            }
        }
    }
}

// ============================================================================
// Database Configuration
// ============================================================================

/// SQLite storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; defaults to `~/.journal/journal.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Resolved database file path.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| config_dir().join("journal.db"))
    }
}

// ============================================================================
// LLM Configuration
// ============================================================================

/// Text-generation provider credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL (without the `/v1/...` suffix)
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Chat model used for analysis
    #[serde(default = "default_llm_model")]
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_llm_base_url(),
            model: default_llm_model(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}

impl LlmConfig {
    /// The usable API key, if any.
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && *key != PLACEHOLDER_API_KEY)
    }

    /// Whether a real API key is configured.
    pub fn is_configured(&self) -> bool {
        self.usable_api_key().is_some()
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup("JOURNAL_BIND_ADDRESS") {
            self.network.bind = bind;
        }
        if let Some(port) = lookup("JOURNAL_PORT") {
            match port.parse() {
                Ok(p) => self.network.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid JOURNAL_PORT"),
            }
        }

        if let Some(secret) = lookup("JOURNAL_JWT_SECRET") {
            self.auth.jwt_secret = Some(secret);
        }

        if let Some(path) = lookup("JOURNAL_DB_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(level) = lookup("JOURNAL_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("JOURNAL_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.llm.model = model;
        }
    }

    /// Socket address for the HTTP listener.
    pub fn listen_address(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .network
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.network.bind))?;
        Ok(SocketAddr::from((ip, self.network.port)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.network.bind, "127.0.0.1");
        assert_eq!(config.network.port, 8000);
        assert_eq!(config.auth.token_expiry_secs, 3600);
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert!(!config.llm.is_configured());
        assert_eq!(config.listen_address().unwrap().to_string(), "127.0.0.1:8000");
    }

    #[test]
    fn test_placeholder_key_is_not_configured() {
        let mut llm = LlmConfig::default();
        llm.api_key = Some(PLACEHOLDER_API_KEY.to_string());
        assert!(!llm.is_configured());

        llm.api_key = Some("   ".to_string());
        assert!(!llm.is_configured());

        llm.api_key = Some("sk-real".to_string());
        assert!(llm.is_configured());
        assert_eq!(llm.usable_api_key(), Some("sk-real"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"network": {"port": 9100}, "llm": {"api_key": "sk-test"}}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.network.port, 9100);
        assert_eq!(config.network.bind, "127.0.0.1");
        assert_eq!(config.llm.base_url, "https://api.openai.com");
        assert!(config.llm.is_configured());
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("JOURNAL_PORT", "9200"),
            ("JOURNAL_JWT_SECRET", "override-secret"),
            ("JOURNAL_DB_PATH", "/tmp/journal-test.db"),
            ("OPENAI_API_KEY", "sk-env"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
        ]);

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.network.port, 9200);
        assert_eq!(config.auth.secret(), "override-secret");
        assert_eq!(
            config.database.resolved_path(),
            PathBuf::from("/tmp/journal-test.db")
        );
        assert_eq!(config.llm.usable_api_key(), Some("sk-env"));
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn test_missing_secret_falls_back_with_warning() {
        use std::sync::{Arc, Mutex};
        use tracing::{Event, Level, Subscriber};
        use tracing_subscriber::layer::{Context, SubscriberExt};
        use tracing_subscriber::util::SubscriberInitExt;
        use tracing_subscriber::Layer;

        #[derive(Clone, Default)]
        struct LevelRecorder(Arc<Mutex<Vec<Level>>>);

        impl<S: Subscriber> Layer<S> for LevelRecorder {
            fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
                self.0.lock().unwrap().push(*event.metadata().level());
            }
        }

        let recorder = LevelRecorder::default();
        let _guard = tracing_subscriber::registry()
            .with(recorder.clone())
            .set_default();

        let mut auth = AuthConfig::default();
        assert!(auth.uses_dev_secret());
        assert_eq!(auth.secret(), DEV_JWT_SECRET);
        assert_eq!(*recorder.0.lock().unwrap(), [Level::WARN]);

        auth.jwt_secret = Some(String::new());
        assert!(auth.uses_dev_secret());

        auth.jwt_secret = Some("configured".into());
        assert!(!auth.uses_dev_secret());
        assert_eq!(auth.secret(), "configured");
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_port_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|name| (name == "JOURNAL_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.network.port, 8000);
    }
}
