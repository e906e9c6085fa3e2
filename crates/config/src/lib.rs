//! Configuration loading, validation, and management for sandloop.
//!
//! Loads configuration from `~/.sandloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// The root configuration structure.
///
/// Maps directly to `~/.sandloop/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the generation provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible generation endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default)]
    pub default_temperature: f32,

    /// Default max tokens per generation response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_max_tokens: Option<u32>,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Sandbox executor settings
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Session store settings
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("agent", &self.agent)
            .field("sandbox", &self.sandbox)
            .field("store", &self.store)
            .finish()
    }
}

/// Agent loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum loop steps per invocation
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// How many past real user turns to feed back (-1 = unbounded)
    #[serde(default = "default_history_turns")]
    pub history_turns: i64,

    /// Whether windowed history keeps intermediate reasoning messages
    #[serde(default = "default_true")]
    pub include_reasoning: bool,

    /// Enforce the step schema on generation calls instead of parsing
    /// free-form text
    #[serde(default)]
    pub structured_steps: bool,

    /// What to do when definition replay fails at the start of a turn
    #[serde(default)]
    pub rehydration: RehydrationPolicy,

    /// Idle session state is evicted after this many seconds
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Directory tabular payloads are written to
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Behavior when replaying persisted definitions fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RehydrationPolicy {
    /// Log the failure and continue with the partially rebuilt namespace.
    #[default]
    Proceed,
    /// Fail the turn before any new code runs.
    Abort,
}

fn default_max_steps() -> usize {
    15
}
fn default_history_turns() -> i64 {
    -1
}
fn default_true() -> bool {
    true
}
fn default_session_ttl_secs() -> u64 {
    1800
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            history_turns: default_history_turns(),
            include_reasoning: default_true(),
            structured_steps: false,
            rehydration: RehydrationPolicy::default(),
            session_ttl_secs: default_session_ttl_secs(),
            data_dir: default_data_dir(),
        }
    }
}

/// Sandbox executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Base URL of the executor sidecar
    #[serde(default = "default_sandbox_url")]
    pub url: String,

    /// Per-execution timeout in seconds
    #[serde(default = "default_sandbox_timeout_secs")]
    pub timeout_secs: u64,

    /// Import roots executed code is allowed to use; rendered into the
    /// system prompt
    #[serde(default = "default_authorized_imports")]
    pub authorized_imports: Vec<String>,
}

fn default_sandbox_url() -> String {
    "http://localhost:8001".into()
}
fn default_sandbox_timeout_secs() -> u64 {
    60
}
fn default_authorized_imports() -> Vec<String> {
    ["math", "datetime", "re", "json", "csv", "pandas"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            url: default_sandbox_url(),
            timeout_secs: default_sandbox_timeout_secs(),
            authorized_imports: default_authorized_imports(),
        }
    }
}

/// Session store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend: "sqlite" or "in_memory"
    #[serde(default = "default_store_backend")]
    pub backend: String,

    /// SQLite database path
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Session records expire this many seconds after first write
    #[serde(default = "default_store_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_store_path() -> String {
    "sandloop.db".into()
}
fn default_store_ttl_secs() -> u64 {
    86_400
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
            ttl_secs: default_store_ttl_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            default_model: default_model(),
            default_temperature: 0.0,
            default_max_tokens: None,
            agent: AgentConfig::default(),
            sandbox: SandboxConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// The default config file path: `~/.sandloop/config.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sandloop")
            .join("config.toml")
    }

    /// Load from the given path, falling back to defaults when the file is
    /// missing, then apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment overrides, highest precedence. `SANDLOOP_API_KEY` wins
    /// over the generic provider keys.
    fn apply_env_overrides(&mut self) {
        for key in ["SANDLOOP_API_KEY", "LLM_API_KEY", "OPENAI_API_KEY"] {
            if let Ok(v) = std::env::var(key)
                && !v.is_empty()
            {
                self.api_key = Some(v);
                break;
            }
        }
        if let Ok(v) = std::env::var("SANDLOOP_API_URL")
            && !v.is_empty()
        {
            self.api_url = v;
        }
        if let Ok(v) = std::env::var("SANDLOOP_MODEL")
            && !v.is_empty()
        {
            self.default_model = v;
        }
        if let Ok(v) = std::env::var("SANDLOOP_SANDBOX_URL")
            && !v.is_empty()
        {
            self.sandbox.url = v;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_steps == 0 {
            return Err(ConfigError::Invalid("agent.max_steps must be >= 1".into()));
        }
        if self.agent.history_turns < -1 {
            return Err(ConfigError::Invalid(
                "agent.history_turns must be -1 (unbounded) or >= 0".into(),
            ));
        }
        match self.store.backend.as_str() {
            "sqlite" | "in_memory" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown store backend: {other}"
                )));
            }
        }
        if self.api_key.is_none() {
            warn!("No API key configured; generation calls will fail");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_steps, 15);
        assert_eq!(config.agent.history_turns, -1);
        assert_eq!(config.agent.rehydration, RehydrationPolicy::Proceed);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_model, default_model());
    }

    #[test]
    fn load_parses_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
default_model = "gpt-4o"

[agent]
max_steps = 5
history_turns = 2
rehydration = "abort"

[store]
backend = "in_memory"
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.default_model, "gpt-4o");
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.agent.history_turns, 2);
        assert_eq!(config.agent.rehydration, RehydrationPolicy::Abort);
        assert_eq!(config.store.backend, "in_memory");
    }

    #[test]
    fn zero_max_steps_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
