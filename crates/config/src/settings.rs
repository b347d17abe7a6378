//! Main settings module.
//!
//! Layering: compiled defaults, then an optional TOML file, then
//! `KOPIBOT_`-prefixed environment variables (double underscore as the
//! section separator, e.g. `KOPIBOT_SERVER__PORT=8080`).

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{calculator, retrieval, session};
use crate::ConfigError;

/// Main application settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub calculator: CalculatorConfig,

    #[serde(default)]
    pub data: DataConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty means same-origin only.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

/// Conversation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Display name of the chain, used in composed replies.
    #[serde(default = "default_chain_name")]
    pub chain_name: String,
    /// Sessions idle longer than this are evicted.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
    /// Per-turn deadline for tool dispatch.
    #[serde(default = "default_turn_deadline")]
    pub turn_deadline_secs: u64,
    /// Inbound message length cap.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

fn default_chain_name() -> String {
    "KopiGo Coffee".to_string()
}

fn default_session_timeout() -> u64 {
    session::IDLE_TIMEOUT_SECS
}

fn default_turn_deadline() -> u64 {
    session::TURN_DEADLINE_SECS
}

fn default_max_message_chars() -> usize {
    session::MAX_MESSAGE_CHARS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_name: default_chain_name(),
            session_timeout_secs: default_session_timeout(),
            turn_deadline_secs: default_turn_deadline(),
            max_message_chars: default_max_message_chars(),
        }
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_k: usize,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

fn default_top_k() -> usize {
    retrieval::DEFAULT_TOP_K
}

fn default_fuzzy_threshold() -> f64 {
    retrieval::FUZZY_THRESHOLD
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_top_k(),
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

/// Calculator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatorConfig {
    /// Standard SST rate as a fraction.
    #[serde(default = "default_sst_rate")]
    pub sst_rate: f64,
}

fn default_sst_rate() -> f64 {
    calculator::SST_RATE
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self { sst_rate: default_sst_rate() }
    }
}

/// Catalogue data sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_products_path")]
    pub products_path: String,
    #[serde(default = "default_outlets_path")]
    pub outlets_path: String,
    /// Optional YAML vocabulary override.
    #[serde(default)]
    pub vocabulary_path: Option<String>,
}

fn default_products_path() -> String {
    "data/products.json".to_string()
}

fn default_outlets_path() -> String {
    "data/outlets.json".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            products_path: default_products_path(),
            outlets_path: default_outlets_path(),
            vocabulary_path: None,
        }
    }
}

impl Settings {
    /// Load settings from the default file location (`config/kopibot.toml`),
    /// falling back to compiled defaults, with environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config/kopibot.toml")
    }

    /// Load settings from a specific file path (the file may be absent).
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let settings: Settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("KOPIBOT").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        tracing::debug!(config_file = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Validate cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_message_chars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.max_message_chars".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.engine.turn_deadline_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.turn_deadline_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.calculator.sst_rate) {
            return Err(ConfigError::InvalidValue {
                field: "calculator.sst_rate".to_string(),
                message: "must be a fraction in [0, 1)".to_string(),
            });
        }
        if self.retrieval.default_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retrieval.default_k".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
