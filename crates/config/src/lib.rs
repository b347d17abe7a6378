//! Configuration for the kopibot engine.
//!
//! Three layers live here:
//! - [`Settings`]: runtime tunables, loaded from defaults, an optional
//!   TOML file, and `KOPIBOT_`-prefixed environment variables.
//! - [`Vocabulary`]: the closed-vocabulary alias tables (materials,
//!   features, collections, services, cities, landmarks) consulted by the
//!   slot extractor and the outlet engine. Compiled defaults, overridable
//!   from YAML.
//! - [`constants`]: fixed scoring weights and caps shared across crates.

pub mod constants;
pub mod settings;
pub mod vocabulary;

pub use settings::{
    CalculatorConfig, DataConfig, EngineConfig, RetrievalConfig, ServerConfig, Settings,
};
pub use vocabulary::Vocabulary;

use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to read vocabulary file: {0}")]
    VocabularyIo(#[from] std::io::Error),

    #[error("failed to parse vocabulary file: {0}")]
    VocabularyParse(#[from] serde_yaml::Error),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}
