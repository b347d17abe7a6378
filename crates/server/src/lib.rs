//! HTTP transport for the kopibot engine.
//!
//! The transport is a thin shell: request validation and session state
//! live in the engine; this crate only maps HTTP to [`TurnRequest`] and
//! back, and exposes the administrative endpoints (session debug,
//! catalogue reload) that stay outside the core turn path.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] kopibot_config::ConfigError),

    #[error("catalogue error: {0}")]
    Catalogue(#[from] kopibot_retrieval::RetrievalError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
