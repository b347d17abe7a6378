//! Engine error taxonomy.
//!
//! Tools return tagged results rather than raising; only the failures
//! that escape to the transport layer live here. Everything else (empty
//! results, calculator errors, malicious input) surfaces as a composed
//! reply with an intent, not as an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected before classification: empty or over-long message.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A tool did not answer within the turn deadline.
    #[error("tool '{0}' timed out")]
    ToolTimeout(String),

    /// A tool is not registered or cannot run.
    #[error("tool unavailable: {0}")]
    ToolUnavailable(String),

    /// Caught at the outermost boundary; never shown to users verbatim.
    #[error("internal error: {0}")]
    Internal(String),
}
