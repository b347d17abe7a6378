//! Conversation turn records and the inbound/outbound turn interface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::intent::Intent;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// Per-turn bookkeeping attached to the assistant side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnMetadata {
    #[serde(default)]
    pub confidence: Option<f32>,
    /// Name of the tool that produced the reply, if any.
    #[serde(default)]
    pub tool: Option<String>,
}

/// An immutable record of one message within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    #[serde(default)]
    pub intent: Option<Intent>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: TurnMetadata,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
            intent: None,
            timestamp: Utc::now(),
            metadata: TurnMetadata::default(),
        }
    }

    pub fn assistant(text: impl Into<String>, intent: Intent, metadata: TurnMetadata) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
            intent: Some(intent),
            timestamp: Utc::now(),
            metadata,
        }
    }
}

/// One inbound request to the engine.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// The engine's reply for one turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub message: String,
    pub session_id: String,
    pub intent: Intent,
    pub confidence: f32,
}
