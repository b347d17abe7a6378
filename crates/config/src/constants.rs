//! Fixed weights and caps shared across crates.
//!
//! Values that operators may want to tune live in [`crate::Settings`];
//! the ones here define component semantics and changing them changes
//! behaviour contracts.

/// Intent classifier scoring.
pub mod intent {
    /// Score added per matching pattern.
    pub const PATTERN_MATCH_SCORE: f32 = 0.3;
    /// Extra score when a pattern covers the whole utterance.
    pub const FULL_MATCH_BONUS: f32 = 0.4;
    /// Below this, the classifier emits UNCLEAR.
    pub const UNCLEAR_THRESHOLD: f32 = 0.3;
    /// Context-aware follow-up boost (pronoun + family keyword).
    pub const CONTEXT_BOOST: f32 = 0.3;
    /// Secondary intent must score above this to trigger multi-intent.
    pub const MULTI_INTENT_SECONDARY: f32 = 0.5;
    /// Multi-intent never fires when the primary is at least this sure.
    pub const MULTI_INTENT_PRIMARY_CAP: f32 = 0.9;
    /// Garbage gate: minimum alphanumeric ratio.
    pub const GARBAGE_ALNUM_RATIO: f32 = 0.3;
    /// Garbage gate: maximum consecutive repeats of one character.
    pub const GARBAGE_REPEAT_RUN: usize = 5;
}

/// Product retriever and outlet engine.
pub mod retrieval {
    /// Default k for general category queries.
    pub const DEFAULT_TOP_K: usize = 15;
    /// Plural superlative queries return this many.
    pub const SUPERLATIVE_TOP_K: usize = 3;
    /// Token-sort ratio threshold for the fuzzy fallback.
    pub const FUZZY_THRESHOLD: f64 = 60.0;
    /// Outlet lists are truncated to this many in replies; counts stay exact.
    pub const OUTLET_DISPLAY_CAP: usize = 10;
}

/// Session memory.
pub mod session {
    /// Idle eviction timeout.
    pub const IDLE_TIMEOUT_SECS: u64 = 2 * 60 * 60;
    /// Turns kept per session, oldest dropped.
    pub const HISTORY_CAP: usize = 10;
    /// Bound on remembered context entities.
    pub const ENTITY_CAP: usize = 20;
    /// Bound on `last_shown_products` / `last_shown_outlets`.
    pub const SHOWN_CAP: usize = 5;
    /// Per-turn deadline.
    pub const TURN_DEADLINE_SECS: u64 = 30;
    /// Inbound message length cap in characters.
    pub const MAX_MESSAGE_CHARS: usize = 1000;
}

/// Safe calculator.
pub mod calculator {
    /// Standard SST rate applied when the utterance names none.
    pub const SST_RATE: f64 = 0.06;
}
