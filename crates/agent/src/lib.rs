//! The kopibot conversational engine.
//!
//! One coherent engine replaces the usual pile of competing agent
//! variants: a deterministic pattern-based intent classifier, a slot
//! extractor over closed vocabulary tables, a table-driven planner, a
//! per-session serialised memory store, and a side-effect-free response
//! composer, orchestrated turn by turn by [`Engine`].
//!
//! The engine is a value: construct it with [`Engine::new`] and share it
//! behind an `Arc`. There is no process-global state here beyond the
//! read-only catalogue snapshots it is handed.

pub mod composer;
pub mod engine;
pub mod intent;
pub mod memory;
pub mod planner;
pub mod slots;

pub use composer::Composer;
pub use engine::Engine;
pub use intent::{Classification, IntentClassifier, SessionContextView};
pub use memory::{ContextSnapshot, Preferences, SessionHandle, SessionMemory, SessionState};
pub use planner::{Plan, Planner, PlannerContext};
pub use slots::SlotExtractor;
