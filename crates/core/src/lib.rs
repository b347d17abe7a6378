//! Core domain types for the kopibot conversational engine.
//!
//! This crate defines the data model shared by every component:
//! catalogue entities (products, outlets), the closed intent and action
//! vocabularies, extracted slots, conversation turns, the engine error
//! taxonomy, and the traits through which external collaborators (catalogue
//! loaders, semantic indexes) are consumed.
//!
//! The crate is deliberately dependency-light: no async runtime, no I/O.

pub mod error;
pub mod intent;
pub mod outlet;
pub mod product;
pub mod slots;
pub mod traits;
pub mod turn;

pub use error::EngineError;
pub use intent::{Action, Intent};
pub use outlet::{DayHours, OpeningHours, Outlet, ServiceTag};
pub use product::{parse_price_string, Collection, Feature, Material, Product};
pub use slots::{BudgetRange, CapacityBand, Slots, Superlative, TimeQuery};
pub use traits::{OutletRegistry, ProductIndex, SemanticIndex};
pub use turn::{Turn, TurnMetadata, TurnRequest, TurnResponse, TurnRole};
