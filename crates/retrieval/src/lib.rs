//! Retrieval over the curated catalogues.
//!
//! Two engines live here: the product retriever (structured filters, an
//! optional injected semantic ranker, lexical matching, and a fuzzy
//! fallback for typos) and the outlet query engine (conjunctive filters
//! over an in-memory registry). Both operate on immutable snapshots and
//! never execute user-supplied query text.

pub mod fuzzy;
pub mod outlet;
pub mod product;

pub use outlet::{
    hours_for_day, resolve_hours, AppliedFilters, HoursAnswer, InMemoryOutletRegistry,
    OutletEngine, OutletQueryResult,
};
pub use product::{InMemoryProductIndex, ProductRetriever};

use thiserror::Error;

/// Catalogue loading failures.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("failed to read catalogue file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalogue file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("catalogue entry invalid: {0}")]
    Invalid(String),
}
