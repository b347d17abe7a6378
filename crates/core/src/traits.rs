//! Traits for consumed collaborators.
//!
//! The engine never loads catalogues itself; it consumes already-built
//! indexes through these traits. `all()` hands out an `Arc` snapshot so a
//! future hot-reload can publish a new catalogue atomically while
//! in-flight turns keep a consistent view.

use std::sync::Arc;

use crate::outlet::Outlet;
use crate::product::Product;

/// Read-only product catalogue.
pub trait ProductIndex: Send + Sync {
    /// The full catalogue snapshot.
    fn all(&self) -> Arc<Vec<Product>>;
}

/// Optional semantic ranking capability over the product catalogue.
///
/// Injected into the product retriever when an embedding model is
/// available; the retriever functions fully without it.
pub trait SemanticIndex: Send + Sync {
    fn semantic(&self, query: &str, k: usize) -> Vec<Product>;
}

/// Read-only outlet registry.
pub trait OutletRegistry: Send + Sync {
    /// The full outlet snapshot.
    fn all(&self) -> Arc<Vec<Outlet>>;
}
