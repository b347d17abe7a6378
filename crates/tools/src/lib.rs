//! Tool executors for the kopibot engine.
//!
//! Each tool wraps one of the CPU-bound engines (product retriever,
//! outlet engine, safe calculator) behind an async [`Tool`] trait with a
//! per-tool timeout. Inputs and outputs are closed tagged variants: the
//! composer pattern-matches on [`ToolOutput`] instead of poking at
//! loosely-typed maps.

pub mod registry;
pub mod tools;

pub use registry::{ToolExecutor, ToolRegistry};
pub use tools::{standard_registry, CalculatorTool, OutletSearchTool, ProductSearchTool};

use async_trait::async_trait;
use thiserror::Error;

use kopibot_calculator::{CalcError, Evaluation};
use kopibot_core::{Product, Slots};
use kopibot_retrieval::OutletQueryResult;

/// Typed tool input. Each tool accepts exactly one variant and rejects
/// the others with [`ToolError::InvalidParams`].
#[derive(Debug, Clone)]
pub enum ToolInput {
    ProductSearch {
        query: String,
        slots: Slots,
        k: usize,
    },
    OutletSearch {
        query: String,
        slots: Slots,
        k: usize,
    },
    Calculator {
        original_query: String,
    },
}

/// Typed, tagged tool results.
///
/// A failed calculation is still a successful tool run; the error kind
/// is data for the composer, which renders a targeted help template.
#[derive(Debug, Clone)]
pub enum ToolOutput {
    Products {
        query: String,
        results: Vec<Product>,
        summary: String,
        /// Size of the full catalogue, so a budget-only query that
        /// matched everything can ask the user to narrow down.
        catalogue_size: usize,
    },
    Outlets {
        query: String,
        result: OutletQueryResult,
    },
    Calculation {
        original_query: String,
        outcome: Result<Evaluation, CalcError>,
    },
}

/// Infrastructure-level tool failures.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("invalid parameters for {tool}: {message}")]
    InvalidParams { tool: String, message: String },

    #[error("tool '{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("tool execution failed: {0}")]
    Execution(String),
}

impl ToolError {
    pub fn invalid_params(tool: &str, message: impl Into<String>) -> Self {
        Self::InvalidParams {
            tool: tool.to_string(),
            message: message.into(),
        }
    }
}

/// Default timeout for tool execution.
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// An executable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Per-tool timeout; the registry enforces it.
    fn timeout_secs(&self) -> u64 {
        DEFAULT_TOOL_TIMEOUT_SECS
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError>;
}
