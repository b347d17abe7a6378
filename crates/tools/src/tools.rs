//! The three tool executors.

use std::sync::Arc;

use async_trait::async_trait;

use kopibot_calculator::SafeCalculator;
use kopibot_retrieval::{OutletEngine, ProductRetriever};

use crate::{Tool, ToolError, ToolInput, ToolOutput};

/// Product retrieval tool (C2 behind the tool seam).
pub struct ProductSearchTool {
    retriever: Arc<ProductRetriever>,
}

impl ProductSearchTool {
    pub const NAME: &'static str = "product_search";

    pub fn new(retriever: Arc<ProductRetriever>) -> Self {
        Self { retriever }
    }
}

#[async_trait]
impl Tool for ProductSearchTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Search the product catalogue with structured filters"
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        let ToolInput::ProductSearch { query, slots, k } = input else {
            return Err(ToolError::invalid_params(
                Self::NAME,
                "expected a product search input",
            ));
        };

        let results = self.retriever.search(&query, &slots, k);
        let summary = self.retriever.summarise(&query, &results);
        tracing::debug!(query = %query, results = results.len(), "product search");

        Ok(ToolOutput::Products {
            query,
            results,
            summary,
            catalogue_size: self.retriever.catalogue_size(),
        })
    }
}

/// Outlet query tool (C3 behind the tool seam).
pub struct OutletSearchTool {
    engine: Arc<OutletEngine>,
}

impl OutletSearchTool {
    pub const NAME: &'static str = "outlet_search";

    pub fn new(engine: Arc<OutletEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Tool for OutletSearchTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Resolve outlet questions to a filtered outlet set"
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        let ToolInput::OutletSearch { query, slots, k } = input else {
            return Err(ToolError::invalid_params(
                Self::NAME,
                "expected an outlet search input",
            ));
        };

        let result = self.engine.search(&query, &slots, k);
        tracing::debug!(query = %query, total = result.total, "outlet search");

        Ok(ToolOutput::Outlets { query, result })
    }
}

/// Safe calculator tool (C1 behind the tool seam).
///
/// A failed evaluation is a successful tool run; the classified error
/// travels in the output so the composer can pick a help template.
pub struct CalculatorTool {
    calculator: Arc<SafeCalculator>,
}

impl CalculatorTool {
    pub const NAME: &'static str = "calculator";

    pub fn new(calculator: Arc<SafeCalculator>) -> Self {
        Self { calculator }
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Evaluate unambiguous arithmetic from natural language"
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, ToolError> {
        let ToolInput::Calculator { original_query } = input else {
            return Err(ToolError::invalid_params(
                Self::NAME,
                "expected a calculator input",
            ));
        };

        let outcome = self.calculator.evaluate(&original_query);
        if let Err(kind) = &outcome {
            tracing::debug!(query = %original_query, kind = %kind, "calculation rejected");
        }

        Ok(ToolOutput::Calculation {
            original_query,
            outcome,
        })
    }
}

/// Wire the three standard tools into a registry.
pub fn standard_registry(
    retriever: Arc<ProductRetriever>,
    outlets: Arc<OutletEngine>,
    calculator: Arc<SafeCalculator>,
) -> crate::ToolRegistry {
    let mut registry = crate::ToolRegistry::new();
    registry.register(ProductSearchTool::new(retriever));
    registry.register(OutletSearchTool::new(outlets));
    registry.register(CalculatorTool::new(calculator));
    tracing::info!(tools = registry.len(), "tool registry created");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolExecutor;
    use kopibot_config::Vocabulary;
    use kopibot_core::{Material, Product, Slots};
    use kopibot_retrieval::{InMemoryOutletRegistry, InMemoryProductIndex};

    fn fixture_registry() -> crate::ToolRegistry {
        let products = vec![Product {
            name: "OG Tumbler".to_string(),
            price: "RM 79.00".to_string(),
            numeric_price: 79.0,
            regular_price: None,
            category: "tumbler".to_string(),
            description: None,
            capacity: Some("500ml".to_string()),
            material: Material::StainlessSteel,
            colors: vec![],
            features: vec![],
            collection: None,
            promotion: None,
            on_sale: false,
        }];
        let index = Arc::new(InMemoryProductIndex::new(products).unwrap());
        let retriever = Arc::new(ProductRetriever::new(index));

        let outlets = Arc::new(InMemoryOutletRegistry::new(vec![]).unwrap());
        let engine = Arc::new(OutletEngine::new(outlets, Arc::new(Vocabulary::default())));

        standard_registry(retriever, engine, Arc::new(SafeCalculator::default()))
    }

    #[tokio::test]
    async fn all_three_tools_are_registered() {
        let registry = fixture_registry();
        assert!(registry.has(ProductSearchTool::NAME));
        assert!(registry.has(OutletSearchTool::NAME));
        assert!(registry.has(CalculatorTool::NAME));
    }

    #[tokio::test]
    async fn product_tool_returns_tagged_results() {
        let registry = fixture_registry();
        let mut slots = Slots::default();
        slots.keywords = vec!["tumbler".to_string()];

        let output = registry
            .execute(
                ProductSearchTool::NAME,
                ToolInput::ProductSearch {
                    query: "tumbler".to_string(),
                    slots,
                    k: 15,
                },
            )
            .await
            .unwrap();

        match output {
            ToolOutput::Products { results, .. } => assert_eq!(results.len(), 1),
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[tokio::test]
    async fn calculator_tool_carries_classified_errors() {
        let registry = fixture_registry();
        let output = registry
            .execute(
                CalculatorTool::NAME,
                ToolInput::Calculator {
                    original_query: "5 / 0".to_string(),
                },
            )
            .await
            .unwrap();

        match output {
            ToolOutput::Calculation { outcome, .. } => {
                assert!(matches!(
                    outcome,
                    Err(kopibot_calculator::CalcError::DivisionByZero)
                ));
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[tokio::test]
    async fn wrong_input_variant_is_invalid_params() {
        let registry = fixture_registry();
        let result = registry
            .execute(
                CalculatorTool::NAME,
                ToolInput::ProductSearch {
                    query: "x".to_string(),
                    slots: Slots::default(),
                    k: 1,
                },
            )
            .await;
        assert!(matches!(result, Err(ToolError::InvalidParams { .. })));
    }
}
