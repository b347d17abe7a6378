//! Tool registration, discovery, and timeout-guarded execution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::{Tool, ToolError, ToolInput, ToolOutput};

/// Executes tools by name. Split from [`ToolRegistry`] so the engine can
/// hold a trait object and tests can substitute stubs.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, input: ToolInput) -> Result<ToolOutput, ToolError>;

    fn tool_names(&self) -> Vec<String>;

    fn has(&self, name: &str) -> bool;
}

/// Name-keyed tool registry.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    /// Execute a tool with timeout protection so a stuck tool can never
    /// hold a turn past its deadline.
    async fn execute(&self, name: &str, input: ToolInput) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let timeout_secs = tool.timeout_secs();
        tracing::trace!(tool = name, timeout_secs, "executing tool");

        match tokio::time::timeout(Duration::from_secs(timeout_secs), tool.execute(input)).await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(ToolError::Timeout {
                tool: name.to_string(),
                secs: timeout_secs,
            }),
        }
    }

    fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps past its own timeout"
        }

        fn timeout_secs(&self) -> u64 {
            1
        }

        async fn execute(&self, _input: ToolInput) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(ToolError::Execution("should have timed out".to_string()))
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute(
                "missing",
                ToolInput::Calculator {
                    original_query: String::new(),
                },
            )
            .await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_tool_times_out() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);

        let result = registry
            .execute(
                "slow",
                ToolInput::Calculator {
                    original_query: String::new(),
                },
            )
            .await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
    }

    #[test]
    fn registry_bookkeeping() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());
        registry.register(SlowTool);
        assert_eq!(registry.len(), 1);
        assert!(registry.has("slow"));
        assert!(registry.get("slow").is_some());
    }
}
