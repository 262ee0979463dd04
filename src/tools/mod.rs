//! Tools available to the crew's agents.
//!
//! Every tool reports failures as text: the agent loop forwards whatever a
//! tool returns to the model, so a broken search or a failing shell command
//! never aborts the pipeline.

mod terminal;
mod web;

pub use terminal::{RunCommand, SHELL_TIMEOUT_SECS};
pub use web::{SerperSearch, TavilySearch};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Credentials;
use crate::llm::{FunctionSchema, ToolSchema};

/// A callable capability exposed to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String>;
}

/// Name and description pair used in prompts.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Named collection of tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with every built-in tool, wired to the given credentials.
    pub fn new(credentials: &Credentials) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(RunCommand::new()));
        registry.register(Arc::new(TavilySearch::new(
            credentials.tavily_api_key.clone(),
        )));
        registry.register(Arc::new(SerperSearch::new(
            credentials.serper_api_key.clone(),
        )));
        registry
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registry restricted to `names`.
    ///
    /// # Errors
    ///
    /// Fails when a name is not registered.
    pub fn subset<S: AsRef<str>>(&self, names: &[S]) -> anyhow::Result<Self> {
        let mut subset = Self::empty();
        for name in names {
            let name = name.as_ref();
            let tool = self
                .tools
                .get(name)
                .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;
            subset.register(Arc::clone(tool));
        }
        Ok(subset)
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    pub fn get_tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|t| ToolSchema {
                kind: "function".to_string(),
                function: FunctionSchema {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.parameters_schema(),
                },
            })
            .collect()
    }

    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        workspace: &Path,
    ) -> anyhow::Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;
        tool.execute(args, workspace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_registry_has_all_tools() {
        let registry = ToolRegistry::new(&Credentials::default());
        assert!(registry.contains("run_command"));
        assert!(registry.contains("tavily_search"));
        assert!(registry.contains("serper_search"));
        assert_eq!(registry.get_tool_schemas().len(), 3);
    }

    #[test]
    fn subset_rejects_unknown_names() {
        let registry = ToolRegistry::new(&Credentials::default());
        let sub = registry.subset(&["serper_search"]).unwrap();
        assert_eq!(sub.len(), 1);
        assert!(registry.subset(&["firecrawl"]).is_err());
    }

    #[tokio::test]
    async fn unknown_tool_execution_is_an_error() {
        let registry = ToolRegistry::empty();
        let err = registry
            .execute("nope", json!({}), Path::new("."))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown tool"));
    }
}
