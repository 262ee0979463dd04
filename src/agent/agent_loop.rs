//! Core agent loop implementation.

use std::path::PathBuf;
use std::sync::Arc;

use crate::crew::AgentSpec;
use crate::llm::{ChatMessage, LlmClient, Role, TokenUsage, ToolCall};
use crate::tools::ToolRegistry;

use super::prompt::build_system_prompt;

/// A crew role bound to its tools and the shared LLM client.
pub struct Agent {
    spec: AgentSpec,
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    model: String,
    max_iterations: usize,
    workspace: PathBuf,
}

/// Outcome of a completed agent run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Final answer
    pub output: String,

    /// Number of LLM calls made
    pub iterations: usize,

    /// Tools called, in order
    pub tools_used: Vec<String>,

    /// Accumulated token usage, when the provider reports it
    pub usage: TokenUsage,
}

impl Agent {
    pub fn new(
        spec: AgentSpec,
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        model: impl Into<String>,
        max_iterations: usize,
        workspace: PathBuf,
    ) -> Self {
        Self {
            spec,
            llm,
            tools,
            model: model.into(),
            max_iterations,
            workspace,
        }
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    /// Run the agent on `task` until it produces a final answer.
    ///
    /// Tool failures are fed back to the model as text; only LLM errors, an
    /// empty answer, or hitting the iteration ceiling fail the run.
    pub async fn run_task(&self, task: &str) -> anyhow::Result<AgentRun> {
        let mut messages = vec![
            ChatMessage::system(build_system_prompt(&self.spec, &self.tools)),
            ChatMessage::user(task),
        ];

        let tool_schemas = self.tools.get_tool_schemas();
        let schemas = (!tool_schemas.is_empty()).then_some(tool_schemas.as_slice());

        let mut tools_used = Vec::new();
        let mut usage = TokenUsage::default();

        for iteration in 0..self.max_iterations {
            tracing::debug!("Agent {} iteration {}", self.spec.id, iteration + 1);

            let response = self
                .llm
                .chat_completion(&self.model, &messages, schemas)
                .await?;

            if let Some(u) = response.usage {
                usage.prompt_tokens += u.prompt_tokens;
                usage.completion_tokens += u.completion_tokens;
            }

            if let Some(tool_calls) = response.tool_calls.filter(|calls| !calls.is_empty()) {
                messages.push(ChatMessage {
                    role: Role::Assistant,
                    content: response.content.clone(),
                    tool_calls: Some(tool_calls.clone()),
                    tool_call_id: None,
                });

                for tool_call in &tool_calls {
                    tracing::info!(
                        "Agent {} calling tool {} with args: {}",
                        self.spec.id,
                        tool_call.function.name,
                        truncate_for_log(&tool_call.function.arguments, 500)
                    );
                    tools_used.push(tool_call.function.name.clone());

                    let result = match self.execute_tool_call(tool_call).await {
                        Ok(output) => output,
                        Err(e) => format!("Error: {}", e),
                    };
                    tracing::debug!("Tool result: {}", truncate_for_log(&result, 1000));

                    messages.push(ChatMessage::tool_result(tool_call.id.clone(), result));
                }

                continue;
            }

            // No tool calls - this is the final response
            return match response.content.filter(|c| !c.trim().is_empty()) {
                Some(output) => Ok(AgentRun {
                    output,
                    iterations: iteration + 1,
                    tools_used,
                    usage,
                }),
                None => Err(anyhow::anyhow!(
                    "Agent {} returned an empty response",
                    self.spec.id
                )),
            };
        }

        Err(anyhow::anyhow!(
            "Agent {} reached max iterations ({}) without a final answer",
            self.spec.id,
            self.max_iterations
        ))
    }

    /// Execute a single tool call.
    async fn execute_tool_call(&self, tool_call: &ToolCall) -> anyhow::Result<String> {
        let args: serde_json::Value = serde_json::from_str(&tool_call.function.arguments)
            .map_err(|e| anyhow::anyhow!("Invalid JSON arguments: {}", e))?;

        self.tools
            .execute(&tool_call.function.name, args, &self.workspace)
            .await
    }
}

/// Truncate a string for logging purposes.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}
