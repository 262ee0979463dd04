use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::{Pipeline, PipelineResult, ReportPipeline, StageExecutor, StagePrompt};
use crate::agent::Agent;
use crate::config::Config;
use crate::crew::{AgentSpec, CrewDefinition, CrewError};
use crate::filters::FilterSet;
use crate::llm::{LlmClient, OpenAiClient};
use crate::tools::ToolRegistry;

/// Executes stages with tool-calling agents.
pub struct LlmStageExecutor {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    model: String,
    max_iterations: usize,
    workspace: PathBuf,
}

impl LlmStageExecutor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        model: impl Into<String>,
        max_iterations: usize,
        workspace: PathBuf,
    ) -> Self {
        Self {
            llm,
            tools,
            model: model.into(),
            max_iterations,
            workspace,
        }
    }
}

#[async_trait]
impl StageExecutor for LlmStageExecutor {
    async fn execute(&self, spec: &AgentSpec, prompt: &StagePrompt) -> anyhow::Result<String> {
        let agent = Agent::new(
            spec.clone(),
            Arc::clone(&self.llm),
            self.tools.subset(spec.tools.as_slice())?,
            self.model.clone(),
            self.max_iterations,
            self.workspace.clone(),
        );

        let run = agent.run_task(&prompt.render()).await?;
        tracing::info!(
            "Agent {} answered after {} iterations, {} tool calls, {} prompt / {} completion tokens",
            spec.id,
            run.iterations,
            run.tools_used.len(),
            run.usage.prompt_tokens,
            run.usage.completion_tokens
        );
        Ok(run.output)
    }
}

/// The production pipeline: fresh client, tools and agents for every run.
pub struct CrewPipeline {
    config: Config,
    crew: CrewDefinition,
}

impl CrewPipeline {
    /// Validate `crew` against the built-in tools and bind the report path.
    ///
    /// # Errors
    ///
    /// Fails when an agent names a tool that does not exist.
    pub fn new(config: Config, crew: CrewDefinition) -> Result<Self, CrewError> {
        let known = ToolRegistry::new(&config.credentials);
        crew.check_tools(|name| known.contains(name))?;
        let crew = crew.with_report_path(config.report_path.clone());
        Ok(Self { config, crew })
    }

    pub fn crew(&self) -> &CrewDefinition {
        &self.crew
    }
}

#[async_trait]
impl ReportPipeline for CrewPipeline {
    async fn run(&self, filters: &FilterSet) -> anyhow::Result<PipelineResult> {
        let api_key = self
            .config
            .credentials
            .openai_api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not configured"))?;

        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(
            api_key,
            self.config.llm.base_url.clone(),
            self.config.llm.temperature,
        ));
        let executor = LlmStageExecutor::new(
            llm,
            ToolRegistry::new(&self.config.credentials),
            self.config.llm.model.clone(),
            self.config.max_iterations,
            self.config.workspace_path.clone(),
        );

        Pipeline::new(self.crew.clone(), Arc::new(executor))
            .run(filters)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::filters::FilterInput;
    use crate::llm::{ChatMessage, ChatResponse, ToolSchema};

    struct FixedAnswer;

    #[async_trait]
    impl LlmClient for FixedAnswer {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            _tools: Option<&[ToolSchema]>,
        ) -> anyhow::Result<ChatResponse> {
            let task = messages.last().and_then(|m| m.content.clone()).unwrap_or_default();
            Ok(ChatResponse {
                content: Some(format!("answered {} chars", task.len())),
                tool_calls: None,
                usage: None,
            })
        }
    }

    #[tokio::test]
    async fn llm_executor_runs_agent_with_its_tool_subset() {
        let executor = LlmStageExecutor::new(
            Arc::new(FixedAnswer),
            ToolRegistry::new(&Credentials::default()),
            "gpt-4o-mini",
            3,
            PathBuf::from("."),
        );
        let crew = CrewDefinition::builtin().unwrap();
        let spec = crew.agent("property_scraper").unwrap();
        let prompt = StagePrompt {
            stage_id: "property_scraping_task".to_string(),
            description: "Busca casas en Cuba".to_string(),
            expected_output: "Lista".to_string(),
            context: String::new(),
        };
        let out = executor.execute(spec, &prompt).await.unwrap();
        assert!(out.starts_with("answered "));
    }

    #[tokio::test]
    async fn llm_executor_rejects_unknown_tools() {
        let executor = LlmStageExecutor::new(
            Arc::new(FixedAnswer),
            ToolRegistry::empty(),
            "gpt-4o-mini",
            3,
            PathBuf::from("."),
        );
        let spec = AgentSpec {
            id: "x".to_string(),
            role: "r".to_string(),
            goal: "g".to_string(),
            backstory: String::new(),
            tools: vec!["serper_search".to_string()],
        };
        let prompt = StagePrompt {
            stage_id: "s".to_string(),
            description: "d".to_string(),
            expected_output: String::new(),
            context: String::new(),
        };
        assert!(executor.execute(&spec, &prompt).await.is_err());
    }

    #[tokio::test]
    async fn crew_pipeline_binds_report_path_and_needs_llm_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(Credentials::default(), dir.path().to_path_buf());
        let pipeline = CrewPipeline::new(config.clone(), CrewDefinition::builtin().unwrap()).unwrap();
        assert_eq!(
            pipeline.crew().stages().last().unwrap().output_file.as_ref(),
            Some(&config.report_path)
        );

        let filters = FilterInput::default().validate().unwrap();
        let err = pipeline.run(&filters).await.unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
