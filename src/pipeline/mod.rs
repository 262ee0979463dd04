//! Sequential stage pipeline.
//!
//! [`Pipeline`] walks the crew's stages in declaration order. Each stage's
//! prompt is the interpolated description plus the concatenated output of
//! the stages it lists as context. Stage execution itself is behind the
//! [`StageExecutor`] trait: [`LlmStageExecutor`] drives a tool-calling
//! [`Agent`](crate::agent::Agent), tests plug in canned executors.
//!
//! [`CrewPipeline`] is the per-run assembly used by the web form and the
//! one-shot binary: it builds a fresh LLM client, tool registry, and
//! pipeline for every call.

mod crew_pipeline;
mod runner;

pub use crew_pipeline::{CrewPipeline, LlmStageExecutor};
pub use runner::{Pipeline, CONTEXT_SEPARATOR};

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::crew::AgentSpec;
use crate::filters::FilterSet;

/// Everything a stage needs to run.
#[derive(Debug, Clone)]
pub struct StagePrompt {
    pub stage_id: String,
    /// Description with filter placeholders filled in
    pub description: String,
    pub expected_output: String,
    /// Output of the declared predecessors, joined by [`CONTEXT_SEPARATOR`]
    pub context: String,
}

impl StagePrompt {
    pub fn render(&self) -> String {
        crate::agent::build_task_prompt(&self.description, &self.expected_output, &self.context)
    }
}

/// Runs a single stage with the agent assigned to it.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn execute(&self, agent: &AgentSpec, prompt: &StagePrompt) -> anyhow::Result<String>;
}

/// Output of one finished stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutput {
    pub stage_id: String,
    pub agent: String,
    pub output: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Result of a full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: uuid::Uuid,
    /// Output of the final stage
    pub report: String,
    /// Where the report was written, if the write succeeded
    pub report_path: Option<PathBuf>,
    pub stages: Vec<StageOutput>,
    /// Non-fatal problems, such as a failed report write
    pub warnings: Vec<String>,
}

/// The single operation the presentation layer depends on.
#[async_trait]
pub trait ReportPipeline: Send + Sync {
    async fn run(&self, filters: &FilterSet) -> anyhow::Result<PipelineResult>;
}
