use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{PipelineResult, ReportPipeline, StageExecutor, StageOutput, StagePrompt};
use crate::crew::{interpolate, CrewDefinition};
use crate::filters::FilterSet;

/// Separator placed between predecessor outputs in a stage's context.
pub const CONTEXT_SEPARATOR: &str = "\n\n----------\n\n";

/// Runs a crew's stages strictly in order.
pub struct Pipeline {
    crew: CrewDefinition,
    executor: Arc<dyn StageExecutor>,
}

impl Pipeline {
    pub fn new(crew: CrewDefinition, executor: Arc<dyn StageExecutor>) -> Self {
        Self { crew, executor }
    }

    /// Run every stage and return the final stage's output.
    ///
    /// A failing stage aborts the run. Failing to write an output file only
    /// adds a warning to the result.
    pub async fn run(&self, filters: &FilterSet) -> anyhow::Result<PipelineResult> {
        let run_id = Uuid::new_v4();
        let inputs = filters.to_inputs();
        let stage_count = self.crew.stages().len();

        tracing::info!(%run_id, "Starting pipeline with {} stages", stage_count);

        let mut outputs: HashMap<&str, String> = HashMap::new();
        let mut stages = Vec::with_capacity(stage_count);
        let mut warnings = Vec::new();
        let mut report_path = None;

        for (index, stage) in self.crew.stages().iter().enumerate() {
            let agent = self
                .crew
                .agent(&stage.agent)
                .ok_or_else(|| anyhow::anyhow!("Stage '{}' has no agent", stage.id))?;

            let context = stage
                .context
                .iter()
                .filter_map(|id| outputs.get(id.as_str()))
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(CONTEXT_SEPARATOR);

            let prompt = StagePrompt {
                stage_id: stage.id.clone(),
                description: interpolate(&stage.description, &inputs),
                expected_output: interpolate(&stage.expected_output, &inputs),
                context,
            };

            tracing::info!(
                %run_id,
                "Stage {}/{} '{}' starting (agent: {})",
                index + 1,
                stage_count,
                stage.id,
                agent.id
            );
            let started_at = Utc::now();
            let output = self
                .executor
                .execute(agent, &prompt)
                .await
                .with_context(|| format!("Stage '{}' failed", stage.id))?;
            let finished_at = Utc::now();
            tracing::info!(
                %run_id,
                "Stage '{}' finished in {}s ({} chars)",
                stage.id,
                (finished_at - started_at).num_seconds(),
                output.len()
            );

            if let Some(path) = &stage.output_file {
                match write_output(path, &output).await {
                    Ok(()) => {
                        tracing::info!(%run_id, "Wrote {} output to {}", stage.id, path.display());
                        if index + 1 == stage_count {
                            report_path = Some(path.clone());
                        }
                    }
                    Err(e) => {
                        tracing::warn!(%run_id, "Could not write {}: {:#}", path.display(), e);
                        warnings.push(format!(
                            "No se pudo escribir el archivo {}: {:#}",
                            path.display(),
                            e
                        ));
                    }
                }
            }

            outputs.insert(stage.id.as_str(), output.clone());
            stages.push(StageOutput {
                stage_id: stage.id.clone(),
                agent: agent.id.clone(),
                output,
                started_at,
                finished_at,
            });
        }

        let report = stages
            .last()
            .map(|s| s.output.clone())
            .unwrap_or_default();

        tracing::info!(%run_id, "Pipeline finished");
        Ok(PipelineResult {
            run_id,
            report,
            report_path,
            stages,
            warnings,
        })
    }
}

#[async_trait]
impl ReportPipeline for Pipeline {
    async fn run(&self, filters: &FilterSet) -> anyhow::Result<PipelineResult> {
        Pipeline::run(self, filters).await
    }
}

async fn write_output(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tokio::fs::write(path, content).await?;
    Ok(())
}
