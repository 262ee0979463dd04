use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

const BUILTIN_AGENTS: &str = include_str!("../../config/agents.yaml");
const BUILTIN_TASKS: &str = include_str!("../../config/tasks.yaml");

#[derive(Debug, Error)]
pub enum CrewError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid {document}: {source}")]
    Yaml {
        document: &'static str,
        source: serde_yaml::Error,
    },

    #[error("Crew has no stages")]
    NoStages,

    #[error("Duplicate stage id: {0}")]
    DuplicateStage(String),

    #[error("Stage '{stage}' is assigned to unknown agent '{agent}'")]
    UnknownAgent { stage: String, agent: String },

    #[error("Stage '{stage}' depends on '{predecessor}', which is not declared before it")]
    ForwardReference { stage: String, predecessor: String },

    #[error("Agent '{agent}' uses unknown tool '{tool}'")]
    UnknownTool { agent: String, tool: String },
}

/// An agent role: instructions plus the names of the tools it may call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub id: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub tools: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AgentEntry {
    role: String,
    goal: String,
    #[serde(default)]
    backstory: String,
    #[serde(default)]
    tools: Vec<String>,
}

/// One stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StageSpec {
    pub id: String,
    pub agent: String,
    pub description: String,
    #[serde(default)]
    pub expected_output: String,
    /// Earlier stages whose output is handed to this one.
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
}

/// Validated crew: every stage references a known agent and only earlier stages.
#[derive(Debug, Clone)]
pub struct CrewDefinition {
    agents: BTreeMap<String, AgentSpec>,
    stages: Vec<StageSpec>,
}

impl CrewDefinition {
    /// The crew compiled into the binary.
    pub fn builtin() -> Result<Self, CrewError> {
        Self::from_yaml(BUILTIN_AGENTS, BUILTIN_TASKS)
    }

    /// Load `agents.yaml` and `tasks.yaml` from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, CrewError> {
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|source| CrewError::Io { path, source })
        };
        Self::from_yaml(&read("agents.yaml")?, &read("tasks.yaml")?)
    }

    /// Directory override when given, built-in crew otherwise.
    pub fn load(dir: Option<&Path>) -> Result<Self, CrewError> {
        match dir {
            Some(dir) => {
                tracing::info!("Loading crew definition from {}", dir.display());
                Self::load_dir(dir)
            }
            None => Self::builtin(),
        }
    }

    pub fn from_yaml(agents_yaml: &str, tasks_yaml: &str) -> Result<Self, CrewError> {
        let entries: BTreeMap<String, AgentEntry> =
            serde_yaml::from_str(agents_yaml).map_err(|source| CrewError::Yaml {
                document: "agents.yaml",
                source,
            })?;
        let stages: Vec<StageSpec> =
            serde_yaml::from_str(tasks_yaml).map_err(|source| CrewError::Yaml {
                document: "tasks.yaml",
                source,
            })?;

        let agents = entries
            .into_iter()
            .map(|(id, entry)| {
                let spec = AgentSpec {
                    id: id.clone(),
                    role: entry.role.trim().to_string(),
                    goal: entry.goal.trim().to_string(),
                    backstory: entry.backstory.trim().to_string(),
                    tools: entry.tools,
                };
                (id, spec)
            })
            .collect();

        Self::new(agents, stages)
    }

    fn new(agents: BTreeMap<String, AgentSpec>, stages: Vec<StageSpec>) -> Result<Self, CrewError> {
        if stages.is_empty() {
            return Err(CrewError::NoStages);
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for stage in &stages {
            if !agents.contains_key(&stage.agent) {
                return Err(CrewError::UnknownAgent {
                    stage: stage.id.clone(),
                    agent: stage.agent.clone(),
                });
            }
            // Predecessors must already be in `seen`, which also rules out self references.
            if let Some(predecessor) = stage.context.iter().find(|p| !seen.contains(p.as_str())) {
                return Err(CrewError::ForwardReference {
                    stage: stage.id.clone(),
                    predecessor: predecessor.clone(),
                });
            }
            if !seen.insert(stage.id.as_str()) {
                return Err(CrewError::DuplicateStage(stage.id.clone()));
            }
        }

        Ok(Self { agents, stages })
    }

    /// Check every agent's tools against the names `is_known` accepts.
    pub fn check_tools(&self, is_known: impl Fn(&str) -> bool) -> Result<(), CrewError> {
        for agent in self.agents.values() {
            if let Some(tool) = agent.tools.iter().find(|t| !is_known(t.as_str())) {
                return Err(CrewError::UnknownTool {
                    agent: agent.id.clone(),
                    tool: tool.clone(),
                });
            }
        }
        Ok(())
    }

    /// Stages in execution order.
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn agent(&self, id: &str) -> Option<&AgentSpec> {
        self.agents.get(id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentSpec> {
        self.agents.values()
    }

    /// Point the final stage's output file at `path`.
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        if let Some(last) = self.stages.last_mut() {
            last.output_file = Some(path.into());
        }
        self
    }
}
