//! Crew definition: the agents, the ordered stages, and the prompt templates.
//!
//! The crew is described in two YAML documents (`agents.yaml`, `tasks.yaml`).
//! Built-in copies are compiled into the binary; `CREW_CONFIG_DIR` points at
//! a directory holding replacements.

mod definition;
mod template;

pub use definition::{AgentSpec, CrewDefinition, CrewError, StageSpec};
pub use template::interpolate;
