//! # Realty Crew
//!
//! A crew of four LLM agents that searches property listings in Pereira,
//! researches the local market, runs the numbers, and writes an investment
//! report.
//!
//! This library provides:
//! - A web form and JSON API for submitting search filters
//! - A sequential pipeline that threads each stage's output into later stages
//! - A tool-based agent loop with shell and web search tools
//!
//! ## Architecture
//!
//! Each stage follows the "tools in a loop" pattern:
//! 1. Interpolate the stage description with the validated filters
//! 2. Append the outputs of the stages it depends on
//! 3. Call the LLM, execute any tool calls, and feed the results back
//! 4. Stop at the first plain answer, which becomes the stage output
//!
//! The final stage's output is written to the report file.
//!
//! ## Example
//!
//! ```rust,ignore
//! use realty_crew::{config::Config, crew::CrewDefinition, filters::FilterInput};
//! use realty_crew::pipeline::{CrewPipeline, ReportPipeline};
//!
//! let config = Config::from_env()?;
//! let pipeline = CrewPipeline::new(config, CrewDefinition::builtin()?)?;
//! let filters = FilterInput::default().validate().map_err(|e| anyhow::anyhow!("{:?}", e))?;
//! let result = pipeline.run(&filters).await?;
//! println!("{}", result.report);
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod crew;
pub mod filters;
pub mod llm;
pub mod pipeline;
pub mod tools;

pub use config::Config;
