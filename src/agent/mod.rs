//! Agent module - runs one crew role against one stage prompt.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build context with the role's system prompt and the stage prompt
//! 2. Call LLM with the tools the role is allowed to use
//! 3. If LLM requests tool calls, execute them and feed results back
//! 4. Repeat until LLM produces a final answer or max iterations reached

mod agent_loop;
mod prompt;

pub use agent_loop::{Agent, AgentRun};
pub use prompt::{build_system_prompt, build_task_prompt};
