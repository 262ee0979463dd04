//! Prompt templates for crew agents.

use crate::crew::AgentSpec;
use crate::tools::ToolRegistry;

/// Build the system prompt from the role definition and its tools.
pub fn build_system_prompt(agent: &AgentSpec, tools: &ToolRegistry) -> String {
    let tool_section = if tools.is_empty() {
        "You have no tools. Work only with the information provided in the task and its context."
            .to_string()
    } else {
        let tool_descriptions = tools
            .list_tools()
            .iter()
            .map(|t| format!("- **{}**: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "You have access to the following tools:\n{tool_descriptions}\n\n\
             Use them to gather real, current information. Do not invent listings, prices or URLs."
        )
    };

    format!(
        r#"You are {role}.

{backstory}

Your personal goal is: {goal}

## Tools

{tool_section}

## Rules

1. Base every figure on information you found or were given; say so when data is missing.
2. Write in Spanish, for an investor in Pereira, Colombia.
3. When you have the final answer, reply with it directly, without calling more tools."#,
        role = agent.role,
        backstory = agent.backstory,
        goal = agent.goal,
        tool_section = tool_section,
    )
}

/// Build the user prompt for a stage, appending predecessor output when present.
pub fn build_task_prompt(description: &str, expected_output: &str, context: &str) -> String {
    let mut prompt = format!("Current task: {}\n", description.trim());

    if !expected_output.trim().is_empty() {
        prompt.push_str(&format!(
            "\nThis is the expected criteria for your final answer: {}\n\
             You MUST return the actual complete content as the final answer, not a summary.\n",
            expected_output.trim()
        ));
    }

    if !context.trim().is_empty() {
        prompt.push_str(&format!(
            "\nThis is the context you're working with:\n{}\n",
            context
        ));
    }

    prompt.push_str("\nBegin! This is VERY important to you, your job depends on it!");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(tools: Vec<String>) -> AgentSpec {
        AgentSpec {
            id: "market_researcher".to_string(),
            role: "Investigador de Mercado".to_string(),
            goal: "Entender precios".to_string(),
            backstory: "Analista urbano.".to_string(),
            tools,
        }
    }

    #[test]
    fn system_prompt_lists_bound_tools() {
        let registry = ToolRegistry::new(&Default::default())
            .subset(&["serper_search"])
            .unwrap();
        let prompt = build_system_prompt(&spec(vec!["serper_search".into()]), &registry);
        assert!(prompt.starts_with("You are Investigador de Mercado."));
        assert!(prompt.contains("- **serper_search**"));
        assert!(!prompt.contains("tavily_search"));
    }

    #[test]
    fn system_prompt_without_tools_says_so() {
        let prompt = build_system_prompt(&spec(vec![]), &ToolRegistry::empty());
        assert!(prompt.contains("You have no tools."));
    }

    #[test]
    fn task_prompt_includes_context_only_when_present() {
        let with = build_task_prompt("Analiza", "Una tabla", "step-1\n\n----------\n\nstep-2");
        assert!(with.contains("Current task: Analiza"));
        assert!(with.contains("expected criteria for your final answer: Una tabla"));
        assert!(with.contains("context you're working with:\nstep-1"));

        let without = build_task_prompt("Busca", "", "");
        assert!(!without.contains("context you're working with"));
        assert!(!without.contains("expected criteria"));
    }
}
