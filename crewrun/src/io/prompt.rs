//! Prompt rendering for command-backed providers.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::io::provider::ProviderRequest;

const TASK_TEMPLATE: &str = include_str!("prompts/task.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("task", TASK_TEMPLATE)
            .expect("task template should be valid");
        Self { env }
    }

    /// Render the prompt a worker receives for one task.
    pub fn render_task(&self, request: &ProviderRequest) -> Result<String> {
        let template = self.env.get_template("task")?;
        let rendered = template
            .render(context! {
                task => request.task.as_str(),
                worker => request.worker.as_str(),
                role => request.role.trim(),
                goal => request.goal.trim(),
                backstory => request.backstory.trim(),
                tools => &request.tools,
                description => request.description.trim(),
                expected_output => request.expected_output.trim(),
            })
            .with_context(|| format!("render prompt for task {}", request.task))?;
        Ok(rendered)
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}
