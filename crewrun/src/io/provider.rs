//! Capability provider abstraction for worker invocation.
//!
//! The [`CapabilityProvider`] trait decouples the scheduler from the backend
//! that produces text. [`CommandProvider`] spawns a configured command (by
//! default `ollama run <model>`) and feeds it the rendered prompt on stdin.
//! Tests use scripted providers that return predetermined outputs.

use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::definition::{Task, Worker};
use crate::io::config::ProviderConfig;
use crate::io::process::run_command_with_timeout;
use crate::io::prompt::PromptEngine;

const MODEL_PLACEHOLDER: &str = "{model}";
const OLLAMA_PREFIX: &str = "ollama/";

/// Everything a provider needs to produce one task result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub task: String,
    pub worker: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// Fully resolved description; placeholders are already substituted.
    pub description: String,
    pub expected_output: String,
    pub tools: Vec<String>,
    /// Worker's `Model` label; `None` means the provider default.
    pub provider_id: Option<String>,
}

impl ProviderRequest {
    pub fn new(task: &Task, worker: &Worker, description: String) -> Self {
        Self {
            task: task.name.clone(),
            worker: worker.name.clone(),
            role: worker.role.clone(),
            goal: worker.goal.clone(),
            backstory: worker.backstory.clone(),
            description,
            expected_output: task.expected_output.clone(),
            tools: worker.tools.iter().cloned().collect(),
            provider_id: worker.provider_id.clone(),
        }
    }
}

/// Abstraction over text generation backends.
pub trait CapabilityProvider {
    /// Produce the result text for one task.
    fn generate(&self, request: &ProviderRequest) -> Result<String>;
}

impl<P: CapabilityProvider + ?Sized> CapabilityProvider for &P {
    fn generate(&self, request: &ProviderRequest) -> Result<String> {
        (**self).generate(request)
    }
}

/// Provider that spawns an external command per task.
pub struct CommandProvider {
    config: ProviderConfig,
    prompts: PromptEngine,
}

impl CommandProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            prompts: PromptEngine::new(),
        }
    }

    /// Model id for a request, with any `ollama/` routing prefix removed.
    pub fn model_for(&self, request: &ProviderRequest) -> String {
        let model = request
            .provider_id
            .as_deref()
            .unwrap_or(&self.config.default_model);
        normalize_model(model).to_string()
    }

    fn build_command(&self, model: &str) -> Result<Command> {
        let (program, args) = self
            .config
            .command
            .split_first()
            .ok_or_else(|| anyhow!("provider command is empty"))?;
        let mut cmd = Command::new(program.replace(MODEL_PLACEHOLDER, model));
        cmd.args(args.iter().map(|arg| arg.replace(MODEL_PLACEHOLDER, model)));
        if let Some(host) = &self.config.host {
            cmd.env("OLLAMA_HOST", host);
        }
        Ok(cmd)
    }
}

impl CapabilityProvider for CommandProvider {
    #[instrument(skip_all, fields(task = %request.task, worker = %request.worker))]
    fn generate(&self, request: &ProviderRequest) -> Result<String> {
        let model = self.model_for(request);
        info!(%model, "invoking provider command");

        let prompt = self.prompts.render_task(request)?;
        let cmd = self.build_command(&model)?;
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = run_command_with_timeout(
            cmd,
            Some(prompt.into_bytes()),
            timeout,
            self.config.output_limit_bytes,
        )?;

        if output.timed_out {
            warn!(timeout_secs = timeout.as_secs(), "provider command timed out");
            return Err(anyhow!("provider command timed out after {timeout:?}"));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "provider command failed");
            return Err(anyhow!(
                "provider command failed with status {:?}: {}",
                output.status.code(),
                output.stderr_tail(5)
            ));
        }

        if output.stdout_truncated > 0 {
            warn!(
                limit = self.config.output_limit_bytes,
                dropped = output.stdout_truncated,
                "provider output exceeded limit"
            );
            return Err(anyhow!(
                "provider output exceeded {} bytes",
                self.config.output_limit_bytes
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(bytes = text.len(), "provider command completed");
        Ok(text)
    }
}

fn normalize_model(model: &str) -> &str {
    let model = model.trim();
    match model.get(..OLLAMA_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(OLLAMA_PREFIX) => &model[OLLAMA_PREFIX.len()..],
        _ => model,
    }
}
