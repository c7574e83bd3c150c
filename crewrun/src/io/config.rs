//! Project configuration stored in `crew.toml` at the project root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::sampling::SamplingPolicy;

pub const CONFIG_FILE: &str = "crew.toml";

/// Engine configuration (TOML).
///
/// Relative paths are resolved against the project root. Missing fields
/// default to the values a freshly initialized project uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Workflow definition document.
    pub crew_file: PathBuf,

    /// Ambient task brief substituted for `{task_input}`.
    pub brief_file: PathBuf,

    /// Run-local input directory, searched before the project root.
    pub input_dir: PathBuf,

    /// Directory receiving one output file per task.
    pub output_dir: PathBuf,

    /// Run logs are written here; an empty path disables them.
    pub log_dir: PathBuf,

    /// Prepend the brief to descriptions that lack `{task_input}`.
    pub prepend_brief: bool,

    /// Inject a pre-existing `Task_Feedback.md` into the first result task.
    pub carry_forward_feedback: bool,

    pub sampling: SamplingPolicy,

    pub supervision: SupervisionConfig,

    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SupervisionConfig {
    /// Revisions a single quality gate may request before the run fails.
    pub max_revisions: u32,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self { max_revisions: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Command to spawn per task; `{model}` is replaced with the worker's model.
    pub command: Vec<String>,

    /// Model used by workers without a `Model` label (or with `Default`).
    pub default_model: String,

    /// Exported as `OLLAMA_HOST` to the provider command when set.
    pub host: Option<String>,

    pub timeout_secs: u64,

    /// Provider stdout beyond this many bytes is discarded.
    pub output_limit_bytes: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            command: vec!["ollama".to_string(), "run".to_string(), "{model}".to_string()],
            default_model: "llama3".to_string(),
            host: None,
            timeout_secs: 15 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            crew_file: PathBuf::from("Crew.md"),
            brief_file: PathBuf::from("Task.md"),
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            log_dir: PathBuf::from(".crewrun/runs"),
            prepend_brief: true,
            carry_forward_feedback: true,
            sampling: SamplingPolicy::default(),
            supervision: SupervisionConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sampling.window_bytes == 0 {
            return Err(anyhow!("sampling.window_bytes must be > 0"));
        }
        if self.sampling.window_bytes.saturating_mul(3) > self.sampling.threshold_bytes {
            return Err(anyhow!(
                "sampling.threshold_bytes must be at least 3 * sampling.window_bytes"
            ));
        }
        if self.provider.timeout_secs == 0 {
            return Err(anyhow!("provider.timeout_secs must be > 0"));
        }
        if self.provider.output_limit_bytes == 0 {
            return Err(anyhow!("provider.output_limit_bytes must be > 0"));
        }
        if self.provider.command.is_empty() || self.provider.command[0].trim().is_empty() {
            return Err(anyhow!("provider.command must be a non-empty array"));
        }
        if self.provider.default_model.trim().is_empty() {
            return Err(anyhow!("provider.default_model must not be empty"));
        }
        Ok(())
    }

    /// Directory for run logs, or `None` when disabled.
    pub fn run_log_dir(&self, root: &Path) -> Option<PathBuf> {
        if self.log_dir.as_os_str().is_empty() {
            return None;
        }
        Some(self.resolve(root, &self.log_dir))
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `EngineConfig::default()`.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        let cfg = EngineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
