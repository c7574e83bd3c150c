//! Project scaffolding for `crewrun init`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::config::{CONFIG_FILE, EngineConfig, write_config};

const SAMPLE_CREW: &str = include_str!("templates/Crew.md");
const BRIEF_PLACEHOLDER: &str = "";

/// Options for `init_project`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing files.
    pub force: bool,
}

/// Files written and directories ensured by `init_project`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitOutcome {
    pub written: Vec<PathBuf>,
    pub kept: Vec<PathBuf>,
}

/// Create `crew.toml`, a sample `Crew.md`, an empty brief and the
/// input/output directories in `root`.
///
/// Existing files are kept unless `options.force` is set.
pub fn init_project(root: &Path, options: &InitOptions) -> Result<InitOutcome> {
    let config = EngineConfig::default();
    let mut outcome = InitOutcome::default();

    let config_path = root.join(CONFIG_FILE);
    if options.force || !config_path.exists() {
        write_config(&config_path, &config)?;
        outcome.written.push(config_path);
    } else {
        outcome.kept.push(config_path);
    }

    for (path, contents) in [
        (config.resolve(root, &config.crew_file), SAMPLE_CREW),
        (config.resolve(root, &config.brief_file), BRIEF_PLACEHOLDER),
    ] {
        if options.force || !path.exists() {
            write_file(&path, contents)?;
            outcome.written.push(path);
        } else {
            outcome.kept.push(path);
        }
    }

    for dir in [&config.input_dir, &config.output_dir] {
        create_dir(&config.resolve(root, dir))?;
    }

    debug!(written = outcome.written.len(), kept = outcome.kept.len(), "project initialized");
    Ok(outcome)
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}
