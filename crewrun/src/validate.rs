//! Definition loading and validation for `crewrun validate` and `crewrun run`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::grammar::{ParseWarning, ParsedDefinition, load_definition};
use crate::core::router::{self, RouteSource};
use crate::definition::WorkflowDefinition;
use crate::io::config::EngineConfig;

/// A definition loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDefinition {
    pub path: PathBuf,
    pub definition: WorkflowDefinition,
    pub warnings: Vec<ParseWarning>,
}

/// Where one task's result will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub task: String,
    pub file_name: String,
    pub source: RouteSource,
}

/// High-level validation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateOutcome {
    pub loaded: LoadedDefinition,
    pub routes: Vec<RouteEntry>,
    /// Output files claimed by more than one task.
    pub shared_outputs: Vec<String>,
}

/// Read and validate the definition at `crew_override` or the configured path.
///
/// Parse failures keep their [`crate::error::ParseError`] so callers can
/// downcast for exit codes.
pub fn load_project_definition(
    root: &Path,
    config: &EngineConfig,
    crew_override: Option<&Path>,
) -> Result<LoadedDefinition> {
    let path = match crew_override {
        Some(path) => path.to_path_buf(),
        None => config.resolve(root, &config.crew_file),
    };
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let ParsedDefinition {
        definition,
        warnings,
    } = load_definition(&text).with_context(|| format!("parse {}", path.display()))?;
    Ok(LoadedDefinition {
        path,
        definition,
        warnings,
    })
}

/// Validate the definition and compute its routing table.
pub fn validate_project(
    root: &Path,
    config: &EngineConfig,
    crew_override: Option<&Path>,
) -> Result<ValidateOutcome> {
    let loaded = load_project_definition(root, config, crew_override)?;
    let routes: Vec<RouteEntry> = loaded
        .definition
        .tasks
        .iter()
        .map(|task| {
            let route = router::route(task);
            RouteEntry {
                task: task.name.clone(),
                file_name: route.file_name,
                source: route.source,
            }
        })
        .collect();

    let mut shared_outputs: Vec<String> = Vec::new();
    for (idx, entry) in routes.iter().enumerate() {
        let claimed_earlier = routes[..idx].iter().any(|e| e.file_name == entry.file_name);
        if claimed_earlier && !shared_outputs.contains(&entry.file_name) {
            shared_outputs.push(entry.file_name.clone());
        }
    }

    Ok(ValidateOutcome {
        loaded,
        routes,
        shared_outputs,
    })
}
