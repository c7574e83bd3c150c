//! Project-level orchestration for `crewrun run`.
//!
//! Wires configuration, the definition on disk, the brief, the resolver and
//! the scheduler together. The provider is passed in so tests can script it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::core::grammar::ParseWarning;
use crate::io::config::EngineConfig;
use crate::io::outputs;
use crate::io::provider::CapabilityProvider;
use crate::io::resolver::ContentResolver;
use crate::scheduler::{CancelFlag, RunReport, Scheduler, SchedulerOptions, TaskEvent};
use crate::validate::load_project_definition;

/// Command-line overrides applied on top of `crew.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    pub crew: Option<PathBuf>,
    pub brief: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRun {
    pub report: RunReport,
    pub warnings: Vec<ParseWarning>,
}

/// Load the definition and brief under `root` and run every task.
///
/// Errors keep their [`crate::error::ParseError`] or [`crate::error::RunError`]
/// so the CLI can map them to exit codes.
pub fn run_project<P: CapabilityProvider, F: FnMut(&TaskEvent<'_>)>(
    root: &Path,
    config: &EngineConfig,
    overrides: &RunOverrides,
    provider: &P,
    cancel: CancelFlag,
    on_event: F,
) -> Result<ProjectRun> {
    let loaded = load_project_definition(root, config, overrides.crew.as_deref())?;

    let brief_path = match &overrides.brief {
        Some(path) => path.clone(),
        None => config.resolve(root, &config.brief_file),
    };
    let brief = outputs::read_optional(&brief_path)
        .with_context(|| format!("read brief {}", brief_path.display()))?
        .unwrap_or_default();

    let output_dir = match &overrides.output_dir {
        Some(dir) => dir.clone(),
        None => config.resolve(root, &config.output_dir),
    };
    let resolver = ContentResolver::new(
        vec![config.resolve(root, &config.input_dir), root.to_path_buf()],
        config.sampling,
    )
    .with_prepend_brief(config.prepend_brief);
    let options = SchedulerOptions {
        output_dir,
        force: overrides.force,
        max_revisions: config.supervision.max_revisions,
        carry_forward_feedback: config.carry_forward_feedback,
        log_dir: config.run_log_dir(root),
    };

    info!(
        crew = %loaded.path.display(),
        tasks = loaded.definition.tasks.len(),
        "starting run"
    );
    let report = Scheduler::new(resolver, options)
        .with_cancel_flag(cancel)
        .run_with(&loaded.definition, &brief, provider, on_event)?;

    Ok(ProjectRun {
        report,
        warnings: loaded.warnings,
    })
}
