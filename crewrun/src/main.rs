//! `crewrun`: run Markdown-defined crews of workers against a model provider.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use crewrun::core::router::RouteSource;
use crewrun::error::RunError;
use crewrun::exit_codes;
use crewrun::io::config::{CONFIG_FILE, load_config};
use crewrun::io::init::{InitOptions, init_project};
use crewrun::io::provider::CommandProvider;
use crewrun::logging;
use crewrun::run::{RunOverrides, run_project};
use crewrun::scheduler::{CancelFlag, TaskEvent};
use crewrun::validate::validate_project;

#[derive(Parser)]
#[command(
    name = "crewrun",
    version,
    about = "Parse a crew definition and drive its tasks to completion"
)]
struct Cli {
    /// Project root holding `crew.toml`, `Crew.md` and `Task.md`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Raise log verbosity (repeatable). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `crew.toml`, a sample `Crew.md`, `Task.md` and the input/output directories.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Parse the definition, then print warnings and the routing table.
    Validate {
        /// Definition to check instead of the configured one.
        #[arg(long)]
        crew: Option<PathBuf>,
    },
    /// Execute every task and print the final result.
    Run {
        #[arg(long)]
        crew: Option<PathBuf>,
        /// Brief substituted for `{task_input}`.
        #[arg(long)]
        brief: Option<PathBuf>,
        /// Output directory instead of the configured one.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Model for workers without a `Model` label.
        #[arg(long)]
        model: Option<String>,
        /// Re-run tasks whose outputs already exist.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cancel = CancelFlag::new();
    let code = match dispatch(cli, &cancel) {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err, cancel.is_cancelled())
        }
    };
    std::process::exit(code);
}

fn dispatch(cli: Cli, cancel: &CancelFlag) -> Result<()> {
    match cli.command {
        Command::Init { force } => cmd_init(&cli.root, force),
        Command::Validate { crew } => cmd_validate(&cli.root, crew.as_deref()),
        Command::Run {
            crew,
            brief,
            output,
            model,
            force,
        } => {
            let overrides = RunOverrides {
                crew,
                brief,
                output_dir: output,
                force,
            };
            cmd_run(&cli.root, &overrides, model, cancel)
        }
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<()> {
    let outcome = init_project(root, &InitOptions { force })?;
    for path in &outcome.written {
        println!("wrote {}", path.display());
    }
    for path in &outcome.kept {
        println!("kept  {} (use --force to overwrite)", path.display());
    }
    Ok(())
}

fn cmd_validate(root: &Path, crew: Option<&Path>) -> Result<()> {
    let config = load_config(&root.join(CONFIG_FILE))?;
    let outcome = validate_project(root, &config, crew)?;
    let definition = &outcome.loaded.definition;

    for warning in &outcome.loaded.warnings {
        println!("warning: {warning}");
    }
    println!(
        "{}: {} workers, {} tasks, {} architecture",
        definition.team_name,
        definition.workers.len(),
        definition.tasks.len(),
        definition.architecture.as_str()
    );
    let width = outcome
        .routes
        .iter()
        .map(|route| route.task.len())
        .max()
        .unwrap_or(0);
    for route in &outcome.routes {
        println!(
            "  {:<width$}  -> {} ({})",
            route.task,
            route.file_name,
            describe_source(route.source)
        );
    }
    for file in &outcome.shared_outputs {
        println!("note: several tasks write {file}; the last one wins");
    }
    Ok(())
}

fn cmd_run(
    root: &Path,
    overrides: &RunOverrides,
    model: Option<String>,
    cancel: &CancelFlag,
) -> Result<()> {
    let mut config = load_config(&root.join(CONFIG_FILE))?;
    if let Some(model) = model {
        config.provider.default_model = model;
    }
    config.validate()?;

    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("interrupt received, stopping after the current task");
        handler_flag.cancel();
    })
    .context("install Ctrl-C handler")?;

    let provider = CommandProvider::new(config.provider.clone());
    let run = run_project(root, &config, overrides, &provider, cancel.clone(), print_event)?;

    for warning in &run.warnings {
        eprintln!("warning: {warning}");
    }
    if let Some(path) = &run.report.log_path {
        debug!(path = %path.display(), "run log written");
    }
    println!(
        "{} finished: {} provider calls",
        run.report.team, run.report.provider_calls
    );
    if let Some(output) = &run.report.final_output {
        println!("\n{output}");
    }
    Ok(())
}

fn print_event(event: &TaskEvent<'_>) {
    match event {
        TaskEvent::Skipped(run) => {
            println!("skip    {} (exists: {})", run.task, run.output_path.display());
        }
        TaskEvent::Started(run) => {
            let sampled = if run.was_sampled { ", inputs sampled" } else { "" };
            println!("run     {} (attempt {}{sampled})", run.task, run.attempt_count);
        }
        TaskEvent::Succeeded(run) => {
            println!("done    {} -> {}", run.task, run.output_path.display());
        }
        TaskEvent::Revision {
            gate,
            target,
            revision,
            feedback,
        } => {
            let summary = feedback.lines().next().unwrap_or_default();
            println!("revise  {target} (requested by {gate}, revision {revision}): {summary}");
        }
    }
}

fn describe_source(source: RouteSource) -> String {
    match source {
        RouteSource::Explicit => "explicit".to_string(),
        RouteSource::Bucket(bucket) => format!("{bucket:?} bucket").to_lowercase(),
        RouteSource::Fallback => "task name".to_string(),
    }
}

fn exit_code_for(err: &anyhow::Error, cancelled: bool) -> i32 {
    if cancelled {
        return exit_codes::CANCELLED;
    }
    if let Some(run_err) = err.downcast_ref::<RunError>() {
        return match run_err {
            RunError::Parse(_) => exit_codes::INVALID,
            RunError::RevisionLimitExceeded { .. } => exit_codes::REVISION_LIMIT,
            RunError::Cancelled { .. } => exit_codes::CANCELLED,
            _ => exit_codes::FAILED,
        };
    }
    // Parse and config errors, and anything else raised before a run starts.
    exit_codes::INVALID
}
