//! Run logs written to `<log_dir>/<run_id>.json`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::types::{TaskRun, TaskStatus};
use crate::definition::Architecture;

pub fn run_id_at(at: DateTime<Utc>) -> String {
    format!("run-{}", at.format("%Y%m%d_%H%M%S_%3f"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskLogEntry {
    pub task: String,
    pub status: TaskStatus,
    pub attempts: u32,
    pub output_path: PathBuf,
    pub revisions: usize,
    pub sampled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl From<&TaskRun> for TaskLogEntry {
    fn from(run: &TaskRun) -> Self {
        Self {
            task: run.task.clone(),
            status: run.status,
            attempts: run.attempt_count,
            output_path: run.output_path.clone(),
            revisions: run.history.len(),
            sampled: run.was_sampled,
            feedback: run.feedback.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunLog {
    pub run_id: String,
    pub team: String,
    pub architecture: Architecture,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: i64,
    /// `completed`, or the error that ended the run.
    pub outcome: String,
    pub provider_calls: u32,
    pub tasks: Vec<TaskLogEntry>,
}

pub struct RunLogInput<'a> {
    pub team: &'a str,
    pub architecture: Architecture,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: String,
    pub provider_calls: u32,
    pub runs: &'a [TaskRun],
}

impl RunLog {
    pub fn new(input: RunLogInput<'_>) -> Self {
        Self {
            run_id: run_id_at(input.started_at),
            team: input.team.to_string(),
            architecture: input.architecture,
            started_at: input.started_at.to_rfc3339(),
            finished_at: input.finished_at.to_rfc3339(),
            duration_ms: (input.finished_at - input.started_at).num_milliseconds(),
            outcome: input.outcome,
            provider_calls: input.provider_calls,
            tasks: input.runs.iter().map(TaskLogEntry::from).collect(),
        }
    }
}

/// Write the log as pretty JSON, returning its path.
///
/// Never overwrites: a clashing run id gets a `-2`, `-3`, ... suffix.
pub fn write_run_log(dir: &Path, log: &RunLog) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;
    let mut buf = serde_json::to_string_pretty(log).context("serialize run log")?;
    buf.push('\n');

    let mut attempt = 1u32;
    loop {
        let file_name = match attempt {
            1 => format!("{}.json", log.run_id),
            n => format!("{}-{n}.json", log.run_id),
        };
        let path = dir.join(file_name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(buf.as_bytes())
                    .with_context(|| format!("write {}", path.display()))?;
                return Ok(path);
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(err) => {
                return Err(err).with_context(|| format!("create {}", path.display()));
            }
        }
    }
}
