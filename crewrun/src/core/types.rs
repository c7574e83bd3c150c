//! Shared deterministic types for engine core logic.
//!
//! These types define stable contracts between the resolver, router and
//! scheduler. They must not depend on external state.

use std::path::PathBuf;

use serde::Serialize;

/// Lifecycle state of one task within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// The routed output already existed when the run began.
    Skipped,
}

/// Substituted placeholder content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub text: String,
    pub was_sampled: bool,
}

/// Execution-time record for a task.
///
/// A task that is re-entered by a quality gate keeps the same record: the
/// previous result moves into `history` and `attempt_count` keeps growing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRun {
    pub task: String,
    pub index: usize,
    pub status: TaskStatus,
    pub output_path: PathBuf,
    pub resolved_description: Option<String>,
    pub result_text: Option<String>,
    pub attempt_count: u32,
    pub history: Vec<String>,
    /// Revision feedback injected by the most recent gate verdict.
    pub feedback: Option<String>,
    pub was_sampled: bool,
}

impl TaskRun {
    pub fn new(task: &str, index: usize, output_path: PathBuf) -> Self {
        Self {
            task: task.to_string(),
            index,
            status: TaskStatus::Pending,
            output_path,
            resolved_description: None,
            result_text: None,
            attempt_count: 0,
            history: Vec::new(),
            feedback: None,
            was_sampled: false,
        }
    }

    /// Reset to `Pending` for a revision, keeping the previous result in history.
    pub fn reopen(&mut self, feedback: String) {
        self.reset();
        self.feedback = Some(feedback);
    }

    /// Reset to `Pending` so the task runs again without new feedback.
    pub fn reset(&mut self) {
        if let Some(previous) = self.result_text.take() {
            self.history.push(previous);
        }
        self.resolved_description = None;
        self.status = TaskStatus::Pending;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopen_keeps_previous_results() {
        let mut run = TaskRun::new("Draft", 0, PathBuf::from("out/Task_Result.md"));
        run.status = TaskStatus::Succeeded;
        run.result_text = Some("first draft".to_string());
        run.attempt_count = 1;

        run.reopen("tighten the intro".to_string());

        assert_eq!(run.status, TaskStatus::Pending);
        assert_eq!(run.history, vec!["first draft".to_string()]);
        assert_eq!(run.result_text, None);
        assert_eq!(run.feedback.as_deref(), Some("tighten the intro"));
        assert_eq!(run.attempt_count, 1);
    }
}
