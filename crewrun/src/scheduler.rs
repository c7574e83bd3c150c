//! Execution scheduler for Linear and Supervised workflows.
//!
//! Tasks run strictly one at a time in declaration order. A task whose routed
//! output already existed when the run began is skipped and its file becomes
//! the result. In Supervised workflows a quality gate answering `REVISE:`
//! sends traversal back to the closest preceding non-gate task with the
//! feedback injected; each gate may do so at most `max_revisions` times.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::core::router::{self, Bucket};
use crate::core::types::{TaskRun, TaskStatus};
use crate::core::verdict::{Verdict, parse_verdict};
use crate::definition::{Architecture, WorkflowDefinition};
use crate::error::{ParseError, RunError};
use crate::io::outputs::{self, OutputSnapshot};
use crate::io::provider::{CapabilityProvider, ProviderRequest};
use crate::io::resolver::{ContentResolver, ProducedOutputs};
use crate::io::run_log::{self, RunLog, RunLogInput};

/// Shared flag that stops a run before the next task starts.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub output_dir: PathBuf,
    /// Re-run tasks whose outputs already exist.
    pub force: bool,
    pub max_revisions: u32,
    pub carry_forward_feedback: bool,
    /// Write a run log here when set.
    pub log_dir: Option<PathBuf>,
}

impl SchedulerOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            force: false,
            max_revisions: 3,
            carry_forward_feedback: true,
            log_dir: None,
        }
    }
}

/// Progress notifications delivered while a run advances.
#[derive(Debug)]
pub enum TaskEvent<'a> {
    Skipped(&'a TaskRun),
    Started(&'a TaskRun),
    Succeeded(&'a TaskRun),
    Revision {
        gate: &'a str,
        target: &'a str,
        revision: u32,
        feedback: &'a str,
    },
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub team: String,
    pub architecture: Architecture,
    pub runs: Vec<TaskRun>,
    pub provider_calls: u32,
    /// Result text of the last task.
    pub final_output: Option<String>,
    pub log_path: Option<PathBuf>,
}

impl RunReport {
    pub fn run(&self, task: &str) -> Option<&TaskRun> {
        self.runs.iter().find(|run| run.task == task)
    }
}

pub struct Scheduler {
    resolver: ContentResolver,
    options: SchedulerOptions,
    cancel: CancelFlag,
}

impl Scheduler {
    pub fn new(resolver: ContentResolver, options: SchedulerOptions) -> Self {
        Self {
            resolver,
            options,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drive every task to completion.
    pub fn run<P: CapabilityProvider>(
        &self,
        definition: &WorkflowDefinition,
        brief: &str,
        provider: &P,
    ) -> Result<RunReport, RunError> {
        self.run_with(definition, brief, provider, |_| {})
    }

    /// Like [`Scheduler::run`], reporting progress through `on_event`.
    ///
    /// The run log, when enabled, is written whether or not the run succeeds.
    #[instrument(skip_all, fields(team = %definition.team_name, architecture = definition.architecture.as_str()))]
    pub fn run_with<P: CapabilityProvider, F: FnMut(&TaskEvent<'_>)>(
        &self,
        definition: &WorkflowDefinition,
        brief: &str,
        provider: &P,
        mut on_event: F,
    ) -> Result<RunReport, RunError> {
        let started_at = Utc::now();
        let mut execution = Execution::new(self, definition);
        let result = execution.drive(brief, provider, &mut on_event);
        let finished_at = Utc::now();

        let outcome = match &result {
            Ok(()) => "completed".to_string(),
            Err(err) => err.to_string(),
        };
        let log_path = self.options.log_dir.as_ref().and_then(|dir| {
            let log = RunLog::new(RunLogInput {
                team: &definition.team_name,
                architecture: definition.architecture,
                started_at,
                finished_at,
                outcome,
                provider_calls: execution.provider_calls,
                runs: &execution.runs,
            });
            match run_log::write_run_log(dir, &log) {
                Ok(path) => Some(path),
                Err(err) => {
                    warn!(err = %format!("{err:#}"), "failed to write run log");
                    None
                }
            }
        });

        result?;
        info!(provider_calls = execution.provider_calls, "run completed");
        let final_output = execution
            .runs
            .last()
            .and_then(|run| run.result_text.clone());
        Ok(RunReport {
            team: definition.team_name.clone(),
            architecture: definition.architecture,
            runs: execution.runs,
            provider_calls: execution.provider_calls,
            final_output,
            log_path,
        })
    }
}

/// Mutable state for a single run.
struct Execution<'a> {
    scheduler: &'a Scheduler,
    definition: &'a WorkflowDefinition,
    runs: Vec<TaskRun>,
    routed: Vec<String>,
    produced: ProducedOutputs,
    /// Tasks sent back by a gate; these never skip.
    reentered: Vec<bool>,
    revisions: Vec<u32>,
    provider_calls: u32,
}

impl<'a> Execution<'a> {
    fn new(scheduler: &'a Scheduler, definition: &'a WorkflowDefinition) -> Self {
        let output_dir = &scheduler.options.output_dir;
        let routed: Vec<String> = definition
            .tasks
            .iter()
            .map(|task| router::route(task).file_name)
            .collect();
        let runs = definition
            .tasks
            .iter()
            .zip(&routed)
            .enumerate()
            .map(|(idx, (task, file))| TaskRun::new(&task.name, idx, output_dir.join(file)))
            .collect();
        let count = definition.tasks.len();
        Self {
            scheduler,
            definition,
            runs,
            routed,
            produced: ProducedOutputs::default(),
            reentered: vec![false; count],
            revisions: vec![0; count],
            provider_calls: 0,
        }
    }

    fn drive<P: CapabilityProvider, F: FnMut(&TaskEvent<'_>)>(
        &mut self,
        brief: &str,
        provider: &P,
        on_event: &mut F,
    ) -> Result<(), RunError> {
        let definition = self.definition;
        let scheduler = self.scheduler;
        let options = &scheduler.options;
        let snapshot = OutputSnapshot::capture(self.runs.iter().map(|run| run.output_path.as_path()));
        let mut carried_feedback = if options.carry_forward_feedback {
            self.previous_feedback()?
        } else {
            None
        };

        let mut idx = 0;
        while idx < definition.tasks.len() {
            let task = &definition.tasks[idx];
            if scheduler.cancel.is_cancelled() {
                return Err(RunError::Cancelled {
                    task: task.name.clone(),
                });
            }

            let existed = snapshot.existed(&self.runs[idx].output_path);
            if existed && !options.force && !self.reentered[idx] {
                self.skip(idx)?;
                on_event(&TaskEvent::Skipped(&self.runs[idx]));
                idx += 1;
                continue;
            }

            if self.runs[idx].feedback.is_none()
                && carried_feedback.is_some()
                && router::classify(task) == Some(Bucket::Result)
            {
                debug!(task = %task.name, "carrying forward previous feedback");
                self.runs[idx].feedback = carried_feedback.take();
            }

            self.execute(idx, brief, provider, on_event)?;

            if definition.architecture == Architecture::Supervised
                && task.is_quality_gate
                && let Some(target) = self.apply_verdict(idx, on_event)?
            {
                idx = target;
                continue;
            }
            idx += 1;
        }
        Ok(())
    }

    /// Content of a `Task_Feedback.md` left by an earlier run.
    fn previous_feedback(&self) -> Result<Option<String>, RunError> {
        let file = Bucket::Feedback.file_name();
        let path = self.scheduler.options.output_dir.join(file);
        let text = outputs::read_optional(&path).map_err(|source| RunError::Storage {
            task: file.to_string(),
            stage: "read previous feedback",
            source,
        })?;
        Ok(text.filter(|text| !text.trim().is_empty()))
    }

    fn skip(&mut self, idx: usize) -> Result<(), RunError> {
        let run = &mut self.runs[idx];
        let text = outputs::read_output(&run.output_path).map_err(|source| RunError::Storage {
            task: run.task.clone(),
            stage: "read existing output",
            source,
        })?;
        info!(task = %run.task, path = %run.output_path.display(), "output exists, skipping");
        run.result_text = Some(text);
        run.status = TaskStatus::Skipped;
        self.produced
            .insert(self.routed[idx].clone(), run.output_path.clone());
        Ok(())
    }

    fn execute<P: CapabilityProvider, F: FnMut(&TaskEvent<'_>)>(
        &mut self,
        idx: usize,
        brief: &str,
        provider: &P,
        on_event: &mut F,
    ) -> Result<(), RunError> {
        let definition = self.definition;
        let scheduler = self.scheduler;
        let task = &definition.tasks[idx];
        let worker = definition.worker(&task.assigned_worker).ok_or_else(|| {
            RunError::Parse(ParseError::reference(
                task.line,
                format!("task `{}` names unknown agent `{}`", task.name, task.assigned_worker),
            ))
        })?;

        let resolved = scheduler
            .resolver
            .resolve(
                &task.description_template,
                brief,
                self.runs[idx].feedback.as_deref(),
                &self.produced,
            )
            .map_err(|err| {
                self.runs[idx].status = TaskStatus::Failed;
                RunError::from_resolve(&task.name, err)
            })?;

        let run = &mut self.runs[idx];
        run.status = TaskStatus::Running;
        run.attempt_count += 1;
        run.was_sampled = resolved.was_sampled;
        run.resolved_description = Some(resolved.text.clone());
        on_event(&TaskEvent::Started(&self.runs[idx]));

        let request = ProviderRequest::new(task, worker, resolved.text);
        self.provider_calls += 1;
        let generated = provider.generate(&request);

        let run = &mut self.runs[idx];
        let text = match generated {
            Ok(text) => text,
            Err(source) => {
                run.status = TaskStatus::Failed;
                warn!(task = %task.name, "provider failed");
                return Err(RunError::Provider {
                    task: task.name.clone(),
                    worker: worker.name.clone(),
                    source,
                });
            }
        };
        if scheduler.cancel.is_cancelled() {
            run.status = TaskStatus::Failed;
            return Err(RunError::Cancelled {
                task: task.name.clone(),
            });
        }

        if let Err(source) = outputs::write_output(&run.output_path, &text) {
            run.status = TaskStatus::Failed;
            return Err(RunError::Storage {
                task: task.name.clone(),
                stage: "write output",
                source,
            });
        }
        info!(task = %task.name, path = %run.output_path.display(), bytes = text.len(), "task succeeded");
        run.result_text = Some(text);
        run.status = TaskStatus::Succeeded;
        self.produced
            .insert(self.routed[idx].clone(), run.output_path.clone());
        on_event(&TaskEvent::Succeeded(&self.runs[idx]));
        Ok(())
    }

    /// Returns the index to resume from when the gate asks for a revision.
    fn apply_verdict<F: FnMut(&TaskEvent<'_>)>(
        &mut self,
        gate_idx: usize,
        on_event: &mut F,
    ) -> Result<Option<usize>, RunError> {
        let definition = self.definition;
        let gate = &definition.tasks[gate_idx];
        let text = self.runs[gate_idx].result_text.as_deref().unwrap_or_default();

        let feedback = match parse_verdict(text) {
            Verdict::Approved => {
                debug!(gate = %gate.name, "gate approved");
                return Ok(None);
            }
            Verdict::Unrecognized => {
                warn!(gate = %gate.name, "gate verdict has no APPROVED/REVISE prefix, treating as approved");
                return Ok(None);
            }
            Verdict::Revise(feedback) => feedback,
        };

        let target = definition
            .preceding_work_task(gate_idx)
            .ok_or_else(|| RunError::NoRevisionTarget {
                gate: gate.name.clone(),
            })?;
        let target_name = &definition.tasks[target].name;

        self.revisions[gate_idx] += 1;
        let revision = self.revisions[gate_idx];
        let limit = self.scheduler.options.max_revisions;
        if revision > limit {
            return Err(RunError::RevisionLimitExceeded {
                gate: gate.name.clone(),
                task: target_name.clone(),
                limit,
            });
        }

        info!(gate = %gate.name, target = %target_name, revision, "gate requested revision");
        self.runs[target].reopen(feedback);
        for idx in target..=gate_idx {
            self.reentered[idx] = true;
            if idx != target {
                self.runs[idx].reset();
            }
        }
        on_event(&TaskEvent::Revision {
            gate: &gate.name,
            target: target_name,
            revision,
            feedback: self.runs[target].feedback.as_deref().unwrap_or_default(),
        });
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sampling::SamplingPolicy;
    use crate::definition::Task;
    use crate::test_support::{ScriptedProvider, definition, task};

    struct Fixture {
        temp: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                temp: tempfile::tempdir().expect("tempdir"),
            }
        }

        fn output_dir(&self) -> PathBuf {
            self.temp.path().join("output")
        }

        fn scheduler(&self, configure: impl FnOnce(&mut SchedulerOptions)) -> Scheduler {
            let mut options = SchedulerOptions::new(self.output_dir());
            configure(&mut options);
            let resolver = ContentResolver::new(
                vec![self.temp.path().join("input"), self.temp.path().to_path_buf()],
                SamplingPolicy::default(),
            );
            Scheduler::new(resolver, options)
        }
    }

    fn gate(name: &str) -> Task {
        let mut gate = task(name, "W");
        gate.is_quality_gate = true;
        gate.explicit_output_file = Some("gate.md".to_string());
        gate
    }

    fn supervised(tasks: Vec<Task>) -> WorkflowDefinition {
        let mut def = definition(tasks);
        def.architecture = Architecture::Supervised;
        def
    }

    #[test]
    fn linear_runs_in_declaration_order() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::new();
        let def = definition(vec![task("Gather", "W"), task("Summarize", "W")]);

        let report = fx.scheduler(|_| {}).run(&def, "", &provider).expect("run");

        assert_eq!(provider.calls(), vec!["Gather", "Summarize"]);
        assert_eq!(report.provider_calls, 2);
        assert!(report.runs.iter().all(|r| r.status == TaskStatus::Succeeded));
        assert_eq!(report.final_output.as_deref(), Some("Summarize done"));
        let written = std::fs::read_to_string(fx.output_dir().join("gather.md")).expect("read");
        assert_eq!(written, "Gather done");
    }

    #[test]
    fn existing_outputs_are_skipped_without_provider_calls() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.output_dir()).expect("mkdir");
        std::fs::write(fx.output_dir().join("gather.md"), "cached gather").expect("write");
        let provider = ScriptedProvider::new();
        let mut second = task("Summarize", "W");
        second.description_template = "Summarize [[gather.md]]".to_string();
        let def = definition(vec![task("Gather", "W"), second]);

        let report = fx.scheduler(|_| {}).run(&def, "", &provider).expect("run");

        assert_eq!(provider.calls(), vec!["Summarize"]);
        let gather = report.run("Gather").expect("gather run");
        assert_eq!(gather.status, TaskStatus::Skipped);
        assert_eq!(gather.result_text.as_deref(), Some("cached gather"));
        assert_eq!(provider.requests()[0].description, "Summarize cached gather");
    }

    #[test]
    fn force_reruns_existing_outputs() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.output_dir()).expect("mkdir");
        std::fs::write(fx.output_dir().join("gather.md"), "cached").expect("write");
        let provider = ScriptedProvider::new();
        let def = definition(vec![task("Gather", "W")]);

        fx.scheduler(|o| o.force = true)
            .run(&def, "", &provider)
            .expect("run");
        assert_eq!(provider.calls(), vec!["Gather"]);
    }

    #[test]
    fn provider_failure_marks_task_failed_and_aborts() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::new().fail("Gather", "model not found");
        let def = definition(vec![task("Gather", "W"), task("Summarize", "W")]);

        let err = fx.scheduler(|_| {}).run(&def, "", &provider).unwrap_err();
        assert!(matches!(err, RunError::Provider { ref task, .. } if task == "Gather"));
        assert_eq!(provider.calls(), vec!["Gather"]);
        assert!(!fx.output_dir().join("gather.md").exists());
    }

    #[test]
    fn unresolved_reference_aborts_before_provider_call() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::new();
        let mut only = task("Summarize", "W");
        only.description_template = "Use [[missing.md]]".to_string();

        let err = fx
            .scheduler(|_| {})
            .run(&definition(vec![only]), "", &provider)
            .unwrap_err();
        assert!(matches!(err, RunError::UnresolvedReference { ref token, .. } if token == "[[missing.md]]"));
        assert!(provider.calls().is_empty());
    }

    #[test]
    fn revise_reenters_preceding_task_with_feedback() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::new()
            .respond("Draft", ["draft v1", "draft v2"])
            .respond("Quality Gate: Draft", ["REVISE: add sources", "APPROVED"]);
        let def = supervised(vec![task("Draft", "W"), gate("Quality Gate: Draft")]);

        let mut revisions = Vec::new();
        let report = fx
            .scheduler(|_| {})
            .run_with(&def, "", &provider, |event| {
                if let TaskEvent::Revision { target, feedback, .. } = event {
                    revisions.push(((*target).to_string(), (*feedback).to_string()));
                }
            })
            .expect("run");

        assert_eq!(
            provider.calls(),
            vec!["Draft", "Quality Gate: Draft", "Draft", "Quality Gate: Draft"]
        );
        assert_eq!(revisions, vec![("Draft".to_string(), "add sources".to_string())]);
        let draft = report.run("Draft").expect("draft");
        assert_eq!(draft.attempt_count, 2);
        assert_eq!(draft.history, vec!["draft v1".to_string()]);
        assert_eq!(draft.result_text.as_deref(), Some("draft v2"));
        assert!(
            provider.requests()[2]
                .description
                .ends_with("Feedback to address:\nadd sources")
        );
    }

    #[test]
    fn revision_bound_is_enforced_per_gate() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::new().respond("Quality Gate: Draft", ["REVISE: again"]);
        let def = supervised(vec![task("Draft", "W"), gate("Quality Gate: Draft")]);

        let err = fx
            .scheduler(|o| o.max_revisions = 2)
            .run(&def, "", &provider)
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::RevisionLimitExceeded { ref task, limit: 2, .. } if task == "Draft"
        ));
        let drafts = provider.calls().iter().filter(|c| *c == "Draft").count();
        assert_eq!(drafts, 3);
    }

    #[test]
    fn reentered_task_is_never_skipped() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.output_dir()).expect("mkdir");
        std::fs::write(fx.output_dir().join("draft.md"), "old draft").expect("write");
        let provider = ScriptedProvider::new()
            .respond("Quality Gate: Draft", ["REVISE: redo it", "APPROVED"]);
        let def = supervised(vec![task("Draft", "W"), gate("Quality Gate: Draft")]);

        fx.scheduler(|_| {}).run(&def, "", &provider).expect("run");

        assert_eq!(
            provider.calls(),
            vec!["Quality Gate: Draft", "Draft", "Quality Gate: Draft"]
        );
    }

    #[test]
    fn unrecognized_verdict_counts_as_approval() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::new().respond("Quality Gate: Draft", ["Looks fine to me"]);
        let def = supervised(vec![task("Draft", "W"), gate("Quality Gate: Draft")]);

        let report = fx.scheduler(|_| {}).run(&def, "", &provider).expect("run");
        assert_eq!(report.provider_calls, 2);
    }

    #[test]
    fn revise_without_preceding_task_fails() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::new().respond("Quality Gate: Nothing", ["REVISE: what?"]);
        let def = supervised(vec![gate("Quality Gate: Nothing")]);

        let err = fx.scheduler(|_| {}).run(&def, "", &provider).unwrap_err();
        assert!(matches!(err, RunError::NoRevisionTarget { .. }));
    }

    #[test]
    fn linear_architecture_ignores_gate_verdicts() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::new().respond("Quality Gate: Draft", ["REVISE: nope"]);
        let def = definition(vec![task("Draft", "W"), gate("Quality Gate: Draft")]);

        let report = fx.scheduler(|_| {}).run(&def, "", &provider).expect("run");
        assert_eq!(report.provider_calls, 2);
    }

    #[test]
    fn cancelled_flag_stops_before_next_task() {
        let fx = Fixture::new();
        let cancel = CancelFlag::new();
        let provider = ScriptedProvider::new();
        let def = definition(vec![task("Gather", "W"), task("Summarize", "W")]);
        let scheduler = fx.scheduler(|_| {}).with_cancel_flag(cancel.clone());

        let err = scheduler
            .run_with(&def, "", &provider, |event| {
                if let TaskEvent::Succeeded(_) = event {
                    cancel.cancel();
                }
            })
            .unwrap_err();

        assert!(matches!(err, RunError::Cancelled { ref task } if task == "Summarize"));
        assert_eq!(provider.calls(), vec!["Gather"]);
        assert!(fx.output_dir().join("gather.md").exists());
    }

    #[test]
    fn previous_feedback_is_carried_into_first_result_task() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.output_dir()).expect("mkdir");
        std::fs::write(fx.output_dir().join("Task_Feedback.md"), "Use shorter chapters.")
            .expect("write");
        let provider = ScriptedProvider::new();
        let def = definition(vec![
            task("Gather", "W"),
            task("Write Chapter", "W"),
            task("Write Epilogue", "W"),
        ]);

        fx.scheduler(|_| {}).run(&def, "", &provider).expect("run");

        let requests = provider.requests();
        assert!(!requests[0].description.contains("shorter chapters"));
        assert!(requests[1].description.contains("Use shorter chapters."));
        assert!(!requests[2].description.contains("shorter chapters"));
    }

    #[test]
    fn run_log_is_written_on_failure() {
        let fx = Fixture::new();
        let log_dir = fx.temp.path().join("logs");
        let provider = ScriptedProvider::new().fail("Summarize", "boom");
        let def = definition(vec![task("Gather", "W"), task("Summarize", "W")]);

        let _ = fx
            .scheduler(|o| o.log_dir = Some(log_dir.clone()))
            .run(&def, "", &provider)
            .unwrap_err();

        let entries: Vec<_> = std::fs::read_dir(&log_dir)
            .expect("log dir")
            .map(|e| e.expect("entry").path())
            .collect();
        assert_eq!(entries.len(), 1);
        let log = std::fs::read_to_string(&entries[0]).expect("read log");
        assert!(log.contains("\"status\": \"succeeded\""));
        assert!(log.contains("\"status\": \"failed\""));
        assert!(log.contains("boom"));
    }
}
