//! Parsed workflow definition: workers, tasks and architecture flags.
//!
//! Values here are produced once by [`crate::core::grammar`] and never mutated
//! afterwards. Execution-time state lives in [`crate::core::types::TaskRun`].

use std::collections::BTreeSet;

use serde::Serialize;

/// Task names starting with this prefix (case-insensitive) are quality gates.
pub const QUALITY_GATE_PREFIX: &str = "quality gate";

/// Execution topology declared in the `Configuration` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// Tasks run once each, in declaration order.
    #[default]
    Linear,
    /// Linear traversal plus APPROVED/REVISE handling after quality gates.
    Supervised,
}

impl Architecture {
    /// Accepts both the engine names and the names used by generated documents.
    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "linear" | "sequential" => Some(Self::Linear),
            "supervised" | "hierarchical" => Some(Self::Supervised),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Supervised => "supervised",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Worker {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// Model identifier for the capability provider; `None` means the configured default.
    pub provider_id: Option<String>,
    pub tools: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub name: String,
    pub description_template: String,
    pub expected_output: String,
    pub assigned_worker: String,
    pub explicit_output_file: Option<String>,
    pub is_quality_gate: bool,
    /// 1-based line of the task heading.
    pub line: usize,
}

impl Task {
    pub fn name_is_quality_gate(name: &str) -> bool {
        name.len() >= QUALITY_GATE_PREFIX.len()
            && name.is_char_boundary(QUALITY_GATE_PREFIX.len())
            && name[..QUALITY_GATE_PREFIX.len()].eq_ignore_ascii_case(QUALITY_GATE_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowDefinition {
    pub team_name: String,
    pub workers: Vec<Worker>,
    pub tasks: Vec<Task>,
    pub architecture: Architecture,
    pub supervisor: Option<String>,
    pub tool_worker: Option<String>,
}

impl WorkflowDefinition {
    pub fn worker(&self, name: &str) -> Option<&Worker> {
        self.workers.iter().find(|worker| worker.name == name)
    }

    /// Index of the closest non-gate task strictly before `index`.
    pub fn preceding_work_task(&self, index: usize) -> Option<usize> {
        (0..index).rev().find(|&i| !self.tasks[i].is_quality_gate)
    }
}
