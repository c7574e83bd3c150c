//! Test-only helpers: definition builders, scripted providers and temp projects.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::definition::{Architecture, Task, Worker, WorkflowDefinition};
use crate::io::provider::{CapabilityProvider, ProviderRequest};

/// Linear two-worker document: `Write Report` reads what `Collect Data` wrote.
pub const TWO_TASK_DOC: &str = "\
# Crew Team: Report Crew

## Agents

### Collector
- **Role**: Data collector
- **Goal**: Gather the raw facts
- **Backstory**: Meticulous archivist.

### Writer
- **Role**: Report writer
- **Goal**: Turn facts into a readable report
- **Backstory**: Former newspaper editor.

## Tasks

### Collect Data [Output: data.md]
- **Description**: Collect the facts about {task_input}.
- **Expected Output**: A bullet list of facts
- **Agent**: Collector

### Write Report
- **Description**: Turn these facts into a report:
  [[data.md]]
- **Expected Output**: A one-page report
- **Agent**: Writer
";

/// Hierarchical document with a quality gate after the draft.
pub const SUPERVISED_DOC: &str = "\
# Crew Team: Novel Crew

## Configuration
- Architecture: hierarchical
- Supervisor Agent: Editor
- Tool Agent: Researcher

## Agents

### Researcher
- **Role**: Researcher
- **Goal**: Find supporting material
- **Backstory**: Librarian.
- **Model**: ollama/llama3.1:70b
- **Tools**: brave_search, ask_book_tool

### Editor
- **Role**: Editor
- **Goal**: Keep quality high
- **Backstory**: Twenty years in publishing.

## Tasks

### Write Draft [Output: draft.md]
- **Description**: Write a draft about {task_input}.
{revision_feedback}
- **Expected Output**: A full draft
- **Agent**: Researcher

### Quality Gate: Draft Review [Output: review.md]
- **Description**: Review [[draft.md]]. Answer APPROVED or REVISE: <reason>.
- **Expected Output**: A verdict
- **Agent**: Editor
";

/// Create a task with empty description and expected output.
pub fn task(name: &str, worker: &str) -> Task {
    Task {
        name: name.to_string(),
        description_template: String::new(),
        expected_output: String::new(),
        assigned_worker: worker.to_string(),
        explicit_output_file: None,
        is_quality_gate: Task::name_is_quality_gate(name),
        line: 0,
    }
}

/// Create a worker whose persona fields are all empty.
pub fn worker(name: &str) -> Worker {
    Worker {
        name: name.to_string(),
        role: String::new(),
        goal: String::new(),
        backstory: String::new(),
        provider_id: None,
        tools: BTreeSet::new(),
    }
}

/// Linear definition declaring one worker per distinct assigned worker.
pub fn definition(tasks: Vec<Task>) -> WorkflowDefinition {
    let mut workers: Vec<Worker> = Vec::new();
    for task in &tasks {
        if !workers.iter().any(|w| w.name == task.assigned_worker) {
            workers.push(worker(&task.assigned_worker));
        }
    }
    WorkflowDefinition {
        team_name: "Test Crew".to_string(),
        workers,
        tasks,
        architecture: Architecture::Linear,
        supervisor: None,
        tool_worker: None,
    }
}

pub fn provider_request(task: &str, worker: &str, description: &str) -> ProviderRequest {
    ProviderRequest {
        task: task.to_string(),
        worker: worker.to_string(),
        role: String::new(),
        goal: String::new(),
        backstory: String::new(),
        description: description.to_string(),
        expected_output: String::new(),
        tools: Vec::new(),
        provider_id: None,
    }
}

/// Provider returning scripted responses per task.
///
/// Each task walks through its script; the last entry repeats once the script
/// is exhausted. Unscripted tasks answer `"<task> done"`.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    scripts: HashMap<String, Vec<String>>,
    failures: HashMap<String, String>,
    requests: RefCell<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond<I, S>(mut self, task: &str, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts
            .insert(task.to_string(), responses.into_iter().map(Into::into).collect());
        self
    }

    /// Make every call for `task` fail with `message`.
    pub fn fail(mut self, task: &str, message: &str) -> Self {
        self.failures.insert(task.to_string(), message.to_string());
        self
    }

    /// Task names in call order.
    pub fn calls(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|request| request.task.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.borrow().clone()
    }
}

impl CapabilityProvider for ScriptedProvider {
    fn generate(&self, request: &ProviderRequest) -> Result<String> {
        let previous = self
            .requests
            .borrow()
            .iter()
            .filter(|r| r.task == request.task)
            .count();
        self.requests.borrow_mut().push(request.clone());

        if let Some(message) = self.failures.get(&request.task) {
            return Err(anyhow!("{message}"));
        }
        let response = self
            .scripts
            .get(&request.task)
            .and_then(|script| script.get(previous).or_else(|| script.last()))
            .cloned()
            .unwrap_or_else(|| format!("{} done", request.task));
        Ok(response)
    }
}

/// Provider that answers with the resolved description it was given.
#[derive(Debug, Default)]
pub struct EchoProvider {
    calls: RefCell<u32>,
}

impl EchoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.borrow()
    }
}

impl CapabilityProvider for EchoProvider {
    fn generate(&self, request: &ProviderRequest) -> Result<String> {
        *self.calls.borrow_mut() += 1;
        Ok(request.description.clone())
    }
}

/// Project root in a temp directory.
pub struct TestProject {
    temp: tempfile::TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            temp: tempfile::tempdir().expect("tempdir"),
        }
    }

    /// Project with `Crew.md` set to `doc`.
    pub fn with_crew(doc: &str) -> Self {
        let project = Self::new();
        project.write("Crew.md", doc);
        project
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.temp.path().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, contents).expect("write project file");
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).expect("read project file")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
