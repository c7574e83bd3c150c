//! Line-oriented parser for crew definition documents.
//!
//! ```text
//! # Crew Team: <name>
//! ## Configuration            (optional)
//! - Architecture: sequential | hierarchical
//! - Supervisor Agent: <worker> | None
//! - Tool Agent: <worker> | None
//! ## Agents
//! ### <worker name>
//! - **Role**: ...            (also Goal, Backstory, Model, Tools)
//! ## Tasks
//! ### <task name> [Output: file.md]
//! - **Description**: ...    (also Expected Output, Agent)
//! ```
//!
//! The parser is a small state machine over heading levels: a level-2 heading
//! selects the section state, a level-3 heading inside Agents/Tasks opens a
//! record, and label lines fill the open record. Structural violations are
//! fatal; stray headings and missing optional fields become warnings.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::core::{placeholder, references};
use crate::definition::{Architecture, Task, Worker, WorkflowDefinition};
use crate::error::ParseError;

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*+]\s+)?\*\*\s*([^*:]+?)\s*(?::\*\*|\*\*\s*:)\s*(.*)$")
        .expect("label regex should compile")
});

static CONFIG_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*+]\s+([^:*]+?)\s*:\s*(.*)$").expect("config regex should compile")
});

static OUTPUT_DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*output\s*:").expect("output directive regex should compile")
});

const TITLE_PREFIX: &str = "crew team:";

/// Non-fatal finding reported alongside a successful parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDefinition {
    pub definition: WorkflowDefinition,
    pub warnings: Vec<ParseWarning>,
}

/// Parse a definition document.
pub fn parse_definition(text: &str) -> Result<ParsedDefinition, ParseError> {
    let mut parser = Parser::default();
    for (idx, line) in text.lines().enumerate() {
        parser.feed(idx + 1, line)?;
    }
    parser.finish()
}

/// Parse a definition and run the whole-document reference checks.
pub fn load_definition(text: &str) -> Result<ParsedDefinition, ParseError> {
    let parsed = parse_definition(text)?;
    references::check_forward_references(&parsed.definition)?;
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Nothing but blank lines seen so far.
    Start,
    /// After the title, or after an extra level-1 heading.
    Preamble,
    Configuration,
    Agents,
    Tasks,
    /// Inside an unknown level-2 section.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Worker,
    Task,
}

#[derive(Debug, Clone)]
struct LabelValue {
    key: String,
    value: String,
    line: usize,
}

#[derive(Debug, Clone)]
struct RecordDraft {
    kind: RecordKind,
    line: usize,
    name: String,
    output: Option<String>,
    labels: Vec<LabelValue>,
}

impl RecordDraft {
    fn label(&self, key: &str) -> Option<&LabelValue> {
        self.labels.iter().find(|label| label.key == key)
    }

    fn text(&self, key: &str) -> String {
        self.label(key)
            .map(|label| label.value.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct Parser {
    section: Option<Section>,
    team_name: Option<String>,
    seen_configuration: bool,
    seen_agents: bool,
    seen_tasks: bool,
    config: Vec<LabelValue>,
    records: Vec<RecordDraft>,
    current: Option<RecordDraft>,
    /// True while the previous non-blank line was a label (or its continuation).
    continuing: bool,
    warnings: Vec<ParseWarning>,
}

impl Parser {
    fn section(&self) -> Section {
        self.section.unwrap_or(Section::Start)
    }

    fn warn(&mut self, line: usize, message: String) {
        warn!(line, %message, "definition warning");
        self.warnings.push(ParseWarning { line, message });
    }

    fn feed(&mut self, line_no: usize, line: &str) -> Result<(), ParseError> {
        if let Some((level, text)) = heading(line) {
            self.continuing = false;
            return self.on_heading(line_no, level, text);
        }

        if line.trim().is_empty() {
            self.continuing = false;
            return Ok(());
        }

        match self.section() {
            Section::Start => Err(ParseError::structural(
                "title",
                format!("document must open with a `# Crew Team: <name>` title (line {line_no})"),
            )),
            Section::Configuration => {
                if let Some(pair) = label_line(line).or_else(|| config_pair(line)) {
                    self.config.push(LabelValue {
                        key: pair.0,
                        value: pair.1,
                        line: line_no,
                    });
                }
                Ok(())
            }
            Section::Agents | Section::Tasks => {
                self.on_record_line(line_no, line);
                Ok(())
            }
            Section::Preamble | Section::Ignored => Ok(()),
        }
    }

    fn on_heading(&mut self, line_no: usize, level: usize, text: &str) -> Result<(), ParseError> {
        if self.section() == Section::Start {
            if level != 1 {
                return Err(ParseError::structural(
                    "title",
                    format!("document must open with a level-1 title, found level {level} (line {line_no})"),
                ));
            }
            let name = strip_title_prefix(text);
            if name.is_empty() {
                return Err(ParseError::structural("title", "team name is empty"));
            }
            self.team_name = Some(name.to_string());
            self.section = Some(Section::Preamble);
            return Ok(());
        }

        match level {
            1 => {
                self.close_record();
                self.warn(line_no, format!("extra top-level heading `{text}` ends the current section"));
                self.section = Some(Section::Preamble);
            }
            2 => {
                self.close_record();
                self.enter_section(line_no, text)?;
            }
            3 => match self.section() {
                Section::Agents => self.open_record(line_no, RecordKind::Worker, text)?,
                Section::Tasks => self.open_record(line_no, RecordKind::Task, text)?,
                _ => debug!(line = line_no, "sub-heading outside Agents/Tasks ignored"),
            },
            _ => debug!(line = line_no, level, "deep heading ignored"),
        }
        Ok(())
    }

    fn enter_section(&mut self, line_no: usize, text: &str) -> Result<(), ParseError> {
        let (seen, section, label) = match text.trim().to_ascii_lowercase().as_str() {
            "configuration" => (&mut self.seen_configuration, Section::Configuration, "Configuration"),
            "agents" => (&mut self.seen_agents, Section::Agents, "Agents"),
            "tasks" => (&mut self.seen_tasks, Section::Tasks, "Tasks"),
            _ => {
                self.warn(line_no, format!("unknown section `{}` skipped", text.trim()));
                self.section = Some(Section::Ignored);
                return Ok(());
            }
        };
        if *seen {
            return Err(ParseError::structural(
                label,
                format!("duplicate `## {label}` section at line {line_no}"),
            ));
        }
        *seen = true;
        self.section = Some(section);
        Ok(())
    }

    fn open_record(&mut self, line_no: usize, kind: RecordKind, text: &str) -> Result<(), ParseError> {
        self.close_record();

        let (name, output) = match kind {
            RecordKind::Task => split_output_directive(line_no, text)?,
            RecordKind::Worker => (text.trim().to_string(), None),
        };

        if !name.chars().next().is_some_and(char::is_alphanumeric) {
            self.warn(line_no, format!("stray sub-heading `{}` skipped", text.trim()));
            return Ok(());
        }

        self.current = Some(RecordDraft {
            kind,
            line: line_no,
            name,
            output,
            labels: Vec::new(),
        });
        Ok(())
    }

    fn on_record_line(&mut self, line_no: usize, line: &str) {
        let label = label_line(line);
        let Some(record) = self.current.as_mut() else {
            if label.is_some() {
                self.warn(line_no, "label outside of a record ignored".to_string());
            }
            return;
        };

        if let Some((key, value)) = label {
            record.labels.push(LabelValue {
                key,
                value,
                line: line_no,
            });
            self.continuing = true;
            return;
        }

        if self.continuing
            && let Some(last) = record.labels.last_mut()
        {
            if last.value.is_empty() {
                // Value starts on this line; diagnostics point here.
                last.line = line_no;
            } else {
                last.value.push('\n');
            }
            last.value.push_str(line.trim());
        }
    }

    fn close_record(&mut self) {
        let Some(record) = self.current.take() else {
            return;
        };
        if record.labels.is_empty() {
            self.warn(
                record.line,
                format!("sub-heading `{}` has no fields and was skipped", record.name),
            );
            return;
        }
        self.records.push(record);
    }

    fn finish(mut self) -> Result<ParsedDefinition, ParseError> {
        self.close_record();

        let team_name = self
            .team_name
            .take()
            .ok_or_else(|| ParseError::structural("title", "missing `# Crew Team: <name>` title"))?;
        if !self.seen_agents {
            return Err(ParseError::structural("Agents", "missing `## Agents` section"));
        }
        if !self.seen_tasks {
            return Err(ParseError::structural("Tasks", "missing `## Tasks` section"));
        }

        let records = std::mem::take(&mut self.records);
        let workers = self.build_workers(&records)?;
        let tasks = self.build_tasks(&records, &workers)?;
        let (architecture, supervisor, tool_worker) = self.build_configuration(&workers)?;

        let definition = WorkflowDefinition {
            team_name,
            workers,
            tasks,
            architecture,
            supervisor,
            tool_worker,
        };
        self.check_supervision(&definition);

        Ok(ParsedDefinition {
            definition,
            warnings: self.warnings,
        })
    }

    fn build_workers(&mut self, records: &[RecordDraft]) -> Result<Vec<Worker>, ParseError> {
        let mut workers: Vec<Worker> = Vec::new();
        for record in records.iter().filter(|r| r.kind == RecordKind::Worker) {
            if workers.iter().any(|w| w.name == record.name) {
                return Err(ParseError::structural(
                    "Agents",
                    format!("duplicate agent name `{}` at line {}", record.name, record.line),
                ));
            }
            for field in ["role", "goal", "backstory"] {
                if record.label(field).is_none() {
                    self.warn(record.line, format!("agent `{}` has no {field}", record.name));
                }
            }
            workers.push(Worker {
                name: record.name.clone(),
                role: record.text("role"),
                goal: record.text("goal"),
                backstory: record.text("backstory"),
                provider_id: parse_model(&record.text("model")),
                tools: parse_tools(&record.text("tools")),
            });
        }
        if workers.is_empty() {
            return Err(ParseError::structural("Agents", "no agents declared"));
        }
        Ok(workers)
    }

    fn build_tasks(&mut self, records: &[RecordDraft], workers: &[Worker]) -> Result<Vec<Task>, ParseError> {
        let declared: HashSet<&str> = workers.iter().map(|w| w.name.as_str()).collect();
        let mut tasks: Vec<Task> = Vec::new();
        for record in records.iter().filter(|r| r.kind == RecordKind::Task) {
            if tasks.iter().any(|t| t.name == record.name) {
                return Err(ParseError::structural(
                    "Tasks",
                    format!("duplicate task name `{}` at line {}", record.name, record.line),
                ));
            }

            let agent = record.text("agent");
            if agent.is_empty() {
                return Err(ParseError::reference(
                    record.line,
                    format!("task `{}` has no Agent", record.name),
                ));
            }
            if !declared.contains(agent.as_str()) {
                return Err(ParseError::reference(
                    record.label("agent").map_or(record.line, |l| l.line),
                    format!("task `{}` names unknown agent `{agent}`", record.name),
                ));
            }

            if let Some(description) = record.label("description") {
                check_brackets(description)?;
            }
            for field in ["description", "expected output"] {
                if record.label(field).is_none() {
                    self.warn(record.line, format!("task `{}` has no {field}", record.name));
                }
            }

            tasks.push(Task {
                is_quality_gate: Task::name_is_quality_gate(&record.name),
                name: record.name.clone(),
                description_template: record.text("description"),
                expected_output: record.text("expected output"),
                assigned_worker: agent,
                explicit_output_file: record.output.clone(),
                line: record.line,
            });
        }
        if tasks.is_empty() {
            return Err(ParseError::structural("Tasks", "no tasks declared"));
        }
        Ok(tasks)
    }

    fn build_configuration(
        &self,
        workers: &[Worker],
    ) -> Result<(Architecture, Option<String>, Option<String>), ParseError> {
        let mut architecture = Architecture::default();
        let mut supervisor = None;
        let mut tool_worker = None;

        for entry in &self.config {
            match entry.key.as_str() {
                "architecture" => {
                    architecture = Architecture::from_label(&entry.value).ok_or_else(|| {
                        ParseError::syntax(
                            entry.line,
                            format!(
                                "architecture must be sequential or hierarchical, got `{}`",
                                entry.value
                            ),
                        )
                    })?;
                }
                "supervisor agent" | "supervisor" => {
                    supervisor = worker_reference(entry, workers)?;
                }
                "tool agent" | "tool worker" => {
                    tool_worker = worker_reference(entry, workers)?;
                }
                other => debug!(key = other, "unknown configuration key ignored"),
            }
        }
        Ok((architecture, supervisor, tool_worker))
    }

    fn check_supervision(&mut self, definition: &WorkflowDefinition) {
        if definition.architecture != Architecture::Supervised {
            return;
        }
        if definition.supervisor.is_none() {
            self.warn(1, "hierarchical architecture without a Supervisor Agent".to_string());
        }
        for (idx, task) in definition.tasks.iter().enumerate() {
            if task.is_quality_gate && definition.preceding_work_task(idx).is_none() {
                self.warn(
                    task.line,
                    format!("quality gate `{}` has no preceding task to revise", task.name),
                );
            }
        }
    }
}

/// Returns `(level, text)` for ATX headings (`#` through `######`).
fn heading(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.bytes().take_while(|b| *b == b'#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    Some((level, rest.trim()))
}

/// `**Label**: value`, `**Label:** value`, optionally bulleted.
fn label_line(line: &str) -> Option<(String, String)> {
    let caps = LABEL_RE.captures(line)?;
    Some((caps[1].trim().to_lowercase(), caps[2].trim().to_string()))
}

fn config_pair(line: &str) -> Option<(String, String)> {
    let caps = CONFIG_PAIR_RE.captures(line)?;
    Some((caps[1].trim().to_lowercase(), caps[2].trim().to_string()))
}

fn strip_title_prefix(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.len() >= TITLE_PREFIX.len()
        && trimmed.is_char_boundary(TITLE_PREFIX.len())
        && trimmed[..TITLE_PREFIX.len()].eq_ignore_ascii_case(TITLE_PREFIX)
    {
        return trimmed[TITLE_PREFIX.len()..].trim();
    }
    trimmed
}

/// Split `Name [Output: file.md]` into the task name and the directive's file.
fn split_output_directive(line_no: usize, text: &str) -> Result<(String, Option<String>), ParseError> {
    let Some(found) = OUTPUT_DIRECTIVE_RE.find(text) else {
        return Ok((text.trim().to_string(), None));
    };
    let after = &text[found.end()..];
    let close = after
        .find(']')
        .ok_or_else(|| ParseError::syntax(line_no, "unterminated `[Output: ...]` directive"))?;
    let file = after[..close].trim();
    if file.is_empty() {
        return Err(ParseError::syntax(line_no, "`[Output: ...]` directive names no file"));
    }
    if file.starts_with(['/', '\\'])
        || file.split(['/', '\\']).any(|part| part == "..")
        || file.chars().nth(1) == Some(':')
    {
        return Err(ParseError::syntax(
            line_no,
            format!("output file `{file}` must stay inside the output directory"),
        ));
    }

    let before = text[..found.start()].trim();
    let rest = after[close + 1..].trim();
    let name = match (before.is_empty(), rest.is_empty()) {
        (_, true) => before.to_string(),
        (true, false) => rest.to_string(),
        (false, false) => format!("{before} {rest}"),
    };
    Ok((name, Some(file.to_string())))
}

fn check_brackets(description: &LabelValue) -> Result<(), ParseError> {
    placeholder::scan(&description.value).map(|_| ()).map_err(|err| {
        let line = description.line + description.value[..err.offset].matches('\n').count();
        ParseError::syntax(line, err.message)
    })
}

fn parse_model(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("default") {
        return None;
    }
    Some(value.to_string())
}

fn parse_tools(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|tool| !tool.is_empty() && !tool.eq_ignore_ascii_case("none"))
        .map(str::to_string)
        .collect()
}

fn worker_reference(entry: &LabelValue, workers: &[Worker]) -> Result<Option<String>, ParseError> {
    let name = entry.value.trim();
    if name.is_empty() || name.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    if !workers.iter().any(|w| w.name == name) {
        return Err(ParseError::reference(
            entry.line,
            format!("configuration names unknown agent `{name}`"),
        ));
    }
    Ok(Some(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{SUPERVISED_DOC, TWO_TASK_DOC};

    fn parse(text: &str) -> ParsedDefinition {
        parse_definition(text).expect("parse")
    }

    #[test]
    fn parses_workers_tasks_and_directives() {
        let parsed = parse(TWO_TASK_DOC);
        let def = &parsed.definition;

        assert_eq!(def.team_name, "Report Crew");
        assert_eq!(def.architecture, Architecture::Linear);
        assert_eq!(def.workers.len(), 2);
        assert_eq!(def.workers[0].name, "Collector");
        assert_eq!(def.workers[0].role, "Data collector");
        assert_eq!(def.tasks.len(), 2);
        assert_eq!(def.tasks[0].name, "Collect Data");
        assert_eq!(def.tasks[0].explicit_output_file.as_deref(), Some("data.md"));
        assert_eq!(def.tasks[1].explicit_output_file, None);
        assert_eq!(def.tasks[1].assigned_worker, "Writer");
        assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
    }

    #[test]
    fn parsing_is_idempotent() {
        assert_eq!(parse(SUPERVISED_DOC), parse(SUPERVISED_DOC));
    }

    #[test]
    fn configuration_section_sets_architecture_and_roles() {
        let def = parse(SUPERVISED_DOC).definition;
        assert_eq!(def.architecture, Architecture::Supervised);
        assert_eq!(def.supervisor.as_deref(), Some("Editor"));
        assert_eq!(def.tool_worker.as_deref(), Some("Researcher"));
        let researcher = def.worker("Researcher").expect("researcher");
        assert_eq!(
            researcher.tools.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["ask_book_tool", "brave_search"]
        );
        assert_eq!(researcher.provider_id.as_deref(), Some("ollama/llama3.1:70b"));
        assert!(def.tasks[1].is_quality_gate);
    }

    #[test]
    fn missing_title_is_structural() {
        let err = parse_definition("## Agents\n### A\n- **Role**: r\n").unwrap_err();
        assert!(matches!(err, ParseError::Structural { ref section, .. } if section == "title"));

        let err = parse_definition("Some prose first\n# Crew Team: X\n").unwrap_err();
        assert!(matches!(err, ParseError::Structural { .. }));

        let err = parse_definition("").unwrap_err();
        assert!(matches!(err, ParseError::Structural { .. }));
    }

    #[test]
    fn missing_sections_are_structural() {
        let err = parse_definition("# Crew Team: X\n## Agents\n### A\n- **Role**: r\n").unwrap_err();
        assert!(matches!(err, ParseError::Structural { ref section, .. } if section == "Tasks"));

        let err = parse_definition("# Crew Team: X\n## Tasks\n### T\n- **Agent**: A\n").unwrap_err();
        assert!(matches!(err, ParseError::Structural { ref section, .. } if section == "Agents"));
    }

    #[test]
    fn duplicate_section_is_structural() {
        let doc = "# Crew Team: X\n## Agents\n### A\n- **Role**: r\n## Agents\n## Tasks\n";
        let err = parse_definition(doc).unwrap_err();
        assert!(err.to_string().contains("duplicate `## Agents`"));
    }

    #[test]
    fn unknown_worker_is_reference_error_with_line() {
        let doc = "# Crew Team: X\n## Agents\n### A\n- **Role**: r\n## Tasks\n### T\n- **Description**: d\n- **Agent**: Ghost\n";
        let err = parse_definition(doc).unwrap_err();
        assert_eq!(
            err,
            ParseError::Reference {
                line: 8,
                message: "task `T` names unknown agent `Ghost`".to_string(),
            }
        );
    }

    #[test]
    fn unterminated_output_directive_is_syntax_error() {
        let doc = "# Crew Team: X\n## Agents\n### A\n- **Role**: r\n## Tasks\n### T [Output: t.md\n- **Agent**: A\n";
        let err = parse_definition(doc).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 6, .. }));
    }

    #[test]
    fn output_directive_cannot_escape_output_dir() {
        let doc = "# Crew Team: X\n## Agents\n### A\n- **Role**: r\n## Tasks\n### T [Output: ../t.md]\n- **Agent**: A\n";
        let err = parse_definition(doc).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 6, .. }));
    }

    #[test]
    fn unbalanced_file_reference_is_syntax_error_on_its_line() {
        let doc = "# Crew Team: X\n## Agents\n### A\n- **Role**: r\n## Tasks\n### T\n- **Description**: first line\n  then [[notes.md\n- **Agent**: A\n";
        let err = parse_definition(doc).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 8, .. }), "{err:?}");
    }

    #[test]
    fn bracket_error_on_first_continuation_line_reports_that_line() {
        let doc = "# Crew Team: X\n## Agents\n### A\n- **Role**: r\n## Tasks\n### T\n- **Description**:\n  then [[notes.md\n- **Agent**: A\n";
        let err = parse_definition(doc).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 8, .. }), "{err:?}");
    }

    #[test]
    fn mid_heading_output_directive_keeps_single_spaces() {
        let doc = "# Crew Team: X\n## Agents\n### A\n- **Role**: r\n## Tasks\n### Draft [Output: d.md] Chapter\n- **Description**: d\n- **Agent**: A\n";
        let task = &parse_definition(doc).expect("parse").definition.tasks[0];
        assert_eq!(task.name, "Draft Chapter");
        assert_eq!(task.explicit_output_file.as_deref(), Some("d.md"));
    }

    #[test]
    fn stray_sub_headings_are_warnings_not_records() {
        let doc = "\
# Crew Team: X
## Agents
### A
- **Role**: r
### ---
### Notes
Just prose here.
## Tasks
### T
- **Description**: d
- **Agent**: A
";
        let parsed = parse(doc);
        assert_eq!(parsed.definition.workers.len(), 1);
        let skipped: Vec<_> = parsed
            .warnings
            .iter()
            .filter(|w| w.message.contains("skipped"))
            .collect();
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].line, 5);
        assert!(skipped[1].message.contains("`Notes`"));
    }

    #[test]
    fn labels_are_case_insensitive_and_unknown_labels_ignored() {
        let doc = "\
# Crew Team: X
## Agents
### A
**role:** Analyst
* **GOAL**: find things
- **Mood**: cheerful
- **Backstory**: long
## Tasks
### T
- **description**: d
- **expected output**: e
- **agent**: A
";
        let def = parse(doc).definition;
        assert_eq!(def.workers[0].role, "Analyst");
        assert_eq!(def.workers[0].goal, "find things");
        assert_eq!(def.tasks[0].expected_output, "e");
    }

    #[test]
    fn continuation_lines_extend_the_previous_label() {
        let doc = "\
# Crew Team: X
## Agents
### A
- **Role**: r
## Tasks
### T
- **Description**: Read the brief.
  Then summarize it.

This paragraph is not part of the description.
- **Agent**: A
";
        let def = parse(doc).definition;
        assert_eq!(
            def.tasks[0].description_template,
            "Read the brief.\nThen summarize it."
        );
    }

    #[test]
    fn missing_optional_fields_default_to_empty_with_warnings() {
        let doc = "# Crew Team: X\n## Agents\n### A\n- **Model**: Default\n## Tasks\n### T\n- **Agent**: A\n";
        let parsed = parse(doc);
        let worker = &parsed.definition.workers[0];
        assert_eq!(worker.role, "");
        assert_eq!(worker.provider_id, None);
        assert_eq!(parsed.definition.tasks[0].description_template, "");
        assert!(parsed.warnings.iter().any(|w| w.message.contains("has no role")));
        assert!(parsed.warnings.iter().any(|w| w.message.contains("has no description")));
    }

    #[test]
    fn unknown_architecture_is_syntax_error() {
        let doc = "# Crew Team: X\n## Configuration\n- Architecture: parallel\n## Agents\n### A\n- **Role**: r\n## Tasks\n### T\n- **Agent**: A\n";
        let err = parse_definition(doc).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 3, .. }));
    }

    #[test]
    fn unknown_supervisor_is_reference_error() {
        let doc = "# Crew Team: X\n## Configuration\n- Supervisor Agent: Boss\n## Agents\n### A\n- **Role**: r\n## Tasks\n### T\n- **Agent**: A\n";
        let err = parse_definition(doc).unwrap_err();
        assert!(matches!(err, ParseError::Reference { line: 3, .. }));
    }

    #[test]
    fn duplicate_names_are_structural() {
        let doc = "# Crew Team: X\n## Agents\n### A\n- **Role**: r\n### A\n- **Role**: s\n## Tasks\n### T\n- **Agent**: A\n";
        assert!(matches!(
            parse_definition(doc).unwrap_err(),
            ParseError::Structural { .. }
        ));
    }

    #[test]
    fn load_definition_rejects_forward_references() {
        let doc = "\
# Crew Team: X
## Agents
### A
- **Role**: r
## Tasks
### Summarize
- **Description**: Summarize [[data.md]]
- **Agent**: A
### Collect [Output: data.md]
- **Description**: Collect
- **Agent**: A
";
        assert!(parse_definition(doc).is_ok());
        let err = load_definition(doc).unwrap_err();
        assert!(matches!(err, ParseError::Reference { line: 6, .. }));
    }

    #[test]
    fn heading_requires_space_after_hashes() {
        assert_eq!(heading("### Task"), Some((3, "Task")));
        assert_eq!(heading("#hashtag"), None);
        assert_eq!(heading("#######"), None);
        assert_eq!(heading("##"), Some((2, "")));
    }
}
