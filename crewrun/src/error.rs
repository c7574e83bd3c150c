//! Error taxonomy for loading and running a workflow.

use thiserror::Error;

/// Fatal problems found while parsing or validating a definition document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The document shape is wrong (missing title, missing or duplicate section, ...).
    #[error("structural error in {section}: {message}")]
    Structural { section: String, message: String },

    /// A name points at something that is not declared.
    #[error("reference error at line {line}: {message}")]
    Reference { line: usize, message: String },

    /// A malformed token or directive.
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },
}

impl ParseError {
    pub(crate) fn structural(section: &str, message: impl Into<String>) -> Self {
        Self::Structural {
            section: section.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn reference(line: usize, message: impl Into<String>) -> Self {
        Self::Reference {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }
}

/// Failure to substitute a placeholder.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unresolved reference `{token}`")]
    Unresolved { token: String },

    #[error("read {token}: {source:#}")]
    Read {
        token: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors that abort a workflow run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("task `{task}`: unresolved reference `{token}`")]
    UnresolvedReference { task: String, token: String },

    #[error("task `{task}`: provider failed for worker `{worker}`: {source:#}")]
    Provider {
        task: String,
        worker: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("quality gate `{gate}` requested revisions of `{task}` more than {limit} times")]
    RevisionLimitExceeded {
        gate: String,
        task: String,
        limit: u32,
    },

    #[error("quality gate `{gate}` requested a revision but no task precedes it")]
    NoRevisionTarget { gate: String },

    #[error("run cancelled during task `{task}`")]
    Cancelled { task: String },

    #[error("task `{task}`: {stage}: {source:#}")]
    Storage {
        task: String,
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl RunError {
    pub(crate) fn from_resolve(task: &str, err: ResolveError) -> Self {
        match err {
            ResolveError::Unresolved { token } => Self::UnresolvedReference {
                task: task.to_string(),
                token,
            },
            ResolveError::Read { token, source } => Self::Storage {
                task: task.to_string(),
                stage: "resolve",
                source: source.context(format!("read {token}")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_name_their_location() {
        let err = ParseError::reference(12, "task `Write` names unknown worker `Ghost`");
        assert_eq!(
            err.to_string(),
            "reference error at line 12: task `Write` names unknown worker `Ghost`"
        );
        let err = ParseError::structural("title", "missing title heading");
        assert!(err.to_string().contains("in title"));
    }

    #[test]
    fn resolve_errors_map_to_run_errors_with_task_context() {
        let err = RunError::from_resolve(
            "Write Report",
            ResolveError::Unresolved {
                token: "[[data.md]]".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "task `Write Report`: unresolved reference `[[data.md]]`"
        );
    }
}
