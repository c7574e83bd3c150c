//! Placeholder resolution against lookup paths and outputs produced this run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use tracing::{debug, instrument};

use crate::core::placeholder::{self, PlaceholderToken, Segment};
use crate::core::sampling::{self, SamplingPolicy};
use crate::core::types::ResolvedContent;
use crate::error::ResolveError;

const BRIEF_HEADER: &str = "Context from task brief:";
const FEEDBACK_HEADER: &str = "Feedback to address:";

/// Outputs finalized earlier in the current run, keyed by routed file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducedOutputs {
    files: BTreeMap<String, PathBuf>,
}

impl ProducedOutputs {
    pub fn insert(&mut self, file_name: impl Into<String>, path: PathBuf) {
        self.files.insert(file_name.into(), path);
    }

    pub fn get(&self, file_name: &str) -> Option<&Path> {
        self.files.get(file_name).map(PathBuf::as_path)
    }
}

/// Substitutes placeholders in task description templates.
#[derive(Debug, Clone)]
pub struct ContentResolver {
    lookup_paths: Vec<PathBuf>,
    sampling: SamplingPolicy,
    prepend_brief: bool,
}

impl ContentResolver {
    /// `lookup_paths` are searched in order after the produced-output cache.
    pub fn new(lookup_paths: Vec<PathBuf>, sampling: SamplingPolicy) -> Self {
        Self {
            lookup_paths,
            sampling,
            prepend_brief: true,
        }
    }

    pub fn with_prepend_brief(mut self, enabled: bool) -> Self {
        self.prepend_brief = enabled;
        self
    }

    /// Resolve every placeholder in `template`.
    ///
    /// Substituted content is never rescanned. Feedback lands in place of
    /// `{revision_feedback}` when present, otherwise it is appended.
    #[instrument(skip_all, fields(template_bytes = template.len()))]
    pub fn resolve(
        &self,
        template: &str,
        brief: &str,
        feedback: Option<&str>,
        produced: &ProducedOutputs,
    ) -> Result<ResolvedContent, ResolveError> {
        let segments = placeholder::scan(template).map_err(|err| ResolveError::Unresolved {
            token: format!("malformed placeholder at byte {}: {}", err.offset, err.message),
        })?;

        let mut text = String::with_capacity(template.len());
        let mut was_sampled = false;
        let mut saw_task_input = false;
        let mut saw_feedback = false;

        for segment in segments {
            match segment {
                Segment::Text(literal) => text.push_str(literal),
                Segment::Token(PlaceholderToken::TaskInput) => {
                    saw_task_input = true;
                    text.push_str(brief);
                }
                Segment::Token(PlaceholderToken::RevisionFeedback) => {
                    saw_feedback = true;
                    text.push_str(feedback.unwrap_or_default());
                }
                Segment::Token(PlaceholderToken::FileRef(name)) => {
                    let content = self.resolve_file(&name, produced)?;
                    was_sampled |= content.was_sampled;
                    text.push_str(&content.text);
                }
            }
        }

        if !saw_task_input && self.prepend_brief && !brief.trim().is_empty() {
            text = format!("{BRIEF_HEADER}\n{}\n\n{text}", brief.trim_end());
        }
        if let Some(feedback) = feedback.filter(|_| !saw_feedback) {
            text = format!("{}\n\n{FEEDBACK_HEADER}\n{}", text.trim_end(), feedback.trim());
        }

        Ok(ResolvedContent { text, was_sampled })
    }

    /// Locate `[[name]]`: produced outputs first, then each lookup path.
    pub fn locate(&self, name: &str, produced: &ProducedOutputs) -> Option<PathBuf> {
        if !is_safe_name(name) {
            return None;
        }
        if let Some(path) = produced.get(name) {
            return Some(path.to_path_buf());
        }
        self.lookup_paths
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    fn resolve_file(&self, name: &str, produced: &ProducedOutputs) -> Result<ResolvedContent, ResolveError> {
        let token = PlaceholderToken::FileRef(name.to_string()).to_string();
        let path = self
            .locate(name, produced)
            .ok_or_else(|| ResolveError::Unresolved {
                token: token.clone(),
            })?;
        let bytes = fs::read(&path)
            .with_context(|| format!("read {}", path.display()))
            .map_err(|source| ResolveError::Read {
                token: token.clone(),
                source,
            })?;
        let content = String::from_utf8_lossy(&bytes);
        debug!(path = %path.display(), bytes = bytes.len(), "resolved file reference");
        Ok(sampling::sample(name, &content, &self.sampling))
    }
}

/// Relative names without `..` components only.
fn is_safe_name(name: &str) -> bool {
    let path = Path::new(name);
    !name.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}
