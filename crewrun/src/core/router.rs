//! Deterministic routing of task results to output files.
//!
//! - An explicit `[Output: file]` directive always wins.
//! - Otherwise the task is classified into a [`Bucket`] by the first matching
//!   rule in [`ROUTING_RULES`], scanning the task name and expected output.
//! - Tasks that match no rule fall back to a slug of their name.
//!
//! Two tasks landing in the same bucket share one file; the later one overwrites.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::definition::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Plan,
    Result,
    Feedback,
}

impl Bucket {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Plan => "Task_Plan.md",
            Self::Result => "Task_Result.md",
            Self::Feedback => "Task_Feedback.md",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RoutingRule {
    pub bucket: Bucket,
    pub keywords: &'static [&'static str],
}

/// Evaluated top to bottom; the first rule with a matching keyword wins.
pub const ROUTING_RULES: &[RoutingRule] = &[
    RoutingRule {
        bucket: Bucket::Plan,
        keywords: &["plan", "strategy", "analysis", "guide", "outline"],
    },
    RoutingRule {
        bucket: Bucket::Result,
        keywords: &["result", "execute", "enrich", "develop", "write", "creation"],
    },
    RoutingRule {
        bucket: Bucket::Feedback,
        keywords: &["feedback", "evaluation", "review", "edit"],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "bucket")]
pub enum RouteSource {
    Explicit,
    Bucket(Bucket),
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub file_name: String,
    pub source: RouteSource,
}

/// Classify a task by keyword, ignoring any explicit directive.
pub fn classify(task: &Task) -> Option<Bucket> {
    let name = task.name.to_lowercase();
    let expected = task.expected_output.to_lowercase();
    ROUTING_RULES
        .iter()
        .find(|rule| {
            rule.keywords
                .iter()
                .any(|keyword| name.contains(keyword) || expected.contains(keyword))
        })
        .map(|rule| rule.bucket)
}

pub fn route(task: &Task) -> Route {
    if let Some(file) = &task.explicit_output_file {
        return Route {
            file_name: file.clone(),
            source: RouteSource::Explicit,
        };
    }
    match classify(task) {
        Some(bucket) => Route {
            file_name: bucket.file_name().to_string(),
            source: RouteSource::Bucket(bucket),
        },
        None => Route {
            file_name: format!("{}.md", slugify(&task.name)),
            source: RouteSource::Fallback,
        },
    }
}

/// Absolute-or-relative output path, following `output_dir`.
pub fn output_path(output_dir: &Path, task: &Task) -> PathBuf {
    output_dir.join(route(task).file_name)
}

/// Lowercase ASCII alphanumerics; every other run of characters becomes `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("task");
    }
    slug
}
