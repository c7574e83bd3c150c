//! Placeholder scanning for task description templates.
//!
//! Recognized tokens:
//! - `{task_input}`: the ambient task brief.
//! - `[[name]]`: content of a named file.
//! - `{revision_feedback}`: feedback injected by a quality gate verdict.
//!
//! Scanning is a single left-to-right pass. Text between tokens is kept as-is
//! and substituted content is never rescanned.

use std::fmt;

pub const TASK_INPUT_TOKEN: &str = "{task_input}";
pub const REVISION_FEEDBACK_TOKEN: &str = "{revision_feedback}";

const OPEN: &str = "[[";
const CLOSE: &str = "]]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderToken {
    TaskInput,
    FileRef(String),
    RevisionFeedback,
}

impl fmt::Display for PlaceholderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskInput => f.write_str(TASK_INPUT_TOKEN),
            Self::FileRef(name) => write!(f, "{OPEN}{name}{CLOSE}"),
            Self::RevisionFeedback => f.write_str(REVISION_FEEDBACK_TOKEN),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Token(PlaceholderToken),
}

/// Malformed `[[...]]` usage, located by byte offset into the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketError {
    pub offset: usize,
    pub message: &'static str,
}

/// Split a template into literal text and placeholder tokens.
pub fn scan(template: &str) -> Result<Vec<Segment<'_>>, BracketError> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < template.len() {
        let tail = &template[i..];
        let matched = if tail.starts_with(TASK_INPUT_TOKEN) {
            Some((PlaceholderToken::TaskInput, TASK_INPUT_TOKEN.len()))
        } else if tail.starts_with(REVISION_FEEDBACK_TOKEN) {
            Some((
                PlaceholderToken::RevisionFeedback,
                REVISION_FEEDBACK_TOKEN.len(),
            ))
        } else if tail.starts_with(OPEN) {
            let inner_start = OPEN.len();
            let close = tail[inner_start..].find(CLOSE).ok_or(BracketError {
                offset: i,
                message: "unterminated `[[` file reference",
            })?;
            let inner = &tail[inner_start..inner_start + close];
            if inner.contains(OPEN) {
                return Err(BracketError {
                    offset: i,
                    message: "unterminated `[[` file reference",
                });
            }
            let name = inner.trim();
            if name.is_empty() {
                return Err(BracketError {
                    offset: i,
                    message: "empty `[[]]` file reference",
                });
            }
            Some((
                PlaceholderToken::FileRef(name.to_string()),
                inner_start + close + CLOSE.len(),
            ))
        } else if tail.starts_with(CLOSE) {
            return Err(BracketError {
                offset: i,
                message: "`]]` without a matching `[[`",
            });
        } else {
            None
        };

        match matched {
            Some((token, len)) => {
                if text_start < i {
                    segments.push(Segment::Text(&template[text_start..i]));
                }
                segments.push(Segment::Token(token));
                i += len;
                text_start = i;
            }
            None => {
                i += tail.chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    if text_start < template.len() {
        segments.push(Segment::Text(&template[text_start..]));
    }
    Ok(segments)
}

/// File names referenced by `[[...]]` tokens, in order of appearance.
///
/// Malformed templates yield no references; the grammar rejects them earlier.
pub fn file_refs(template: &str) -> Vec<String> {
    scan(template)
        .map(|segments| {
            segments
                .into_iter()
                .filter_map(|segment| match segment {
                    Segment::Token(PlaceholderToken::FileRef(name)) => Some(name),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}
