//! Quality gate verdict parsing.

/// Decision extracted from a quality gate's result text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    /// Carries the feedback text following `REVISE:`.
    Revise(String),
    /// Neither canonical prefix was found.
    Unrecognized,
}

const APPROVED: &str = "APPROVED";
const REVISE: &str = "REVISE";

/// Parse `APPROVED` or `REVISE: <feedback>` from the start of `text`.
///
/// Leading whitespace and Markdown emphasis/heading markers are ignored, and
/// the prefixes match case-insensitively.
pub fn parse_verdict(text: &str) -> Verdict {
    let body = strip_markup(text);

    if starts_with_ignore_case(body, APPROVED) {
        return Verdict::Approved;
    }
    if starts_with_ignore_case(body, REVISE) {
        let rest = strip_markup(&body[REVISE.len()..]);
        if let Some(feedback) = rest.strip_prefix(':') {
            return Verdict::Revise(feedback.trim().trim_end_matches(['*', '_']).trim().to_string());
        }
    }
    Verdict::Unrecognized
}

fn strip_markup(text: &str) -> &str {
    text.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '_' | '`' | '#' | '>'))
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}
