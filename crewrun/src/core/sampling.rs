//! Three-window sampling for oversized injected files.
//!
//! Content above the threshold is replaced by its start, a window centered on
//! the midpoint, and its end. Window edges snap down (start/middle) or up
//! (end) to UTF-8 character boundaries so the sample is always valid text.

use serde::{Deserialize, Serialize};

use crate::core::types::ResolvedContent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingPolicy {
    /// Content strictly larger than this many bytes is sampled.
    pub threshold_bytes: usize,
    /// Size of each of the three windows.
    pub window_bytes: usize,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            threshold_bytes: 50_000,
            window_bytes: 15_000,
        }
    }
}

/// Return `content` unchanged, or its three-window sample when oversized.
pub fn sample(name: &str, content: &str, policy: &SamplingPolicy) -> ResolvedContent {
    if content.len() <= policy.threshold_bytes {
        return ResolvedContent {
            text: content.to_string(),
            was_sampled: false,
        };
    }

    let len = content.len();
    let window = policy.window_bytes.min(len);

    let start = &content[..floor_boundary(content, window)];

    let mid_from = floor_boundary(content, (len / 2).saturating_sub(window / 2));
    let mid_to = floor_boundary(content, (mid_from + window).min(len));
    let middle = &content[mid_from..mid_to];

    let end = &content[ceil_boundary(content, len - window)..];

    let text = format!(
        "[NOTE: Content of {name} has been sampled due to size ({len} bytes)]\n\n\
         --- START OF FILE ---\n{start}\n\n\
         --- MIDDLE OF FILE ---\n{middle}\n\n\
         --- END OF FILE ---\n{end}"
    );
    ResolvedContent {
        text,
        was_sampled: true,
    }
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
