use serde::{Deserialize, Serialize};

use super::matcher::MatchSpan;

const ELLIPSIS: &str = "...";

/// Context kept around a match when building a result preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewWindow {
    /// Characters kept before the match start
    pub before: usize,
    /// Characters kept after the match end
    pub after: usize,
}

impl Default for PreviewWindow {
    fn default() -> Self {
        Self {
            before: 50,
            after: 100,
        }
    }
}

impl PreviewWindow {
    /// Text around `span`, with an ellipsis on each side that was cut
    pub fn preview(&self, content: &str, span: &MatchSpan) -> String {
        let start = clamp_to_boundary(content, span.start.min(content.len()));
        let end = clamp_to_boundary(content, span.end.min(content.len()).max(start));

        let from = step_back(content, start, self.before);
        let to = step_forward(content, end, self.after);

        let mut preview = String::with_capacity(to - from + 2 * ELLIPSIS.len());
        if from > 0 {
            preview.push_str(ELLIPSIS);
        }
        preview.push_str(&content[from..to]);
        if to < content.len() {
            preview.push_str(ELLIPSIS);
        }
        preview
    }
}

/// Largest char boundary at or before `pos`
fn clamp_to_boundary(content: &str, mut pos: usize) -> usize {
    while pos > 0 && !content.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Byte offset `chars` characters before `pos`, stopping at 0
fn step_back(content: &str, pos: usize, chars: usize) -> usize {
    content[..pos]
        .char_indices()
        .rev()
        .take(chars)
        .last()
        .map_or(pos, |(offset, _)| offset)
}

/// Byte offset `chars` characters after `pos`, stopping at the end
fn step_forward(content: &str, pos: usize, chars: usize) -> usize {
    content[pos..]
        .char_indices()
        .nth(chars)
        .map_or(content.len(), |(offset, _)| pos + offset)
}
