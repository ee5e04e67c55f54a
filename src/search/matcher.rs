//! Locating query terms inside a single channel of text.
//!
//! The same [`Matcher`] runs when a query is executed against the index and
//! when a presentation layer highlights already-rendered text, so search hits
//! and on-screen emphasis always agree.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper bound on the compiled size of a user-supplied pattern
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// A located occurrence, as byte offsets into the text it was found in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    /// The query term (or regex match) responsible for this span
    pub variant: String,
}

impl MatchSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Options that influence how terms are compared against text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOptions {
    pub match_case: bool,
    pub match_whole_word: bool,
    pub use_regex: bool,
}

#[derive(Debug, Clone)]
struct LiteralTerm {
    /// Term as supplied by the caller
    original: String,
    /// Term as compared (case-folded unless matching case)
    needle: String,
}

#[derive(Debug, Clone)]
enum Mode {
    /// Nothing can match (empty query or invalid pattern)
    Nothing,
    Literal(Vec<LiteralTerm>),
    Pattern(Regex),
}

/// Prepared term set, reusable across many texts
#[derive(Debug, Clone)]
pub struct Matcher {
    mode: Mode,
    options: MatchOptions,
}

impl Matcher {
    /// Prepare the primary term plus extra terms under `options`.
    ///
    /// In regex mode only `primary` is compiled and `extra_terms` are
    /// ignored. An invalid pattern produces a matcher that finds nothing.
    pub fn new(primary: &str, options: MatchOptions, extra_terms: &[String]) -> Self {
        if primary.trim().is_empty() {
            return Self {
                mode: Mode::Nothing,
                options,
            };
        }

        let mode = if options.use_regex {
            match RegexBuilder::new(primary)
                .case_insensitive(!options.match_case)
                .size_limit(REGEX_SIZE_LIMIT)
                .build()
            {
                Ok(regex) => Mode::Pattern(regex),
                Err(e) => {
                    debug!("Ignoring invalid pattern '{}': {}", primary, e);
                    Mode::Nothing
                }
            }
        } else {
            let mut terms: Vec<LiteralTerm> = Vec::with_capacity(extra_terms.len() + 1);
            for term in std::iter::once(primary).chain(extra_terms.iter().map(String::as_str)) {
                if term.is_empty() {
                    continue;
                }
                let needle = if options.match_case {
                    term.to_string()
                } else {
                    fold_case(term)
                };
                if terms.iter().any(|t| t.needle == needle) {
                    continue;
                }
                terms.push(LiteralTerm {
                    original: term.to_string(),
                    needle,
                });
            }
            Mode::Literal(terms)
        };

        Self { mode, options }
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    /// True when no text can ever produce a match
    pub fn matches_nothing(&self) -> bool {
        match &self.mode {
            Mode::Nothing => true,
            Mode::Literal(terms) => terms.is_empty(),
            Mode::Pattern(_) => false,
        }
    }

    /// Folded literal needles usable for coarse pre-filtering against
    /// lowercase text. `None` when pre-filtering would be unsound
    /// (regex or case-sensitive mode).
    pub fn folded_needles(&self) -> Option<Vec<&str>> {
        match &self.mode {
            Mode::Literal(terms) if !self.options.match_case => {
                Some(terms.iter().map(|t| t.needle.as_str()).collect())
            }
            Mode::Nothing => Some(Vec::new()),
            _ => None,
        }
    }

    /// All spans in `text`, ascending by start, never overlapping
    pub fn find(&self, text: &str) -> Vec<MatchSpan> {
        match &self.mode {
            Mode::Nothing => Vec::new(),
            Mode::Pattern(regex) => regex
                .find_iter(text)
                .filter(|m| !m.is_empty())
                .map(|m| MatchSpan {
                    start: m.start(),
                    end: m.end(),
                    variant: m.as_str().to_string(),
                })
                .collect(),
            Mode::Literal(terms) => self.find_literal(text, terms),
        }
    }

    fn find_literal(&self, text: &str, terms: &[LiteralTerm]) -> Vec<MatchSpan> {
        if text.is_empty() || terms.is_empty() {
            return Vec::new();
        }

        let folded = (!self.options.match_case).then(|| FoldedText::new(text));
        let haystack = folded.as_ref().map_or(text, |f| f.folded.as_str());

        let mut candidates = Vec::new();
        for term in terms {
            let mut from = 0;
            while let Some(pos) = haystack[from..].find(term.needle.as_str()) {
                let found_start = from + pos;
                let found_end = found_start + term.needle.len();

                let (start, end) = match &folded {
                    Some(f) => f.original_range(text, found_start, found_end),
                    None => (found_start, found_end),
                };

                if self.options.match_whole_word && !is_whole_word(text, start, end) {
                    // Retry one character further on
                    from = found_start + haystack[found_start..].chars().next().map_or(1, char::len_utf8);
                    continue;
                }

                candidates.push(MatchSpan {
                    start,
                    end,
                    variant: term.original.clone(),
                });
                from = found_end;
            }
        }

        // Stable: equal starts keep term order, primary first
        candidates.sort_by_key(|span| span.start);

        let mut spans: Vec<MatchSpan> = Vec::with_capacity(candidates.len());
        for span in candidates {
            if spans.last().is_some_and(|last| span.start < last.end) {
                continue;
            }
            spans.push(span);
        }
        spans
    }
}

/// Find every occurrence of `primary` (and of `extra_terms`, outside regex
/// mode) in `text`.
///
/// Never fails: an empty query or an invalid pattern yields no spans.
pub fn find_matches(
    text: &str,
    primary: &str,
    options: MatchOptions,
    extra_terms: &[String],
) -> Vec<MatchSpan> {
    Matcher::new(primary, options, extra_terms).find(text)
}

/// Wrap each span of `text` in `open`/`close` markers.
///
/// Spans must come from a matcher run over this same `text`; anything out
/// of order or out of range is skipped rather than trusted.
pub fn highlight(text: &str, spans: &[MatchSpan], open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len() + spans.len() * (open.len() + close.len()));
    let mut last = 0;

    for span in spans {
        if span.start < last || span.is_empty() {
            continue;
        }
        let (Some(before), Some(matched)) = (text.get(last..span.start), text.get(span.start..span.end))
        else {
            continue;
        };
        out.push_str(before);
        out.push_str(open);
        out.push_str(matched);
        out.push_str(close);
        last = span.end;
    }

    out.push_str(&text[last..]);
    out
}

/// Per-character lowercase fold shared by the matcher and the index
pub fn fold_case(text: &str) -> String {
    text.chars().flat_map(char::to_lowercase).collect()
}

/// Case-folded copy of a text that remembers where each byte came from
struct FoldedText {
    folded: String,
    /// Byte offset in the original text of the char behind each folded byte
    origin: Vec<usize>,
}

impl FoldedText {
    fn new(text: &str) -> Self {
        let mut folded = String::with_capacity(text.len());
        let mut origin = Vec::with_capacity(text.len());

        for (offset, ch) in text.char_indices() {
            for lower in ch.to_lowercase() {
                folded.push(lower);
                origin.extend(std::iter::repeat_n(offset, lower.len_utf8()));
            }
        }

        Self { folded, origin }
    }

    /// Map a non-empty folded range back to whole characters of the original
    fn original_range(&self, text: &str, start: usize, end: usize) -> (usize, usize) {
        let original_start = self.origin[start];
        let last_char = self.origin[end - 1];
        let original_end = last_char + text[last_char..].chars().next().map_or(0, char::len_utf8);
        (original_start, original_end)
    }
}

fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
}
