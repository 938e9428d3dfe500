//! Tokenizing and sentence splitting shared by retrieval and attribution.
//!
//! All offsets are UTF-8 byte offsets into the input string.

use std::collections::HashSet;
use std::ops::Range;

/// English stopwords removed before keyword matching.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it", "its", "of", "on",
    "that", "the", "to", "was", "will", "with", "or", "but", "not", "this", "these", "they", "them", "their", "there",
    "then", "than", "so", "if", "when", "where", "why", "how", "what", "which", "who", "whom", "whose", "can", "could",
    "should", "would", "may", "might", "must", "shall", "do", "does", "did", "have", "had", "having",
];

pub fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Lowercased alphanumeric runs, in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// [`tokenize`] with stopwords removed.
pub fn content_tokens(text: &str) -> Vec<String> {
    tokenize(text).into_iter().filter(|t| !is_stop_word(t)).collect()
}

pub fn token_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn trim_range(text: &str, range: Range<usize>) -> Option<Range<usize>> {
    let slice = &text[range.clone()];
    let lead = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return None;
    }
    let start = range.start + lead;
    Some(start..start + trimmed.len())
}

/// Sentences of a document: the text is cut wherever sentence punctuation is
/// followed by whitespace. Spans are trimmed and never empty.
pub fn sentence_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() && prev.is_some_and(is_terminal) {
            spans.extend(trim_range(text, start..i));
            start = i;
        }
        prev = Some(c);
    }
    spans.extend(trim_range(text, start..text.len()));
    spans
}

/// Minimal spans closed by sentence punctuation (`.`, `!`, `?`), including the
/// punctuation itself. Trailing text without a terminator is not returned,
/// and neither is unterminated text cut off by a blank line.
pub fn terminated_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if is_terminal(c) {
            let end = i + c.len_utf8();
            spans.extend(trim_range(text, start..end));
            start = end;
        } else if c == '\n' && paragraph_break_at(text, i) {
            start = i + 1;
        }
    }
    spans
}

/// Whether the newline at `i` is followed by a blank line.
fn paragraph_break_at(text: &str, i: usize) -> bool {
    let rest = &text[i + 1..];
    let line_end = rest.find('\n');
    line_end.is_some_and(|n| rest[..n].trim().is_empty())
}

/// Collapse every whitespace run to one space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
