//! Maps inline `[N]` markers in generated text back to the mapped documents
//! and recovers the sentences that most plausibly support each cited claim.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use citerag_core::config::AttributionSettings;
use citerag_core::text::{collapse_whitespace, sentence_spans, terminated_spans, token_set};

use crate::mapping::{DocumentMapping, MappedDocument};

static MARKER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[(\d+)\]").ok());

/// A document sentence (optionally with neighbours) that backs a claim.
/// Borrows from the [`DocumentMapping`] it was found in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupportingPassage<'a> {
    pub filename: &'a str,
    pub source_url: &'a str,
    pub passage: &'a str,
    #[serde(skip)]
    pub full_text: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitationRecord<'a> {
    pub index: usize,
    pub filename: &'a str,
    pub source_url: &'a str,
    /// Claim sentences from the answer that carry this marker, markers removed.
    pub contexts: Vec<String>,
    pub passages: Vec<SupportingPassage<'a>>,
}

/// Distinct citation indices in order of value. Digit runs too large for
/// `usize` are ignored.
pub fn cited_indices(text: &str) -> BTreeSet<usize> {
    let Some(re) = MARKER.as_ref() else { return BTreeSet::new() };
    re.captures_iter(text).filter_map(|c| c.get(1)?.as_str().parse().ok()).collect()
}

/// One record per distinct marker that has a mapping entry. Markers without
/// an entry are ignored. Serialized, the map keys become strings.
pub fn attribute_citations<'a>(
    text: &str,
    mapping: &'a DocumentMapping,
    settings: &AttributionSettings,
) -> BTreeMap<usize, CitationRecord<'a>> {
    let mut out = BTreeMap::new();
    for index in cited_indices(text) {
        let Some(doc) = mapping.get(index) else {
            tracing::debug!(index, "citation marker has no mapped document");
            continue;
        };
        let contexts = claim_contexts(text, index);
        let passages = supporting_passages(&contexts, doc, settings);
        out.insert(index, CitationRecord { index, filename: &doc.filename, source_url: &doc.source_url, contexts, passages });
    }
    out
}

/// Sentence-punctuated spans of `text` containing the exact marker `[index]`,
/// with every marker stripped.
pub fn claim_contexts(text: &str, index: usize) -> Vec<String> {
    let marker = format!("[{index}]");
    terminated_spans(text)
        .into_iter()
        .map(|r| &text[r])
        .filter(|span| span.contains(&marker))
        .map(strip_markers)
        .filter(|c| !c.is_empty())
        .collect()
}

fn strip_markers(span: &str) -> String {
    match MARKER.as_ref() {
        Some(re) => collapse_whitespace(&re.replace_all(span, "")),
        None => collapse_whitespace(span),
    }
}

fn supporting_passages<'a>(
    contexts: &[String],
    doc: &'a MappedDocument,
    settings: &AttributionSettings,
) -> Vec<SupportingPassage<'a>> {
    if contexts.is_empty() {
        return Vec::new();
    }
    let sentences = sentence_spans(&doc.content);
    let sentence_tokens: Vec<HashSet<String>> = sentences.iter().map(|r| token_set(&doc.content[r.clone()])).collect();

    // (overlap, sentence position), in claim order then document order
    let mut qualifying: Vec<(usize, usize)> = Vec::new();
    for context in contexts {
        let claim = token_set(context);
        if claim.is_empty() {
            continue;
        }
        let floor = settings.min_overlap_ratio * claim.len() as f32;
        for (pos, tokens) in sentence_tokens.iter().enumerate() {
            let overlap = claim.intersection(tokens).count();
            if overlap >= settings.min_shared_tokens && overlap as f32 >= floor {
                qualifying.push((overlap, pos));
            }
        }
    }
    qualifying.sort_by(|a, b| b.0.cmp(&a.0));

    let mut taken = HashSet::new();
    qualifying
        .into_iter()
        .filter(|(_, pos)| taken.insert(*pos))
        .take(settings.max_passages)
        .map(|(_, pos)| {
            let range = if settings.neighbor_sentences { with_neighbors(&sentences, pos) } else { sentences[pos].clone() };
            SupportingPassage { filename: &doc.filename, source_url: &doc.source_url, passage: &doc.content[range], full_text: &doc.content }
        })
        .collect()
}

fn with_neighbors(sentences: &[Range<usize>], pos: usize) -> Range<usize> {
    let first = pos.saturating_sub(1);
    let last = (pos + 1).min(sentences.len() - 1);
    sentences[first].start..sentences[last].end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_distinct_and_overflow_is_skipped() {
        let got = cited_indices("a [2] b [1] c [2] d [99999999999999999999999] e [x] [ 3 ]");
        assert_eq!(got.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn contexts_strip_all_markers() {
        let text = "Wash the compressor weekly [1][2]. Unrelated. Inspect nozzles [2]!";
        assert_eq!(claim_contexts(text, 2), vec!["Wash the compressor weekly .", "Inspect nozzles !"]);
        assert_eq!(claim_contexts(text, 1), vec!["Wash the compressor weekly ."]);
    }

    #[test]
    fn marker_after_the_last_terminator_has_no_context() {
        assert!(claim_contexts("Everything is fine. See [1]", 1).is_empty());
    }

    #[test]
    fn neighbours_are_clamped_to_the_document() {
        let s = vec![0..2, 3..5, 6..8];
        assert_eq!(with_neighbors(&s, 0), 0..5);
        assert_eq!(with_neighbors(&s, 1), 0..8);
        assert_eq!(with_neighbors(&s, 2), 3..8);
    }
}
