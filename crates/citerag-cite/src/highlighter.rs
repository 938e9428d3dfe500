use citerag_core::types::HighlightSpan;

/// Locate each requested passage in `doc`.
///
/// Exact substring matches come first. Failing that, both sides are compared
/// with whitespace runs collapsed and the match is mapped back onto `doc`
/// (`approximate = true`). Passages found neither way are left out; the rest
/// keep request order.
pub fn highlight_passages<S: AsRef<str>>(doc: &str, passages: &[S]) -> Vec<HighlightSpan> {
    let mut normalized: Option<NormalizedText> = None;
    let mut spans = Vec::new();
    for requested in passages {
        let passage = requested.as_ref().trim();
        if passage.is_empty() {
            continue;
        }
        if let Some(start) = doc.find(passage) {
            spans.push(HighlightSpan { start, end: start + passage.len(), passage: passage.to_string(), approximate: false });
            continue;
        }
        let norm = normalized.get_or_insert_with(|| NormalizedText::new(doc));
        match norm.locate(passage) {
            Some((start, end)) => {
                spans.push(HighlightSpan { start, end, passage: passage.to_string(), approximate: true });
            }
            None => tracing::debug!(chars = passage.chars().count(), "passage not found in document"),
        }
    }
    spans
}

/// `doc` with whitespace runs collapsed to one space and leading/trailing
/// whitespace removed. `origin[i]` is the byte offset in `doc` of byte `i`
/// of `text`.
struct NormalizedText {
    text: String,
    origin: Vec<usize>,
}

impl NormalizedText {
    fn new(doc: &str) -> Self {
        let mut text = String::with_capacity(doc.len());
        let mut origin = Vec::with_capacity(doc.len());
        let mut pending_space: Option<usize> = None;
        for (offset, c) in doc.char_indices() {
            if c.is_whitespace() {
                if !text.is_empty() && pending_space.is_none() {
                    pending_space = Some(offset);
                }
                continue;
            }
            if let Some(ws) = pending_space.take() {
                text.push(' ');
                origin.push(ws);
            }
            text.push(c);
            origin.extend(offset..offset + c.len_utf8());
        }
        Self { text, origin }
    }

    /// Byte range in the original document covering the first collapsed
    /// match of `passage`.
    fn locate(&self, passage: &str) -> Option<(usize, usize)> {
        let needle = passage.split_whitespace().collect::<Vec<_>>().join(" ");
        if needle.is_empty() {
            return None;
        }
        let at = self.text.find(&needle)?;
        let last = at + needle.len() - 1;
        Some((self.origin[at], self.origin[last] + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_tracks_every_normalized_byte() {
        let n = NormalizedText::new("  a\t\tb  é ");
        assert_eq!(n.text, "a b é");
        assert_eq!(n.origin, vec![2, 3, 5, 6, 8, 9]);
    }

    #[test]
    fn approximate_end_lands_after_last_matched_char() {
        let doc = "alpha\n\n  beta  gamma";
        let spans = highlight_passages(doc, &["alpha beta"]);
        assert_eq!(spans.len(), 1);
        assert!(spans[0].approximate);
        assert_eq!(&doc[spans[0].start..spans[0].end], "alpha\n\n  beta");
    }
}
