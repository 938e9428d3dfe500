use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::instrument;

use citerag_core::config::{AttributionSettings, GenerationSettings};
use citerag_core::guard::bounded;
use citerag_core::traits::TextGenerator;
use citerag_core::types::{GenerationParams, HistoryTurn, Retrieved};

use crate::attributor::{attribute_citations, CitationRecord};
use crate::mapping::DocumentMapping;

const ANSWER_LABEL: &str = "Answer:";
const SOURCES_SECTION: &str = "\n\nSources:";
pub const APOLOGY: &str = "I'm sorry, an error occurred while generating the response. Please try again.";

/// Generated answer text plus the document table its markers refer to.
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub response: String,
    pub mapping: DocumentMapping,
    body_len: usize,
}

impl GeneratedAnswer {
    /// The generated answer without the closing line.
    pub fn body(&self) -> &str {
        &self.response[..self.body_len]
    }

    /// Attribution runs over [`body`](Self::body) only, so the closing line
    /// never joins a cited claim.
    pub fn citations(&self, settings: &AttributionSettings) -> BTreeMap<usize, CitationRecord<'_>> {
        attribute_citations(self.body(), &self.mapping, settings)
    }

    pub fn source_documents(&self) -> &DocumentMapping {
        &self.mapping
    }

    fn apology() -> Self {
        Self { response: APOLOGY.to_string(), mapping: DocumentMapping::new(), body_len: APOLOGY.len() }
    }
}

pub struct AnswerComposer {
    generator: Arc<dyn TextGenerator>,
    settings: GenerationSettings,
}

impl AnswerComposer {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: GenerationSettings) -> Self {
        Self { generator, settings }
    }

    /// One generation call over the retrieved context. Never fails: a
    /// generator error or timeout yields a fixed apology with no citations.
    #[instrument(skip(self, history, retrieved), fields(generator = self.generator.name(), retrieved = retrieved.len()))]
    pub async fn compose(&self, query: &str, history: &[HistoryTurn], retrieved: &[Retrieved]) -> GeneratedAnswer {
        let mapping = DocumentMapping::from_retrieved(retrieved, self.settings.min_context_chars);
        let prompt = build_prompt(query, history, &mapping, self.settings.history_turns);
        let params = GenerationParams { max_tokens: self.settings.max_new_tokens, temperature: self.settings.temperature };
        match bounded(self.generator.name(), self.settings.timeout(), self.generator.generate(&prompt, params)).await {
            Ok(raw) => {
                let response = post_process(&raw, &self.settings.closing_line);
                let body_len = answer_body(&response, &self.settings.closing_line).len();
                tracing::info!(documents = mapping.len(), chars = response.len(), "answer generated");
                GeneratedAnswer { response, mapping, body_len }
            }
            Err(e) => {
                tracing::warn!(error = %e, "answer generation failed");
                GeneratedAnswer::apology()
            }
        }
    }
}

pub fn build_prompt(query: &str, history: &[HistoryTurn], mapping: &DocumentMapping, history_turns: usize) -> String {
    let mut prompt = String::new();
    if !mapping.is_empty() {
        prompt.push_str("Relevant Knowledge:\n\n");
        let parts: Vec<String> = mapping.iter().map(|(i, d)| format!("[Document {i}]: {}", d.content)).collect();
        prompt.push_str(&parts.join("\n\n"));
        prompt.push_str("\n\n");
    }
    let recent = &history[history.len().saturating_sub(history_turns)..];
    if !recent.is_empty() {
        prompt.push_str("Conversation History:\n\n");
        for turn in recent {
            prompt.push_str(&format!("{}: {}\n\n", capitalize(&turn.role), turn.message));
        }
    }
    prompt.push_str(&format!(
        "Question: {query}\n\n\
         Instructions:\n\
         - You are an expert assistant answering from the provided documents.\n\
         - When using information from the provided documents, cite them using ONLY simple numbers like [1], [2], [3], etc.\n\
         - DO NOT use subsection numbers like [1.f.i.a] or [1.ii.1] - just use [1], [2], [3]\n\
         - Place the citation number immediately after the relevant statement.\n\
         - DO NOT include a 'Sources:' section at the end of your response.\n\
         - Provide a clear, structured response with bullet points and headers.\n\n\
         {ANSWER_LABEL}\n"
    ));
    prompt
}

/// Keep the text after the last answer label, cut a trailing sources
/// section, and make sure the closing line ends the answer.
pub fn post_process(raw: &str, closing_line: &str) -> String {
    let mut text = raw.rsplit(ANSWER_LABEL).next().unwrap_or(raw).trim().to_string();
    if let Some(at) = text.find(SOURCES_SECTION) {
        text.truncate(at);
        text = text.trim_end().to_string();
    }
    if !closing_line.is_empty() && !text.ends_with(closing_line) {
        text.push_str("\n\n");
        text.push_str(closing_line);
    }
    text
}

/// `response` with a trailing closing line (and the blank line before it)
/// removed.
pub fn answer_body<'a>(response: &'a str, closing_line: &str) -> &'a str {
    if closing_line.is_empty() {
        return response;
    }
    response.strip_suffix(closing_line).map_or(response, str::trim_end)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLOSING: &str = "Is there anything else you'd like help with?";

    #[test]
    fn post_process_trims_echo_and_sources() {
        let raw = "Question: q\n\nAnswer:\n  Wash weekly [1].\n\nSources:\n[1] a.txt";
        assert_eq!(post_process(raw, CLOSING), format!("Wash weekly [1].\n\n{CLOSING}"));
    }

    #[test]
    fn closing_line_is_not_duplicated() {
        let raw = format!("Done.\n\n{CLOSING}");
        assert_eq!(post_process(&raw, CLOSING), raw);
    }

    #[test]
    fn body_excludes_closing_line() {
        let response = post_process("- Rinse blades [1]", CLOSING);
        assert_eq!(answer_body(&response, CLOSING), "- Rinse blades [1]");
        assert_eq!(answer_body("No closing here.", CLOSING), "No closing here.");
        assert_eq!(answer_body("Anything.", ""), "Anything.");
    }

    #[test]
    fn prompt_lists_documents_and_recent_history() {
        let mut mapping = DocumentMapping::new();
        mapping.push(crate::mapping::MappedDocument { filename: "a.txt".into(), source_url: String::new(), content: "alpha".into() });
        let history: Vec<HistoryTurn> = (0..5).map(|i| HistoryTurn { role: "user".into(), message: format!("turn {i}") }).collect();
        let prompt = build_prompt("why?", &history, &mapping, 3);
        assert!(prompt.starts_with("Relevant Knowledge:\n\n[Document 1]: alpha\n\n"));
        assert!(!prompt.contains("turn 1"));
        assert!(prompt.contains("User: turn 2") && prompt.contains("User: turn 4"));
        assert!(prompt.contains("Question: why?"));
        assert!(prompt.trim_end().ends_with(ANSWER_LABEL));
    }
}
