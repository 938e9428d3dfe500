use std::sync::Arc;

use tracing::instrument;

use citerag_core::config::ExpansionSettings;
use citerag_core::guard::bounded;
use citerag_core::traits::TextGenerator;
use citerag_core::types::GenerationParams;

const ANSWER_LABEL: &str = "Expanded Queries:";

const FALLBACK_SUFFIXES: [&str; 3] = [" alternative perspective", " in detail", " explained"];

/// Turns one user query into several search variants using a text generator.
///
/// Never fails: generator errors, timeouts, and unparsable output all fall
/// back to [`fallback_variants`].
pub struct QueryExpander {
    generator: Arc<dyn TextGenerator>,
    settings: ExpansionSettings,
}

impl QueryExpander {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: ExpansionSettings) -> Self {
        Self { generator, settings }
    }

    #[instrument(skip(self), fields(generator = self.generator.name()))]
    pub async fn expand(&self, query: &str) -> Vec<String> {
        let params = GenerationParams { max_tokens: self.settings.max_new_tokens, temperature: self.settings.temperature };
        let prompt = expansion_prompt(query);
        let output = match bounded(self.generator.name(), self.settings.timeout(), self.generator.generate(&prompt, params)).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = %e, "query expansion failed; using templated variants");
                return fallback_variants(query);
            }
        };
        match parse_expansion(&output) {
            Some(paraphrases) => {
                let variants = self.assemble(query, paraphrases);
                if variants.is_empty() { fallback_variants(query) } else {
                    tracing::debug!(variants = variants.len(), "query expanded");
                    variants
                }
            }
            None => {
                tracing::warn!(output = %output.chars().take(200).collect::<String>(), "unparsable expansion output; using templated variants");
                fallback_variants(query)
            }
        }
    }

    fn assemble(&self, query: &str, paraphrases: Vec<String>) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let original = self.settings.include_original.then(|| query.trim().to_string());
        for v in original.into_iter().chain(paraphrases.into_iter().map(|p| p.trim().to_string())) {
            if !v.is_empty() && !out.contains(&v) { out.push(v); }
        }
        out.truncate(self.settings.max_variants.max(1));
        out
    }
}

/// Deterministic variants used whenever expansion fails.
pub fn fallback_variants(query: &str) -> Vec<String> {
    std::iter::once(query.to_string()).chain(FALLBACK_SUFFIXES.iter().map(|s| format!("{query}{s}"))).collect()
}

pub fn expansion_prompt(query: &str) -> String {
    format!(
        r#"
You are an expert in information retrieval and processing user queries. Your task is to expand a given query into a list of queries that are semantically similar or contextually relevant to the original query. This expansion should help in retrieving a broader range of results that are still closely related with the original query.

Instructions:
- Generate expanded queries: For each input query, generate a list of at least 3 alternative queries that capture the same or similar meaning as the original input query.
- Semantic consistency: Ensure that the expanded queries remain semantically consistent with the original query, capturing various ways users might search for the same information.
- Contextual relevance: Incorporate different aspects or related terms that could yield helpful search results, while maintaining the core idea of the original query.
- Diversity: Aim to cover different synonyms, related concepts, and potential angles of the query to maximize the relevance of the search results.

Examples:

Original Query 1: "climate change effects"
Expanded Queries: ["impact of climate change", "consequences of global warming", "effects of environmental damage"]

Original Query 2: "machine learning algorithms"
Expanded Queries: ["neural networks", "supervised learning", "deep learning"]

Output structure:
["expanded query 1", "expanded query 2", "expanded query 3"]

Original Query: "{query}"
{ANSWER_LABEL}"#
    )
}

/// Extract the list literal that follows the last answer label. Returns
/// `None` for anything that is not a non-empty list of strings.
pub fn parse_expansion(output: &str) -> Option<Vec<String>> {
    let tail = output.rsplit(ANSWER_LABEL).next().unwrap_or(output).trim();
    let start = tail.find('[')?;
    let end = tail.rfind(']')?;
    if end < start {
        return None;
    }
    let literal = &tail[start..=end];
    let items = serde_json::from_str::<Vec<String>>(literal).ok().or_else(|| parse_list_literal(literal))?;
    (!items.is_empty()).then_some(items)
}

/// Parse a bracketed list of single- or double-quoted strings, e.g.
/// `['a', "b",]`. Backslash escapes are honoured.
pub fn parse_list_literal(s: &str) -> Option<Vec<String>> {
    let mut chars = s.trim().chars().peekable();
    let skip_ws = |it: &mut std::iter::Peekable<std::str::Chars<'_>>| {
        while it.peek().is_some_and(|c| c.is_whitespace()) { it.next(); }
    };
    if chars.next()? != '[' {
        return None;
    }
    let mut items = Vec::new();
    loop {
        skip_ws(&mut chars);
        match chars.next()? {
            ']' => break,
            q @ ('\'' | '"') => {
                let mut item = String::new();
                loop {
                    match chars.next()? {
                        '\\' => match chars.next()? {
                            'n' => item.push('\n'),
                            't' => item.push('\t'),
                            c @ ('\\' | '\'' | '"') => item.push(c),
                            c => { item.push('\\'); item.push(c); }
                        },
                        c if c == q => break,
                        c => item.push(c),
                    }
                }
                items.push(item);
                skip_ws(&mut chars);
                match chars.next()? {
                    ',' => continue,
                    ']' => break,
                    _ => return None,
                }
            }
            _ => return None,
        }
    }
    skip_ws(&mut chars);
    chars.next().is_none().then_some(items)
}
