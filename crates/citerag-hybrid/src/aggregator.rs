use std::collections::HashSet;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::instrument;

use citerag_core::config::RetrievalSettings;
use citerag_core::types::{RankedCandidate, Retrieved, RetrievalParams};

use crate::expander::QueryExpander;
use crate::retriever::HybridRetriever;

/// Public retrieval entry point: expand, retrieve per variant, merge.
///
/// Variants run concurrently (at most `max_concurrent_variants` at a time)
/// and results are merged in variant order regardless of completion order.
/// Dropping the future returned by [`retrieve_knowledge`](Self::retrieve_knowledge)
/// abandons every in-flight variant; nothing is merged from a cancelled call.
pub struct MultiQueryAggregator {
    expander: QueryExpander,
    retriever: HybridRetriever,
    settings: RetrievalSettings,
}

impl MultiQueryAggregator {
    pub fn new(expander: QueryExpander, retriever: HybridRetriever, settings: RetrievalSettings) -> Self {
        Self { expander, retriever, settings }
    }

    #[instrument(skip(self))]
    pub async fn retrieve_knowledge(&self, query: &str, top_k: usize) -> Vec<Retrieved> {
        let variants = self.expander.expand(query).await;
        let params = RetrievalParams::uniform(top_k, self.settings.final_top_k);
        self.retrieve_variants(&variants, params).await
    }

    /// Run the hybrid retriever over pre-expanded variants.
    pub async fn retrieve_variants(&self, variants: &[String], params: RetrievalParams) -> Vec<Retrieved> {
        let started = Instant::now();
        let per_variant: Vec<Vec<RankedCandidate>> = stream::iter(variants)
            .map(|v| self.retriever.retrieve(v, params))
            .buffered(self.settings.max_concurrent_variants.max(1))
            .collect()
            .await;
        let merged = merge_variants(per_variant);
        tracing::info!(
            variants = variants.len(),
            results = merged.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "knowledge retrieved"
        );
        merged
    }
}

/// Concatenate per-variant results in variant order and drop repeated chunk
/// texts; the first variant's copy (and metadata) wins.
pub fn merge_variants(per_variant: Vec<Vec<RankedCandidate>>) -> Vec<Retrieved> {
    let mut seen = HashSet::new();
    per_variant
        .into_iter()
        .flatten()
        .map(Retrieved::from)
        .filter(|r| seen.insert(r.chunk_text.clone()))
        .collect()
}
