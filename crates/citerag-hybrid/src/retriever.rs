use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::instrument;

use citerag_core::corpus::ChunkStore;
use citerag_core::guard::bounded;
use citerag_core::traits::{Embedder, LexicalIndex, RelevanceScorer, VectorIndex};
use citerag_core::types::{Candidate, RankedCandidate, RetrievalParams, SourceKind};
use citerag_core::{Error, Result};

/// Per-call limits for the upstream stages of one retrieval pass.
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub embed: Duration,
    pub search: Duration,
    pub score: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self { embed: Duration::from_secs(5), search: Duration::from_secs(5), score: Duration::from_secs(5) }
    }
}

/// Semantic + lexical retrieval for a single query, fused by chunk text and
/// reranked with a pairwise scorer.
///
/// Either index may be absent. A failing source contributes nothing; when
/// both come back empty the result is an empty list.
pub struct HybridRetriever {
    store: Arc<ChunkStore>,
    embedder: Arc<dyn Embedder>,
    vector: Option<Arc<dyn VectorIndex>>,
    lexical: Option<Arc<dyn LexicalIndex>>,
    scorer: Arc<dyn RelevanceScorer>,
    timeouts: StageTimeouts,
}

impl HybridRetriever {
    pub fn new(store: Arc<ChunkStore>, embedder: Arc<dyn Embedder>, scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { store, embedder, vector: None, lexical: None, scorer, timeouts: StageTimeouts::default() }
    }

    pub fn with_vector(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector = Some(index);
        self
    }

    pub fn with_lexical(mut self, index: Arc<dyn LexicalIndex>) -> Self {
        self.lexical = Some(index);
        self
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[instrument(skip(self), fields(scorer = self.scorer.name()))]
    pub async fn retrieve(&self, query: &str, params: RetrievalParams) -> Vec<RankedCandidate> {
        let started = Instant::now();
        let (semantic, lexical) = tokio::join!(
            self.semantic_candidates(query, params.top_k_semantic),
            self.lexical_candidates(query, params.top_k_keyword)
        );
        let semantic = semantic.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "semantic search unavailable; continuing with lexical results");
            Vec::new()
        });
        let lexical = lexical.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "lexical search unavailable; continuing with semantic results");
            Vec::new()
        });
        let (n_sem, n_lex) = (semantic.len(), lexical.len());
        let fused = fuse(semantic, lexical);
        if fused.is_empty() {
            tracing::debug!("no candidates from either source");
            return Vec::new();
        }
        let ranked = self.rerank(query, fused, params.final_top_k).await;
        tracing::debug!(semantic = n_sem, lexical = n_lex, kept = ranked.len(), elapsed_ms = started.elapsed().as_millis() as u64, "retrieved");
        ranked
    }

    async fn semantic_candidates(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
        let Some(index) = self.vector.as_ref() else { return Ok(Vec::new()) };
        if k == 0 || index.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = bounded(self.embedder.name(), self.timeouts.embed, self.embedder.embed(query)).await?;
        let hits = bounded("vector-index", self.timeouts.search, index.search_vec(&query_vec, k)).await?;
        Ok(hits
            .into_iter()
            .filter_map(|h| self.resolve(&h.chunk_id, h.distance, SourceKind::Vector))
            .collect())
    }

    async fn lexical_candidates(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
        let Some(index) = self.lexical.clone() else { return Ok(Vec::new()) };
        if k == 0 || index.is_empty() {
            return Ok(Vec::new());
        }
        let owned = query.to_string();
        let task = tokio::task::spawn_blocking(move || index.search(&owned, k));
        let hits = bounded("lexical-index", self.timeouts.search, async move {
            task.await.map_err(|e| anyhow::anyhow!("lexical search task failed: {e}"))?
        })
        .await?;
        Ok(hits
            .into_iter()
            .filter_map(|h| self.resolve(&h.chunk_id, h.score, SourceKind::Lexical))
            .collect())
    }

    fn resolve(&self, id: &str, score: f32, source: SourceKind) -> Option<Candidate> {
        match self.store.get(id) {
            Some(chunk) => Some(Candidate { chunk: chunk.clone(), score, source }),
            None => {
                tracing::debug!(id, ?source, "hit has no metadata row; skipped");
                None
            }
        }
    }

    async fn rerank(&self, query: &str, fused: Vec<Candidate>, final_top_k: usize) -> Vec<RankedCandidate> {
        let passages: Vec<String> = fused.iter().map(|c| c.chunk.text.clone()).collect();
        let scores = bounded(self.scorer.name(), self.timeouts.score, self.scorer.score_batch(query, &passages))
            .await
            .and_then(|s| {
                if s.len() == passages.len() {
                    Ok(s)
                } else {
                    Err(Error::upstream(self.scorer.name(), format!("{} scores for {} passages", s.len(), passages.len())))
                }
            });
        let scores = match scores {
            Ok(s) => s,
            Err(e) => {
                // Keep fused order: descending pseudo-scores preserve it under a stable sort.
                tracing::warn!(error = %e, "reranking failed; keeping fused order");
                (0..fused.len()).map(|i| -(i as f32)).collect()
            }
        };
        rank_candidates(fused, scores, final_top_k)
    }
}

/// Union semantic then lexical candidates, keeping the first copy of each
/// distinct chunk text.
pub fn fuse(semantic: Vec<Candidate>, lexical: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: HashSet<String> = HashSet::new();
    semantic.into_iter().chain(lexical).filter(|c| seen.insert(c.chunk.text.clone())).collect()
}

/// Attach scores, sort descending (stable), keep `final_top_k`. NaN scores
/// sort last.
pub fn rank_candidates(candidates: Vec<Candidate>, scores: Vec<f32>, final_top_k: usize) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .zip(scores)
        .map(|(candidate, s)| RankedCandidate { candidate, relevance: if s.is_nan() { f32::NEG_INFINITY } else { s } })
        .collect();
    ranked.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
    ranked.truncate(final_top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use citerag_core::types::{Chunk, ChunkMeta};

    fn cand(text: &str, source: SourceKind) -> Candidate {
        Candidate {
            chunk: Chunk { id: text.into(), text: text.into(), meta: ChunkMeta { filename: format!("{text}.txt"), source_url: String::new() } },
            score: 0.0,
            source,
        }
    }

    #[test]
    fn fuse_prefers_semantic_copy() {
        let out = fuse(vec![cand("a", SourceKind::Vector), cand("b", SourceKind::Vector)], vec![cand("b", SourceKind::Lexical), cand("c", SourceKind::Lexical)]);
        let texts: Vec<_> = out.iter().map(|c| (c.chunk.text.as_str(), c.source)).collect();
        assert_eq!(texts, vec![("a", SourceKind::Vector), ("b", SourceKind::Vector), ("c", SourceKind::Lexical)]);
    }

    #[test]
    fn ties_keep_input_order_and_nan_sinks() {
        let c = vec![cand("x", SourceKind::Lexical), cand("y", SourceKind::Lexical), cand("z", SourceKind::Lexical)];
        let r = rank_candidates(c, vec![f32::NAN, 1.0, 1.0], 3);
        let texts: Vec<_> = r.iter().map(|r| r.text()).collect();
        assert_eq!(texts, vec!["y", "z", "x"]);
    }
}
