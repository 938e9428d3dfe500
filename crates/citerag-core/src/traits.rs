//! Capability interfaces for the external collaborators of the engine.
//!
//! Each capability has an in-process implementation and a remote one; callers
//! hold them as `Arc<dyn Trait>` and bound every call with
//! [`crate::guard::bounded`], so both variants are treated the same way.

use async_trait::async_trait;

use crate::types::{GenerationParams, LexicalHit, VectorHit};

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn name(&self) -> &str;
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        out.pop().ok_or_else(|| anyhow::anyhow!("embedder '{}' returned no vector", self.name()))
    }
}

/// Keyword search over chunk text. Read-only at serving time and cheap enough
/// to run on a blocking thread.
pub trait LexicalIndex: Send + Sync {
    fn len(&self) -> usize;
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<LexicalHit>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Nearest-neighbour search over chunk embeddings. Hits are ordered by
/// ascending distance.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn len(&self) -> usize;
    async fn search_vec(&self, query_vec: &[f32], k: usize) -> anyhow::Result<Vec<VectorHit>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pairwise (query, passage) relevance, cross-encoder style. Higher is more
/// relevant; the returned vector is aligned with `passages`.
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    fn name(&self) -> &str;
    async fn score_batch(&self, query: &str, passages: &[String]) -> anyhow::Result<Vec<f32>>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, prompt: &str, params: GenerationParams) -> anyhow::Result<String>;
}
