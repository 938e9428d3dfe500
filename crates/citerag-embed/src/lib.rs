//! Embedding functions for queries and chunks.
//!
//! `HashEmbedder` runs in process and needs no model files; `OllamaEmbedder`
//! calls a local Ollama server. Both return L2-normalized vectors.

use std::sync::Arc;

use anyhow::Result;

use citerag_core::config::{EmbeddingProvider, EmbeddingSettings, LlmSettings};
use citerag_core::traits::Embedder;

pub mod hash;
pub mod ollama;

pub use hash::HashEmbedder;
pub use ollama::OllamaEmbedder;

pub fn get_default_embedder(settings: &EmbeddingSettings, llm: &LlmSettings) -> Result<Arc<dyn Embedder>> {
    match settings.provider {
        EmbeddingProvider::Hash => {
            tracing::info!(dim = settings.dim, "using hashed bag-of-words embedder");
            Ok(Arc::new(HashEmbedder::new(settings.dim)))
        }
        EmbeddingProvider::Ollama => {
            tracing::info!(model = %llm.embed_model, base_url = %llm.base_url, "using Ollama embedder");
            Ok(Arc::new(OllamaEmbedder::new(llm, settings.dim, settings.timeout())?))
        }
    }
}

pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-6 { for x in v.iter_mut() { *x /= norm; } }
}
