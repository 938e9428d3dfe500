use anyhow::{anyhow, Result};
use async_trait::async_trait;

use citerag_core::corpus::ChunkStore;
use citerag_core::traits::{Embedder, VectorIndex};
use citerag_core::types::{ChunkId, VectorHit};

/// Exact cosine search over an in-memory row-major matrix. Immutable once
/// built, so concurrent queries need no locking.
#[derive(Debug, Clone)]
pub struct FlatVectorIndex {
    dim: usize,
    ids: Vec<ChunkId>,
    vectors: Vec<f32>,
    norms: Vec<f32>,
}

impl FlatVectorIndex {
    pub fn from_entries(dim: usize, entries: impl IntoIterator<Item = (ChunkId, Vec<f32>)>) -> Result<Self> {
        let mut index = Self { dim, ids: Vec::new(), vectors: Vec::new(), norms: Vec::new() };
        for (id, v) in entries {
            if v.len() != dim {
                return Err(anyhow!("vector for chunk {id} has {} dims, expected {dim}", v.len()));
            }
            index.norms.push(norm(&v));
            index.vectors.extend_from_slice(&v);
            index.ids.push(id);
        }
        Ok(index)
    }

    /// Embed every chunk in the store. `on_batch` receives the number of
    /// chunks embedded by each batch, for progress reporting.
    pub async fn embed_store(
        store: &ChunkStore,
        embedder: &dyn Embedder,
        batch_size: usize,
        mut on_batch: impl FnMut(usize),
    ) -> Result<Self> {
        let chunks: Vec<_> = store.iter().collect();
        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(anyhow!("embedder '{}' returned {} vectors for {} texts", embedder.name(), vectors.len(), batch.len()));
            }
            entries.extend(batch.iter().map(|c| c.id.clone()).zip(vectors));
            on_batch(batch.len());
        }
        let index = Self::from_entries(embedder.dim(), entries)?;
        tracing::info!(chunks = index.ids.len(), dim = index.dim, "flat vector index built");
        Ok(index)
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dim..(i + 1) * self.dim]
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[async_trait]
impl VectorIndex for FlatVectorIndex {
    fn len(&self) -> usize {
        self.ids.len()
    }

    async fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        if query_vec.len() != self.dim {
            return Err(anyhow!("query has {} dims, index has {}", query_vec.len(), self.dim));
        }
        let qn = norm(query_vec);
        let mut scored: Vec<(usize, f32)> = (0..self.ids.len())
            .map(|i| {
                let denom = qn * self.norms[i];
                let distance = if denom <= f32::EPSILON {
                    1.0
                } else {
                    1.0 - self.row(i).iter().zip(query_vec).map(|(a, b)| a * b).sum::<f32>() / denom
                };
                (i, distance)
            })
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        Ok(scored.into_iter().map(|(i, distance)| VectorHit { chunk_id: self.ids[i].clone(), distance }).collect())
    }
}
