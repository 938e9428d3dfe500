use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;

use citerag_core::text::content_tokens;
use citerag_core::traits::RelevanceScorer;

/// In-process pairwise scorer for deployments without a cross-encoder.
///
/// Score = query-term coverage (dominant) plus a length-damped term-frequency
/// bonus. Deterministic, so rankings are reproducible for fixed inputs.
#[derive(Debug, Default, Clone)]
pub struct OverlapScorer;

impl OverlapScorer {
    pub fn score(query: &str, passage: &str) -> f32 {
        let q: HashSet<String> = content_tokens(query).into_iter().collect();
        if q.is_empty() {
            return 0.0;
        }
        let tokens = content_tokens(passage);
        if tokens.is_empty() {
            return 0.0;
        }
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for t in &tokens {
            if q.contains(t) { *tf.entry(t.as_str()).or_default() += 1; }
        }
        let coverage = tf.len() as f32 / q.len() as f32;
        let occurrences: usize = tf.values().sum();
        let density = occurrences as f32 / (tokens.len() as f32).sqrt();
        coverage * 10.0 + density
    }
}

#[async_trait]
impl RelevanceScorer for OverlapScorer {
    fn name(&self) -> &str {
        "overlap"
    }

    async fn score_batch(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        Ok(passages.iter().map(|p| Self::score(query, p)).collect())
    }
}
