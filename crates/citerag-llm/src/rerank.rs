//! Cross-encoder reranking served over HTTP.
//!
//! Speaks the `POST /rerank {query, texts}` → `[{index, score}]` protocol used
//! by text-embeddings-inference style servers.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use citerag_core::traits::RelevanceScorer;

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    raw_scores: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RerankItem {
    index: usize,
    score: f32,
}

pub struct HttpReranker {
    client: Client,
    url: String,
}

impl HttpReranker {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().context("building rerank HTTP client")?;
        Ok(Self { client, url: format!("{}/rerank", base_url.trim_end_matches('/')) })
    }
}

/// The server returns items sorted by score; put them back in request order.
pub(crate) fn align_scores(items: Vec<RerankItem>, expected: usize) -> Result<Vec<f32>> {
    let mut scores = vec![None; expected];
    for item in items {
        let slot = scores.get_mut(item.index).ok_or_else(|| anyhow!("rerank index {} out of range", item.index))?;
        *slot = Some(item.score);
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.ok_or_else(|| anyhow!("rerank response has no score for passage {i}")))
        .collect()
}

#[async_trait]
impl RelevanceScorer for HttpReranker {
    fn name(&self) -> &str {
        "http-rerank"
    }

    async fn score_batch(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }
        let request = RerankRequest { query, texts: passages, raw_scores: true };
        let response = self.client.post(&self.url).json(&request).send().await?.error_for_status()?;
        let items: Vec<RerankItem> = response.json().await?;
        align_scores(items, passages.len())
    }
}
