//! Embeddings from a local Ollama server (`POST /api/embeddings`).

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use citerag_core::config::LlmSettings;
use citerag_core::traits::Embedder;

use crate::l2_normalize;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

pub struct OllamaEmbedder {
    client: Client,
    url: String,
    model: String,
    dim: usize,
}

impl OllamaEmbedder {
    pub fn new(llm: &LlmSettings, dim: usize, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().context("building embedding HTTP client")?;
        Ok(Self {
            client,
            url: format!("{}/api/embeddings", llm.base_url.trim_end_matches('/')),
            model: llm.embed_model.clone(),
            dim,
        })
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { model: &self.model, prompt: text })
            .send()
            .await?
            .error_for_status()?;
        let mut embedding = response.json::<EmbedResponse>().await?.embedding;
        if embedding.len() != self.dim {
            return Err(anyhow!("model '{}' returned {} dims, expected {}", self.model, embedding.len(), self.dim));
        }
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn name(&self) -> &str { "ollama" }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Ollama has no batch endpoint for this API; one request per text.
        let mut out = Vec::with_capacity(texts.len());
        for text in texts { out.push(self.embed_one(text).await?); }
        Ok(out)
    }
}
