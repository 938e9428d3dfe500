//! Text generation against an Ollama server (`POST /api/generate`).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use citerag_core::config::LlmSettings;
use citerag_core::traits::TextGenerator;
use citerag_core::types::GenerationParams;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaGenerator {
    client: Client,
    url: String,
    model: String,
}

impl OllamaGenerator {
    /// `timeout` is a transport ceiling; per-call deadlines are applied by the caller.
    pub fn new(llm: &LlmSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(5)
            .build()
            .context("building generation HTTP client")?;
        Ok(Self {
            client,
            url: format!("{}/api/generate", llm.base_url.trim_end_matches('/')),
            model: llm.generate_model.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str, params: GenerationParams) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: params.temperature, num_predict: params.max_tokens },
        };
        let started = std::time::Instant::now();
        let response = self.client.post(&self.url).json(&request).send().await?.error_for_status()?;
        let body: GenerateResponse = response.json().await?;
        tracing::debug!(model = %self.model, elapsed_ms = started.elapsed().as_millis() as u64, chars = body.response.len(), "generation finished");
        Ok(body.response)
    }
}
