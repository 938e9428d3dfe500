//! Layered configuration and typed engine settings.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RAG__RETRIEVAL__TOP_K=20`).
//! Engine settings live under the `rag` key and every field has a default.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let base_dir = env::current_dir()?;
        let config = Self { figment, base_dir };
        config.settings()?;
        Ok(config)
    }

    /// Configuration from an inline TOML document, resolving paths against `base_dir`.
    pub fn from_toml_str(toml: &str, base_dir: impl Into<PathBuf>) -> Self {
        Self { figment: Figment::new().merge(Toml::string(toml)), base_dir: base_dir.into() }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed engine settings from the `rag` key, validated.
    pub fn settings(&self) -> anyhow::Result<RagSettings> {
        let settings = if self.figment.contains("rag") { self.get::<RagSettings>("rag")? } else { RagSettings::default() };
        settings.validate()?;
        Ok(settings)
    }

    pub fn resolve<S: AsRef<str>>(&self, p: S) -> PathBuf {
        resolve_with_base(&self.base_dir, p)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub retrieval: RetrievalSettings,
    pub expansion: ExpansionSettings,
    pub generation: GenerationSettings,
    pub attribution: AttributionSettings,
    pub embedding: EmbeddingSettings,
    pub scoring: ScoringSettings,
    pub llm: LlmSettings,
    pub data: DataSettings,
}

impl RagSettings {
    pub fn validate(&self) -> Result<(), Error> {
        if self.retrieval.final_top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.final_top_k must be positive".into()));
        }
        if self.retrieval.max_concurrent_variants == 0 {
            return Err(Error::InvalidConfig("retrieval.max_concurrent_variants must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.attribution.min_overlap_ratio) {
            return Err(Error::InvalidConfig("attribution.min_overlap_ratio must be within [0, 1]".into()));
        }
        if self.embedding.dim == 0 {
            return Err(Error::InvalidConfig("embedding.dim must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Candidates requested from each index per query variant.
    pub top_k: usize,
    /// Reranked chunks kept per query variant.
    pub final_top_k: usize,
    pub max_concurrent_variants: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 10, final_top_k: 3, max_concurrent_variants: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionSettings {
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub timeout_ms: u64,
    pub max_variants: usize,
    /// Search with the user's own wording in addition to the paraphrases.
    pub include_original: bool,
}

impl Default for ExpansionSettings {
    fn default() -> Self {
        Self { max_new_tokens: 64, temperature: 0.7, timeout_ms: 10_000, max_variants: 5, include_original: true }
    }
}

impl ExpansionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub max_new_tokens: usize,
    pub temperature: f32,
    pub timeout_ms: u64,
    /// Chunks whose trimmed text is not longer than this are left out of the context.
    pub min_context_chars: usize,
    pub history_turns: usize,
    pub closing_line: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_new_tokens: 1024,
            temperature: 0.7,
            timeout_ms: 120_000,
            min_context_chars: 100,
            history_turns: 3,
            closing_line: "Is there anything else you'd like help with?".to_string(),
        }
    }
}

impl GenerationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionSettings {
    pub min_shared_tokens: usize,
    pub min_overlap_ratio: f32,
    pub max_passages: usize,
    pub neighbor_sentences: bool,
}

impl Default for AttributionSettings {
    fn default() -> Self {
        Self { min_shared_tokens: 3, min_overlap_ratio: 0.3, max_passages: 2, neighbor_sentences: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Hash,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub dim: usize,
    pub timeout_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { provider: EmbeddingProvider::Hash, dim: 384, timeout_ms: 5_000 }
    }
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringProvider {
    Overlap,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub provider: ScoringProvider,
    pub url: String,
    pub timeout_ms: u64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self { provider: ScoringProvider::Overlap, url: "http://localhost:8080".to_string(), timeout_ms: 5_000 }
    }
}

impl ScoringSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub generate_model: String,
    pub embed_model: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            generate_model: "mistral".to_string(),
            embed_model: "nomic-embed-text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub metadata_csv: String,
    pub documents_dir: String,
    pub lancedb_uri: Option<String>,
    pub lancedb_table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            metadata_csv: "metadata.csv".to_string(),
            documents_dir: "data/Text".to_string(),
            lancedb_uri: None,
            lancedb_table: "chunks".to_string(),
        }
    }
}
