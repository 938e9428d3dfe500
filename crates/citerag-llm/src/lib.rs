//! Remote model services: text generation and pairwise reranking.
//!
//! Every call is a single attempt. Callers bound it with
//! `citerag_core::guard::bounded` and fall back on failure.

pub mod ollama;
pub mod rerank;

pub use ollama::OllamaGenerator;
pub use rerank::HttpReranker;
