//! Domain types shared by the retrieval and attribution crates.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// Provenance of a chunk: where the text was cut from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub filename: String,
    #[serde(default)]
    pub source_url: String,
}

/// An immutable unit of retrievable text.
///
/// - `id`: identifier shared with the vector index (row position in the metadata table)
/// - `text`: the chunk payload; never empty, and the identity used for deduplication
/// - `meta`: originating file and URL
///
/// The embedding is owned by the vector index, not by the chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub meta: ChunkMeta,
}

/// Indicates which retrieval method produced a candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Vector,
    Lexical,
}

/// A hit from the lexical index. Higher `score` is better.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub chunk_id: ChunkId,
    pub score: f32,
}

/// A hit from the vector index. Lower `distance` is better.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk_id: ChunkId,
    pub distance: f32,
}

/// A chunk proposed by one retrieval method for one query.
///
/// `score` keeps the method's native convention: BM25 score for
/// [`SourceKind::Lexical`] (higher is better), cosine distance for
/// [`SourceKind::Vector`] (lower is better). Only reranking compares
/// candidates across methods.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk: Chunk,
    pub score: f32,
    pub source: SourceKind,
}

/// A fused candidate with its pairwise relevance score (higher is better).
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub candidate: Candidate,
    pub relevance: f32,
}

impl RankedCandidate {
    pub fn text(&self) -> &str {
        &self.candidate.chunk.text
    }
}

/// One entry of retrieval output handed to answer generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retrieved {
    pub chunk_text: String,
    pub metadata: ChunkMeta,
}

impl From<RankedCandidate> for Retrieved {
    fn from(r: RankedCandidate) -> Self {
        let Chunk { text, meta, .. } = r.candidate.chunk;
        Self { chunk_text: text, metadata: meta }
    }
}

/// Sizes for one hybrid retrieval pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParams {
    pub top_k_semantic: usize,
    pub top_k_keyword: usize,
    pub final_top_k: usize,
}

impl RetrievalParams {
    pub fn uniform(top_k: usize, final_top_k: usize) -> Self {
        Self { top_k_semantic: top_k, top_k_keyword: top_k, final_top_k }
    }
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self::uniform(10, 3)
    }
}

/// Sampling parameters passed to a text generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
}

/// A prior conversation turn supplied by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub message: String,
}

/// Location of a requested passage inside a raw document.
///
/// `start`/`end` are UTF-8 byte offsets, so `&doc[start..end]` is always a
/// valid slice. `approximate` is set when the match was found only after
/// collapsing whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
    pub passage: String,
    pub approximate: bool,
}
