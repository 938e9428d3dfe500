//! citerag-hybrid
//!
//! Multi-query hybrid retrieval: a query is paraphrased by [`QueryExpander`],
//! each variant is searched semantically and lexically by [`HybridRetriever`]
//! and reranked pairwise, and [`MultiQueryAggregator`] merges the variants into
//! the final context list.

pub mod aggregator;
pub mod expander;
pub mod rerank;
pub mod retriever;

pub use aggregator::MultiQueryAggregator;
pub use expander::QueryExpander;
pub use rerank::OverlapScorer;
pub use retriever::HybridRetriever;
