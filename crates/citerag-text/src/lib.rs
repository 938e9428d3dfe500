//! citerag-text
//!
//! Lexical Index Adapter: BM25 keyword search over chunk text, backed by a
//! Tantivy index with a lowercasing, stopword-filtering analyzer.

pub mod index;
pub mod tantivy_utils;

pub use index::TantivyLexicalIndex;
