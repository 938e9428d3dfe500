use std::path::Path;

use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};

use citerag_core::traits::LexicalIndex;
use citerag_core::types::{Chunk, LexicalHit};

use crate::tantivy_utils::{build_schema, register_tokenizer};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Read-only keyword index over chunk text. Built once (in memory at
/// startup, or on disk by the offline pipeline) and shared across requests.
pub struct TantivyLexicalIndex {
	index: Index,
	reader: IndexReader,
	id_field: Field,
	text_field: Field,
}

impl TantivyLexicalIndex {
	pub fn build_in_ram<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Result<Self> {
		let index = Index::create_in_ram(build_schema());
		Self::populate(index, chunks)
	}

	/// Recreate an on-disk index at `index_dir` from scratch.
	pub fn build_in_dir<'a>(index_dir: &Path, chunks: impl IntoIterator<Item = &'a Chunk>) -> Result<Self> {
		if index_dir.exists() { std::fs::remove_dir_all(index_dir)?; }
		std::fs::create_dir_all(index_dir)?;
		let index = Index::create_in_dir(index_dir, build_schema())?;
		Self::populate(index, chunks)
	}

	pub fn open(index_dir: &Path) -> Result<Self> {
		let index = Index::open_in_dir(index_dir)?;
		register_tokenizer(&index);
		Self::from_index(index)
	}

	fn populate<'a>(index: Index, chunks: impl IntoIterator<Item = &'a Chunk>) -> Result<Self> {
		register_tokenizer(&index);
		let schema = index.schema();
		let id_field = schema.get_field("id")?;
		let text_field = schema.get_field("text")?;
		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
		let mut count = 0usize;
		for c in chunks {
			writer.add_document(doc!(id_field => c.id.clone(), text_field => c.text.clone()))?;
			count += 1;
		}
		writer.commit()?;
		tracing::debug!(chunks = count, "lexical index built");
		Self::from_index(index)
	}

	fn from_index(index: Index) -> Result<Self> {
		let schema = index.schema();
		let id_field = schema.get_field("id")?;
		let text_field = schema.get_field("text")?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self { index, reader, id_field, text_field })
	}
}

impl LexicalIndex for TantivyLexicalIndex {
	fn len(&self) -> usize {
		self.reader.searcher().num_docs() as usize
	}

	fn search(&self, query: &str, k: usize) -> Result<Vec<LexicalHit>> {
		if k == 0 || query.trim().is_empty() { return Ok(Vec::new()); }
		let searcher = self.reader.searcher();
		if searcher.num_docs() == 0 { return Ok(Vec::new()); }
		let qp = QueryParser::for_index(&self.index, vec![self.text_field]);
		// Free text from users and paraphrasers is not query syntax; take what parses.
		let (q, errors) = qp.parse_query_lenient(query);
		if !errors.is_empty() { tracing::debug!(query, errors = errors.len(), "lenient query parse dropped clauses"); }
		let top_docs = searcher.search(&q, &TopDocs::with_limit(k))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			if let Some(id) = doc.get_first(self.id_field).and_then(|v| v.as_str()) {
				hits.push(LexicalHit { chunk_id: id.to_string(), score });
			}
		}
		Ok(hits)
	}
}
