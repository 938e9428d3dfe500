//! Read-only chunk metadata store.
//!
//! The offline pipeline writes one CSV row per chunk (`chunk_text`,
//! `original_filename` or `filename`, `source_url`); the row position is the
//! id the vector index was built with.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::types::{Chunk, ChunkId, ChunkMeta};

#[derive(Debug, Deserialize)]
struct MetadataRow {
    #[serde(default)]
    chunk_text: String,
    #[serde(default, alias = "filename")]
    original_filename: String,
    #[serde(default)]
    source_url: String,
}

#[derive(Debug, Default)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
    by_id: HashMap<ChunkId, usize>,
    by_text: HashMap<String, usize>,
}

impl ChunkStore {
    /// Build a store from chunks. Chunks with blank text are dropped; when two
    /// chunks share a text, text lookups resolve to the first.
    pub fn new(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        let mut store = Self::default();
        for chunk in chunks {
            if chunk.text.trim().is_empty() {
                continue;
            }
            let pos = store.chunks.len();
            store.by_id.insert(chunk.id.clone(), pos);
            store.by_text.entry(chunk.text.clone()).or_insert(pos);
            store.chunks.push(chunk);
        }
        store
    }

    /// Ids are assigned from row positions, counting skipped rows.
    pub fn from_rows(rows: impl IntoIterator<Item = (String, ChunkMeta)>) -> Self {
        Self::new(rows.into_iter().enumerate().map(|(i, (text, meta))| Chunk { id: i.to_string(), text, meta }))
    }

    pub fn load_csv(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path).with_context(|| format!("opening chunk metadata {}", path.display()))?;
        let store = Self::from_csv_reader(file)?;
        tracing::info!(path = %path.display(), chunks = store.len(), "loaded chunk metadata");
        Ok(store)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> anyhow::Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut rows = Vec::new();
        for (line, record) in rdr.deserialize::<MetadataRow>().enumerate() {
            let row = record.with_context(|| format!("malformed metadata row {}", line + 1))?;
            rows.push((row.chunk_text, ChunkMeta { filename: row.original_filename, source_url: row.source_url }));
        }
        Ok(Self::from_rows(rows))
    }

    pub fn get(&self, id: &str) -> Option<&Chunk> {
        self.by_id.get(id).map(|&i| &self.chunks[i])
    }

    pub fn by_text(&self, text: &str) -> Option<&Chunk> {
        self.by_text.get(text).map(|&i| &self.chunks[i])
    }

    pub fn meta_for_text(&self, text: &str) -> Option<&ChunkMeta> {
        self.by_text(text).map(|c| &c.meta)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
