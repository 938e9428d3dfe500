use std::collections::BTreeMap;

use serde::Serialize;

use citerag_core::types::Retrieved;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedDocument {
    pub filename: String,
    pub source_url: String,
    pub content: String,
}

/// Citation index (1-based, in context order) to the chunk shown to the
/// generator under that number. Built per request and dropped with it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DocumentMapping {
    docs: BTreeMap<usize, MappedDocument>,
}

impl DocumentMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep retrieved chunks whose trimmed text is longer than `min_chars`
    /// characters; numbering follows the retrieval order of the kept ones.
    pub fn from_retrieved(retrieved: &[Retrieved], min_chars: usize) -> Self {
        let mut mapping = Self::new();
        for r in retrieved {
            let content = r.chunk_text.trim();
            if content.chars().count() > min_chars {
                mapping.push(MappedDocument {
                    filename: r.metadata.filename.clone(),
                    source_url: r.metadata.source_url.clone(),
                    content: content.to_string(),
                });
            }
        }
        mapping
    }

    /// Append a document and return its citation index.
    pub fn push(&mut self, doc: MappedDocument) -> usize {
        let index = self.docs.len() + 1;
        self.docs.insert(index, doc);
        index
    }

    pub fn get(&self, index: usize) -> Option<&MappedDocument> {
        self.docs.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &MappedDocument)> {
        self.docs.iter().map(|(i, d)| (*i, d))
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
