use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use citerag_core::types::HighlightSpan;
use citerag_core::{Error, Result};

use crate::highlighter::highlight_passages;

/// Raw text of source documents, by filename.
pub trait DocumentStore: Send + Sync {
    /// `Error::NotFound` when no such document exists.
    fn load(&self, filename: &str) -> Result<String>;
}

/// Documents stored as files under one root directory. Filenames are
/// relative to the root and may not leave it.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, filename: &str) -> Option<PathBuf> {
        let rel = Path::new(filename);
        let contained = !filename.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        contained.then(|| self.root.join(rel))
    }
}

impl DocumentStore for FsDocumentStore {
    fn load(&self, filename: &str) -> Result<String> {
        let path = self
            .path_for(filename)
            .filter(|p| p.is_file())
            .ok_or_else(|| Error::NotFound(filename.to_string()))?;
        let bytes = std::fs::read(&path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentView {
    pub filename: String,
    pub content: String,
    pub highlights: Vec<HighlightSpan>,
}

/// Load a document and locate the requested passages in it.
pub fn view_document<S: AsRef<str>>(store: &dyn DocumentStore, filename: &str, passages: &[S]) -> Result<DocumentView> {
    let content = store.load(filename)?;
    let highlights = highlight_passages(&content, passages);
    tracing::debug!(filename, requested = passages.len(), found = highlights.len(), "document viewed");
    Ok(DocumentView { filename: filename.to_string(), content, highlights })
}
