//! citerag-cite
//!
//! Everything after retrieval: the per-request [`DocumentMapping`], answer
//! composition, citation attribution and passage highlighting inside raw
//! documents.

pub mod answer;
pub mod attributor;
pub mod documents;
pub mod highlighter;
pub mod mapping;

pub use answer::{AnswerComposer, GeneratedAnswer};
pub use attributor::{attribute_citations, CitationRecord, SupportingPassage};
pub use documents::{view_document, DocumentStore, DocumentView, FsDocumentStore};
pub use highlighter::highlight_passages;
pub use mapping::{DocumentMapping, MappedDocument};
