//! Storage abstraction for schemadex.
//!
//! The [`Store`] trait is the only way documents, their lexical projection,
//! vectors, relationships, metadata and checkpoints are written or read.
//! Implementations keep the content store and its projections consistent
//! at every commit: a write or delete either lands completely or not at
//! all.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::checkpoint::Checkpoint;
use crate::embedding::EmbeddingRecord;
use crate::models::{DocType, Document, IndexMetadata, Relationship};

/// One document write: the record, its parent table path (columns only)
/// and the embedding outcome.
#[derive(Debug, Clone)]
pub struct DocumentWrite {
    pub document: Document,
    pub parent_path: Option<String>,
    /// `None` when embedding was skipped or failed; any stored vector for
    /// the path is removed.
    pub embedding: Option<EmbeddingRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub id: String,
    pub parent_id: Option<String>,
    pub orphaned: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub documents: usize,
    pub vectors: usize,
    pub relationships: usize,
}

/// A stored source document, as seen by change detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRecord {
    pub path: String,
    pub doc_type: DocType,
    pub content_hash: String,
}

/// What the lexical projection holds for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalEntry {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub keywords: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub source_path: String,
    pub doc_type: DocType,
    pub title: String,
    pub summary: String,
    pub score: f64,
}

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_document`](Store::upsert_document) | Write a document, its lexical entry and vector |
/// | [`delete_document`](Store::delete_document) | Delete with cascade |
/// | [`prune_columns`](Store::prune_columns) | Drop a table's stale column documents |
/// | [`keyword_search`](Store::keyword_search) | Lexical search |
/// | [`vector_search`](Store::vector_search) | Cosine search over stored vectors |
/// | [`replace_relationships`](Store::replace_relationships) | Swap a database's edge set |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or replace the document at `document.source_path`.
    ///
    /// Column writes look up the parent table by `parent_path` in the same
    /// unit of work; a missing parent stores the column as orphaned.
    async fn upsert_document(&self, write: &DocumentWrite) -> Result<WriteOutcome>;

    /// Delete a document and everything hanging off it: its lexical entry,
    /// vector, child columns (with theirs) and relationship rows that
    /// reference any deleted path.
    async fn delete_document(&self, source_path: &str) -> Result<DeleteOutcome>;

    /// Delete the table's column documents whose paths are not in `keep`.
    /// Returns the deleted paths.
    async fn prune_columns(&self, table_path: &str, keep: &[String]) -> Result<Vec<String>>;

    async fn get_document(&self, source_path: &str) -> Result<Option<Document>>;

    /// Documents of one database, optionally of one type, ordered by path.
    async fn list_documents(
        &self,
        database: &str,
        doc_type: Option<DocType>,
    ) -> Result<Vec<Document>>;

    /// Non-column documents of one database, for change detection.
    async fn list_sources(&self, database: &str) -> Result<Vec<SourceRecord>>;

    async fn count_documents(&self, database: &str, doc_type: DocType) -> Result<i64>;

    /// Documents of a database without a stored vector.
    async fn count_missing_vectors(&self, database: &str) -> Result<i64>;

    async fn lexical_entry(&self, source_path: &str) -> Result<Option<LexicalEntry>>;

    async fn replace_relationships(&self, database: &str, edges: &[Relationship]) -> Result<()>;

    async fn list_relationships(&self, database: &str) -> Result<Vec<Relationship>>;

    async fn keyword_search(
        &self,
        query: &str,
        database: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SearchHit>>;

    /// Documents without a vector are never returned.
    async fn vector_search(
        &self,
        query_vec: &[f32],
        database: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SearchHit>>;

    async fn read_metadata(&self, database: &str) -> Result<IndexMetadata>;

    async fn write_metadata(&self, metadata: &IndexMetadata) -> Result<()>;

    async fn load_checkpoint(&self, database: &str) -> Result<Option<Checkpoint>>;

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()>;

    async fn clear_checkpoint(&self, database: &str) -> Result<()>;
}

/// Split a free-text query into lowercase search terms.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_terms_strip_operators() {
        assert_eq!(
            query_terms("customer \"orders\" OR -x*"),
            vec!["customer", "orders", "or", "x"]
        );
        assert!(query_terms("  ()  ").is_empty());
    }
}
