//! In-memory [`Store`] implementation for tests.
//!
//! All state sits behind one `RwLock`, so each write or delete is a single
//! critical section and readers never see a half-applied change. Keyword
//! search is a plain term count over the lexical entries; vector search is
//! brute-force cosine similarity.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::checkpoint::Checkpoint;
use crate::embedding::{cosine_similarity, EmbeddingRecord};
use crate::models::{DocType, Document, IndexMetadata, Relationship};

use super::{
    query_terms, DeleteOutcome, DocumentWrite, LexicalEntry, SearchHit, SourceRecord, Store,
    WriteOutcome,
};

#[derive(Default)]
struct Inner {
    docs: BTreeMap<String, Document>,
    lexical: HashMap<String, LexicalEntry>,
    vectors: HashMap<String, EmbeddingRecord>,
    relationships: Vec<Relationship>,
    metadata: HashMap<String, Vec<(String, String)>>,
    checkpoints: HashMap<String, Checkpoint>,
}

impl Inner {
    /// Remove documents and their projections; returns (docs, vectors).
    fn remove_paths(&mut self, paths: &HashSet<String>) -> (usize, usize) {
        let mut docs = 0;
        let mut vectors = 0;
        for path in paths {
            if self.docs.remove(path).is_some() {
                docs += 1;
            }
            self.lexical.remove(path);
            if self.vectors.remove(path).is_some() {
                vectors += 1;
            }
        }
        (docs, vectors)
    }

    fn remove_relationships_touching(&mut self, paths: &HashSet<String>) -> usize {
        let before = self.relationships.len();
        self.relationships.retain(|r| {
            !paths.contains(&r.source_path)
                && !paths.contains(&r.target_path)
                && !paths.contains(&r.origin_path)
        });
        before - self.relationships.len()
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

fn lexical_entry(doc: &Document) -> LexicalEntry {
    LexicalEntry {
        title: doc.title.clone(),
        summary: doc.summary.clone(),
        content: doc.content.clone(),
        keywords: doc.keywords.join(" "),
    }
}

fn hit(doc: &Document, score: f64) -> SearchHit {
    SearchHit {
        id: doc.id.clone(),
        source_path: doc.source_path.clone(),
        doc_type: doc.doc_type,
        title: doc.title.clone(),
        summary: doc.summary.clone(),
        score,
    }
}

fn column_prefix(table_path: &str) -> String {
    format!("{}#", table_path)
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_document(&self, write: &DocumentWrite) -> Result<WriteOutcome> {
        let mut inner = self.write()?;
        let mut doc = write.document.clone();

        let parent_id = write.parent_path.as_ref().and_then(|p| {
            inner
                .docs
                .get(p)
                .filter(|d| d.doc_type == DocType::Table)
                .map(|d| d.id.clone())
        });
        doc.orphaned = doc.doc_type == DocType::Column && parent_id.is_none();
        doc.parent_id = parent_id.clone();

        let path = doc.source_path.clone();
        inner.lexical.insert(path.clone(), lexical_entry(&doc));
        match &write.embedding {
            Some(record) => {
                inner.vectors.insert(path.clone(), record.clone());
            }
            None => {
                inner.vectors.remove(&path);
            }
        }
        let outcome = WriteOutcome {
            id: doc.id.clone(),
            parent_id,
            orphaned: doc.orphaned,
        };
        inner.docs.insert(path, doc);
        Ok(outcome)
    }

    async fn delete_document(&self, source_path: &str) -> Result<DeleteOutcome> {
        let mut inner = self.write()?;
        let prefix = column_prefix(source_path);
        let mut paths: HashSet<String> = inner
            .docs
            .keys()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect();
        paths.insert(source_path.to_string());

        let (documents, vectors) = inner.remove_paths(&paths);
        let relationships = inner.remove_relationships_touching(&paths);
        Ok(DeleteOutcome {
            documents,
            vectors,
            relationships,
        })
    }

    async fn prune_columns(&self, table_path: &str, keep: &[String]) -> Result<Vec<String>> {
        let mut inner = self.write()?;
        let prefix = column_prefix(table_path);
        let stale: HashSet<String> = inner
            .docs
            .keys()
            .filter(|p| p.starts_with(&prefix) && !keep.contains(p))
            .cloned()
            .collect();
        inner.remove_paths(&stale);
        inner.remove_relationships_touching(&stale);
        let mut removed: Vec<String> = stale.into_iter().collect();
        removed.sort();
        Ok(removed)
    }

    async fn get_document(&self, source_path: &str) -> Result<Option<Document>> {
        Ok(self.read()?.docs.get(source_path).cloned())
    }

    async fn list_documents(
        &self,
        database: &str,
        doc_type: Option<DocType>,
    ) -> Result<Vec<Document>> {
        Ok(self
            .read()?
            .docs
            .values()
            .filter(|d| d.database == database && doc_type.map_or(true, |t| d.doc_type == t))
            .cloned()
            .collect())
    }

    async fn list_sources(&self, database: &str) -> Result<Vec<SourceRecord>> {
        Ok(self
            .read()?
            .docs
            .values()
            .filter(|d| d.database == database && d.doc_type != DocType::Column)
            .map(|d| SourceRecord {
                path: d.source_path.clone(),
                doc_type: d.doc_type,
                content_hash: d.content_hash.clone(),
            })
            .collect())
    }

    async fn count_documents(&self, database: &str, doc_type: DocType) -> Result<i64> {
        Ok(self
            .read()?
            .docs
            .values()
            .filter(|d| d.database == database && d.doc_type == doc_type)
            .count() as i64)
    }

    async fn count_missing_vectors(&self, database: &str) -> Result<i64> {
        let inner = self.read()?;
        Ok(inner
            .docs
            .values()
            .filter(|d| d.database == database && !inner.vectors.contains_key(&d.source_path))
            .count() as i64)
    }

    async fn lexical_entry(&self, source_path: &str) -> Result<Option<LexicalEntry>> {
        Ok(self.read()?.lexical.get(source_path).cloned())
    }

    async fn replace_relationships(&self, database: &str, edges: &[Relationship]) -> Result<()> {
        let mut inner = self.write()?;
        inner.relationships.retain(|r| r.database != database);
        inner.relationships.extend(edges.iter().cloned());
        Ok(())
    }

    async fn list_relationships(&self, database: &str) -> Result<Vec<Relationship>> {
        Ok(self
            .read()?
            .relationships
            .iter()
            .filter(|r| r.database == database)
            .cloned()
            .collect())
    }

    async fn keyword_search(
        &self,
        query: &str,
        database: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SearchHit>> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let inner = self.read()?;
        let mut hits: Vec<SearchHit> = inner
            .docs
            .values()
            .filter(|d| database.map_or(true, |db| d.database == db))
            .filter_map(|d| {
                let entry = inner.lexical.get(&d.source_path)?;
                let text = format!(
                    "{} {} {} {}",
                    entry.title, entry.summary, entry.content, entry.keywords
                );
                let tokens = query_terms(&text);
                let score = tokens.iter().filter(|t| terms.contains(t)).count();
                (score > 0).then(|| hit(d, score as f64))
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.source_path.cmp(&b.source_path))
        });
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }

    async fn vector_search(
        &self,
        query_vec: &[f32],
        database: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SearchHit>> {
        let inner = self.read()?;
        let mut hits: Vec<SearchHit> = inner
            .docs
            .values()
            .filter(|d| database.map_or(true, |db| d.database == db))
            .filter_map(|d| {
                let record = inner.vectors.get(&d.source_path)?;
                Some(hit(d, cosine_similarity(query_vec, &record.vector) as f64))
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }

    async fn read_metadata(&self, database: &str) -> Result<IndexMetadata> {
        let pairs = self
            .read()?
            .metadata
            .get(database)
            .cloned()
            .unwrap_or_default();
        Ok(IndexMetadata::from_pairs(database, pairs))
    }

    async fn write_metadata(&self, metadata: &IndexMetadata) -> Result<()> {
        self.write()?
            .metadata
            .insert(metadata.database.clone(), metadata.to_pairs());
        Ok(())
    }

    async fn load_checkpoint(&self, database: &str) -> Result<Option<Checkpoint>> {
        Ok(self.read()?.checkpoints.get(database).cloned())
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.write()?
            .checkpoints
            .insert(checkpoint.database.clone(), checkpoint.clone());
        Ok(())
    }

    async fn clear_checkpoint(&self, database: &str) -> Result<()> {
        self.write()?.checkpoints.remove(database);
        Ok(())
    }
}
