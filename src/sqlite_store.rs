//! SQLite-backed [`Store`] implementation.
//!
//! Every write or delete runs in one transaction that touches the content
//! row, its `documents_fts` entry and its vector together, so the lexical
//! projection never disagrees with the documents table at a commit.

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use schemadex_core::checkpoint::Checkpoint;
use schemadex_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use schemadex_core::models::{DocType, Document, IndexMetadata, Relationship, TableRef};
use schemadex_core::store::{
    query_terms, DeleteOutcome, DocumentWrite, LexicalEntry, SearchHit, SourceRecord, Store,
    WriteOutcome,
};

use crate::config::Config;
use crate::{db, migrate};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Quote each term so FTS5 operators in user input are treated as text.
pub fn fts_query(query: &str) -> Option<String> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

const DOCUMENT_COLUMNS: &str = "id, doc_type, database, schema_name, table_name, column_name, \
     domain, title, content, summary, keywords, source_path, content_hash, source_mtime, \
     parent_id, orphaned, metadata_json, indexed_at";

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    let doc_type: String = row.get("doc_type");
    let keywords: String = row.get("keywords");
    let orphaned: i64 = row.get("orphaned");
    Ok(Document {
        id: row.get("id"),
        doc_type: doc_type.parse().map_err(anyhow::Error::msg)?,
        database: row.get("database"),
        schema: row.get("schema_name"),
        table: row.get("table_name"),
        column: row.get("column_name"),
        domain: row.get("domain"),
        title: row.get("title"),
        content: row.get("content"),
        summary: row.get("summary"),
        keywords: serde_json::from_str(&keywords).unwrap_or_default(),
        source_path: row.get("source_path"),
        content_hash: row.get("content_hash"),
        source_mtime: row.get("source_mtime"),
        parent_id: row.get("parent_id"),
        orphaned: orphaned != 0,
        metadata_json: row.get("metadata_json"),
        indexed_at: row.get("indexed_at"),
    })
}

fn relationship_from_row(row: &SqliteRow) -> Result<Relationship> {
    let kind: String = row.get("kind");
    let source_columns: String = row.get("source_columns");
    let target_columns: String = row.get("target_columns");
    let source_schema: Option<String> = row.get("source_schema");
    let source_table: String = row.get("source_table");
    let target_schema: Option<String> = row.get("target_schema");
    let target_table: String = row.get("target_table");
    Ok(Relationship {
        id: row.get("id"),
        database: row.get("database"),
        source_path: row.get("source_path"),
        source_table: TableRef::new(source_schema.as_deref(), &source_table),
        source_columns: serde_json::from_str(&source_columns)
            .context("Invalid relationship source_columns")?,
        target_path: row.get("target_path"),
        target_table: TableRef::new(target_schema.as_deref(), &target_table),
        target_columns: serde_json::from_str(&target_columns)
            .context("Invalid relationship target_columns")?,
        kind: kind.parse().map_err(anyhow::Error::msg)?,
        join_clause: row.get("join_clause"),
        origin_path: row.get("origin_path"),
    })
}

fn search_hit(row: &SqliteRow, score: f64) -> Result<SearchHit> {
    let doc_type: String = row.get("doc_type");
    Ok(SearchHit {
        id: row.get("id"),
        source_path: row.get("source_path"),
        doc_type: doc_type.parse().map_err(anyhow::Error::msg)?,
        title: row.get("title"),
        summary: row.get("summary"),
        score,
    })
}

/// Delete documents by path with their FTS rows, vectors and the
/// relationship rows that reference them. Runs inside the caller's
/// transaction.
async fn delete_paths(
    tx: &mut Transaction<'_, Sqlite>,
    paths: &[String],
) -> Result<DeleteOutcome> {
    let mut outcome = DeleteOutcome::default();
    for path in paths {
        outcome.vectors += sqlx::query("DELETE FROM document_vectors WHERE source_path = ?")
            .bind(path)
            .execute(&mut **tx)
            .await?
            .rows_affected() as usize;
        sqlx::query("DELETE FROM documents_fts WHERE source_path = ?")
            .bind(path)
            .execute(&mut **tx)
            .await?;
        outcome.documents += sqlx::query("DELETE FROM documents WHERE source_path = ?")
            .bind(path)
            .execute(&mut **tx)
            .await?
            .rows_affected() as usize;
        outcome.relationships += sqlx::query(
            "DELETE FROM relationships WHERE source_path = ?1 OR target_path = ?1 OR origin_path = ?1",
        )
        .bind(path)
        .execute(&mut **tx)
        .await?
        .rows_affected() as usize;
    }
    Ok(outcome)
}

/// Paths of a table's column documents (`<table path>#<column>`).
async fn column_paths(
    tx: &mut Transaction<'_, Sqlite>,
    table_path: &str,
) -> Result<Vec<String>> {
    let prefix = format!("{}#", table_path);
    let paths: Vec<String> = sqlx::query_scalar(
        "SELECT source_path FROM documents WHERE doc_type = 'column' AND substr(source_path, 1, ?) = ?",
    )
    .bind(prefix.len() as i64)
    .bind(&prefix)
    .fetch_all(&mut **tx)
    .await?;
    Ok(paths)
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_document(&self, write: &DocumentWrite) -> Result<WriteOutcome> {
        let doc = &write.document;
        let mut tx = self.pool.begin().await?;

        let parent_id: Option<String> = match &write.parent_path {
            Some(parent) => {
                sqlx::query_scalar(
                    "SELECT id FROM documents WHERE source_path = ? AND doc_type = 'table'",
                )
                .bind(parent)
                .fetch_optional(&mut *tx)
                .await?
            }
            None => None,
        };
        let orphaned = doc.doc_type == DocType::Column && parent_id.is_none();
        let keywords = serde_json::to_string(&doc.keywords)?;

        sqlx::query(&format!(
            r#"
            INSERT INTO documents ({})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_path) DO UPDATE SET
                id = excluded.id,
                doc_type = excluded.doc_type,
                database = excluded.database,
                schema_name = excluded.schema_name,
                table_name = excluded.table_name,
                column_name = excluded.column_name,
                domain = excluded.domain,
                title = excluded.title,
                content = excluded.content,
                summary = excluded.summary,
                keywords = excluded.keywords,
                content_hash = excluded.content_hash,
                source_mtime = excluded.source_mtime,
                parent_id = excluded.parent_id,
                orphaned = excluded.orphaned,
                metadata_json = excluded.metadata_json,
                indexed_at = excluded.indexed_at
            "#,
            DOCUMENT_COLUMNS
        ))
        .bind(&doc.id)
        .bind(doc.doc_type.as_str())
        .bind(&doc.database)
        .bind(&doc.schema)
        .bind(&doc.table)
        .bind(&doc.column)
        .bind(&doc.domain)
        .bind(&doc.title)
        .bind(&doc.content)
        .bind(&doc.summary)
        .bind(&keywords)
        .bind(&doc.source_path)
        .bind(&doc.content_hash)
        .bind(doc.source_mtime)
        .bind(&parent_id)
        .bind(orphaned as i64)
        .bind(&doc.metadata_json)
        .bind(doc.indexed_at)
        .execute(&mut *tx)
        .await?;

        // Replace the lexical entry
        sqlx::query("DELETE FROM documents_fts WHERE source_path = ?")
            .bind(&doc.source_path)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO documents_fts (doc_id, source_path, title, summary, content, keywords) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&doc.id)
        .bind(&doc.source_path)
        .bind(&doc.title)
        .bind(&doc.summary)
        .bind(&doc.content)
        .bind(doc.keywords.join(" "))
        .execute(&mut *tx)
        .await?;

        // Replace or drop the vector
        sqlx::query("DELETE FROM document_vectors WHERE source_path = ?")
            .bind(&doc.source_path)
            .execute(&mut *tx)
            .await?;
        if let Some(record) = &write.embedding {
            sqlx::query(
                "INSERT INTO document_vectors (doc_id, source_path, model, dims, embedding, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&doc.id)
            .bind(&doc.source_path)
            .bind(&record.model)
            .bind(record.dims as i64)
            .bind(vec_to_blob(&record.vector))
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(WriteOutcome {
            id: doc.id.clone(),
            parent_id,
            orphaned,
        })
    }

    async fn delete_document(&self, source_path: &str) -> Result<DeleteOutcome> {
        let mut tx = self.pool.begin().await?;
        let mut paths = column_paths(&mut tx, source_path).await?;
        paths.push(source_path.to_string());
        let outcome = delete_paths(&mut tx, &paths).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn prune_columns(&self, table_path: &str, keep: &[String]) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;
        let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
        let mut stale: Vec<String> = column_paths(&mut tx, table_path)
            .await?
            .into_iter()
            .filter(|p| !keep.contains(p.as_str()))
            .collect();
        stale.sort();
        delete_paths(&mut tx, &stale).await?;
        tx.commit().await?;
        Ok(stale)
    }

    async fn get_document(&self, source_path: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE source_path = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(source_path)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn list_documents(
        &self,
        database: &str,
        doc_type: Option<DocType>,
    ) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE database = ? AND (? IS NULL OR doc_type = ?) \
             ORDER BY source_path",
            DOCUMENT_COLUMNS
        ))
        .bind(database)
        .bind(doc_type.map(|t| t.as_str()))
        .bind(doc_type.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(document_from_row).collect()
    }

    async fn list_sources(&self, database: &str) -> Result<Vec<SourceRecord>> {
        let rows = sqlx::query(
            "SELECT source_path, doc_type, content_hash FROM documents \
             WHERE database = ? AND doc_type != 'column' ORDER BY source_path",
        )
        .bind(database)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                let doc_type: String = row.get("doc_type");
                Ok(SourceRecord {
                    path: row.get("source_path"),
                    doc_type: doc_type.parse().map_err(anyhow::Error::msg)?,
                    content_hash: row.get("content_hash"),
                })
            })
            .collect()
    }

    async fn count_documents(&self, database: &str, doc_type: DocType) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE database = ? AND doc_type = ?")
                .bind(database)
                .bind(doc_type.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn count_missing_vectors(&self, database: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM documents d
            LEFT JOIN document_vectors v ON v.source_path = d.source_path
            WHERE d.database = ? AND v.source_path IS NULL
            "#,
        )
        .bind(database)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn lexical_entry(&self, source_path: &str) -> Result<Option<LexicalEntry>> {
        let row = sqlx::query(
            "SELECT title, summary, content, keywords FROM documents_fts WHERE source_path = ?",
        )
        .bind(source_path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| LexicalEntry {
            title: row.get("title"),
            summary: row.get("summary"),
            content: row.get("content"),
            keywords: row.get("keywords"),
        }))
    }

    async fn replace_relationships(&self, database: &str, edges: &[Relationship]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM relationships WHERE database = ?")
            .bind(database)
            .execute(&mut *tx)
            .await?;
        for (position, edge) in edges.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO relationships (id, database, source_path, source_schema, source_table,
                                           source_columns, target_path, target_schema, target_table,
                                           target_columns, kind, join_clause, origin_path, position)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&edge.id)
            .bind(database)
            .bind(&edge.source_path)
            .bind(&edge.source_table.schema)
            .bind(&edge.source_table.table)
            .bind(serde_json::to_string(&edge.source_columns)?)
            .bind(&edge.target_path)
            .bind(&edge.target_table.schema)
            .bind(&edge.target_table.table)
            .bind(serde_json::to_string(&edge.target_columns)?)
            .bind(edge.kind.as_str())
            .bind(&edge.join_clause)
            .bind(&edge.origin_path)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_relationships(&self, database: &str) -> Result<Vec<Relationship>> {
        let rows = sqlx::query("SELECT * FROM relationships WHERE database = ? ORDER BY position")
            .bind(database)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(relationship_from_row).collect()
    }

    async fn keyword_search(
        &self,
        query: &str,
        database: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SearchHit>> {
        // SQLite treats a negative LIMIT as unbounded.
        if limit < 1 {
            return Ok(Vec::new());
        }
        let Some(fts) = fts_query(query) else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.source_path, d.doc_type, d.title, d.summary,
                   bm25(documents_fts) AS rank
            FROM documents_fts
            JOIN documents d ON d.source_path = documents_fts.source_path
            WHERE documents_fts MATCH ? AND (? IS NULL OR d.database = ?)
            ORDER BY rank, d.source_path
            LIMIT ?
            "#,
        )
        .bind(&fts)
        .bind(database)
        .bind(database)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                search_hit(row, -rank) // negate so higher = better
            })
            .collect()
    }

    async fn vector_search(
        &self,
        query_vec: &[f32],
        database: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SearchHit>> {
        // Fetch stored vectors and compute cosine similarity in Rust
        let rows = sqlx::query(
            r#"
            SELECT d.id, d.source_path, d.doc_type, d.title, d.summary, v.embedding
            FROM document_vectors v
            JOIN documents d ON d.source_path = v.source_path
            WHERE (? IS NULL OR d.database = ?)
            "#,
        )
        .bind(database)
        .bind(database)
        .fetch_all(&self.pool)
        .await?;

        let mut hits = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64;
                search_hit(row, similarity)
            })
            .collect::<Result<Vec<_>>>()?;
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }

    async fn read_metadata(&self, database: &str) -> Result<IndexMetadata> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM index_metadata WHERE database = ?")
                .bind(database)
                .fetch_all(&self.pool)
                .await?;
        Ok(IndexMetadata::from_pairs(database, rows))
    }

    async fn write_metadata(&self, metadata: &IndexMetadata) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM index_metadata WHERE database = ?")
            .bind(&metadata.database)
            .execute(&mut *tx)
            .await?;
        for (key, value) in metadata.to_pairs() {
            sqlx::query("INSERT INTO index_metadata (database, key, value) VALUES (?, ?, ?)")
                .bind(&metadata.database)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn load_checkpoint(&self, database: &str) -> Result<Option<Checkpoint>> {
        let json: Option<String> =
            sqlx::query_scalar("SELECT snapshot_json FROM checkpoints WHERE database = ?")
                .bind(database)
                .fetch_optional(&self.pool)
                .await?;
        json.map(|j| Checkpoint::from_json(&j).context("Corrupt checkpoint snapshot"))
            .transpose()
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO checkpoints (database, stable_hash, snapshot_json, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(database) DO UPDATE SET
                stable_hash = excluded.stable_hash,
                snapshot_json = excluded.snapshot_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&checkpoint.database)
        .bind(&checkpoint.stable_hash)
        .bind(checkpoint.to_json())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_checkpoint(&self, database: &str) -> Result<()> {
        sqlx::query("DELETE FROM checkpoints WHERE database = ?")
            .bind(database)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemadex_core::embedding::EmbeddingRecord;
    use schemadex_core::models::{document_id, RelationshipKind};
    use tempfile::TempDir;

    async fn store() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let config = crate::config::parse_config(&format!(
            "[db]\npath = \"{}\"\n",
            tmp.path().join("test.sqlite").display()
        ))
        .unwrap();
        let store = SqliteStore::open(&config).await.unwrap();
        (tmp, store)
    }

    fn doc(doc_type: DocType, path: &str, title: &str, body: &str) -> Document {
        Document {
            id: document_id(path),
            doc_type,
            database: "shop".to_string(),
            schema: Some("public".to_string()),
            table: Some("orders".to_string()),
            column: None,
            domain: Some("sales".to_string()),
            title: title.to_string(),
            content: body.to_string(),
            summary: String::new(),
            keywords: vec!["purchase".to_string()],
            source_path: path.to_string(),
            content_hash: "h".to_string(),
            source_mtime: Some(7),
            parent_id: None,
            orphaned: false,
            metadata_json: "{}".to_string(),
            indexed_at: 1,
        }
    }

    fn write(d: Document, parent: Option<&str>, vector: Option<Vec<f32>>) -> DocumentWrite {
        DocumentWrite {
            document: d,
            parent_path: parent.map(str::to_string),
            embedding: vector.map(|v| EmbeddingRecord {
                model: "m".to_string(),
                dims: v.len(),
                vector: v,
            }),
        }
    }

    #[test]
    fn fts_query_quotes_terms() {
        assert_eq!(
            fts_query("orders AND -customers*").as_deref(),
            Some("\"orders\" OR \"and\" OR \"customers\"")
        );
        assert_eq!(fts_query("\"()\""), None);
    }

    #[tokio::test]
    async fn upsert_roundtrip_and_lexical_sync() {
        let (_tmp, store) = store().await;
        store
            .upsert_document(&write(
                doc(DocType::Table, "t.md", "public.orders", "Orders placed online"),
                None,
                Some(vec![1.0, 0.0]),
            ))
            .await
            .unwrap();
        let got = store.get_document("t.md").await.unwrap().unwrap();
        assert_eq!(got.title, "public.orders");
        assert_eq!(got.keywords, vec!["purchase".to_string()]);
        assert_eq!(got.source_mtime, Some(7));

        store
            .upsert_document(&write(
                doc(DocType::Table, "t.md", "public.orders", "Orders placed in store"),
                None,
                None,
            ))
            .await
            .unwrap();
        let entry = store.lexical_entry("t.md").await.unwrap().unwrap();
        assert_eq!(entry.content, "Orders placed in store");
        assert_eq!(store.count_documents("shop", DocType::Table).await.unwrap(), 1);
        assert_eq!(store.count_missing_vectors("shop").await.unwrap(), 1);

        let hits = store.keyword_search("store", Some("shop"), 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(store.keyword_search("online", None, 10).await.unwrap().is_empty());
        assert!(store.keyword_search("store", None, -1).await.unwrap().is_empty());
        assert!(store.keyword_search("store", None, 0).await.unwrap().is_empty());
        assert!(store.vector_search(&[1.0, 0.0], None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn columns_resolve_parent_or_are_orphaned() {
        let (_tmp, store) = store().await;
        let orphan = store
            .upsert_document(&write(doc(DocType::Column, "t.md#id", "id", "id"), Some("t.md"), None))
            .await
            .unwrap();
        assert!(orphan.orphaned);
        let table = store
            .upsert_document(&write(doc(DocType::Table, "t.md", "orders", "x"), None, None))
            .await
            .unwrap();
        let col = store
            .upsert_document(&write(doc(DocType::Column, "t.md#id", "id", "id"), Some("t.md"), None))
            .await
            .unwrap();
        assert_eq!(col.parent_id.as_deref(), Some(table.id.as_str()));
        assert!(!store.get_document("t.md#id").await.unwrap().unwrap().orphaned);
    }

    #[tokio::test]
    async fn delete_cascades() {
        let (_tmp, store) = store().await;
        store
            .upsert_document(&write(doc(DocType::Table, "t.md", "orders", "x"), None, Some(vec![1.0])))
            .await
            .unwrap();
        for col in ["t.md#id", "t.md#total"] {
            store
                .upsert_document(&write(doc(DocType::Column, col, col, "c"), Some("t.md"), Some(vec![1.0])))
                .await
                .unwrap();
        }
        store
            .upsert_document(&write(doc(DocType::Table, "u.md", "customers", "y"), None, None))
            .await
            .unwrap();
        let edge = Relationship {
            id: "e1".to_string(),
            database: "shop".to_string(),
            source_path: "t.md".to_string(),
            source_table: TableRef::new(Some("public"), "orders"),
            source_columns: vec!["customer_id".to_string()],
            target_path: "u.md".to_string(),
            target_table: TableRef::new(Some("public"), "customers"),
            target_columns: vec!["id".to_string()],
            kind: RelationshipKind::ForeignKey,
            join_clause: "public.orders.customer_id = public.customers.id".to_string(),
            origin_path: "t.md".to_string(),
        };
        store.replace_relationships("shop", &[edge.clone()]).await.unwrap();
        assert_eq!(store.list_relationships("shop").await.unwrap(), vec![edge]);

        let out = store.delete_document("t.md").await.unwrap();
        assert_eq!(out.documents, 3);
        assert_eq!(out.vectors, 3);
        assert_eq!(out.relationships, 1);
        assert!(store.lexical_entry("t.md#id").await.unwrap().is_none());
        assert_eq!(store.list_documents("shop", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn prune_and_sources() {
        let (_tmp, store) = store().await;
        store
            .upsert_document(&write(doc(DocType::Table, "t.md", "orders", "x"), None, None))
            .await
            .unwrap();
        for col in ["t.md#a", "t.md#b"] {
            store
                .upsert_document(&write(doc(DocType::Column, col, col, "c"), Some("t.md"), None))
                .await
                .unwrap();
        }
        let removed = store
            .prune_columns("t.md", &["t.md#a".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, vec!["t.md#b".to_string()]);
        let sources = store.list_sources("shop").await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].path, "t.md");
        assert_eq!(
            store.list_documents("shop", Some(DocType::Column)).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn metadata_and_checkpoint_roundtrip() {
        let (_tmp, store) = store().await;
        let mut meta = IndexMetadata::new("shop");
        meta.embedding_model = Some("m".to_string());
        meta.counts.insert(DocType::Table, 2);
        store.write_metadata(&meta).await.unwrap();
        store.write_metadata(&meta).await.unwrap();
        assert_eq!(store.read_metadata("shop").await.unwrap(), meta);

        let mut tracker = schemadex_core::checkpoint::CheckpointTracker::new("shop", "h", 3);
        tracker.plan("a.md");
        store.save_checkpoint(&tracker.snapshot()).await.unwrap();
        tracker.mark_done("a.md");
        store.save_checkpoint(&tracker.snapshot()).await.unwrap();
        let loaded = store.load_checkpoint("shop").await.unwrap().unwrap();
        assert!(loaded.done.contains("a.md"));
        store.clear_checkpoint("shop").await.unwrap();
        assert!(store.load_checkpoint("shop").await.unwrap().is_none());
    }
}
