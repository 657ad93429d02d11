//! Lexical search over the indexed documentation.
//!
//! Thin read-side wrapper used by `schemadex search`; the ranking itself
//! (FTS5 bm25 over title, summary, content and keywords) lives in the store.

use anyhow::{bail, Result};

use schemadex_core::store::{SearchHit, Store};

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub async fn run_search(
    config: &Config,
    query: &str,
    database: Option<&str>,
    limit: i64,
) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let hits = search_documents(&store, query, database, limit).await;
    store.close().await;
    print_results(query, &hits?);
    Ok(())
}

pub async fn search_documents(
    store: &dyn Store,
    query: &str,
    database: Option<&str>,
    limit: i64,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        bail!("search query must not be empty");
    }
    if limit < 1 {
        bail!("--limit must be at least 1");
    }
    store.keyword_search(query, database, limit).await
}

pub fn print_results(query: &str, hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }
    println!("search \"{}\"", query);
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} {}",
            i + 1,
            hit.score,
            hit.doc_type,
            hit.title
        );
        println!("    path: {}", hit.source_path);
        if !hit.summary.is_empty() {
            println!("    summary: {}", hit.summary);
        }
        println!("    id: {}", hit.id);
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemadex_core::store::memory::InMemoryStore;

    #[tokio::test]
    async fn rejects_empty_queries_and_bad_limits() {
        let store = InMemoryStore::new();
        assert!(search_documents(&store, "   ", None, 5).await.is_err());
        assert!(search_documents(&store, "orders", None, 0).await.is_err());
        assert!(search_documents(&store, "orders", None, -1).await.is_err());
        assert!(search_documents(&store, "orders", None, 5)
            .await
            .unwrap()
            .is_empty());
    }
}
