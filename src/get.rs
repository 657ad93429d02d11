//! Document retrieval by source path.

use anyhow::{anyhow, Result};

use schemadex_core::models::Document;
use schemadex_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub async fn run_get(config: &Config, source_path: &str) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let doc = get_document(&store, source_path).await;
    store.close().await;
    print_document(&doc?);
    Ok(())
}

pub async fn get_document(store: &dyn Store, source_path: &str) -> Result<Document> {
    store
        .get_document(source_path)
        .await?
        .ok_or_else(|| anyhow!("document not found: {}", source_path))
}

pub fn print_document(doc: &Document) {
    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("type:         {}", doc.doc_type);
    println!("title:        {}", doc.title);
    println!("path:         {}", doc.source_path);
    println!("database:     {}", doc.database);
    if let Some(schema) = &doc.schema {
        println!("schema:       {}", schema);
    }
    if let Some(table) = &doc.table {
        println!("table:        {}", table);
    }
    if let Some(column) = &doc.column {
        println!("column:       {}", column);
    }
    if let Some(domain) = &doc.domain {
        println!("domain:       {}", domain);
    }
    if let Some(parent) = &doc.parent_id {
        println!("parent:       {}", parent);
    }
    if doc.orphaned {
        println!("orphaned:     true");
    }
    println!("hash:         {}", doc.content_hash);
    println!("indexed_at:   {}", format_ts_iso(doc.indexed_at));
    println!("keywords:     {}", doc.keywords.join(", "));
    println!("summary:      {}", doc.summary);
    println!();

    println!("--- Content ---");
    println!("{}", doc.content);
    println!();

    println!("--- Metadata ---");
    println!("{}", doc.metadata_json);
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
