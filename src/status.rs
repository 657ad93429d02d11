//! Dry-run preview of an index run.
//!
//! Reports what a run would do (new, changed, unchanged and deleted
//! documents), whether a stored checkpoint could be resumed, and the
//! current index metadata, without writing anything or calling the
//! embedding service.

use anyhow::Result;
use serde::Serialize;

use schemadex_core::change::ChangeSet;
use schemadex_core::checkpoint::{stable_manifest_hash, Phase};
use schemadex_core::models::{DocType, IndexMetadata};
use schemadex_core::store::Store;

use std::path::Path;

use crate::config::Config;
use crate::indexer::RunMode;
use crate::loader::{load_manifest, LoadedManifest};
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Clone, Serialize)]
pub struct CheckpointStatus {
    pub phase: Phase,
    pub done: usize,
    pub failed: usize,
    pub pending: usize,
    /// Whether the checkpoint matches the current manifest.
    pub resumable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub database: String,
    pub mode: RunMode,
    pub stable_hash: String,
    pub changes: ChangeSet,
    /// Whether the relationship graph would be rebuilt.
    pub rebuilds_relationships: bool,
    pub checkpoint: Option<CheckpointStatus>,
    pub metadata: IndexMetadata,
    /// The stored index was built from a different manifest or plan.
    pub stale: bool,
}

/// CLI entry point for `schemadex status`.
pub async fn run_status(config: &Config, manifest_path: &Path, mode: RunMode) -> Result<()> {
    let loaded = load_manifest(manifest_path)?;
    let store = SqliteStore::open(config).await?;
    let report = preview(&store, &loaded, mode).await?;
    report.print();
    store.close().await;
    Ok(())
}

pub async fn preview(
    store: &dyn Store,
    loaded: &LoadedManifest,
    mode: RunMode,
) -> Result<StatusReport> {
    let manifest = &loaded.manifest;
    let database = manifest.database.as_str();
    let stable_hash = stable_manifest_hash(manifest);

    let stored = store.list_sources(database).await?;
    let changes = match mode {
        RunMode::Full => ChangeSet::full(manifest, &stored),
        RunMode::Incremental => ChangeSet::classify(manifest, &stored),
    };
    let checkpoint = store
        .load_checkpoint(database)
        .await?
        .map(|cp| CheckpointStatus {
            phase: cp.phase,
            done: cp.done.len(),
            failed: cp.failed.len(),
            pending: cp.pending.len(),
            resumable: cp.matches(&stable_hash),
        });
    let metadata = store.read_metadata(database).await?;
    let stale = metadata.manifest_hash.as_deref() != Some(stable_hash.as_str())
        || metadata.plan_hash.as_deref() != Some(manifest.plan_hash.as_str());

    Ok(StatusReport {
        database: database.to_string(),
        mode,
        rebuilds_relationships: mode == RunMode::Full || changes.touches_tables(),
        stable_hash,
        changes,
        checkpoint,
        metadata,
        stale,
    })
}

impl StatusReport {
    pub fn print(&self) {
        println!("status {} ({}, dry-run)", self.database, self.mode.as_str());
        println!("  manifest hash: {}", self.stable_hash);
        println!("  new: {}", self.changes.new.len());
        println!("  changed: {}", self.changes.changed.len());
        println!("  unchanged: {}", self.changes.unchanged.len());
        println!("  deleted: {}", self.changes.deleted.len());
        println!(
            "  relationships: {}",
            if self.rebuilds_relationships { "rebuild" } else { "keep" }
        );
        match &self.checkpoint {
            Some(cp) => println!(
                "  checkpoint: {} (done {}, failed {}, pending {}){}",
                cp.phase,
                cp.done,
                cp.failed,
                cp.pending,
                if cp.resumable { ", resumable" } else { ", stale" }
            ),
            None => println!("  checkpoint: none"),
        }

        let meta = &self.metadata;
        match &meta.last_run_at {
            Some(at) => println!(
                "  last run: {} ({})",
                at,
                meta.last_run_mode.as_deref().unwrap_or("unknown")
            ),
            None => println!("  last run: never"),
        }
        println!("  index up to date: {}", if self.stale { "no" } else { "yes" });
        let counts: Vec<String> = DocType::ALL
            .iter()
            .map(|t| format!("{}={}", t, meta.counts.get(t).copied().unwrap_or(0)))
            .collect();
        println!("  stored: {}", counts.join(" "));
        if let Some(model) = &meta.embedding_model {
            println!(
                "  embedding model: {} ({} dims)",
                model,
                meta.embedding_dims.unwrap_or(0)
            );
        }
        if let Some(complete) = meta.embeddings_complete {
            println!(
                "  embeddings complete: {} (missing {})",
                complete,
                meta.embeddings_missing.unwrap_or(0)
            );
        }
        println!("ok");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemadex_core::checkpoint::CheckpointTracker;
    use schemadex_core::manifest::{Manifest, ManifestEntry};
    use schemadex_core::store::memory::InMemoryStore;
    use std::path::PathBuf;

    fn loaded() -> LoadedManifest {
        LoadedManifest {
            manifest: Manifest {
                version: 1,
                database: "shop".to_string(),
                plan_hash: "p1".to_string(),
                entries: vec![ManifestEntry {
                    doc_type: DocType::Table,
                    path: "tables/orders.md".to_string(),
                    content_hash: "h1".to_string(),
                }],
            },
            root: PathBuf::from("."),
        }
    }

    #[tokio::test]
    async fn preview_on_empty_store() {
        let store = InMemoryStore::new();
        let loaded = loaded();
        let report = preview(&store, &loaded, RunMode::Incremental).await.unwrap();
        assert_eq!(report.changes.new.len(), 1);
        assert!(report.changes.deleted.is_empty());
        assert!(report.rebuilds_relationships);
        assert!(report.checkpoint.is_none());
        assert!(report.stale);
    }

    #[tokio::test]
    async fn preview_reports_resumable_checkpoint() {
        let store = InMemoryStore::new();
        let loaded = loaded();
        let hash = stable_manifest_hash(&loaded.manifest);
        let mut tracker = CheckpointTracker::new("shop", &hash, 10);
        tracker.plan("tables/orders.md");
        store.save_checkpoint(&tracker.snapshot()).await.unwrap();

        let report = preview(&store, &loaded, RunMode::Full).await.unwrap();
        let cp = report.checkpoint.unwrap();
        assert!(cp.resumable);
        assert_eq!(cp.pending, 1);
    }
}
