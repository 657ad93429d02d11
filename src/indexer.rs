//! Index pipeline orchestration.
//!
//! Coordinates one run for one database: change detection → deletions →
//! parsing and identity registration → keyword extraction → embedding →
//! writes in processing order → relationship graph → metadata. Wrapped by
//! checkpointing so a run can be interrupted and resumed.
//!
//! Per-document problems are collected into the [`RunSummary`]; only
//! manifest and store failures abort a run.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use schemadex_core::change::ChangeSet;
use schemadex_core::checkpoint::{stable_manifest_hash, CheckpointTracker, Phase};
use schemadex_core::embedding::{embedding_input, EmbeddingRecord};
use schemadex_core::error::{RunIssue, Severity};
use schemadex_core::graph::{extract_edges, RelationshipSource, TableSource};
use schemadex_core::identity::{
    column_path, split_column_path, IdentityKey, IdentityResolver, Registration,
};
use schemadex_core::keywords;
use schemadex_core::models::{
    content_hash, DocType, Document, IndexMetadata, ParsedDocument, Relationship,
    RelationshipMetadata, TableMetadata, SCHEMA_VERSION,
};
use schemadex_core::parse::{parse_document, synthesize_columns};
use schemadex_core::store::{DocumentWrite, Store};

use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingGenerator};
use crate::loader::{load_manifest, read_source, LoadedManifest};
use crate::progress::{IndexProgressEvent, IndexProgressReporter};
use crate::sqlite_store::SqliteStore;
use crate::status;

/// Batch size for write grouping when no embedding generator is active.
const DEFAULT_WRITE_BATCH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Full,
    Incremental,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Full => "full",
            RunMode::Incremental => "incremental",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub mode: RunMode,
    /// Continue from a matching checkpoint instead of starting over.
    pub resume: bool,
    /// Stop after this many document writes, keeping the checkpoint.
    pub max_documents: Option<usize>,
    pub checkpoint_every: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::Full,
            resume: false,
            max_documents: None,
            checkpoint_every: 25,
        }
    }
}

/// Command-line switches of `schemadex index`.
#[derive(Debug, Clone)]
pub struct IndexFlags {
    pub mode: RunMode,
    pub resume: bool,
    pub dry_run: bool,
    pub skip_embeddings: bool,
    pub max_documents: Option<usize>,
}

/// CLI entry point: run (or preview) the pipeline against the SQLite store
/// and print the summary.
pub async fn run_index(
    config: &Config,
    manifest_path: &Path,
    flags: &IndexFlags,
    progress: &dyn IndexProgressReporter,
) -> Result<()> {
    let loaded = load_manifest(manifest_path)?;
    let store = SqliteStore::open(config).await?;

    if flags.dry_run {
        let report = status::preview(&store, &loaded, flags.mode).await?;
        report.print();
        store.close().await;
        return Ok(());
    }

    let embedder = if flags.skip_embeddings {
        info!("embeddings skipped; building a lexical-only index");
        None
    } else if !config.embedding.is_enabled() {
        info!("embedding provider disabled; building a lexical-only index");
        None
    } else {
        match create_provider(&config.embedding) {
            Ok(provider) => Some(Arc::new(EmbeddingGenerator::new(
                provider,
                &config.embedding,
            ))),
            Err(e) => {
                warn!("embedding provider unavailable, continuing lexical-only: {:#}", e);
                None
            }
        }
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping after the current document");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let options = IndexOptions {
        mode: flags.mode,
        resume: flags.resume,
        max_documents: flags.max_documents,
        checkpoint_every: config.indexer.checkpoint_every,
    };
    let summary = Indexer::new(&store, embedder, progress)
        .with_cancel(cancel)
        .run(&loaded, &options)
        .await?;
    summary.print();

    store.close().await;
    Ok(())
}

/// Outcome of one run. Partial success is normal: see `issues`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub database: String,
    pub mode: RunMode,
    pub new: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub written: usize,
    /// Paths a resumed run found already done.
    pub skipped_done: usize,
    pub embedded: usize,
    pub missing_vectors: i64,
    pub relationships: usize,
    pub relationships_rebuilt: bool,
    pub orphaned: usize,
    pub pruned_columns: usize,
    pub issues: Vec<RunIssue>,
    pub interrupted: bool,
    pub resumed: bool,
    pub degraded: bool,
}

impl RunSummary {
    fn new(database: &str, mode: RunMode) -> Self {
        Self {
            database: database.to_string(),
            mode,
            new: 0,
            changed: 0,
            unchanged: 0,
            deleted: 0,
            written: 0,
            skipped_done: 0,
            embedded: 0,
            missing_vectors: 0,
            relationships: 0,
            relationships_rebuilt: false,
            orphaned: 0,
            pruned_columns: 0,
            issues: Vec::new(),
            interrupted: false,
            resumed: false,
            degraded: false,
        }
    }

    fn record(&mut self, issue: RunIssue) {
        let path = issue.path.as_deref().unwrap_or("-");
        match issue.severity {
            Severity::Fatal | Severity::RecoverableError => {
                error!(path, "{}", issue.message)
            }
            Severity::RecoverableWarning => warn!(path, "{}", issue.message),
            Severity::Deferred => info!(path, "{}", issue.message),
        }
        self.issues.push(issue);
    }

    pub fn issues_of(&self, severity: Severity) -> impl Iterator<Item = &RunIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    pub fn print(&self) {
        println!("index {} ({})", self.database, self.mode.as_str());
        if self.resumed {
            println!("  resumed: {} already done", self.skipped_done);
        }
        println!("  new: {}", self.new);
        println!("  changed: {}", self.changed);
        println!("  unchanged: {}", self.unchanged);
        println!("  deleted: {}", self.deleted);
        println!("  documents written: {}", self.written);
        println!("  embedded: {}", self.embedded);
        println!("  missing vectors: {}", self.missing_vectors);
        if self.degraded {
            println!("  embeddings: degraded (lexical-only)");
        }
        println!(
            "  relationships: {}{}",
            self.relationships,
            if self.relationships_rebuilt { " (rebuilt)" } else { "" }
        );
        println!("  orphaned columns: {}", self.orphaned);
        if self.pruned_columns > 0 {
            println!("  pruned columns: {}", self.pruned_columns);
        }
        if !self.issues.is_empty() {
            println!("  issues: {}", self.issues.len());
            for issue in &self.issues {
                println!(
                    "    [{}] {}: {}",
                    issue.severity,
                    issue.path.as_deref().unwrap_or("-"),
                    issue.message
                );
            }
        }
        if self.interrupted {
            println!("interrupted (continue with --resume)");
        } else {
            println!("ok");
        }
    }
}

/// A parsed source document that passed identity registration.
struct ParsedSource {
    path: String,
    hash: String,
    mtime: Option<i64>,
    doc: ParsedDocument,
}

/// One document ready to write.
struct WorkItem {
    path: String,
    parent_path: Option<String>,
    parsed: ParsedDocument,
    hash: String,
    mtime: Option<i64>,
    keywords: Vec<String>,
}

type EmbeddingTask = JoinHandle<Vec<Option<Vec<f32>>>>;

pub struct Indexer<'a> {
    store: &'a dyn Store,
    embedder: Option<Arc<EmbeddingGenerator>>,
    progress: &'a dyn IndexProgressReporter,
    cancel: Arc<AtomicBool>,
}

impl<'a> Indexer<'a> {
    /// `embedder` is `None` for lexical-only runs (`--skip-embeddings`).
    pub fn new(
        store: &'a dyn Store,
        embedder: Option<Arc<EmbeddingGenerator>>,
        progress: &'a dyn IndexProgressReporter,
    ) -> Self {
        Self {
            store,
            embedder,
            progress,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag, set e.g. from a Ctrl-C handler.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(&self, loaded: &LoadedManifest, options: &IndexOptions) -> Result<RunSummary> {
        let manifest = &loaded.manifest;
        let database = manifest.database.as_str();
        let stable_hash = stable_manifest_hash(manifest);
        let mut summary = RunSummary::new(database, options.mode);

        let stored = self.store.list_sources(database).await?;
        let changes = match options.mode {
            RunMode::Full => ChangeSet::full(manifest, &stored),
            RunMode::Incremental => ChangeSet::classify(manifest, &stored),
        };
        summary.new = changes.new.len();
        summary.changed = changes.changed.len();
        summary.unchanged = changes.unchanged.len();
        summary.deleted = changes.deleted.len();

        let mut tracker = self
            .start_tracker(database, &stable_hash, options, &mut summary)
            .await?;
        info!(
            database,
            mode = options.mode.as_str(),
            new = summary.new,
            changed = summary.changed,
            unchanged = summary.unchanged,
            deleted = summary.deleted,
            "index run starting"
        );

        // Deletions always precede writes.
        self.enter(&mut tracker, Phase::Deleting, database).await?;
        for record in &changes.deleted {
            if !tracker.plan(&record.path) {
                continue;
            }
            let outcome = self.store.delete_document(&record.path).await?;
            debug!(
                path = %record.path,
                documents = outcome.documents,
                vectors = outcome.vectors,
                relationships = outcome.relationships,
                "deleted"
            );
            let due = tracker.mark_done(&record.path);
            self.persist_if(&tracker, due).await?;
        }

        self.enter(&mut tracker, Phase::Indexing, database).await?;
        let reindexed: HashSet<&str> = changes
            .to_index(manifest)
            .into_iter()
            .map(|e| e.path.as_str())
            .collect();
        let mut resolver = self.seed_resolver(database, &reindexed).await?;
        let parsed = self.parse_sources(loaded, &changes, &mut resolver, &mut tracker, &mut summary);
        let (items, column_sets) = order_work(parsed);

        let planned: Vec<WorkItem> = items
            .into_iter()
            .filter(|item| {
                if tracker.plan(&item.path) {
                    true
                } else {
                    summary.skipped_done += 1;
                    false
                }
            })
            .collect();
        self.store.save_checkpoint(&tracker.snapshot()).await?;

        self.write_all(planned, database, options, &mut tracker, &mut summary)
            .await?;

        if summary.interrupted {
            self.store.save_checkpoint(&tracker.snapshot()).await?;
            warn!(
                database,
                written = summary.written,
                pending = tracker.pending_count(),
                "index run interrupted; checkpoint saved"
            );
            return Ok(summary);
        }

        for (table_path, keep) in &column_sets {
            if tracker.is_done(table_path) {
                let removed = self.store.prune_columns(table_path, keep).await?;
                summary.pruned_columns += removed.len();
            }
        }

        let rebuild =
            options.mode == RunMode::Full || summary.resumed || changes.touches_tables();
        if rebuild {
            self.enter(&mut tracker, Phase::Relationships, database).await?;
            let edges = self.rebuild_relationships(database, &mut summary).await?;
            summary.relationships = edges.len();
            summary.relationships_rebuilt = true;
        } else {
            summary.relationships = self.store.list_relationships(database).await?.len();
        }

        self.enter(&mut tracker, Phase::Finalizing, database).await?;
        self.finalize(manifest.plan_hash.as_str(), &stable_hash, &mut summary)
            .await?;
        self.store.clear_checkpoint(database).await?;

        info!(
            database,
            written = summary.written,
            relationships = summary.relationships,
            issues = summary.issues.len(),
            degraded = summary.degraded,
            "index run complete"
        );
        Ok(summary)
    }

    async fn start_tracker(
        &self,
        database: &str,
        stable_hash: &str,
        options: &IndexOptions,
        summary: &mut RunSummary,
    ) -> Result<CheckpointTracker> {
        let existing = self.store.load_checkpoint(database).await?;
        match existing {
            Some(checkpoint) if options.resume => {
                match CheckpointTracker::resume(checkpoint, stable_hash, options.checkpoint_every) {
                    Some(tracker) => {
                        info!(
                            database,
                            done = tracker.done_count(),
                            pending = tracker.pending_count(),
                            failed = tracker.failed_count(),
                            "resuming from checkpoint"
                        );
                        summary.resumed = true;
                        return Ok(tracker);
                    }
                    None => {
                        summary.record(RunIssue::warning(
                            None,
                            "checkpoint does not match the manifest; starting over",
                        ));
                        self.store.clear_checkpoint(database).await?;
                    }
                }
            }
            Some(_) => {
                info!(database, "discarding previous checkpoint");
                self.store.clear_checkpoint(database).await?;
            }
            None if options.resume => {
                info!(database, "no checkpoint to resume; starting a new run")
            }
            None => {}
        }
        Ok(CheckpointTracker::new(
            database,
            stable_hash,
            options.checkpoint_every,
        ))
    }

    async fn enter(&self, tracker: &mut CheckpointTracker, phase: Phase, database: &str) -> Result<()> {
        tracker.set_phase(phase);
        self.progress.report(IndexProgressEvent::Phase {
            database: database.to_string(),
            phase,
        });
        self.store.save_checkpoint(&tracker.snapshot()).await
    }

    async fn persist_if(&self, tracker: &CheckpointTracker, due: bool) -> Result<()> {
        if due {
            self.store.save_checkpoint(&tracker.snapshot()).await?;
        }
        Ok(())
    }

    /// Identities of stored documents this run leaves alone, so unchanged
    /// documents still claim theirs. Paths being re-indexed (and their
    /// columns) start unclaimed: their stored identity may be stale.
    async fn seed_resolver(
        &self,
        database: &str,
        reindexed: &HashSet<&str>,
    ) -> Result<IdentityResolver> {
        let mut resolver = IdentityResolver::new();
        for doc in self.store.list_documents(database, None).await? {
            let owner = split_column_path(&doc.source_path)
                .map(|(table, _)| table)
                .unwrap_or(&doc.source_path);
            if reindexed.contains(owner) {
                continue;
            }
            if let Some(key) = IdentityKey::from_document(&doc) {
                resolver.register(key, &doc.source_path);
            }
        }
        Ok(resolver)
    }

    fn parse_sources(
        &self,
        loaded: &LoadedManifest,
        changes: &ChangeSet,
        resolver: &mut IdentityResolver,
        tracker: &mut CheckpointTracker,
        summary: &mut RunSummary,
    ) -> Vec<ParsedSource> {
        let database = loaded.manifest.database.as_str();
        let mut parsed = Vec::new();

        for entry in changes.to_index(&loaded.manifest) {
            let source = match read_source(loaded, entry) {
                Ok(source) => source,
                Err(e) => {
                    summary.record(RunIssue::error(&entry.path, format!("{:#}", e)));
                    tracker.mark_failed(&entry.path);
                    continue;
                }
            };
            if source.computed_hash != entry.content_hash {
                summary.record(RunIssue::deferred(
                    &entry.path,
                    "declared content hash does not match the file; storing the computed hash",
                ));
            }

            let doc = match parse_document(entry.doc_type, &source.text, database) {
                Ok(doc) => doc,
                Err(e) => {
                    summary.record(RunIssue::error(&entry.path, format!("parse failed: {}", e)));
                    tracker.mark_failed(&entry.path);
                    continue;
                }
            };
            if doc.database() != database {
                summary.record(RunIssue::error(
                    &entry.path,
                    format!(
                        "document belongs to database '{}', manifest is for '{}'",
                        doc.database(),
                        database
                    ),
                ));
                tracker.mark_failed(&entry.path);
                continue;
            }

            if let Some(key) = IdentityKey::of(&doc) {
                if let Registration::Duplicate { existing } = resolver.register(key, &entry.path) {
                    summary.record(RunIssue::warning(
                        Some(&entry.path),
                        format!("describes the same {} as {}; skipped", entry.doc_type, existing),
                    ));
                    tracker.mark_failed(&entry.path);
                    continue;
                }
            }

            parsed.push(ParsedSource {
                path: entry.path.clone(),
                hash: source.computed_hash,
                mtime: source.mtime,
                doc,
            });
        }
        parsed
    }

    async fn write_all(
        &self,
        items: Vec<WorkItem>,
        database: &str,
        options: &IndexOptions,
        tracker: &mut CheckpointTracker,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let total = items.len() as u64;
        let batch_size = self
            .embedder
            .as_ref()
            .map(|e| e.batch_size())
            .unwrap_or(DEFAULT_WRITE_BATCH);

        let mut batches: Vec<Vec<WorkItem>> = Vec::new();
        let mut iter = items.into_iter().peekable();
        while iter.peek().is_some() {
            batches.push(iter.by_ref().take(batch_size).collect());
        }
        let texts: Vec<Vec<String>> = batches
            .iter()
            .map(|batch| batch.iter().map(|i| embedding_input(&i.parsed)).collect())
            .collect();

        // The next batch is embedding while the current one is written.
        let mut in_flight = self.spawn_embedding(texts.first());
        'batches: for (index, batch) in batches.into_iter().enumerate() {
            let vectors = match in_flight.take() {
                Some(task) => task.await?,
                None => vec![None; batch.len()],
            };
            in_flight = self.spawn_embedding(texts.get(index + 1));

            for (item, vector) in batch.into_iter().zip(vectors) {
                if self.should_stop(options, summary.written) {
                    summary.interrupted = true;
                    break 'batches;
                }
                self.write(item, vector, tracker, summary).await?;
                self.progress.report(IndexProgressEvent::Writing {
                    database: database.to_string(),
                    n: summary.written as u64,
                    total,
                });
            }
        }
        if let Some(task) = in_flight {
            task.abort();
        }
        Ok(())
    }

    fn spawn_embedding(&self, texts: Option<&Vec<String>>) -> Option<EmbeddingTask> {
        let generator = self.embedder.clone()?;
        let texts = texts?.clone();
        Some(tokio::spawn(async move { generator.embed_batch(&texts).await }))
    }

    fn should_stop(&self, options: &IndexOptions, written: usize) -> bool {
        self.cancel.load(Ordering::SeqCst)
            || options.max_documents.is_some_and(|max| written >= max)
    }

    async fn write(
        &self,
        item: WorkItem,
        vector: Option<Vec<f32>>,
        tracker: &mut CheckpointTracker,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let embedding = match (vector, &self.embedder) {
            (Some(vector), Some(generator)) => Some(EmbeddingRecord {
                model: generator.model_name().to_string(),
                dims: vector.len(),
                vector,
            }),
            _ => None,
        };
        let has_vector = embedding.is_some();
        let document = Document::from_parsed(
            &item.parsed,
            &item.path,
            &item.hash,
            item.keywords,
            item.mtime,
        );
        let outcome = self
            .store
            .upsert_document(&DocumentWrite {
                document,
                parent_path: item.parent_path,
                embedding,
            })
            .await?;

        summary.written += 1;
        if has_vector {
            summary.embedded += 1;
        }
        if outcome.orphaned {
            summary.orphaned += 1;
            summary.record(RunIssue::warning(
                Some(&item.path),
                "parent table is not stored; column flagged orphaned",
            ));
        }
        debug!(path = %item.path, id = %outcome.id, "written");

        let due = tracker.mark_done(&item.path);
        self.persist_if(tracker, due).await
    }

    /// Recompute every edge of the database from stored table and
    /// relationship documents, and swap the stored edge set.
    async fn rebuild_relationships(
        &self,
        database: &str,
        summary: &mut RunSummary,
    ) -> Result<Vec<Relationship>> {
        let docs = self.store.list_documents(database, None).await?;
        let mut resolver = IdentityResolver::new();
        let mut tables = Vec::new();
        let mut relationships = Vec::new();

        for doc in &docs {
            if let Some(key) = IdentityKey::from_document(doc) {
                resolver.register(key, &doc.source_path);
            }
            match doc.doc_type {
                DocType::Table => {
                    let metadata = serde_json::from_str::<TableMetadata>(&doc.metadata_json);
                    match (doc.table_ref(), metadata) {
                        (Some(table), Ok(metadata)) => tables.push(TableSource {
                            path: doc.source_path.clone(),
                            table,
                            metadata,
                        }),
                        _ => summary.record(RunIssue::warning(
                            Some(&doc.source_path),
                            "stored table metadata is unreadable; foreign keys skipped",
                        )),
                    }
                }
                DocType::Relationship => {
                    match serde_json::from_str::<RelationshipMetadata>(&doc.metadata_json) {
                        Ok(metadata) => relationships.push(RelationshipSource {
                            path: doc.source_path.clone(),
                            metadata,
                        }),
                        Err(_) => summary.record(RunIssue::warning(
                            Some(&doc.source_path),
                            "stored relationship metadata is unreadable; skipped",
                        )),
                    }
                }
                _ => {}
            }
        }

        let (edges, issues) = extract_edges(database, &tables, &relationships, &resolver);
        for issue in issues {
            summary.record(issue);
        }
        self.store.replace_relationships(database, &edges).await?;
        info!(database, edges = edges.len(), "relationship graph rebuilt");
        Ok(edges)
    }

    async fn finalize(
        &self,
        plan_hash: &str,
        stable_hash: &str,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let database = summary.database.clone();
        let mut metadata = IndexMetadata::new(&database);
        metadata.schema_version = Some(SCHEMA_VERSION);
        metadata.last_run_at = Some(chrono::Utc::now().to_rfc3339());
        metadata.last_run_mode = Some(summary.mode.as_str().to_string());
        metadata.manifest_hash = Some(stable_hash.to_string());
        metadata.plan_hash = Some(plan_hash.to_string());
        for doc_type in DocType::ALL {
            let count = self.store.count_documents(&database, doc_type).await?;
            metadata.counts.insert(doc_type, count);
        }
        metadata.relationship_count = Some(summary.relationships as i64);

        let missing = self.store.count_missing_vectors(&database).await?;
        summary.missing_vectors = missing;
        summary.degraded = self
            .embedder
            .as_ref()
            .is_some_and(|generator| generator.is_degraded());
        if let Some(generator) = &self.embedder {
            metadata.embedding_model = Some(generator.model_name().to_string());
            metadata.embedding_dims = Some(generator.dims());
        }
        let complete = self.embedder.is_some() && !summary.degraded && missing == 0;
        metadata.embeddings_complete = Some(complete);
        metadata.embeddings_missing = Some(missing);
        if !complete {
            let reason = if self.embedder.is_none() {
                "embeddings skipped"
            } else if summary.degraded {
                "embedding service unavailable"
            } else {
                "embeddings incomplete"
            };
            summary.record(RunIssue::warning(
                None,
                format!(
                    "{}: {} documents without a vector, vector search is incomplete",
                    reason, missing
                ),
            ));
        }

        self.store.write_metadata(&metadata).await
    }
}

/// Arrange parsed documents in processing order (tables, domains,
/// overviews, relationships, then the columns synthesized from tables).
/// Also returns each table's full set of column paths.
fn order_work(parsed: Vec<ParsedSource>) -> (Vec<WorkItem>, Vec<(String, Vec<String>)>) {
    let mut by_type: HashMap<DocType, Vec<ParsedSource>> = HashMap::new();
    for source in parsed {
        by_type.entry(source.doc.doc_type()).or_default().push(source);
    }

    let mut items = Vec::new();
    let mut columns = Vec::new();
    let mut column_sets = Vec::new();
    for doc_type in DocType::PROCESSING_ORDER {
        if doc_type == DocType::Column {
            items.append(&mut columns);
            continue;
        }
        for source in by_type.remove(&doc_type).unwrap_or_default() {
            let keywords = match &source.doc {
                ParsedDocument::Table(table) => {
                    let table_keywords = keywords::extract_table(table);
                    let mut paths = Vec::new();
                    for column in synthesize_columns(table, &table_keywords) {
                        let path = column_path(&source.path, &column.column.name);
                        let doc = ParsedDocument::Column(column);
                        paths.push(path.clone());
                        columns.push(WorkItem {
                            path,
                            parent_path: Some(source.path.clone()),
                            hash: content_hash(&doc.common().content),
                            mtime: source.mtime,
                            keywords: keywords::extract(&doc),
                            parsed: doc,
                        });
                    }
                    column_sets.push((source.path.clone(), paths));
                    table_keywords.table
                }
                other => keywords::extract(other),
            };
            items.push(WorkItem {
                path: source.path,
                parent_path: None,
                parsed: source.doc,
                hash: source.hash,
                mtime: source.mtime,
                keywords,
            });
        }
    }
    (items, column_sets)
}
