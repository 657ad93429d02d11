//! Run checkpoints for interrupting and resuming long index runs.
//!
//! A [`Checkpoint`] is an immutable snapshot. The pipeline mutates a
//! [`CheckpointTracker`] and hands out a fresh snapshot each time it
//! persists, so the store only ever holds a complete checkpoint.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::manifest::Manifest;

/// Deterministic digest of a manifest: the sorted `(path, hash)` pairs plus
/// the upstream plan hash. Independent of entry order.
pub fn stable_manifest_hash(manifest: &Manifest) -> String {
    let mut pairs: Vec<(&str, &str)> = manifest
        .entries
        .iter()
        .map(|e| (e.path.as_str(), e.content_hash.as_str()))
        .collect();
    pairs.sort_unstable();

    let mut hasher = Sha256::new();
    for (path, hash) in pairs {
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update(hash.as_bytes());
        hasher.update(b"\n");
    }
    hasher.update(b"plan\0");
    hasher.update(manifest.plan_hash.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Deleting,
    Indexing,
    Relationships,
    Finalizing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Deleting => "deleting",
            Phase::Indexing => "indexing",
            Phase::Relationships => "relationships",
            Phase::Finalizing => "finalizing",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub database: String,
    pub stable_hash: String,
    pub phase: Phase,
    pub done: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub pending: BTreeSet<String>,
}

impl Checkpoint {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn matches(&self, stable_hash: &str) -> bool {
        self.stable_hash == stable_hash
    }
}

/// Mutable run progress. Every path is in at most one of the three sets.
#[derive(Debug, Clone)]
pub struct CheckpointTracker {
    database: String,
    stable_hash: String,
    phase: Phase,
    done: BTreeSet<String>,
    failed: BTreeSet<String>,
    pending: BTreeSet<String>,
    every: usize,
    since_persist: usize,
}

impl CheckpointTracker {
    pub fn new(database: &str, stable_hash: &str, every: usize) -> Self {
        Self {
            database: database.to_string(),
            stable_hash: stable_hash.to_string(),
            phase: Phase::Deleting,
            done: BTreeSet::new(),
            failed: BTreeSet::new(),
            pending: BTreeSet::new(),
            every: every.max(1),
            since_persist: 0,
        }
    }

    /// Continue from a stored checkpoint. Returns `None` when the manifest
    /// changed since it was written, in which case it must be discarded.
    pub fn resume(checkpoint: Checkpoint, stable_hash: &str, every: usize) -> Option<Self> {
        if !checkpoint.matches(stable_hash) {
            return None;
        }
        Some(Self {
            database: checkpoint.database,
            stable_hash: checkpoint.stable_hash,
            phase: checkpoint.phase,
            done: checkpoint.done,
            failed: checkpoint.failed,
            pending: checkpoint.pending,
            every: every.max(1),
            since_persist: 0,
        })
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Queue a path for this run. Returns false for paths already done.
    pub fn plan(&mut self, path: &str) -> bool {
        if self.done.contains(path) {
            return false;
        }
        self.failed.remove(path);
        self.pending.insert(path.to_string());
        true
    }

    pub fn is_done(&self, path: &str) -> bool {
        self.done.contains(path)
    }

    /// Record a finished path. Returns true when a periodic persist is due.
    pub fn mark_done(&mut self, path: &str) -> bool {
        self.pending.remove(path);
        self.failed.remove(path);
        self.done.insert(path.to_string());
        self.tick()
    }

    pub fn mark_failed(&mut self, path: &str) -> bool {
        self.pending.remove(path);
        self.done.remove(path);
        self.failed.insert(path.to_string());
        self.tick()
    }

    fn tick(&mut self) -> bool {
        self.since_persist += 1;
        if self.since_persist >= self.every {
            self.since_persist = 0;
            true
        } else {
            false
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn done_count(&self) -> usize {
        self.done.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn snapshot(&self) -> Checkpoint {
        Checkpoint {
            database: self.database.clone(),
            stable_hash: self.stable_hash.clone(),
            phase: self.phase,
            done: self.done.clone(),
            failed: self.failed.clone(),
            pending: self.pending.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestEntry;
    use crate::models::DocType;

    fn manifest(order: &[(&str, &str)], plan: &str) -> Manifest {
        Manifest {
            version: 1,
            database: "shop".to_string(),
            plan_hash: plan.to_string(),
            entries: order
                .iter()
                .map(|(p, h)| ManifestEntry {
                    doc_type: DocType::Table,
                    path: p.to_string(),
                    content_hash: h.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn stable_hash_ignores_entry_order() {
        let a = manifest(&[("a.md", "1"), ("b.md", "2")], "p");
        let b = manifest(&[("b.md", "2"), ("a.md", "1")], "p");
        assert_eq!(stable_manifest_hash(&a), stable_manifest_hash(&b));
    }

    #[test]
    fn stable_hash_tracks_content_and_plan() {
        let base = manifest(&[("a.md", "1")], "p");
        assert_ne!(
            stable_manifest_hash(&base),
            stable_manifest_hash(&manifest(&[("a.md", "2")], "p"))
        );
        assert_ne!(
            stable_manifest_hash(&base),
            stable_manifest_hash(&manifest(&[("a.md", "1")], "q"))
        );
        // Field boundaries are unambiguous.
        assert_ne!(
            stable_manifest_hash(&manifest(&[("ab", "c")], "p")),
            stable_manifest_hash(&manifest(&[("a", "bc")], "p"))
        );
    }

    #[test]
    fn sets_stay_disjoint() {
        let mut t = CheckpointTracker::new("shop", "h", 100);
        assert!(t.plan("a"));
        assert!(t.plan("b"));
        t.mark_done("a");
        t.mark_failed("b");
        let s = t.snapshot();
        assert_eq!(s.done.len(), 1);
        assert_eq!(s.failed.len(), 1);
        assert!(s.pending.is_empty());
        assert!(!t.plan("a"));
        assert!(t.plan("b"));
        assert_eq!(t.failed_count(), 0);
        assert_eq!(t.pending_count(), 1);
    }

    #[test]
    fn persist_is_due_every_n() {
        let mut t = CheckpointTracker::new("shop", "h", 2);
        assert!(!t.mark_done("a"));
        assert!(t.mark_done("b"));
        assert!(!t.mark_failed("c"));
        assert!(t.mark_done("d"));
    }

    #[test]
    fn resume_requires_matching_hash() {
        let mut t = CheckpointTracker::new("shop", "h1", 10);
        t.set_phase(Phase::Indexing);
        t.plan("a");
        t.plan("b");
        t.mark_done("a");
        let snap = t.snapshot();
        let json = snap.to_json();
        let restored = Checkpoint::from_json(&json).unwrap();
        assert_eq!(restored, snap);

        assert!(CheckpointTracker::resume(restored.clone(), "h2", 10).is_none());
        let resumed = CheckpointTracker::resume(restored, "h1", 10).unwrap();
        assert!(resumed.is_done("a"));
        assert!(!resumed.is_done("b"));
        assert_eq!(resumed.phase(), Phase::Indexing);
    }
}
