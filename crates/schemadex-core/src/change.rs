//! Incremental change classification.
//!
//! Manifest entries are compared against what the store holds for the same
//! database, by path and declared content hash. Only source documents take
//! part; synthetic column documents follow their table.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::manifest::{Manifest, ManifestEntry};
use crate::store::SourceRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub new: Vec<ManifestEntry>,
    pub changed: Vec<ManifestEntry>,
    pub unchanged: Vec<ManifestEntry>,
    pub deleted: Vec<SourceRecord>,
}

impl ChangeSet {
    pub fn classify(manifest: &Manifest, stored: &[SourceRecord]) -> Self {
        let by_path: HashMap<&str, &SourceRecord> =
            stored.iter().map(|s| (s.path.as_str(), s)).collect();

        let mut set = ChangeSet::default();
        for entry in &manifest.entries {
            match by_path.get(entry.path.as_str()) {
                None => set.new.push(entry.clone()),
                Some(existing)
                    if existing.content_hash == entry.content_hash
                        && existing.doc_type == entry.doc_type =>
                {
                    set.unchanged.push(entry.clone())
                }
                Some(_) => set.changed.push(entry.clone()),
            }
        }

        let listed: HashSet<&str> = manifest.entries.iter().map(|e| e.path.as_str()).collect();
        set.deleted = stored
            .iter()
            .filter(|s| !listed.contains(s.path.as_str()))
            .cloned()
            .collect();
        set.deleted.sort_by(|a, b| a.path.cmp(&b.path));
        set
    }

    /// Every manifest entry needs a write; unchanged ones count as changed.
    /// Stored paths that left the manifest are still deleted.
    pub fn full(manifest: &Manifest, stored: &[SourceRecord]) -> Self {
        let mut set = Self::classify(manifest, stored);
        let unchanged = std::mem::take(&mut set.unchanged);
        set.changed.extend(unchanged);
        set
    }

    /// Entries to parse and write, in manifest order.
    pub fn to_index<'a>(&self, manifest: &'a Manifest) -> Vec<&'a ManifestEntry> {
        let wanted: HashSet<&str> = self
            .new
            .iter()
            .chain(&self.changed)
            .map(|e| e.path.as_str())
            .collect();
        manifest
            .entries
            .iter()
            .filter(|e| wanted.contains(e.path.as_str()))
            .collect()
    }

    /// Whether any table-scoped document was added, changed or removed,
    /// which can change join paths anywhere in the database.
    pub fn touches_tables(&self) -> bool {
        self.new
            .iter()
            .chain(&self.changed)
            .any(|e| e.doc_type.is_table_scoped())
            || self.deleted.iter().any(|d| d.doc_type.is_table_scoped())
    }

    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }
}
