//! Manifest parsing and validation.
//!
//! The manifest is produced upstream and lists every documentation file to
//! index, with its declared type and content hash. Validation problems are
//! fatal: a run never starts from a manifest it cannot trust.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::ManifestError;
use crate::models::DocType;

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "default_version")]
    pub version: u32,
    pub database: String,
    pub plan_hash: String,
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

fn default_version() -> u32 {
    MANIFEST_VERSION
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(rename = "type")]
    pub doc_type: DocType,
    pub path: String,
    pub content_hash: String,
}

impl Manifest {
    /// Parse and validate manifest JSON.
    pub fn from_json(text: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.version != MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion(self.version));
        }
        if self.database.trim().is_empty() {
            return Err(ManifestError::EmptyField("database"));
        }
        if self.plan_hash.trim().is_empty() {
            return Err(ManifestError::EmptyField("plan_hash"));
        }

        let mut seen = HashSet::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let invalid = |reason: &str| ManifestError::InvalidEntry {
                index,
                reason: reason.to_string(),
            };
            if entry.path.trim().is_empty() {
                return Err(invalid("path is empty"));
            }
            if entry.path.contains('#') {
                return Err(invalid("path must not contain '#'"));
            }
            if entry.content_hash.trim().is_empty() {
                return Err(invalid("content_hash is empty"));
            }
            if entry.doc_type == DocType::Column {
                return Err(invalid(
                    "column entries are not accepted; columns come from table documents",
                ));
            }
            if !seen.insert(entry.path.as_str()) {
                return Err(ManifestError::DuplicatePath(entry.path.clone()));
            }
        }
        Ok(())
    }

    pub fn entry(&self, path: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Entries of one type, in manifest order.
    pub fn entries_of(&self, doc_type: DocType) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(move |e| e.doc_type == doc_type)
    }
}
