//! Manifest and source file loading.
//!
//! Manifest problems are fatal. A missing or unreadable source file is
//! reported by [`read_source`] and handled by the caller as a per-document
//! error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use schemadex_core::manifest::{Manifest, ManifestEntry};
use schemadex_core::models::content_hash;

/// A validated manifest together with the directory its paths are relative to.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub manifest: Manifest,
    pub root: PathBuf,
}

/// Raw text of one source document.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub text: String,
    /// SHA-256 of `text`, which may differ from the declared hash.
    pub computed_hash: String,
    /// Modification time, unix seconds.
    pub mtime: Option<i64>,
}

pub fn load_manifest(path: &Path) -> Result<LoadedManifest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    let manifest = Manifest::from_json(&text)
        .with_context(|| format!("Invalid manifest: {}", path.display()))?;
    let root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(LoadedManifest { manifest, root })
}

impl LoadedManifest {
    pub fn resolve(&self, entry: &ManifestEntry) -> PathBuf {
        self.root.join(&entry.path)
    }
}

pub fn read_source(loaded: &LoadedManifest, entry: &ManifestEntry) -> Result<SourceFile> {
    let path = loaded.resolve(entry);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mtime = std::fs::metadata(&path)
        .and_then(|m| m.modified())
        .ok()
        .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp());
    Ok(SourceFile {
        computed_hash: content_hash(&text),
        text,
        mtime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemadex_core::models::DocType;
    use tempfile::TempDir;

    #[test]
    fn loads_relative_to_manifest_dir() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("tables")).unwrap();
        std::fs::write(tmp.path().join("tables/orders.md"), "# Table: orders\n").unwrap();
        let manifest = serde_json::json!({
            "version": 1,
            "database": "shop",
            "plan_hash": "p1",
            "entries": [
                { "type": "table", "path": "tables/orders.md", "content_hash": content_hash("# Table: orders\n") },
                { "type": "table", "path": "tables/missing.md", "content_hash": "x" }
            ]
        });
        let manifest_path = tmp.path().join("manifest.json");
        std::fs::write(&manifest_path, manifest.to_string()).unwrap();

        let loaded = load_manifest(&manifest_path).unwrap();
        assert_eq!(loaded.manifest.database, "shop");
        let entries: Vec<_> = loaded.manifest.entries_of(DocType::Table).cloned().collect();
        let source = read_source(&loaded, &entries[0]).unwrap();
        assert_eq!(source.computed_hash, entries[0].content_hash);
        assert!(source.mtime.is_some());
        assert!(read_source(&loaded, &entries[1]).is_err());
    }

    #[test]
    fn invalid_manifest_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("manifest.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_manifest(&path).is_err());
        assert!(load_manifest(&tmp.path().join("absent.json")).is_err());
    }
}
