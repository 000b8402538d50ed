//! Durable record of what has already been indexed.
//!
//! The manifest is a JSON object keyed by source filename; each entry
//! holds the content digest, chunk count, and timestamp of the last
//! successful indexing run for that document. Entries are replaced
//! wholesale on re-index and never partially updated. Entries for
//! documents that later disappear from the corpus are left in place —
//! cleanup is deliberately out of scope.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Per-source record of the last successful indexing run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Full content hash of the document bytes at indexing time.
    #[serde(alias = "sha")]
    pub sha256: String,
    pub indexed_at: String,
    pub chunks: usize,
}

/// Manifest map, ordered by source name for stable serialization.
pub type Manifest = BTreeMap<String, ManifestEntry>;

/// Load the manifest, returning an empty map when the file is absent.
pub fn load(path: &Path) -> Result<Manifest> {
    if !path.exists() {
        return Ok(Manifest::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))
}

/// Persist the manifest as pretty JSON, atomically (temp file + rename).
pub fn save(path: &Path, manifest: &Manifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let data = serde_json::to_string_pretty(manifest)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, data)
        .with_context(|| format!("Failed to write manifest: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to replace manifest: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = load(&dir.path().join("absent.json")).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index_manifest.json");

        let mut manifest = Manifest::new();
        manifest.insert(
            "law.docx".to_string(),
            ManifestEntry {
                sha256: "ab".repeat(32),
                indexed_at: "2025-03-01T00:00:00+00:00".to_string(),
                chunks: 12,
            },
        );
        save(&path, &manifest).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_legacy_sha_key_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.json");
        std::fs::write(
            &path,
            r#"{"old.docx": {"sha": "cafe", "indexed_at": "2024-01-01T00:00:00+00:00", "chunks": 3}}"#,
        )
        .unwrap();
        let manifest = load(&path).unwrap();
        assert_eq!(manifest["old.docx"].sha256, "cafe");
        assert_eq!(manifest["old.docx"].chunks, 3);
    }
}
