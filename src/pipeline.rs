//! Corpus indexing pipeline.
//!
//! Drives the full flow per document: digest → manifest comparison →
//! (delete stale vectors) → extract → clean → chunk → embed → batched
//! upsert → manifest replacement. Documents are processed in
//! sorted-by-name order; one document's failure never aborts the run.
//!
//! The unchanged-document skip is the primary cost-control mechanism:
//! matching digests mean zero embed calls and zero store writes.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::Embedder;
use crate::extract::{blocks_to_text, light_clean, load_docx};
use crate::manifest::{self, Manifest, ManifestEntry};
use crate::metadata::{build_vector_id, ChunkMetadata, DOC_TYPE_LAW_DOCX};
use crate::store::{VectorRecord, VectorStore};

/// Options for one pipeline run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Suppress all mutating store calls (delete, upsert).
    pub dry_run: bool,
}

/// Outcome of one pipeline run. Failures are also logged per document;
/// the report makes them visible to callers without scraping logs.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped: usize,
    pub no_chunks: usize,
    pub failed: Vec<(String, String)>,
}

/// Index every `.docx` document in the corpus directory.
pub async fn run_index(
    config: &Config,
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    opts: IndexOptions,
) -> Result<IndexReport> {
    let raw_dir = &config.corpus.raw_docs_dir;
    if !raw_dir.exists() {
        bail!("Corpus directory not found: {}", raw_dir.display());
    }

    let mut manifest = manifest::load(&config.corpus.manifest_path)?;
    let doc_paths = list_corpus(raw_dir)?;
    info!(count = doc_paths.len(), dir = %raw_dir.display(), "corpus scan");

    if opts.dry_run {
        info!("dry run: no store writes will be issued");
    }

    let mut report = IndexReport::default();

    for path in &doc_paths {
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        match process_one_doc(config, store, embedder, opts, &mut manifest, path, &source).await {
            Ok(DocOutcome::Indexed) => report.indexed += 1,
            Ok(DocOutcome::Skipped) => report.skipped += 1,
            Ok(DocOutcome::NoChunks) => report.no_chunks += 1,
            Err(e) => {
                warn!(source = %source, error = %e, "document failed; continuing");
                report.failed.push((source, format!("{:#}", e)));
            }
        }
    }

    if opts.dry_run && !config.indexing.save_manifest_on_dry_run {
        info!("dry run: manifest save skipped");
    } else {
        manifest::save(&config.corpus.manifest_path, &manifest)?;
        info!(path = %config.corpus.manifest_path.display(), "manifest saved");
    }

    Ok(report)
}

enum DocOutcome {
    Indexed,
    Skipped,
    NoChunks,
}

#[allow(clippy::too_many_arguments)]
async fn process_one_doc(
    config: &Config,
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    opts: IndexOptions,
    manifest: &mut Manifest,
    path: &Path,
    source: &str,
) -> Result<DocOutcome> {
    let doc_sha = file_sha256(path)?;

    let prev = manifest.get(source);
    if prev.is_some_and(|entry| entry.sha256 == doc_sha) {
        info!(source = %source, "skip unchanged");
        return Ok(DocOutcome::Skipped);
    }

    // Content changed: old vector IDs carry the old digest prefix and
    // would otherwise linger forever, so delete by source first.
    if prev.is_some() {
        if opts.dry_run {
            info!(source = %source, "dry run: skip delete_by_source");
        } else {
            info!(source = %source, "deleting old vectors by source");
            store.delete_by_source(source).await?;
        }
    }

    let blocks = load_docx(path)?;
    let text = light_clean(&blocks_to_text(&blocks));

    let chunks = chunk_text(
        &text,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    );
    if chunks.is_empty() {
        warn!(source = %source, "no chunks after processing; manifest untouched");
        return Ok(DocOutcome::NoChunks);
    }

    info!(source = %source, chunks = chunks.len(), "embedding");
    let embeddings = embedder.embed(&chunks).await?;
    if embeddings.len() != chunks.len() {
        bail!(
            "embedding count mismatch for {}: {} chunks, {} vectors",
            source,
            chunks.len(),
            embeddings.len()
        );
    }

    let indexed_at = chrono::Utc::now().to_rfc3339();

    let mut batch: Vec<VectorRecord> = Vec::with_capacity(config.store.upsert_batch_size);
    for (i, (chunk, values)) in chunks.iter().zip(embeddings.into_iter()).enumerate() {
        let meta = ChunkMetadata {
            source: source.to_string(),
            doc_sha: doc_sha.clone(),
            chunk_index: i as i64,
            doc_type: Some(DOC_TYPE_LAW_DOCX.to_string()),
            indexed_at: Some(indexed_at.clone()),
            text: config
                .store
                .store_text_in_metadata
                .then(|| chunk.clone()),
            ..Default::default()
        };

        batch.push(VectorRecord {
            id: build_vector_id(source, &doc_sha, i),
            values,
            metadata: meta.to_store_map(),
        });

        if batch.len() >= config.store.upsert_batch_size {
            flush_batch(store, source, &mut batch, opts.dry_run).await?;
        }
    }
    flush_batch(store, source, &mut batch, opts.dry_run).await?;

    manifest.insert(
        source.to_string(),
        ManifestEntry {
            sha256: doc_sha.clone(),
            indexed_at,
            chunks: chunks.len(),
        },
    );
    info!(source = %source, sha = %&doc_sha[..12.min(doc_sha.len())], "done");

    Ok(DocOutcome::Indexed)
}

async fn flush_batch(
    store: &dyn VectorStore,
    source: &str,
    batch: &mut Vec<VectorRecord>,
    dry_run: bool,
) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    if dry_run {
        info!(source = %source, size = batch.len(), "dry run: skip upsert batch");
    } else {
        store
            .upsert(batch)
            .await
            .with_context(|| format!("upsert failed for {}", source))?;
    }
    batch.clear();
    Ok(())
}

/// Corpus listing: `.docx` files sorted by name for a stable processing
/// order across runs.
fn list_corpus(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read corpus dir: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("docx"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    Ok(sha256_bytes(&bytes))
}
