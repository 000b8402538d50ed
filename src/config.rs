use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_raw_docs_dir")]
    pub raw_docs_dir: PathBuf,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,
    #[serde(default = "default_law_map_path")]
    pub law_map_path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            raw_docs_dir: default_raw_docs_dir(),
            manifest_path: default_manifest_path(),
            law_map_path: default_law_map_path(),
        }
    }
}

fn default_raw_docs_dir() -> PathBuf {
    PathBuf::from("data/raw_docs")
}
fn default_manifest_path() -> PathBuf {
    PathBuf::from("data/index_manifest.json")
}
fn default_law_map_path() -> PathBuf {
    PathBuf::from("data/law_map.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    800
}
fn default_chunk_overlap() -> usize {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Data-plane host of the vector index, e.g.
    /// `https://law-docs-abc123.svc.aped-4627-b74a.pinecone.io`.
    pub index_host: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
    #[serde(default = "default_backfill_batch_size")]
    pub backfill_batch_size: usize,
    #[serde(default = "default_store_text")]
    pub store_text_in_metadata: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_namespace() -> String {
    "law-docs".to_string()
}
fn default_upsert_batch_size() -> usize {
    50
}
fn default_backfill_batch_size() -> usize {
    50
}
fn default_store_text() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    #[serde(default = "default_save_manifest_on_dry_run")]
    pub save_manifest_on_dry_run: bool,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            save_manifest_on_dry_run: default_save_manifest_on_dry_run(),
        }
    }
}

fn default_save_manifest_on_dry_run() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            temperature: default_temperature(),
            history_limit: default_history_limit(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f64 {
    0.4
}
fn default_history_limit() -> usize {
    20
}
fn default_chat_timeout_secs() -> u64 {
    60
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate store: the index host is the one setting with no usable default.
    if config.store.index_host.trim().is_empty() {
        anyhow::bail!("store.index_host is required");
    }

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be smaller than chunking.chunk_size");
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.store.upsert_batch_size == 0 || config.store.backfill_batch_size == 0 {
        anyhow::bail!("store batch sizes must be >= 1");
    }

    Ok(config)
}
