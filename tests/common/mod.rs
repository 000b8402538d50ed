//! Shared fixtures: in-memory collaborator fakes and corpus helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use lawdex::completion::{CompletionClient, PromptMessage};
use lawdex::config::Config;
use lawdex::embedding::Embedder;
use lawdex::store::{FetchedVector, RetrievedMatch, VectorRecord, VectorStore};

/// In-memory vector store recording every interaction.
pub struct MockStore {
    pub records: Mutex<HashMap<String, (Vec<f32>, Map<String, Value>)>>,
    pub upsert_calls: AtomicUsize,
    pub delete_calls: Mutex<Vec<String>>,
    pub update_calls: AtomicUsize,
    /// When false, `update_metadata` reports the endpoint as unsupported.
    pub update_supported: bool,
    pub query_results: Mutex<Vec<RetrievedMatch>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            upsert_calls: AtomicUsize::new(0),
            delete_calls: Mutex::new(Vec::new()),
            update_calls: AtomicUsize::new(0),
            update_supported: true,
            query_results: Mutex::new(Vec::new()),
        }
    }

    pub fn without_update_support() -> Self {
        Self {
            update_supported: false,
            ..Self::new()
        }
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.records.lock().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn metadata_of(&self, id: &str) -> Option<Map<String, Value>> {
        self.records.lock().unwrap().get(id).map(|(_, m)| m.clone())
    }

    pub fn values_of(&self, id: &str) -> Option<Vec<f32>> {
        self.records.lock().unwrap().get(id).map(|(v, _)| v.clone())
    }

    pub fn seed(&self, id: &str, values: Vec<f32>, metadata: Value) {
        let Value::Object(map) = metadata else {
            panic!("seed metadata must be an object");
        };
        self.records
            .lock()
            .unwrap()
            .insert(id.to_string(), (values, map));
    }

    pub fn set_query_results(&self, matches: Vec<RetrievedMatch>) {
        *self.query_results.lock().unwrap() = matches;
    }
}

#[async_trait]
impl VectorStore for MockStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let mut map = self.records.lock().unwrap();
        for record in records {
            map.insert(
                record.id.clone(),
                (record.values.clone(), record.metadata.clone()),
            );
        }
        Ok(())
    }

    async fn delete_by_source(&self, source: &str) -> Result<()> {
        self.delete_calls.lock().unwrap().push(source.to_string());
        self.records.lock().unwrap().retain(|_, (_, meta)| {
            meta.get("source").and_then(|v| v.as_str()) != Some(source)
        });
        Ok(())
    }

    async fn fetch(&self, ids: &[String]) -> Result<HashMap<String, FetchedVector>> {
        let map = self.records.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| {
                map.get(id).map(|(values, meta)| {
                    (
                        id.clone(),
                        FetchedVector {
                            values: Some(values.clone()),
                            metadata: Some(Value::Object(meta.clone())),
                        },
                    )
                })
            })
            .collect())
    }

    async fn update_metadata(&self, id: &str, metadata: &Map<String, Value>) -> Result<bool> {
        if !self.update_supported {
            return Ok(false);
        }
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut map = self.records.lock().unwrap();
        match map.get_mut(id) {
            Some((_, meta)) => {
                *meta = metadata.clone();
                Ok(true)
            }
            None => bail!("unknown vector id: {}", id),
        }
    }

    async fn query(&self, _vector: &[f32], top_k: usize) -> Result<Vec<RetrievedMatch>> {
        let results = self.query_results.lock().unwrap();
        Ok(results.iter().take(top_k).cloned().collect())
    }
}

/// A fetch-only store variant that never returns vector values,
/// modelling a gateway that omits them.
pub struct ValuelessStore(pub MockStore);

#[async_trait]
impl VectorStore for ValuelessStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        self.0.upsert(records).await
    }

    async fn delete_by_source(&self, source: &str) -> Result<()> {
        self.0.delete_by_source(source).await
    }

    async fn fetch(&self, ids: &[String]) -> Result<HashMap<String, FetchedVector>> {
        let mut fetched = self.0.fetch(ids).await?;
        for record in fetched.values_mut() {
            record.values = None;
        }
        Ok(fetched)
    }

    async fn update_metadata(&self, id: &str, metadata: &Map<String, Value>) -> Result<bool> {
        self.0.update_metadata(id, metadata).await
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedMatch>> {
        self.0.query(vector, top_k).await
    }
}

/// Deterministic embedder counting batch calls.
pub struct MockEmbedder {
    pub calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| vec![t.chars().count() as f32, 1.0, 0.0])
            .collect())
    }
}

/// Canned completion recording the messages it was given.
pub struct MockCompletion {
    pub reply: String,
    pub last_messages: Mutex<Vec<PromptMessage>>,
}

impl MockCompletion {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn system_prompt(&self) -> String {
        self.last_messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    pub fn user_prompt(&self) -> String {
        self.last_messages
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for MockCompletion {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String> {
        *self.last_messages.lock().unwrap() = messages.to_vec();
        Ok(self.reply.clone())
    }
}

/// Minimal `.docx` container holding the given paragraphs.
pub fn make_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("word/document.xml", options).unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

/// Config rooted at a temp directory, with small chunks so short test
/// documents still split.
pub fn test_config(root: &Path) -> Config {
    let toml = format!(
        r#"
[corpus]
raw_docs_dir = "{root}/raw_docs"
manifest_path = "{root}/index_manifest.json"
law_map_path = "{root}/law_map.json"

[chunking]
chunk_size = 80
chunk_overlap = 10

[store]
index_host = "https://test.invalid"
upsert_batch_size = 2
backfill_batch_size = 2

[retrieval]
top_k = 5
"#,
        root = root.display()
    );
    toml::from_str(&toml).unwrap()
}
