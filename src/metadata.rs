//! Vector-record metadata: the typed schema and the sanitize boundary.
//!
//! The vector store only accepts primitive metadata values (string,
//! number, boolean, list of strings) and rejects nulls. [`ChunkMetadata`]
//! keeps the schema typed inside the crate; [`sanitize_metadata`] is the
//! single function every write path goes through before a map reaches
//! the store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable constant stamped into every record at indexing time.
pub const DOC_TYPE_LAW_DOCX: &str = "law_docx";
/// Version tag for the indexing/backfill schema.
pub const PIPELINE_VERSION: &str = "indexing-v1";
/// Extraction policy recorded by the backfill (first occurrence only).
pub const SPAN_POLICY_FIRST_MATCH: &str = "first_match";
/// Digest prefix length used inside vector IDs.
pub const SHA_PREFIX_LEN: usize = 12;

/// Content-addressed vector ID: `{source}::{sha256[:12]}::{chunk_index}`.
///
/// A pure function of (source, content digest, position) — unchanged
/// content reproduces identical IDs, changed content orphans the old
/// ones. The exact format is a compatibility contract with previously
/// indexed data and must not drift.
pub fn build_vector_id(source: &str, doc_sha: &str, chunk_index: usize) -> String {
    let prefix: String = doc_sha.chars().take(SHA_PREFIX_LEN).collect();
    format!("{}::{}::{}", source, prefix, chunk_index)
}

/// Metadata carried by one vector record.
///
/// The first group is written at indexing time; the rest is derived by
/// the backfill. Optional fields serialize only when present, and
/// [`sanitize_metadata`] drops whatever still serializes to null.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub doc_sha: String,
    #[serde(default)]
    pub chunk_index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<String>,
    /// Full chunk text; present only when configured. Drives snippet
    /// generation and backfill citation parsing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub law_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub law_short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_no: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clause_no: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_no: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_version: Option<String>,
}

impl ChunkMetadata {
    /// Serialize to a store-ready metadata map, passing through the
    /// sanitize boundary.
    pub fn to_store_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => sanitize_metadata(Value::Object(map)),
            _ => Map::new(),
        }
    }

    /// Deserialize leniently from a store metadata map. Unknown keys are
    /// ignored and missing optionals stay `None`.
    pub fn from_store_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

/// Reduce an arbitrary metadata value to what the store accepts.
///
/// Rules: drop nulls; pass booleans and numbers; trim strings and drop
/// empty ones; reduce lists to their non-empty string elements (drop the
/// key if nothing survives); drop every other composite. Non-object
/// input yields an empty map.
pub fn sanitize_metadata(metadata: Value) -> Map<String, Value> {
    let mut clean = Map::new();

    let Value::Object(entries) = metadata else {
        return clean;
    };

    for (key, value) in entries {
        match value {
            Value::Null => {}
            Value::Bool(b) => {
                clean.insert(key, Value::Bool(b));
            }
            Value::Number(n) => {
                clean.insert(key, Value::Number(n));
            }
            Value::String(s) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    clean.insert(key, Value::String(trimmed.to_string()));
                }
            }
            Value::Array(items) => {
                let strings: Vec<Value> = items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(s) => {
                            let trimmed = s.trim().to_string();
                            (!trimmed.is_empty()).then_some(Value::String(trimmed))
                        }
                        _ => None,
                    })
                    .collect();
                if !strings.is_empty() {
                    clean.insert(key, Value::Array(strings));
                }
            }
            Value::Object(_) => {}
        }
    }

    clean
}
