//! Question-time retrieval.

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::embedding::Embedder;
use crate::store::{RetrievedMatch, VectorStore};

/// Long-lived retrieval service: embeds a question and queries the
/// vector index. Constructed once at startup and injected wherever
/// retrieval is needed; holds no request-scoped state.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, top_k: usize) -> Self {
        Self {
            embedder,
            store,
            top_k,
        }
    }

    /// Top-k matches for a question, ranked by the store, metadata
    /// included.
    pub async fn top_matches(&self, question: &str) -> Result<Vec<RetrievedMatch>> {
        let query_vec = self.embedder.embed_query(question).await?;
        let matches = self.store.query(&query_vec, self.top_k).await?;
        debug!(count = matches.len(), top_k = self.top_k, "retrieved matches");
        Ok(matches)
    }
}
