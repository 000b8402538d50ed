//! Citation numbering and source-list construction.
//!
//! The central correctness property of the whole ask path lives here:
//! retrieved matches are deduplicated BEFORE reference numbers are
//! assigned, and the single numbering 1..N is shared verbatim between
//! the model-facing context block and the API-facing source list. For
//! every i, context reference i and `sources[i-1].id` describe the same
//! underlying passage.

use serde::Serialize;

use crate::store::RetrievedMatch;

/// Characters of stored chunk text surfaced as the snippet.
const SNIPPET_CHARS: usize = 240;

/// One entry of the API-facing source list. `id` equals the reference
/// number used in the model-facing context. Constructed fresh per
/// request, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    pub id: usize,
    pub source: String,
    pub chunk_id: String,
    pub page: Option<i64>,
    pub citation: String,
    pub law_title: Option<String>,
    pub law_short: Option<String>,
    pub article_no: Option<i64>,
    pub article_title: Option<String>,
    pub clause_no: Option<i64>,
    pub item_no: Option<i64>,
    pub snippet: String,
    pub doc_sha: String,
    pub chunk_index: i64,
    pub pipeline_version: Option<String>,
    pub span_policy: Option<String>,
    pub indexed_at: Option<String>,
}

/// Numbered context plus the source list sharing the same numbering.
#[derive(Debug, Clone)]
pub struct FormattedCitations {
    /// Model-facing block: each passage preceded by `[n] {citation}`.
    pub context: String,
    pub sources: Vec<SourceRecord>,
}

/// Deduplicate matches, assign reference numbers 1..N once, and build
/// both representations from that single numbering.
pub fn format_citations(matches: &[RetrievedMatch]) -> FormattedCitations {
    let deduped = dedupe_matches(matches);

    let mut context_blocks: Vec<String> = Vec::with_capacity(deduped.len());
    let mut sources: Vec<SourceRecord> = Vec::with_capacity(deduped.len());

    for (i, m) in deduped.iter().enumerate() {
        let id = i + 1;
        let meta = &m.metadata;

        let citation = display_citation(m);
        let text = meta.text.as_deref().unwrap_or("");

        context_blocks.push(format!("[{}] {}\n{}", id, citation, text));

        sources.push(SourceRecord {
            id,
            source: meta.source.clone(),
            chunk_id: m.id.clone(),
            page: None,
            citation,
            law_title: meta.law_title.clone(),
            law_short: meta.law_short.clone(),
            article_no: meta.article_no,
            article_title: meta.article_title.clone(),
            clause_no: meta.clause_no,
            item_no: meta.item_no,
            snippet: snippet(text),
            doc_sha: meta.doc_sha.clone(),
            chunk_index: meta.chunk_index,
            pipeline_version: meta.pipeline_version.clone(),
            span_policy: meta.span_policy.clone(),
            indexed_at: meta.indexed_at.clone(),
        });
    }

    FormattedCitations {
        context: context_blocks.join("\n\n"),
        sources,
    }
}

/// Drop duplicate matches, keeping the first (highest-ranked)
/// occurrence. Two matches are duplicates when they share an explicit
/// citation string, else the vector ID, else the (source, digest,
/// chunk_index) tuple.
fn dedupe_matches(matches: &[RetrievedMatch]) -> Vec<&RetrievedMatch> {
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(matches.len());

    for m in matches {
        let key = dedupe_key(m);
        if seen.insert(key) {
            out.push(m);
        }
    }

    out
}

fn dedupe_key(m: &RetrievedMatch) -> String {
    if let Some(citation) = m.metadata.citation.as_deref() {
        if !citation.is_empty() {
            return format!("c:{}", citation);
        }
    }
    if !m.id.is_empty() {
        return format!("i:{}", m.id);
    }
    format!(
        "t:{}:{}:{}",
        m.metadata.source, m.metadata.doc_sha, m.metadata.chunk_index
    )
}

/// Display title priority: citation → law short name + article → source.
fn display_citation(m: &RetrievedMatch) -> String {
    let meta = &m.metadata;

    if let Some(citation) = meta.citation.as_deref() {
        if !citation.is_empty() {
            return citation.to_string();
        }
    }

    let law = meta
        .law_short
        .as_deref()
        .or(meta.law_title.as_deref());
    if let (Some(law), Some(article_no)) = (law, meta.article_no) {
        return match meta.article_title.as_deref() {
            Some(title) => format!("{} 제{}조({})", law, article_no, title),
            None => format!("{} 제{}조", law, article_no),
        };
    }

    meta.source.clone()
}

fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_CHARS).collect()
}
