//! Citation metadata backfill.
//!
//! Maintenance pass over already-indexed vectors: reconstructs every
//! vector ID from the manifest, fetches the stored records, derives
//! citation metadata (law name plus 조/항/호 references parsed from the
//! stored chunk text), and writes the enriched metadata back without
//! touching vector values.
//!
//! Reference extraction uses a first-match policy: only the first
//! occurrence of each unit in a chunk is used, even when several appear.
//! The policy is recorded in every written record as `span_policy`.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::manifest;
use crate::metadata::{
    build_vector_id, sanitize_metadata, PIPELINE_VERSION, SPAN_POLICY_FIRST_MATCH,
};
use crate::store::{VectorRecord, VectorStore};

/// Law-reference lookup entry: maps a source filename to display names.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LawInfo {
    #[serde(default)]
    pub law_title: Option<String>,
    #[serde(default)]
    pub law_short: Option<String>,
}

/// Lookup table keyed by source filename (`law_map.json`).
pub type LawMap = BTreeMap<String, LawInfo>;

pub fn load_law_map(path: &Path) -> Result<LawMap> {
    if !path.exists() {
        warn!(path = %path.display(), "law map not found; falling back to source names");
        return Ok(LawMap::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read law map: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse law map: {}", path.display()))
}

/// Legal-unit references extracted from one chunk of statute text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LawRefs {
    pub article_no: Option<i64>,
    pub article_title: Option<String>,
    pub clause_no: Option<i64>,
    pub item_no: Option<i64>,
}

fn article_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Tolerates spacing variants: "제10조(지원대상)", "제 10 조 ( 지원대상 )"
    RE.get_or_init(|| Regex::new(r"제\s*(\d+)\s*조(?:\s*\(\s*([^)]+?)\s*\))?").unwrap())
}

fn clause_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"제\s*(\d+)\s*항").unwrap())
}

fn item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"제\s*(\d+)\s*호").unwrap())
}

/// Extract 조/항/호 references from chunk text, first match of each unit
/// only.
pub fn parse_law_refs(text: &str) -> LawRefs {
    let mut refs = LawRefs::default();
    if text.is_empty() {
        return refs;
    }

    if let Some(caps) = article_re().captures(text) {
        refs.article_no = caps[1].parse().ok();
        refs.article_title = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty());
    }
    if let Some(caps) = clause_re().captures(text) {
        refs.clause_no = caps[1].parse().ok();
    }
    if let Some(caps) = item_re().captures(text) {
        refs.item_no = caps[1].parse().ok();
    }

    refs
}

/// Compose the display citation: law short name plus whichever units were
/// found, e.g. `전세사기피해자법 제10조(지원대상) 제1항 제2호`. With no
/// unit matched the citation degrades to the short name alone.
pub fn build_citation(law_short: &str, refs: &LawRefs) -> String {
    let mut parts: Vec<String> = vec![law_short.to_string()];

    if let Some(article_no) = refs.article_no {
        match &refs.article_title {
            Some(title) => parts.push(format!("제{}조({})", article_no, title)),
            None => parts.push(format!("제{}조", article_no)),
        }
    }
    if let Some(clause_no) = refs.clause_no {
        parts.push(format!("제{}항", clause_no));
    }
    if let Some(item_no) = refs.item_no {
        parts.push(format!("제{}호", item_no));
    }

    parts.join(" ")
}

/// Options for one backfill run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackfillOptions {
    /// Count intended updates without writing.
    pub dry_run: bool,
}

/// Outcome of one backfill run.
#[derive(Debug, Default)]
pub struct BackfillReport {
    pub updated: usize,
    /// IDs reconstructed from the manifest but absent from the store.
    pub missing: usize,
    /// Manifest entries skipped for missing digest or zero chunk count.
    pub skipped_sources: usize,
}

/// Regenerate derived citation metadata for every indexed vector.
pub async fn run_backfill(
    config: &Config,
    store: &dyn VectorStore,
    opts: BackfillOptions,
) -> Result<BackfillReport> {
    let manifest = manifest::load(&config.corpus.manifest_path)?;
    let law_map = load_law_map(&config.corpus.law_map_path)?;

    let mut report = BackfillReport::default();

    // Reconstruct every vector ID from the manifest. The ID format is
    // shared with the indexing pipeline.
    let mut all_ids: Vec<String> = Vec::new();
    let mut id_to_source: HashMap<String, String> = HashMap::new();

    for (source, entry) in &manifest {
        if entry.sha256.is_empty() || entry.chunks == 0 {
            warn!(source = %source, "skipping manifest entry without digest or chunks");
            report.skipped_sources += 1;
            continue;
        }
        for i in 0..entry.chunks {
            let vid = build_vector_id(source, &entry.sha256, i);
            id_to_source.insert(vid.clone(), source.clone());
            all_ids.push(vid);
        }
    }

    if all_ids.is_empty() {
        info!("no vector ids generated from manifest");
        return Ok(report);
    }

    info!(
        total_ids = all_ids.len(),
        batch_size = config.store.backfill_batch_size,
        dry_run = opts.dry_run,
        "backfill start"
    );

    for batch in all_ids.chunks(config.store.backfill_batch_size) {
        let fetched = store.fetch(batch).await?;

        for vid in batch {
            let Some(record) = fetched.get(vid) else {
                report.missing += 1;
                continue;
            };

            let meta: Value = record
                .metadata
                .clone()
                .unwrap_or_else(|| Value::Object(Default::default()));

            let source = meta
                .get("source")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .or_else(|| id_to_source.get(vid).cloned())
                .unwrap_or_default();
            let text = meta.get("text").and_then(|v| v.as_str()).unwrap_or("");

            let law_info = law_map.get(&source).cloned().unwrap_or_default();
            let law_title = law_info.law_title.unwrap_or_else(|| source.clone());
            let law_short = law_info.law_short.unwrap_or_else(|| law_title.clone());

            let refs = parse_law_refs(text);
            let citation = build_citation(&law_short, &refs);

            let mut new_meta = meta
                .as_object()
                .cloned()
                .unwrap_or_default();
            new_meta.insert("law_title".into(), Value::String(law_title));
            new_meta.insert("law_short".into(), Value::String(law_short));
            new_meta.insert("citation".into(), Value::String(citation));
            new_meta.insert("article_no".into(), opt_int(refs.article_no));
            new_meta.insert(
                "article_title".into(),
                refs.article_title
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            );
            new_meta.insert("clause_no".into(), opt_int(refs.clause_no));
            new_meta.insert("item_no".into(), opt_int(refs.item_no));
            new_meta.insert(
                "span_policy".into(),
                Value::String(SPAN_POLICY_FIRST_MATCH.into()),
            );
            let pipeline_version = meta
                .get("pipeline_version")
                .and_then(|v| v.as_str())
                .unwrap_or(PIPELINE_VERSION)
                .to_string();
            new_meta.insert("pipeline_version".into(), Value::String(pipeline_version));

            // The store rejects nulls; this strip must precede any write.
            let new_meta = sanitize_metadata(Value::Object(new_meta));

            if opts.dry_run {
                report.updated += 1;
                continue;
            }

            let updated = store.update_metadata(vid, &new_meta).await?;
            if !updated {
                // Fall back to a full upsert reusing the fetched values.
                let Some(values) = record.values.clone() else {
                    bail!(
                        "metadata update unsupported and values missing for id={}; \
                         stale citation metadata would break source numbering",
                        vid
                    );
                };
                store
                    .upsert(&[VectorRecord {
                        id: vid.clone(),
                        values,
                        metadata: new_meta,
                    }])
                    .await?;
            }

            report.updated += 1;
        }
    }

    info!(
        updated = report.updated,
        missing = report.missing,
        "backfill done"
    );

    Ok(report)
}

fn opt_int(value: Option<i64>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_article_clause_item() {
        let refs = parse_law_refs("제10조(지원대상) 제1항 제2호 ...");
        assert_eq!(refs.article_no, Some(10));
        assert_eq!(refs.article_title.as_deref(), Some("지원대상"));
        assert_eq!(refs.clause_no, Some(1));
        assert_eq!(refs.item_no, Some(2));
    }

    #[test]
    fn test_parse_tolerates_spacing() {
        let refs = parse_law_refs("제 10 조 ( 지원대상 ) 본문");
        assert_eq!(refs.article_no, Some(10));
        assert_eq!(refs.article_title.as_deref(), Some("지원대상"));
    }

    #[test]
    fn test_parse_first_match_only() {
        let refs = parse_law_refs("제3조(정의) ... 제7조(적용례) 제2항");
        assert_eq!(refs.article_no, Some(3));
        assert_eq!(refs.article_title.as_deref(), Some("정의"));
        assert_eq!(refs.clause_no, Some(2));
    }

    #[test]
    fn test_parse_article_without_title() {
        let refs = parse_law_refs("제25조에 따라 지원한다");
        assert_eq!(refs.article_no, Some(25));
        assert_eq!(refs.article_title, None);
    }

    #[test]
    fn test_parse_empty_text() {
        assert_eq!(parse_law_refs(""), LawRefs::default());
    }

    #[test]
    fn test_citation_full() {
        let refs = LawRefs {
            article_no: Some(10),
            article_title: Some("지원대상".to_string()),
            clause_no: Some(1),
            item_no: Some(2),
        };
        assert_eq!(
            build_citation("전세사기피해자법", &refs),
            "전세사기피해자법 제10조(지원대상) 제1항 제2호"
        );
    }

    #[test]
    fn test_citation_degrades_to_short_name() {
        assert_eq!(
            build_citation("전세사기피해자법", &LawRefs::default()),
            "전세사기피해자법"
        );
    }

    #[test]
    fn test_citation_omits_absent_levels() {
        let refs = LawRefs {
            article_no: Some(12),
            article_title: None,
            clause_no: None,
            item_no: Some(3),
        };
        assert_eq!(
            build_citation("주택임대차보호법", &refs),
            "주택임대차보호법 제12조 제3호"
        );
    }
}
