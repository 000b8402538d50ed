//! End-to-end indexing pipeline behavior against in-memory fakes.

mod common;

use common::{make_docx, test_config, MockEmbedder, MockStore};

use lawdex::manifest;
use lawdex::pipeline::{file_sha256, run_index, IndexOptions};

fn setup_corpus(root: &std::path::Path, docs: &[(&str, &[&str])]) {
    let raw = root.join("raw_docs");
    std::fs::create_dir_all(&raw).unwrap();
    for (name, paragraphs) in docs {
        std::fs::write(raw.join(name), make_docx(paragraphs)).unwrap();
    }
}

#[tokio::test]
async fn test_first_index_writes_content_addressed_ids() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    setup_corpus(
        tmp.path(),
        &[(
            "law.docx",
            &["제1조(목적) 이 법은 전세사기피해자를 지원한다.", "제2조(정의) 용어의 뜻은 다음과 같다."],
        )],
    );

    let store = MockStore::new();
    let embedder = MockEmbedder::new();

    let report = run_index(&config, &store, &embedder, IndexOptions::default())
        .await
        .unwrap();

    assert_eq!(report.indexed, 1);
    assert!(report.failed.is_empty());

    let sha = file_sha256(&tmp.path().join("raw_docs/law.docx")).unwrap();
    let ids = store.ids();
    assert!(!ids.is_empty());
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(*id, format!("law.docx::{}::{}", &sha[..12], i));
    }

    let m = manifest::load(&config.corpus.manifest_path).unwrap();
    assert_eq!(m["law.docx"].sha256, sha);
    assert_eq!(m["law.docx"].chunks, ids.len());
}

#[tokio::test]
async fn test_reindex_unchanged_is_skipped_entirely() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    setup_corpus(tmp.path(), &[("law.docx", &["제1조(목적) 본문입니다."])]);

    let store = MockStore::new();
    let embedder = MockEmbedder::new();

    run_index(&config, &store, &embedder, IndexOptions::default())
        .await
        .unwrap();
    let embed_calls_after_first = embedder.call_count();
    let upserts_after_first = store.upsert_calls.load(std::sync::atomic::Ordering::SeqCst);
    let manifest_before = manifest::load(&config.corpus.manifest_path).unwrap();

    let report = run_index(&config, &store, &embedder, IndexOptions::default())
        .await
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.indexed, 0);
    // Zero embed calls and zero store writes on the second run.
    assert_eq!(embedder.call_count(), embed_calls_after_first);
    assert_eq!(
        store.upsert_calls.load(std::sync::atomic::Ordering::SeqCst),
        upserts_after_first
    );
    assert!(store.delete_calls.lock().unwrap().is_empty());
    assert_eq!(
        manifest::load(&config.corpus.manifest_path).unwrap(),
        manifest_before
    );
}

#[tokio::test]
async fn test_indexing_twice_produces_no_duplicate_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    setup_corpus(tmp.path(), &[("law.docx", &["제1조(목적) 본문입니다."])]);

    let store = MockStore::new();
    let embedder = MockEmbedder::new();

    run_index(&config, &store, &embedder, IndexOptions::default())
        .await
        .unwrap();
    let ids_first = store.ids();

    // Force a re-run with a cleared manifest: identical content must
    // reproduce identical IDs, so upserts overwrite instead of piling up.
    std::fs::remove_file(&config.corpus.manifest_path).unwrap();
    run_index(&config, &store, &embedder, IndexOptions::default())
        .await
        .unwrap();

    assert_eq!(store.ids(), ids_first);
}

#[tokio::test]
async fn test_changed_content_deletes_old_vectors_first() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    setup_corpus(tmp.path(), &[("law.docx", &["제1조(목적) 첫번째 판."])]);

    let store = MockStore::new();
    let embedder = MockEmbedder::new();

    run_index(&config, &store, &embedder, IndexOptions::default())
        .await
        .unwrap();
    let old_sha = file_sha256(&tmp.path().join("raw_docs/law.docx")).unwrap();

    // One byte of change → new digest → new ID prefix.
    std::fs::write(
        tmp.path().join("raw_docs/law.docx"),
        make_docx(&["제1조(목적) 두번째 판."]),
    )
    .unwrap();
    let new_sha = file_sha256(&tmp.path().join("raw_docs/law.docx")).unwrap();
    assert_ne!(old_sha, new_sha);

    run_index(&config, &store, &embedder, IndexOptions::default())
        .await
        .unwrap();

    assert_eq!(
        store.delete_calls.lock().unwrap().as_slice(),
        ["law.docx".to_string()]
    );
    for id in store.ids() {
        assert!(
            id.starts_with(&format!("law.docx::{}", &new_sha[..12])),
            "stale id survived: {}",
            id
        );
    }
    let m = manifest::load(&config.corpus.manifest_path).unwrap();
    assert_eq!(m["law.docx"].sha256, new_sha);
}

#[tokio::test]
async fn test_dry_run_suppresses_store_writes() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    setup_corpus(tmp.path(), &[("law.docx", &["제1조(목적) 본문입니다."])]);

    let store = MockStore::new();
    let embedder = MockEmbedder::new();

    run_index(&config, &store, &embedder, IndexOptions { dry_run: true })
        .await
        .unwrap();

    assert_eq!(store.upsert_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert!(store.delete_calls.lock().unwrap().is_empty());
    assert!(store.ids().is_empty());
}

#[tokio::test]
async fn test_dry_run_can_skip_manifest_save() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = test_config(tmp.path());
    config.indexing.save_manifest_on_dry_run = false;
    setup_corpus(tmp.path(), &[("law.docx", &["제1조(목적) 본문입니다."])]);

    let store = MockStore::new();
    let embedder = MockEmbedder::new();

    run_index(&config, &store, &embedder, IndexOptions { dry_run: true })
        .await
        .unwrap();

    assert!(!config.corpus.manifest_path.exists());
}

#[tokio::test]
async fn test_one_document_failure_does_not_abort_run() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    setup_corpus(tmp.path(), &[("b_ok.docx", &["제1조(목적) 본문입니다."])]);
    // Sorts before b_ok.docx and is not a valid container.
    std::fs::write(tmp.path().join("raw_docs/a_broken.docx"), b"not a zip").unwrap();

    let store = MockStore::new();
    let embedder = MockEmbedder::new();

    let report = run_index(&config, &store, &embedder, IndexOptions::default())
        .await
        .unwrap();

    assert_eq!(report.indexed, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "a_broken.docx");
    assert!(!store.ids().is_empty());

    let m = manifest::load(&config.corpus.manifest_path).unwrap();
    assert!(m.contains_key("b_ok.docx"));
    assert!(!m.contains_key("a_broken.docx"));
}

#[tokio::test]
async fn test_upserts_respect_batch_size() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    // Long enough to produce several chunks at chunk_size 80.
    let body = "제1조(목적) 이 법은 전세사기피해자 지원을 목적으로 한다. ".repeat(20);
    setup_corpus(tmp.path(), &[("law.docx", &[body.as_str()])]);

    let store = MockStore::new();
    let embedder = MockEmbedder::new();

    run_index(&config, &store, &embedder, IndexOptions::default())
        .await
        .unwrap();

    let chunks = store.ids().len();
    assert!(chunks > 2, "expected several chunks, got {}", chunks);
    // One batched embed call per document, multiple bounded upserts.
    assert_eq!(embedder.call_count(), 1);
    let upserts = store.upsert_calls.load(std::sync::atomic::Ordering::SeqCst);
    assert_eq!(upserts, chunks.div_ceil(config.store.upsert_batch_size));
}
