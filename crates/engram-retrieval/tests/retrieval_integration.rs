#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the engram-retrieval crate.
//!
//! Covers BM25 ranking behavior, stale-statistics rebuilds, corpus snapshot
//! round trips, embedding determinism and normalization, vocabulary
//! persistence through the file store, and failure surfacing.

use std::collections::HashSet;
use std::sync::Arc;

use tempfile::TempDir;

use engram_retrieval::{
    Bm25Config, Bm25Index, EmbeddingProvider, FileVocabularyStore, HashedEmbedding,
    InMemoryVocabularyStore, MemoryDocument, VocabularyStore,
};

// ---------------------------------------------------------------------------
// 1. BM25 ranking on a small corpus
// ---------------------------------------------------------------------------

#[test]
fn bm25_ranks_matching_document_only() {
    let mut index = Bm25Index::new();
    index.add_documents(vec![
        MemoryDocument::new("1", "the cat sat on the mat"),
        MemoryDocument::new("2", "the dog sat on the log"),
    ]);

    let results = index.search("cat", 10);
    assert_eq!(results.len(), 1, "only the cat document matches");
    assert_eq!(results[0].id, "1");
    assert!(results[0].score > 0.0, "matching document must score positive");
    assert_eq!(results[0].matched_terms, vec!["cat"]);

    let absent = results.iter().any(|r| r.id == "2");
    assert!(!absent, "the dog document must not appear for 'cat'");
}

#[test]
fn bm25_removal_empties_results() {
    let mut index = Bm25Index::new();
    index.add_documents(vec![
        MemoryDocument::new("1", "the cat sat on the mat"),
        MemoryDocument::new("2", "the dog sat on the log"),
    ]);

    assert!(index.remove_document("1"));
    assert!(
        index.search("cat", 10).is_empty(),
        "removing the only match must empty the result list"
    );
}

#[test]
fn bm25_higher_frequency_shorter_document_ranks_first() {
    let mut index = Bm25Index::new();
    index.add_document(MemoryDocument::new("dense", "retrieval retrieval core"));
    index.add_document(MemoryDocument::new(
        "sparse",
        "retrieval core engine index corpus statistics",
    ));
    index.build_index();

    let results = index.search("retrieval", 10);
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0].id, "dense",
        "higher term frequency in a shorter-than-average document must not rank lower"
    );
    assert!(results[0].score >= results[1].score);
}

// ---------------------------------------------------------------------------
// 2. Empty inputs
// ---------------------------------------------------------------------------

#[test]
fn empty_query_and_empty_corpus_return_empty() {
    let mut empty = Bm25Index::new();
    assert!(empty.search("anything", 10).is_empty(), "empty corpus yields no results");

    let mut index = Bm25Index::new();
    index.add_document(MemoryDocument::new("1", "some stored memory"));
    assert!(index.search("", 10).is_empty(), "empty query yields no results");
    assert!(
        index.search("the of a", 10).is_empty(),
        "query of only stop words tokenizes to nothing"
    );
}

// ---------------------------------------------------------------------------
// 3. Average document length over a growing corpus
// ---------------------------------------------------------------------------

#[test]
fn average_doc_length_is_exact_mean() {
    let mut index = Bm25Index::new();
    for i in 1..=100usize {
        let text = vec!["mem"; i].join(" ");
        index.add_document(MemoryDocument::new(format!("doc-{i}"), text));
    }
    index.build_index();

    // Mean of 1..=100.
    assert_eq!(index.average_doc_length(), 50.5);
    assert_eq!(index.document_count(), 100);
}

// ---------------------------------------------------------------------------
// 4. Corpus snapshot round trip
// ---------------------------------------------------------------------------

#[test]
fn snapshot_round_trip_preserves_search_results() {
    let mut index = Bm25Index::new();
    index.add_documents(vec![
        MemoryDocument::new("1", "rust ownership and borrowing notes"),
        MemoryDocument::new("2", "async runtime scheduling discussion"),
        MemoryDocument::new("3", "rust async stream backpressure fix")
            .with_field("title", "backpressure"),
    ]);
    index.build_index();

    let before = index.search("rust async", 10);
    assert!(!before.is_empty());

    let snapshot = index.export_index();
    let mut restored = Bm25Index::new();
    restored.import_index(snapshot).unwrap();

    let after = restored.search("rust async", 10);
    assert_eq!(before.len(), after.len(), "round trip must preserve the hit set");
    for (lhs, rhs) in before.iter().zip(after.iter()) {
        assert_eq!(lhs.id, rhs.id, "round trip must preserve ranking order");
        assert_eq!(lhs.score, rhs.score, "round trip must preserve scores");
        assert_eq!(lhs.matched_terms, rhs.matched_terms);
    }
}

#[test]
fn snapshot_round_trip_with_custom_stop_words_resupplied() {
    let custom: HashSet<String> = ["memo".to_string()].into_iter().collect();
    let config = Bm25Config {
        stop_words: custom.clone(),
        ..Bm25Config::default()
    };

    let mut index = Bm25Index::with_config(config.clone()).unwrap();
    index.add_document(MemoryDocument::new("1", "memo about the deploy"));
    let snapshot = index.export_index();

    // Stop words are not serialized; the restoring engine supplies them.
    let mut restored = Bm25Index::with_config(config).unwrap();
    restored.import_index(snapshot).unwrap();
    assert!(
        restored.search("memo", 10).is_empty(),
        "'memo' stays a stop word only because the caller re-supplied it"
    );
    assert_eq!(restored.search("deploy", 10).len(), 1);
}

// ---------------------------------------------------------------------------
// 5. Embedding determinism and normalization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn embedding_is_deterministic_for_cjk_text() {
    let embedder = HashedEmbedding::new(384, Arc::new(InMemoryVocabularyStore::new()))
        .await
        .unwrap();

    let v1 = embedder.embed("你好世界").await.unwrap();
    let v2 = embedder.embed("你好世界").await.unwrap();
    assert_eq!(v1, v2, "consecutive embeddings of the same text must be identical");
}

#[tokio::test]
async fn embeddings_are_unit_length() {
    let embedder = HashedEmbedding::new(384, Arc::new(InMemoryVocabularyStore::new()))
        .await
        .unwrap();

    for text in [
        "memory retrieval core",
        "the quick brown fox jumps over the lazy dog",
        "修复内存泄漏 memory leak fix",
    ] {
        let vector = embedder.embed(text).await.unwrap();
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 1e-6,
            "embedding of {text:?} must be unit length, got {norm}"
        );
    }
}

#[tokio::test]
async fn embedding_provider_trait_object() {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(
        HashedEmbedding::new(128, Arc::new(InMemoryVocabularyStore::new()))
            .await
            .unwrap(),
    );

    assert_eq!(provider.dimension(), 128);
    let vectors = provider
        .embed_batch(&["first memory", "second memory"])
        .await
        .unwrap();
    assert_eq!(vectors.len(), 2);
    assert!(vectors.iter().all(|v| v.len() == 128));
}

// ---------------------------------------------------------------------------
// 6. Vocabulary persistence across generator instances
// ---------------------------------------------------------------------------

#[tokio::test]
async fn vocabulary_snapshot_survives_restart() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vocabulary.json");

    let first_run = {
        let store: Arc<dyn VocabularyStore> = Arc::new(FileVocabularyStore::new(path.clone()));
        let embedder = HashedEmbedding::new(256, store).await.unwrap();
        embedder.embed("persistent vocabulary words").await.unwrap()
    };

    // A fresh generator over the same snapshot embeds identically: the words
    // keep their indices and the document counter carries over only through
    // its uniform weight, which normalization cancels.
    let store: Arc<dyn VocabularyStore> = Arc::new(FileVocabularyStore::new(path));
    let embedder = HashedEmbedding::new(256, store).await.unwrap();
    assert_eq!(embedder.vocabulary_len().await, 3);
    let second_run = embedder.embed("persistent vocabulary words").await.unwrap();
    assert_eq!(first_run, second_run);
}

#[tokio::test]
async fn corrupt_vocabulary_snapshot_starts_empty() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vocabulary.json");
    tokio::fs::write(&path, "]][[ definitely not json").await.unwrap();

    let store: Arc<dyn VocabularyStore> = Arc::new(FileVocabularyStore::new(path));
    let embedder = HashedEmbedding::new(64, store).await.unwrap();
    assert_eq!(embedder.vocabulary_len().await, 0, "corrupt snapshots recover as empty");

    // The generator still works and overwrites the bad snapshot on growth.
    let vector = embedder.embed("fresh start").await.unwrap();
    assert_eq!(vector.len(), 64);
}

#[tokio::test]
async fn failed_snapshot_write_is_surfaced() {
    let tmp = TempDir::new().unwrap();
    // The snapshot's parent "directory" is a regular file, so persisting
    // must fail -- and the failure must reach the caller.
    let blocker = tmp.path().join("blocker");
    tokio::fs::write(&blocker, "occupied").await.unwrap();

    let store: Arc<dyn VocabularyStore> =
        Arc::new(FileVocabularyStore::new(blocker.join("vocabulary.json")));
    let embedder = HashedEmbedding::new(64, store).await.unwrap();

    let result = embedder.embed("unpersistable words").await;
    assert!(result.is_err(), "a failed vocabulary write must not be swallowed");
}
