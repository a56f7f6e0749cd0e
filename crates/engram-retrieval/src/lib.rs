//! Offline keyword and vector retrieval for Engram agent memory.
//!
//! Provides a BM25 keyword-ranking engine over an in-process memory corpus
//! and a deterministic, hash-projected TF-IDF embedding generator with a
//! durable append-only vocabulary. Both work identically with or without an
//! external embedding provider configured, and neither performs network I/O.
//! The two components share no state; an external orchestrator composes them
//! into hybrid retrieval.
//!
//! # Main types
//!
//! - [`Bm25Index`] — BM25 ranking engine with mutable corpus statistics.
//! - [`MemoryDocument`] / [`SearchResult`] — indexing input and ranked output.
//! - [`HashedEmbedding`] — local hash-projected TF-IDF embedding generator.
//! - [`EmbeddingProvider`] — Trait for embedding backends.
//! - [`Vocabulary`] / [`VocabularyStore`] — append-only token vocabulary and
//!   its snapshot storage.

/// BM25 ranking engine, configuration, and corpus snapshots.
pub mod bm25;
/// Embedding provider trait and hashed TF-IDF implementation.
pub mod embedding;
/// Token policies over the shared input-alphabet classification.
pub mod tokenizer;
/// Append-only vocabulary and snapshot stores.
pub mod vocabulary;

pub use bm25::{Bm25Config, Bm25Index, Bm25Snapshot, MemoryDocument, SearchResult};
pub use embedding::{EmbeddingProvider, HashedEmbedding, DEFAULT_DIMENSIONS};
pub use vocabulary::{FileVocabularyStore, InMemoryVocabularyStore, Vocabulary, VocabularyStore};
