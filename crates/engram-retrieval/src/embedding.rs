//! Embedding provider trait and the local hashed TF-IDF implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use engram_core::{EngramError, EngramResult};
use tokio::sync::RwLock;

use crate::tokenizer::embedding_tokens;
use crate::vocabulary::{Vocabulary, VocabularyStore};

/// Default projection width of [`HashedEmbedding`] vectors.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Trait for computing text embeddings (vector representations).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute embedding vector for a single text.
    async fn embed(&self, text: &str) -> EngramResult<Vec<f32>>;

    /// Compute embeddings for a batch of texts.
    async fn embed_batch(&self, texts: &[&str]) -> EngramResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimension of the embedding vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Deterministic hash-projected TF-IDF embedding generator.
///
/// Needs no network or model weights: each token is projected into a fixed
/// slot of the output vector by a multiplicative hash, signed by a second
/// hash, and weighted by its normalized term frequency times a
/// vocabulary-derived factor. The vocabulary grows append-only and is
/// persisted through a [`VocabularyStore`] whenever new words appear.
///
/// Identical text embeds to identical vectors as long as the vocabulary does
/// not grow in between. Hash collisions between tokens are accepted, not
/// resolved.
pub struct HashedEmbedding {
    dimensions: usize,
    vocabulary: RwLock<Vocabulary>,
    store: Arc<dyn VocabularyStore>,
}

impl HashedEmbedding {
    /// Creates a generator with the given projection width, loading the
    /// persisted vocabulary eagerly. A missing or corrupt snapshot starts
    /// empty without surfacing an error.
    pub async fn new(dimensions: usize, store: Arc<dyn VocabularyStore>) -> EngramResult<Self> {
        if dimensions == 0 {
            return Err(EngramError::Config(
                "embedding dimensions must be at least 1".to_string(),
            ));
        }
        let vocabulary = store.load().await?.unwrap_or_default();
        if !vocabulary.is_empty() {
            tracing::debug!(words = vocabulary.len(), "Loaded vocabulary snapshot");
        }
        Ok(Self {
            dimensions,
            vocabulary: RwLock::new(vocabulary),
            store,
        })
    }

    /// Creates a generator with [`DEFAULT_DIMENSIONS`].
    pub async fn with_default_dimensions(store: Arc<dyn VocabularyStore>) -> EngramResult<Self> {
        Self::new(DEFAULT_DIMENSIONS, store).await
    }

    /// Current vocabulary size.
    pub async fn vocabulary_len(&self) -> usize {
        self.vocabulary.read().await.len()
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbedding {
    async fn embed(&self, text: &str) -> EngramResult<Vec<f32>> {
        let tokens = embedding_tokens(text);

        let mut vocabulary = self.vocabulary.write().await;
        let grew = vocabulary.register(tokens.iter().map(String::as_str));
        if grew {
            // Surfacing a failed write here is deliberate; the snapshot and
            // the in-memory vocabulary must not drift apart silently.
            self.store.save(&vocabulary).await?;
            tracing::debug!(words = vocabulary.len(), "Vocabulary grew; snapshot persisted");
        }

        // Normalized term frequency over this text. A BTreeMap keeps the
        // accumulation order independent of hash-map iteration, so equal
        // inputs produce bit-identical vectors.
        let mut term_freq: BTreeMap<&str, f64> = BTreeMap::new();
        for token in &tokens {
            *term_freq.entry(token.as_str()).or_insert(0.0) += 1.0;
        }
        let total = tokens.len() as f64;
        let document_count = vocabulary.document_count as f64;

        let mut accum = vec![0.0f64; self.dimensions];
        for (word, count) in &term_freq {
            let Some(&index) = vocabulary.word_to_index.get(*word) else {
                continue;
            };
            let tf = *count / total;
            let slot = token_hash(word) as usize % self.dimensions;
            let sign = if token_hash(&format!("{word}_sign")) % 2 == 0 {
                1.0
            } else {
                -1.0
            };
            let idf = (1.0 + document_count / (1.0 + f64::from(vocabulary.idf[index]))).ln();
            accum[slot] += sign * tf * idf;
        }
        drop(vocabulary);

        let norm = accum.iter().map(|value| value * value).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in &mut accum {
                *value /= norm;
            }
        }
        Ok(accum.into_iter().map(|value| value as f32).collect())
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }
}

/// 32-bit multiplicative hash (seed 5381, `h = h*33 + code point`) used for
/// both slot and sign selection; the absolute value is taken before the
/// caller applies the modulo.
fn token_hash(s: &str) -> u32 {
    let mut hash: i32 = 5381;
    for c in s.chars() {
        hash = hash.wrapping_mul(33).wrapping_add(c as i32);
    }
    hash.unsigned_abs()
}
