//! Append-only token vocabulary and its durable snapshot storage.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use engram_core::{EngramError, EngramResult};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// The token vocabulary backing [`crate::embedding::HashedEmbedding`].
///
/// Words are only ever appended: once registered, a word keeps its index
/// forever, so vectors projected against an older snapshot stay comparable.
/// The `idf` entries are placeholders fixed at `1.0` on registration and
/// never recalculated; the per-call weight applied during projection derives
/// from `document_count` instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vocabulary {
    /// Registered words in first-seen order.
    pub words: Vec<String>,
    /// word -> position in `words`.
    pub word_to_index: HashMap<String, usize>,
    /// Per-word weight placeholder, index-aligned with `words`.
    pub idf: Vec<f32>,
    /// Number of texts ever embedded against this vocabulary, query
    /// embeddings included.
    pub document_count: u64,
}

impl Vocabulary {
    /// Creates an empty vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one embedded text's tokens.
    ///
    /// Unseen tokens are appended in order of first appearance with an idf
    /// placeholder of `1.0`. The document counter increments unconditionally,
    /// even when no token is new. Returns whether any word was added.
    pub fn register<'a, I>(&mut self, tokens: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut grew = false;
        for token in tokens {
            if !self.word_to_index.contains_key(token) {
                self.word_to_index.insert(token.to_string(), self.words.len());
                self.words.push(token.to_string());
                self.idf.push(1.0);
                grew = true;
            }
        }
        self.document_count += 1;
        grew
    }

    /// Number of registered words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether no word has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Durable storage for [`Vocabulary`] snapshots.
#[async_trait]
pub trait VocabularyStore: Send + Sync {
    /// Load the persisted vocabulary, if a usable snapshot exists.
    async fn load(&self) -> EngramResult<Option<Vocabulary>>;

    /// Persist the vocabulary, replacing any previous snapshot.
    async fn save(&self, vocabulary: &Vocabulary) -> EngramResult<()>;
}

/// File-based vocabulary store: one JSON snapshot on disk.
///
/// A missing or unparseable snapshot is recovered as "start empty"; write
/// failures are surfaced to the caller.
pub struct FileVocabularyStore {
    path: PathBuf,
}

impl FileVocabularyStore {
    /// Creates a store backed by the given snapshot path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl VocabularyStore for FileVocabularyStore {
    async fn load(&self) -> EngramResult<Option<Vocabulary>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Vocabulary snapshot unreadable; starting empty"
                );
                return Ok(None);
            }
        };
        match serde_json::from_str(&data) {
            Ok(vocabulary) => Ok(Some(vocabulary)),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Vocabulary snapshot corrupt; starting empty"
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, vocabulary: &Vocabulary) -> EngramResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string(vocabulary)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| EngramError::Storage(format!("Failed to write vocabulary snapshot: {e}")))?;
        Ok(())
    }
}

/// In-memory vocabulary store for tests and ephemeral generators.
#[derive(Default)]
pub struct InMemoryVocabularyStore {
    snapshot: RwLock<Option<Vocabulary>>,
}

impl InMemoryVocabularyStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VocabularyStore for InMemoryVocabularyStore {
    async fn load(&self) -> EngramResult<Option<Vocabulary>> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save(&self, vocabulary: &Vocabulary) -> EngramResult<()> {
        *self.snapshot.write().await = Some(vocabulary.clone());
        Ok(())
    }
}
