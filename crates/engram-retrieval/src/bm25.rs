//! BM25 keyword-ranking engine over an in-process memory corpus.
//!
//! Documents are tokenized with the keyword policy from
//! [`crate::tokenizer`] and scored with the Okapi BM25 formula. Corpus
//! statistics (document frequencies, average document length) are rebuilt
//! wholesale by [`Bm25Index::build_index`] and are intentionally stale
//! between a mutation and the next rebuild; [`Bm25Index::search`] rebuilds
//! first when needed.

use std::collections::{HashMap, HashSet};

use engram_core::{EngramError, EngramResult};
use serde::{Deserialize, Serialize};

use crate::tokenizer::{self, keyword_tokens};

/// Configuration for a [`Bm25Index`].
#[derive(Debug, Clone)]
pub struct Bm25Config {
    /// Term-frequency saturation parameter. Must be positive.
    pub k1: f32,
    /// Document-length normalization strength, within `[0, 1]`.
    pub b: f32,
    /// Token repetition count per field name; unlisted fields weigh 1.
    pub field_weights: HashMap<String, usize>,
    /// Stop words removed by the keyword tokenizer.
    pub stop_words: HashSet<String>,
}

impl Default for Bm25Config {
    fn default() -> Self {
        let mut field_weights = HashMap::new();
        field_weights.insert("text".to_string(), 1);
        Self {
            k1: 1.2,
            b: 0.75,
            field_weights,
            stop_words: tokenizer::default_stop_words(),
        }
    }
}

impl Bm25Config {
    fn validate(&self) -> EngramResult<()> {
        if !self.k1.is_finite() || self.k1 <= 0.0 {
            return Err(EngramError::Config(format!(
                "k1 must be positive, got {}",
                self.k1
            )));
        }
        if !self.b.is_finite() || !(0.0..=1.0).contains(&self.b) {
            return Err(EngramError::Config(format!(
                "b must be within [0, 1], got {}",
                self.b
            )));
        }
        Ok(())
    }
}

/// A memory document submitted for keyword indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDocument {
    /// Caller-assigned unique identifier. Re-adding an existing id replaces
    /// the prior entry.
    pub id: String,
    /// Primary text content.
    pub text: String,
    /// Named auxiliary fields (title, topics, ...) indexed alongside `text`.
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

impl MemoryDocument {
    /// Creates a document with no auxiliary fields.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            fields: HashMap::new(),
        }
    }

    /// Adds a named auxiliary field. Chainable.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// A single ranked hit returned by [`Bm25Index::search`].
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Identifier of the matching document.
    pub id: String,
    /// Total BM25 score; always positive for returned hits.
    pub score: f32,
    /// Query terms that occurred in the document, in query order.
    pub matched_terms: Vec<String>,
}

/// Serializable engine configuration embedded in a corpus snapshot.
///
/// Stop words are intentionally not part of the wire format; an engine
/// restoring a corpus indexed with custom stop words must be constructed
/// with the same set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bm25SnapshotConfig {
    /// Term-frequency saturation parameter.
    pub k1: f32,
    /// Document-length normalization strength.
    pub b: f32,
    /// Token repetition count per field name.
    pub field_weights: HashMap<String, usize>,
}

/// A full corpus export: configuration plus every stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Snapshot {
    /// The exporting engine's configuration (minus stop words).
    pub config: Bm25SnapshotConfig,
    /// All stored documents, sorted by id.
    pub documents: Vec<MemoryDocument>,
}

/// BM25 ranking engine with mutable corpus statistics.
///
/// Scoring uses the standard formula:
/// ```text
/// idf(t)      = ln((N - df + 0.5) / (df + 0.5) + 1)
/// tfNorm(t,D) = (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * |D| / avgdl))
/// score(D,Q)  = sum over query terms with tf > 0 of idf(t) * tfNorm(t,D)
/// ```
/// `build_index` is O(total corpus tokens); callers batching mutations
/// should trigger it explicitly rather than relying on the implicit rebuild
/// inside `search`.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    config: Bm25Config,
    /// id -> stored document, kept for replacement and export.
    documents: HashMap<String, MemoryDocument>,
    /// id -> weighted token list.
    document_tokens: HashMap<String, Vec<String>>,
    /// id -> token count.
    document_lengths: HashMap<String, usize>,
    /// term -> number of documents containing it at least once.
    term_doc_freq: HashMap<String, usize>,
    avg_doc_length: f32,
    /// Set by mutations, cleared by rebuilds.
    stale: bool,
}

impl Bm25Index {
    /// Creates an engine with the default configuration.
    pub fn new() -> Self {
        Self::from_config(Bm25Config::default())
    }

    /// Creates an engine with a custom configuration, failing fast on
    /// invalid `k1` or `b`.
    pub fn with_config(config: Bm25Config) -> EngramResult<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: Bm25Config) -> Self {
        Self {
            config,
            documents: HashMap::new(),
            document_tokens: HashMap::new(),
            document_lengths: HashMap::new(),
            term_doc_freq: HashMap::new(),
            avg_doc_length: 0.0,
            stale: false,
        }
    }

    /// The engine's active configuration.
    pub fn config(&self) -> &Bm25Config {
        &self.config
    }

    /// Number of stored documents.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Average document length as of the last rebuild.
    pub fn average_doc_length(&self) -> f32 {
        self.avg_doc_length
    }

    /// Tokenize a document: the main text plus each auxiliary field,
    /// repeated by the configured per-field weight (default 1).
    fn weighted_tokens(&self, doc: &MemoryDocument) -> Vec<String> {
        let mut tokens = Vec::new();
        let text_weight = self.config.field_weights.get("text").copied().unwrap_or(1);
        let text_tokens = keyword_tokens(&doc.text, &self.config.stop_words);
        for _ in 0..text_weight {
            tokens.extend(text_tokens.iter().cloned());
        }
        for (name, value) in &doc.fields {
            let weight = self.config.field_weights.get(name).copied().unwrap_or(1);
            let field_tokens = keyword_tokens(value, &self.config.stop_words);
            for _ in 0..weight {
                tokens.extend(field_tokens.iter().cloned());
            }
        }
        tokens
    }

    /// Store a document, replacing any prior entry with the same id. Marks
    /// the statistics stale; no recomputation happens here.
    pub fn add_document(&mut self, doc: MemoryDocument) {
        self.remove_document(&doc.id);
        let tokens = self.weighted_tokens(&doc);
        self.document_lengths.insert(doc.id.clone(), tokens.len());
        self.document_tokens.insert(doc.id.clone(), tokens);
        self.documents.insert(doc.id.clone(), doc);
        self.stale = true;
    }

    /// Sequentially add a batch of documents.
    pub fn add_documents(&mut self, docs: Vec<MemoryDocument>) {
        for doc in docs {
            self.add_document(doc);
        }
    }

    /// Remove a document by id, returning whether it existed.
    pub fn remove_document(&mut self, id: &str) -> bool {
        let existed = self.documents.remove(id).is_some();
        if existed {
            self.document_tokens.remove(id);
            self.document_lengths.remove(id);
            self.stale = true;
        }
        existed
    }

    /// Drop all documents and statistics. The empty engine is fresh, not
    /// stale.
    pub fn clear(&mut self) {
        self.documents.clear();
        self.document_tokens.clear();
        self.document_lengths.clear();
        self.term_doc_freq.clear();
        self.avg_doc_length = 0.0;
        self.stale = false;
    }

    /// Recompute all corpus statistics from scratch: average document length
    /// over every stored length, and document frequencies from each
    /// document's unique tokens. Always a complete rebuild, never
    /// incremental.
    pub fn build_index(&mut self) {
        self.term_doc_freq.clear();
        if self.documents.is_empty() {
            self.avg_doc_length = 0.0;
            self.stale = false;
            return;
        }

        let total_length: usize = self.document_lengths.values().sum();
        self.avg_doc_length = total_length as f32 / self.documents.len() as f32;

        for tokens in self.document_tokens.values() {
            let unique: HashSet<&String> = tokens.iter().collect();
            for term in unique {
                *self.term_doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }

        self.stale = false;
        tracing::debug!(
            documents = self.documents.len(),
            avg_doc_length = self.avg_doc_length,
            "Rebuilt BM25 corpus statistics"
        );
    }

    /// Score the query against the corpus, returning up to `top_k` results
    /// sorted by descending score (ties broken by id so rankings are
    /// stable). Rebuilds the statistics first if they are stale. Returns an
    /// empty list for an empty corpus or a query that tokenizes to nothing.
    pub fn search(&mut self, query: &str, top_k: usize) -> Vec<SearchResult> {
        if self.stale {
            self.build_index();
        }
        if self.documents.is_empty() {
            return Vec::new();
        }

        let mut query_terms = keyword_tokens(query, &self.config.stop_words);
        let mut term_set: HashSet<String> = HashSet::new();
        query_terms.retain(|term| term_set.insert(term.clone()));
        if query_terms.is_empty() {
            return Vec::new();
        }

        let n = self.documents.len() as f32;
        let k1 = self.config.k1;
        let b = self.config.b;

        let mut results = Vec::new();
        for (id, tokens) in &self.document_tokens {
            // One pass over the token list counting only query terms.
            let mut freq: HashMap<&str, f32> = HashMap::new();
            for token in tokens {
                if term_set.contains(token) {
                    *freq.entry(token.as_str()).or_insert(0.0) += 1.0;
                }
            }
            if freq.is_empty() {
                continue;
            }

            let dl = self.document_lengths.get(id).copied().unwrap_or(0) as f32;
            let norm = if self.avg_doc_length > 0.0 {
                1.0 - b + b * dl / self.avg_doc_length
            } else {
                // Corpus of only zero-length documents: skip length
                // normalization rather than divide by zero.
                1.0
            };

            let mut score = 0.0f32;
            let mut matched_terms = Vec::new();
            for term in &query_terms {
                let Some(&tf) = freq.get(term.as_str()) else {
                    continue;
                };
                let df = self.term_doc_freq.get(term).copied().unwrap_or(0) as f32;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                score += idf * (tf * (k1 + 1.0)) / (tf + k1 * norm);
                matched_terms.push(term.clone());
            }

            if score > 0.0 {
                results.push(SearchResult {
                    id: id.clone(),
                    score,
                    matched_terms,
                });
            }
        }

        results.sort_by(|left, right| {
            right
                .score
                .partial_cmp(&left.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| left.id.cmp(&right.id))
        });
        results.truncate(top_k);
        results
    }

    /// Export the configuration (minus stop words) and every stored
    /// document. Persistence of the snapshot is the caller's responsibility.
    pub fn export_index(&self) -> Bm25Snapshot {
        let mut documents: Vec<MemoryDocument> = self.documents.values().cloned().collect();
        documents.sort_by(|left, right| left.id.cmp(&right.id));
        Bm25Snapshot {
            config: Bm25SnapshotConfig {
                k1: self.config.k1,
                b: self.config.b,
                field_weights: self.config.field_weights.clone(),
            },
            documents,
        }
    }

    /// Fully replace the engine's state from a snapshot: restore the
    /// configuration (keeping the currently configured stop words), re-add
    /// every document, and rebuild eagerly.
    pub fn import_index(&mut self, snapshot: Bm25Snapshot) -> EngramResult<()> {
        let Bm25Snapshot { config, documents } = snapshot;
        let restored = Bm25Config {
            k1: config.k1,
            b: config.b,
            field_weights: config.field_weights,
            stop_words: self.config.stop_words.clone(),
        };
        restored.validate()?;

        self.clear();
        self.config = restored;
        let count = documents.len();
        for doc in documents {
            self.add_document(doc);
        }
        self.build_index();
        tracing::debug!(documents = count, "Imported BM25 corpus snapshot");
        Ok(())
    }
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new()
    }
}
