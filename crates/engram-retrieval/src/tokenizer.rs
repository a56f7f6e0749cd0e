//! Token policies for the retrieval core.
//!
//! Two independent policies operate over the same input-alphabet
//! classification (Latin letters, decimal digits, CJK ideographs):
//!
//! - [`keyword_tokens`] feeds the BM25 engine: lowercased Latin words of at
//!   least two letters with stop words removed, digit runs of at least two
//!   digits, and CJK unigrams plus overlapping bigrams.
//! - [`embedding_tokens`] feeds the hashed vectorizer: lowercased Latin words
//!   longer than one letter and CJK unigrams plus bigrams, with no stop-word
//!   filtering.
//!
//! Both are pure functions; no shared state is read or written.

use std::collections::HashSet;

/// Default English stop words applied by the BM25 keyword policy.
const DEFAULT_STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "below", "between", "both", "but", "by",
    "can", "cannot", "could", "did", "do", "does", "doing", "down", "during",
    "each", "few", "for", "from", "further",
    "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how",
    "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself",
    "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours",
    "ourselves", "out", "over", "own",
    "same", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they",
    "this", "those", "through", "to", "too",
    "under", "until", "up", "very",
    "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with",
    "you", "your", "yours", "yourself", "yourselves",
];

/// Build the default stop-word set used by [`crate::bm25::Bm25Config`].
pub fn default_stop_words() -> HashSet<String> {
    DEFAULT_STOP_WORDS
        .iter()
        .map(|word| (*word).to_string())
        .collect()
}

/// Input-alphabet classification shared by both token policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    /// ASCII Latin letter.
    Latin,
    /// ASCII decimal digit.
    Digit,
    /// CJK unified ideograph (U+4E00–U+9FA5).
    Cjk,
    /// Anything else — silently dropped by both policies.
    Other,
}

fn classify(c: char) -> CharClass {
    if c.is_ascii_alphabetic() {
        CharClass::Latin
    } else if c.is_ascii_digit() {
        CharClass::Digit
    } else if ('\u{4e00}'..='\u{9fa5}').contains(&c) {
        CharClass::Cjk
    } else {
        CharClass::Other
    }
}

/// Split text into maximal runs of a single character class, skipping runs of
/// unclassified characters.
fn scan_runs(text: &str) -> Vec<(CharClass, String)> {
    let mut runs = Vec::new();
    let mut class = CharClass::Other;
    let mut buf = String::new();
    for c in text.chars() {
        let next = classify(c);
        if next != class && !buf.is_empty() {
            runs.push((class, std::mem::take(&mut buf)));
        }
        class = next;
        if class != CharClass::Other {
            buf.push(c);
        }
    }
    if !buf.is_empty() {
        runs.push((class, buf));
    }
    runs
}

/// Emit each ideograph of a CJK run as a unigram and each overlapping
/// adjacent pair as a bigram, subject to the optional stop-word filter.
fn push_cjk_grams(run: &str, stop_words: Option<&HashSet<String>>, tokens: &mut Vec<String>) {
    let chars: Vec<char> = run.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        let unigram = c.to_string();
        if stop_words.map_or(true, |set| !set.contains(&unigram)) {
            tokens.push(unigram);
        }
        if let Some(&next) = chars.get(i + 1) {
            let bigram: String = [c, next].iter().collect();
            if stop_words.map_or(true, |set| !set.contains(&bigram)) {
                tokens.push(bigram);
            }
        }
    }
}

/// Tokenize text for BM25 indexing and queries.
///
/// Latin runs are lowercased and kept when at least two letters long and not
/// stop words; digit runs are kept when at least two digits long (no
/// stop-word filter); CJK runs emit unigrams and bigrams, each subject to
/// the stop-word filter. Other scripts are dropped.
pub fn keyword_tokens(text: &str, stop_words: &HashSet<String>) -> Vec<String> {
    let mut tokens = Vec::new();
    for (class, run) in scan_runs(text) {
        match class {
            CharClass::Latin => {
                let word = run.to_lowercase();
                if word.len() >= 2 && !stop_words.contains(&word) {
                    tokens.push(word);
                }
            }
            CharClass::Digit => {
                if run.len() >= 2 {
                    tokens.push(run);
                }
            }
            CharClass::Cjk => push_cjk_grams(&run, Some(stop_words), &mut tokens),
            CharClass::Other => {}
        }
    }
    tokens
}

/// Tokenize text for the hashed embedding generator.
///
/// Deliberately independent of [`keyword_tokens`]: no stop-word filtering,
/// Latin words must only be longer than one letter, and digit runs are not
/// emitted.
pub fn embedding_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for (class, run) in scan_runs(text) {
        match class {
            CharClass::Latin => {
                let word = run.to_lowercase();
                if word.len() > 1 {
                    tokens.push(word);
                }
            }
            CharClass::Cjk => push_cjk_grams(&run, None, &mut tokens),
            CharClass::Digit | CharClass::Other => {}
        }
    }
    tokens
}
