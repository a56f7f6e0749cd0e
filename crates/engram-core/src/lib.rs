//! Core error definitions for the Engram memory subsystem.
//!
//! This crate provides the error type shared across all Engram crates.
//!
//! # Main types
//!
//! - [`EngramError`] — Unified error enum for the retrieval core.
//! - [`EngramResult`] — Convenience alias for `Result<T, EngramError>`.

// --- Error types ---

/// Top-level error type for the Engram memory subsystem.
///
/// Each variant corresponds to a failure domain that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum EngramError {
    /// An invalid configuration value rejected at construction time.
    #[error("Config error: {0}")]
    Config(String),

    /// A malformed document or snapshot supplied by the caller.
    #[error("Document error: {0}")]
    Document(String),

    /// An error from durable snapshot storage.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`EngramError`].
pub type EngramResult<T> = Result<T, EngramError>;
