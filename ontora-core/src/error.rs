//! Structured error types for the Ontora workspace.

use thiserror::Error;

/// Unified error type for all Ontora operations.
#[derive(Debug, Error)]
pub enum OntoraError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed input data)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, out-of-range values)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unsupported method, metric, direction, or a missing auxiliary input.
    ///
    /// Always raised before any partial work is done.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The ontology's is-a edges form a cycle through `term`.
    #[error("cyclic ontology: term {term} is its own ancestor")]
    CyclicOntology {
        /// A term lying on the detected cycle.
        term: String,
    },

    /// Cache payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the Ontora workspace.
pub type Result<T> = std::result::Result<T, OntoraError>;
