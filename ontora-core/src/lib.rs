//! Shared primitives, traits, and error types for the Ontora enrichment workspace.
//!
//! `ontora-core` provides the foundation the statistical and ontology crates build on:
//!
//! - **Error types**: [`OntoraError`] and [`Result`] for structured error handling
//! - **Traits**: [`ContentAddressable`], [`Scored`], [`Summarizable`]
//! - **Hashing**: SHA-256 content addressing for the ancestor-closure cache
//! - **Data model**: term/item identifiers and the annotation map shapes
//!   exchanged between crates

pub mod error;
pub mod hash;
pub mod traits;
pub mod types;

pub use error::{OntoraError, Result};
pub use traits::*;
pub use types::{ItemAnnotation, ItemId, TermId, TermMap, TermSet};
