//! Identifier and map shapes shared between the statistics and ontology crates.
//!
//! Sets are ordered so anything emitted from them is deterministic; lookups
//! that are never iterated for output use hashed maps.

use std::collections::{BTreeMap, BTreeSet};

/// Opaque ontology term identifier (e.g. `GO:0008150`).
pub type TermId = String;

/// Opaque annotated item identifier (typically a gene symbol).
pub type ItemId = String;

/// An ordered set of term identifiers.
pub type TermSet = BTreeSet<TermId>;

/// A term-keyed map.
pub type TermMap<V> = BTreeMap<TermId, V>;

/// Item → set of terms directly (or, after propagation, transitively) annotated.
pub type ItemAnnotation = BTreeMap<ItemId, TermSet>;
