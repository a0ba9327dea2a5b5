//! Ontology-side engine for term enrichment.
//!
//! - **Graph and closure**: [`OntologyGraph`] and its transitive [`AncestorClosure`]
//! - **Closure cache**: content-addressed reuse across runs ([`cache`])
//! - **Propagation**: lift item annotations to ancestor terms ([`propagate()`])
//! - **Semantic similarity**: Jaccard, Resnik, Lin and Wang across studies ([`semantic`])
//! - **Batch mode**: many studies against one population ([`batch`])

pub mod batch;
pub mod cache;
pub mod closure;
pub mod graph;
pub mod propagate;
pub mod semantic;

pub use batch::{compare_studies, run_batch, select_terms, BatchComparison, ComparisonStatus, SemanticFilter, Study};
pub use cache::{
    CacheEntry, CacheStore, CachedOntology, ClosureCache, DirCacheStore, MemoryCacheStore,
    OntologySource,
};
pub use closure::AncestorClosure;
pub use graph::{OntologyGraph, OntologyMeta};
pub use propagate::propagate;
pub use semantic::{
    pairwise_summary, PairSummary, SemanticComparison, SemanticConfig, SemanticMetric,
    SemanticSimilarityEngine, SimilarityMatrix, StudyTermSet, TermPair,
};
