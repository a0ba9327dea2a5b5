//! Statistical engine for ontology term enrichment.
//!
//! - **Hypergeometric tails**: exact upper/lower tail probabilities ([`hypergeom`])
//! - **Multiple testing correction**: BH, BY, Bonferroni, Holm ([`correction`])
//! - **Over-representation analysis**: the population-caching [`EnrichmentRunner`]

pub mod correction;
pub mod distribution;
pub mod enrichment;
pub mod hypergeom;

pub use correction::{correct, CorrectionMethod};
pub use enrichment::{
    canonical_namespace, run_ora, Direction, EnrichmentConfig, EnrichmentRow, EnrichmentRunner,
    NamespaceFilter, TestDirection,
};
pub use hypergeom::Hypergeometric;
