//! Propagate item annotations up the ontology.
//!
//! An item annotated with a fine-grained term also counts toward every
//! coarser ancestor of that term once propagated.

use ontora_core::ItemAnnotation;
use tracing::debug;

use crate::closure::AncestorClosure;

/// Extend every item's terms with the ancestors of each term.
///
/// Returns a new map; the input is untouched. Propagating an already
/// propagated map is a no-op because the closure is transitive.
pub fn propagate(annotations: &ItemAnnotation, closure: &AncestorClosure) -> ItemAnnotation {
    let propagated: ItemAnnotation = annotations
        .iter()
        .map(|(item, terms)| (item.clone(), closure.expand(terms)))
        .collect();

    debug!(
        items = propagated.len(),
        direct = annotations.values().map(|t| t.len()).sum::<usize>(),
        propagated = propagated.values().map(|t| t.len()).sum::<usize>(),
        "Propagated annotations"
    );

    propagated
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontora_core::{TermMap, TermSet};

    fn closure(edges: &[(&str, &str)]) -> AncestorClosure {
        let mut parents: TermMap<TermSet> = TermMap::new();
        for &(child, parent) in edges {
            parents
                .entry(child.to_string())
                .or_default()
                .insert(parent.to_string());
        }
        AncestorClosure::compute(&parents).unwrap()
    }

    fn annotation(pairs: &[(&str, &[&str])]) -> ItemAnnotation {
        pairs
            .iter()
            .map(|(item, terms)| {
                (
                    item.to_string(),
                    terms.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn single_parent() {
        let out = propagate(&annotation(&[("g1", &["T2"])]), &closure(&[("T2", "T1")]));
        assert_eq!(out, annotation(&[("g1", &["T1", "T2"])]));
    }

    #[test]
    fn input_untouched() {
        let input = annotation(&[("g1", &["T3"])]);
        let before = input.clone();
        let out = propagate(&input, &closure(&[("T3", "T2"), ("T2", "T1")]));
        assert_eq!(input, before);
        assert_eq!(out["g1"].len(), 3);
    }

    #[test]
    fn unknown_terms_kept_as_is() {
        let out = propagate(&annotation(&[("g1", &["X"]), ("g2", &[])]), &closure(&[("B", "A")]));
        assert_eq!(out, annotation(&[("g1", &["X"]), ("g2", &[])]));
    }

    #[test]
    fn shared_ancestors_deduplicated() {
        let c = closure(&[("B", "A"), ("C", "A")]);
        let out = propagate(&annotation(&[("g1", &["B", "C"])]), &c);
        assert_eq!(out, annotation(&[("g1", &["A", "B", "C"])]));
    }

    #[test]
    fn idempotent() {
        let c = closure(&[("D", "B"), ("D", "C"), ("B", "A"), ("C", "A")]);
        let once = propagate(&annotation(&[("g1", &["D"]), ("g2", &["C"])]), &c);
        assert_eq!(propagate(&once, &c), once);
    }
}
