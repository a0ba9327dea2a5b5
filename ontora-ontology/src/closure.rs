//! Transitive ancestor closure over is-a edges.
//!
//! A term's closure is the union of its direct parents and their closures.
//! Each term is expanded exactly once (memoized), so the cost is
//! proportional to the number of edges, not paths, however much fan-in the
//! DAG has. Traversal uses an explicit stack, so deep ontologies cannot
//! overflow the call stack, and a term found on its own traversal path is
//! reported as [`OntoraError::CyclicOntology`].

use std::collections::{BTreeMap, HashSet};

use ontora_core::{OntoraError, Result, TermId, TermMap, TermSet};
use tracing::debug;

static EMPTY: TermSet = TermSet::new();

/// Term → set of all strict ancestors. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AncestorClosure {
    ancestors: TermMap<TermSet>,
}

impl AncestorClosure {
    /// Compute the closure of a term → direct-parents map.
    ///
    /// Terms that appear only as parents are included with their own
    /// (possibly empty) closures.
    ///
    /// # Errors
    ///
    /// Returns [`OntoraError::CyclicOntology`] if any term is reachable from
    /// itself, including through a self-loop.
    pub fn compute(parents: &TermMap<TermSet>) -> Result<Self> {
        let mut memo: BTreeMap<&str, TermSet> = BTreeMap::new();
        let mut in_progress: HashSet<&str> = HashSet::new();
        // (term, parents already pushed)
        let mut stack: Vec<(&str, bool)> = Vec::new();

        for root in parents.keys() {
            if memo.contains_key(root.as_str()) {
                continue;
            }
            stack.push((root.as_str(), false));

            while let Some((term, expanded)) = stack.pop() {
                let direct = parents.get(term).unwrap_or(&EMPTY);

                if expanded {
                    let mut closure = direct.clone();
                    for parent in direct {
                        if let Some(upper) = memo.get(parent.as_str()) {
                            closure.extend(upper.iter().cloned());
                        }
                    }
                    in_progress.remove(term);
                    memo.insert(term, closure);
                    continue;
                }

                if memo.contains_key(term) {
                    continue;
                }
                in_progress.insert(term);
                stack.push((term, true));
                for parent in direct {
                    if in_progress.contains(parent.as_str()) {
                        return Err(OntoraError::CyclicOntology {
                            term: parent.clone(),
                        });
                    }
                    if !memo.contains_key(parent.as_str()) {
                        stack.push((parent.as_str(), false));
                    }
                }
            }
        }

        let ancestors: TermMap<TermSet> = memo
            .into_iter()
            .map(|(term, set)| (term.to_string(), set))
            .collect();

        debug!(
            terms = ancestors.len(),
            edges = parents.values().map(|p| p.len()).sum::<usize>(),
            "Computed ancestor closure"
        );

        Ok(Self { ancestors })
    }

    /// Wrap an already-computed closure (e.g. loaded from the cache).
    ///
    /// The map is trusted to be transitively closed.
    pub fn from_map(ancestors: TermMap<TermSet>) -> Self {
        Self { ancestors }
    }

    /// Strict ancestors of `term`; empty for unknown terms and roots.
    pub fn ancestors_of(&self, term: &str) -> &TermSet {
        self.ancestors.get(term).unwrap_or(&EMPTY)
    }

    /// `term` together with all of its ancestors.
    pub fn ancestors_with_self(&self, term: &str) -> TermSet {
        let mut out = self.ancestors_of(term).clone();
        out.insert(term.to_string());
        out
    }

    /// `terms ∪ ancestors(terms)`.
    pub fn expand<'a, I>(&self, terms: I) -> TermSet
    where
        I: IntoIterator<Item = &'a TermId>,
    {
        let mut out = TermSet::new();
        for term in terms {
            out.extend(self.ancestors_of(term).iter().cloned());
            out.insert(term.clone());
        }
        out
    }

    /// Whether `ancestor` is a strict ancestor of `term`.
    pub fn is_ancestor(&self, ancestor: &str, term: &str) -> bool {
        self.ancestors_of(term).contains(ancestor)
    }

    pub fn as_map(&self) -> &TermMap<TermSet> {
        &self.ancestors
    }

    pub fn into_map(self) -> TermMap<TermSet> {
        self.ancestors
    }

    pub fn len(&self) -> usize {
        self.ancestors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ancestors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parents_of(edges: &[(&str, &str)]) -> TermMap<TermSet> {
        let mut parents: TermMap<TermSet> = TermMap::new();
        for &(child, parent) in edges {
            parents.entry(parent.to_string()).or_default();
            parents
                .entry(child.to_string())
                .or_default()
                .insert(parent.to_string());
        }
        parents
    }

    fn set(xs: &[&str]) -> TermSet {
        xs.iter().map(|s| s.to_string()).collect()
    }

    fn is_transitive(closure: &AncestorClosure) -> bool {
        closure.as_map().iter().all(|(_, ancestors)| {
            ancestors
                .iter()
                .all(|a| closure.ancestors_of(a).is_subset(ancestors))
        })
    }

    #[test]
    fn chain() {
        let c = AncestorClosure::compute(&parents_of(&[("C", "B"), ("B", "A")])).unwrap();
        assert_eq!(c.ancestors_of("C"), &set(&["A", "B"]));
        assert_eq!(c.ancestors_of("B"), &set(&["A"]));
        assert!(c.ancestors_of("A").is_empty());
        assert!(c.is_ancestor("A", "C"));
        assert!(!c.is_ancestor("C", "A"));
    }

    #[test]
    fn diamond_fan_in() {
        // D → {B, C}, B → A, C → A
        let c = AncestorClosure::compute(&parents_of(&[
            ("D", "B"),
            ("D", "C"),
            ("B", "A"),
            ("C", "A"),
        ]))
        .unwrap();
        assert_eq!(c.ancestors_of("D"), &set(&["A", "B", "C"]));
        assert_eq!(c.len(), 4);
        assert!(is_transitive(&c));
    }

    #[test]
    fn unknown_term_has_no_ancestors() {
        let c = AncestorClosure::compute(&parents_of(&[("B", "A")])).unwrap();
        assert!(c.ancestors_of("Z").is_empty());
        assert_eq!(c.ancestors_with_self("Z"), set(&["Z"]));
    }

    #[test]
    fn expand_includes_terms_and_ancestors() {
        let c = AncestorClosure::compute(&parents_of(&[("C", "B"), ("B", "A"), ("E", "D")]))
            .unwrap();
        let expanded = c.expand(&set(&["C", "E"]));
        assert_eq!(expanded, set(&["A", "B", "C", "D", "E"]));
    }

    #[test]
    fn two_cycle_detected() {
        let err = AncestorClosure::compute(&parents_of(&[("A", "B"), ("B", "A")])).unwrap_err();
        assert!(matches!(err, OntoraError::CyclicOntology { .. }));
    }

    #[test]
    fn self_loop_detected() {
        let err = AncestorClosure::compute(&parents_of(&[("A", "A")])).unwrap_err();
        match err {
            OntoraError::CyclicOntology { term } => assert_eq!(term, "A"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn long_cycle_behind_acyclic_prefix() {
        let err = AncestorClosure::compute(&parents_of(&[
            ("leaf", "X"),
            ("X", "Y"),
            ("Y", "Z"),
            ("Z", "X"),
        ]))
        .unwrap_err();
        assert!(matches!(err, OntoraError::CyclicOntology { .. }));
    }

    #[test]
    fn deep_chain() {
        let depth = 1_500;
        let mut parents: TermMap<TermSet> = TermMap::new();
        for i in 0..depth {
            parents
                .entry(format!("T{}", i))
                .or_default()
                .insert(format!("T{}", i + 1));
        }
        let c = AncestorClosure::compute(&parents).unwrap();
        assert_eq!(c.len(), depth + 1);
        assert_eq!(c.ancestors_of("T0").len(), depth);
        assert!(c.ancestors_of(&format!("T{}", depth)).is_empty());
    }
}
