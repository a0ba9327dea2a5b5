//! In-memory ontology graph: is-a edges plus per-term namespace.
//!
//! This is the shape an external ontology parser hands to the core. Edges
//! point from a term to its direct parents. The graph is expected to be a
//! DAG; acyclicity is checked when the ancestor closure is built, not here.

use std::collections::BTreeMap;

use ontora_core::{Summarizable, TermId, TermMap, TermSet};
use ontora_stats::enrichment::canonical_namespace;
use serde::{Deserialize, Serialize};

/// Format/version strings read from the ontology header, passed through
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyMeta {
    pub format_version: Option<String>,
    pub data_version: Option<String>,
}

/// Term → direct parents and term → namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OntologyGraph {
    namespaces: TermMap<String>,
    parents: TermMap<TermSet>,
    meta: OntologyMeta,
}

impl OntologyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a graph from already-parsed maps.
    ///
    /// Parents referenced only as parents get an empty parent set so every
    /// term in the graph is a key of [`parents`](Self::parents).
    pub fn from_parts(
        namespaces: TermMap<String>,
        mut parents: TermMap<TermSet>,
        meta: OntologyMeta,
    ) -> Self {
        let dangling: Vec<TermId> = parents
            .values()
            .flatten()
            .filter(|p| !parents.contains_key(*p))
            .cloned()
            .collect();
        for term in dangling {
            parents.entry(term).or_default();
        }
        for term in namespaces.keys() {
            if !parents.contains_key(term) {
                parents.insert(term.clone(), TermSet::new());
            }
        }
        Self {
            namespaces,
            parents,
            meta,
        }
    }

    /// Add a term, optionally with a raw namespace. Re-adding a term
    /// replaces its namespace and keeps its edges.
    pub fn add_term(&mut self, term: &str, namespace: Option<&str>) {
        self.parents.entry(term.to_string()).or_default();
        match namespace {
            Some(ns) => {
                self.namespaces.insert(term.to_string(), ns.to_string());
            }
            None => {
                self.namespaces.remove(term);
            }
        }
    }

    /// Add an is-a edge `child → parent`, creating either term if needed.
    pub fn add_is_a(&mut self, child: &str, parent: &str) {
        self.parents.entry(parent.to_string()).or_default();
        self.parents
            .entry(child.to_string())
            .or_default()
            .insert(parent.to_string());
    }

    pub fn set_meta(&mut self, meta: OntologyMeta) {
        self.meta = meta;
    }

    pub fn meta(&self) -> &OntologyMeta {
        &self.meta
    }

    /// Term → direct parents.
    pub fn parents(&self) -> &TermMap<TermSet> {
        &self.parents
    }

    /// Term → raw namespace, as parsed.
    pub fn namespaces(&self) -> &TermMap<String> {
        &self.namespaces
    }

    /// Direct parents of `term`, if the term is known.
    pub fn parents_of(&self, term: &str) -> Option<&TermSet> {
        self.parents.get(term)
    }

    /// Canonical namespace of `term` (`BP`/`MF`/`CC`, pass-through, or `NA`).
    pub fn namespace_of(&self, term: &str) -> String {
        canonical_namespace(self.namespaces.get(term).map(String::as_str))
    }

    pub fn contains(&self, term: &str) -> bool {
        self.parents.contains_key(term)
    }

    pub fn term_count(&self) -> usize {
        self.parents.len()
    }

    pub fn edge_count(&self) -> usize {
        self.parents.values().map(|p| p.len()).sum()
    }

    /// Terms grouped by canonical namespace.
    pub fn terms_by_namespace(&self) -> BTreeMap<String, TermSet> {
        let mut out: BTreeMap<String, TermSet> = BTreeMap::new();
        for term in self.parents.keys() {
            out.entry(self.namespace_of(term))
                .or_default()
                .insert(term.clone());
        }
        out
    }

    pub(crate) fn into_parts(self) -> (TermMap<String>, TermMap<TermSet>, OntologyMeta) {
        (self.namespaces, self.parents, self.meta)
    }
}

impl Summarizable for OntologyGraph {
    fn summary(&self) -> String {
        format!(
            "OntologyGraph: {} terms, {} is-a edges, format={}, data={}",
            self.term_count(),
            self.edge_count(),
            self.meta.format_version.as_deref().unwrap_or("na"),
            self.meta.data_version.as_deref().unwrap_or("na"),
        )
    }
}
