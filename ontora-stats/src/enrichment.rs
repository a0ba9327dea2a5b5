//! Term over-representation analysis (ORA) against an annotated population.
//!
//! An [`EnrichmentRunner`] is built once per population: construction scans
//! the population's annotations and caches, per term, how many population
//! items carry it. Each [`EnrichmentRunner::run_study`] call then tests every
//! candidate term of one study with an exact hypergeometric tail
//! ([`crate::hypergeom`]) and adjusts the raw p-values in one batch
//! ([`crate::correction`]).
//!
//! Annotations are counted as given. Callers wanting ancestor-aware counts
//! propagate them first (see `ontora_ontology::propagate`).
//!
//! Rows come back sorted by `(p_adjusted, p_uncorrected, direction, term)`,
//! so output is identical across runner instances built from the same inputs.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use ontora_core::{ItemAnnotation, ItemId, OntoraError, Result, Scored, Summarizable, TermId, TermMap};
use tracing::debug;

use crate::correction::{self, CorrectionMethod};
use crate::hypergeom::Hypergeometric;

// ── Configuration ───────────────────────────────────────────────────────────

/// Which tail(s) a study run tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TestDirection {
    /// Upper tail only; candidates are terms seen at least once in the study.
    Over,
    /// Lower tail only; candidates are all terms with population support.
    Under,
    /// Per term, whichever tail the observed count falls on relative to its
    /// expectation. Ties at the expectation test the upper tail.
    #[default]
    Both,
}

impl FromStr for TestDirection {
    type Err = OntoraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "over" => Ok(Self::Over),
            "under" => Ok(Self::Under),
            "both" => Ok(Self::Both),
            _ => Err(OntoraError::Configuration(format!(
                "unsupported test direction: {}",
                s
            ))),
        }
    }
}

/// Direction a single row was tested in.
///
/// Ordered `Over < Under`, which is the row sort's third key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Direction {
    Over,
    Under,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Over => "over",
            Self::Under => "under",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace used for terms with no namespace in the ontology.
pub const UNKNOWN_NAMESPACE: &str = "NA";

/// Map a raw ontology namespace to its canonical short label.
///
/// The three GO namespaces become `BP`, `MF` and `CC`; anything else passes
/// through unchanged, and a missing namespace becomes [`UNKNOWN_NAMESPACE`].
pub fn canonical_namespace(namespace: Option<&str>) -> String {
    match namespace {
        None => UNKNOWN_NAMESPACE.to_string(),
        Some("biological_process") => "BP".to_string(),
        Some("molecular_function") => "MF".to_string(),
        Some("cellular_component") => "CC".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Restricts which terms are tested, by canonical namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NamespaceFilter {
    #[default]
    All,
    /// Only terms whose canonical namespace equals this label.
    Only(String),
}

impl NamespaceFilter {
    /// Whether a term with canonical namespace `namespace` passes.
    pub fn accepts(&self, namespace: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(ns) => ns == namespace,
        }
    }
}

impl FromStr for NamespaceFilter {
    type Err = OntoraError;

    /// `"all"` (any case) selects every namespace; any other non-empty value
    /// is canonicalized, so `biological_process` and `BP` are equivalent.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(OntoraError::Configuration(
                "namespace filter must not be empty".into(),
            ));
        }
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        Ok(Self::Only(canonical_namespace(Some(s))))
    }
}

/// Settings for one [`EnrichmentRunner::run_study`] call.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnrichmentConfig {
    pub namespace: NamespaceFilter,
    pub direction: TestDirection,
    pub method: CorrectionMethod,
    /// Attach the annotated study and population items to every row.
    pub store_items: bool,
}

impl EnrichmentConfig {
    pub fn with_namespace(mut self, namespace: NamespaceFilter) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_direction(mut self, direction: TestDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_method(mut self, method: CorrectionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_store_items(mut self, store_items: bool) -> Self {
        self.store_items = store_items;
        self
    }
}

// ── Result rows ─────────────────────────────────────────────────────────────

/// Test result for one term in one study.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnrichmentRow {
    /// Tested term.
    pub term: TermId,
    /// Canonical namespace of the term.
    pub namespace: String,
    /// Tail that was tested.
    pub direction: Direction,
    /// Study items annotated with the term.
    pub study_count: usize,
    /// Study size after intersecting with the population.
    pub study_n: usize,
    /// Population items annotated with the term.
    pub pop_count: usize,
    /// Population size.
    pub pop_n: usize,
    /// Raw hypergeometric tail probability.
    pub p_uncorrected: f64,
    /// Multiple-testing adjusted p-value.
    pub p_adjusted: f64,
    /// Annotated study items, when requested.
    pub study_items: Option<BTreeSet<ItemId>>,
    /// Annotated population items, when requested.
    pub pop_items: Option<BTreeSet<ItemId>>,
}

impl EnrichmentRow {
    /// Expected study count under random sampling: `study_n·pop_count/pop_n`.
    pub fn expected(&self) -> f64 {
        Hypergeometric::new(self.pop_n, self.pop_count, self.study_n).mean()
    }

    /// Observed over expected study count, or 0 when nothing is expected.
    pub fn fold_enrichment(&self) -> f64 {
        let expected = self.expected();
        if expected > 0.0 {
            self.study_count as f64 / expected
        } else {
            0.0
        }
    }

    /// Total order used to sort rows.
    fn sort_cmp(&self, other: &Self) -> Ordering {
        self.p_adjusted
            .total_cmp(&other.p_adjusted)
            .then_with(|| self.p_uncorrected.total_cmp(&other.p_uncorrected))
            .then_with(|| self.direction.cmp(&other.direction))
            .then_with(|| self.term.cmp(&other.term))
    }
}

impl Scored for EnrichmentRow {
    fn score(&self) -> f64 {
        self.p_adjusted
    }
}

impl Summarizable for EnrichmentRow {
    fn summary(&self) -> String {
        format!(
            "{} [{}] {}: {}/{} vs {}/{}, p={:.4e}, p_adj={:.4e}",
            self.term,
            self.namespace,
            self.direction,
            self.study_count,
            self.study_n,
            self.pop_count,
            self.pop_n,
            self.p_uncorrected,
            self.p_adjusted,
        )
    }
}

// ── Runner ──────────────────────────────────────────────────────────────────

/// Reusable ORA runner that caches population term counts.
///
/// The runner is immutable after construction, so independent studies may
/// be run against one instance from several threads.
#[derive(Debug, Clone)]
pub struct EnrichmentRunner {
    population: BTreeSet<ItemId>,
    annotations: ItemAnnotation,
    namespaces: TermMap<String>,
    pop_counts: TermMap<usize>,
}

impl EnrichmentRunner {
    /// Build a runner and count population annotations.
    ///
    /// Only population items contribute to counts; annotated items outside
    /// the population are ignored.
    pub fn new<I, S>(population: I, annotations: ItemAnnotation, namespaces: TermMap<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ItemId>,
    {
        let population: BTreeSet<ItemId> = population.into_iter().map(Into::into).collect();

        let mut pop_counts: TermMap<usize> = BTreeMap::new();
        for item in &population {
            if let Some(terms) = annotations.get(item) {
                for term in terms {
                    *pop_counts.entry(term.clone()).or_insert(0) += 1;
                }
            }
        }

        debug!(
            population = population.len(),
            annotated_items = annotations.len(),
            terms = pop_counts.len(),
            "Built enrichment runner"
        );

        Self {
            population,
            annotations,
            namespaces,
            pop_counts,
        }
    }

    /// Population items.
    pub fn population(&self) -> &BTreeSet<ItemId> {
        &self.population
    }

    /// Population size (`pop_n`).
    pub fn population_size(&self) -> usize {
        self.population.len()
    }

    /// Term → number of population items annotated with it.
    pub fn pop_counts(&self) -> &TermMap<usize> {
        &self.pop_counts
    }

    /// Population count for one term, 0 if unseen.
    pub fn pop_count(&self, term: &str) -> usize {
        self.pop_counts.get(term).copied().unwrap_or(0)
    }

    /// Canonical namespace of `term`.
    pub fn namespace_of(&self, term: &str) -> String {
        canonical_namespace(self.namespaces.get(term).map(String::as_str))
    }

    /// Test every candidate term of one study.
    ///
    /// Study items outside the population are dropped before counting. With
    /// [`TestDirection::Over`] only terms seen in the study are candidates;
    /// otherwise every term with population support is, including terms the
    /// study never hits. The namespace filter applies per candidate before
    /// testing, and all surviving raw p-values are adjusted together with
    /// `config.method`.
    pub fn run_study<I, S>(&self, study: I, config: &EnrichmentConfig) -> Result<Vec<EnrichmentRow>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut submitted = 0usize;
        let study: BTreeSet<&str> = study
            .into_iter()
            .inspect(|_| submitted += 1)
            .filter_map(|item| self.population.get(item.as_ref()).map(String::as_str))
            .collect();

        let mut study_counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut study_members: BTreeMap<&str, BTreeSet<ItemId>> = BTreeMap::new();
        for &item in &study {
            for term in self.terms_of(item) {
                *study_counts.entry(term.as_str()).or_insert(0) += 1;
                if config.store_items {
                    study_members
                        .entry(term.as_str())
                        .or_default()
                        .insert(item.to_string());
                }
            }
        }

        let candidates: Vec<&str> = match config.direction {
            TestDirection::Over => study_counts.keys().copied().collect(),
            TestDirection::Under | TestDirection::Both => {
                self.pop_counts.keys().map(String::as_str).collect()
            }
        };

        let pop_n = self.population.len();
        let study_n = study.len();
        let mut rows = Vec::with_capacity(candidates.len());

        for term in candidates {
            let pop_count = self.pop_count(term);
            if pop_count == 0 {
                continue;
            }
            let namespace = self.namespace_of(term);
            if !config.namespace.accepts(&namespace) {
                continue;
            }

            let study_count = study_counts.get(term).copied().unwrap_or(0);
            let dist = Hypergeometric::new(pop_n, pop_count, study_n);
            let direction = match config.direction {
                TestDirection::Over => Direction::Over,
                TestDirection::Under => Direction::Under,
                TestDirection::Both if study_count as f64 >= dist.mean() => Direction::Over,
                TestDirection::Both => Direction::Under,
            };
            let p_uncorrected = match direction {
                Direction::Over => dist.upper_tail(study_count),
                Direction::Under => dist.lower_tail(study_count),
            };

            rows.push(EnrichmentRow {
                term: term.to_string(),
                namespace,
                direction,
                study_count,
                study_n,
                pop_count,
                pop_n,
                p_uncorrected,
                p_adjusted: 1.0, // filled in below
                study_items: None,
                pop_items: None,
            });
        }

        let raw: Vec<f64> = rows.iter().map(|r| r.p_uncorrected).collect();
        let adjusted = correction::correct(&raw, config.method)?;
        for (row, p_adj) in rows.iter_mut().zip(adjusted) {
            row.p_adjusted = p_adj;
        }

        if config.store_items {
            let mut pop_members = self.population_members(rows.iter().map(|r| r.term.as_str()));
            for row in &mut rows {
                row.study_items = Some(study_members.remove(row.term.as_str()).unwrap_or_default());
                row.pop_items = Some(pop_members.remove(row.term.as_str()).unwrap_or_default());
            }
        }

        rows.sort_by(EnrichmentRow::sort_cmp);

        debug!(
            submitted,
            study_n,
            direction = ?config.direction,
            method = %config.method,
            rows = rows.len(),
            "Study enrichment complete"
        );

        Ok(rows)
    }

    fn terms_of(&self, item: &str) -> impl Iterator<Item = &TermId> {
        self.annotations.get(item).into_iter().flatten()
    }

    /// Population items annotated with each of `terms`.
    fn population_members<'a>(
        &self,
        terms: impl Iterator<Item = &'a str>,
    ) -> BTreeMap<String, BTreeSet<ItemId>> {
        let mut members: BTreeMap<String, BTreeSet<ItemId>> =
            terms.map(|t| (t.to_string(), BTreeSet::new())).collect();
        for item in &self.population {
            for term in self.terms_of(item) {
                if let Some(set) = members.get_mut(term.as_str()) {
                    set.insert(item.clone());
                }
            }
        }
        members
    }
}

/// One-off enrichment run: builds a throwaway runner and tests one study.
///
/// Equivalent to [`EnrichmentRunner::new`] followed by
/// [`EnrichmentRunner::run_study`].
///
/// # Example
///
/// ```
/// use ontora_core::{ItemAnnotation, TermMap};
/// use ontora_stats::enrichment::{run_ora, EnrichmentConfig, TestDirection};
///
/// let mut annotations = ItemAnnotation::new();
/// for (item, term) in [("g1", "T1"), ("g2", "T1"), ("g3", "T2"), ("g4", "T2")] {
///     annotations.entry(item.to_string()).or_default().insert(term.to_string());
/// }
/// let config = EnrichmentConfig::default().with_direction(TestDirection::Over);
/// let rows = run_ora(["g1", "g2", "g3", "g4"], annotations, TermMap::new(), ["g1", "g2"], &config).unwrap();
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].term, "T1");
/// assert_eq!(rows[0].study_count, 2);
/// ```
pub fn run_ora<P, PS, I, S>(
    population: P,
    annotations: ItemAnnotation,
    namespaces: TermMap<String>,
    study: I,
    config: &EnrichmentConfig,
) -> Result<Vec<EnrichmentRow>>
where
    P: IntoIterator<Item = PS>,
    PS: Into<ItemId>,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    EnrichmentRunner::new(population, annotations, namespaces).run_study(study, config)
}

// ── Tests ───────────────────────────────────────────────────────────────────
