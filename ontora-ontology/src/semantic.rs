//! Cross-study semantic similarity of selected term sets.
//!
//! Each study contributes a [`StudyTermSet`] (typically its significant
//! over-represented terms). Every unordered pair of studies, self pairs
//! included, gets one score in `[0, 1]`:
//!
//! - **Jaccard**: overlap of the ancestor-expanded term sets.
//! - **Resnik**: information content of the most informative common
//!   ancestor of two terms.
//! - **Lin**: Resnik normalized by the two terms' own information content.
//! - **Wang**: overlap of decayed "semantic values" propagated up is-a
//!   edges (weight [`WANG_EDGE_WEIGHT`] per edge).
//!
//! The three term-pair metrics are lifted to study level with symmetric
//! best-match-average over the raw (unexpanded) term sets. For each study
//! pair, the best-matching term pairs are kept, ranked, for explanation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use ontora_core::{OntoraError, Result, Scored, TermId, TermMap, TermSet};
use tracing::debug;

use crate::closure::AncestorClosure;

/// Multiplicative semantic-value decay per is-a edge in the Wang metric.
pub const WANG_EDGE_WEIGHT: f64 = 0.8;

// ── Configuration ───────────────────────────────────────────────────────────

/// Similarity metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SemanticMetric {
    #[default]
    Jaccard,
    Resnik,
    Lin,
    Wang,
}

impl SemanticMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jaccard => "jaccard",
            Self::Resnik => "resnik",
            Self::Lin => "lin",
            Self::Wang => "wang",
        }
    }

    /// Whether the metric scores term pairs (and so uses best-match-average).
    pub fn is_term_pairwise(&self) -> bool {
        !matches!(self, Self::Jaccard)
    }
}

impl fmt::Display for SemanticMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticMetric {
    type Err = OntoraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jaccard" => Ok(Self::Jaccard),
            "resnik" => Ok(Self::Resnik),
            "lin" => Ok(Self::Lin),
            "wang" => Ok(Self::Wang),
            _ => Err(OntoraError::Configuration(format!(
                "unsupported semantic metric: {}",
                s
            ))),
        }
    }
}

/// Settings for [`SemanticSimilarityEngine::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SemanticConfig {
    pub metric: SemanticMetric,
    /// Term pairs kept per study pair.
    pub top_k: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            metric: SemanticMetric::Jaccard,
            top_k: 5,
        }
    }
}

impl SemanticConfig {
    pub fn with_metric(mut self, metric: SemanticMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

// ── Inputs and outputs ──────────────────────────────────────────────────────

/// Terms selected from one study for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StudyTermSet {
    pub study_id: String,
    pub terms: TermSet,
}

impl StudyTermSet {
    pub fn new<I, S>(study_id: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TermId>,
    {
        Self {
            study_id: study_id.into(),
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }
}

/// One explanatory term pair: `term_a`'s best match in the other study.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TermPair {
    pub term_a: TermId,
    pub term_b: TermId,
    pub score: f64,
}

impl TermPair {
    fn swapped(&self) -> Self {
        Self {
            term_a: self.term_b.clone(),
            term_b: self.term_a.clone(),
            score: self.score,
        }
    }
}

impl Scored for TermPair {
    fn score(&self) -> f64 {
        self.score
    }
}

/// Symmetric study × study score matrix. Both orderings of every pair are
/// stored with the same value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimilarityMatrix {
    study_ids: Vec<String>,
    scores: BTreeMap<(String, String), f64>,
}

impl SimilarityMatrix {
    fn insert(&mut self, a: &str, b: &str, score: f64) {
        self.scores.insert((a.to_string(), b.to_string()), score);
        self.scores.insert((b.to_string(), a.to_string()), score);
    }

    /// Score for a study pair, in either order.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        self.scores.get(&(a.to_string(), b.to_string())).copied()
    }

    /// Study ids in input order.
    pub fn study_ids(&self) -> &[String] {
        &self.study_ids
    }

    /// Dense rows in study order; missing cells are 0.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.study_ids
            .iter()
            .map(|a| {
                self.study_ids
                    .iter()
                    .map(|b| self.get(a, b).unwrap_or(0.0))
                    .collect()
            })
            .collect()
    }

    /// All `(a, b) → score` entries, both orderings.
    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &f64)> {
        self.scores.iter()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Result of comparing a set of studies.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticComparison {
    pub metric: SemanticMetric,
    pub matrix: SimilarityMatrix,
    /// Ranked contributing term pairs per ordered study pair.
    pub top_pairs: BTreeMap<(String, String), Vec<TermPair>>,
}

impl SemanticComparison {
    /// Top term pairs for `(a, b)`; empty for unknown pairs.
    pub fn top_pairs_for(&self, a: &str, b: &str) -> &[TermPair] {
        self.top_pairs
            .get(&(a.to_string(), b.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Per-pair overlap counts alongside the score.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PairSummary {
    pub study_a: String,
    pub study_b: String,
    pub raw_a_terms: usize,
    pub raw_b_terms: usize,
    pub raw_overlap_terms: usize,
    pub raw_union_terms: usize,
    pub expanded_a_terms: usize,
    pub expanded_b_terms: usize,
    pub expanded_overlap_terms: usize,
    pub expanded_union_terms: usize,
    pub similarity_score: f64,
}

// ── Set-level helpers ───────────────────────────────────────────────────────

/// `|A ∩ B| / |A ∪ B|`; 1.0 for two empty sets, 0.0 if exactly one is empty.
pub fn jaccard(a: &TermSet, b: &TermSet) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    let union = a.len() + b.len() - inter;
    inter as f64 / union as f64
}

/// Symmetric best-match-average of a term-pair score over two sets.
///
/// Returns the score and, for every term of `a` in order, its best match in
/// `b` (the first in order among equal scores). Empty vs empty is 1.0 and
/// empty vs non-empty is 0.0, both with no pairs.
pub fn best_match_average<F>(a: &TermSet, b: &TermSet, sim: F) -> (f64, Vec<TermPair>)
where
    F: Fn(&str, &str) -> f64,
{
    if a.is_empty() && b.is_empty() {
        return (1.0, Vec::new());
    }
    if a.is_empty() || b.is_empty() {
        return (0.0, Vec::new());
    }

    let a_terms: Vec<&TermId> = a.iter().collect();
    let b_terms: Vec<&TermId> = b.iter().collect();
    let scores: Vec<Vec<f64>> = a_terms
        .iter()
        .map(|ta| b_terms.iter().map(|tb| sim(ta, tb)).collect())
        .collect();

    let mut pairs = Vec::with_capacity(a_terms.len());
    let mut row_sum = 0.0;
    for (i, ta) in a_terms.iter().enumerate() {
        let mut best = -1.0;
        let mut best_j = 0;
        for (j, &s) in scores[i].iter().enumerate() {
            if s > best {
                best = s;
                best_j = j;
            }
        }
        let best = best.max(0.0);
        row_sum += best;
        pairs.push(TermPair {
            term_a: (*ta).clone(),
            term_b: b_terms[best_j].clone(),
            score: best,
        });
    }

    let mut col_sum = 0.0;
    for j in 0..b_terms.len() {
        let best = scores
            .iter()
            .map(|row| row[j])
            .fold(-1.0_f64, f64::max)
            .max(0.0);
        col_sum += best;
    }

    let left = row_sum / a_terms.len() as f64;
    let right = col_sum / b_terms.len() as f64;
    ((left + right) / 2.0, pairs)
}

/// Keep the `k` highest-scoring pairs: score descending, then `term_a`,
/// then `term_b` ascending.
fn rank_pairs(mut pairs: Vec<TermPair>, k: usize) -> Vec<TermPair> {
    pairs.sort_by(|x, y| {
        y.score
            .total_cmp(&x.score)
            .then_with(|| x.term_a.cmp(&y.term_a))
            .then_with(|| x.term_b.cmp(&y.term_b))
    });
    pairs.truncate(k);
    pairs
}

// ── Term-level scores ───────────────────────────────────────────────────────

/// Information content `-ln(count / pop_n)` from population annotation counts.
#[derive(Debug, Clone, Copy)]
pub struct InformationContent<'a> {
    counts: &'a TermMap<usize>,
    pop_n: usize,
}

impl<'a> InformationContent<'a> {
    pub fn new(counts: &'a TermMap<usize>, pop_n: usize) -> Self {
        Self { counts, pop_n }
    }

    /// IC of `term`; 0 for unseen terms or an empty population.
    pub fn ic(&self, term: &str) -> f64 {
        if self.pop_n == 0 {
            return 0.0;
        }
        let count = self.counts.get(term).copied().unwrap_or(0);
        if count == 0 {
            return 0.0;
        }
        -(count as f64 / self.pop_n as f64).ln()
    }
}

/// Highest decayed value reaching each ancestor from `term` (itself 1.0).
///
/// Keeps the maximum over paths, not the sum. Terminates on any input since
/// a value is only re-propagated when it strictly improves.
pub fn wang_semantic_values<'p>(term: &'p str, parents: &'p TermMap<TermSet>) -> BTreeMap<&'p str, f64> {
    let mut sv: BTreeMap<&str, f64> = BTreeMap::new();
    sv.insert(term, 1.0);
    let mut stack = vec![term];
    while let Some(cur) = stack.pop() {
        let value = sv[cur] * WANG_EDGE_WEIGHT;
        for parent in parents.get(cur).into_iter().flatten() {
            let slot = sv.entry(parent.as_str()).or_insert(0.0);
            if value > *slot {
                *slot = value;
                stack.push(parent.as_str());
            }
        }
    }
    sv
}

fn wang_score(a: &BTreeMap<&str, f64>, b: &BTreeMap<&str, f64>) -> f64 {
    let numerator: f64 = a
        .iter()
        .filter_map(|(term, va)| b.get(term).map(|vb| va + vb))
        .sum();
    if numerator <= 0.0 {
        return 0.0;
    }
    let denominator: f64 = a.values().sum::<f64>() + b.values().sum::<f64>();
    if denominator <= 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Per-term data computed once per comparison and shared by all pairs.
#[derive(Default)]
struct Prepared<'a> {
    /// Term → ancestors including itself (Resnik, Lin).
    lineage: HashMap<&'a str, TermSet>,
    /// Term → Wang semantic values.
    wang: HashMap<&'a str, BTreeMap<&'a str, f64>>,
    /// Study → expanded terms (Jaccard).
    expanded: Vec<TermSet>,
}

// ── Engine ──────────────────────────────────────────────────────────────────

/// Pairwise study similarity over a fixed ontology.
///
/// Holds only shared references, so one engine can be used from several
/// threads at once.
#[derive(Debug, Clone, Copy)]
pub struct SemanticSimilarityEngine<'a> {
    closure: &'a AncestorClosure,
    ic: Option<InformationContent<'a>>,
    parents: Option<&'a TermMap<TermSet>>,
}

impl<'a> SemanticSimilarityEngine<'a> {
    pub fn new(closure: &'a AncestorClosure) -> Self {
        Self {
            closure,
            ic: None,
            parents: None,
        }
    }

    /// Population term counts for Resnik and Lin.
    pub fn with_population_counts(mut self, counts: &'a TermMap<usize>, pop_n: usize) -> Self {
        self.ic = Some(InformationContent::new(counts, pop_n));
        self
    }

    /// Direct-parent map for Wang.
    pub fn with_parents(mut self, parents: &'a TermMap<TermSet>) -> Self {
        self.parents = Some(parents);
        self
    }

    pub fn closure(&self) -> &'a AncestorClosure {
        self.closure
    }

    /// Fail if `metric` needs an input this engine was not given.
    pub fn check(&self, metric: SemanticMetric) -> Result<()> {
        match metric {
            SemanticMetric::Resnik | SemanticMetric::Lin if self.ic.is_none() => {
                Err(OntoraError::Configuration(format!(
                    "{} metric requires population term counts",
                    metric
                )))
            }
            SemanticMetric::Wang if self.parents.is_none() => Err(OntoraError::Configuration(
                "wang metric requires the direct-parent map".into(),
            )),
            _ => Ok(()),
        }
    }

    /// Similarity of two single terms under `metric`.
    ///
    /// Jaccard compares the two terms' ancestor-with-self sets.
    pub fn term_similarity(&self, metric: SemanticMetric, a: &str, b: &str) -> Result<f64> {
        self.check(metric)?;
        let score = match metric {
            SemanticMetric::Jaccard => jaccard(
                &self.closure.ancestors_with_self(a),
                &self.closure.ancestors_with_self(b),
            ),
            SemanticMetric::Resnik => {
                let la = self.closure.ancestors_with_self(a);
                let lb = self.closure.ancestors_with_self(b);
                self.resnik(&la, &lb)
            }
            SemanticMetric::Lin => {
                let la = self.closure.ancestors_with_self(a);
                let lb = self.closure.ancestors_with_self(b);
                self.lin(a, b, &la, &lb)
            }
            SemanticMetric::Wang => match self.parents {
                Some(parents) => wang_score(
                    &wang_semantic_values(a, parents),
                    &wang_semantic_values(b, parents),
                ),
                None => 0.0,
            },
        };
        Ok(score)
    }

    /// Compare every unordered pair of studies, self pairs included.
    ///
    /// # Errors
    ///
    /// [`OntoraError::Configuration`] if the metric's auxiliary input is
    /// missing, [`OntoraError::InvalidInput`] on duplicate study ids. Both are
    /// raised before any scoring.
    pub fn compare(&self, studies: &[StudyTermSet], config: &SemanticConfig) -> Result<SemanticComparison> {
        self.check(config.metric)?;
        let mut seen = HashSet::new();
        for study in studies {
            if !seen.insert(study.study_id.as_str()) {
                return Err(OntoraError::InvalidInput(format!(
                    "duplicate study id: {}",
                    study.study_id
                )));
            }
        }

        let prepared = self.prepare(studies, config.metric);

        let index_pairs: Vec<(usize, usize)> = (0..studies.len())
            .flat_map(|i| (i..studies.len()).map(move |j| (i, j)))
            .collect();

        #[cfg(feature = "parallel")]
        let scored: Vec<(f64, Vec<TermPair>)> = {
            use rayon::prelude::*;
            index_pairs
                .par_iter()
                .map(|&(i, j)| self.study_pair(&studies[i], &studies[j], i, j, &prepared, config))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let scored: Vec<(f64, Vec<TermPair>)> = index_pairs
            .iter()
            .map(|&(i, j)| self.study_pair(&studies[i], &studies[j], i, j, &prepared, config))
            .collect();

        let mut matrix = SimilarityMatrix {
            study_ids: studies.iter().map(|s| s.study_id.clone()).collect(),
            scores: BTreeMap::new(),
        };
        let mut top_pairs = BTreeMap::new();
        for (&(i, j), (score, pairs)) in index_pairs.iter().zip(scored) {
            let a = &studies[i].study_id;
            let b = &studies[j].study_id;
            matrix.insert(a, b, score);
            let reversed: Vec<TermPair> = pairs.iter().map(TermPair::swapped).collect();
            top_pairs.insert((a.clone(), b.clone()), pairs);
            if i != j {
                top_pairs.insert((b.clone(), a.clone()), reversed);
            }
        }

        debug!(
            metric = %config.metric,
            studies = studies.len(),
            pairs = index_pairs.len(),
            "Semantic comparison complete"
        );

        Ok(SemanticComparison {
            metric: config.metric,
            matrix,
            top_pairs,
        })
    }

    fn prepare<'s>(&self, studies: &'s [StudyTermSet], metric: SemanticMetric) -> Prepared<'s>
    where
        'a: 's,
    {
        let mut prepared = Prepared::default();
        let terms = studies.iter().flat_map(|s| s.terms.iter());
        match metric {
            SemanticMetric::Jaccard => {
                prepared.expanded = studies.iter().map(|s| self.closure.expand(&s.terms)).collect();
            }
            SemanticMetric::Resnik | SemanticMetric::Lin => {
                for term in terms {
                    prepared
                        .lineage
                        .entry(term.as_str())
                        .or_insert_with(|| self.closure.ancestors_with_self(term));
                }
            }
            SemanticMetric::Wang => {
                if let Some(parents) = self.parents {
                    for term in terms {
                        prepared
                            .wang
                            .entry(term.as_str())
                            .or_insert_with(|| wang_semantic_values(term, parents));
                    }
                }
            }
        }
        prepared
    }

    fn study_pair(
        &self,
        a: &StudyTermSet,
        b: &StudyTermSet,
        i: usize,
        j: usize,
        prepared: &Prepared<'_>,
        config: &SemanticConfig,
    ) -> (f64, Vec<TermPair>) {
        let (score, pairs) = match config.metric {
            SemanticMetric::Jaccard => (jaccard(&prepared.expanded[i], &prepared.expanded[j]), Vec::new()),
            SemanticMetric::Resnik => best_match_average(&a.terms, &b.terms, |x, y| {
                self.resnik(&prepared.lineage[x], &prepared.lineage[y])
            }),
            SemanticMetric::Lin => best_match_average(&a.terms, &b.terms, |x, y| {
                self.lin(x, y, &prepared.lineage[x], &prepared.lineage[y])
            }),
            SemanticMetric::Wang => best_match_average(&a.terms, &b.terms, |x, y| {
                wang_score(&prepared.wang[x], &prepared.wang[y])
            }),
        };
        (score, rank_pairs(pairs, config.top_k))
    }

    /// Max IC over the common ancestors (each set includes its own term).
    fn resnik(&self, lineage_a: &TermSet, lineage_b: &TermSet) -> f64 {
        let Some(ic) = self.ic else { return 0.0 };
        lineage_a
            .intersection(lineage_b)
            .map(|t| ic.ic(t))
            .fold(0.0, f64::max)
    }

    fn lin(&self, a: &str, b: &str, lineage_a: &TermSet, lineage_b: &TermSet) -> f64 {
        let Some(ic) = self.ic else { return 0.0 };
        let denominator = ic.ic(a) + ic.ic(b);
        if denominator <= 0.0 {
            return 0.0;
        }
        2.0 * self.resnik(lineage_a, lineage_b) / denominator
    }
}

/// Raw and expanded overlap counts for each unordered study pair (self
/// pairs included, in input order), with the pair's score from `matrix`.
pub fn pairwise_summary(
    studies: &[StudyTermSet],
    closure: &AncestorClosure,
    matrix: &SimilarityMatrix,
) -> Vec<PairSummary> {
    let expanded: Vec<TermSet> = studies.iter().map(|s| closure.expand(&s.terms)).collect();
    let mut out = Vec::new();
    for i in 0..studies.len() {
        for j in i..studies.len() {
            let (raw_a, raw_b) = (&studies[i].terms, &studies[j].terms);
            let (exp_a, exp_b) = (&expanded[i], &expanded[j]);
            let raw_overlap = raw_a.intersection(raw_b).count();
            let exp_overlap = exp_a.intersection(exp_b).count();
            out.push(PairSummary {
                study_a: studies[i].study_id.clone(),
                study_b: studies[j].study_id.clone(),
                raw_a_terms: raw_a.len(),
                raw_b_terms: raw_b.len(),
                raw_overlap_terms: raw_overlap,
                raw_union_terms: raw_a.len() + raw_b.len() - raw_overlap,
                expanded_a_terms: exp_a.len(),
                expanded_b_terms: exp_b.len(),
                expanded_overlap_terms: exp_overlap,
                expanded_union_terms: exp_a.len() + exp_b.len() - exp_overlap,
                similarity_score: matrix
                    .get(&studies[i].study_id, &studies[j].study_id)
                    .unwrap_or(0.0),
            });
        }
    }
    out
}

// ── Tests ───────────────────────────────────────────────────────────────────


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn world() -> impl Strategy<Value = (TermMap<TermSet>, Vec<Vec<usize>>)> {
        let edges = proptest::collection::vec((1usize..15, 0usize..15), 0..30);
        let studies = proptest::collection::vec(proptest::collection::vec(0usize..15, 0..4), 1..5);
        (edges, studies).prop_map(|(edges, studies)| {
            let mut parents: TermMap<TermSet> = TermMap::new();
            for (child, parent) in edges {
                if parent < child {
                    parents
                        .entry(format!("T{}", child))
                        .or_default()
                        .insert(format!("T{}", parent));
                }
            }
            (parents, studies)
        })
    }

    proptest! {
        #[test]
        fn symmetric_and_bounded((parents, raw) in world()) {
            let closure = AncestorClosure::compute(&parents).unwrap();
            // ancestors have lower indices, so higher counts and lower IC
            let counts: TermMap<usize> = (0..15).map(|i| (format!("T{}", i), 20 - i)).collect();
            let studies: Vec<StudyTermSet> = raw
                .iter()
                .enumerate()
                .map(|(i, terms)| StudyTermSet::new(format!("s{}", i), terms.iter().map(|t| format!("T{}", t))))
                .collect();
            let engine = SemanticSimilarityEngine::new(&closure)
                .with_population_counts(&counts, 20)
                .with_parents(&parents);
            for metric in [SemanticMetric::Jaccard, SemanticMetric::Lin, SemanticMetric::Wang, SemanticMetric::Resnik] {
                let cmp = engine.compare(&studies, &SemanticConfig::default().with_metric(metric)).unwrap();
                for a in &studies {
                    for b in &studies {
                        let ab = cmp.matrix.get(&a.study_id, &b.study_id).unwrap();
                        prop_assert_eq!(ab, cmp.matrix.get(&b.study_id, &a.study_id).unwrap());
                        prop_assert!(ab >= 0.0);
                        if metric != SemanticMetric::Resnik {
                            prop_assert!(ab <= 1.0 + 1e-12);
                        }
                    }
                }
            }
        }
    }
}
