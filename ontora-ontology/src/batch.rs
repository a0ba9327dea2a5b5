//! Multi-study orchestration: run enrichment for several named studies
//! against one runner, select each study's terms, and compare them.

use ontora_core::{ItemId, OntoraError, Result};
use ontora_stats::enrichment::{Direction, EnrichmentConfig, EnrichmentRow, EnrichmentRunner, NamespaceFilter};
use tracing::{debug, warn};

use crate::semantic::{
    pairwise_summary, PairSummary, SemanticComparison, SemanticConfig, SemanticSimilarityEngine,
    StudyTermSet,
};

/// A named study item set.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Study {
    pub id: String,
    pub items: Vec<ItemId>,
}

impl Study {
    pub fn new<I, S>(id: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ItemId>,
    {
        Self {
            id: id.into(),
            items: items.into_iter().map(Into::into).collect(),
        }
    }
}

/// Run every study and concatenate `(study_id, row)` pairs in study order.
///
/// Rows within a study keep [`EnrichmentRunner::run_study`] ordering.
///
/// # Errors
///
/// [`OntoraError::InvalidInput`] on duplicate study ids; otherwise the first
/// per-study error.
pub fn run_batch(
    runner: &EnrichmentRunner,
    studies: &[Study],
    config: &EnrichmentConfig,
) -> Result<Vec<(String, EnrichmentRow)>> {
    check_unique(studies.iter().map(|s| s.id.as_str()))?;

    #[cfg(feature = "parallel")]
    let per_study: Vec<Result<Vec<EnrichmentRow>>> = {
        use rayon::prelude::*;
        studies
            .par_iter()
            .map(|s| runner.run_study(&s.items, config))
            .collect()
    };

    #[cfg(not(feature = "parallel"))]
    let per_study: Vec<Result<Vec<EnrichmentRow>>> = studies
        .iter()
        .map(|s| runner.run_study(&s.items, config))
        .collect();

    let mut out = Vec::new();
    for (study, rows) in studies.iter().zip(per_study) {
        out.extend(rows?.into_iter().map(|row| (study.id.clone(), row)));
    }

    debug!(studies = studies.len(), rows = out.len(), "Batch enrichment complete");
    Ok(out)
}

fn check_unique<'a>(ids: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(OntoraError::InvalidInput(format!("duplicate study id: {}", id)));
        }
    }
    Ok(())
}

/// Which enrichment rows feed the semantic comparison.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SemanticFilter {
    pub namespace: NamespaceFilter,
    /// Keep rows with `p_adjusted` at or below this ceiling.
    pub max_p_adjusted: Option<f64>,
}

impl SemanticFilter {
    pub fn with_namespace(mut self, namespace: NamespaceFilter) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_max_p_adjusted(mut self, ceiling: f64) -> Self {
        self.max_p_adjusted = Some(ceiling);
        self
    }

    fn accepts(&self, row: &EnrichmentRow) -> bool {
        row.direction == Direction::Over
            && self.namespace.accepts(&row.namespace)
            && self.max_p_adjusted.map_or(true, |max| row.p_adjusted <= max)
    }
}

/// Terms of `study_id`'s over-represented rows that pass `filter`.
///
/// `rows` may be a whole batch; rows of other studies are ignored.
pub fn select_terms<'r, I>(study_id: &str, rows: I, filter: &SemanticFilter) -> StudyTermSet
where
    I: IntoIterator<Item = &'r (String, EnrichmentRow)>,
{
    let terms = rows
        .into_iter()
        .filter(|(id, row)| id == study_id && filter.accepts(row))
        .map(|(_, row)| row.term.clone());
    StudyTermSet::new(study_id, terms)
}

/// Whether every study contributed terms to a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComparisonStatus {
    /// All studies had selected terms.
    Complete,
    /// Some studies had none; their scores are 0 against non-empty studies.
    PartiallyEmpty,
    /// No study had any selected term; nothing was compared.
    Skipped,
}

/// Outcome of [`compare_studies`].
#[derive(Debug, Clone, PartialEq)]
pub struct BatchComparison {
    pub status: ComparisonStatus,
    /// Studies whose selected term set was empty, in input order.
    pub empty_studies: Vec<String>,
    pub term_sets: Vec<StudyTermSet>,
    pub comparison: Option<SemanticComparison>,
    pub summary: Vec<PairSummary>,
}

/// Select each study's terms from batch rows and compare them.
///
/// Every study in `study_ids` gets a term set, even with no rows. If all
/// are empty the comparison is skipped.
pub fn compare_studies(
    engine: &SemanticSimilarityEngine<'_>,
    study_ids: &[String],
    rows: &[(String, EnrichmentRow)],
    filter: &SemanticFilter,
    config: &SemanticConfig,
) -> Result<BatchComparison> {
    engine.check(config.metric)?;
    check_unique(study_ids.iter().map(String::as_str))?;

    let term_sets: Vec<StudyTermSet> = study_ids
        .iter()
        .map(|id| select_terms(id, rows, filter))
        .collect();
    let empty_studies: Vec<String> = term_sets
        .iter()
        .filter(|s| s.terms.is_empty())
        .map(|s| s.study_id.clone())
        .collect();

    if !term_sets.is_empty() && empty_studies.len() == term_sets.len() {
        warn!(
            studies = term_sets.len(),
            "No selected terms in any study, semantic comparison skipped"
        );
        return Ok(BatchComparison {
            status: ComparisonStatus::Skipped,
            empty_studies,
            term_sets,
            comparison: None,
            summary: Vec::new(),
        });
    }

    let status = if empty_studies.is_empty() {
        ComparisonStatus::Complete
    } else {
        warn!(
            empty = ?empty_studies,
            "Some studies have no selected terms, their similarity is 0"
        );
        ComparisonStatus::PartiallyEmpty
    };

    let comparison = engine.compare(&term_sets, config)?;
    let summary = pairwise_summary(&term_sets, engine.closure(), &comparison.matrix);

    Ok(BatchComparison {
        status,
        empty_studies,
        term_sets,
        comparison: Some(comparison),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::AncestorClosure;
    use crate::graph::OntologyGraph;
    use crate::propagate::propagate;
    use crate::semantic::SemanticMetric;
    use ontora_core::ItemAnnotation;
    use ontora_stats::enrichment::TestDirection;
    use ontora_stats::CorrectionMethod;

    /// Root R (BP) with children A (BP) and B (MF); A2 under A.
    fn graph() -> OntologyGraph {
        let mut g = OntologyGraph::new();
        g.add_term("R", Some("biological_process"));
        g.add_term("A", Some("biological_process"));
        g.add_term("A2", Some("biological_process"));
        g.add_term("B", Some("molecular_function"));
        g.add_is_a("A", "R");
        g.add_is_a("A2", "A");
        g.add_is_a("B", "R");
        g
    }

    /// g0..g9 annotated with A2, g10..g19 with B, g20..g39 unannotated.
    fn direct_annotations() -> ItemAnnotation {
        let mut ann = ItemAnnotation::new();
        for i in 0..10 {
            ann.insert(format!("g{}", i), ["A2".to_string()].into_iter().collect());
        }
        for i in 10..20 {
            ann.insert(format!("g{}", i), ["B".to_string()].into_iter().collect());
        }
        ann
    }

    fn runner(g: &OntologyGraph, closure: &AncestorClosure) -> EnrichmentRunner {
        let ann = propagate(&direct_annotations(), closure);
        EnrichmentRunner::new((0..40).map(|i| format!("g{}", i)), ann, g.namespaces().clone())
    }

    fn over() -> EnrichmentConfig {
        EnrichmentConfig::default()
            .with_direction(TestDirection::Over)
            .with_method(CorrectionMethod::None)
    }

    #[test]
    fn batch_keeps_study_order() {
        let g = graph();
        let closure = AncestorClosure::compute(g.parents()).unwrap();
        let r = runner(&g, &closure);
        let studies = vec![
            Study::new("s2", ["g10", "g11"]),
            Study::new("s1", ["g0", "g1"]),
        ];
        let rows = run_batch(&r, &studies, &over()).unwrap();
        let first_s1 = rows.iter().position(|(id, _)| id == "s1").unwrap();
        assert!(rows[..first_s1].iter().all(|(id, _)| id == "s2"));
        assert!(rows[first_s1..].iter().all(|(id, _)| id == "s1"));

        let s1_alone = r.run_study(&studies[1].items, &over()).unwrap();
        let s1_batch: Vec<EnrichmentRow> = rows[first_s1..].iter().map(|(_, row)| row.clone()).collect();
        assert_eq!(s1_alone, s1_batch);
    }

    #[test]
    fn duplicate_studies_rejected() {
        let g = graph();
        let closure = AncestorClosure::compute(g.parents()).unwrap();
        let r = runner(&g, &closure);
        let studies = vec![Study::new("s", ["g0"]), Study::new("s", ["g1"])];
        assert!(matches!(
            run_batch(&r, &studies, &over()),
            Err(OntoraError::InvalidInput(_))
        ));
    }

    #[test]
    fn select_terms_filters() {
        let g = graph();
        let closure = AncestorClosure::compute(g.parents()).unwrap();
        let r = runner(&g, &closure);
        // B: 2 seen against 6·10/40 = 1.5 expected, so tested as over
        let studies = vec![Study::new("s1", ["g0", "g1", "g2", "g3", "g10", "g11"])];
        let config = EnrichmentConfig::default().with_method(CorrectionMethod::None);
        let rows = run_batch(&r, &studies, &config).unwrap();
        let b_row = rows.iter().find(|(_, row)| row.term == "B").map(|(_, row)| row).unwrap();
        assert_eq!(b_row.direction, Direction::Over);

        let all = select_terms("s1", &rows, &SemanticFilter::default());
        assert!(all.terms.contains("A2"));
        assert!(all.terms.contains("B"));
        // under-direction rows never selected
        for (_, row) in &rows {
            if row.direction == Direction::Under {
                assert!(!all.terms.contains(&row.term));
            }
        }

        let bp = select_terms(
            "s1",
            &rows,
            &SemanticFilter::default().with_namespace(NamespaceFilter::Only("BP".into())),
        );
        assert!(!bp.terms.contains("B"));
        assert!(bp.terms.contains("A"));

        let strict = select_terms("s1", &rows, &SemanticFilter::default().with_max_p_adjusted(0.05));
        assert!(strict.terms.contains("A2"));
        assert!(!strict.terms.contains("B"));

        assert!(select_terms("other", &rows, &SemanticFilter::default()).terms.is_empty());
    }

    #[test]
    fn under_represented_terms_not_selected() {
        let g = graph();
        let closure = AncestorClosure::compute(g.parents()).unwrap();
        let r = runner(&g, &closure);
        // B: 1 seen against 5·10/40 = 1.25 expected
        let studies = vec![Study::new("s1", ["g0", "g1", "g2", "g3", "g10"])];
        let config = EnrichmentConfig::default().with_method(CorrectionMethod::None);
        let rows = run_batch(&r, &studies, &config).unwrap();
        let b_row = rows.iter().find(|(_, row)| row.term == "B").map(|(_, row)| row).unwrap();
        assert_eq!(b_row.direction, Direction::Under);

        let selected = select_terms("s1", &rows, &SemanticFilter::default());
        assert!(!selected.terms.contains("B"));
        assert!(selected.terms.contains("A2"));
        assert!(selected.terms.contains("R"));
    }

    #[test]
    fn end_to_end_comparison() {
        let g = graph();
        let closure = AncestorClosure::compute(g.parents()).unwrap();
        let r = runner(&g, &closure);
        let studies = vec![
            Study::new("a_heavy", ["g0", "g1", "g2", "g3", "g4"]),
            Study::new("a_light", ["g5", "g6", "g7", "g30"]),
            Study::new("b_heavy", ["g10", "g11", "g12", "g13"]),
        ];
        let rows = run_batch(&r, &studies, &over()).unwrap();
        let ids: Vec<String> = studies.iter().map(|s| s.id.clone()).collect();
        let filter = SemanticFilter::default().with_max_p_adjusted(0.05);

        let engine = SemanticSimilarityEngine::new(&closure)
            .with_population_counts(r.pop_counts(), r.population_size())
            .with_parents(g.parents());
        for metric in [SemanticMetric::Jaccard, SemanticMetric::Lin, SemanticMetric::Wang] {
            let config = SemanticConfig::default().with_metric(metric);
            let out = compare_studies(&engine, &ids, &rows, &filter, &config).unwrap();
            assert_eq!(out.status, ComparisonStatus::Complete);
            let m = &out.comparison.as_ref().unwrap().matrix;
            let same = m.get("a_heavy", "a_light").unwrap();
            let diff = m.get("a_heavy", "b_heavy").unwrap();
            assert!(same > diff, "{}: {} vs {}", metric, same, diff);
            assert_eq!(out.summary.len(), 6);
        }
    }

    #[test]
    fn partially_empty_and_skipped() {
        let g = graph();
        let closure = AncestorClosure::compute(g.parents()).unwrap();
        let r = runner(&g, &closure);
        let studies = vec![
            Study::new("hit", ["g0", "g1", "g2", "g3"]),
            Study::new("miss", ["g30", "g31"]),
        ];
        let rows = run_batch(&r, &studies, &over()).unwrap();
        let engine = SemanticSimilarityEngine::new(&closure);
        let filter = SemanticFilter::default().with_max_p_adjusted(0.05);
        let config = SemanticConfig::default();

        let ids = vec!["hit".to_string(), "miss".to_string()];
        let out = compare_studies(&engine, &ids, &rows, &filter, &config).unwrap();
        assert_eq!(out.status, ComparisonStatus::PartiallyEmpty);
        assert_eq!(out.empty_studies, vec!["miss".to_string()]);
        let m = &out.comparison.unwrap().matrix;
        assert_eq!(m.get("hit", "miss"), Some(0.0));

        let ids = vec!["miss".to_string()];
        let out = compare_studies(&engine, &ids, &rows, &filter, &config).unwrap();
        assert_eq!(out.status, ComparisonStatus::Skipped);
        assert!(out.comparison.is_none());
        assert!(out.summary.is_empty());
    }

    #[test]
    fn configuration_checked_first() {
        let g = graph();
        let closure = AncestorClosure::compute(g.parents()).unwrap();
        let engine = SemanticSimilarityEngine::new(&closure);
        let err = compare_studies(
            &engine,
            &["x".to_string()],
            &[],
            &SemanticFilter::default(),
            &SemanticConfig::default().with_metric(SemanticMetric::Resnik),
        )
        .unwrap_err();
        assert!(matches!(err, OntoraError::Configuration(_)));
    }
}
