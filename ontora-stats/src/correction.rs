//! Multiple testing correction.
//!
//! When testing every ontology term at once, raw p-values must be adjusted
//! to control the family-wise error rate or false discovery rate.
//!
//! Every method returns a vector of the same length and order as its input,
//! with each value clipped to `[0, 1]`. For any input the adjusted values
//! satisfy, elementwise, `bonferroni >= bh`, `by >= bh`, and `holm >= bh`.

use std::fmt;
use std::str::FromStr;

use ontora_core::{OntoraError, Result};

/// Multiple testing correction method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CorrectionMethod {
    /// Benjamini-Hochberg step-up procedure; controls FDR under independence.
    #[default]
    BenjaminiHochberg,
    /// Benjamini-Yekutieli: BH scaled by the harmonic sum `c(m)`, valid under
    /// arbitrary dependence.
    BenjaminiYekutieli,
    /// Bonferroni correction; controls family-wise error rate (FWER).
    Bonferroni,
    /// Holm step-down procedure; controls FWER and is uniformly more powerful than
    /// Bonferroni.
    Holm,
    /// Raw p-values, clipped only.
    None,
}

impl CorrectionMethod {
    /// Canonical configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BenjaminiHochberg => "fdr_bh",
            Self::BenjaminiYekutieli => "fdr_by",
            Self::Bonferroni => "bonferroni",
            Self::Holm => "holm",
            Self::None => "none",
        }
    }
}

impl fmt::Display for CorrectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CorrectionMethod {
    type Err = OntoraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fdr_bh" | "bh" => Ok(Self::BenjaminiHochberg),
            "fdr_by" | "by" => Ok(Self::BenjaminiYekutieli),
            "bonferroni" => Ok(Self::Bonferroni),
            "holm" => Ok(Self::Holm),
            "none" | "raw" => Ok(Self::None),
            _ => Err(OntoraError::Configuration(format!(
                "unsupported multiple-testing method: {}",
                s
            ))),
        }
    }
}

/// Apply a multiple testing correction to `p_values`.
///
/// Returns a new `Vec<f64>` of adjusted p-values in the same order as the
/// input.
///
/// # Errors
///
/// Returns [`OntoraError::InvalidInput`] if any p-value is NaN.
pub fn correct(p_values: &[f64], method: CorrectionMethod) -> Result<Vec<f64>> {
    match method {
        CorrectionMethod::BenjaminiHochberg => benjamini_hochberg(p_values),
        CorrectionMethod::BenjaminiYekutieli => benjamini_yekutieli(p_values),
        CorrectionMethod::Bonferroni => bonferroni(p_values),
        CorrectionMethod::Holm => holm(p_values),
        CorrectionMethod::None => {
            validate_p_values(p_values)?;
            Ok(p_values.iter().map(|&p| clip01(p)).collect())
        }
    }
}

/// Bonferroni correction: `p_adj = min(p * m, 1.0)`.
pub fn bonferroni(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let m = p_values.len() as f64;
    Ok(p_values.iter().map(|&p| clip01(p * m)).collect())
}

/// Benjamini-Hochberg procedure for controlling the false discovery rate.
///
/// Sorts p-values, adjusts as `p * m / rank`, enforces monotonicity
/// from right to left, and clamps to [0, 1].
pub fn benjamini_hochberg(p_values: &[f64]) -> Result<Vec<f64>> {
    step_up(p_values, 1.0)
}

/// Benjamini-Yekutieli procedure: BH with every term scaled by
/// `c(m) = Σ_{k=1}^{m} 1/k`.
pub fn benjamini_yekutieli(p_values: &[f64]) -> Result<Vec<f64>> {
    let c_m: f64 = (1..=p_values.len()).map(|k| 1.0 / k as f64).sum();
    step_up(p_values, c_m)
}

/// Holm step-down procedure.
///
/// Sorts p-values ascending, adjusts as `(m - rank + 1) * p`, and carries
/// the running maximum from rank 1 upward.
pub fn holm(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let m = p_values.len();
    let order = ascending_order(p_values);

    let mut adjusted = vec![0.0; m];
    let mut running_max = 0.0_f64;
    for (i, &idx) in order.iter().enumerate() {
        let factor = (m - i) as f64;
        running_max = running_max.max(p_values[idx] * factor);
        adjusted[idx] = clip01(running_max);
    }
    Ok(adjusted)
}

/// Shared step-up scan for BH and BY: running minimum of
/// `p * m * scale / rank`, from the largest rank down.
fn step_up(p_values: &[f64], scale: f64) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let m = p_values.len();
    if m == 0 {
        return Ok(Vec::new());
    }

    let order = ascending_order(p_values);
    let m_f = m as f64;
    let mut adjusted = vec![0.0; m];

    let mut running_min = 1.0_f64;
    for i in (0..m).rev() {
        let rank = (i + 1) as f64;
        let idx = order[i];
        running_min = running_min.min(p_values[idx] * m_f * scale / rank);
        adjusted[idx] = clip01(running_min);
    }
    Ok(adjusted)
}

/// Indices of `p_values` sorted ascending; ties keep input order.
fn ascending_order(p_values: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..p_values.len()).collect();
    indices.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));
    indices
}

fn clip01(p: f64) -> f64 {
    p.clamp(0.0, 1.0)
}

fn validate_p_values(p_values: &[f64]) -> Result<()> {
    if let Some(i) = p_values.iter().position(|p| p.is_nan()) {
        return Err(OntoraError::InvalidInput(format!(
            "p-value at index {} is NaN",
            i
        )));
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────
