//! Exact hypergeometric tail probabilities.
//!
//! X ~ Hypergeometric(N, K, n) counts annotated items in a study of size `n`
//! drawn without replacement from a population of `N` items, `K` of which
//! carry the annotation. Tails are summed term by term from the exact PMF in
//! log space; no normal or chi-squared approximation is involved.
//!
//! Degenerate inputs return well-defined values instead of errors:
//!
//! - `N == 0` or `n == 0`: 1.0 for either tail (no evidence).
//! - `K == 0`: 1.0 for either tail.
//! - `K > N` or `n > N` (infeasible draws): 1.0 for either tail.

use crate::distribution::ln_choose;

/// Parameters of one hypergeometric test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hypergeometric {
    /// Population size (N).
    pub pop_n: usize,
    /// Annotated items in the population (K).
    pub pop_count: usize,
    /// Study size (n).
    pub study_n: usize,
}

impl Hypergeometric {
    pub fn new(pop_n: usize, pop_count: usize, study_n: usize) -> Self {
        Self {
            pop_n,
            pop_count,
            study_n,
        }
    }

    /// Smallest feasible annotated count: `max(0, n - (N - K))`.
    pub fn min_k(&self) -> usize {
        self.study_n
            .saturating_sub(self.pop_n.saturating_sub(self.pop_count))
    }

    /// Largest feasible annotated count: `min(K, n)`.
    pub fn max_k(&self) -> usize {
        self.pop_count.min(self.study_n)
    }

    /// Expected annotated count `n·K/N`, or 0 for an empty population.
    pub fn mean(&self) -> f64 {
        if self.pop_n == 0 {
            return 0.0;
        }
        self.study_n as f64 * self.pop_count as f64 / self.pop_n as f64
    }

    /// P(X = k).
    pub fn pmf(&self, k: usize) -> f64 {
        if self.is_degenerate() || k < self.min_k() || k > self.max_k() {
            return 0.0;
        }
        let log_p = ln_choose(self.pop_count, k)
            + ln_choose(self.pop_n - self.pop_count, self.study_n - k)
            - ln_choose(self.pop_n, self.study_n);
        log_p.exp()
    }

    /// Over-representation tail: P(X >= k).
    ///
    /// `k` above the feasible maximum yields 1.0, as does `k == 0`.
    pub fn upper_tail(&self, k: usize) -> f64 {
        if self.is_degenerate() || self.pop_count == 0 || k == 0 {
            return 1.0;
        }
        let max_k = self.max_k();
        if k > max_k {
            return 1.0;
        }
        let start = k.max(self.min_k());
        clip01((start..=max_k).map(|i| self.pmf(i)).sum())
    }

    /// Under-representation tail: P(X <= k).
    ///
    /// `k` below the feasible minimum yields 0.0; at or above the feasible
    /// maximum the tail covers the whole support and yields 1.0.
    pub fn lower_tail(&self, k: usize) -> f64 {
        if self.is_degenerate() || self.pop_count == 0 {
            return 1.0;
        }
        let min_k = self.min_k();
        if k < min_k {
            return 0.0;
        }
        if k >= self.max_k() {
            return 1.0;
        }
        clip01((min_k..=k).map(|i| self.pmf(i)).sum())
    }

    fn is_degenerate(&self) -> bool {
        self.pop_n == 0
            || self.study_n == 0
            || self.pop_count > self.pop_n
            || self.study_n > self.pop_n
    }
}

/// P(X >= study_count) under Hypergeometric(pop_n, pop_count, study_n).
pub fn upper_tail(pop_n: usize, pop_count: usize, study_n: usize, study_count: usize) -> f64 {
    Hypergeometric::new(pop_n, pop_count, study_n).upper_tail(study_count)
}

/// P(X <= study_count) under Hypergeometric(pop_n, pop_count, study_n).
pub fn lower_tail(pop_n: usize, pop_count: usize, study_n: usize, study_count: usize) -> f64 {
    Hypergeometric::new(pop_n, pop_count, study_n).lower_tail(study_count)
}

fn clip01(p: f64) -> f64 {
    p.clamp(0.0, 1.0)
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    #[test]
    fn pmf_sums_to_one() {
        let h = Hypergeometric::new(100, 20, 10);
        let total: f64 = (0..=10).map(|k| h.pmf(k)).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pmf_small_exact() {
        // N=10, K=4, n=3: P(X=2) = C(4,2)·C(6,1)/C(10,3) = 36/120
        let h = Hypergeometric::new(10, 4, 3);
        assert!((h.pmf(2) - 0.3).abs() < TOL);
        assert_eq!(h.pmf(4), 0.0);
    }

    #[test]
    fn upper_tail_in_open_interval() {
        let p = upper_tail(100, 20, 10, 5);
        assert!(p > 0.0 && p < 1.0, "p = {}", p);
    }

    #[test]
    fn upper_tail_decreases_with_count() {
        let ps: Vec<f64> = (1..=10).map(|k| upper_tail(100, 20, 10, k)).collect();
        for w in ps.windows(2) {
            assert!(w[1] < w[0], "not decreasing: {} then {}", w[0], w[1]);
        }
    }

    #[test]
    fn upper_tail_known_value() {
        // N=10, K=4, n=3: P(X>=2) = (36 + 4)/120
        assert!((upper_tail(10, 4, 3, 2) - 40.0 / 120.0).abs() < TOL);
    }

    #[test]
    fn lower_tail_known_value() {
        // N=10, K=4, n=3: P(X<=1) = (20 + 60)/120
        assert!((lower_tail(10, 4, 3, 1) - 80.0 / 120.0).abs() < TOL);
    }

    #[test]
    fn tails_complement() {
        let h = Hypergeometric::new(50, 12, 15);
        for k in 1..=12 {
            let sum = h.lower_tail(k - 1) + h.upper_tail(k);
            assert!((sum - 1.0).abs() < 1e-9, "k = {}: {}", k, sum);
        }
    }

    #[test]
    fn degenerate_population_or_study() {
        assert_eq!(upper_tail(0, 0, 0, 0), 1.0);
        assert_eq!(lower_tail(0, 0, 0, 0), 1.0);
        assert_eq!(upper_tail(100, 20, 0, 0), 1.0);
        assert_eq!(lower_tail(100, 20, 0, 0), 1.0);
        assert_eq!(upper_tail(0, 5, 3, 2), 1.0);
        assert_eq!(lower_tail(0, 5, 3, 2), 1.0);
    }

    #[test]
    fn zero_population_count() {
        assert_eq!(upper_tail(10, 0, 5, 0), 1.0);
        assert_eq!(lower_tail(10, 0, 5, 0), 1.0);
    }

    #[test]
    fn infeasible_counts() {
        // max_k = min(4, 3) = 3
        assert_eq!(upper_tail(10, 4, 3, 4), 1.0);
        // min_k = 8 - (10 - 4) = 2
        assert_eq!(lower_tail(10, 4, 8, 1), 0.0);
        assert_eq!(lower_tail(10, 4, 8, 4), 1.0);
    }

    #[test]
    fn large_population_stays_in_range() {
        let p = upper_tail(20_000, 150, 400, 25);
        assert!(p > 0.0 && p < 1e-6, "p = {}", p);
        let q = lower_tail(20_000, 1500, 400, 5);
        assert!(q > 0.0 && q < 1e-6, "q = {}", q);
    }
}
