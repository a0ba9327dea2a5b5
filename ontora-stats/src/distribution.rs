//! Numerical helpers for exact discrete distributions.

use core::f64::consts::PI;

/// Natural log of the gamma function via the Lanczos approximation (g=7).
pub fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 8] = [
        676.5203681218851,
        -1259.1392167224028,
        771.32342877765313,
        -176.61502916214059,
        12.507343278686905,
        -0.13857109526572012,
        9.9843695780195716e-6,
        1.5056327351493116e-7,
    ];

    if x < 0.5 {
        // Reflection formula: Γ(x) = π / (sin(πx) · Γ(1-x))
        let log_pi_over_sin = (PI / (PI * x).sin()).ln();
        log_pi_over_sin - ln_gamma(1.0 - x)
    } else {
        let x = x - 1.0;
        let mut ag = 0.99999999999980993_f64;
        for (i, &c) in COEFFS.iter().enumerate() {
            ag += c / (x + i as f64 + 1.0);
        }
        let t = x + 7.5; // g + 0.5
        0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + ag.ln()
    }
}

/// `ln(n!)`. Exact summation for small `n`, Lanczos above.
pub fn ln_factorial(n: usize) -> f64 {
    if n < 2 {
        return 0.0;
    }
    if n <= 20 {
        return (2..=n).map(|i| (i as f64).ln()).sum();
    }
    ln_gamma(n as f64 + 1.0)
}

/// `ln(C(n, k))`, or negative infinity when `k > n`.
pub fn ln_choose(n: usize, k: usize) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-10;

    #[test]
    fn ln_gamma_integers() {
        // Γ(5) = 24
        assert!((ln_gamma(5.0) - 24f64.ln()).abs() < TOL);
        assert!(ln_gamma(1.0).abs() < TOL);
        assert!(ln_gamma(2.0).abs() < TOL);
    }

    #[test]
    fn ln_factorial_matches_gamma_at_boundary() {
        assert!((ln_factorial(20) - ln_gamma(21.0)).abs() < 1e-9);
        assert!((ln_factorial(21) - ln_gamma(22.0)).abs() < TOL);
    }

    #[test]
    fn ln_choose_small() {
        assert!((ln_choose(5, 2).exp() - 10.0).abs() < 1e-9);
        assert!((ln_choose(100, 10).exp() - 17_310_309_456_440.0).abs() / 17_310_309_456_440.0 < 1e-9);
        assert!(ln_choose(7, 0).abs() < TOL);
        assert_eq!(ln_choose(3, 4), f64::NEG_INFINITY);
    }
}
