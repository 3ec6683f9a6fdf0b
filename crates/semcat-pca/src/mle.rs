//! Minka's MLE for the intrinsic dimensionality of PCA.
//!
//! Given the explained-variance spectrum of a fitted PCA (descending, one
//! value per feature) and the number of samples, every candidate rank
//! `1..n_features` is scored with the Laplace-approximated log evidence from
//! T. P. Minka, *Automatic choice of dimensionality for PCA* (NIPS 2000).
//! The rank with the highest score wins.

use std::f64::consts::PI;

const EPS: f64 = 1e-15;

/// Return the rank that maximises the log evidence of `spectrum`.
///
/// Rank `0` is never scored; it is only returned when every candidate rank
/// has a log evidence of `-inf` (e.g. an all-zero spectrum) or when the
/// spectrum has fewer than two entries.
pub fn infer_dimension(spectrum: &[f64], n_samples: usize) -> usize {
    let mut best = 0;
    let mut best_ll = f64::NEG_INFINITY;
    for rank in 1..spectrum.len() {
        let ll = assess_dimension(spectrum, rank, n_samples);
        if ll > best_ll {
            best_ll = ll;
            best = rank;
        }
    }
    best
}

/// Log evidence of a `rank`-dimensional PCA model for `spectrum`.
///
/// `rank` must lie in `1..spectrum.len()`.
pub fn assess_dimension(spectrum: &[f64], rank: usize, n_samples: usize) -> f64 {
    let n_features = spectrum.len();
    debug_assert!(rank >= 1 && rank < n_features);

    if spectrum[rank - 1] < EPS {
        return f64::NEG_INFINITY;
    }
    let n = n_samples as f64;
    let d = n_features as f64;
    let k = rank as f64;

    let mut pu = -k * 2f64.ln();
    for i in 1..=rank {
        let a = (d - i as f64 + 1.0) / 2.0;
        pu += ln_gamma(a) - PI.ln() * a;
    }

    let pl = -spectrum[..rank].iter().map(|s| s.ln()).sum::<f64>() * n / 2.0;

    let v = (spectrum[rank..].iter().sum::<f64>() / (d - k)).max(EPS);
    let pv = -v.ln() * n * (d - k) / 2.0;

    let m = d * k - k * (k + 1.0) / 2.0;
    let pp = (2.0 * PI).ln() * (m + k) / 2.0;

    let mut pa = 0.0;
    for i in 0..rank {
        let inv_i = 1.0 / spectrum[i];
        for j in (i + 1)..n_features {
            let inv_j = if j < rank { 1.0 / spectrum[j] } else { 1.0 / v };
            pa += ((spectrum[i] - spectrum[j]) * (inv_j - inv_i)).ln() + n.ln();
        }
    }

    pu + pl + pv + pp - pa / 2.0 - k * n.ln() / 2.0
}

/// Natural log of the gamma function (Lanczos approximation, g = 7).
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection: Γ(x)Γ(1-x) = π / sin(πx)
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut acc = COEFFS[0];
    for (i, &c) in COEFFS.iter().enumerate().skip(1) {
        acc += c / (x + i as f64);
    }
    let t = x + G + 0.5;
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}
