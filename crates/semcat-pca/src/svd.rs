//! Thin Singular Value Decomposition.
//!
//! Computes `A = U · diag(S) · Vᵀ` for an `m × n` matrix with
//! `k = min(m, n)` singular values, using one-sided (Hestenes) Jacobi
//! rotations: pairs of columns are rotated until every pair is mutually
//! orthogonal, at which point the column norms are the singular values.
//!
//! The decomposition is made deterministic by sorting singular values in
//! descending order and flipping the sign of each singular pair so that the
//! largest-magnitude entry of every left singular vector is positive.
//!
//! # Example
//!
//! ```rust
//! use ndarray::array;
//! use semcat_pca::svd::thin_svd;
//!
//! let a = array![[3.0, 0.0], [0.0, 2.0], [0.0, 0.0]];
//! let svd = thin_svd(&a);
//! assert!((svd.s[0] - 3.0).abs() < 1e-12);
//! assert!((svd.s[1] - 2.0).abs() < 1e-12);
//! ```

use ndarray::{Array1, Array2, Axis};

/// Upper bound on full sweeps over all column pairs.
const MAX_SWEEPS: usize = 75;

/// Relative orthogonality threshold below which a column pair is left alone.
const TOLERANCE: f64 = 1e-15;

/// Result of [`thin_svd`].
#[derive(Debug, Clone)]
pub struct Svd {
    /// Left singular vectors, `m × k`, one per column.
    pub u: Array2<f64>,
    /// Singular values, descending, length `k`.
    pub s: Array1<f64>,
    /// Right singular vectors, `k × n`, one per row.
    pub vt: Array2<f64>,
}

/// Decompose `a` into its thin SVD.
pub fn thin_svd(a: &Array2<f64>) -> Svd {
    let (m, n) = a.dim();
    let mut svd = if m >= n {
        let (u, s, v) = jacobi(a.clone());
        Svd { u, s, vt: v.reversed_axes() }
    } else {
        // Aᵀ = U' S V'ᵀ  =>  A = V' S U'ᵀ
        let (u_t, s, v_t) = jacobi(a.t().to_owned());
        Svd {
            u: v_t,
            s,
            vt: u_t.reversed_axes(),
        }
    };
    sort_descending(&mut svd);
    flip_signs(&mut svd);
    svd
}

/// One-sided Jacobi on a tall (`m >= n`) matrix.
///
/// Returns `(U, S, V)` with `U` of shape `m × n` and `V` of shape `n × n`.
fn jacobi(mut work: Array2<f64>) -> (Array2<f64>, Array1<f64>, Array2<f64>) {
    let n = work.ncols();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..MAX_SWEEPS {
        let mut rotated = false;
        for p in 0..n {
            for q in (p + 1)..n {
                let (alpha, beta, gamma) = {
                    let cp = work.column(p);
                    let cq = work.column(q);
                    (cp.dot(&cp), cq.dot(&cq), cp.dot(&cq))
                };
                if gamma == 0.0 || gamma.abs() <= TOLERANCE * (alpha * beta).sqrt() {
                    continue;
                }
                rotated = true;

                let zeta = (beta - alpha) / (2.0 * gamma);
                let sign = if zeta >= 0.0 { 1.0 } else { -1.0 };
                let t = sign / (zeta.abs() + (1.0 + zeta * zeta).sqrt());
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = c * t;

                rotate_columns(&mut work, p, q, c, s);
                rotate_columns(&mut v, p, q, c, s);
            }
        }
        if !rotated {
            break;
        }
    }

    let mut sigma: Array1<f64> = (0..n)
        .map(|j| work.column(j).dot(&work.column(j)).sqrt())
        .collect();
    // Columns at round-off level carry no direction; keep them at zero so
    // the transposed case never yields spurious right singular vectors.
    let max_sigma = sigma.iter().copied().fold(0.0, f64::max);
    let cutoff = max_sigma * work.nrows().max(n) as f64 * f64::EPSILON;
    for j in 0..n {
        let norm = sigma[j];
        if norm > cutoff && norm > f64::MIN_POSITIVE {
            work.column_mut(j).mapv_inplace(|x| x / norm);
        } else {
            sigma[j] = 0.0;
            work.column_mut(j).fill(0.0);
        }
    }
    (work, sigma, v)
}

fn rotate_columns(m: &mut Array2<f64>, p: usize, q: usize, c: f64, s: f64) {
    for mut row in m.axis_iter_mut(Axis(0)) {
        let xp = row[p];
        let xq = row[q];
        row[p] = c * xp - s * xq;
        row[q] = s * xp + c * xq;
    }
}

fn sort_descending(svd: &mut Svd) {
    let mut order: Vec<usize> = (0..svd.s.len()).collect();
    order.sort_by(|&a, &b| svd.s[b].total_cmp(&svd.s[a]));
    if order.iter().enumerate().all(|(i, &j)| i == j) {
        return;
    }
    svd.s = order.iter().map(|&j| svd.s[j]).collect();
    svd.u = svd.u.select(Axis(1), &order);
    svd.vt = svd.vt.select(Axis(0), &order);
}

fn flip_signs(svd: &mut Svd) {
    for j in 0..svd.s.len() {
        let col = svd.u.column(j);
        let pivot = col
            .iter()
            .copied()
            .max_by(|a, b| a.abs().total_cmp(&b.abs()))
            .unwrap_or(0.0);
        if pivot < 0.0 {
            svd.u.column_mut(j).mapv_inplace(|x| -x);
            svd.vt.row_mut(j).mapv_inplace(|x| -x);
        }
    }
}
