//! Principal Component Analysis.
//!
//! [`Pca::fit`] centres the data by subtracting the column-wise mean and
//! takes the thin SVD of the centred matrix; the right singular vectors are
//! the principal axes. Every other operation (projection, reconstruction,
//! reconstruction error, component-count selection) is derived from that
//! one decomposition.
//!
//! # Example
//!
//! ```rust
//! use ndarray::array;
//! use semcat_pca::{ComponentCount, Pca};
//!
//! let data = array![[1.0, 0.0, 1.0], [0.0, 1.0, 1.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0]];
//! let pca = Pca::fit(&data).unwrap();
//!
//! let k = pca.resolve(ComponentCount::Fixed(2)).unwrap();
//! let reduced = pca.transform(&data, k).unwrap();
//! assert_eq!(reduced.dim(), (4, 2));
//!
//! // Using every component reconstructs the input exactly.
//! let full = pca.max_components();
//! assert!(pca.reconstruction_error(&data, full).unwrap() < 1e-9);
//! ```

use ndarray::{Array1, Array2, Axis, s};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::mle;
use crate::svd::{Svd, thin_svd};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from fitting or applying a PCA model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PcaError {
    #[error("PCA needs at least one sample and one feature")]
    EmptyMatrix,
    #[error("Expected {expected} feature columns, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Requested {requested} components but only {available} are available")]
    TooManyComponents { requested: usize, available: usize },
    #[error("MLE component selection needs at least as many samples ({samples}) as features ({features})")]
    InsufficientSamples { samples: usize, features: usize },
}

// ─────────────────────────────────────────────────────────────────────────────
// ComponentCount
// ─────────────────────────────────────────────────────────────────────────────

/// How many principal components to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentCount {
    /// Keep exactly this many components.
    Fixed(usize),
    /// Estimate the count with Minka's MLE (see [`crate::mle`]).
    #[default]
    Mle,
}

impl fmt::Display for ComponentCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentCount::Fixed(k) => write!(f, "{k}"),
            ComponentCount::Mle => write!(f, "mle"),
        }
    }
}

impl FromStr for ComponentCount {
    type Err = String;

    /// Accepts `"mle"` (any case) or a non-negative integer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("mle") {
            return Ok(ComponentCount::Mle);
        }
        s.parse::<usize>()
            .map(ComponentCount::Fixed)
            .map_err(|_| format!("invalid component count '{s}': expected \"mle\" or an integer"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pca
// ─────────────────────────────────────────────────────────────────────────────

/// A fitted PCA model.
#[derive(Debug, Clone)]
pub struct Pca {
    /// Column-wise mean of the training data.
    mean: Array1<f64>,
    /// Principal axes, one per row, ordered by decreasing singular value.
    components: Array2<f64>,
    singular_values: Array1<f64>,
    n_samples: usize,
}

impl Pca {
    /// Fit the model to `data` (samples in rows, features in columns).
    pub fn fit(data: &Array2<f64>) -> Result<Self, PcaError> {
        let (n_samples, n_features) = data.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(PcaError::EmptyMatrix);
        }
        let mean = data.mean_axis(Axis(0)).ok_or(PcaError::EmptyMatrix)?;
        let centered = data - &mean;
        let Svd { s, vt, .. } = thin_svd(&centered);
        debug!(n_samples, n_features, rank = s.len(), "fitted PCA");
        Ok(Self {
            mean,
            components: vt,
            singular_values: s,
            n_samples,
        })
    }

    /// Fit to `data` and project it onto the components selected by `count`.
    ///
    /// Returns the fitted model, the resolved component count and the
    /// reduced matrix.
    pub fn fit_transform(
        data: &Array2<f64>,
        count: ComponentCount,
    ) -> Result<(Self, usize, Array2<f64>), PcaError> {
        let pca = Self::fit(data)?;
        let k = pca.resolve(count)?;
        let reduced = pca.transform(data, k)?;
        Ok((pca, k, reduced))
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Largest usable component count, `min(samples, features)`.
    pub fn max_components(&self) -> usize {
        self.singular_values.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn singular_values(&self) -> &Array1<f64> {
        &self.singular_values
    }

    /// Variance captured by each component, `s² / (n - 1)`.
    pub fn explained_variance(&self) -> Array1<f64> {
        let denom = self.n_samples.saturating_sub(1).max(1) as f64;
        self.singular_values.mapv(|s| s * s / denom)
    }

    /// Fraction of the total variance captured by each component. All zeros
    /// when the data has no variance.
    pub fn explained_variance_ratio(&self) -> Array1<f64> {
        let variance = self.explained_variance();
        let total = variance.sum();
        if total > 0.0 {
            variance / total
        } else {
            Array1::zeros(variance.len())
        }
    }

    /// Turn a [`ComponentCount`] into a concrete number of components.
    pub fn resolve(&self, count: ComponentCount) -> Result<usize, PcaError> {
        match count {
            ComponentCount::Fixed(k) => {
                if k > self.max_components() {
                    return Err(PcaError::TooManyComponents {
                        requested: k,
                        available: self.max_components(),
                    });
                }
                Ok(k)
            }
            ComponentCount::Mle => {
                if self.n_samples < self.n_features() {
                    return Err(PcaError::InsufficientSamples {
                        samples: self.n_samples,
                        features: self.n_features(),
                    });
                }
                let spectrum = self.explained_variance().to_vec();
                let k = mle::infer_dimension(&spectrum, self.n_samples);
                debug!(k, "MLE selected component count");
                Ok(k)
            }
        }
    }

    /// Project `data` onto the first `k` principal axes.
    pub fn transform(&self, data: &Array2<f64>, k: usize) -> Result<Array2<f64>, PcaError> {
        self.check_features(data.ncols())?;
        self.check_components(k)?;
        let axes = self.components.slice(s![..k, ..]);
        Ok((data - &self.mean).dot(&axes.t()))
    }

    /// Map reduced vectors back into feature space, re-adding the mean. The
    /// number of components is taken from `reduced.ncols()`.
    pub fn inverse_transform(&self, reduced: &Array2<f64>) -> Result<Array2<f64>, PcaError> {
        let k = reduced.ncols();
        self.check_components(k)?;
        let axes = self.components.slice(s![..k, ..]);
        Ok(reduced.dot(&axes) + &self.mean)
    }

    /// Rank-`k` approximation of `data`.
    pub fn reconstruct(&self, data: &Array2<f64>, k: usize) -> Result<Array2<f64>, PcaError> {
        self.inverse_transform(&self.transform(data, k)?)
    }

    /// Frobenius norm of `data - reconstruct(data, k)`.
    pub fn reconstruction_error(&self, data: &Array2<f64>, k: usize) -> Result<f64, PcaError> {
        let approx = self.reconstruct(data, k)?;
        Ok((data - &approx).iter().map(|x| x * x).sum::<f64>().sqrt())
    }

    /// Reconstruction error for every `k` in `0..=max_k`.
    ///
    /// Values of `k` beyond [`max_components`][Self::max_components] reuse
    /// the full-rank error, so the curve always has `max_k + 1` entries and
    /// is non-increasing.
    pub fn error_curve(&self, data: &Array2<f64>, max_k: usize) -> Result<Vec<f64>, PcaError> {
        (0..=max_k)
            .map(|k| self.reconstruction_error(data, k.min(self.max_components())))
            .collect()
    }

    fn check_features(&self, found: usize) -> Result<(), PcaError> {
        if found != self.n_features() {
            return Err(PcaError::DimensionMismatch {
                expected: self.n_features(),
                found,
            });
        }
        Ok(())
    }

    fn check_components(&self, k: usize) -> Result<(), PcaError> {
        if k > self.max_components() {
            return Err(PcaError::TooManyComponents {
                requested: k,
                available: self.max_components(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
