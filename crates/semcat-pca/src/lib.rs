//! `semcat-pca` – affordance compression.
//!
//! Principal component analysis over dense `f64` matrices, built on a
//! single SVD routine so that the diagnostic reconstruction-error curve and
//! the persisted reduced vectors always come from the same decomposition.
//!
//! # Modules
//!
//! - [`svd`] – thin singular value decomposition by one-sided Jacobi
//!   rotations.
//! - [`pca`] – [`Pca`][pca::Pca]: `fit / transform / inverse_transform /
//!   reconstruct / reconstruction_error` plus the component-count selection
//!   ([`ComponentCount`][pca::ComponentCount]).
//! - [`mle`] – Minka's maximum-likelihood estimate of the intrinsic
//!   dimensionality of a variance spectrum.

pub mod mle;
pub mod pca;
pub mod svd;

pub use pca::{ComponentCount, Pca, PcaError};
