//! Correlating molecular fingerprint similarity with spectral similarity.
//!
//! ```text
//!  Dataset ──sample──▶ spectra ──SpectralSimilarity::transform──▶ spectral matrix ─┐
//!                        │                                                        ├─▶ Pearson / Spearman / Kendall
//!                        └──SMILES──▶ fingerprints ──jaccard──▶ molecular matrix ──┘
//! ```
//!
//! Every experiment step is cached on disk under the hash of its inputs.

pub mod cache;
pub mod color;
pub mod data;
pub mod datasets;
pub mod error;
pub mod experiment;
pub mod fingerprints;
pub mod identity;
pub mod plot;
pub mod pool;
pub mod progress;
pub mod similarity;
pub mod stats;

pub use error::{Error, Result};
