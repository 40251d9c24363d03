//! Spectral similarity measures.
//!
//! Every measure scores one pair of spectra; [`SpectralSimilarity::transform`]
//! turns that into a full rows x columns matrix on a [`WorkerPool`].

use ndarray::Array2;

use crate::data::Spectrum;
use crate::error::Result;
use crate::identity::{descriptor_hash, Descriptor};
use crate::pool::WorkerPool;

pub mod cosine;
pub mod embedding;
pub mod entropy;
pub mod transform;

pub use cosine::{CosineGreedy, ModifiedCosine, NeutralLossesCosine};
pub use embedding::SpectrumEmbedding;
pub use entropy::{UnweightedEntropy, WeightedEntropy};

/// A named, configured comparator between two spectra.
pub trait SpectralSimilarity: Send + Sync {
    fn name(&self) -> String;

    /// Score one pair. Symmetry is expected of well-behaved measures but not
    /// required.
    fn compute_similarity(&self, left: &Spectrum, right: &Spectrum) -> Result<f64>;

    fn descriptor(&self) -> Descriptor;

    fn consistent_hash(&self) -> String {
        descriptor_hash(&self.descriptor())
    }

    /// Full pairwise matrix, `rows.len()` x `columns.len()`.
    fn transform(
        &self,
        rows: &[Spectrum],
        columns: &[Spectrum],
        pool: &WorkerPool,
    ) -> Result<Array2<f32>> {
        transform::pairwise(self, rows, columns, pool)
    }
}
