//! Bit-packed fingerprint matrices and their pairwise similarity.

use ndarray::{Array2, ArrayView1, Axis};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::pool::WorkerPool;

const WORD_BITS: usize = u64::BITS as usize;

/// One fixed-length fingerprint per row, packed into `u64` words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintMatrix {
    n_bits: usize,
    words: Array2<u64>,
}

impl FingerprintMatrix {
    pub fn zeros(n_rows: usize, n_bits: usize) -> Self {
        let n_words = n_bits.div_ceil(WORD_BITS);
        Self {
            n_bits,
            words: Array2::zeros((n_rows, n_words)),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.words.nrows()
    }

    pub fn n_bits(&self) -> usize {
        self.n_bits
    }

    pub fn set(&mut self, row: usize, bit: usize) {
        self.words[[row, bit / WORD_BITS]] |= 1 << (bit % WORD_BITS);
    }

    pub fn get(&self, row: usize, bit: usize) -> bool {
        self.words[[row, bit / WORD_BITS]] & (1 << (bit % WORD_BITS)) != 0
    }

    pub fn count_ones(&self, row: usize) -> usize {
        self.row(row).iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn row(&self, row: usize) -> ArrayView1<'_, u64> {
        self.words.row(row)
    }
}

/// Fraction of bit positions on which two packed fingerprints agree.
fn matching_fraction(left: ArrayView1<u64>, right: ArrayView1<u64>, n_bits: usize) -> f32 {
    let differing: u32 = left
        .iter()
        .zip(right.iter())
        .map(|(a, b)| (a ^ b).count_ones())
        .sum();
    (n_bits - differing as usize) as f32 / n_bits as f32
}

/// Cell `(i, j)` is the share of the bit positions where row fingerprint
/// `i` and column fingerprint `j` agree. Rows are computed in parallel, each
/// worker filling its own output row.
pub fn jaccard(
    rows: &FingerprintMatrix,
    columns: &FingerprintMatrix,
    pool: &WorkerPool,
) -> Result<Array2<f32>> {
    if rows.n_bits != columns.n_bits {
        return Err(Error::ShapeMismatch(format!(
            "fingerprints of {} and {} bits",
            rows.n_bits, columns.n_bits
        )));
    }
    let n_bits = rows.n_bits;
    let mut similarity = Array2::zeros((rows.n_rows(), columns.n_rows()));
    if n_bits == 0 {
        similarity.fill(1.0);
        return Ok(similarity);
    }

    pool.install(|| {
        similarity
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, mut out)| {
                let left = rows.row(i);
                for (j, cell) in out.iter_mut().enumerate() {
                    *cell = matching_fraction(left, columns.row(j), n_bits);
                }
            });
    });
    Ok(similarity)
}
