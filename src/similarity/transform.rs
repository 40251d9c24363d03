use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{s, Array2};
use rayon::prelude::*;

use super::SpectralSimilarity;
use crate::data::Spectrum;
use crate::error::Result;
use crate::pool::WorkerPool;

/// Split `n_rows` into at most `n_jobs` contiguous, non-empty ranges whose
/// lengths differ by at most one. Every row belongs to exactly one range.
pub fn row_chunks(n_rows: usize, n_jobs: usize) -> Vec<Range<usize>> {
    let n_chunks = n_jobs.min(n_rows);
    if n_chunks == 0 {
        return Vec::new();
    }
    let base = n_rows / n_chunks;
    let remainder = n_rows % n_chunks;

    let mut start = 0;
    (0..n_chunks)
        .map(|i| {
            let len = base + usize::from(i < remainder);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Dense block of `measure` over every `rows` x `columns` pair.
pub fn similarity_block<S>(measure: &S, rows: &[Spectrum], columns: &[Spectrum]) -> Result<Array2<f32>>
where
    S: SpectralSimilarity + ?Sized,
{
    let mut block = Array2::zeros((rows.len(), columns.len()));
    for (i, row) in rows.iter().enumerate() {
        for (j, column) in columns.iter().enumerate() {
            block[[i, j]] = measure.compute_similarity(row, column)? as f32;
        }
    }
    Ok(block)
}

/// Pairwise matrix computed chunk-by-chunk on the pool.
///
/// Each worker gets one contiguous row chunk plus all columns and returns
/// its block by value. Blocks are collected in chunk order and copied to
/// their chunk's row offset.
pub fn pairwise<S>(
    measure: &S,
    rows: &[Spectrum],
    columns: &[Spectrum],
    pool: &WorkerPool,
) -> Result<Array2<f32>>
where
    S: SpectralSimilarity + ?Sized,
{
    let chunks = row_chunks(rows.len(), pool.n_jobs());
    let stage = measure.name();
    let observer = pool.observer();
    let total = chunks.len();
    let completed = AtomicUsize::new(0);

    observer.stage_started(&stage, total);
    let blocks: Vec<Array2<f32>> = pool.install(|| {
        chunks
            .par_iter()
            .map(|range| -> Result<Array2<f32>> {
                let block = similarity_block(measure, &rows[range.clone()], columns)?;
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                observer.item_completed(&stage, done, total);
                Ok(block)
            })
            .collect::<Result<Vec<_>>>()
    })?;

    let mut matrix = Array2::zeros((rows.len(), columns.len()));
    for (range, block) in chunks.iter().zip(&blocks) {
        matrix.slice_mut(s![range.clone(), ..]).assign(block);
    }
    observer.stage_finished(&stage);
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::identity::{descriptor, Descriptor};
    use serde_json::json;

    /// Scores a pair by the precursor masses so each cell is predictable.
    struct PrecursorProduct;

    impl SpectralSimilarity for PrecursorProduct {
        fn name(&self) -> String {
            "Precursor Product".to_string()
        }

        fn compute_similarity(&self, left: &Spectrum, right: &Spectrum) -> Result<f64> {
            let l = left.precursor_mz().ok_or(Error::MissingPrecursor {
                measure: self.name(),
            })?;
            let r = right.precursor_mz().ok_or(Error::MissingPrecursor {
                measure: self.name(),
            })?;
            Ok(l * 10.0 + r)
        }

        fn descriptor(&self) -> Descriptor {
            descriptor([("name", json!(self.name()))])
        }
    }

    fn spectra(n: usize) -> Vec<Spectrum> {
        (1..=n)
            .map(|i| Spectrum::new(vec![1.0], vec![1.0]).with("precursor_mz", i as f64))
            .collect()
    }

    #[test]
    fn chunks_cover_all_rows() {
        assert_eq!(row_chunks(7, 3), vec![0..3, 3..5, 5..7]);
        assert_eq!(row_chunks(6, 3), vec![0..2, 2..4, 4..6]);
        assert_eq!(row_chunks(2, 8), vec![0..1, 1..2]);
        assert!(row_chunks(0, 4).is_empty());
    }

    #[test]
    fn transform_has_rows_by_columns_shape() {
        let pool = WorkerPool::new(2).unwrap();
        let matrix = PrecursorProduct
            .transform(&spectra(5), &spectra(3), &pool)
            .unwrap();
        assert_eq!(matrix.dim(), (5, 3));
    }

    #[test]
    fn transform_covers_rows_not_divisible_by_jobs() {
        let rows = spectra(7);
        let columns = spectra(4);
        let pool = WorkerPool::new(3).unwrap();
        let matrix = PrecursorProduct.transform(&rows, &columns, &pool).unwrap();
        for i in 0..7 {
            for j in 0..4 {
                let expected = ((i + 1) * 10 + (j + 1)) as f32;
                assert_eq!(matrix[[i, j]], expected, "cell ({i}, {j})");
            }
        }
    }

    #[test]
    fn single_pair_reduces_to_compute_similarity() {
        let rows = spectra(1);
        let columns = spectra(2)[1..].to_vec();
        let pool = WorkerPool::new(4).unwrap();
        let matrix = PrecursorProduct.transform(&rows, &columns, &pool).unwrap();
        let direct = PrecursorProduct
            .compute_similarity(&rows[0], &columns[0])
            .unwrap();
        assert_eq!(matrix.dim(), (1, 1));
        assert_eq!(matrix[[0, 0]], direct as f32);
    }

    #[test]
    fn chunk_errors_propagate() {
        let mut rows = spectra(4);
        rows[3].metadata.clear();
        let pool = WorkerPool::new(2).unwrap();
        let result = PrecursorProduct.transform(&rows, &spectra(2), &pool);
        assert!(matches!(result, Err(Error::MissingPrecursor { .. })));
    }
}
