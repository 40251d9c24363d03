//! Spectral entropy similarity.
//!
//! Both spectra are cleaned (noise removal, centroiding, unit-sum
//! normalization), optionally entropy-weighted, and matched peak by peak
//! within a ppm window. For matched intensities `a` and `b`:
//!
//! ```text
//! similarity = sum((a + b) log2(a + b) - a log2(a) - b log2(b)) / 2
//! ```
//!
//! which equals `1 - (2 S_AB - S_A - S_B) / ln 4` for the Shannon entropies
//! of the two spectra and their merge.

use ndarray::{Array2, ArrayView2};
use serde_json::json;

use super::SpectralSimilarity;
use crate::data::Spectrum;
use crate::error::Result;
use crate::identity::{descriptor, Descriptor};

/// Peaks below this fraction of the base peak are noise.
const NOISE_THRESHOLD: f64 = 0.01;
/// Peaks closer than this (Da) are merged during cleaning.
const CENTROID_WINDOW_DA: f64 = 0.05;
/// Spectral entropy above which no weighting is applied.
const WEIGHT_ENTROPY_CUTOFF: f64 = 3.0;

/// Peaks as a 2 x n array: row 0 holds m/z, row 1 intensities.
pub fn peak_array(spectrum: &Spectrum) -> Array2<f64> {
    Array2::from_shape_fn((2, spectrum.len()), |(row, col)| {
        if row == 0 {
            spectrum.mz[col]
        } else {
            spectrum.intensities[col]
        }
    })
}

fn ppm_window(mz: f64, ppm: f64) -> f64 {
    mz * ppm * 1e-6
}

/// Noise removal, centroiding, unit-sum normalization. Output is sorted by
/// m/z.
pub fn clean_peaks(peaks: ArrayView2<f64>) -> Vec<(f64, f64)> {
    let mut kept: Vec<(f64, f64)> = peaks
        .columns()
        .into_iter()
        .map(|c| (c[0], c[1]))
        .filter(|(mz, int)| mz.is_finite() && int.is_finite() && *mz > 0.0 && *int > 0.0)
        .collect();
    let base = kept.iter().map(|p| p.1).fold(0.0_f64, f64::max);
    kept.retain(|p| p.1 >= NOISE_THRESHOLD * base);
    kept.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut centroided = centroid(&kept, CENTROID_WINDOW_DA);
    normalize_sum(&mut centroided);
    centroided
}

/// Merge peaks closer than `window` into the most intense one, with
/// intensity-weighted m/z. Input must be sorted by m/z.
fn centroid(peaks: &[(f64, f64)], window: f64) -> Vec<(f64, f64)> {
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| peaks[b].1.total_cmp(&peaks[a].1));

    let mut absorbed = vec![false; peaks.len()];
    let mut merged = Vec::with_capacity(peaks.len());
    for i in order {
        if absorbed[i] {
            continue;
        }
        let mz = peaks[i].0;
        let below = (0..i).rev().take_while(|&j| mz - peaks[j].0 < window);
        let above = (i + 1..peaks.len()).take_while(|&j| peaks[j].0 - mz < window);
        let mut intensity_sum = 0.0;
        let mut weighted_mz = 0.0;
        for j in std::iter::once(i).chain(below).chain(above) {
            if absorbed[j] {
                continue;
            }
            absorbed[j] = true;
            intensity_sum += peaks[j].1;
            weighted_mz += peaks[j].0 * peaks[j].1;
        }
        merged.push((weighted_mz / intensity_sum, intensity_sum));
    }
    merged.sort_by(|a, b| a.0.total_cmp(&b.0));
    merged
}

fn normalize_sum(peaks: &mut [(f64, f64)]) {
    let total: f64 = peaks.iter().map(|p| p.1).sum();
    if total > 0.0 {
        peaks.iter_mut().for_each(|p| p.1 /= total);
    }
}

/// Shannon entropy (natural log) of unit-sum intensities.
pub fn spectral_entropy(peaks: &[(f64, f64)]) -> f64 {
    -peaks
        .iter()
        .filter(|p| p.1 > 0.0)
        .map(|p| p.1 * p.1.ln())
        .sum::<f64>()
}

/// Low-entropy spectra get their intensities flattened by a power
/// `0.25 + 0.25 S`, then renormalized.
fn apply_entropy_weight(peaks: &mut [(f64, f64)]) {
    let entropy = spectral_entropy(peaks);
    if entropy < WEIGHT_ENTROPY_CUTOFF {
        let weight = 0.25 + 0.25 * entropy;
        peaks.iter_mut().for_each(|p| p.1 = p.1.powf(weight));
        normalize_sum(peaks);
    }
}

/// For each left peak, the most intense unused right peak inside the ppm
/// window. Returns matched intensity pairs.
fn match_peaks(left: &[(f64, f64)], right: &[(f64, f64)], tolerance_ppm: f64) -> Vec<(f64, f64)> {
    let mut used = vec![false; right.len()];
    let mut lowest = 0;
    let mut matched = Vec::new();
    for &(mz, intensity) in left {
        let window = ppm_window(mz, tolerance_ppm);
        while lowest < right.len() && right[lowest].0 < mz - window {
            lowest += 1;
        }
        let best = (lowest..right.len())
            .take_while(|&j| right[j].0 <= mz + window)
            .filter(|&j| !used[j])
            .max_by(|&a, &b| right[a].1.total_cmp(&right[b].1));
        if let Some(j) = best {
            used[j] = true;
            matched.push((intensity, right[j].1));
        }
    }
    matched
}

/// Entropy similarity between two 2 x n peak arrays.
pub fn entropy_similarity(
    left: ArrayView2<f64>,
    right: ArrayView2<f64>,
    tolerance_ppm: f64,
    weighted: bool,
) -> f64 {
    let mut left = clean_peaks(left);
    let mut right = clean_peaks(right);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    if weighted {
        apply_entropy_weight(&mut left);
        apply_entropy_weight(&mut right);
    }

    let xlog2x = |x: f64| if x > 0.0 { x * x.log2() } else { 0.0 };
    let score: f64 = match_peaks(&left, &right, tolerance_ppm)
        .into_iter()
        .map(|(a, b)| xlog2x(a + b) - xlog2x(a) - xlog2x(b))
        .sum::<f64>()
        / 2.0;
    score.clamp(0.0, 1.0)
}

fn ppm_descriptor(name: String, tolerance_ppm: f64) -> Descriptor {
    descriptor([("name", json!(name)), ("tolerance", json!(tolerance_ppm))])
}

// ---------------------------------------------------------------------------
// Measures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UnweightedEntropy {
    tolerance_ppm: f64,
}

impl UnweightedEntropy {
    pub fn new(tolerance_ppm: f64) -> Self {
        Self { tolerance_ppm }
    }
}

impl SpectralSimilarity for UnweightedEntropy {
    fn name(&self) -> String {
        "Unweighted MS Entropy".to_string()
    }

    fn compute_similarity(&self, left: &Spectrum, right: &Spectrum) -> Result<f64> {
        Ok(entropy_similarity(
            peak_array(left).view(),
            peak_array(right).view(),
            self.tolerance_ppm,
            false,
        ))
    }

    fn descriptor(&self) -> Descriptor {
        ppm_descriptor(self.name(), self.tolerance_ppm)
    }
}

#[derive(Debug, Clone)]
pub struct WeightedEntropy {
    tolerance_ppm: f64,
}

impl WeightedEntropy {
    pub fn new(tolerance_ppm: f64) -> Self {
        Self { tolerance_ppm }
    }
}

impl SpectralSimilarity for WeightedEntropy {
    fn name(&self) -> String {
        "Weighted MS Entropy".to_string()
    }

    fn compute_similarity(&self, left: &Spectrum, right: &Spectrum) -> Result<f64> {
        Ok(entropy_similarity(
            peak_array(left).view(),
            peak_array(right).view(),
            self.tolerance_ppm,
            true,
        ))
    }

    fn descriptor(&self) -> Descriptor {
        ppm_descriptor(self.name(), self.tolerance_ppm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(mz: &[f64], intensities: &[f64]) -> Spectrum {
        Spectrum::new(mz.to_vec(), intensities.to_vec())
    }

    #[test]
    fn peak_array_has_two_rows() {
        let array = peak_array(&spectrum(&[10.0, 20.0, 30.0], &[1.0, 2.0, 3.0]));
        assert_eq!(array.dim(), (2, 3));
        assert_eq!(array[[0, 2]], 30.0);
        assert_eq!(array[[1, 0]], 1.0);
    }

    #[test]
    fn cleaning_drops_noise_and_merges_close_peaks() {
        let s = spectrum(&[100.0, 100.02, 200.0, 300.0], &[1.0, 1.0, 2.0, 0.001]);
        let cleaned = clean_peaks(peak_array(&s).view());
        assert_eq!(cleaned.len(), 2);
        assert!((cleaned[0].0 - 100.01).abs() < 1e-9);
        assert!((cleaned[0].1 - 0.5).abs() < 1e-12);
        assert!((cleaned.iter().map(|p| p.1).sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn identical_spectra_score_one() {
        let s = spectrum(&[100.0, 150.0, 200.0], &[0.2, 1.0, 0.6]);
        for measure in [
            &UnweightedEntropy::new(20.0) as &dyn SpectralSimilarity,
            &WeightedEntropy::new(20.0),
        ] {
            let score = measure.compute_similarity(&s, &s).unwrap();
            assert!((score - 1.0).abs() < 1e-9, "{}: {score}", measure.name());
        }
    }

    #[test]
    fn disjoint_spectra_score_zero() {
        let a = spectrum(&[100.0, 150.0], &[1.0, 1.0]);
        let b = spectrum(&[400.0, 450.0], &[1.0, 1.0]);
        assert_eq!(UnweightedEntropy::new(20.0).compute_similarity(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn partial_overlap_is_between_bounds() {
        let a = spectrum(&[100.0, 150.0], &[1.0, 1.0]);
        let b = spectrum(&[100.0, 450.0], &[1.0, 1.0]);
        let score = UnweightedEntropy::new(20.0).compute_similarity(&a, &b).unwrap();
        // One shared peak of weight 0.5 on both sides: (1·log2 1 - 2·0.5·log2 0.5) / 2
        assert!((score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn weighting_flattens_low_entropy_spectra() {
        let mut peaks = vec![(100.0, 0.9), (200.0, 0.1)];
        apply_entropy_weight(&mut peaks);
        assert!(peaks[0].1 < 0.9);
        assert!((peaks[0].1 + peaks[1].1 - 1.0).abs() < 1e-12);
    }
}
