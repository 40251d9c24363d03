//! Cosine scores over greedily matched peaks.
//!
//! # Algorithm
//!
//! 1. Collect every peak pair whose m/z difference, after an optional shift,
//!    is within the tolerance. Each pair is scored by the product of the
//!    two intensities.
//! 2. Walk pairs from the highest score down, accepting a pair only if
//!    neither peak has been used yet.
//! 3. cos = sum(accepted products) / (||A|| x ||B||), norms over all peaks.
//!
//! The modified cosine also accepts pairs shifted by the precursor mass
//! difference; the neutral-loss cosine compares `precursor - mz` losses.

use serde_json::json;

use super::SpectralSimilarity;
use crate::data::Spectrum;
use crate::error::{Error, Result};
use crate::identity::{descriptor, Descriptor};

/// Losses above this m/z are discarded.
const MAX_LOSS_MZ: f64 = 1000.0;

/// A candidate pairing of peak `left` with peak `right`.
#[derive(Debug, Clone, Copy)]
struct PeakPair {
    left: usize,
    right: usize,
    score: f64,
}

/// Append all pairs with `|left_mz + shift - right_mz| <= tolerance`.
/// Both m/z slices must be sorted ascending.
fn collect_peak_pairs(
    left: (&[f64], &[f64]),
    right: (&[f64], &[f64]),
    tolerance: f64,
    shift: f64,
    pairs: &mut Vec<PeakPair>,
) {
    let (left_mz, left_int) = left;
    let (right_mz, right_int) = right;
    let mut lowest = 0;
    for (i, &mz) in left_mz.iter().enumerate() {
        let target = mz + shift;
        while lowest < right_mz.len() && right_mz[lowest] < target - tolerance {
            lowest += 1;
        }
        for j in lowest..right_mz.len() {
            if right_mz[j] > target + tolerance {
                break;
            }
            pairs.push(PeakPair {
                left: i,
                right: j,
                score: left_int[i] * right_int[j],
            });
        }
    }
}

/// Greedy cosine over precomputed candidate pairs.
fn score_pairs(mut pairs: Vec<PeakPair>, left_int: &[f64], right_int: &[f64]) -> f64 {
    let norm = |v: &[f64]| v.iter().map(|x| x * x).sum::<f64>().sqrt();
    let denominator = norm(left_int) * norm(right_int);
    if pairs.is_empty() || denominator == 0.0 {
        return 0.0;
    }

    pairs.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut left_used = vec![false; left_int.len()];
    let mut right_used = vec![false; right_int.len()];
    let mut total = 0.0;
    for pair in pairs {
        if left_used[pair.left] || right_used[pair.right] {
            continue;
        }
        left_used[pair.left] = true;
        right_used[pair.right] = true;
        total += pair.score;
    }
    (total / denominator).min(1.0)
}

/// Greedy cosine with peaks compared after `shifts` (0.0 is a plain match).
pub fn greedy_cosine(
    left: (&[f64], &[f64]),
    right: (&[f64], &[f64]),
    tolerance: f64,
    shifts: &[f64],
) -> f64 {
    let mut pairs = Vec::new();
    for &shift in shifts {
        collect_peak_pairs(left, right, tolerance, shift, &mut pairs);
    }
    score_pairs(pairs, left.1, right.1)
}

fn tolerance_descriptor(name: String, tolerance: f64) -> Descriptor {
    descriptor([("name", json!(name)), ("tolerance", json!(tolerance))])
}

fn require_precursor(spectrum: &Spectrum, measure: &str) -> Result<f64> {
    spectrum.precursor_mz().ok_or_else(|| Error::MissingPrecursor {
        measure: measure.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Greedy cosine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CosineGreedy {
    tolerance: f64,
}

impl CosineGreedy {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }
}

impl SpectralSimilarity for CosineGreedy {
    fn name(&self) -> String {
        "Greedy Cosine".to_string()
    }

    fn compute_similarity(&self, left: &Spectrum, right: &Spectrum) -> Result<f64> {
        Ok(greedy_cosine(
            (left.mz.as_slice(), left.intensities.as_slice()),
            (right.mz.as_slice(), right.intensities.as_slice()),
            self.tolerance,
            &[0.0],
        ))
    }

    fn descriptor(&self) -> Descriptor {
        tolerance_descriptor(self.name(), self.tolerance)
    }
}

// ---------------------------------------------------------------------------
// Modified cosine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ModifiedCosine {
    tolerance: f64,
}

impl ModifiedCosine {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }
}

impl SpectralSimilarity for ModifiedCosine {
    fn name(&self) -> String {
        "Modified Cosine".to_string()
    }

    fn compute_similarity(&self, left: &Spectrum, right: &Spectrum) -> Result<f64> {
        let name = self.name();
        let shift = require_precursor(right, &name)? - require_precursor(left, &name)?;
        let shifts = if shift.abs() <= f64::EPSILON {
            vec![0.0]
        } else {
            vec![0.0, shift]
        };
        Ok(greedy_cosine(
            (left.mz.as_slice(), left.intensities.as_slice()),
            (right.mz.as_slice(), right.intensities.as_slice()),
            self.tolerance,
            &shifts,
        ))
    }

    fn descriptor(&self) -> Descriptor {
        tolerance_descriptor(self.name(), self.tolerance)
    }
}

// ---------------------------------------------------------------------------
// Neutral-loss cosine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct NeutralLossesCosine {
    tolerance: f64,
}

impl NeutralLossesCosine {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }
}

/// Neutral losses `precursor - mz` in `[0, MAX_LOSS_MZ]`, ascending.
fn neutral_losses(spectrum: &Spectrum, precursor_mz: f64) -> (Vec<f64>, Vec<f64>) {
    let mut losses: Vec<(f64, f64)> = spectrum
        .mz
        .iter()
        .zip(&spectrum.intensities)
        .map(|(&mz, &intensity)| (precursor_mz - mz, intensity))
        .filter(|(loss, _)| (0.0..=MAX_LOSS_MZ).contains(loss))
        .collect();
    losses.sort_by(|a, b| a.0.total_cmp(&b.0));
    losses.into_iter().unzip()
}

impl SpectralSimilarity for NeutralLossesCosine {
    fn name(&self) -> String {
        "Neutral Losses Cosine".to_string()
    }

    fn compute_similarity(&self, left: &Spectrum, right: &Spectrum) -> Result<f64> {
        let name = self.name();
        let (left_loss, left_int) = neutral_losses(left, require_precursor(left, &name)?);
        let (right_loss, right_int) = neutral_losses(right, require_precursor(right, &name)?);
        Ok(greedy_cosine(
            (left_loss.as_slice(), left_int.as_slice()),
            (right_loss.as_slice(), right_int.as_slice()),
            self.tolerance,
            &[0.0],
        ))
    }

    fn descriptor(&self) -> Descriptor {
        tolerance_descriptor(self.name(), self.tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(mz: &[f64], intensities: &[f64], precursor: f64) -> Spectrum {
        Spectrum::new(mz.to_vec(), intensities.to_vec()).with("precursor_mz", precursor)
    }

    #[test]
    fn identical_spectra_score_one() {
        let s = spectrum(&[100.0, 200.0, 300.0], &[0.5, 1.0, 0.75], 350.0);
        for measure in [
            &CosineGreedy::new(0.1) as &dyn SpectralSimilarity,
            &ModifiedCosine::new(0.1),
            &NeutralLossesCosine::new(0.1),
        ] {
            let score = measure.compute_similarity(&s, &s).unwrap();
            assert!((score - 1.0).abs() < 1e-12, "{}: {score}", measure.name());
        }
    }

    #[test]
    fn disjoint_spectra_score_zero() {
        let a = spectrum(&[100.0, 200.0], &[1.0, 0.5], 250.0);
        let b = spectrum(&[500.0, 600.0], &[1.0, 0.5], 650.0);
        assert_eq!(CosineGreedy::new(0.1).compute_similarity(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn tolerance_controls_matching() {
        let a = spectrum(&[100.0], &[1.0], 150.0);
        let b = spectrum(&[100.3], &[1.0], 150.0);
        assert_eq!(CosineGreedy::new(0.1).compute_similarity(&a, &b).unwrap(), 0.0);
        let loose = CosineGreedy::new(0.5).compute_similarity(&a, &b).unwrap();
        assert!((loose - 1.0).abs() < 1e-12);
    }

    #[test]
    fn greedy_prefers_highest_product() {
        // 100.0 in `a` could pair with either 100.05 or 99.95 in `b`; the
        // larger product wins and the second b-peak stays unmatched.
        let a = spectrum(&[100.0], &[1.0], 150.0);
        let b = spectrum(&[99.95, 100.05], &[0.2, 1.0], 150.0);
        let score = CosineGreedy::new(0.1).compute_similarity(&a, &b).unwrap();
        let expected = 1.0 / (0.2_f64 * 0.2 + 1.0).sqrt();
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn modified_cosine_matches_shifted_fragments() {
        // Same fragmentation with a +14 Da modification on every fragment.
        let a = spectrum(&[100.0, 150.0, 200.0], &[1.0, 0.5, 0.8], 250.0);
        let b = spectrum(&[114.0, 164.0, 214.0], &[1.0, 0.5, 0.8], 264.0);
        let plain = CosineGreedy::new(0.1).compute_similarity(&a, &b).unwrap();
        let modified = ModifiedCosine::new(0.1).compute_similarity(&a, &b).unwrap();
        assert_eq!(plain, 0.0);
        assert!((modified - 1.0).abs() < 1e-12);
    }

    #[test]
    fn neutral_losses_align_by_precursor() {
        let a = spectrum(&[100.0, 150.0], &[1.0, 0.5], 250.0);
        let b = spectrum(&[114.0, 164.0], &[1.0, 0.5], 264.0);
        let score = NeutralLossesCosine::new(0.1).compute_similarity(&a, &b).unwrap();
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_precursor_is_an_error() {
        let a = Spectrum::new(vec![100.0], vec![1.0]);
        let err = ModifiedCosine::new(0.1).compute_similarity(&a, &a).unwrap_err();
        assert!(matches!(err, Error::MissingPrecursor { .. }));
    }

    #[test]
    fn descriptors_differ_by_tolerance() {
        assert_ne!(
            CosineGreedy::new(0.1).consistent_hash(),
            CosineGreedy::new(0.01).consistent_hash()
        );
        assert_ne!(
            CosineGreedy::new(0.1).consistent_hash(),
            ModifiedCosine::new(0.1).consistent_hash()
        );
    }
}
