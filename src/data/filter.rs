use std::collections::{BTreeMap, BTreeSet};

use super::model::{keys, MetadataValue, Spectrum};

// ---------------------------------------------------------------------------
// Metadata predicate: required fields and allowed values per field
// ---------------------------------------------------------------------------

/// Selection over spectrum metadata.
///
/// A spectrum passes when:
/// * every `required` field is present and non-blank, and
/// * for each constrained field, its value is in the allowed set.
///   A constrained field that is absent on the spectrum fails the check.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    required: Vec<String>,
    allowed: BTreeMap<String, BTreeSet<MetadataValue>>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject spectra where `key` is missing, null, or blank.
    pub fn require(mut self, key: &str) -> Self {
        self.required.push(key.to_string());
        self
    }

    /// Only keep spectra whose `key` holds one of `values`.
    pub fn allow<I, V>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<MetadataValue>,
    {
        self.allowed
            .entry(key.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn accepts(&self, spectrum: &Spectrum) -> bool {
        let present = |key: &str| match spectrum.get(key) {
            None | Some(MetadataValue::Null) => false,
            Some(MetadataValue::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        };
        if !self.required.iter().all(|key| present(key)) {
            return false;
        }
        self.allowed.iter().all(|(key, selected)| {
            spectrum
                .get(key)
                .is_some_and(|value| selected.contains(value))
        })
    }
}

// ---------------------------------------------------------------------------
// Spectrum cleanup
// ---------------------------------------------------------------------------

/// Placeholder annotations that libraries use for "unknown".
const MISSING_ANNOTATIONS: [&str; 5] = ["n/a", "na", "nan", "none", "null"];

/// Lowercase the categorical fields that dataset filters compare against and
/// drop placeholder structure annotations.
pub fn harmonize_metadata(mut spectrum: Spectrum) -> Spectrum {
    for key in [keys::IONMODE, keys::MASS_ANALYZER] {
        if let Some(MetadataValue::String(s)) = spectrum.metadata.get_mut(key) {
            *s = s.trim().to_ascii_lowercase();
        }
    }
    for key in [keys::SMILES, keys::INCHIKEY] {
        let placeholder = spectrum
            .get(key)
            .and_then(MetadataValue::as_str)
            .is_some_and(|s| MISSING_ANNOTATIONS.contains(&s.trim().to_ascii_lowercase().as_str()));
        if placeholder {
            spectrum.metadata.remove(key);
        }
    }
    spectrum
}

/// Default cleanup applied to every loaded spectrum.
///
/// Drops non-finite and non-positive peaks, sorts by m/z and harmonizes
/// metadata. Returns `None` when nothing usable is left: no peaks, or no
/// positive precursor m/z.
pub fn default_filters(spectrum: Spectrum) -> Option<Spectrum> {
    let mut spectrum = harmonize_metadata(spectrum);
    spectrum.precursor_mz()?;

    let mut peaks: Vec<(f64, f64)> = spectrum
        .mz
        .iter()
        .zip(&spectrum.intensities)
        .filter(|(mz, intensity)| {
            mz.is_finite() && intensity.is_finite() && **mz > 0.0 && **intensity > 0.0
        })
        .map(|(&mz, &intensity)| (mz, intensity))
        .collect();
    if peaks.is_empty() {
        return None;
    }
    peaks.sort_by(|a, b| a.0.total_cmp(&b.0));

    let (mz, intensities): (Vec<f64>, Vec<f64>) = peaks.into_iter().unzip();
    spectrum.mz = mz;
    spectrum.intensities = intensities;
    Some(spectrum)
}

/// Scale intensities so the base peak is 1.
pub fn normalize_intensities(mut spectrum: Spectrum) -> Spectrum {
    let max = spectrum.intensities.iter().copied().fold(0.0_f64, f64::max);
    if max > 0.0 {
        spectrum.intensities.iter_mut().for_each(|i| *i /= max);
    }
    spectrum
}

/// The cleanup + normalization step shared by every dataset.
pub fn clean_spectrum(spectrum: Spectrum) -> Option<Spectrum> {
    default_filters(spectrum).map(normalize_intensities)
}
