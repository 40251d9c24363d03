//! Molecular fingerprints.
//!
//! ```text
//! SMILES ──parse──▶ Molecule ──encoder──▶ feature hashes ──mod n_bits──▶ FingerprintMatrix row
//! ```
//!
//! Four encoders share the same pipeline:
//!
//! | name      | features                                             |
//! |-----------|------------------------------------------------------|
//! | `ECFP`    | circular atom environments, radius 2                 |
//! | `Ring`    | rings, ring fusions, ring systems                    |
//! | `Layered` | linear paths hashed at six property layers           |
//! | `Path`    | linear paths over atom and bond types, two bits each |

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::error::Result;
use crate::pool::WorkerPool;

pub mod ecfp;
pub mod jaccard;
pub mod molecule;
pub mod paths;
pub mod ring;
pub mod smiles;

pub use jaccard::{jaccard, FingerprintMatrix};
pub use molecule::Molecule;
pub use smiles::parse_smiles;

/// Length of every fingerprint.
pub const FINGERPRINT_BITS: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FingerprintKind {
    Ecfp,
    Ring,
    Layered,
    Path,
}

impl FingerprintKind {
    pub const ALL: [FingerprintKind; 4] = [
        FingerprintKind::Ecfp,
        FingerprintKind::Ring,
        FingerprintKind::Layered,
        FingerprintKind::Path,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FingerprintKind::Ecfp => "ECFP",
            FingerprintKind::Ring => "Ring",
            FingerprintKind::Layered => "Layered",
            FingerprintKind::Path => "Path",
        }
    }

    pub fn features(self, molecule: &Molecule) -> Vec<u64> {
        match self {
            FingerprintKind::Ecfp => ecfp::ecfp_features(molecule, ecfp::ECFP_RADIUS),
            FingerprintKind::Ring => ring::ring_features(molecule),
            FingerprintKind::Layered => paths::layered_features(molecule),
            FingerprintKind::Path => paths::path_features(molecule),
        }
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Boost-style `hash_combine` over 64-bit words.
pub(crate) fn hash_combine(seed: u64, value: u64) -> u64 {
    seed ^ value
        .wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

pub(crate) fn hash_sequence(values: impl IntoIterator<Item = u64>) -> u64 {
    values.into_iter().fold(0, hash_combine)
}

/// SplitMix64 finalizer; spreads feature hashes before folding them onto
/// the bit range.
fn mix(mut h: u64) -> u64 {
    h = (h ^ (h >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    h ^ (h >> 31)
}

pub fn feature_bit(feature: u64, n_bits: usize) -> usize {
    (mix(feature) % n_bits as u64) as usize
}

// ---------------------------------------------------------------------------
// Batch encoding
// ---------------------------------------------------------------------------

/// One fingerprint matrix of `molecules` per encoder.
pub fn encode(
    kind: FingerprintKind,
    molecules: &[Molecule],
    n_bits: usize,
    pool: &WorkerPool,
) -> FingerprintMatrix {
    let features: Vec<Vec<u64>> =
        pool.install(|| molecules.par_iter().map(|m| kind.features(m)).collect());
    let mut matrix = FingerprintMatrix::zeros(molecules.len(), n_bits);
    for (row, hashes) in features.iter().enumerate() {
        for &feature in hashes {
            matrix.set(row, feature_bit(feature, n_bits));
        }
    }
    matrix
}

/// Parse every SMILES and compute all four fingerprints, keyed by encoder
/// name. Rows follow the input order.
pub fn all_fingerprints<S>(smiles: &[S], pool: &WorkerPool) -> Result<BTreeMap<String, FingerprintMatrix>>
where
    S: AsRef<str> + Sync,
{
    let molecules: Vec<Molecule> = pool.install(|| {
        smiles
            .par_iter()
            .map(|s| parse_smiles(s.as_ref()))
            .collect::<Result<Vec<_>>>()
    })?;
    log::debug!("parsed {} molecules", molecules.len());

    Ok(FingerprintKind::ALL
        .iter()
        .map(|&kind| {
            (
                kind.name().to_string(),
                encode(kind, &molecules, FINGERPRINT_BITS, pool),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const SMILES: [&str; 4] = [
        "CC(=O)Oc1ccccc1C(=O)O",
        "CN1C=NC2=C1C(=O)N(C(=O)N2C)C",
        "CCO",
        "c1ccc2ccccc2c1",
    ];

    #[test]
    fn four_named_fingerprints() {
        let pool = WorkerPool::new(2).unwrap();
        let fps = all_fingerprints(&SMILES, &pool).unwrap();
        let names: Vec<&str> = fps.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["ECFP", "Layered", "Path", "Ring"]);
        for matrix in fps.values() {
            assert_eq!(matrix.n_rows(), 4);
            assert_eq!(matrix.n_bits(), FINGERPRINT_BITS);
        }
        assert!(fps["ECFP"].count_ones(0) > 0);
        assert_eq!(fps["Ring"].count_ones(2), 0, "ethanol has no rings");
    }

    #[test]
    fn fingerprints_are_deterministic_and_order_preserving() {
        let pool = WorkerPool::new(3).unwrap();
        let a = all_fingerprints(&SMILES, &pool).unwrap();
        let b = all_fingerprints(&SMILES, &WorkerPool::new(1).unwrap()).unwrap();
        assert_eq!(a, b);

        let single = all_fingerprints(&SMILES[2..3], &pool).unwrap();
        assert_eq!(single["Path"].row(0), a["Path"].row(2));
    }

    #[test]
    fn unparsable_smiles_fail() {
        let pool = WorkerPool::new(1).unwrap();
        let err = all_fingerprints(&["CCO", "C1CC"], &pool).unwrap_err();
        assert!(matches!(err, Error::Smiles { .. }));
    }

    #[test]
    fn bits_are_in_range() {
        for feature in [0, 1, u64::MAX, 0x1234_5678] {
            assert!(feature_bit(feature, FINGERPRINT_BITS) < FINGERPRINT_BITS);
        }
    }
}
