//! Spectral datasets.
//!
//! A dataset is identified by its configuration, not by its content: the
//! [`Dataset::consistent_hash`] of two datasets built with the same
//! parameters is identical whether or not their spectra have been loaded.

use std::fmt;
use std::str::FromStr;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::data::Spectrum;
use crate::error::{Error, Result};
use crate::identity::{descriptor_hash, Descriptor};

pub mod gnps;
pub mod synthetic;

pub use gnps::GnpsDataset;
pub use synthetic::SyntheticDataset;

/// A named, configured collection of spectra.
pub trait Dataset: Send + Sync {
    fn name(&self) -> String;

    /// m/z tolerance to use with spectral similarity measures.
    fn tolerance(&self) -> f64;

    /// Loaded spectra. The first call loads them; later calls return the
    /// same slice.
    fn spectra(&self) -> Result<&[Spectrum]>;

    fn descriptor(&self) -> Descriptor;

    fn consistent_hash(&self) -> String {
        descriptor_hash(&self.descriptor())
    }

    /// Uniform sample of `quantity` distinct spectra, deterministic in
    /// `random_state`.
    fn sample_spectra(&self, quantity: usize, random_state: u64) -> Result<Vec<Spectrum>> {
        let spectra = self.spectra()?;
        if quantity > spectra.len() {
            return Err(Error::InsufficientSpectra {
                requested: quantity,
                available: spectra.len(),
            });
        }
        let mut rng = ChaCha8Rng::seed_from_u64(random_state);
        Ok(rand::seq::index::sample(&mut rng, spectra.len(), quantity)
            .into_iter()
            .map(|i| spectra[i].clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Enumerated configuration values
// ---------------------------------------------------------------------------

/// Ionization mode filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Polarity {
    Positive,
    Negative,
    Both,
}

impl Polarity {
    pub const ALL: [Polarity; 3] = [Polarity::Positive, Polarity::Negative, Polarity::Both];

    pub fn as_str(self) -> &'static str {
        match self {
            Polarity::Positive => "positive",
            Polarity::Negative => "negative",
            Polarity::Both => "both",
        }
    }
}

impl FromStr for Polarity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "positive" => Ok(Polarity::Positive),
            "negative" => Ok(Polarity::Negative),
            "both" => Ok(Polarity::Both),
            other => Err(Error::UnknownPolarity {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mass analyzer filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Apparatus {
    Qtof,
    Orbitrap,
    All,
}

impl Apparatus {
    pub const ALL: [Apparatus; 3] = [Apparatus::Qtof, Apparatus::Orbitrap, Apparatus::All];

    pub fn as_str(self) -> &'static str {
        match self {
            Apparatus::Qtof => "qtof",
            Apparatus::Orbitrap => "orbitrap",
            Apparatus::All => "all",
        }
    }
}

impl FromStr for Apparatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "qtof" => Ok(Apparatus::Qtof),
            "orbitrap" => Ok(Apparatus::Orbitrap),
            "all" => Ok(Apparatus::All),
            other => Err(Error::UnknownApparatus {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Apparatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
