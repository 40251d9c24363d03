use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde_json::json;

use super::{Apparatus, Dataset, Polarity};
use crate::data::download::Downloader;
use crate::data::filter::{clean_spectrum, harmonize_metadata, MetadataFilter};
use crate::data::loader::{load_column_values, load_file};
use crate::data::model::keys;
use crate::data::Spectrum;
use crate::error::Result;
use crate::identity::{descriptor, Descriptor};

pub const LIBRARY_URL: &str = "https://external.gnps2.org/processed_gnps_data/matchms.mgf";
pub const REFERENCE_URL: &str =
    "https://zenodo.org/record/7534071/files/230106_frozen_metadata.csv.gz";
pub const LIBRARY_FILE: &str = "matchms.mgf";
pub const REFERENCE_FILE: &str = "lotus_metadata.csv.gz";
/// Column of the reference table holding natural-product InChIKeys.
pub const REFERENCE_COLUMN: &str = "structure_inchikey";

/// The GNPS public spectral library, optionally restricted to LOTUS natural
/// products, one polarity, or one mass analyzer.
#[derive(Debug)]
pub struct GnpsDataset {
    only_lotus: bool,
    polarity: Polarity,
    apparatus: Apparatus,
    directory: PathBuf,
    spectra: OnceCell<Vec<Spectrum>>,
}

impl GnpsDataset {
    /// Fails with `UnknownPolarity` / `UnknownApparatus` on values outside
    /// the supported sets.
    pub fn new(
        only_lotus: bool,
        polarity: &str,
        apparatus: &str,
        directory: impl Into<PathBuf>,
    ) -> Result<Self> {
        Ok(Self::with_filters(
            only_lotus,
            polarity.parse()?,
            apparatus.parse()?,
            directory,
        ))
    }

    pub fn with_filters(
        only_lotus: bool,
        polarity: Polarity,
        apparatus: Apparatus,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            only_lotus,
            polarity,
            apparatus,
            directory: directory.into(),
            spectra: OnceCell::new(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn metadata_filter(&self, library: &Path) -> Result<MetadataFilter> {
        let mut filter = MetadataFilter::new()
            .require(keys::SMILES)
            .require(keys::INCHIKEY);

        if self.only_lotus {
            let reference = self.directory.join(REFERENCE_FILE);
            let inchikeys = load_column_values(&reference, REFERENCE_COLUMN)?;
            log::debug!(
                "{} reference structures for {}",
                inchikeys.len(),
                library.display()
            );
            filter = filter.allow(keys::INCHIKEY, inchikeys);
        }
        if self.polarity != Polarity::Both {
            filter = filter.allow(keys::IONMODE, [self.polarity.as_str()]);
        }
        if self.apparatus != Apparatus::All {
            filter = filter.allow(keys::MASS_ANALYZER, [self.apparatus.as_str()]);
        }
        Ok(filter)
    }

    fn load_spectra(&self) -> Result<Vec<Spectrum>> {
        let library = self.directory.join(LIBRARY_FILE);
        let reference = self.directory.join(REFERENCE_FILE);
        Downloader::new()?.download(&[LIBRARY_URL, REFERENCE_URL], &[&library, &reference])?;

        let filter = self.metadata_filter(&library)?;
        let raw = load_file(&library)?;
        let total = raw.len();

        let spectra: Vec<Spectrum> = raw
            .into_iter()
            .map(harmonize_metadata)
            .filter(|spectrum| filter.accepts(spectrum))
            .filter_map(clean_spectrum)
            .collect();

        log::info!("{}: kept {} of {total} spectra", self.name(), spectra.len());
        Ok(spectra)
    }
}

impl Dataset for GnpsDataset {
    fn name(&self) -> String {
        let mut descriptors: Vec<&str> = Vec::new();
        if self.only_lotus {
            descriptors.push("LOTUS");
        }
        match self.polarity {
            Polarity::Positive => descriptors.push("Positives"),
            Polarity::Negative => descriptors.push("Negatives"),
            Polarity::Both => {}
        }
        match self.apparatus {
            Apparatus::Qtof => descriptors.push("QTOF"),
            Apparatus::Orbitrap => descriptors.push("Orbitrap"),
            Apparatus::All => {}
        }

        if descriptors.is_empty() {
            "GNPS".to_string()
        } else {
            format!("GNPS ({})", descriptors.join(", "))
        }
    }

    fn tolerance(&self) -> f64 {
        0.1
    }

    fn spectra(&self) -> Result<&[Spectrum]> {
        self.spectra
            .get_or_try_init(|| self.load_spectra())
            .map(Vec::as_slice)
    }

    fn descriptor(&self) -> Descriptor {
        descriptor([
            ("name", json!(self.name())),
            ("tolerance", json!(self.tolerance())),
            ("only_lotus", json!(self.only_lotus)),
            ("polarity", json!(self.polarity.as_str())),
            ("apparatus", json!(self.apparatus.as_str())),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::MetadataValue;
    use crate::error::Error;
    use std::fs;
    use std::io::Write;

    const LIBRARY: &str = "\
BEGIN IONS
PEPMASS=195.08
SMILES=CN1C=NC2=C1C(=O)N(C(=O)N2C)C
INCHIKEY=RYYVLZVUVIJVGH-UHFFFAOYSA-N
IONMODE=Positive
MS_MASS_ANALYZER=orbitrap
138.06 100.0
110.07 40.0
END IONS
BEGIN IONS
PEPMASS=179.03
SMILES=CC(=O)OC1=CC=CC=C1C(=O)O
INCHIKEY=BSYNRYMUTXBXSQ-UHFFFAOYSA-N
IONMODE=negative
MS_MASS_ANALYZER=qtof
137.02 100.0
93.03 55.0
END IONS
BEGIN IONS
PEPMASS=151.06
SMILES=CC(=O)NC1=CC=C(O)C=C1
IONMODE=positive
MS_MASS_ANALYZER=qtof
110.06 100.0
END IONS
BEGIN IONS
PEPMASS=153.06
INCHIKEY=XXXXXXXXXXXXXX-UHFFFAOYSA-N
IONMODE=positive
MS_MASS_ANALYZER=qtof
65.0 10.0
END IONS
";

    fn fixture() -> tempfile::TempDir {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LIBRARY_FILE), LIBRARY).unwrap();
        let file = fs::File::create(dir.path().join(REFERENCE_FILE)).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder
            .write_all(b"structure_inchikey,structure_smiles\nRYYVLZVUVIJVGH-UHFFFAOYSA-N,x\n")
            .unwrap();
        encoder.finish().unwrap();
        dir
    }

    #[test]
    fn every_valid_configuration_constructs() {
        for polarity in ["positive", "negative", "both"] {
            for apparatus in ["qtof", "orbitrap", "all"] {
                for only_lotus in [true, false] {
                    assert!(GnpsDataset::new(only_lotus, polarity, apparatus, "data").is_ok());
                }
            }
        }
    }

    #[test]
    fn invalid_configuration_fails_eagerly() {
        assert!(matches!(
            GnpsDataset::new(false, "positives", "qtof", "data"),
            Err(Error::UnknownPolarity { .. })
        ));
        assert!(matches!(
            GnpsDataset::new(false, "both", "tof", "data"),
            Err(Error::UnknownApparatus { .. })
        ));
    }

    #[test]
    fn names_follow_configuration() {
        let all = GnpsDataset::with_filters(false, Polarity::Both, Apparatus::All, "data");
        assert_eq!(all.name(), "GNPS");
        let narrow = GnpsDataset::with_filters(true, Polarity::Positive, Apparatus::Qtof, "data");
        assert_eq!(narrow.name(), "GNPS (LOTUS, Positives, QTOF)");
    }

    #[test]
    fn hash_ignores_directory_and_loading() {
        let dir = fixture();
        let a = GnpsDataset::with_filters(false, Polarity::Both, Apparatus::All, dir.path());
        let b = GnpsDataset::with_filters(false, Polarity::Both, Apparatus::All, "elsewhere");
        a.spectra().unwrap();
        assert_eq!(a.consistent_hash(), b.consistent_hash());

        let c = GnpsDataset::with_filters(true, Polarity::Both, Apparatus::All, "elsewhere");
        assert_ne!(a.consistent_hash(), c.consistent_hash());
    }

    #[test]
    fn loading_applies_filters() {
        let dir = fixture();

        let both = GnpsDataset::with_filters(false, Polarity::Both, Apparatus::All, dir.path());
        // Two spectra lack an InChIKey or a SMILES.
        assert_eq!(both.spectra().unwrap().len(), 2);

        let positives =
            GnpsDataset::with_filters(false, Polarity::Positive, Apparatus::All, dir.path());
        let kept = positives.spectra().unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].intensities, vec![0.4, 1.0]);

        let qtof = GnpsDataset::with_filters(false, Polarity::Both, Apparatus::Qtof, dir.path());
        assert_eq!(
            qtof.spectra().unwrap()[0].get(keys::IONMODE),
            Some(&MetadataValue::from("negative"))
        );

        let lotus = GnpsDataset::with_filters(true, Polarity::Negative, Apparatus::All, dir.path());
        assert!(lotus.spectra().unwrap().is_empty());
        assert!(matches!(
            lotus.sample_spectra(1, 0),
            Err(Error::InsufficientSpectra { requested: 1, available: 0 })
        ));
    }
}
