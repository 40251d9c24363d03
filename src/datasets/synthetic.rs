use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde_json::json;

use super::Dataset;
use crate::data::download::{ensure_artifact, Downloader};
use crate::data::filter::{clean_spectrum, MetadataFilter};
use crate::data::loader::load_file;
use crate::data::model::keys;
use crate::data::Spectrum;
use crate::error::Result;
use crate::identity::{descriptor, Descriptor};

/// Default archive file name inside the data directory.
pub const DEFAULT_ARCHIVE: &str = "isdb_pos_cleaned.parquet";

/// In-silico generated spectra shipped as a single archive.
#[derive(Debug)]
pub struct SyntheticDataset {
    directory: PathBuf,
    archive: String,
    url: Option<String>,
    spectra: OnceCell<Vec<Spectrum>>,
}

impl SyntheticDataset {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            archive: DEFAULT_ARCHIVE.to_string(),
            url: None,
            spectra: OnceCell::new(),
        }
    }

    /// Archive file name; the extension selects the loader.
    pub fn with_archive(mut self, archive: impl Into<String>) -> Self {
        self.archive = archive.into();
        self
    }

    /// Where to fetch the archive from when it is not on disk yet.
    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn archive_path(&self) -> PathBuf {
        self.directory.join(&self.archive)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn load_spectra(&self) -> Result<Vec<Spectrum>> {
        let path = self.archive_path();
        let hint = format!(
            "create it with `generate_sample --output {}` or pass --synthetic-url",
            path.display()
        );
        ensure_artifact(Downloader::new, self.url.as_deref(), &path, &hint)?;

        let filter = MetadataFilter::new().require(keys::SMILES);
        let raw = load_file(&path)?;
        let total = raw.len();
        let spectra: Vec<Spectrum> = raw
            .into_iter()
            .filter_map(clean_spectrum)
            .filter(|spectrum| filter.accepts(spectrum))
            .collect();

        log::info!("{}: kept {} of {total} spectra", self.name(), spectra.len());
        Ok(spectra)
    }
}

impl Dataset for SyntheticDataset {
    fn name(&self) -> String {
        "Synthetic".to_string()
    }

    fn tolerance(&self) -> f64 {
        0.01
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
            ("archive", json!(self.archive)),
        ])
    }
}
