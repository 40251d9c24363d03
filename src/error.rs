use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading datasets, scoring spectra, or running the
/// experiment.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown polarity: {value}: we only support 'positive', 'negative' and 'both'.")]
    UnknownPolarity { value: String },

    #[error("Unknown apparatus: {value}: we only support 'orbitrap', 'qtof' and 'all'.")]
    UnknownApparatus { value: String },

    #[error("cannot sample {requested} spectra from a dataset holding {available}")]
    InsufficientSpectra { requested: usize, available: usize },

    #[error("the number of jobs must be at least 1")]
    InvalidJobs,

    #[error("building worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("{}: artifact is missing and no download URL is configured; {hint}", path.display())]
    MissingArtifact { path: PathBuf, hint: String },

    #[error("downloading {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("invalid SMILES '{smiles}': {reason}")]
    Smiles { smiles: String, reason: String },

    #[error("embedding model: {0}")]
    Model(String),

    #[error("spectrum has no precursor m/z, required by {measure}")]
    MissingPrecursor { measure: String },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Errors from the spectrum file loaders, which carry `anyhow` context.
    #[error(transparent)]
    Load(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
