//! Learned spectrum embeddings.
//!
//! A spectrum is binned into a fixed-length intensity vector and passed
//! through a stack of dense layers. Two spectra are compared by the cosine of
//! their embeddings.
//!
//! The model is a JSON document:
//!
//! ```json
//! {
//!   "min_mz": 10.0,
//!   "max_mz": 1000.0,
//!   "bin_width": 0.1,
//!   "intensity_scaling": 0.5,
//!   "layers": [
//!     { "weights": [[...], ...], "bias": [...], "activation": "relu" }
//!   ]
//! }
//! ```
//!
//! `weights` is `outputs x inputs`; the first layer takes one input per bin.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::Deserialize;
use serde_json::json;

use super::SpectralSimilarity;
use crate::data::download::{ensure_artifact, Downloader};
use crate::data::Spectrum;
use crate::error::{Error, Result};
use crate::identity::{descriptor, Descriptor};
use crate::pool::WorkerPool;

/// Model file name inside the data directory.
pub const MODEL_FILE: &str = "ms2deepscore_model.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Tanh,
    Linear,
}

impl Activation {
    fn apply(self, values: &mut Array1<f32>) {
        match self {
            Activation::Relu => values.mapv_inplace(|v| v.max(0.0)),
            Activation::Tanh => values.mapv_inplace(f32::tanh),
            Activation::Linear => {}
        }
    }
}

fn default_scaling() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct LayerConfig {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    activation: Activation,
}

#[derive(Debug, Deserialize)]
struct ModelConfig {
    min_mz: f64,
    max_mz: f64,
    bin_width: f64,
    #[serde(default = "default_scaling")]
    intensity_scaling: f64,
    layers: Vec<LayerConfig>,
}

#[derive(Debug, Clone)]
struct DenseLayer {
    weights: Array2<f32>,
    bias: Array1<f32>,
    activation: Activation,
}

/// A validated dense embedding network.
#[derive(Debug, Clone)]
pub struct EmbeddingModel {
    min_mz: f64,
    bin_width: f64,
    n_bins: usize,
    intensity_scaling: f64,
    layers: Vec<DenseLayer>,
}

impl EmbeddingModel {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        log::info!("loading embedding model from {}", path.display());
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let config: ModelConfig = serde_json::from_reader(reader)?;
        Self::from_config(config)
    }

    fn from_config(config: ModelConfig) -> Result<Self> {
        if !(config.bin_width > 0.0) || !(config.max_mz > config.min_mz) {
            return Err(Error::Model(format!(
                "invalid binning: [{}, {}) with width {}",
                config.min_mz, config.max_mz, config.bin_width
            )));
        }
        if config.layers.is_empty() {
            return Err(Error::Model("model has no layers".to_string()));
        }
        let n_bins = ((config.max_mz - config.min_mz) / config.bin_width).ceil() as usize;

        let mut inputs = n_bins;
        let mut layers = Vec::with_capacity(config.layers.len());
        for (index, layer) in config.layers.into_iter().enumerate() {
            let outputs = layer.weights.len();
            if layer.weights.iter().any(|row| row.len() != inputs) {
                return Err(Error::Model(format!(
                    "layer {index}: expected {inputs} inputs per weight row"
                )));
            }
            if layer.bias.len() != outputs {
                return Err(Error::Model(format!(
                    "layer {index}: {} biases for {outputs} outputs",
                    layer.bias.len()
                )));
            }
            let flat: Vec<f32> = layer.weights.into_iter().flatten().collect();
            let weights = Array2::from_shape_vec((outputs, inputs), flat)
                .map_err(|e| Error::Model(format!("layer {index}: {e}")))?;
            layers.push(DenseLayer {
                weights,
                bias: Array1::from(layer.bias),
                activation: layer.activation,
            });
            inputs = outputs;
        }

        Ok(Self {
            min_mz: config.min_mz,
            bin_width: config.bin_width,
            n_bins,
            intensity_scaling: config.intensity_scaling,
            layers,
        })
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn embedding_dim(&self) -> usize {
        self.layers.last().map_or(self.n_bins, |l| l.bias.len())
    }

    /// Binned intensity vector; each bin keeps its most intense peak, raised
    /// to `intensity_scaling`. Peaks outside the m/z range are dropped.
    pub fn bin(&self, spectrum: &Spectrum) -> Array1<f32> {
        let mut bins = Array1::zeros(self.n_bins);
        for (&mz, &intensity) in spectrum.mz.iter().zip(&spectrum.intensities) {
            if mz < self.min_mz || intensity <= 0.0 {
                continue;
            }
            let index = ((mz - self.min_mz) / self.bin_width).floor() as usize;
            if index < self.n_bins {
                let value = intensity.powf(self.intensity_scaling) as f32;
                bins[index] = f32::max(bins[index], value);
            }
        }
        bins
    }

    pub fn embed(&self, spectrum: &Spectrum) -> Array1<f32> {
        self.layers.iter().fold(self.bin(spectrum), |x, layer| {
            let mut y = layer.weights.dot(&x) + &layer.bias;
            layer.activation.apply(&mut y);
            y
        })
    }
}

fn cosine(a: &Array1<f32>, b: &Array1<f32>) -> f64 {
    let denominator = (a.dot(a) as f64).sqrt() * (b.dot(b) as f64).sqrt();
    if denominator == 0.0 {
        0.0
    } else {
        a.dot(b) as f64 / denominator
    }
}

/// Embeddings stacked as rows, each scaled to unit length (zero rows stay
/// zero).
fn unit_embeddings(model: &EmbeddingModel, spectra: &[Spectrum], pool: &WorkerPool) -> Array2<f32> {
    let vectors: Vec<Array1<f32>> =
        pool.install(|| spectra.par_iter().map(|s| model.embed(s)).collect());
    let mut stacked = Array2::zeros((spectra.len(), model.embedding_dim()));
    for (mut row, vector) in stacked.axis_iter_mut(Axis(0)).zip(&vectors) {
        let norm = vector.dot(vector).sqrt();
        if norm > 0.0 {
            row.assign(&(vector / norm));
        }
    }
    stacked
}

// ---------------------------------------------------------------------------
// Measure
// ---------------------------------------------------------------------------

/// Clones share one loaded model.
#[derive(Debug, Clone)]
pub struct SpectrumEmbedding {
    model: Arc<EmbeddingModel>,
}

impl SpectrumEmbedding {
    /// Load `MODEL_FILE` from `directory`, downloading it from `url` first
    /// when it is missing.
    pub fn new(directory: &Path, url: Option<&str>) -> Result<Self> {
        let path = directory.join(MODEL_FILE);
        ensure_artifact(Downloader::new, url, &path, "pass --embedding-model-url")?;
        Ok(Self::from_model(EmbeddingModel::load(&path)?))
    }

    pub fn from_model(model: EmbeddingModel) -> Self {
        Self {
            model: Arc::new(model),
        }
    }

    pub fn model(&self) -> &EmbeddingModel {
        &self.model
    }
}

impl SpectralSimilarity for SpectrumEmbedding {
    fn name(&self) -> String {
        "MS2DeepScore".to_string()
    }

    fn compute_similarity(&self, left: &Spectrum, right: &Spectrum) -> Result<f64> {
        Ok(cosine(&self.model.embed(left), &self.model.embed(right)))
    }

    fn descriptor(&self) -> Descriptor {
        descriptor([("name", json!(self.name()))])
    }

    /// Every spectrum is embedded once; the matrix is the product of the
    /// unit-length row and column embeddings.
    fn transform(
        &self,
        rows: &[Spectrum],
        columns: &[Spectrum],
        pool: &WorkerPool,
    ) -> Result<Array2<f32>> {
        let stage = self.name();
        let observer = pool.observer();
        observer.stage_started(&stage, 2);
        let row_embeddings = unit_embeddings(&self.model, rows, pool);
        observer.item_completed(&stage, 1, 2);
        let column_embeddings = unit_embeddings(&self.model, columns, pool);
        observer.item_completed(&stage, 2, 2);
        let matrix = row_embeddings.dot(&column_embeddings.t());
        observer.stage_finished(&stage);
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Ten 1 Da bins over [0, 10), an identity-like first layer folding them
    /// into three features.
    fn model_json() -> serde_json::Value {
        json!({
            "min_mz": 0.0,
            "max_mz": 10.0,
            "bin_width": 1.0,
            "layers": [
                {
                    "weights": [
                        [1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                        [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0],
                        [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]
                    ],
                    "bias": [0.0, 0.0, 0.0],
                    "activation": "relu"
                },
                {
                    "weights": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
                    "bias": [0.0, 0.0, 0.0],
                    "activation": "linear"
                }
            ]
        })
    }

    fn measure() -> SpectrumEmbedding {
        let model = EmbeddingModel::from_reader(model_json().to_string().as_bytes()).unwrap();
        SpectrumEmbedding::from_model(model)
    }

    fn spectrum(mz: &[f64], intensities: &[f64]) -> Spectrum {
        Spectrum::new(mz.to_vec(), intensities.to_vec())
    }

    #[test]
    fn binning_keeps_range_and_max() {
        let m = measure();
        let bins = m.model().bin(&spectrum(&[1.2, 1.7, 4.0, 12.0], &[0.5, 0.9, 1.0, 1.0]));
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[1], 0.9);
        assert_eq!(bins[4], 1.0);
        assert!((bins.sum() - 1.9).abs() < 1e-6);
    }

    #[test]
    fn embedding_cosine_scores() {
        let m = measure();
        let a = spectrum(&[1.0, 4.0], &[1.0, 1.0]);
        let b = spectrum(&[2.0, 5.0], &[1.0, 1.0]);
        let c = spectrum(&[7.0], &[1.0]);
        assert!((m.compute_similarity(&a, &b).unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(m.compute_similarity(&a, &c).unwrap(), 0.0);
    }

    #[test]
    fn transform_matches_pairwise_scores() {
        let m = measure();
        let spectra = vec![
            spectrum(&[1.0, 4.0], &[1.0, 0.5]),
            spectrum(&[7.0], &[1.0]),
            spectrum(&[0.5, 8.0], &[0.3, 1.0]),
        ];
        let pool = WorkerPool::new(2).unwrap();
        let matrix = m.transform(&spectra, &spectra[..2], &pool).unwrap();
        assert_eq!(matrix.dim(), (3, 2));
        for (i, row) in spectra.iter().enumerate() {
            for (j, column) in spectra[..2].iter().enumerate() {
                let direct = m.compute_similarity(row, column).unwrap() as f32;
                assert!((matrix[[i, j]] - direct).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut value = model_json();
        value["layers"][1]["bias"] = json!([0.0, 0.0]);
        let err = EmbeddingModel::from_reader(value.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Model(_)));

        let mut value = model_json();
        value["max_mz"] = json!(12.0);
        assert!(EmbeddingModel::from_reader(value.to_string().as_bytes()).is_err());
    }

    #[test]
    fn missing_model_without_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = SpectrumEmbedding::new(dir.path(), None).unwrap_err();
        assert!(matches!(err, Error::MissingArtifact { .. }));
    }

    #[test]
    fn clones_share_the_model() {
        let original = measure();
        let copy = original.clone();
        assert!(Arc::ptr_eq(&original.model, &copy.model));
    }

    #[test]
    fn descriptor_is_name_only() {
        let d = measure().descriptor();
        assert_eq!(d.len(), 1);
        assert_eq!(d["name"], "MS2DeepScore");
    }
}
