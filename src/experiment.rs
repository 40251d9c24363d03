//! The benchmark loop: sample spectra, score them with a spectral measure
//! and with every fingerprint, and correlate the two matrices.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cache::{write_table_file, ResultCache};
use crate::data::Spectrum;
use crate::datasets::{Apparatus, Dataset, GnpsDataset, Polarity, SyntheticDataset};
use crate::error::{Error, Result};
use crate::fingerprints::{all_fingerprints, jaccard};
use crate::identity::consistent_hash;
use crate::pool::WorkerPool;
use crate::similarity::{
    CosineGreedy, ModifiedCosine, NeutralLossesCosine, SpectralSimilarity, SpectrumEmbedding,
    UnweightedEntropy, WeightedEntropy,
};
use crate::stats::{kendall, pearson, spearman, Correlation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
    Kendall,
}

impl CorrelationMethod {
    pub const ALL: [CorrelationMethod; 3] = [
        CorrelationMethod::Pearson,
        CorrelationMethod::Spearman,
        CorrelationMethod::Kendall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CorrelationMethod::Pearson => "Pearson",
            CorrelationMethod::Spearman => "Spearman",
            CorrelationMethod::Kendall => "Kendall",
        }
    }

    pub fn correlate(self, x: &[f64], y: &[f64]) -> Correlation {
        match self {
            CorrelationMethod::Pearson => pearson(x, y),
            CorrelationMethod::Spearman => spearman(x, y),
            CorrelationMethod::Kendall => kendall(x, y),
        }
    }
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub dataset: String,
    pub fingerprint: String,
    pub spectral_similarity: String,
    pub correlation_method: CorrelationMethod,
    pub correlation: f64,
    pub p_value: f64,
}

pub fn write_results(path: &Path, rows: &[ResultRow]) -> Result<()> {
    write_table_file(path, rows)
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

fn smiles_of(spectra: &[Spectrum]) -> Result<Vec<String>> {
    spectra
        .iter()
        .map(|spectrum| {
            spectrum
                .smiles()
                .map(str::to_string)
                .ok_or_else(|| Error::Smiles {
                    smiles: String::new(),
                    reason: "spectrum has no SMILES annotation".to_string(),
                })
        })
        .collect()
}

/// Score one `(dataset, measure, quantity, random_state)` combination.
///
/// Rows and columns are sampled with the same seed, so both sides hold the
/// same spectra. Produces one row per fingerprint and correlation method.
pub fn experiment_step(
    dataset: &dyn Dataset,
    measure: &dyn SpectralSimilarity,
    quantity: usize,
    random_state: u64,
    pool: &WorkerPool,
) -> Result<Vec<ResultRow>> {
    let rows = dataset.sample_spectra(quantity, random_state)?;
    let columns = dataset.sample_spectra(quantity, random_state)?;

    let row_fingerprints = all_fingerprints(&smiles_of(&rows)?, pool)?;
    let column_fingerprints = all_fingerprints(&smiles_of(&columns)?, pool)?;

    let spectral: Vec<f64> = measure
        .transform(&rows, &columns, pool)?
        .iter()
        .map(|&v| f64::from(v))
        .collect();

    let mut results = Vec::with_capacity(row_fingerprints.len() * CorrelationMethod::ALL.len());
    for (name, row_fingerprint) in &row_fingerprints {
        let column_fingerprint = column_fingerprints
            .get(name)
            .ok_or_else(|| Error::ShapeMismatch(format!("no {name} fingerprint for columns")))?;
        let molecular: Vec<f64> = jaccard(row_fingerprint, column_fingerprint, pool)?
            .iter()
            .map(|&v| f64::from(v))
            .collect();

        for method in CorrelationMethod::ALL {
            let Correlation { statistic, p_value } = method.correlate(&molecular, &spectral);
            results.push(ResultRow {
                dataset: dataset.name(),
                fingerprint: name.clone(),
                spectral_similarity: measure.name(),
                correlation_method: method,
                correlation: statistic,
                p_value,
            });
        }
    }
    Ok(results)
}

/// Cache key of a step: the identities of its inputs, without worker count,
/// verbosity or the cache toggle.
pub fn step_key(
    dataset: &dyn Dataset,
    measure: &dyn SpectralSimilarity,
    quantity: usize,
    random_state: u64,
) -> String {
    consistent_hash(&json!({
        "step": "experiment_step",
        "dataset": dataset.consistent_hash(),
        "measure": measure.consistent_hash(),
        "quantity": quantity,
        "random_state": random_state,
    }))
}

pub fn cached_experiment_step(
    dataset: &dyn Dataset,
    measure: &dyn SpectralSimilarity,
    quantity: usize,
    random_state: u64,
    pool: &WorkerPool,
    cache: &ResultCache,
) -> Result<Vec<ResultRow>> {
    let key = step_key(dataset, measure, quantity, random_state);
    cache.get_or_compute(&key, || {
        log::info!(
            "{} / {}: quantity {quantity}, random state {random_state}",
            dataset.name(),
            measure.name()
        );
        experiment_step(dataset, measure, quantity, random_state, pool)
    })
}

/// Seed of the `iteration`-th repetition.
pub fn iteration_seed(random_state: u64, iteration: usize) -> u64 {
    let seed = u128::from(random_state) * (iteration as u128 + 1) % (1u128 << 32);
    seed as u64
}

// ---------------------------------------------------------------------------
// Full experiment
// ---------------------------------------------------------------------------

/// Spectral similarity measures that can be benchmarked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum MeasureKind {
    GreedyCosine,
    NeutralLossesCosine,
    ModifiedCosine,
    UnweightedEntropy,
    WeightedEntropy,
    Ms2deepscore,
}

impl MeasureKind {
    pub const DEFAULT: [MeasureKind; 3] = [
        MeasureKind::GreedyCosine,
        MeasureKind::NeutralLossesCosine,
        MeasureKind::ModifiedCosine,
    ];
}

#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub iterations: usize,
    pub quantity: usize,
    pub random_state: u64,
    pub data_directory: PathBuf,
    pub measures: Vec<MeasureKind>,
    /// Synthetic archive file name inside `data_directory`; its extension
    /// selects the loader.
    pub synthetic_archive: String,
    pub synthetic_url: Option<String>,
    pub embedding_model_url: Option<String>,
}

/// The synthetic dataset followed by every GNPS configuration.
pub fn default_datasets(config: &ExperimentConfig) -> Vec<Box<dyn Dataset>> {
    let mut datasets: Vec<Box<dyn Dataset>> = vec![Box::new(
        SyntheticDataset::new(&config.data_directory)
            .with_archive(config.synthetic_archive.clone())
            .with_url(config.synthetic_url.clone()),
    )];
    for polarity in Polarity::ALL {
        for apparatus in Apparatus::ALL {
            for only_lotus in [true, false] {
                datasets.push(Box::new(GnpsDataset::with_filters(
                    only_lotus,
                    polarity,
                    apparatus,
                    &config.data_directory,
                )));
            }
        }
    }
    datasets
}

/// Measures for one dataset, configured with its tolerance.
pub fn build_measures(
    kinds: &[MeasureKind],
    tolerance: f64,
    embedding: Option<&SpectrumEmbedding>,
) -> Result<Vec<Box<dyn SpectralSimilarity>>> {
    kinds
        .iter()
        .map(|kind| -> Result<Box<dyn SpectralSimilarity>> {
            Ok(match kind {
                MeasureKind::GreedyCosine => Box::new(CosineGreedy::new(tolerance)),
                MeasureKind::NeutralLossesCosine => Box::new(NeutralLossesCosine::new(tolerance)),
                MeasureKind::ModifiedCosine => Box::new(ModifiedCosine::new(tolerance)),
                MeasureKind::UnweightedEntropy => Box::new(UnweightedEntropy::new(tolerance)),
                MeasureKind::WeightedEntropy => Box::new(WeightedEntropy::new(tolerance)),
                MeasureKind::Ms2deepscore => Box::new(
                    embedding
                        .cloned()
                        .ok_or_else(|| Error::Model("embedding model is not loaded".to_string()))?,
                ),
            })
        })
        .collect()
}

/// Run every step over `datasets` and concatenate the tables.
pub fn run_experiment(
    config: &ExperimentConfig,
    datasets: &[Box<dyn Dataset>],
    pool: &WorkerPool,
    cache: &ResultCache,
) -> Result<Vec<ResultRow>> {
    let embedding = if config.measures.contains(&MeasureKind::Ms2deepscore) {
        Some(SpectrumEmbedding::new(
            &config.data_directory,
            config.embedding_model_url.as_deref(),
        )?)
    } else {
        None
    };

    let observer = pool.observer();
    let mut results = Vec::new();
    observer.stage_started("Datasets", datasets.len());
    for (done, dataset) in datasets.iter().enumerate() {
        let measures = build_measures(&config.measures, dataset.tolerance(), embedding.as_ref())?;
        for measure in &measures {
            for iteration in 0..config.iterations {
                let seed = iteration_seed(config.random_state, iteration);
                results.extend(cached_experiment_step(
                    dataset.as_ref(),
                    measure.as_ref(),
                    config.quantity,
                    seed,
                    pool,
                    cache,
                )?);
            }
        }
        observer.item_completed("Datasets", done + 1, datasets.len());
    }
    observer.stage_finished("Datasets");
    Ok(results)
}

/// Build the default datasets and run the experiment over them.
pub fn experiment(
    config: &ExperimentConfig,
    pool: &WorkerPool,
    cache: &ResultCache,
) -> Result<Vec<ResultRow>> {
    let datasets = default_datasets(config);
    run_experiment(config, &datasets, pool, cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::synthetic::DEFAULT_ARCHIVE;

    #[test]
    fn seeds_follow_iteration() {
        assert_eq!(iteration_seed(42, 0), 42);
        assert_eq!(iteration_seed(42, 1), 84);
        assert_eq!(iteration_seed(42, 2), 126);
        assert_eq!(iteration_seed(1 << 31, 1), 0);
        assert_eq!(iteration_seed(u64::MAX, 0), u64::from(u32::MAX));
    }

    #[test]
    fn default_measure_names() {
        let measures = build_measures(&MeasureKind::DEFAULT, 0.1, None).unwrap();
        let names: Vec<String> = measures.iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            vec!["Greedy Cosine", "Neutral Losses Cosine", "Modified Cosine"]
        );
    }

    #[test]
    fn embedding_measure_needs_a_model() {
        let Err(err) = build_measures(&[MeasureKind::Ms2deepscore], 0.1, None) else {
            panic!("embedding measure built without a model");
        };
        assert!(matches!(err, Error::Model(_)));
    }

    #[test]
    fn nineteen_default_datasets() {
        let config = ExperimentConfig {
            iterations: 1,
            quantity: 5,
            random_state: 1,
            data_directory: PathBuf::from("data"),
            measures: MeasureKind::DEFAULT.to_vec(),
            synthetic_archive: DEFAULT_ARCHIVE.to_string(),
            synthetic_url: None,
            embedding_model_url: None,
        };
        let datasets = default_datasets(&config);
        assert_eq!(datasets.len(), 19);
        assert_eq!(datasets[0].name(), "Synthetic");
        let hashes: std::collections::BTreeSet<String> =
            datasets.iter().map(|d| d.consistent_hash()).collect();
        assert_eq!(hashes.len(), 19);
    }

    #[test]
    fn step_key_ignores_nothing_it_should_not() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = SyntheticDataset::new(dir.path());
        let measure = CosineGreedy::new(0.01);
        let key = step_key(&dataset, &measure, 5, 1);
        assert_eq!(key, step_key(&dataset, &measure, 5, 1));
        assert_ne!(key, step_key(&dataset, &measure, 6, 1));
        assert_ne!(key, step_key(&dataset, &measure, 5, 2));
        assert_ne!(key, step_key(&dataset, &CosineGreedy::new(0.1), 5, 1));
    }
}
