use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;

use spectral_correlation::cache::ResultCache;
use spectral_correlation::data::Spectrum;
use spectral_correlation::datasets::{Dataset, SyntheticDataset};
use spectral_correlation::experiment::{
    cached_experiment_step, default_datasets, experiment_step, iteration_seed, run_experiment,
    write_results, CorrelationMethod, ExperimentConfig, MeasureKind, ResultRow,
};
use spectral_correlation::identity::Descriptor;
use spectral_correlation::pool::WorkerPool;
use spectral_correlation::similarity::{CosineGreedy, SpectralSimilarity};
use spectral_correlation::Error;

/// Ring systems that all differ, so every fingerprint matrix has
/// off-diagonal values below one.
const SMILES: [&str; 12] = [
    "c1ccccc1",
    "c1ccncc1",
    "C1CCCCC1",
    "C1CC1",
    "C1CCC1",
    "C1CCCC1",
    "c1ccc2ccccc2c1",
    "c1ccoc1",
    "c1ccsc1",
    "C1CCOC1",
    "C1CCNCC1",
    "c1cc[nH]c1",
];

fn write_archive(dir: &Path) {
    let records: Vec<serde_json::Value> = SMILES
        .iter()
        .enumerate()
        .map(|(i, smiles)| {
            let base = 40.0 + 7.0 * i as f64;
            json!({
                "mz": [base, base + 14.0, base + 28.03, base + 45.5],
                "intensities": [20.0 + i as f64, 100.0, 35.0, 5.0 * (i + 1) as f64],
                "smiles": smiles,
                "precursor_mz": base + 60.0,
            })
        })
        .collect();
    fs::write(
        dir.join("synthetic.json"),
        serde_json::to_string(&records).unwrap(),
    )
    .unwrap();
}

fn dataset(dir: &Path) -> SyntheticDataset {
    SyntheticDataset::new(dir).with_archive("synthetic.json")
}

/// Greedy cosine that counts how many pairs it scored.
struct CountingCosine {
    inner: CosineGreedy,
    calls: Arc<AtomicUsize>,
}

impl SpectralSimilarity for CountingCosine {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn compute_similarity(
        &self,
        left: &Spectrum,
        right: &Spectrum,
    ) -> spectral_correlation::Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.compute_similarity(left, right)
    }

    fn descriptor(&self) -> Descriptor {
        self.inner.descriptor()
    }
}

fn csv_bytes(dir: &Path, rows: &[ResultRow]) -> Vec<u8> {
    let path = dir.join("rows.csv");
    write_results(&path, rows).unwrap();
    fs::read(path).unwrap()
}

#[test]
fn step_produces_one_row_per_fingerprint_and_method() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(dir.path());
    let pool = WorkerPool::new(2).unwrap();

    let rows = experiment_step(&dataset(dir.path()), &CosineGreedy::new(0.1), 5, 7, &pool).unwrap();
    assert_eq!(rows.len(), 12);

    for row in &rows {
        assert_eq!(row.dataset, "Synthetic");
        assert_eq!(row.spectral_similarity, "Greedy Cosine");
        assert!((-1.0..=1.0).contains(&row.correlation), "{row:?}");
        assert!((0.0..=1.0).contains(&row.p_value), "{row:?}");
    }
    for fingerprint in ["ECFP", "Ring", "Layered", "Path"] {
        for method in CorrelationMethod::ALL {
            assert_eq!(
                rows.iter()
                    .filter(|r| r.fingerprint == fingerprint && r.correlation_method == method)
                    .count(),
                1,
                "{fingerprint} / {method}"
            );
        }
    }
}

#[test]
fn step_is_deterministic_across_worker_counts() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(dir.path());
    let ds = dataset(dir.path());
    let measure = CosineGreedy::new(0.1);

    let single = experiment_step(&ds, &measure, 6, 3, &WorkerPool::new(1).unwrap()).unwrap();
    let many = experiment_step(&ds, &measure, 6, 3, &WorkerPool::new(4).unwrap()).unwrap();
    assert_eq!(csv_bytes(dir.path(), &single), csv_bytes(dir.path(), &many));
}

#[test]
fn oversized_sample_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(dir.path());
    let pool = WorkerPool::new(1).unwrap();

    let err = experiment_step(&dataset(dir.path()), &CosineGreedy::new(0.1), 50, 1, &pool)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InsufficientSpectra {
            requested: 50,
            available: 12
        }
    ));
}

#[test]
fn cached_step_is_not_recomputed() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(dir.path());
    let ds = dataset(dir.path());
    let pool = WorkerPool::new(2).unwrap();
    let cache = ResultCache::new(dir.path().join("results"), true);
    let calls = Arc::new(AtomicUsize::new(0));
    let measure = CountingCosine {
        inner: CosineGreedy::new(0.1),
        calls: Arc::clone(&calls),
    };

    let first = cached_experiment_step(&ds, &measure, 5, 11, &pool, &cache).unwrap();
    let scored = calls.load(Ordering::SeqCst);
    assert_eq!(scored, 25);

    let cached_file = fs::read_dir(dir.path().join("results"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .find(|p| p.extension().is_some_and(|e| e == "csv"))
        .unwrap();
    let before = fs::read(&cached_file).unwrap();

    let second = cached_experiment_step(&ds, &measure, 5, 11, &pool, &cache).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), scored);
    assert_eq!(fs::read(&cached_file).unwrap(), before);
    assert_eq!(csv_bytes(dir.path(), &first), csv_bytes(dir.path(), &second));
}

#[test]
fn disabled_cache_always_recomputes() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(dir.path());
    let ds = dataset(dir.path());
    let pool = WorkerPool::new(1).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let measure = CountingCosine {
        inner: CosineGreedy::new(0.1),
        calls: Arc::clone(&calls),
    };

    let cache = ResultCache::disabled();
    cached_experiment_step(&ds, &measure, 4, 2, &pool, &cache).unwrap();
    cached_experiment_step(&ds, &measure, 4, 2, &pool, &cache).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 32);
}

#[test]
fn experiment_concatenates_iterations() {
    let dir = tempfile::tempdir().unwrap();
    write_archive(dir.path());
    let pool = WorkerPool::new(2).unwrap();
    let cache = ResultCache::new(dir.path().join("results"), true);
    let config = ExperimentConfig {
        iterations: 2,
        quantity: 5,
        random_state: 42,
        data_directory: dir.path().to_path_buf(),
        measures: vec![MeasureKind::GreedyCosine, MeasureKind::ModifiedCosine],
        synthetic_archive: "synthetic.json".to_string(),
        synthetic_url: None,
        embedding_model_url: None,
    };
    let datasets: Vec<Box<dyn Dataset>> = vec![Box::new(dataset(dir.path()))];

    let rows = run_experiment(&config, &datasets, &pool, &cache).unwrap();
    assert_eq!(rows.len(), 2 * 2 * 12);
    assert!(rows[..24].iter().all(|r| r.spectral_similarity == "Greedy Cosine"));
    assert!(rows[24..].iter().all(|r| r.spectral_similarity == "Modified Cosine"));

    // Each iteration matches a direct step at its derived seed.
    let second = experiment_step(
        datasets[0].as_ref(),
        &CosineGreedy::new(datasets[0].tolerance()),
        5,
        iteration_seed(42, 1),
        &pool,
    )
    .unwrap();
    assert_eq!(
        csv_bytes(dir.path(), &rows[12..24]),
        csv_bytes(dir.path(), &second)
    );

    let rerun = run_experiment(&config, &datasets, &pool, &cache).unwrap();
    assert_eq!(csv_bytes(dir.path(), &rows), csv_bytes(dir.path(), &rerun));
}

#[test]
fn missing_archive_without_url_fails() {
    let dir = tempfile::tempdir().unwrap();
    let pool = WorkerPool::new(1).unwrap();
    let err = experiment_step(&SyntheticDataset::new(dir.path()), &CosineGreedy::new(0.1), 5, 1, &pool)
        .unwrap_err();
    assert!(matches!(err, Error::MissingArtifact { .. }));
}

#[test]
fn configured_archive_selects_the_loader() {
    let dir = tempfile::tempdir().unwrap();
    let mut csv = String::from("mz,intensities,smiles,precursor_mz\n");
    for (i, smiles) in SMILES.iter().enumerate() {
        let base = 40.0 + 7.0 * i as f64;
        csv.push_str(&format!(
            "{base};{};{},20;100;{},{smiles},{}\n",
            base + 14.0,
            base + 28.03,
            5 * (i + 1),
            base + 60.0
        ));
    }
    fs::write(dir.path().join("synthetic.csv"), csv).unwrap();

    let config = ExperimentConfig {
        iterations: 1,
        quantity: 5,
        random_state: 42,
        data_directory: dir.path().to_path_buf(),
        measures: vec![MeasureKind::GreedyCosine],
        synthetic_archive: "synthetic.csv".to_string(),
        synthetic_url: None,
        embedding_model_url: None,
    };
    let datasets = default_datasets(&config);
    let synthetic = &datasets[0];
    assert_eq!(synthetic.name(), "Synthetic");
    assert_eq!(synthetic.spectra().unwrap().len(), SMILES.len());

    let pool = WorkerPool::new(2).unwrap();
    let rows = experiment_step(synthetic.as_ref(), &CosineGreedy::new(0.01), 5, 42, &pool).unwrap();
    assert_eq!(rows.len(), 12);
}
