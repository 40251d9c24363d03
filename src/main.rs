use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use spectral_correlation::cache::ResultCache;
use spectral_correlation::datasets::synthetic::DEFAULT_ARCHIVE;
use spectral_correlation::experiment::{experiment, write_results, ExperimentConfig, MeasureKind};
use spectral_correlation::plot::render_bar_charts;
use spectral_correlation::pool::WorkerPool;
use spectral_correlation::progress::{LogProgress, NoProgress, ProgressObserver};

fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(1, usize::from)
}

/// Run the fingerprint / spectral similarity correlation experiment.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// The number of spectra to sample.
    #[arg(long)]
    quantity: usize,

    /// The random state to use.
    #[arg(long)]
    random_state: u64,

    /// The number of iterations to run.
    #[arg(long)]
    iterations: usize,

    /// The output CSV file to save the results to.
    #[arg(long)]
    output: PathBuf,

    /// The directory to store the datasets in.
    #[arg(long)]
    data_directory: PathBuf,

    /// Whether to print additional information.
    #[arg(long)]
    verbose: bool,

    /// The number of worker threads to use.
    #[arg(long, default_value_t = default_jobs())]
    n_jobs: usize,

    /// Directory of cached step results.
    #[arg(long, default_value = "results")]
    results_directory: PathBuf,

    /// Recompute every step and leave the cache untouched.
    #[arg(long)]
    no_cache: bool,

    /// Spectral similarity measures to benchmark.
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = MeasureKind::DEFAULT
    )]
    measures: Vec<MeasureKind>,

    /// Synthetic spectra archive inside the data directory (.parquet, .json,
    /// .csv or .mgf).
    #[arg(long, default_value = DEFAULT_ARCHIVE)]
    synthetic_archive: String,

    /// Where to download the synthetic spectra archive from when missing.
    #[arg(long, env = "SPECTRAL_CORRELATION_SYNTHETIC_URL")]
    synthetic_url: Option<String>,

    /// Where to download the embedding model from when missing.
    #[arg(long, env = "SPECTRAL_CORRELATION_EMBEDDING_MODEL_URL")]
    embedding_model_url: Option<String>,

    /// Also write bar charts of the results to this directory.
    #[arg(long)]
    plots: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let observer: Arc<dyn ProgressObserver> = if cli.verbose {
        Arc::new(LogProgress)
    } else {
        Arc::new(NoProgress)
    };
    let pool = WorkerPool::new(cli.n_jobs)?.with_observer(observer);
    let cache = ResultCache::new(&cli.results_directory, !cli.no_cache);

    let config = ExperimentConfig {
        iterations: cli.iterations,
        quantity: cli.quantity,
        random_state: cli.random_state,
        data_directory: cli.data_directory,
        measures: cli.measures,
        synthetic_archive: cli.synthetic_archive,
        synthetic_url: cli.synthetic_url,
        embedding_model_url: cli.embedding_model_url,
    };
    log::info!("running with {} workers: {config:?}", pool.n_jobs());

    let results = experiment(&config, &pool, &cache).context("running experiment")?;
    write_results(&cli.output, &results)
        .with_context(|| format!("writing results to {}", cli.output.display()))?;
    log::info!("wrote {} rows to {}", results.len(), cli.output.display());

    if let Some(directory) = &cli.plots {
        render_bar_charts(&results, directory).context("rendering charts")?;
    }
    Ok(())
}
