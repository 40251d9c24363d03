use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use arrow::array::{Float64Array, Float64Builder, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Structures the generated spectra are annotated with, with monoisotopic
/// masses of their neutral forms.
const MOLECULES: [(&str, f64); 20] = [
    ("CCO", 46.0419),
    ("CC(=O)O", 60.0211),
    ("OCC(O)CO", 92.0473),
    ("c1ccccc1", 78.0470),
    ("Cc1ccccc1", 92.0626),
    ("Oc1ccccc1", 94.0419),
    ("Nc1ccccc1", 93.0578),
    ("c1ccncc1", 79.0422),
    ("c1ccc2ccccc2c1", 128.0626),
    ("OC(=O)c1ccccc1", 122.0368),
    ("CC(=O)Oc1ccccc1C(=O)O", 180.0423),
    ("CN1C=NC2=C1C(=O)N(C(=O)N2C)C", 194.0804),
    ("NCCc1ccc(O)c(O)c1", 153.0790),
    ("OC[C@H]1OC(O)[C@H](O)[C@@H](O)[C@@H]1O", 180.0634),
    ("CC(C)Cc1ccc(cc1)C(C)C(=O)O", 206.1307),
    ("O=C1C=CC(=O)C=C1", 108.0211),
    ("C1CCCCC1", 84.0939),
    ("CCCCCCCCCCCCCCCC(=O)O", 256.2402),
    ("c1ccc(cc1)-c1ccccc1", 154.0783),
    ("Oc1ccc(cc1)/C=C/C(=O)O", 164.0473),
];

const PROTON: f64 = 1.007_276;

/// Write a parquet archive of synthetic MS/MS spectra.
#[derive(Debug, Parser)]
#[command(about)]
struct Args {
    /// Destination parquet file.
    #[arg(long, default_value = "isdb_pos_cleaned.parquet")]
    output: PathBuf,

    /// Number of spectra to generate.
    #[arg(long, default_value_t = 200)]
    count: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

struct Record {
    mz: Vec<f64>,
    intensities: Vec<f64>,
    smiles: &'static str,
    inchikey: String,
    precursor_mz: f64,
}

/// Fragments are random losses from the precursor; the precursor itself is
/// kept as the last peak.
fn generate_record(index: usize, rng: &mut ChaCha8Rng) -> Record {
    let (smiles, mass) = MOLECULES[index % MOLECULES.len()];
    let precursor_mz = mass + PROTON;

    let n_fragments = rng.gen_range(3..12);
    let mut peaks: Vec<(f64, f64)> = (0..n_fragments)
        .map(|_| {
            let loss = rng.gen_range(10.0..precursor_mz * 0.8);
            let intensity = rng.gen_range(0.05..1.0);
            (precursor_mz - loss, intensity)
        })
        .collect();
    peaks.push((precursor_mz, rng.gen_range(0.2..1.0)));
    peaks.sort_by(|a, b| a.0.total_cmp(&b.0));

    let inchikey = format!(
        "{:014X}-{:010X}-N",
        rng.gen::<u64>() & 0xFFFF_FFFF_FFFF,
        rng.gen::<u64>() & 0xFF_FFFF_FFFF
    );
    Record {
        mz: peaks.iter().map(|p| p.0).collect(),
        intensities: peaks.iter().map(|p| p.1).collect(),
        smiles,
        inchikey,
        precursor_mz,
    }
}

fn list_array<'a>(rows: impl Iterator<Item = &'a [f64]>) -> arrow::array::ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        builder.values().append_slice(row);
        builder.append(true);
    }
    builder.finish()
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

    let records: Vec<Record> = (0..args.count)
        .map(|i| generate_record(i, &mut rng))
        .collect();

    let item = Arc::new(Field::new("item", DataType::Float64, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("mz", DataType::List(item.clone()), false),
        Field::new("intensities", DataType::List(item), false),
        Field::new("smiles", DataType::Utf8, false),
        Field::new("inchikey", DataType::Utf8, false),
        Field::new("precursor_mz", DataType::Float64, false),
        Field::new("ionmode", DataType::Utf8, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(list_array(records.iter().map(|r| r.mz.as_slice()))),
            Arc::new(list_array(records.iter().map(|r| r.intensities.as_slice()))),
            Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.smiles))),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.inchikey.as_str()),
            )),
            Arc::new(Float64Array::from_iter_values(
                records.iter().map(|r| r.precursor_mz),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|_| "positive"),
            )),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;

    println!(
        "Wrote {} spectra ({} structures) to {}",
        records.len(),
        MOLECULES.len().min(args.count),
        args.output.display()
    );
    Ok(())
}
