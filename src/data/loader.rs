use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array,
    LargeListArray, ListArray, StringArray,
};
use arrow::datatypes::DataType;
use flate2::read::GzDecoder;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{keys, MetadataValue, Spectrum};

/// Column (or JSON field) holding the m/z array.
pub const MZ_COLUMN: &str = "mz";
/// Column (or JSON field) holding the intensity array.
pub const INTENSITY_COLUMN: &str = "intensities";

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load spectra from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – Parquet file with `mz` and `intensities` list columns
/// * `.json`    – `[{ "mz": [...], "intensities": [...], ...meta }, ...]`
/// * `.csv`     – `mz` and `intensities` columns of semicolon-separated floats
/// * `.mgf`     – Mascot generic format, one `BEGIN IONS` block per spectrum
pub fn load_file(path: &Path) -> Result<Vec<Spectrum>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let spectra = match ext.as_str() {
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        "mgf" => load_mgf(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading spectra from {}", path.display()))?;

    log::debug!("loaded {} spectra from {}", spectra.len(), path.display());
    Ok(spectra)
}

/// Collect the distinct non-empty values of one column of a delimited table,
/// transparently decompressing `.gz` files.
pub fn load_column_values(path: &Path, column: &str) -> Result<BTreeSet<String>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let is_gzip = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"));
    let input: Box<dyn Read> = if is_gzip {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let idx = reader
        .headers()
        .context("reading table headers")?
        .iter()
        .position(|h| h == column)
        .with_context(|| format!("{}: missing '{column}' column", path.display()))?;

    let mut values = BTreeSet::new();
    for (row_no, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("{}: row {row_no}", path.display()))?;
        if let Some(value) = record.get(idx).map(str::trim).filter(|v| !v.is_empty()) {
            values.insert(value.to_string());
        }
    }
    Ok(values)
}

// ---------------------------------------------------------------------------
// MGF loader
// ---------------------------------------------------------------------------

/// Streams an MGF file from disk.
///
/// ```text
/// BEGIN IONS
/// PEPMASS=301.14
/// SMILES=CCO
/// 100.1 20.0
/// END IONS
/// ```
///
/// Header keys are lowercased; `PEPMASS` becomes `precursor_mz`. Peak lines
/// hold m/z and intensity separated by whitespace.
fn load_mgf(path: &Path) -> Result<Vec<Spectrum>> {
    let file = File::open(path).context("opening MGF file")?;
    let reader = BufReader::new(file);

    let mut spectra = Vec::new();
    let mut current: Option<Spectrum> = None;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("MGF line {}", line_no + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.eq_ignore_ascii_case("BEGIN IONS") {
            if current.is_some() {
                bail!("MGF line {}: nested BEGIN IONS", line_no + 1);
            }
            current = Some(Spectrum::new(Vec::new(), Vec::new()));
            continue;
        }
        if line.eq_ignore_ascii_case("END IONS") {
            let spectrum = current
                .take()
                .with_context(|| format!("MGF line {}: END IONS without BEGIN IONS", line_no + 1))?;
            spectra.push(spectrum);
            continue;
        }

        // Anything outside a block is file-level header noise.
        let Some(spectrum) = current.as_mut() else {
            continue;
        };

        if let Some((key, value)) = line.split_once('=') {
            let key = match key.trim().to_ascii_lowercase().as_str() {
                "pepmass" => keys::PRECURSOR_MZ.to_string(),
                other => other.to_string(),
            };
            spectrum
                .metadata
                .insert(key, guess_metadata_type(value.trim()));
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(mz), Some(intensity)) = (parts.next(), parts.next()) else {
            bail!("MGF line {}: expected 'mz intensity', got '{line}'", line_no + 1);
        };
        let mz: f64 = mz
            .parse()
            .with_context(|| format!("MGF line {}: '{mz}' is not a number", line_no + 1))?;
        let intensity: f64 = intensity.parse().with_context(|| {
            format!("MGF line {}: '{intensity}' is not a number", line_no + 1)
        })?;
        spectrum.mz.push(mz);
        spectrum.intensities.push(intensity);
    }

    if current.is_some() {
        bail!("MGF file ends inside a BEGIN IONS block");
    }

    Ok(spectra)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented):
///
/// ```json
/// [
///   {
///     "mz": [81.07, 109.10, ...],
///     "intensities": [0.12, 1.0, ...],
///     "smiles": "CCO",
///     "precursor_mz": 47.05
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Vec<Spectrum>> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut spectra = Vec::with_capacity(records.len());

    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;

        let mz = json_array_to_f64(obj.get(MZ_COLUMN), i, MZ_COLUMN)?;
        let intensities = json_array_to_f64(obj.get(INTENSITY_COLUMN), i, INTENSITY_COLUMN)?;

        if mz.len() != intensities.len() {
            bail!(
                "Row {i}: mz has {} values but intensities has {}",
                mz.len(),
                intensities.len()
            );
        }

        let metadata = obj
            .iter()
            .filter(|(key, _)| *key != MZ_COLUMN && *key != INTENSITY_COLUMN)
            .map(|(key, val)| (key.to_ascii_lowercase(), json_to_metadata(val)))
            .collect();

        spectra.push(Spectrum {
            mz,
            intensities,
            metadata,
        });
    }

    Ok(spectra)
}

fn json_array_to_f64(val: Option<&JsonValue>, row: usize, col: &str) -> Result<Vec<f64>> {
    let arr = val
        .and_then(|v| v.as_array())
        .with_context(|| format!("Row {row}: missing or invalid '{col}' array"))?;

    arr.iter()
        .enumerate()
        .map(|(j, v)| {
            v.as_f64()
                .with_context(|| format!("Row {row}, {col}[{j}]: not a number"))
        })
        .collect()
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names.
/// `mz` and `intensities` hold semicolon-separated floats:
///   `"81.07;109.10"`, `"0.12;1.0"`
/// All other columns are treated as metadata.
fn load_csv(path: &Path) -> Result<Vec<Spectrum>> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();

    let mz_idx = headers
        .iter()
        .position(|h| h == MZ_COLUMN)
        .context("CSV missing 'mz' column")?;
    let intensity_idx = headers
        .iter()
        .position(|h| h == INTENSITY_COLUMN)
        .context("CSV missing 'intensities' column")?;

    let mut spectra = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;

        let mz = parse_semicolon_floats(record.get(mz_idx).unwrap_or(""), row_no, MZ_COLUMN)?;
        let intensities = parse_semicolon_floats(
            record.get(intensity_idx).unwrap_or(""),
            row_no,
            INTENSITY_COLUMN,
        )?;

        if mz.len() != intensities.len() {
            bail!(
                "CSV row {row_no}: mz has {} values but intensities has {}",
                mz.len(),
                intensities.len()
            );
        }

        let metadata = record
            .iter()
            .enumerate()
            .filter(|(col_idx, _)| *col_idx != mz_idx && *col_idx != intensity_idx)
            .map(|(col_idx, value)| (headers[col_idx].clone(), guess_metadata_type(value)))
            .collect();

        spectra.push(Spectrum {
            mz,
            intensities,
            metadata,
        });
    }

    Ok(spectra)
}

fn parse_semicolon_floats(s: &str, row: usize, col: &str) -> Result<Vec<f64>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(';')
        .enumerate()
        .map(|(j, tok)| {
            tok.trim()
                .parse::<f64>()
                .with_context(|| format!("Row {row}, {col}[{j}]: '{tok}' is not a number"))
        })
        .collect()
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet spectral archive.
///
/// Expected schema:
/// - `mz`: List<Float64> or LargeList<Float64>
/// - `intensities`: List<Float64> or LargeList<Float64>
/// - Any other columns are treated as metadata (strings, ints, floats, bools)
fn load_parquet(path: &Path) -> Result<Vec<Spectrum>> {
    let file = File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut spectra = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let mz_idx = schema
            .index_of(MZ_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'mz' column"))?;
        let intensity_idx = schema
            .index_of(INTENSITY_COLUMN)
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'intensities' column"))?;

        let mz_col = batch.column(mz_idx);
        let intensity_col = batch.column(intensity_idx);

        let meta_cols: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != mz_idx && *i != intensity_idx)
            .map(|(i, f)| (i, f.name().to_ascii_lowercase()))
            .collect();

        for row in 0..batch.num_rows() {
            let mz = extract_f64_list(mz_col, row)
                .with_context(|| format!("Row {row}: failed to read 'mz'"))?;
            let intensities = extract_f64_list(intensity_col, row)
                .with_context(|| format!("Row {row}: failed to read 'intensities'"))?;

            if mz.len() != intensities.len() {
                bail!(
                    "Row {row}: mz has {} values but intensities has {}",
                    mz.len(),
                    intensities.len()
                );
            }

            let metadata: BTreeMap<String, MetadataValue> = meta_cols
                .iter()
                .map(|(col_idx, col_name)| {
                    (col_name.clone(), extract_metadata_value(batch.column(*col_idx), row))
                })
                .collect();

            spectra.push(Spectrum {
                mz,
                intensities,
                metadata,
            });
        }
    }

    Ok(spectra)
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .context("expected ListArray")?
            .value(row),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .context("expected LargeListArray")?
            .value(row),
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr
            .iter()
            .map(|v| v.map_or(f64::NAN, f64::from))
            .collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

/// Extract a single metadata value from an Arrow column at a given row.
fn extract_metadata_value(col: &Arc<dyn Array>, row: usize) -> MetadataValue {
    if col.is_null(row) {
        return MetadataValue::Null;
    }
    let any = col.as_any();
    let value = match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map(|s| MetadataValue::String(s.value(row).to_string())),
        DataType::LargeUtf8 => Some(MetadataValue::String(
            col.as_string::<i64>().value(row).to_string(),
        )),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map(|a| MetadataValue::Integer(i64::from(a.value(row)))),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map(|a| MetadataValue::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| MetadataValue::Float(f64::from(a.value(row)))),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map(|a| MetadataValue::Float(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map(|a| MetadataValue::Bool(a.value(row))),
        _ => None,
    };
    value.unwrap_or_else(|| MetadataValue::String(format!("{:?}", col.data_type())))
}
