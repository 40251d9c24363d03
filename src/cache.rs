//! Content-addressed result cache.
//!
//! Each cached computation is one CSV table stored as `<directory>/<key>.csv`.
//! Tables are written to a temporary file in the same directory and then
//! renamed into place, so a present file is always complete.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Serialize `rows` as CSV with a header line.
pub fn write_table<R, W>(writer: W, rows: &[R]) -> Result<()>
where
    R: Serialize,
    W: Write,
{
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Write `rows` to `path`, replacing it atomically.
pub fn write_table_file<R: Serialize>(path: &Path, rows: &[R]) -> Result<()> {
    let directory = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&directory).map_err(|e| Error::io(&directory, e))?;
    let mut partial =
        tempfile::NamedTempFile::new_in(&directory).map_err(|e| Error::io(&directory, e))?;
    write_table(BufWriter::new(partial.as_file_mut()), rows)?;
    partial
        .persist(path)
        .map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

pub fn read_table<R: DeserializeOwned>(path: &Path) -> Result<Vec<R>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = csv::Reader::from_reader(file);
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<R>, csv::Error>>()
        .map_err(Error::from)
}

#[derive(Debug, Clone)]
pub struct ResultCache {
    directory: PathBuf,
    enabled: bool,
}

impl ResultCache {
    pub fn new(directory: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            directory: directory.into(),
            enabled,
        }
    }

    /// A cache that always computes and never writes.
    pub fn disabled() -> Self {
        Self::new(PathBuf::new(), false)
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.directory.join(format!("{key}.csv"))
    }

    /// Return the table stored under `key`, or compute, store and return it.
    pub fn get_or_compute<R, F>(&self, key: &str, compute: F) -> Result<Vec<R>>
    where
        R: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<Vec<R>>,
    {
        if !self.enabled {
            return compute();
        }
        let path = self.path_for(key);
        if path.exists() {
            log::debug!("cache hit: {}", path.display());
            return read_table(&path);
        }
        log::debug!("cache miss: {}", path.display());
        let rows = compute()?;
        write_table_file(&path, &rows)?;
        Ok(rows)
    }
}
