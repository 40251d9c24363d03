use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{Error, Result};

/// Fetch-and-cache downloader: each destination is fetched only when it is
/// not already on disk.
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(None)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Download {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Ensure every destination exists, downloading the matching URL when
    /// it does not.
    pub fn download<S: AsRef<str>, P: AsRef<Path>>(
        &self,
        urls: &[S],
        destinations: &[P],
    ) -> Result<()> {
        if urls.len() != destinations.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} URLs for {} destinations",
                urls.len(),
                destinations.len()
            )));
        }
        for (url, destination) in urls.iter().zip(destinations) {
            self.fetch(url.as_ref(), destination.as_ref())?;
        }
        Ok(())
    }

    fn fetch(&self, url: &str, destination: &Path) -> Result<()> {
        if destination.exists() {
            log::debug!("{} already present, skipping download", destination.display());
            return Ok(());
        }
        let directory = parent_dir(destination);
        fs::create_dir_all(&directory).map_err(|e| Error::io(&directory, e))?;

        log::info!("downloading {url} to {}", destination.display());
        let download_error = |reason: String| Error::Download {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_error(e.to_string()))?;

        // The destination only appears once the transfer is complete.
        let mut partial =
            tempfile::NamedTempFile::new_in(&directory).map_err(|e| Error::io(&directory, e))?;
        io::copy(&mut response, &mut partial).map_err(|e| download_error(e.to_string()))?;
        partial
            .persist(destination)
            .map_err(|e| Error::io(destination, e.error))?;
        Ok(())
    }
}

/// Ensure `destination` exists, downloading from `url` when one is given.
/// `hint` tells the user how to provide the file otherwise.
pub fn ensure_artifact(
    downloader: impl FnOnce() -> Result<Downloader>,
    url: Option<&str>,
    destination: &Path,
    hint: &str,
) -> Result<()> {
    if destination.exists() {
        return Ok(());
    }
    match url {
        Some(url) => downloader()?.download(&[url], &[destination]),
        None => Err(Error::MissingArtifact {
            path: destination.to_path_buf(),
            hint: hint.to_string(),
        }),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
