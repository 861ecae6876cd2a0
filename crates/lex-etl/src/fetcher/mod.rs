//! Dataset retrieval.
//!
//! The [`Fetcher`] turns a dataset reference (registry name, URL or path)
//! into a DataFrame. Remote datasets are downloaded with a blocking HTTP
//! client and cached under the raw data directory before parsing.

mod parser;
mod source;

pub use source::DatasetSource;

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use polars::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hex digits of the URL digest kept in cache file names.
const CACHE_DIGEST_LEN: usize = 12;

/// A dataset that has been retrieved and parsed.
#[derive(Debug, Clone)]
pub struct FetchedDataset {
    /// Name derived from the registry entry, URL or file name.
    pub name: String,
    pub source: DatasetSource,
    /// Cached raw file, for remote sources.
    pub raw_path: Option<PathBuf>,
    pub data: DataFrame,
}

/// Retrieves datasets by name, URL or path.
#[derive(Debug, Clone)]
pub struct Fetcher {
    datasets: BTreeMap<String, String>,
    raw_dir: PathBuf,
    timeout: Duration,
    use_cache: bool,
}

impl Fetcher {
    pub fn new(config: &EtlConfig) -> Self {
        Self {
            datasets: config.datasets.clone(),
            raw_dir: config.raw_dir.clone(),
            timeout: Duration::from_secs(config.http_timeout_secs),
            use_cache: config.use_cache,
        }
    }

    /// Ignore cached raw files and download again.
    pub fn refresh(mut self, refresh: bool) -> Self {
        if refresh {
            self.use_cache = false;
        }
        self
    }

    /// Resolve a target without fetching it.
    pub fn resolve(&self, target: &str) -> Result<DatasetSource> {
        DatasetSource::resolve(target, &self.datasets)
    }

    /// Retrieve a dataset and parse it as a table.
    pub fn download(&self, target: &str) -> Result<DataFrame> {
        self.fetch(target).map(|fetched| fetched.data)
    }

    /// Retrieve a dataset, keeping track of where it came from.
    pub fn fetch(&self, target: &str) -> Result<FetchedDataset> {
        let source = self.resolve(target)?;
        let name = source.name();
        info!("Fetching dataset '{}' from {}", name, source);

        let (data, raw_path) = match &source {
            DatasetSource::Registered { url, .. } | DatasetSource::Url(url) => {
                let raw_path = self.cache_file(&name, url);
                let (bytes, from_cache) = self.remote_bytes(url, &raw_path)?;
                let data = Self::parse_remote(url, &raw_path, bytes, from_cache)?;
                (data, Some(raw_path))
            }
            DatasetSource::Path(path) => (Self::load(path)?, None),
        };

        info!(
            "Loaded '{}': {} rows x {} columns",
            name,
            data.height(),
            data.width()
        );

        Ok(FetchedDataset {
            name,
            source,
            raw_path,
            data,
        })
    }

    /// Parse a local CSV file.
    pub fn load(path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| EtlError::fetch(path.display().to_string(), e))?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());

        parser::parse_csv(bytes)
            .map_err(|e| EtlError::ParseFailed(format!("{}: {e:#}", path.display())))
    }

    /// Location of the raw cache file for a remote source.
    ///
    /// The file name carries a digest of the full URL so that two URLs
    /// ending in the same file name never share a cache entry.
    pub fn cache_path(&self, source: &DatasetSource) -> Option<PathBuf> {
        source.url().map(|url| self.cache_file(&source.name(), url))
    }

    fn cache_file(&self, name: &str, url: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        self.raw_dir
            .join(format!("{name}-{}.csv", &digest[..CACHE_DIGEST_LEN]))
    }

    /// Raw bytes for a URL, and whether they came from the cache.
    fn remote_bytes(&self, url: &str, cache_path: &Path) -> Result<(Vec<u8>, bool)> {
        if self.use_cache && cache_path.is_file() {
            match fs::read(cache_path) {
                Ok(bytes) => {
                    info!("Using cached copy at {}", cache_path.display());
                    return Ok((bytes, true));
                }
                Err(e) => warn!(
                    "Cached copy at {} is unreadable, downloading again: {}",
                    cache_path.display(),
                    e
                ),
            }
        }

        let bytes = self.http_get(url)?;
        Self::write_cache(cache_path, &bytes)?;
        Ok((bytes, false))
    }

    fn write_cache(cache_path: &Path, bytes: &[u8]) -> Result<()> {
        let fail = |e: std::io::Error| EtlError::fetch(cache_path.display().to_string(), e);

        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent).map_err(fail)?;
        }
        fs::write(cache_path, bytes).map_err(fail)?;
        debug!("Cached {} bytes at {}", bytes.len(), cache_path.display());
        Ok(())
    }

    /// Parse downloaded or cached bytes.
    ///
    /// A fresh download that does not parse is removed from the cache so the
    /// next run fetches it again; a cached copy is kept and the user is told
    /// how to replace it.
    fn parse_remote(
        url: &str,
        cache_path: &Path,
        bytes: Vec<u8>,
        from_cache: bool,
    ) -> Result<DataFrame> {
        let err = match parser::parse_csv(bytes) {
            Ok(df) => return Ok(df),
            Err(e) => EtlError::ParseFailed(format!("{url}: {e:#}")),
        };

        if from_cache {
            warn!(
                "Cached copy at {} could not be parsed; rerun with --refresh to download it again",
                cache_path.display()
            );
        } else if let Err(e) = fs::remove_file(cache_path) {
            warn!(
                "Could not remove unparseable download at {}: {}",
                cache_path.display(),
                e
            );
        } else {
            debug!("Removed unparseable download at {}", cache_path.display());
        }

        Err(err)
    }

    fn http_get(&self, url: &str) -> Result<Vec<u8>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| EtlError::fetch(url, e))?;

        let response = client.get(url).send().map_err(|e| EtlError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::fetch(url, format!("HTTP {status}")));
        }

        let bytes = response.bytes().map_err(|e| EtlError::fetch(url, e))?;
        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fetcher_in(temp: &TempDir) -> Fetcher {
        let config = EtlConfig::builder()
            .root(temp.path())
            .dataset("local", "http://127.0.0.1:9/local.csv")
            .http_timeout_secs(2)
            .build()
            .unwrap();
        Fetcher::new(&config)
    }

    #[test]
    fn test_load_local_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("people.csv");
        fs::write(&path, "name,age\nAda,36\nAlan,41\n").unwrap();

        let df = Fetcher::load(&path).unwrap();
        assert_eq!(df.shape(), (2, 2));
    }

    #[test]
    fn test_load_missing_file_is_fetch_error() {
        let err = Fetcher::load("/definitely/not/here.csv").unwrap_err();
        assert_eq!(err.error_code(), "FETCH_FAILED");
    }

    #[test]
    fn test_load_ragged_file_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ragged.csv");
        fs::write(&path, "a,b\n1,2\n3\n").unwrap();

        let err = Fetcher::load(&path).unwrap_err();
        assert!(matches!(err, EtlError::ParseFailed(_)));
    }

    #[test]
    fn test_fetch_path_names_dataset_after_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("Sample Data.csv");
        fs::write(&path, "x\n1\n").unwrap();

        let fetched = fetcher_in(&temp)
            .fetch(path.to_str().unwrap())
            .unwrap();
        assert_eq!(fetched.name, "sample_data");
        assert!(fetched.raw_path.is_none());
    }

    fn seed_cache(fetcher: &Fetcher, target: &str, contents: &str) -> PathBuf {
        let source = fetcher.resolve(target).unwrap();
        let cache = fetcher.cache_path(&source).unwrap();
        fs::create_dir_all(cache.parent().unwrap()).unwrap();
        fs::write(&cache, contents).unwrap();
        cache
    }

    #[test]
    fn test_cached_copy_is_used_for_registered_dataset() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher_in(&temp);
        let cache = seed_cache(&fetcher, "local", "a,b\n1,2\n");

        let fetched = fetcher.fetch("local").unwrap();
        assert_eq!(fetched.data.shape(), (1, 2));
        assert_eq!(fetched.raw_path, Some(cache));
    }

    #[test]
    fn test_refresh_bypasses_cache_and_reports_fetch_failure() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher_in(&temp).refresh(true);
        seed_cache(&fetcher, "local", "a,b\n1,2\n");

        let err = fetcher.download("local").unwrap_err();
        assert_eq!(err.error_code(), "FETCH_FAILED");
    }

    #[test]
    fn test_cache_path_distinguishes_urls_with_same_file_name() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher_in(&temp);
        let old = DatasetSource::Url("http://127.0.0.1:9/2023/sales.csv".to_string());
        let new = DatasetSource::Url("http://127.0.0.1:9/2024/sales.csv".to_string());

        let old_path = fetcher.cache_path(&old).unwrap();
        let new_path = fetcher.cache_path(&new).unwrap();
        assert_ne!(old_path, new_path);
        assert_eq!(old_path, fetcher.cache_path(&old).unwrap());

        let file_name = old_path.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("sales-"), "{file_name}");
        assert!(file_name.ends_with(".csv"), "{file_name}");
        assert!(fetcher.cache_path(&DatasetSource::Path("a.csv".into())).is_none());
    }

    #[test]
    fn test_cached_copy_of_other_url_with_same_file_name_is_not_reused() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher_in(&temp);
        seed_cache(&fetcher, "http://127.0.0.1:9/2023/sales.csv", "a,b\n1,2\n");

        let cached = fetcher.download("http://127.0.0.1:9/2023/sales.csv").unwrap();
        assert_eq!(cached.shape(), (1, 2));

        // the 2024 file was never downloaded, so the closed port must be hit
        let err = fetcher
            .download("http://127.0.0.1:9/2024/sales.csv")
            .unwrap_err();
        assert_eq!(err.error_code(), "FETCH_FAILED");
    }

    #[test]
    fn test_unparseable_cached_copy_is_kept() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher_in(&temp);
        let cache = seed_cache(&fetcher, "local", "a,b\n1,2\n3\n");

        let err = fetcher.download("local").unwrap_err();
        assert_eq!(err.error_code(), "PARSE_FAILED");
        assert!(cache.is_file());
    }

    #[test]
    fn test_unparseable_download_is_removed_from_cache() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("local-0123456789ab.csv");
        let bytes = b"a,b\n1,2\n3\n".to_vec();
        fs::write(&cache, &bytes).unwrap();

        let err = Fetcher::parse_remote("http://127.0.0.1:9/local.csv", &cache, bytes, false)
            .unwrap_err();
        assert!(matches!(err, EtlError::ParseFailed(_)));
        assert!(!cache.exists());
    }

    #[test]
    fn test_cache_write_failure_is_fetch_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("raw");
        fs::write(&blocker, "not a directory").unwrap();

        let err = Fetcher::write_cache(&blocker.join("local.csv"), b"a\n1\n").unwrap_err();
        assert_eq!(err.error_code(), "FETCH_FAILED");
        assert!(err.to_string().contains("local.csv"), "{err}");
    }

    #[test]
    fn test_unknown_dataset() {
        let temp = TempDir::new().unwrap();
        let err = fetcher_in(&temp).download("penguins").unwrap_err();
        assert!(matches!(err, EtlError::UnknownDataset(_)));
    }
}
