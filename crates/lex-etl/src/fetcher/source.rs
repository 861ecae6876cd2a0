//! Resolution of user-supplied dataset references.

use crate::error::{EtlError, Result};
use crate::utils::sanitize_identifier;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// A name from the dataset registry.
    Registered { name: String, url: String },
    /// A direct HTTP(S) URL.
    Url(String),
    /// A file on the local filesystem.
    Path(PathBuf),
}

impl DatasetSource {
    /// Resolve a dataset name, URL or file path.
    ///
    /// Registry names win over everything else. A bare word that is neither
    /// registered nor an existing file is rejected as an unknown dataset.
    pub fn resolve(target: &str, registry: &BTreeMap<String, String>) -> Result<Self> {
        let target = target.trim();
        if target.is_empty() {
            return Err(EtlError::UnknownDataset(String::new()));
        }

        if let Some(url) = registry.get(target) {
            return Ok(Self::Registered {
                name: target.to_string(),
                url: url.clone(),
            });
        }

        let lower = target.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            url::Url::parse(target).map_err(|e| EtlError::fetch(target, e))?;
            return Ok(Self::Url(target.to_string()));
        }

        if let Some(path) = target.strip_prefix("file://") {
            return Ok(Self::Path(PathBuf::from(path)));
        }

        let path = PathBuf::from(target);
        let looks_like_path = target.contains(['/', '\\', '.']);
        if path.exists() || looks_like_path {
            Ok(Self::Path(path))
        } else {
            Err(EtlError::UnknownDataset(target.to_string()))
        }
    }

    /// Dataset name, usable as a table name and file stem.
    pub fn name(&self) -> String {
        match self {
            Self::Registered { name, .. } => sanitize_identifier(name),
            Self::Url(url) => {
                let stem = url::Url::parse(url)
                    .ok()
                    .and_then(|parsed| {
                        parsed
                            .path_segments()
                            .and_then(|mut segments| segments.next_back().map(str::to_string))
                    })
                    .filter(|segment| !segment.is_empty())
                    .map(|segment| file_stem(Path::new(&segment)))
                    .unwrap_or_default();
                sanitize_identifier(&stem)
            }
            Self::Path(path) => sanitize_identifier(&file_stem(path)),
        }
    }

    /// The URL to download from, if this source is remote.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Registered { url, .. } => Some(url),
            Self::Url(url) => Some(url),
            Self::Path(_) => None,
        }
    }
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registered { url, .. } | Self::Url(url) => f.write_str(url),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}
