//! Configuration types for the ETL pipeline.
//!
//! [`EtlConfig`] holds the directory layout, the dataset registry and the
//! default cleaning options. Use [`EtlConfig::builder()`] for a validated
//! configuration, or deserialize one from JSON with [`EtlConfig::from_json_file`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Datasets available by name out of the box.
pub const DEFAULT_DATASETS: [(&str, &str); 2] = [
    (
        "titanic",
        "https://raw.githubusercontent.com/datasciencedojo/datasets/master/titanic.csv",
    ),
    (
        "iris",
        "https://gist.githubusercontent.com/curran/a08a1080b88344b0c8a7/raw/0e7a9b0a5d22642a06d3d5b9bcbad9890c8ee534/iris.csv",
    ),
];

/// Fill value for categorical columns that have no observed values.
pub const DEFAULT_CATEGORICAL_SENTINEL: &str = "unknown";

/// Strategy for imputing missing numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NumericImputation {
    /// Use the median of non-null values
    #[default]
    Median,
    /// Use the mean of non-null values
    Mean,
    /// Use a constant value (0.0)
    Zero,
}

/// Strategy for imputing missing categorical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalImputation {
    /// Use the most frequent value (mode)
    #[default]
    Mode,
    /// Use the configured sentinel value
    Constant,
}

/// Options controlling a single cleaning pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningOptions {
    /// Collapse rows that are identical across all columns.
    pub remove_duplicates: bool,
    /// Trim leading/trailing whitespace in string columns.
    pub strip_columns: bool,
    /// How to fill missing numeric values.
    pub numeric_na_strategy: NumericImputation,
    /// How to fill missing categorical values.
    pub categorical_na_strategy: CategoricalImputation,
    /// Fill value for the constant strategy and for entirely-missing columns.
    pub categorical_sentinel: String,
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self {
            remove_duplicates: true,
            strip_columns: true,
            numeric_na_strategy: NumericImputation::default(),
            categorical_na_strategy: CategoricalImputation::default(),
            categorical_sentinel: DEFAULT_CATEGORICAL_SENTINEL.to_string(),
        }
    }
}

/// Configuration for the ETL pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Raw downloads are cached here before parsing.
    /// Default: "data/raw"
    pub raw_dir: PathBuf,

    /// Cleaned tables are exported here as CSV.
    /// Default: "data/processed"
    pub processed_dir: PathBuf,

    /// Analysis reports are written here.
    /// Default: "outputs/reports"
    pub reports_dir: PathBuf,

    /// Charts are written here.
    /// Default: "outputs/plots"
    pub plots_dir: PathBuf,

    /// SQLite database file.
    /// Default: "data/pipeline.db"
    pub database_path: PathBuf,

    /// Known dataset names mapped to their source URL.
    pub datasets: BTreeMap<String, String>,

    /// Cleaning options used by the orchestrator.
    pub cleaning: CleaningOptions,

    /// Categorical columns with more distinct values than this get no bar chart.
    /// Default: 20
    pub max_bar_chart_categories: usize,

    /// Number of value/frequency pairs kept per categorical column in analysis.
    /// Default: 10
    pub top_n_categories: usize,

    /// Timeout for HTTP downloads, in seconds.
    /// Default: 30
    pub http_timeout_secs: u64,

    /// Reuse a previously downloaded raw file instead of fetching again.
    /// Default: true
    pub use_cache: bool,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self::with_root(".")
    }
}

impl EtlConfig {
    /// Default layout rooted at `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            raw_dir: root.join("data").join("raw"),
            processed_dir: root.join("data").join("processed"),
            reports_dir: root.join("outputs").join("reports"),
            plots_dir: root.join("outputs").join("plots"),
            database_path: root.join("data").join("pipeline.db"),
            datasets: default_datasets(),
            cleaning: CleaningOptions::default(),
            max_bar_chart_categories: 20,
            top_n_categories: 10,
            http_timeout_secs: 30,
            use_cache: true,
        }
    }

    /// Create a new configuration builder.
    pub fn builder() -> EtlConfigBuilder {
        EtlConfigBuilder::default()
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: EtlConfig = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| crate::error::EtlError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_bar_chart_categories == 0 {
            return Err(ConfigValidationError::InvalidLimit {
                field: "max_bar_chart_categories".to_string(),
                value: 0,
            });
        }

        if self.top_n_categories == 0 {
            return Err(ConfigValidationError::InvalidLimit {
                field: "top_n_categories".to_string(),
                value: 0,
            });
        }

        if self.http_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidLimit {
                field: "http_timeout_secs".to_string(),
                value: 0,
            });
        }

        if self.cleaning.categorical_sentinel.trim().is_empty() {
            return Err(ConfigValidationError::EmptySentinel);
        }

        for (name, url) in &self.datasets {
            if name.trim().is_empty() || url.trim().is_empty() {
                return Err(ConfigValidationError::InvalidDataset(name.clone()));
            }
        }

        Ok(())
    }

    /// Look up a registered dataset URL.
    pub fn dataset_url(&self, name: &str) -> Option<&str> {
        self.datasets.get(name).map(String::as_str)
    }

    /// Create every output and cache directory.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        let db_parent = self
            .database_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty());

        for dir in [
            Some(self.raw_dir.as_path()),
            Some(self.processed_dir.as_path()),
            Some(self.reports_dir.as_path()),
            Some(self.plots_dir.as_path()),
            db_parent,
        ]
        .into_iter()
        .flatten()
        {
            fs::create_dir_all(dir)?;
            debug!("Ensured directory: {}", dir.display());
        }
        Ok(())
    }
}

fn default_datasets() -> BTreeMap<String, String> {
    DEFAULT_DATASETS
        .iter()
        .map(|(name, url)| (name.to_string(), url.to_string()))
        .collect()
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value} (must be at least 1)")]
    InvalidLimit { field: String, value: u64 },

    #[error("Categorical sentinel must not be empty")]
    EmptySentinel,

    #[error("Dataset entry '{0}' needs a name and a URL")]
    InvalidDataset(String),
}

/// Builder for [`EtlConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct EtlConfigBuilder {
    root: Option<PathBuf>,
    database_path: Option<PathBuf>,
    extra_datasets: Vec<(String, String)>,
    cleaning: Option<CleaningOptions>,
    numeric_imputation: Option<NumericImputation>,
    categorical_imputation: Option<CategoricalImputation>,
    remove_duplicates: Option<bool>,
    strip_columns: Option<bool>,
    max_bar_chart_categories: Option<usize>,
    top_n_categories: Option<usize>,
    http_timeout_secs: Option<u64>,
    use_cache: Option<bool>,
}

impl EtlConfigBuilder {
    /// Root directory for the data/ and outputs/ layout.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Override the database file location.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Register an additional dataset (or replace a default one).
    pub fn dataset(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.extra_datasets.push((name.into(), url.into()));
        self
    }

    /// Replace the cleaning options wholesale.
    pub fn cleaning(mut self, options: CleaningOptions) -> Self {
        self.cleaning = Some(options);
        self
    }

    /// Set the numeric imputation strategy.
    pub fn numeric_imputation(mut self, strategy: NumericImputation) -> Self {
        self.numeric_imputation = Some(strategy);
        self
    }

    /// Set the categorical imputation strategy.
    pub fn categorical_imputation(mut self, strategy: CategoricalImputation) -> Self {
        self.categorical_imputation = Some(strategy);
        self
    }

    /// Enable or disable duplicate row removal.
    pub fn remove_duplicates(mut self, remove: bool) -> Self {
        self.remove_duplicates = Some(remove);
        self
    }

    /// Enable or disable whitespace stripping.
    pub fn strip_columns(mut self, strip: bool) -> Self {
        self.strip_columns = Some(strip);
        self
    }

    /// Maximum distinct values for a categorical bar chart.
    pub fn max_bar_chart_categories(mut self, max: usize) -> Self {
        self.max_bar_chart_categories = Some(max);
        self
    }

    /// Number of top values kept per categorical column.
    pub fn top_n_categories(mut self, n: usize) -> Self {
        self.top_n_categories = Some(n);
        self
    }

    /// HTTP timeout in seconds.
    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.http_timeout_secs = Some(secs);
        self
    }

    /// Enable or disable reuse of cached raw downloads.
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `EtlConfig` or an error if validation fails.
    pub fn build(self) -> Result<EtlConfig, ConfigValidationError> {
        let mut config = EtlConfig::with_root(self.root.unwrap_or_else(|| PathBuf::from(".")));

        if let Some(path) = self.database_path {
            config.database_path = path;
        }
        for (name, url) in self.extra_datasets {
            config.datasets.insert(name, url);
        }

        let mut cleaning = self.cleaning.unwrap_or_default();
        if let Some(strategy) = self.numeric_imputation {
            cleaning.numeric_na_strategy = strategy;
        }
        if let Some(strategy) = self.categorical_imputation {
            cleaning.categorical_na_strategy = strategy;
        }
        if let Some(remove) = self.remove_duplicates {
            cleaning.remove_duplicates = remove;
        }
        if let Some(strip) = self.strip_columns {
            cleaning.strip_columns = strip;
        }
        config.cleaning = cleaning;

        config.max_bar_chart_categories = self
            .max_bar_chart_categories
            .unwrap_or(config.max_bar_chart_categories);
        config.top_n_categories = self.top_n_categories.unwrap_or(config.top_n_categories);
        config.http_timeout_secs = self.http_timeout_secs.unwrap_or(config.http_timeout_secs);
        config.use_cache = self.use_cache.unwrap_or(config.use_cache);

        config.validate()?;
        Ok(config)
    }
}
