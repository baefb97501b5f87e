//! Data source instance settings.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Default number of queries executed concurrently within one dispatch.
pub const DEFAULT_MAX_PARALLEL_QUERIES: usize = 4;

/// Settings for one configured data source instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceSettings {
    /// Base URL of the DEEP backend, e.g. `http://localhost:3100`.
    pub url: String,

    /// Headers forwarded on every backend request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request timeout handed to the HTTP client. No timeout when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Worker threads used to fan out the queries of one request.
    #[serde(default = "default_max_parallel_queries")]
    pub max_parallel_queries: usize,
}

fn default_max_parallel_queries() -> usize {
    DEFAULT_MAX_PARALLEL_QUERIES
}

impl DatasourceSettings {
    /// Settings pointing at `url` with everything else defaulted.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_secs: None,
            max_parallel_queries: DEFAULT_MAX_PARALLEL_QUERIES,
        }
    }

    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        Ok(settings)
    }
}
