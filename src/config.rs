//! Run configuration.
//!
//! A `RunConfig` is resolved once at startup from CLI flags, an optional JSON
//! config file, and built-in defaults (in that order of precedence). Components
//! receive the pieces they need and never read process state themselves.
use crate::cli::RunArgs;
use crate::error::PipelineError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATASET_ENDPOINT: &str =
    "https://discover.data.vic.gov.au/api/3/action/datastore_search";
pub const DEFAULT_RESOURCE_ID: &str = "afb52611-6061-4a2b-9110-74c920bede77";
pub const DEFAULT_DATASET_LIMIT: u32 = 10_000;
pub const DEFAULT_GEOCODE_ENDPOINT: &str = "http://api.positionstack.com/v1/forward";
pub const DEFAULT_REGION: &str = "Victoria";
pub const DEFAULT_COUNTRY_CODE: &str = "AU";
pub const DEFAULT_COUNTRY_NAME: &str = "Australia";
pub const DEFAULT_OUTPUT_PATH: &str = "docs/datavic.json";
pub const DEFAULT_STORE_PATH: &str = "database.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BACKOFF_MS: u64 = 1_000;

/// Optional overrides loaded from `--config`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub dataset_endpoint: Option<String>,
    pub resource_id: Option<String>,
    pub limit: Option<u32>,
    pub fields: Option<Vec<String>>,
    pub geocode_endpoint: Option<String>,
    pub region: Option<String>,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub backoff_ms: Option<u64>,
    pub interval_ms: Option<u64>,
    pub max_lookups: Option<usize>,
    pub output: Option<PathBuf>,
    pub store: Option<PathBuf>,
}

/// Where the raw dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    Remote(DatasetQuery),
    File(PathBuf),
}

/// Parameters of the dataset search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetQuery {
    pub endpoint: String,
    pub resource_id: String,
    pub limit: u32,
    pub fields: Vec<String>,
}

/// Settings shared by the geocoding client and the selective pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeSettings {
    pub endpoint: String,
    pub access_key: String,
    pub region: String,
    pub country_code: String,
    pub country_name: String,
    pub retries: u32,
    pub backoff: Duration,
    pub interval: Duration,
    pub max_lookups: Option<usize>,
}

/// Output locations for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub enriched: PathBuf,
    pub store: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub dataset: DatasetSource,
    pub geocode: GeocodeSettings,
    pub paths: OutputPaths,
    pub timeout: Duration,
}

/// Load a config file, failing on unknown keys.
pub fn load_config_file(path: &Path) -> Result<ConfigFile, PipelineError> {
    let bytes = fs::read(path)
        .map_err(|err| PipelineError::Config(format!("read {}: {err}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| PipelineError::Config(format!("parse {}: {err}", path.display())))
}

/// Resolve the run configuration; the credential is checked before anything else.
pub fn resolve_run_config(args: &RunArgs, file: ConfigFile) -> Result<RunConfig, PipelineError> {
    let access_key = match args.api_key.as_deref() {
        None => return Err(PipelineError::Config("API key not declared".to_string())),
        Some(key) if key.trim().is_empty() => {
            return Err(PipelineError::Config("API key is empty".to_string()))
        }
        Some(key) => key.trim().to_string(),
    };

    let dataset = match &args.dataset_file {
        Some(path) => DatasetSource::File(path.clone()),
        None => DatasetSource::Remote(DatasetQuery {
            endpoint: file
                .dataset_endpoint
                .unwrap_or_else(|| DEFAULT_DATASET_ENDPOINT.to_string()),
            resource_id: file
                .resource_id
                .unwrap_or_else(|| DEFAULT_RESOURCE_ID.to_string()),
            limit: file.limit.unwrap_or(DEFAULT_DATASET_LIMIT),
            fields: file.fields.unwrap_or_default(),
        }),
    };

    let geocode = GeocodeSettings {
        endpoint: args
            .geocode_endpoint
            .clone()
            .or(file.geocode_endpoint)
            .unwrap_or_else(|| DEFAULT_GEOCODE_ENDPOINT.to_string()),
        access_key,
        region: file.region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
        country_code: file
            .country_code
            .unwrap_or_else(|| DEFAULT_COUNTRY_CODE.to_string()),
        country_name: file
            .country_name
            .unwrap_or_else(|| DEFAULT_COUNTRY_NAME.to_string()),
        retries: args.retries.or(file.retries).unwrap_or(0),
        backoff: Duration::from_millis(file.backoff_ms.unwrap_or(DEFAULT_BACKOFF_MS)),
        interval: Duration::from_millis(args.interval_ms.or(file.interval_ms).unwrap_or(0)),
        max_lookups: args.max_lookups.or(file.max_lookups),
    };

    let paths = OutputPaths {
        enriched: args
            .output
            .clone()
            .or(file.output)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
        store: args
            .store
            .clone()
            .or(file.store)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
    };

    let timeout_secs = args
        .timeout_secs
        .or(file.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(PipelineError::Config(
            "timeout_secs must be greater than zero".to_string(),
        ));
    }

    Ok(RunConfig {
        dataset,
        geocode,
        paths,
        timeout: Duration::from_secs(timeout_secs),
    })
}

/// Build the blocking HTTP agent used for both collaborators.
pub fn http_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    ureq::Agent::new_with_config(config)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
