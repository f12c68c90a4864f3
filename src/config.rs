use std::env;
use std::path::PathBuf;

use crate::constants::{DEFAULT_ATLAS_API_URL, DEFAULT_GEOCODER_URL};
use crate::error::{PipelineError, Result};

/// Geocoding provider settings. The delay is the contractually required
/// minimum spacing between successive lookups.
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub delay_ms: u64,
}

/// Everything the pipeline needs from the environment, read once at
/// startup and passed by reference into each component.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace root holding `files/` and `old_datasets/`.
    pub path_root: PathBuf,
    /// Where the browser drops fresh exports, if staging is wanted.
    pub download_path: Option<PathBuf>,
    /// Expected export file name, e.g. `finn-eiendom.csv`.
    pub download_file_name: String,
    pub atlas_api_url: String,
    pub atlas_username: Option<String>,
    pub atlas_password: Option<String>,
    /// Target dataset. Absent switches publishing to webhook-only mode.
    pub dataset_id: Option<String>,
    pub webhook_url: Option<String>,
    pub geocoder: GeocoderConfig,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &str) -> Result<String> {
    optional(name).ok_or_else(|| PipelineError::Config(format!("{} must be set", name)))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let delay_ms = match optional("GEOCODER_DELAY_MS") {
            Some(raw) => raw.parse().map_err(|_| {
                PipelineError::Config(format!("GEOCODER_DELAY_MS is not a number: {}", raw))
            })?,
            None => 1000,
        };

        Ok(Config {
            path_root: PathBuf::from(required("PATH_ROOT")?),
            download_path: optional("DOWNLOAD_PATH").map(PathBuf::from),
            download_file_name: required("DOWNLOAD_FILE_NAME")?,
            atlas_api_url: optional("ATLAS_API_URL")
                .unwrap_or_else(|| DEFAULT_ATLAS_API_URL.to_string()),
            atlas_username: optional("ATLAS_USERNAME"),
            atlas_password: optional("ATLAS_PASSWORD"),
            dataset_id: optional("DATASET_ID"),
            webhook_url: optional("WEBHOOK_URL"),
            geocoder: GeocoderConfig {
                endpoint: optional("GEOCODER_URL")
                    .unwrap_or_else(|| DEFAULT_GEOCODER_URL.to_string()),
                user_agent: optional("GEOCODER_USER_AGENT")
                    .unwrap_or_else(|| "finn_atlas_sync".to_string()),
                delay_ms,
            },
        })
    }

    /// Credentials are only required in dataset mode; webhook-only runs
    /// never authenticate.
    pub fn atlas_credentials(&self) -> Result<(&str, &str)> {
        match (&self.atlas_username, &self.atlas_password) {
            (Some(user), Some(pass)) => Ok((user, pass)),
            _ => Err(PipelineError::Config(
                "ATLAS_USERNAME and ATLAS_PASSWORD must be set for dataset publishing".into(),
            )),
        }
    }
}
