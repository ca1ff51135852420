//! Configuration loading and database path resolution
//!
//! Settings resolve in priority order:
//! 1. Explicit argument (highest priority)
//! 2. Environment variable (`POSTLOCAL_*`)
//! 3. TOML config file (`postlocal.toml` in the platform config dir)
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_POSTCODE_BASE_URL: &str = "https://api.postcodes.io";
pub const DEFAULT_TRANSIT_BASE_URL: &str = "https://naptan.api.dft.gov.uk";
pub const DEFAULT_CRIME_BASE_URL: &str = "https://data.police.uk/api";

/// Runtime configuration for the search service
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the SQLite database file
    pub database_path: PathBuf,
    /// Base URL of the postcode lookup service
    pub postcode_base_url: String,
    /// Base URL of the transit (stop registry) service
    pub transit_base_url: String,
    /// Base URL of the crime data service
    pub crime_base_url: String,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout_secs: u64,
    /// User-Agent sent to external services
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            postcode_base_url: DEFAULT_POSTCODE_BASE_URL.to_string(),
            transit_base_url: DEFAULT_TRANSIT_BASE_URL.to_string(),
            crime_base_url: DEFAULT_CRIME_BASE_URL.to_string(),
            http_timeout_secs: 30,
            user_agent: concat!("postlocal/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Subset of settings readable from postlocal.toml
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database_path: Option<PathBuf>,
    postcode_base_url: Option<String>,
    transit_base_url: Option<String>,
    crime_base_url: Option<String>,
    http_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration, resolving each setting through the priority chain.
    ///
    /// `database_path` is the explicit-argument override for the database
    /// location; pass `None` to fall through to environment/file/default.
    pub fn load(database_path: Option<&str>) -> Result<Self> {
        let file = load_config_file()?;
        let mut config = Config::default();

        if let Some(path) = database_path {
            config.database_path = PathBuf::from(path);
        } else if let Ok(path) = std::env::var("POSTLOCAL_DB") {
            config.database_path = PathBuf::from(path);
        } else if let Some(path) = file.database_path {
            config.database_path = path;
        }

        config.postcode_base_url = resolve_url(
            "POSTLOCAL_POSTCODE_URL",
            file.postcode_base_url,
            DEFAULT_POSTCODE_BASE_URL,
        );
        config.transit_base_url = resolve_url(
            "POSTLOCAL_TRANSIT_URL",
            file.transit_base_url,
            DEFAULT_TRANSIT_BASE_URL,
        );
        config.crime_base_url = resolve_url(
            "POSTLOCAL_CRIME_URL",
            file.crime_base_url,
            DEFAULT_CRIME_BASE_URL,
        );

        if let Some(timeout) = file.http_timeout_secs {
            if timeout == 0 {
                return Err(Error::Config(
                    "http_timeout_secs must be greater than zero".to_string(),
                ));
            }
            config.http_timeout_secs = timeout;
        }

        Ok(config)
    }
}

fn resolve_url(env_var: &str, file_value: Option<String>, default: &str) -> String {
    if let Ok(value) = std::env::var(env_var) {
        return value.trim_end_matches('/').to_string();
    }
    file_value
        .map(|v| v.trim_end_matches('/').to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Parse postlocal.toml if present; a missing file is not an error,
/// a malformed one is.
fn load_config_file() -> Result<FileConfig> {
    let Some(path) = config_file_path() else {
        return Ok(FileConfig::default());
    };
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("POSTLOCAL_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("postlocal").join("postlocal.toml"))
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("postlocal").join("postlocal.db"))
        .unwrap_or_else(|| PathBuf::from("./postlocal_data/postlocal.db"))
}
