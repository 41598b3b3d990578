//! Runtime settings, read from the environment with built-in defaults.

use std::{
    collections::HashMap,
    fs,
    net::SocketAddr,
    path::PathBuf,
};

use thiserror::Error;
use url::Url;

use crate::domain::PricingTable;
use crate::infra::content::DEFAULT_CONTENT_API;
use crate::util::persistence::default_data_dir;

pub const DEFAULT_SNAPSHOT_URL: &str =
    "https://3xepmfoaupvwolpr.public.blob.vercel-storage.com/arc_raiders_db.json";
pub const DEFAULT_PUBLISH_PATH: &str = "arc_raiders_db.json";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{var} must be a positive number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} is not a socket address: {value:?}")]
    InvalidAddr { var: &'static str, value: String },
    #[error("failed to read price overrides from {path}: {source}")]
    PricesIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("price overrides in {path} must be an object of integers: {source}")]
    PricesFormat {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no data directory available; set SALVAGE_DATA_DIR")]
    NoDataDir,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub content_api: Url,
    pub github_token: Option<String>,
    pub snapshot_url: Url,
    pub publish_path: PathBuf,
    pub publish_url: Option<Url>,
    pub publish_token: Option<String>,
    pub cron_secret: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub bind: SocketAddr,
    pub fetch_concurrency: usize,
    pub prices_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let parse_url = |var: &'static str, raw: &str| {
            Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { var, source })
        };

        let content_api = parse_url(
            "SALVAGE_CONTENT_API",
            get("SALVAGE_CONTENT_API").as_deref().unwrap_or(DEFAULT_CONTENT_API),
        )?;
        let snapshot_url = parse_url(
            "SALVAGE_SNAPSHOT_URL",
            get("SALVAGE_SNAPSHOT_URL").as_deref().unwrap_or(DEFAULT_SNAPSHOT_URL),
        )?;
        let publish_url = get("SALVAGE_PUBLISH_URL")
            .map(|raw| parse_url("SALVAGE_PUBLISH_URL", &raw))
            .transpose()?;

        let bind_raw = get("SALVAGE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw.parse().map_err(|_| ConfigError::InvalidAddr {
            var: "SALVAGE_BIND",
            value: bind_raw.clone(),
        })?;

        let fetch_concurrency = match get("SALVAGE_FETCH_CONCURRENCY") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidNumber {
                    var: "SALVAGE_FETCH_CONCURRENCY",
                    value: raw,
                })?,
            None => DEFAULT_FETCH_CONCURRENCY,
        };

        Ok(Self {
            content_api,
            github_token: get("GITHUB_TOKEN"),
            snapshot_url,
            publish_path: get("SALVAGE_PUBLISH_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PUBLISH_PATH)),
            publish_url,
            publish_token: get("BLOB_READ_WRITE_TOKEN"),
            cron_secret: get("CRON_SECRET"),
            data_dir: get("SALVAGE_DATA_DIR").map(PathBuf::from),
            bind,
            fetch_concurrency,
            prices_path: get("SALVAGE_PRICES").map(PathBuf::from),
        })
    }

    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        self.data_dir
            .clone()
            .or_else(default_data_dir)
            .ok_or(ConfigError::NoDataDir)
    }

    /// Built-in component prices, extended by the optional overrides file.
    pub fn pricing(&self) -> Result<PricingTable, ConfigError> {
        let mut table = PricingTable::default();
        let Some(path) = &self.prices_path else {
            return Ok(table);
        };
        let display = path.display().to_string();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::PricesIo {
            path: display.clone(),
            source,
        })?;
        let overrides: HashMap<String, i64> = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::PricesFormat {
                path: display,
                source,
            })?;
        tracing::info!(path = %path.display(), entries = overrides.len(), "loaded price overrides");
        table.extend(overrides);
        Ok(table)
    }

    /// Whether the configured publish target has what it needs to write.
    pub fn publish_credentials_present(&self) -> bool {
        self.publish_url.is_none() || self.publish_token.is_some()
    }
}
