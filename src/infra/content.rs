//! Thin asynchronous client for the community data repository.
//!
//! - Lists a folder through the GitHub contents API.
//! - Downloads each JSON record by its raw `download_url`.

use std::future::Future;

use reqwest::{header, Client, Url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::util::{config::Config, version::user_agent};

pub const DEFAULT_CONTENT_API: &str =
    "https://api.github.com/repos/RaidTheory/arcraiders-data/contents/";
pub const ITEMS_FOLDER: &str = "items";
pub const QUESTS_FOLDER: &str = "quests";
pub const HIDEOUT_FOLDER: &str = "hideout";
pub const DATA_EXTENSION: &str = ".json";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to fetch list from {url}: {source}")]
    Listing {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to download {name}: {source}")]
    File {
        name: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{0} has no download URL")]
    MissingDownloadUrl(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FolderEntry {
    pub name: String,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl FolderEntry {
    pub fn is_data_file(&self) -> bool {
        self.name.ends_with(DATA_EXTENSION)
    }
}

/// Remote folders of raw JSON records.
pub trait ContentSource {
    fn list_folder(
        &self,
        folder: &str,
    ) -> impl Future<Output = Result<Vec<FolderEntry>, ContentError>> + Send;

    fn fetch_file(
        &self,
        entry: &FolderEntry,
    ) -> impl Future<Output = Result<Value, ContentError>> + Send;
}

#[derive(Clone)]
pub struct GithubContent {
    http: Client,
    base_url: Url,
}

impl GithubContent {
    /// `token` lifts the anonymous GitHub rate limit when present.
    pub fn with_base_url(base: &str, token: Option<&str>) -> Result<Self, ContentError> {
        let mut base_url = Url::parse(base)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(value) =
            token.and_then(|t| header::HeaderValue::from_str(&format!("Bearer {t}")).ok())
        {
            headers.insert(header::AUTHORIZATION, value);
        }

        let http = Client::builder()
            .user_agent(user_agent())
            .default_headers(headers)
            .build()
            .map_err(ContentError::Client)?;
        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self, ContentError> {
        Self::with_base_url(config.content_api.as_str(), config.github_token.as_deref())
    }

    fn url(&self, folder: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(folder)
    }
}

impl ContentSource for GithubContent {
    async fn list_folder(&self, folder: &str) -> Result<Vec<FolderEntry>, ContentError> {
        let url = self.url(folder)?;
        tracing::debug!(%url, "listing folder");
        let listing_error = |source| ContentError::Listing {
            url: url.to_string(),
            source,
        };
        self.http
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(listing_error)?
            .json::<Vec<FolderEntry>>()
            .await
            .map_err(listing_error)
    }

    async fn fetch_file(&self, entry: &FolderEntry) -> Result<Value, ContentError> {
        let download_url = entry
            .download_url
            .as_deref()
            .ok_or_else(|| ContentError::MissingDownloadUrl(entry.name.clone()))?;
        let file_error = |source| ContentError::File {
            name: entry.name.clone(),
            source,
        };
        self.http
            .get(download_url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(file_error)?
            .json::<Value>()
            .await
            .map_err(file_error)
    }
}
