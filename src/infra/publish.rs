//! Publishing targets for a finished snapshot. Both overwrite a fixed address
//! so consumers always fetch the same location.

use std::{future::Future, io, path::PathBuf};

use reqwest::{header, Client, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::domain::Snapshot;
use crate::util::{config::Config, now_rfc3339, persistence::write_atomic, version::user_agent};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to write snapshot: {0}")]
    Io(#[from] io::Error),
    #[error("failed to serialise snapshot: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("upload failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("publish token is not configured")]
    MissingToken,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishReceipt {
    pub url: String,
    pub timestamp: String,
}

pub trait Publisher {
    fn publish(
        &self,
        snapshot: &Snapshot,
    ) -> impl Future<Output = Result<PublishReceipt, PublishError>> + Send;
}

/// Replaces a local file via rename; readers see the old or the new document.
#[derive(Clone, Debug)]
pub struct FilePublisher {
    path: PathBuf,
}

impl FilePublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Publisher for FilePublisher {
    async fn publish(&self, snapshot: &Snapshot) -> Result<PublishReceipt, PublishError> {
        let bytes = serde_json::to_vec(snapshot)?;
        write_atomic(&self.path, &bytes)?;
        tracing::info!(path = %self.path.display(), bytes = bytes.len(), "snapshot written");
        Ok(PublishReceipt {
            url: self.path.display().to_string(),
            timestamp: now_rfc3339(),
        })
    }
}

/// PUTs the document to a blob store under a fixed pathname.
#[derive(Clone)]
pub struct HttpPublisher {
    http: Client,
    url: Url,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    url: Option<String>,
}

impl HttpPublisher {
    pub fn new(url: Url, token: Option<String>) -> Result<Self, PublishError> {
        let http = Client::builder().user_agent(user_agent()).build()?;
        Ok(Self { http, url, token })
    }
}

impl Publisher for HttpPublisher {
    async fn publish(&self, snapshot: &Snapshot) -> Result<PublishReceipt, PublishError> {
        let token = self.token.as_deref().ok_or(PublishError::MissingToken)?;
        let body = serde_json::to_vec(snapshot)?;
        let response = self
            .http
            .put(self.url.clone())
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-add-random-suffix", "0")
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        let uploaded = response
            .json::<UploadResponse>()
            .await
            .ok()
            .and_then(|r| r.url)
            .unwrap_or_else(|| self.url.to_string());
        Ok(PublishReceipt {
            url: uploaded,
            timestamp: now_rfc3339(),
        })
    }
}

/// Runtime choice between the two targets.
#[derive(Clone)]
pub enum AnyPublisher {
    File(FilePublisher),
    Http(HttpPublisher),
}

impl AnyPublisher {
    /// Uploads when a publish URL is configured, otherwise writes the local file.
    pub fn from_config(config: &Config) -> Result<Self, PublishError> {
        match &config.publish_url {
            Some(url) => Ok(AnyPublisher::Http(HttpPublisher::new(
                url.clone(),
                config.publish_token.clone(),
            )?)),
            None => Ok(AnyPublisher::File(FilePublisher::new(&config.publish_path))),
        }
    }
}

impl Publisher for AnyPublisher {
    async fn publish(&self, snapshot: &Snapshot) -> Result<PublishReceipt, PublishError> {
        match self {
            AnyPublisher::File(publisher) => publisher.publish(snapshot).await,
            AnyPublisher::Http(publisher) => publisher.publish(snapshot).await,
        }
    }
}
