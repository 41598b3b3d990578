//! Client-side copy of the published snapshot: fetch with retry, persist the
//! three sections together, reload into a fresh [`Catalog`].

use std::{
    future::Future,
    time::{Duration, SystemTime},
};

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{
    entities::{Item, Quest, Upgrades},
    Catalog, Snapshot,
};
use crate::util::{
    age_string, parse_rfc3339,
    persistence::{KeyValueStore, PersistError},
    unix_now,
    version::user_agent,
};

pub const ITEMS_KEY: &str = "arc_raiders_items_v1";
pub const QUESTS_KEY: &str = "arc_raiders_quests_v1";
pub const UPGRADES_KEY: &str = "arc_raiders_upgrades_v1";
pub const META_KEY: &str = "arc_raiders_snapshot_meta_v1";

/// Snapshots are republished daily.
pub const SNAPSHOT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {0}: failed to load database")]
    Status(StatusCode),
    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("failed after {attempts} attempts: {cause}")]
    RetriesExhausted { attempts: u32, cause: String },
    #[error("no snapshot stored locally")]
    Missing,
    #[error("failed to store snapshot: {0}")]
    Persist(#[from] PersistError),
}

impl SnapshotError {
    /// Network and status failures are worth another attempt; bad payloads are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, SnapshotError::Http(_) | SnapshotError::Status(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): base, 2x base, 4x base...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

pub trait SnapshotFetcher {
    fn fetch(&self) -> impl Future<Output = Result<Snapshot, SnapshotError>> + Send;
}

/// Downloads the published document with a cache-busting query.
#[derive(Clone)]
pub struct HttpSnapshotFetcher {
    http: Client,
    url: Url,
}

impl HttpSnapshotFetcher {
    pub fn new(url: Url) -> Result<Self, SnapshotError> {
        let http = Client::builder().user_agent(user_agent()).build()?;
        Ok(Self { http, url })
    }

    fn busted_url(&self) -> Url {
        let millis = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("t", &millis.to_string());
        url
    }
}

impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch(&self) -> Result<Snapshot, SnapshotError> {
        let url = self.busted_url();
        tracing::debug!(%url, "downloading snapshot");
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SnapshotError::Status(response.status()));
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct SnapshotMeta {
    #[serde(rename = "lastUpdated", default)]
    last_updated: String,
    /// Unix seconds when this client stored the snapshot.
    #[serde(rename = "fetchedAt", default)]
    fetched_at: u64,
}

pub struct SnapshotCache<S> {
    store: S,
    policy: RetryPolicy,
}

impl<S: KeyValueStore> SnapshotCache<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, RetryPolicy::default())
    }

    pub fn with_policy(store: S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// True only when items, quests and upgrades are all present.
    pub fn has_data(&self) -> bool {
        [ITEMS_KEY, QUESTS_KEY, UPGRADES_KEY]
            .iter()
            .all(|key| self.store.get(key).is_some_and(|value| !value.is_null()))
    }

    /// Fetches the published snapshot, retrying transient failures, then
    /// replaces all three sections in one write. Local data is untouched on error.
    pub async fn refresh<F>(
        &mut self,
        fetcher: &F,
        mut on_progress: impl FnMut(&str),
    ) -> Result<(), SnapshotError>
    where
        F: SnapshotFetcher,
    {
        on_progress("Downloading database...");

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        let snapshot = loop {
            match fetcher.fetch().await {
                Ok(snapshot) => break snapshot,
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        %err,
                        ?delay,
                        "snapshot fetch failed, retrying"
                    );
                    on_progress(&format!(
                        "Retry {attempt}/{max_attempts} in {}s...",
                        delay.as_secs_f64()
                    ));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_transient() => {
                    tracing::error!(attempts = attempt, %err, "snapshot fetch gave up");
                    return Err(SnapshotError::RetriesExhausted {
                        attempts: attempt,
                        cause: err.to_string(),
                    });
                }
                Err(err) => {
                    tracing::error!(%err, "snapshot rejected");
                    return Err(err);
                }
            }
        };

        let meta = SnapshotMeta {
            last_updated: snapshot.last_updated.clone(),
            fetched_at: unix_now(),
        };
        let item_count = snapshot.items.len();
        self.store.set_many(vec![
            (ITEMS_KEY.to_string(), serde_json::to_value(snapshot.items)?),
            (QUESTS_KEY.to_string(), serde_json::to_value(snapshot.quests)?),
            (UPGRADES_KEY.to_string(), serde_json::to_value(snapshot.upgrades)?),
            (META_KEY.to_string(), serde_json::to_value(meta)?),
        ])?;
        tracing::info!(items = item_count, "[snapshot] stored");

        on_progress("Ready!");
        Ok(())
    }

    /// Reads the stored sections into a new catalog; its usage index is built
    /// from scratch on first use.
    pub fn reload(&self) -> Result<Catalog, SnapshotError> {
        if !self.has_data() {
            return Err(SnapshotError::Missing);
        }
        let items: Vec<Item> = self.section(ITEMS_KEY)?;
        let quests: Vec<Quest> = self.section(QUESTS_KEY)?;
        let upgrades: Upgrades = self.section(UPGRADES_KEY)?;
        let last_updated = self.meta().last_updated;
        tracing::debug!(items = items.len(), quests = quests.len(), "reloaded snapshot");
        Ok(Catalog::new(Snapshot {
            items,
            quests,
            upgrades,
            last_updated,
        }))
    }

    /// Time since this client stored the snapshot.
    pub fn age(&self) -> Option<Duration> {
        let meta = self.meta();
        (meta.fetched_at > 0)
            .then(|| Duration::from_secs(unix_now().saturating_sub(meta.fetched_at)))
    }

    /// Time since the builder produced the snapshot.
    pub fn content_age(&self) -> Option<Duration> {
        let produced = parse_rfc3339(&self.meta().last_updated)?;
        Some(produced.elapsed().unwrap_or_default())
    }

    pub fn is_stale(&self, ttl: Duration) -> bool {
        !self.has_data() || self.age().map(|age| age > ttl).unwrap_or(true)
    }

    pub fn age_string(&self) -> Option<String> {
        self.age().map(age_string)
    }

    pub fn last_updated(&self) -> Option<String> {
        Some(self.meta().last_updated).filter(|value| !value.is_empty())
    }

    fn section<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T, SnapshotError> {
        let value = self.store.get(key).cloned().unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    fn meta(&self) -> SnapshotMeta {
        self.store
            .get(META_KEY)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}
