use std::{collections::HashSet, path::PathBuf};

use anyhow::{bail, Context};
use serde::Serialize;

use crate::{
    domain::{
        entities::{Item, Quest},
        localization::label_from_id, resolve_recommendation, Catalog,
        Recommendation, UserProgress,
    },
    infra::{
        progress::ProgressStore,
        snapshot::{HttpSnapshotFetcher, SnapshotCache, SnapshotFetcher, SNAPSHOT_TTL},
    },
    util::{
        age_string,
        config::Config,
        persistence::{FileStore, CACHE_FILE, PROGRESS_FILE},
    },
};

/// Local client state: the cached snapshot, the catalog built from it and the
/// player's progress.
pub struct App {
    config: Config,
    snapshots: SnapshotCache<FileStore>,
    progress: ProgressStore<FileStore>,
    catalog: Option<Catalog>,
    data_dir: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct Status {
    pub snapshot_url: String,
    pub data_dir: String,
    pub has_data: bool,
    pub stale: bool,
    pub last_updated: Option<String>,
    pub age: Option<String>,
    pub published_age: Option<String>,
    pub completed_upgrades: usize,
    pub completed_quests: usize,
    pub tracked_quests: usize,
}

impl App {
    pub fn open(config: Config) -> anyhow::Result<Self> {
        let data_dir = config.data_dir()?;
        tracing::debug!(dir = %data_dir.display(), "opening local stores");
        Ok(Self {
            snapshots: SnapshotCache::new(FileStore::open(data_dir.join(CACHE_FILE))),
            progress: ProgressStore::new(FileStore::open(data_dir.join(PROGRESS_FILE))),
            catalog: None,
            data_dir,
            config,
        })
    }

    /// Makes a catalog available, downloading first when the local copy is
    /// missing or older than a day. A failed download falls back to stale data.
    pub async fn prepare(&mut self, on_progress: impl FnMut(&str)) -> anyhow::Result<()> {
        if self.snapshots.is_stale(SNAPSHOT_TTL) {
            let fetcher = HttpSnapshotFetcher::new(self.config.snapshot_url.clone())?;
            if let Err(err) = self.refresh_with(&fetcher, on_progress).await {
                if !self.snapshots.has_data() {
                    return Err(err).context("no local data and the download failed");
                }
                tracing::warn!(error = %err, "using stale local data");
            }
        }
        if self.catalog.is_none() {
            self.catalog = Some(self.snapshots.reload()?);
        }
        Ok(())
    }

    /// Unconditional download; replaces the catalog on success.
    pub async fn refresh(&mut self, on_progress: impl FnMut(&str)) -> anyhow::Result<()> {
        let fetcher = HttpSnapshotFetcher::new(self.config.snapshot_url.clone())?;
        self.refresh_with(&fetcher, on_progress).await
    }

    async fn refresh_with<F: SnapshotFetcher>(
        &mut self,
        fetcher: &F,
        on_progress: impl FnMut(&str),
    ) -> anyhow::Result<()> {
        self.snapshots.refresh(fetcher, on_progress).await?;
        self.catalog = Some(self.snapshots.reload()?);
        Ok(())
    }

    pub fn catalog(&self) -> anyhow::Result<&Catalog> {
        self.catalog
            .as_ref()
            .context("item database is not loaded; run `refresh` first")
    }

    pub fn user_progress(&self) -> UserProgress {
        self.progress.load()
    }

    pub fn recommend(&self, item: &Item, progress: &UserProgress) -> Recommendation {
        resolve_recommendation(item, &progress.completed_upgrades, &progress.completed_quests)
    }

    pub fn status(&self) -> Status {
        let progress = self.progress.load();
        Status {
            snapshot_url: self.config.snapshot_url.to_string(),
            data_dir: self.data_dir.display().to_string(),
            has_data: self.snapshots.has_data(),
            stale: self.snapshots.is_stale(SNAPSHOT_TTL),
            last_updated: self.snapshots.last_updated(),
            age: self.snapshots.age_string(),
            published_age: self.snapshots.content_age().map(age_string),
            completed_upgrades: progress.completed_upgrades.len(),
            completed_quests: progress.completed_quests.len(),
            tracked_quests: progress.tracked_quests.len(),
        }
    }

    /// Accepts a station id (`weapon_bench`) or its label (`Weapon Bench`).
    pub fn set_upgrade_complete(
        &mut self,
        station: &str,
        level: u32,
        complete: bool,
    ) -> anyhow::Result<HashSet<String>> {
        let wanted = label_from_id(station.trim());
        let Some(upgrade) = self
            .catalog()?
            .all_upgrades()
            .into_iter()
            .find(|upgrade| {
                upgrade.station.eq_ignore_ascii_case(&wanted) && upgrade.level == level
            })
        else {
            bail!("no upgrade {wanted} level {level} uses any item");
        };
        Ok(self.progress.toggle_upgrade(&upgrade.station, level, complete)?)
    }

    pub fn set_quest_complete(
        &mut self,
        name: &str,
        complete: bool,
    ) -> anyhow::Result<HashSet<String>> {
        let key = self.quest_key(name, false)?;
        Ok(self.progress.toggle_quest(&key, complete)?)
    }

    pub fn set_quest_tracked(
        &mut self,
        name: &str,
        tracked: bool,
    ) -> anyhow::Result<HashSet<String>> {
        let key = self.quest_key(name, true)?;
        Ok(self.progress.toggle_tracked_quest(&key, tracked)?)
    }

    /// Pinned quests in catalog order, with or without item requirements.
    pub fn tracked_quests(&self) -> anyhow::Result<Vec<&Quest>> {
        let tracked = self.progress.load().tracked_quests;
        Ok(self
            .catalog()?
            .quests()
            .iter()
            .filter(|quest| tracked.contains(&quest.quest_name))
            .collect())
    }

    /// Resolves a case-insensitive quest or expedition name to its stored key.
    /// Completion only counts for quests that consume items; any quest can be
    /// tracked.
    fn quest_key(&self, name: &str, any_quest: bool) -> anyhow::Result<String> {
        let catalog = self.catalog()?;
        let wanted = name.trim();
        catalog
            .quests()
            .iter()
            .filter(|quest| any_quest || !quest.requirements().is_empty())
            .map(|quest| quest.quest_name.clone())
            .chain(catalog.all_expeditions().into_iter().map(|exp| exp.name))
            .find(|key| key.eq_ignore_ascii_case(wanted))
            .with_context(|| format!("unknown quest or expedition: {wanted}"))
    }
}
