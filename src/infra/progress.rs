//! Persisted completion and tracking state, mutated only through toggles.

use std::collections::{BTreeSet, HashSet};

use serde::{de::DeserializeOwned, Serialize};

use crate::domain::{
    progress::{
        upgrade_key, QuestProgressRecord, TrackedQuestsRecord, UpgradeProgressRecord,
    },
    UserProgress,
};
use crate::util::persistence::{KeyValueStore, PersistError};

pub const UPGRADES_KEY: &str = "arc_raiders_progress_v1";
pub const QUESTS_KEY: &str = "arc_raiders_quest_progress_v1";
pub const TRACKED_KEY: &str = "arc_raiders_tracked_quests_v1";

trait SetRecord: Serialize + DeserializeOwned {
    const KEY: &'static str;
    fn from_set(set: BTreeSet<String>) -> Self;
    fn into_set(self) -> BTreeSet<String>;
}

impl SetRecord for UpgradeProgressRecord {
    const KEY: &'static str = UPGRADES_KEY;
    fn from_set(set: BTreeSet<String>) -> Self {
        Self {
            completed_upgrades: set,
        }
    }
    fn into_set(self) -> BTreeSet<String> {
        self.completed_upgrades
    }
}

impl SetRecord for QuestProgressRecord {
    const KEY: &'static str = QUESTS_KEY;
    fn from_set(set: BTreeSet<String>) -> Self {
        Self {
            completed_quests: set,
        }
    }
    fn into_set(self) -> BTreeSet<String> {
        self.completed_quests
    }
}

impl SetRecord for TrackedQuestsRecord {
    const KEY: &'static str = TRACKED_KEY;
    fn from_set(set: BTreeSet<String>) -> Self {
        Self {
            tracked_quests: set,
        }
    }
    fn into_set(self) -> BTreeSet<String> {
        self.tracked_quests
    }
}

pub struct ProgressStore<S> {
    store: S,
}

impl<S: KeyValueStore> ProgressStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load(&self) -> UserProgress {
        UserProgress {
            completed_upgrades: self.completed_upgrades(),
            completed_quests: self.completed_quests(),
            tracked_quests: self.tracked_quests(),
        }
    }

    pub fn completed_upgrades(&self) -> HashSet<String> {
        self.read::<UpgradeProgressRecord>().into_iter().collect()
    }

    pub fn completed_quests(&self) -> HashSet<String> {
        self.read::<QuestProgressRecord>().into_iter().collect()
    }

    pub fn tracked_quests(&self) -> HashSet<String> {
        self.read::<TrackedQuestsRecord>().into_iter().collect()
    }

    pub fn toggle_upgrade(
        &mut self,
        station: &str,
        level: u32,
        is_complete: bool,
    ) -> Result<HashSet<String>, PersistError> {
        self.toggle::<UpgradeProgressRecord>(upgrade_key(station, level), is_complete)
    }

    pub fn toggle_quest(
        &mut self,
        name: &str,
        is_complete: bool,
    ) -> Result<HashSet<String>, PersistError> {
        self.toggle::<QuestProgressRecord>(name.to_string(), is_complete)
    }

    pub fn toggle_tracked_quest(
        &mut self,
        name: &str,
        is_tracked: bool,
    ) -> Result<HashSet<String>, PersistError> {
        self.toggle::<TrackedQuestsRecord>(name.to_string(), is_tracked)
    }

    fn read<R: SetRecord>(&self) -> BTreeSet<String> {
        let Some(value) = self.store.get(R::KEY) else {
            return BTreeSet::new();
        };
        match serde_json::from_value::<R>(value.clone()) {
            Ok(record) => record.into_set(),
            Err(err) => {
                tracing::warn!(key = R::KEY, %err, "malformed progress record, treating as empty");
                BTreeSet::new()
            }
        }
    }

    fn toggle<R: SetRecord>(
        &mut self,
        member: String,
        present: bool,
    ) -> Result<HashSet<String>, PersistError> {
        let mut current = self.read::<R>();
        if present {
            current.insert(member.clone());
        } else {
            current.remove(&member);
        }
        let value = serde_json::to_value(R::from_set(current.clone()))?;
        self.store.set(R::KEY, value)?;
        tracing::info!(key = R::KEY, %member, present, "progress updated");
        Ok(current.into_iter().collect())
    }
}
