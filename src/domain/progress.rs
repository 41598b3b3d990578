use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

/// Completion key for a workshop upgrade, e.g. `"Workshop-2"`.
pub fn upgrade_key(station: &str, level: u32) -> String {
    format!("{station}-{level}")
}

/// Player progress, independent of which snapshot is loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserProgress {
    pub completed_upgrades: HashSet<String>,
    pub completed_quests: HashSet<String>,
    pub tracked_quests: HashSet<String>,
}

impl UserProgress {
    pub fn is_upgrade_complete(&self, station: &str, level: u32) -> bool {
        self.completed_upgrades
            .contains(&upgrade_key(station, level))
    }

    pub fn is_quest_complete(&self, key: &str) -> bool {
        self.completed_quests.contains(key)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpgradeProgressRecord {
    #[serde(rename = "completedUpgrades", default)]
    pub completed_upgrades: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuestProgressRecord {
    #[serde(rename = "completedQuests", default)]
    pub completed_quests: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackedQuestsRecord {
    #[serde(rename = "trackedQuests", default)]
    pub tracked_quests: BTreeSet<String>,
}
