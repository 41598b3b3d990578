use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::localization::LocalizedText;

/// Identifier used by the community dataset (e.g. `"metal_parts"`).
pub type ItemId = String;

/// Level key -> requirements, e.g. `"level_2" -> [..]`.
pub type StationLevels = BTreeMap<String, Vec<Requirement>>;

/// Precomputed verdict stored alongside each item in the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "RECYCLE")]
    Recycle,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "NEUTRAL")]
    Neutral,
    #[serde(rename = "EITHER")]
    Either,
    #[serde(rename = "RECYCLE PRIORITY")]
    RecyclePriority,
    #[serde(rename = "PRIORITY DONOR")]
    PriorityDonor,
    #[serde(other)]
    Unknown,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Recycle => "RECYCLE",
            Verdict::Sell => "SELL",
            Verdict::Neutral => "NEUTRAL",
            Verdict::Either => "EITHER",
            Verdict::RecyclePriority => "RECYCLE PRIORITY",
            Verdict::PriorityDonor => "PRIORITY DONOR",
            Verdict::Unknown => "UNKNOWN",
        }
    }
}

/// Curated protection class, independent of any active quest or upgrade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityCategory {
    BaseComponent,
    CoreComponent,
    HighPriorityComponent,
    Donor,
    SafeToSell,
}

impl PriorityCategory {
    pub fn label(&self) -> &'static str {
        match self {
            PriorityCategory::BaseComponent => "Base Component",
            PriorityCategory::CoreComponent => "Core Component",
            PriorityCategory::HighPriorityComponent => "High Priority",
            PriorityCategory::Donor => "Donor Item",
            PriorityCategory::SafeToSell => "Safe to Sell",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: LocalizedText,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub sell_price: Option<i64>,
    #[serde(default)]
    pub recycle_value: Option<i64>,
    #[serde(default)]
    pub roi_pct: Option<i64>,
    #[serde(default)]
    pub yields: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Verdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<LocalizedText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_category: Option<PriorityCategory>,
    /// Older snapshots flag core components with a bare boolean.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_core: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Usage::is_empty")]
    pub usage: Usage,
}

impl Item {
    pub fn display_name(&self, language: &str) -> &str {
        let name = self.name.resolve(language);
        if name.is_empty() {
            &self.id
        } else {
            name
        }
    }

    pub fn effective_category(&self) -> Option<PriorityCategory> {
        self.priority_category
            .or(self.is_core.then_some(PriorityCategory::CoreComponent))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub quest: Vec<QuestUsage>,
    #[serde(default)]
    pub upgrade: Vec<UpgradeUsage>,
}

impl Usage {
    pub fn is_empty(&self) -> bool {
        self.quest.is_empty() && self.upgrade.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    Quest,
    Expedition,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestUsage {
    #[serde(rename = "type")]
    pub kind: UsageKind,
    /// Identity checked against the completed-quest set.
    pub key: String,
    /// Label shown to the player.
    pub details: String,
    pub amount: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeUsage {
    pub station: String,
    pub level: u32,
    pub amount: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(default)]
    pub id: Option<ItemId>,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_amount")]
    pub amount: u32,
}

pub(crate) fn default_amount() -> u32 {
    1
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub quest_name: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<Requirement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rewards: Option<Vec<Requirement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trader: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl Quest {
    pub fn requirements(&self) -> &[Requirement] {
        self.requirements.as_deref().unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Upgrades {
    #[serde(default)]
    pub station_upgrades: BTreeMap<String, StationLevels>,
    #[serde(default)]
    pub expedition_requirements: StationLevels,
}

/// Parses `"level_3"` into `3`.
pub fn level_number(key: &str) -> Option<u32> {
    key.strip_prefix("level_")?.parse().ok()
}

pub fn level_key(level: u32) -> String {
    format!("level_{level}")
}

/// Levels in numeric order; keys that are not `level_<N>` are skipped.
pub fn sorted_levels(levels: &StationLevels) -> Vec<(u32, &[Requirement])> {
    let mut sorted: Vec<(u32, &[Requirement])> = levels
        .iter()
        .filter_map(|(key, reqs)| level_number(key).map(|level| (level, reqs.as_slice())))
        .collect();
    sorted.sort_by_key(|(level, _)| *level);
    sorted
}

/// One consolidated publish of the community dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub items: Vec<Item>,
    pub quests: Vec<Quest>,
    pub upgrades: Upgrades,
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,
}
