//! Reverse index from item to the quests, expeditions and workshop upgrades
//! that consume it.

use std::{
    collections::{BTreeSet, HashMap},
    sync::OnceLock,
};

use super::{
    entities::{
        sorted_levels, Item, ItemId, Quest, QuestUsage, Requirement, Snapshot, UpgradeUsage,
        Usage, UsageKind,
    },
    localization::{fold_for_search, label_from_id},
};

/// Immutable view over one loaded snapshot. Usage is derived lazily on first
/// query and lives exactly as long as the view, so a reload always produces a
/// fresh index.
#[derive(Debug, Default)]
pub struct Catalog {
    snapshot: Snapshot,
    index: OnceLock<UsageIndex>,
}

#[derive(Debug)]
struct UsageIndex {
    items: Vec<Item>,
    by_id: HashMap<ItemId, usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct UpgradeRef {
    pub station: String,
    pub level: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expedition<'a> {
    pub level: u32,
    pub name: String,
    pub requirements: &'a [Requirement],
}

pub fn expedition_label(level: u32) -> String {
    format!("Expedition Level {level}")
}

impl Catalog {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            index: OnceLock::new(),
        }
    }

    pub fn last_updated(&self) -> &str {
        &self.snapshot.last_updated
    }

    /// Items with `usage` attached.
    pub fn items(&self) -> &[Item] {
        &self.index().items
    }

    pub fn find_item(&self, id: &str) -> Option<&Item> {
        let index = self.index();
        index.by_id.get(id).map(|&pos| &index.items[pos])
    }

    /// Case- and accent-insensitive substring match on every name variant.
    pub fn search(&self, query: &str) -> Vec<&Item> {
        let needle = fold_for_search(query.trim());
        if needle.is_empty() {
            return Vec::new();
        }
        self.items()
            .iter()
            .filter(|item| {
                item.name
                    .variants()
                    .any(|name| fold_for_search(name).contains(&needle))
            })
            .collect()
    }

    /// Unique station/level pairs referenced by any item, by station then level.
    pub fn all_upgrades(&self) -> Vec<UpgradeRef> {
        let unique: BTreeSet<UpgradeRef> = self
            .items()
            .iter()
            .flat_map(|item| item.usage.upgrade.iter())
            .map(|usage| UpgradeRef {
                station: usage.station.clone(),
                level: usage.level,
            })
            .collect();
        unique.into_iter().collect()
    }

    /// Every quest in the snapshot, including ones that only have steps.
    pub fn quests(&self) -> &[Quest] {
        &self.snapshot.quests
    }

    /// Quests that consume at least one item.
    pub fn all_quests(&self) -> Vec<&Quest> {
        self.snapshot
            .quests
            .iter()
            .filter(|quest| !quest.requirements().is_empty())
            .collect()
    }

    pub fn all_expeditions(&self) -> Vec<Expedition<'_>> {
        sorted_levels(&self.snapshot.upgrades.expedition_requirements)
            .into_iter()
            .map(|(level, requirements)| Expedition {
                level,
                name: expedition_label(level),
                requirements,
            })
            .collect()
    }

    fn index(&self) -> &UsageIndex {
        self.index.get_or_init(|| build_usage_index(&self.snapshot))
    }
}

fn build_usage_index(snapshot: &Snapshot) -> UsageIndex {
    let mut items: Vec<Item> = snapshot
        .items
        .iter()
        .cloned()
        .map(|mut item| {
            item.usage = Usage::default();
            item
        })
        .collect();
    let by_id: HashMap<ItemId, usize> = items
        .iter()
        .enumerate()
        .map(|(pos, item)| (item.id.clone(), pos))
        .collect();

    let mut skipped = 0_usize;
    let mut target = |requirement: &Requirement| -> Option<usize> {
        let pos = requirement
            .id
            .as_deref()
            .and_then(|id| by_id.get(id).copied());
        if pos.is_none() {
            skipped += 1;
        }
        pos
    };

    let mut upgrade_entries = Vec::new();
    for (station_id, levels) in &snapshot.upgrades.station_upgrades {
        let station = label_from_id(station_id);
        for (level, requirements) in sorted_levels(levels) {
            for requirement in requirements {
                if let Some(pos) = target(requirement) {
                    upgrade_entries.push((
                        pos,
                        UpgradeUsage {
                            station: station.clone(),
                            level,
                            amount: requirement.amount,
                        },
                    ));
                }
            }
        }
    }

    let mut quest_entries = Vec::new();
    for (level, requirements) in sorted_levels(&snapshot.upgrades.expedition_requirements) {
        let label = expedition_label(level);
        for requirement in requirements {
            if let Some(pos) = target(requirement) {
                quest_entries.push((
                    pos,
                    QuestUsage {
                        kind: UsageKind::Expedition,
                        key: label.clone(),
                        details: label.clone(),
                        amount: requirement.amount,
                    },
                ));
            }
        }
    }

    for quest in &snapshot.quests {
        for requirement in quest.requirements() {
            if let Some(pos) = target(requirement) {
                quest_entries.push((
                    pos,
                    QuestUsage {
                        kind: UsageKind::Quest,
                        key: quest.quest_name.clone(),
                        details: quest.quest_name.clone(),
                        amount: requirement.amount,
                    },
                ));
            }
        }
    }

    for (pos, usage) in upgrade_entries {
        items[pos].usage.upgrade.push(usage);
    }
    for (pos, usage) in quest_entries {
        items[pos].usage.quest.push(usage);
    }

    tracing::debug!(
        items = items.len(),
        skipped_references = skipped,
        "built usage index"
    );

    UsageIndex { items, by_id }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::{entities::Upgrades, localization::LocalizedText};

    pub(crate) fn requirement(id: &str, amount: u32) -> Requirement {
        Requirement {
            id: Some(id.to_string()),
            name: label_from_id(id),
            amount,
        }
    }

    pub(crate) fn sample_snapshot() -> Snapshot {
        let driver_name = LocalizedText::Localized(BTreeMap::from([
            ("en".to_string(), "Driver".to_string()),
            ("de".to_string(), "Schraubendreher".to_string()),
        ]));
        let items = vec![
            Item {
                id: "driver".into(),
                name: driver_name,
                sell_price: Some(300),
                ..Item::default()
            },
            Item {
                id: "wires".into(),
                name: "Wires".into(),
                sell_price: Some(200),
                ..Item::default()
            },
            Item {
                id: "battery".into(),
                name: "Battery".into(),
                sell_price: Some(250),
                recycle_value: Some(200),
                ..Item::default()
            },
        ];

        let mut workbench = BTreeMap::new();
        workbench.insert("level_2".to_string(), vec![requirement("wires", 5)]);
        workbench.insert(
            "level_1".to_string(),
            vec![requirement("wires", 3), requirement("ghost_item", 9)],
        );
        let mut upgrades = Upgrades::default();
        upgrades
            .station_upgrades
            .insert("weapon_bench".to_string(), workbench);
        upgrades
            .expedition_requirements
            .insert("level_1".to_string(), vec![requirement("driver", 2)]);

        let quests = vec![
            Quest {
                quest_name: "Q1".into(),
                requirements: Some(vec![requirement("driver", 1), requirement("wires", 4)]),
                ..Quest::default()
            },
            Quest {
                quest_name: "Talk Only".into(),
                steps: vec!["Talk to Celeste".into()],
                ..Quest::default()
            },
        ];

        Snapshot {
            items,
            quests,
            upgrades,
            last_updated: "2026-10-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn attaches_upgrade_and_quest_usage() {
        let catalog = Catalog::new(sample_snapshot());
        let wires = catalog.find_item("wires").unwrap();
        assert_eq!(
            wires.usage.upgrade,
            vec![
                UpgradeUsage {
                    station: "Weapon Bench".into(),
                    level: 1,
                    amount: 3
                },
                UpgradeUsage {
                    station: "Weapon Bench".into(),
                    level: 2,
                    amount: 5
                },
            ]
        );
        assert_eq!(wires.usage.quest.len(), 1);
        assert_eq!(wires.usage.quest[0].key, "Q1");

        let driver = catalog.find_item("driver").unwrap();
        assert_eq!(driver.usage.quest.len(), 2);
        assert_eq!(driver.usage.quest[0].kind, UsageKind::Expedition);
        assert_eq!(driver.usage.quest[0].details, "Expedition Level 1");
        assert_eq!(driver.usage.quest[1].kind, UsageKind::Quest);

        assert!(catalog.find_item("battery").unwrap().usage.is_empty());
        assert!(catalog.find_item("ghost_item").is_none());
    }

    #[test]
    fn stale_usage_in_source_is_discarded() {
        let mut snapshot = sample_snapshot();
        snapshot.items[2].usage.upgrade.push(UpgradeUsage {
            station: "Old".into(),
            level: 9,
            amount: 1,
        });
        let catalog = Catalog::new(snapshot);
        assert!(catalog.find_item("battery").unwrap().usage.is_empty());
        // The raw snapshot itself is left as loaded.
        assert_eq!(catalog.snapshot.items[2].usage.upgrade.len(), 1);
    }

    #[test]
    fn search_matches_any_language() {
        let catalog = Catalog::new(sample_snapshot());
        let hits: Vec<&str> = catalog.search("driv").iter().map(|i| i.id.as_str()).collect();
        assert_eq!(hits, vec!["driver"]);
        let german: Vec<&str> = catalog
            .search("SCHRAUBEN")
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(german, vec!["driver"]);
        assert!(catalog.search("   ").is_empty());
        assert!(catalog.search("nothing").is_empty());
    }

    #[test]
    fn catalog_queries() {
        let catalog = Catalog::new(sample_snapshot());
        assert_eq!(
            catalog.all_upgrades(),
            vec![
                UpgradeRef {
                    station: "Weapon Bench".into(),
                    level: 1
                },
                UpgradeRef {
                    station: "Weapon Bench".into(),
                    level: 2
                },
            ]
        );
        let quests: Vec<&str> = catalog
            .all_quests()
            .iter()
            .map(|q| q.quest_name.as_str())
            .collect();
        assert_eq!(quests, vec!["Q1"]);
        assert_eq!(catalog.quests().len(), 2);
        let expeditions = catalog.all_expeditions();
        assert_eq!(expeditions.len(), 1);
        assert_eq!(expeditions[0].name, "Expedition Level 1");
    }
}
