//! Builds one consolidated snapshot from the raw item, quest and hideout
//! folders of the community data repository.
//!
//! The run is all-or-nothing: any listing, download or parse failure aborts it
//! before anything is published.

use futures::{stream, StreamExt, TryStreamExt};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{
    calculate_roi,
    entities::{
        default_amount, level_key, Item, Quest, Requirement, Snapshot, StationLevels, Upgrades,
    },
    localization::{label_from_id, LocalizedText},
    PricingTable,
};
use crate::infra::{
    content::{
        ContentError, ContentSource, FolderEntry, HIDEOUT_FOLDER, ITEMS_FOLDER, QUESTS_FOLDER,
    },
    publish::{PublishError, PublishReceipt, Publisher},
};
use crate::util::now_rfc3339;

const EXPEDITION_MARKER: &str = "expedition";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to fetch {folder}: {source}")]
    Fetch {
        folder: &'static str,
        #[source]
        source: ContentError,
    },
    #[error("failed to parse {folder}/{file}: {source}")]
    Parse {
        folder: &'static str,
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to publish snapshot: {0}")]
    Publish(#[from] PublishError),
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(deserialize_with = "string_from_json")]
    id: String,
    #[serde(default)]
    name: Option<LocalizedText>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default, rename = "weightKg")]
    weight_kg: Option<f64>,
    #[serde(default)]
    rarity: Option<String>,
    #[serde(default, rename = "recyclesInto")]
    recycles_into: Option<Map<String, Value>>,
    #[serde(default)]
    description: Option<LocalizedText>,
    #[serde(default, rename = "imageFilename")]
    image_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawItemRef {
    #[serde(default, rename = "itemId")]
    item_id: Option<String>,
    #[serde(default)]
    quantity: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawQuest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<LocalizedText>,
    #[serde(default)]
    objectives: Vec<Value>,
    #[serde(default, rename = "rewardItemIds")]
    reward_item_ids: Vec<RawItemRef>,
    #[serde(default, rename = "requirementItemIds")]
    requirement_item_ids: Vec<RawItemRef>,
    #[serde(default)]
    trader: Option<String>,
    #[serde(default)]
    description: Option<LocalizedText>,
}

#[derive(Debug, Deserialize)]
struct RawStation {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    levels: Value,
}

#[derive(Debug, Deserialize)]
struct RawLevel {
    #[serde(default)]
    level: Option<Value>,
    #[serde(default, rename = "requirementItemIds")]
    requirement_item_ids: Vec<RawItemRef>,
}

/// Fetches all three folders concurrently and assembles the snapshot.
pub async fn build_snapshot<S>(
    source: &S,
    pricing: &PricingTable,
    concurrency: usize,
) -> Result<Snapshot, BuildError>
where
    S: ContentSource + Sync,
{
    tracing::info!(concurrency, "building snapshot");
    let (raw_items, raw_quests, raw_stations) = tokio::try_join!(
        fetch_folder(source, ITEMS_FOLDER, concurrency),
        fetch_folder(source, QUESTS_FOLDER, concurrency),
        fetch_folder(source, HIDEOUT_FOLDER, concurrency),
    )?;

    let items = parse_all::<RawItem>(ITEMS_FOLDER, raw_items)?
        .into_iter()
        .map(|raw| process_item(raw, pricing))
        .collect::<Vec<_>>();
    let quests = parse_all::<RawQuest>(QUESTS_FOLDER, raw_quests)?
        .into_iter()
        .map(process_quest)
        .collect::<Vec<_>>();
    let upgrades = process_stations(parse_all::<RawStation>(HIDEOUT_FOLDER, raw_stations)?);

    tracing::info!(
        items = items.len(),
        quests = quests.len(),
        stations = upgrades.station_upgrades.len(),
        expedition_levels = upgrades.expedition_requirements.len(),
        "snapshot assembled"
    );

    Ok(Snapshot {
        items,
        quests,
        upgrades,
        last_updated: now_rfc3339(),
    })
}

/// Builds a complete snapshot, then publishes it. Nothing is written on failure.
pub async fn build_and_publish<S, P>(
    source: &S,
    pricing: &PricingTable,
    concurrency: usize,
    publisher: &P,
) -> Result<PublishReceipt, BuildError>
where
    S: ContentSource + Sync,
    P: Publisher + Sync,
{
    let snapshot = build_snapshot(source, pricing, concurrency).await?;
    let receipt = publisher.publish(&snapshot).await?;
    tracing::info!(url = %receipt.url, timestamp = %receipt.timestamp, "snapshot published");
    Ok(receipt)
}

async fn fetch_folder<S>(
    source: &S,
    folder: &'static str,
    concurrency: usize,
) -> Result<Vec<(String, Value)>, BuildError>
where
    S: ContentSource + Sync,
{
    let fetch_error = |source| BuildError::Fetch { folder, source };
    let entries: Vec<FolderEntry> = source
        .list_folder(folder)
        .await
        .map_err(fetch_error)?
        .into_iter()
        .filter(FolderEntry::is_data_file)
        .collect();
    let total = entries.len();
    tracing::info!(folder, files = total, "downloading folder");

    let files = stream::iter(entries.into_iter().enumerate())
        .map(|(pos, entry)| async move {
            let content = source.fetch_file(&entry).await?;
            tracing::debug!(folder, file = %entry.name, progress = pos + 1, total, "downloaded");
            Ok::<_, ContentError>((entry.name, content))
        })
        .buffered(concurrency.max(1))
        .try_collect::<Vec<_>>()
        .await
        .map_err(fetch_error)?;
    Ok(files)
}

fn parse_all<T: DeserializeOwned>(
    folder: &'static str,
    files: Vec<(String, Value)>,
) -> Result<Vec<T>, BuildError> {
    files
        .into_iter()
        .map(|(file, content)| {
            serde_json::from_value(content).map_err(|source| BuildError::Parse {
                folder,
                file,
                source,
            })
        })
        .collect()
}

fn process_item(raw: RawItem, pricing: &PricingTable) -> Item {
    let sell_price = raw.value.as_ref().and_then(number_of).unwrap_or(0);
    let recycles_into: Vec<(String, i64)> = raw
        .recycles_into
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(component, qty)| number_of(&qty).map(|qty| (component, qty)))
        .collect();
    let roi = calculate_roi(sell_price, raw.rarity.as_deref(), &recycles_into, pricing);

    Item {
        name: raw
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| LocalizedText::Plain(raw.id.clone())),
        id: raw.id,
        category: raw.kind.unwrap_or_else(|| "Unknown".to_string()),
        sell_price: Some(sell_price),
        recycle_value: Some(roi.recycle_value),
        roi_pct: Some(roi.roi_pct),
        yields: roi.yields,
        recommendation: Some(roi.recommendation),
        image: raw.image_filename,
        rarity: raw.rarity,
        weight: raw.weight_kg,
        description: raw.description,
        ..Item::default()
    }
}

fn process_quest(raw: RawQuest) -> Quest {
    let steps = raw
        .objectives
        .into_iter()
        .filter_map(|objective| serde_json::from_value::<LocalizedText>(objective).ok())
        .map(|text| text.english().to_string())
        .filter(|step| !step.is_empty())
        .collect();

    let rewards = requirement_list(raw.reward_item_ids);
    let requirements = requirement_list(raw.requirement_item_ids);

    let quest_name = raw
        .name
        .as_ref()
        .map(|name| name.english().to_string())
        .filter(|name| !name.is_empty())
        .or_else(|| raw.id.clone())
        .unwrap_or_else(|| "Unknown Quest".to_string());

    Quest {
        id: raw.id,
        quest_name,
        steps,
        requirements: (!requirements.is_empty()).then_some(requirements),
        rewards: (!rewards.is_empty()).then_some(rewards),
        trader: raw.trader,
        description: raw
            .description
            .map(|text| text.english().to_string())
            .unwrap_or_default(),
    }
}

fn process_stations(stations: Vec<RawStation>) -> Upgrades {
    let mut upgrades = Upgrades::default();
    for station in stations {
        let station_id = station.id.unwrap_or_else(|| "unknown".to_string());
        let mut levels = StationLevels::new();
        for raw_level in station.levels.as_array().into_iter().flatten() {
            let Ok(raw_level) = serde_json::from_value::<RawLevel>(raw_level.clone()) else {
                tracing::warn!(station = %station_id, "skipping malformed level");
                continue;
            };
            let Some(level) = raw_level
                .level
                .as_ref()
                .and_then(number_of)
                .and_then(|n| u32::try_from(n).ok())
            else {
                tracing::warn!(station = %station_id, "skipping level without number");
                continue;
            };
            levels.insert(level_key(level), requirement_list(raw_level.requirement_item_ids));
        }

        if station_id.contains(EXPEDITION_MARKER) {
            upgrades.expedition_requirements.extend(levels);
        } else {
            upgrades.station_upgrades.insert(station_id, levels);
        }
    }
    upgrades
}

fn requirement_list(refs: Vec<RawItemRef>) -> Vec<Requirement> {
    refs.into_iter()
        .map(|item_ref| Requirement {
            name: item_ref
                .item_id
                .as_deref()
                .map(label_from_id)
                .unwrap_or_default(),
            id: item_ref.item_id,
            amount: item_ref
                .quantity
                .as_ref()
                .and_then(number_of)
                .filter(|qty| *qty > 0)
                .and_then(|qty| u32::try_from(qty).ok())
                .unwrap_or_else(default_amount),
        })
        .collect()
}

/// Integers, floats (rounded) and numeric strings.
fn number_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f.round() as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn string_from_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct StringOrNumber;

    impl<'de> serde::de::Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value)
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::domain::entities::Verdict;
    use crate::infra::publish::tests::RecordingPublisher;

    /// Folders of named JSON records; files listed in `broken` fail to download.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub folders: HashMap<&'static str, Vec<(String, Value)>>,
        pub broken: Vec<String>,
    }

    impl FakeSource {
        pub(crate) fn with_file(
            mut self,
            folder: &'static str,
            name: &str,
            content: Value,
        ) -> Self {
            self.folders
                .entry(folder)
                .or_default()
                .push((name.to_string(), content));
            self
        }
    }

    impl ContentSource for FakeSource {
        async fn list_folder(&self, folder: &str) -> Result<Vec<FolderEntry>, ContentError> {
            Ok(self
                .folders
                .get(folder)
                .map(|files| {
                    files
                        .iter()
                        .map(|(name, _)| FolderEntry {
                            name: name.clone(),
                            download_url: Some(format!("mem://{folder}/{name}")),
                        })
                        .collect()
                })
                .unwrap_or_default())
        }

        async fn fetch_file(&self, entry: &FolderEntry) -> Result<Value, ContentError> {
            if self.broken.contains(&entry.name) {
                return Err(ContentError::MissingDownloadUrl(entry.name.clone()));
            }
            self.folders
                .values()
                .flatten()
                .find(|(name, _)| *name == entry.name)
                .map(|(_, content)| content.clone())
                .ok_or_else(|| ContentError::MissingDownloadUrl(entry.name.clone()))
        }
    }

    pub(crate) fn sample_source() -> FakeSource {
        FakeSource::default()
            .with_file(
                ITEMS_FOLDER,
                "battery.json",
                json!({
                    "id": "battery",
                    "name": {"en": "Battery", "de": "Batterie"},
                    "type": "Recyclable",
                    "value": 250,
                    "rarity": "Common",
                    "weightKg": 0.5,
                    "recyclesInto": {"wires": 1},
                    "imageFilename": "https://cdn.example/battery.png"
                }),
            )
            .with_file(
                ITEMS_FOLDER,
                "magnetron.json",
                json!({
                    "id": "magnetron",
                    "name": "Magnetron",
                    "value": 100,
                    "rarity": "Rare",
                    "recyclesInto": {"magnet": 1, "mystery_goo": 4}
                }),
            )
            .with_file(ITEMS_FOLDER, "README.md", json!("ignored"))
            .with_file(
                QUESTS_FOLDER,
                "first_steps.json",
                json!({
                    "id": "first_steps",
                    "name": {"en": "First Steps"},
                    "objectives": [{"en": "Find a battery"}, "", {"de": "Nur deutsch"}, 7],
                    "requirementItemIds": [{"itemId": "battery", "quantity": 2}],
                    "rewardItemIds": [{"itemId": "metal_parts"}],
                    "trader": "Celeste"
                }),
            )
            .with_file(
                HIDEOUT_FOLDER,
                "workbench.json",
                json!({
                    "id": "weapon_bench",
                    "levels": [
                        {"level": 2, "requirementItemIds": [{"itemId": "magnetron", "quantity": 3}]},
                        {"level": 1, "requirementItemIds": []}
                    ]
                }),
            )
            .with_file(
                HIDEOUT_FOLDER,
                "expedition.json",
                json!({
                    "id": "expedition_project",
                    "levels": [
                        {"level": 1, "requirementItemIds": [{"itemId": "battery", "quantity": 10}]}
                    ]
                }),
            )
    }

    #[tokio::test]
    async fn builds_consolidated_snapshot() {
        let snapshot = build_snapshot(&sample_source(), &PricingTable::default(), 2)
            .await
            .unwrap();

        assert_eq!(snapshot.items.len(), 2);
        let battery = &snapshot.items[0];
        assert_eq!(battery.id, "battery");
        assert_eq!(battery.name.resolve("de"), "Batterie");
        assert_eq!(battery.sell_price, Some(250));
        assert_eq!(battery.recycle_value, Some(200));
        assert_eq!(battery.roi_pct, Some(-20));
        assert_eq!(battery.yields, "Wires (+1)");
        assert_eq!(battery.recommendation, Some(Verdict::Sell));
        assert_eq!(battery.category, "Recyclable");

        let magnetron = &snapshot.items[1];
        assert_eq!(magnetron.recycle_value, Some(330));
        assert_eq!(magnetron.recommendation, Some(Verdict::RecyclePriority));
        assert_eq!(magnetron.category, "Unknown");

        let quest = &snapshot.quests[0];
        assert_eq!(quest.quest_name, "First Steps");
        assert_eq!(quest.steps, vec!["Find a battery", "Nur deutsch"]);
        assert_eq!(quest.requirements()[0].amount, 2);
        let rewards = quest.rewards.as_ref().unwrap();
        assert_eq!(rewards[0].name, "Metal Parts");
        assert_eq!(rewards[0].amount, 1);

        let bench = &snapshot.upgrades.station_upgrades["weapon_bench"];
        assert_eq!(bench["level_2"][0].id.as_deref(), Some("magnetron"));
        assert!(bench["level_1"].is_empty());
        assert!(!snapshot
            .upgrades
            .station_upgrades
            .contains_key("expedition_project"));
        assert_eq!(snapshot.upgrades.expedition_requirements["level_1"][0].amount, 10);
        assert!(crate::util::parse_rfc3339(&snapshot.last_updated).is_some());
    }

    #[tokio::test]
    async fn localized_fields_round_trip_through_json() {
        let snapshot = build_snapshot(&sample_source(), &PricingTable::default(), 1)
            .await
            .unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["items"][0]["name"], json!({"de": "Batterie", "en": "Battery"}));
        assert_eq!(json["items"][1]["name"], json!("Magnetron"));
        assert!(json["lastUpdated"].is_string());
        let back: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[tokio::test]
    async fn one_broken_file_aborts_without_publishing() {
        let mut source = sample_source();
        source.broken.push("first_steps.json".into());
        let publisher = RecordingPublisher::default();

        let err = build_and_publish(&source, &PricingTable::default(), 4, &publisher)
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Fetch { folder: "quests", .. }));
        assert!(err.to_string().contains("first_steps.json"));
        assert!(publisher.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unparseable_record_aborts() {
        let source = FakeSource::default().with_file(ITEMS_FOLDER, "bad.json", json!({"name": "No id"}));
        let err = build_snapshot(&source, &PricingTable::default(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Parse { file, .. } if file == "bad.json"));
    }

    #[tokio::test]
    async fn successful_run_publishes_once() {
        let publisher = RecordingPublisher::default();
        let receipt = build_and_publish(&sample_source(), &PricingTable::default(), 4, &publisher)
            .await
            .unwrap();
        assert_eq!(receipt.url, "mem://snapshot");
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn partial_translations_do_not_abort_the_build() {
        let source = FakeSource::default()
            .with_file(
                ITEMS_FOLDER,
                "a.json",
                json!({
                    "id": "a",
                    "name": {"en": "Alpha", "ja": null},
                    "description": {"en": null, "de": "Beschreibung"},
                    "value": 10
                }),
            )
            .with_file(
                QUESTS_FOLDER,
                "q.json",
                json!({
                    "id": "q",
                    "name": {"en": "Null Tolerant", "fr": null},
                    "objectives": [{"en": "Step one", "ja": null}, {"en": null}]
                }),
            );
        let snapshot = build_snapshot(&source, &PricingTable::default(), 1)
            .await
            .unwrap();

        let item = &snapshot.items[0];
        assert_eq!(item.name.resolve("ja"), "Alpha");
        assert_eq!(
            item.description.as_ref().map(|text| text.english()),
            Some("Beschreibung")
        );
        let quest = &snapshot.quests[0];
        assert_eq!(quest.quest_name, "Null Tolerant");
        assert_eq!(quest.steps, vec!["Step one"]);
    }

    #[tokio::test]
    async fn yields_follow_record_order() {
        let source = FakeSource::default().with_file(
            ITEMS_FOLDER,
            "cable.json",
            json!({
                "id": "cable",
                "value": 10,
                "recyclesInto": {"wires": 2, "metal_parts": 1}
            }),
        );
        let snapshot = build_snapshot(&source, &PricingTable::default(), 1)
            .await
            .unwrap();
        assert_eq!(snapshot.items[0].yields, "Wires (+2), Metal Parts (+1)");
    }

    #[test]
    fn numbers_are_read_leniently() {
        assert_eq!(number_of(&json!(3)), Some(3));
        assert_eq!(number_of(&json!(2.6)), Some(3));
        assert_eq!(number_of(&json!("12")), Some(12));
        assert_eq!(number_of(&json!(null)), None);
    }

    #[test]
    fn numeric_ids_become_strings() {
        let raw: RawItem = serde_json::from_value(json!({"id": 42})).unwrap();
        assert_eq!(raw.id, "42");
    }
}
