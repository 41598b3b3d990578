//! Resolves exactly one sell / recycle / keep recommendation per item.
//!
//! Precedence, first match wins:
//! 1. unfinished quest or expedition needs the item
//! 2. unfinished workshop upgrade needs the item
//! 3. curated priority category
//! 4. legacy donor verdict
//! 5. explicit precomputed verdict
//! 6. recycle value vs sell price

use std::collections::HashSet;

use serde::Serialize;

use super::{
    entities::{Item, PriorityCategory, QuestUsage, UpgradeUsage, UsageKind, Verdict},
    progress::upgrade_key,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecommendationType {
    Critical,
    Important,
    Strategic,
    Profit,
    Liquidate,
    Neutral,
}

impl RecommendationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::Critical => "CRITICAL",
            RecommendationType::Important => "IMPORTANT",
            RecommendationType::Strategic => "STRATEGIC",
            RecommendationType::Profit => "PROFIT",
            RecommendationType::Liquidate => "LIQUIDATE",
            RecommendationType::Neutral => "NEUTRAL",
        }
    }

    fn palette(&self) -> (&'static str, &'static str) {
        match self {
            RecommendationType::Critical => ("#dc2626", "rgba(220, 38, 38, 0.15)"),
            RecommendationType::Important => ("#f97316", "rgba(249, 115, 22, 0.15)"),
            RecommendationType::Strategic => ("#a855f7", "rgba(168, 85, 247, 0.15)"),
            RecommendationType::Profit => ("#22c55e", "rgba(34, 197, 94, 0.15)"),
            RecommendationType::Liquidate => ("#3b82f6", "rgba(59, 130, 246, 0.15)"),
            RecommendationType::Neutral => ("#6b7280", "rgba(107, 114, 128, 0.15)"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    pub label: String,
    pub reason: String,
    pub subtext: String,
    pub icon: &'static str,
    pub color: &'static str,
    #[serde(rename = "bgColor")]
    pub bg_color: &'static str,
}

impl Recommendation {
    fn new(
        kind: RecommendationType,
        icon: &'static str,
        label: impl Into<String>,
        reason: impl Into<String>,
        subtext: impl Into<String>,
    ) -> Self {
        let (color, bg_color) = kind.palette();
        Self {
            kind,
            label: label.into(),
            reason: reason.into(),
            subtext: subtext.into(),
            icon,
            color,
            bg_color,
        }
    }
}

pub fn resolve_recommendation(
    item: &Item,
    completed_upgrades: &HashSet<String>,
    completed_quests: &HashSet<String>,
) -> Recommendation {
    let active_quests: Vec<&QuestUsage> = item
        .usage
        .quest
        .iter()
        .filter(|usage| !completed_quests.contains(&usage.key))
        .collect();
    if !active_quests.is_empty() {
        return quest_requirement(&active_quests);
    }

    let active_upgrades: Vec<&UpgradeUsage> = item
        .usage
        .upgrade
        .iter()
        .filter(|usage| !completed_upgrades.contains(&upgrade_key(&usage.station, usage.level)))
        .collect();
    if !active_upgrades.is_empty() {
        return upgrade_requirement(&active_upgrades);
    }

    if let Some(category) = item.effective_category() {
        return category_recommendation(item, category);
    }

    let financials = Financials::of(item);

    match item.recommendation {
        Some(Verdict::RecyclePriority | Verdict::PriorityDonor) => Recommendation::new(
            RecommendationType::Strategic,
            "♻️",
            "RECYCLE ONLY",
            format!("Critical Source for {}", yields_or_default(item)),
            item.notes
                .clone()
                .unwrap_or_else(|| "Do not sell - recycle for rare materials".to_string()),
        ),
        Some(Verdict::Recycle) => {
            let subtext = if !financials.present {
                "Recommended donor for materials".to_string()
            } else if financials.diff >= 0 {
                financials.profit_line()
            } else {
                format!("Strategic Choice (Financially -{})", financials.diff.abs())
            };
            recycle(item, subtext)
        }
        Some(Verdict::Sell) => {
            let subtext = if !financials.present {
                "Recommended for selling".to_string()
            } else if financials.diff < 0 {
                financials.loss_line()
            } else {
                format!("Database Recommended (Profit lost: {})", financials.diff.abs())
            };
            sell(financials.sell_price, subtext)
        }
        Some(Verdict::Either) => Recommendation::new(
            RecommendationType::Neutral,
            "⚖️",
            "NEUTRAL",
            "Database: Either option is valid",
            format!(
                "Sell: {} | Recycle: {}",
                format_credits(financials.sell_price),
                format_credits(financials.recycle_value)
            ),
        ),
        Some(Verdict::Neutral | Verdict::Unknown) | None => financial_fallback(item, &financials),
    }
}

fn quest_requirement(active: &[&QuestUsage]) -> Recommendation {
    let expedition = active
        .iter()
        .any(|usage| usage.kind == UsageKind::Expedition);
    let (icon, label) = if expedition {
        ("📦", "EXPEDITION")
    } else {
        ("⛔", "DO NOT SELL")
    };
    let details = active
        .iter()
        .map(|usage| usage.details.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let total: u64 = active.iter().map(|usage| u64::from(usage.amount)).sum();

    Recommendation::new(
        RecommendationType::Critical,
        icon,
        label,
        format!("Required for: {details}"),
        format!("Keep at least {total}"),
    )
}

fn upgrade_requirement(active: &[&UpgradeUsage]) -> Recommendation {
    let stations = active
        .iter()
        .map(|usage| format!("{} Lvl {}", usage.station, usage.level))
        .collect::<Vec<_>>()
        .join(", ");
    let total: u64 = active.iter().map(|usage| u64::from(usage.amount)).sum();

    Recommendation::new(
        RecommendationType::Important,
        "🛠️",
        "KEEP FOR UPGRADE",
        format!("Workshop Material: {stations}"),
        format!("Total needed: {total}"),
    )
}

fn category_recommendation(item: &Item, category: PriorityCategory) -> Recommendation {
    match category {
        PriorityCategory::BaseComponent | PriorityCategory::CoreComponent => Recommendation::new(
            RecommendationType::Critical,
            "💎",
            category.label().to_uppercase(),
            "Essential Crafting Material",
            "Never sell - required for numerous recipes",
        ),
        PriorityCategory::HighPriorityComponent => Recommendation::new(
            RecommendationType::Important,
            "⭐",
            "HIGH PRIORITY",
            "Save for crafting",
            "Keep a stockpile for high-tier recipes",
        ),
        PriorityCategory::Donor => Recommendation::new(
            RecommendationType::Strategic,
            "♻️",
            "RECYCLE ONLY",
            format!("Donor for {}", yields_or_default(item)),
            "Recycle only, do not sell",
        ),
        PriorityCategory::SafeToSell => Recommendation::new(
            RecommendationType::Liquidate,
            "💰",
            "SELL",
            "Safe to sell",
            format!(
                "Sell freely for {}",
                format_credits(item.sell_price.unwrap_or(0))
            ),
        ),
    }
}

fn financial_fallback(item: &Item, financials: &Financials) -> Recommendation {
    if financials.diff > 0 {
        recycle(item, financials.profit_line())
    } else if financials.diff < 0 {
        sell(financials.sell_price, financials.loss_line())
    } else {
        Recommendation::new(
            RecommendationType::Neutral,
            "⚖️",
            "NEUTRAL",
            "Equal value either way",
            format!(
                "Both options yield {}",
                format_credits(financials.sell_price)
            ),
        )
    }
}

fn recycle(item: &Item, subtext: String) -> Recommendation {
    Recommendation::new(
        RecommendationType::Profit,
        "♻️",
        "RECYCLE",
        format!("Yields {}", yields_or_default(item)),
        subtext,
    )
}

fn sell(sell_price: i64, subtext: String) -> Recommendation {
    Recommendation::new(
        RecommendationType::Liquidate,
        "💰",
        "SELL",
        format!("Sell for {}", format_credits(sell_price)),
        subtext,
    )
}

struct Financials {
    present: bool,
    sell_price: i64,
    recycle_value: i64,
    roi_pct: i64,
    diff: i64,
}

impl Financials {
    fn of(item: &Item) -> Self {
        let sell_price = item.sell_price.unwrap_or(0);
        let recycle_value = item.recycle_value.unwrap_or(0);
        Self {
            present: item.recycle_value.is_some(),
            sell_price,
            recycle_value,
            roi_pct: item.roi_pct.unwrap_or(0),
            diff: recycle_value - sell_price,
        }
    }

    fn profit_line(&self) -> String {
        format!("Profit: +{} (+{}%)", self.diff.abs(), self.roi_pct)
    }

    fn loss_line(&self) -> String {
        format!("Recycling loses {} ({}%)", self.diff.abs(), self.roi_pct)
    }
}

fn yields_or_default(item: &Item) -> &str {
    if item.yields.is_empty() {
        "Materials"
    } else {
        &item.yields
    }
}

/// `12500` -> `"12,500"`.
pub fn format_credits(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (pos, ch) in digits.chars().enumerate() {
        if pos > 0 && (digits.len() - pos) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enrichment::{tests::sample_snapshot, Catalog};

    fn none() -> HashSet<String> {
        HashSet::new()
    }

    fn set(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn quest_usage(kind: UsageKind, key: &str, amount: u32) -> QuestUsage {
        QuestUsage {
            kind,
            key: key.into(),
            details: key.into(),
            amount,
        }
    }

    #[test]
    fn open_quest_is_critical() {
        let mut item = Item::default();
        item.usage.quest = vec![
            quest_usage(UsageKind::Quest, "Q1", 2),
            quest_usage(UsageKind::Quest, "Q2", 3),
        ];
        let rec = resolve_recommendation(&item, &none(), &none());
        assert_eq!(rec.kind, RecommendationType::Critical);
        assert_eq!(rec.label, "DO NOT SELL");
        assert_eq!(rec.reason, "Required for: Q1, Q2");
        assert_eq!(rec.subtext, "Keep at least 5");
    }

    #[test]
    fn expedition_entries_change_the_label() {
        let mut item = Item::default();
        item.usage.quest = vec![
            quest_usage(UsageKind::Quest, "Q1", 1),
            quest_usage(UsageKind::Expedition, "Expedition Level 1", 4),
        ];
        let rec = resolve_recommendation(&item, &none(), &none());
        assert_eq!(rec.label, "EXPEDITION");

        let rec = resolve_recommendation(&item, &none(), &set(&["Expedition Level 1"]));
        assert_eq!(rec.label, "DO NOT SELL");
        assert_eq!(rec.subtext, "Keep at least 1");
    }

    #[test]
    fn completed_quest_falls_through() {
        let mut item = Item {
            sell_price: Some(100),
            recycle_value: Some(100),
            ..Item::default()
        };
        item.usage.quest = vec![quest_usage(UsageKind::Quest, "Q1", 1)];
        item.usage.upgrade = vec![UpgradeUsage {
            station: "Workshop".into(),
            level: 2,
            amount: 6,
        }];

        let rec = resolve_recommendation(&item, &none(), &set(&["Q1"]));
        assert_eq!(rec.kind, RecommendationType::Important);
        assert_eq!(rec.reason, "Workshop Material: Workshop Lvl 2");
        assert_eq!(rec.subtext, "Total needed: 6");

        let rec = resolve_recommendation(&item, &set(&["Workshop-2"]), &set(&["Q1"]));
        assert_eq!(rec.kind, RecommendationType::Neutral);
    }

    #[test]
    fn large_requirement_totals_do_not_wrap() {
        let mut item = Item::default();
        item.usage.upgrade = vec![
            UpgradeUsage {
                station: "Workshop".into(),
                level: 1,
                amount: 3_000_000_000,
            },
            UpgradeUsage {
                station: "Workshop".into(),
                level: 2,
                amount: 3_000_000_000,
            },
        ];
        let rec = resolve_recommendation(&item, &none(), &none());
        assert_eq!(rec.subtext, "Total needed: 6000000000");

        item.usage.quest = vec![
            quest_usage(UsageKind::Quest, "Q1", u32::MAX),
            quest_usage(UsageKind::Quest, "Q2", u32::MAX),
        ];
        let rec = resolve_recommendation(&item, &none(), &none());
        assert_eq!(rec.subtext, "Keep at least 8589934590");
    }

    #[test]
    fn category_tier_protects_items_without_usage() {
        let mut item = Item {
            priority_category: Some(PriorityCategory::CoreComponent),
            recommendation: Some(Verdict::Sell),
            ..Item::default()
        };
        let rec = resolve_recommendation(&item, &none(), &none());
        assert_eq!(rec.kind, RecommendationType::Critical);
        assert_eq!(rec.label, "CORE COMPONENT");

        item.priority_category = Some(PriorityCategory::HighPriorityComponent);
        assert_eq!(
            resolve_recommendation(&item, &none(), &none()).kind,
            RecommendationType::Important
        );
        item.priority_category = Some(PriorityCategory::Donor);
        assert_eq!(
            resolve_recommendation(&item, &none(), &none()).kind,
            RecommendationType::Strategic
        );
        item.priority_category = Some(PriorityCategory::SafeToSell);
        assert_eq!(
            resolve_recommendation(&item, &none(), &none()).kind,
            RecommendationType::Liquidate
        );

        let legacy = Item {
            is_core: true,
            ..Item::default()
        };
        assert_eq!(
            resolve_recommendation(&legacy, &none(), &none()).label,
            "CORE COMPONENT"
        );
    }

    #[test]
    fn donor_verdict_is_strategic() {
        let item = Item {
            recommendation: Some(Verdict::RecyclePriority),
            yields: "Magnet (+2)".into(),
            ..Item::default()
        };
        let rec = resolve_recommendation(&item, &none(), &none());
        assert_eq!(rec.kind, RecommendationType::Strategic);
        assert_eq!(rec.reason, "Critical Source for Magnet (+2)");
        assert_eq!(rec.subtext, "Do not sell - recycle for rare materials");
    }

    #[test]
    fn explicit_verdicts_keep_financial_context() {
        let recycle_at_loss = Item {
            sell_price: Some(500),
            recycle_value: Some(300),
            roi_pct: Some(-40),
            recommendation: Some(Verdict::Recycle),
            ..Item::default()
        };
        let rec = resolve_recommendation(&recycle_at_loss, &none(), &none());
        assert_eq!(rec.kind, RecommendationType::Profit);
        assert_eq!(rec.subtext, "Strategic Choice (Financially -200)");

        let sell_without_numbers = Item {
            sell_price: Some(1200),
            recommendation: Some(Verdict::Sell),
            ..Item::default()
        };
        let rec = resolve_recommendation(&sell_without_numbers, &none(), &none());
        assert_eq!(rec.kind, RecommendationType::Liquidate);
        assert_eq!(rec.reason, "Sell for 1,200");
        assert_eq!(rec.subtext, "Recommended for selling");

        let either = Item {
            sell_price: Some(80),
            recycle_value: Some(90),
            recommendation: Some(Verdict::Either),
            ..Item::default()
        };
        let rec = resolve_recommendation(&either, &none(), &none());
        assert_eq!(rec.kind, RecommendationType::Neutral);
        assert_eq!(rec.subtext, "Sell: 80 | Recycle: 90");
    }

    #[test]
    fn financial_fallback_picks_higher_value() {
        let profitable = Item {
            sell_price: Some(100),
            recycle_value: Some(400),
            roi_pct: Some(300),
            yields: "Wires (+2)".into(),
            recommendation: Some(Verdict::Neutral),
            ..Item::default()
        };
        let rec = resolve_recommendation(&profitable, &none(), &none());
        assert_eq!(rec.kind, RecommendationType::Profit);
        assert_eq!(rec.reason, "Yields Wires (+2)");
        assert_eq!(rec.subtext, "Profit: +300 (+300%)");
    }

    #[test]
    fn battery_end_to_end_liquidates() {
        let catalog = Catalog::new(sample_snapshot());
        let battery = catalog.find_item("battery").unwrap();
        let rec = resolve_recommendation(battery, &none(), &none());
        assert_eq!(rec.kind, RecommendationType::Liquidate);
        assert_eq!(rec.label, "SELL");
        assert_eq!(rec.reason, "Sell for 250");
    }

    #[test]
    fn resolution_is_idempotent() {
        let catalog = Catalog::new(sample_snapshot());
        for item in catalog.items() {
            let first = serde_json::to_string(&resolve_recommendation(item, &none(), &none()))
                .unwrap();
            let second = serde_json::to_string(&resolve_recommendation(item, &none(), &none()))
                .unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn credits_are_grouped() {
        assert_eq!(format_credits(0), "0");
        assert_eq!(format_credits(999), "999");
        assert_eq!(format_credits(12500), "12,500");
        assert_eq!(format_credits(-1234567), "-1,234,567");
    }
}
