//! Recycle value and return-on-investment for a single item.

use super::{entities::Verdict, localization::label_from_id, pricing::PricingTable};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoiReport {
    pub recycle_value: i64,
    pub roi_pct: i64,
    /// `"Wires (+1), Metal Parts (+2)"`, in the record's component order.
    pub yields: String,
    /// Verdict from the percentage alone.
    pub base_verdict: Verdict,
    /// Verdict after the rare-donor override.
    pub recommendation: Verdict,
}

pub fn calculate_roi(
    sell_price: i64,
    rarity: Option<&str>,
    recycles_into: &[(String, i64)],
    pricing: &PricingTable,
) -> RoiReport {
    let mut recycle_value = 0_i64;
    let mut yields = Vec::with_capacity(recycles_into.len());

    for (component, quantity) in recycles_into {
        recycle_value += pricing.price(component) * quantity;
        yields.push(format!("{} (+{quantity})", label_from_id(component)));
    }

    let roi_pct = if sell_price > 0 {
        round_half_up((recycle_value - sell_price) * 100, sell_price)
    } else {
        0
    };

    let base_verdict = match roi_pct {
        pct if pct > 0 => Verdict::Recycle,
        pct if pct < 0 => Verdict::Sell,
        _ => Verdict::Neutral,
    };

    let recommendation = if rarity == Some("Rare") && recycle_value > sell_price {
        Verdict::RecyclePriority
    } else {
        base_verdict
    };

    RoiReport {
        recycle_value,
        roi_pct,
        yields: yields.join(", "),
        base_verdict,
        recommendation,
    }
}

/// `numerator / denominator` rounded half towards positive infinity; `denominator > 0`.
fn round_half_up(numerator: i64, denominator: i64) -> i64 {
    (2 * numerator + denominator).div_euclid(2 * denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn yields(pairs: &[(&str, i64)]) -> Vec<(String, i64)> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn unknown_components_price_at_zero() {
        let report = calculate_roi(
            1000,
            None,
            &yields(&[("wires", 2), ("unknown_part", 5)]),
            &PricingTable::default(),
        );
        assert_eq!(report.recycle_value, 400);
        assert_eq!(report.roi_pct, -60);
        assert_eq!(report.recommendation, Verdict::Sell);
        assert_eq!(report.yields, "Wires (+2), Unknown Part (+5)");
    }

    #[test]
    fn rare_donor_overrides_percentage_verdict() {
        let mut pricing = PricingTable::empty();
        pricing.insert("magnet", 150);
        let report = calculate_roi(100, Some("Rare"), &yields(&[("magnet", 1)]), &pricing);
        assert_eq!(report.recycle_value, 150);
        assert_eq!(report.base_verdict, Verdict::Recycle);
        assert_eq!(report.recommendation, Verdict::RecyclePriority);
    }

    #[test]
    fn rare_without_surplus_keeps_base_verdict() {
        let report = calculate_roi(
            500,
            Some("Rare"),
            &yields(&[("wires", 1)]),
            &PricingTable::default(),
        );
        assert_eq!(report.recommendation, Verdict::Sell);
    }

    #[test]
    fn equal_values_are_neutral() {
        let report = calculate_roi(200, None, &yields(&[("wires", 1)]), &PricingTable::default());
        assert_eq!(report.roi_pct, 0);
        assert_eq!(report.recommendation, Verdict::Neutral);
    }

    #[test]
    fn rounding_matches_half_up() {
        assert_eq!(round_half_up(50, 100), 1);
        assert_eq!(round_half_up(-50, 100), 0);
        assert_eq!(round_half_up(-150, 100), -1);
        assert_eq!(round_half_up(1000, 3), 333);
        assert_eq!(round_half_up(2000, 3), 667);
    }

    #[test]
    fn later_table_extension_applies_to_new_calls_only() {
        let mut pricing = PricingTable::default();
        let recycles = yields(&[("fuse", 3)]);
        let before = calculate_roi(100, None, &recycles, &pricing);
        pricing.insert("fuse", 50);
        let after = calculate_roi(100, None, &recycles, &pricing);
        assert_eq!(before.recycle_value, 0);
        assert_eq!(after.recycle_value, 150);
    }

    proptest! {
        #[test]
        fn zero_sell_price_never_has_roi(wires in 0i64..50, metal in 0i64..50) {
            let report = calculate_roi(
                0,
                None,
                &yields(&[("wires", wires), ("metal_parts", metal)]),
                &PricingTable::default(),
            );
            prop_assert_eq!(report.roi_pct, 0);
        }

        #[test]
        fn recycle_value_is_exact_sum(wires in 0i64..100, scrap in 0i64..100, junk in 0i64..100) {
            let report = calculate_roi(
                10,
                None,
                &yields(&[("wires", wires), ("scrap", scrap), ("junk", junk)]),
                &PricingTable::default(),
            );
            prop_assert_eq!(report.recycle_value, wires * 200 + scrap);
        }

        #[test]
        fn calculation_is_idempotent(sell in -10i64..5000, qty in 0i64..20) {
            let recycles = yields(&[("oil", qty)]);
            let pricing = PricingTable::default();
            let first = calculate_roi(sell, Some("Rare"), &recycles, &pricing);
            let second = calculate_roi(sell, Some("Rare"), &recycles, &pricing);
            prop_assert_eq!(first, second);
        }
    }
}
