use std::collections::HashMap;

/// Trader sell price per unit of raw crafting material (master sheet v3.2).
const COMPONENT_PRICES: &[(&str, i64)] = &[
    // Base materials
    ("metal_parts", 75),
    ("plastic_parts", 60),
    ("fabric", 50),
    ("chemicals", 50),
    ("rubber_parts", 50),
    // Resources & tech
    ("wires", 200),
    ("arc_alloy", 200),
    ("battery", 250),
    ("steel_spring", 300),
    ("oil", 300),
    ("duct_tape", 300),
    ("magnet", 330),
    // High value
    ("electrical_components", 640),
    ("mechanical_components", 640),
    ("explosive_compound", 1000),
    ("processor", 500),
    ("voltage_converter", 500),
    // Advanced
    ("advanced_electrical_components", 1750),
    ("advanced_mechanical_components", 1750),
    // Fallbacks
    ("scrap", 1),
    ("organic_matter", 10),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingTable {
    prices: HashMap<String, i64>,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.extend(COMPONENT_PRICES.iter().copied());
        table
    }
}

impl PricingTable {
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// Unknown components are worth nothing rather than an error.
    pub fn price(&self, component: &str) -> i64 {
        self.prices.get(component).copied().unwrap_or(0)
    }

    pub fn insert(&mut self, component: impl Into<String>, price: i64) {
        self.prices.insert(component.into(), price);
    }

    pub fn extend<I, K>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        for (component, price) in entries {
            self.insert(component, price);
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }
}
