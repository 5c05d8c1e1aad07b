use serde::Deserialize;
use std::collections::HashMap;

/// One listing or sale. Only the unit price matters for averaging.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub price_per_unit: u64,
}

/// Raw market payload for a single item.
///
/// The same shape covers both endpoints; whichever fields an endpoint
/// doesn't return stay empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemMarketData {
    #[serde(rename = "itemID")]
    pub item_id: u32,
    /// Active sell orders (current-data endpoint)
    pub listings: Vec<PricePoint>,
    /// Latest sales (current-data endpoint)
    pub recent_history: Vec<PricePoint>,
    /// Sales inside the lookback window (history endpoint)
    pub entries: Vec<PricePoint>,
    pub regular_sale_velocity: f64,
    #[serde(rename = "hqSaleVelocity")]
    pub hq_sale_velocity: f64,
    pub stack_size_histogram: HashMap<String, u64>,
}

impl ItemMarketData {
    /// Sale-history prices for the finished-item filter.
    pub fn sale_prices(&self) -> Vec<u64> {
        self.entries.iter().map(|p| p.price_per_unit).collect()
    }

    /// Listing prices plus recent sale prices for the ingredient filter.
    pub fn current_prices(&self) -> Vec<u64> {
        self.listings
            .iter()
            .chain(self.recent_history.iter())
            .map(|p| p.price_per_unit)
            .collect()
    }
}

/// Merged result of a batched market query, keyed by item id as a string
/// (the way the API keys its `items` map).
#[derive(Debug, Clone, Default)]
pub struct MarketSnapshot {
    items: HashMap<String, ItemMarketData>,
}

impl MarketSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, item_id: u32) -> Option<&ItemMarketData> {
        self.items.get(&item_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Merge one batch into the snapshot. Returns keys that were already present.
    pub fn merge(&mut self, batch: HashMap<String, ItemMarketData>) -> Vec<String> {
        let mut collisions = Vec::new();
        for (key, data) in batch {
            if self.items.insert(key.clone(), data).is_some() {
                collisions.push(key);
            }
        }
        collisions
    }
}
