use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Serialize, Serializer};

/// Numeric player identifier, validated before any upstream call is made.
/// Serialised as a decimal string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(u64);

impl FromStr for UserId {
    type Err = InvalidUserId;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidUserId(raw.to_string()));
        }
        trimmed
            .parse::<u64>()
            .map(UserId)
            .map_err(|_| InvalidUserId(raw.to_string()))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for UserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid user id: {0:?}")]
pub struct InvalidUserId(pub String);

/// Inventory asset type id used to filter the accessory listing.
pub type AssetTypeId = u32;

/// Asset type id for hats, the default accessory filter.
pub const HAT_ASSET_TYPE: AssetTypeId = 8;

/// A limited item held by the player, as reported by the inventory provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collectible {
    pub asset_id: String,
    pub name: String,
    /// Recent average price. `None` when the provider has no sales history.
    pub rap: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedBundle {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedAccessory {
    pub asset_id: u64,
    pub name: String,
}

/// One row of the community price table, keyed by item id in [`PriceTable`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceTableEntry {
    /// Community-assigned value. `None` when the item is unvalued.
    pub value: Option<u64>,
}

/// Global item id → community value lookup table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PriceTable {
    entries: HashMap<String, PriceTableEntry>,
}

impl PriceTable {
    pub fn get(&self, item_id: &str) -> Option<&PriceTableEntry> {
        self.entries.get(item_id)
    }

    /// Community value for an item, if the table has one.
    pub fn value_of(&self, item_id: &str) -> Option<u64> {
        self.get(item_id).and_then(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl FromIterator<(String, PriceTableEntry)> for PriceTable {
    fn from_iter<I: IntoIterator<Item = (String, PriceTableEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Catalog sale prices keyed by asset id.
pub type CatalogPrices = HashMap<u64, u64>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ItemCategory {
    Limited,
    Bundle,
    Accessory,
}

/// Which step of the limited-item resolution chain produced a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueSource {
    PriceTable,
    RecentAveragePrice,
    None,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemValuation {
    pub id: String,
    pub name: String,
    pub category: ItemCategory,
    /// Only populated for [`ItemCategory::Limited`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rap: Option<u64>,
    pub value: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_source: Option<ValueSource>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationResult {
    pub user_id: UserId,
    pub total_value: u64,
    pub total_rap: u64,
    /// Limiteds, then bundles, then accessories, each in upstream order.
    pub items: Vec<ItemValuation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_digits_and_trims_whitespace() {
        assert_eq!("  261 ".parse::<UserId>().map(|id| id.to_string()), Ok("261".into()));
        assert_eq!("0".parse::<UserId>().map(|id| id.to_string()), Ok("0".into()));
    }

    #[test]
    fn user_id_rejects_non_numeric_input() {
        for raw in ["", "   ", "12a", "-5", "+5", "1.5", "١٢٣", "99999999999999999999999"] {
            assert!(raw.parse::<UserId>().is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn price_table_ignores_unvalued_entries() {
        let table: PriceTable = [
            (
                "1".to_string(),
                PriceTableEntry { value: Some(10) },
            ),
            (
                "2".to_string(),
                PriceTableEntry { value: None },
            ),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.len(), 2);
        assert_eq!(table.value_of("1"), Some(10));
        assert_eq!(table.value_of("2"), None);
        assert_eq!(table.value_of("3"), None);
    }

    #[test]
    fn item_valuation_serialises_camel_case_and_skips_empty_rap() {
        let item = ItemValuation {
            id: "192".into(),
            name: "Korblox Deathspeaker".into(),
            category: ItemCategory::Bundle,
            rap: None,
            value: 17_000,
            value_source: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "192",
                "name": "Korblox Deathspeaker",
                "category": "Bundle",
                "value": 17000
            })
        );
    }
}
