use super::bundles::BundleValueTable;
use super::entities::{
    CatalogPrices, Collectible, ItemCategory, ItemValuation, OwnedAccessory, OwnedBundle,
    PriceTable, UserId, ValuationResult, ValueSource,
};

/// Order in which a limited item's value is resolved. The first source that
/// applies wins; [`ValueSource::None`] always applies.
pub const LIMITED_VALUE_CHAIN: [ValueSource; 3] = [
    ValueSource::PriceTable,
    ValueSource::RecentAveragePrice,
    ValueSource::None,
];

impl ValueSource {
    /// Value this source yields for `item`, or `None` when it does not apply.
    ///
    /// - `PriceTable` applies when the table holds a community value for the asset id.
    /// - `RecentAveragePrice` applies when the provider reported a non-zero RAP.
    /// - `None` always applies and yields 0.
    pub fn resolve(self, item: &Collectible, table: &PriceTable) -> Option<u64> {
        match self {
            ValueSource::PriceTable => table.value_of(&item.asset_id),
            ValueSource::RecentAveragePrice => item.rap.filter(|rap| *rap > 0),
            ValueSource::None => Some(0),
        }
    }
}

pub fn resolve_limited_value(item: &Collectible, table: &PriceTable) -> (u64, ValueSource) {
    LIMITED_VALUE_CHAIN
        .iter()
        .find_map(|source| source.resolve(item, table).map(|value| (value, *source)))
        .unwrap_or((0, ValueSource::None))
}

pub fn value_limiteds(items: &[Collectible], table: &PriceTable) -> Vec<ItemValuation> {
    items
        .iter()
        .map(|item| {
            let (value, source) = resolve_limited_value(item, table);
            ItemValuation {
                id: item.asset_id.clone(),
                name: item.name.clone(),
                category: ItemCategory::Limited,
                rap: Some(item.rap.unwrap_or(0)),
                value,
                value_source: Some(source),
            }
        })
        .collect()
}

/// Bundles missing from `table` are dropped.
pub fn value_bundles(bundles: &[OwnedBundle], table: &BundleValueTable) -> Vec<ItemValuation> {
    bundles
        .iter()
        .filter_map(|bundle| {
            let known = table.get(&bundle.id)?;
            let name = if bundle.name.trim().is_empty() {
                known.name.to_string()
            } else {
                bundle.name.clone()
            };
            Some(ItemValuation {
                id: bundle.id.clone(),
                name,
                category: ItemCategory::Bundle,
                rap: None,
                value: known.value,
                value_source: None,
            })
        })
        .collect()
}

/// Accessories without a returned catalog price are dropped.
pub fn value_accessories(
    accessories: &[OwnedAccessory],
    prices: &CatalogPrices,
) -> Vec<ItemValuation> {
    accessories
        .iter()
        .filter_map(|accessory| {
            let price = *prices.get(&accessory.asset_id)?;
            Some(ItemValuation {
                id: accessory.asset_id.to_string(),
                name: accessory.name.clone(),
                category: ItemCategory::Accessory,
                rap: None,
                value: price,
                value_source: None,
            })
        })
        .collect()
}

/// Concatenates the per-category valuations and derives the totals from them,
/// so `total_value` is always the sum of `items[].value`.
pub fn summarize(
    user_id: UserId,
    limiteds: Vec<ItemValuation>,
    bundles: Vec<ItemValuation>,
    accessories: Vec<ItemValuation>,
) -> ValuationResult {
    let mut items = Vec::with_capacity(limiteds.len() + bundles.len() + accessories.len());
    items.extend(limiteds);
    items.extend(bundles);
    items.extend(accessories);

    let mut total_value = 0_u64;
    let mut total_rap = 0_u64;
    for item in &items {
        total_value = total_value.saturating_add(item.value);
        if item.category == ItemCategory::Limited {
            total_rap = total_rap.saturating_add(item.rap.unwrap_or(0));
        }
    }

    ValuationResult {
        user_id,
        total_value,
        total_rap,
        items,
    }
}
