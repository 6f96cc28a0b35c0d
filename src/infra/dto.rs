//! Wire shapes for the inventory/catalog and valuation providers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::UpstreamError;
use crate::domain::{
    CatalogPrices, Collectible, OwnedAccessory, OwnedBundle, PriceTable, PriceTableEntry,
};

/// Position of the community value inside a price-table row:
/// `[name, acronym, rap, value, default_value, demand, trend, projected, hyped, rare]`.
pub const VALUE_INDEX: usize = 3;

/// Cursor-paginated listing envelope used by the inventory and catalog APIs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct PageDto<T> {
    #[serde(default)]
    pub data: Vec<T>,
    #[serde(default)]
    pub next_page_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectibleDto {
    #[serde(deserialize_with = "string_from_json")]
    asset_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    recent_average_price: Option<i64>,
}

impl From<CollectibleDto> for Collectible {
    fn from(dto: CollectibleDto) -> Self {
        Self {
            name: dto.name.unwrap_or_else(|| format!("Asset {}", dto.asset_id)),
            asset_id: dto.asset_id,
            rap: dto.recent_average_price.and_then(non_negative),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BundleDto {
    #[serde(deserialize_with = "string_from_json")]
    id: String,
    #[serde(default)]
    name: Option<String>,
}

impl From<BundleDto> for OwnedBundle {
    fn from(dto: BundleDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryDto {
    asset_id: u64,
    #[serde(default)]
    asset_name: Option<String>,
}

impl From<AccessoryDto> for OwnedAccessory {
    fn from(dto: AccessoryDto) -> Self {
        Self {
            name: dto
                .asset_name
                .unwrap_or_else(|| format!("Asset {}", dto.asset_id)),
            asset_id: dto.asset_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogDetailsRequest {
    items: Vec<CatalogItemRef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogItemRef {
    item_type: &'static str,
    id: u64,
}

impl CatalogDetailsRequest {
    pub fn assets(ids: &[u64]) -> Self {
        Self {
            items: ids
                .iter()
                .map(|&id| CatalogItemRef {
                    item_type: "Asset",
                    id,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CatalogDetailsResponse {
    #[serde(default)]
    data: Vec<CatalogItemDto>,
}

#[derive(Debug, Deserialize)]
struct CatalogItemDto {
    id: u64,
    #[serde(default)]
    price: Option<i64>,
}

impl CatalogDetailsResponse {
    /// Adds every priced entry to `prices`; unpriced or negative entries are skipped.
    pub fn collect_into(self, prices: &mut CatalogPrices) {
        for item in self.data {
            if let Some(price) = item.price.and_then(non_negative) {
                prices.insert(item.id, price);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ItemDetailsDto {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    items: HashMap<String, Vec<serde_json::Value>>,
}

impl ItemDetailsDto {
    pub fn into_price_table(self) -> Result<PriceTable, UpstreamError> {
        if self.success == Some(false) {
            return Err(UpstreamError::Api("item details reported failure".into()));
        }

        Ok(self
            .items
            .into_iter()
            .map(|(id, row)| {
                let entry = PriceTableEntry {
                    value: row.get(VALUE_INDEX).and_then(number_field),
                };
                (id, entry)
            })
            .collect())
    }
}

/// Negative numbers are the provider's "unknown" marker.
fn non_negative(value: i64) -> Option<u64> {
    u64::try_from(value).ok()
}

fn number_field(value: &serde_json::Value) -> Option<u64> {
    if let Some(int) = value.as_i64() {
        return non_negative(int);
    }
    value
        .as_f64()
        .filter(|float| float.is_finite() && *float >= 0.0)
        .map(|float| float.round() as u64)
}

fn string_from_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct StringOrNumber;

    impl<'de> serde::de::Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or integer id")
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
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collectibles_page_parses_numeric_ids_and_null_rap() {
        let page: PageDto<CollectibleDto> = serde_json::from_value(json!({
            "previousPageCursor": null,
            "nextPageCursor": "abc",
            "data": [
                {"userAssetId": 1, "assetId": 1365767, "name": "Valkyrie Helm", "recentAveragePrice": 48231},
                {"userAssetId": 2, "assetId": "20573078", "name": "Shaggy", "recentAveragePrice": null},
                {"userAssetId": 3, "assetId": 3, "recentAveragePrice": -1}
            ]
        }))
        .unwrap();

        assert_eq!(page.next_page_cursor.as_deref(), Some("abc"));
        let items: Vec<Collectible> = page.data.into_iter().map(Collectible::from).collect();
        assert_eq!(
            items,
            vec![
                Collectible {
                    asset_id: "1365767".into(),
                    name: "Valkyrie Helm".into(),
                    rap: Some(48231),
                },
                Collectible {
                    asset_id: "20573078".into(),
                    name: "Shaggy".into(),
                    rap: None,
                },
                Collectible {
                    asset_id: "3".into(),
                    name: "Asset 3".into(),
                    rap: None,
                },
            ]
        );
    }

    #[test]
    fn empty_page_has_no_cursor() {
        let page: PageDto<BundleDto> = serde_json::from_value(json!({"data": []})).unwrap();
        assert!(page.data.is_empty());
        assert!(page.next_page_cursor.is_none());
    }

    #[test]
    fn page_without_data_is_empty() {
        let page: PageDto<CollectibleDto> =
            serde_json::from_value(json!({"nextPageCursor": null})).unwrap();
        assert!(page.data.is_empty());
    }

    #[test]
    fn bundle_and_accessory_pages_parse() {
        let bundles: PageDto<BundleDto> = serde_json::from_value(json!({
            "data": [{"id": 192, "name": "Korblox Deathspeaker", "bundleType": "BodyParts"}],
            "nextPageCursor": null
        }))
        .unwrap();
        let bundles: Vec<OwnedBundle> = bundles.data.into_iter().map(Into::into).collect();
        assert_eq!(bundles[0].id, "192");

        let hats: PageDto<AccessoryDto> = serde_json::from_value(json!({
            "data": [{"assetId": 55, "assetName": "Red Cap", "userAssetId": 9}]
        }))
        .unwrap();
        let hats: Vec<OwnedAccessory> = hats.data.into_iter().map(Into::into).collect();
        assert_eq!(
            hats,
            vec![OwnedAccessory {
                asset_id: 55,
                name: "Red Cap".into()
            }]
        );
    }

    #[test]
    fn catalog_details_skip_null_prices() {
        let response: CatalogDetailsResponse = serde_json::from_value(json!({
            "data": [
                {"id": 55, "itemType": "Asset", "price": null},
                {"id": 56, "itemType": "Asset", "price": 0},
                {"id": 57, "itemType": "Asset", "price": 150},
                {"id": 58, "itemType": "Asset"}
            ]
        }))
        .unwrap();
        let mut prices = CatalogPrices::new();
        response.collect_into(&mut prices);
        assert_eq!(prices, CatalogPrices::from([(56, 0), (57, 150)]));
    }

    #[test]
    fn catalog_request_body_shape() {
        let body = serde_json::to_value(CatalogDetailsRequest::assets(&[55, 56])).unwrap();
        assert_eq!(
            body,
            json!({"items": [{"itemType": "Asset", "id": 55}, {"itemType": "Asset", "id": 56}]})
        );
    }

    #[test]
    fn item_details_read_value_at_designated_index() {
        let dto: ItemDetailsDto = serde_json::from_value(json!({
            "success": true,
            "item_count": 3,
            "items": {
                "100": ["Domino Crown", "", 500, 700, 700, 3, 2, -1, -1, -1],
                "101": ["Unvalued Cap", "UC", 90, -1, 90, -1, -1, -1, -1, -1],
                "102": ["Short Row"]
            }
        }))
        .unwrap();
        let table = dto.into_price_table().unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.value_of("100"), Some(700));
        assert_eq!(table.value_of("101"), None);
        assert_eq!(table.value_of("102"), None);
    }

    #[test]
    fn item_details_failure_is_an_api_error() {
        let dto: ItemDetailsDto =
            serde_json::from_value(json!({"success": false, "items": {}})).unwrap();
        assert!(matches!(
            dto.into_price_table(),
            Err(UpstreamError::Api(_))
        ));
    }
}
