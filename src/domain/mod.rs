//! Domain logic for item valuation lives here.

pub mod bundles;
pub mod entities;
pub mod evaluation;

pub use bundles::BundleValueTable;
pub use entities::{
    AssetTypeId, CatalogPrices, Collectible, InvalidUserId, OwnedAccessory, OwnedBundle,
    PriceTable, PriceTableEntry, UserId, ValuationResult, HAT_ASSET_TYPE,
};
pub use evaluation::{summarize, value_accessories, value_bundles, value_limiteds};
