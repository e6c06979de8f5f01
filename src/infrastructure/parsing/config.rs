//! Parsing configuration for page extraction
//!
//! Centralized configuration for page markers and payload key paths.

use serde::{Deserialize, Serialize};

use crate::infrastructure::config::storefront;

/// Markers and key paths of the storefront's embedded JSON document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// CSS selector of the script block carrying the JSON document
    pub payload_selector: String,

    /// JSON pointer of the product object on a detail page
    pub product_pointer: String,

    /// Key of the single-SKU record inside the product object
    pub single_sku_key: String,

    /// Key of the SKU list inside the product object
    pub multi_sku_key: String,

    /// Ingredient description field of a SKU record
    pub ingredient_field: String,

    /// Brand name pointer, relative to the product object
    pub brand_pointer: String,

    /// JSON pointer of the product array on a listing page
    pub listing_products_pointer: String,

    /// Field of a listing entry holding the detail URL
    pub listing_url_field: String,

    /// Elements scanned for the results-count banner
    pub results_count_selector: String,

    /// Id of the section preceding a free-text ingredient block
    pub free_text_section_id: String,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            payload_selector: storefront::PAYLOAD_SELECTOR.to_string(),
            product_pointer: storefront::PRODUCT_POINTER.to_string(),
            single_sku_key: storefront::SINGLE_SKU_KEY.to_string(),
            multi_sku_key: storefront::MULTI_SKU_KEY.to_string(),
            ingredient_field: storefront::INGREDIENT_FIELD.to_string(),
            brand_pointer: storefront::BRAND_POINTER.to_string(),
            listing_products_pointer: storefront::LISTING_PRODUCTS_POINTER.to_string(),
            listing_url_field: storefront::LISTING_URL_FIELD.to_string(),
            results_count_selector: storefront::RESULTS_COUNT_SELECTOR.to_string(),
            free_text_section_id: storefront::FREE_TEXT_SECTION_ID.to_string(),
        }
    }
}
