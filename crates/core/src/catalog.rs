//! Catalog records: products, collections, and carts.
//!
//! Every record carries its owning tenant's `storefront_id`; the Data
//! Access Façade checks that field against the render context on every
//! call it serves to block code.

use serde::{Deserialize, Serialize};

use crate::types::{CartId, CollectionId, Price, ProductId, StorefrontId};

/// A product as exposed to block code, with media already resolved to URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub id: ProductId,
    pub storefront_id: StorefrontId,
    pub title: String,
    /// URL-safe handle, unique within the storefront.
    pub handle: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    /// Already-resolved object-storage URL; the façade never uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub available: bool,
    /// Collections this product belongs to, by handle.
    #[serde(default)]
    pub collections: Vec<String>,
}

/// A curated product grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub id: CollectionId,
    pub storefront_id: StorefrontId,
    pub title: String,
    pub handle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// One line in a visitor's cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Price,
}

/// A visitor's cart snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub storefront_id: StorefrontId,
    #[serde(default)]
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Total item count across lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}
