//! Data Access Façade: the only data-reachable object handed to block code.
//!
//! Constructed per request and scoped to one tenant. Exposes a narrow,
//! read-only capability set (`getProducts`, `getCollections`, `getCart`)
//! over the render context's pre-resolved snapshot. Store credentials, raw
//! queries, and write operations are structurally unreachable from here.
//!
//! Tenant scoping is correctness-critical: every record served is checked
//! against the context's storefront id, and a mismatch fails the call
//! rather than leaking the record.

use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value as Json, json};
use vibefront_core::catalog::{Cart, CollectionRecord, ProductRecord};
use vibefront_core::error::DataAccessError;

use crate::context::RenderContext;

/// Filters accepted by `getProducts`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilters {
    /// Restrict to products in this collection handle.
    pub collection: Option<String>,
    /// Restrict to a tag.
    pub tag: Option<String>,
    /// Drop unavailable products.
    pub available_only: bool,
    /// Cap the result count.
    pub limit: Option<usize>,
}

/// Read-only, tenant-scoped view over the render context.
#[derive(Debug, Clone, Copy)]
pub struct Facade<'a> {
    ctx: &'a RenderContext,
}

impl<'a> Facade<'a> {
    #[must_use]
    pub const fn new(ctx: &'a RenderContext) -> Self {
        Self { ctx }
    }

    /// Products matching `filters`, as author-facing JSON views.
    ///
    /// # Errors
    ///
    /// Fails when the catalog snapshot could not be resolved, or when a
    /// record outside this tenant's scope is encountered.
    pub fn get_products(&self, filters: &ProductFilters) -> Result<Vec<Json>, DataAccessError> {
        let catalog = self.catalog()?;
        let mut views = Vec::new();
        for product in &catalog.products {
            self.assert_tenant(product.storefront_id)?;
            if !Self::matches(product, filters) {
                continue;
            }
            views.push(product_view(product));
            if filters.limit.is_some_and(|limit| views.len() >= limit) {
                break;
            }
        }
        Ok(views)
    }

    /// All collections for this storefront.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::get_products`].
    pub fn get_collections(&self) -> Result<Vec<Json>, DataAccessError> {
        let catalog = self.catalog()?;
        catalog
            .collections
            .iter()
            .map(|c| {
                self.assert_tenant(c.storefront_id)?;
                Ok(collection_view(c))
            })
            .collect()
    }

    /// The visitor's cart, or an empty cart view when none exists.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::get_products`].
    pub fn get_cart(&self) -> Result<Json, DataAccessError> {
        let catalog = self.catalog()?;
        match &catalog.cart {
            Some(cart) => {
                self.assert_tenant(cart.storefront_id)?;
                Ok(cart_view(cart))
            }
            None => Ok(json!({ "lines": [], "itemCount": 0 })),
        }
    }

    /// The storefront fields exposed on `data.storefront`.
    #[must_use]
    pub fn storefront_view(&self) -> Json {
        let sf = &self.ctx.storefront;
        json!({
            "name": sf.name,
            "domain": sf.primary_domain,
            "theme": sf.theme,
        })
    }

    /// The visitor fields exposed on `data.user` / `data.device`.
    #[must_use]
    pub fn visitor_view(&self) -> (Json, Json) {
        (
            json!({ "type": self.ctx.visitor.user_type.to_string() }),
            Json::String(self.ctx.visitor.device.to_string()),
        )
    }

    fn catalog(&self) -> Result<&'a crate::context::CatalogSnapshot, DataAccessError> {
        self.ctx.catalog.as_ref().map_err(Clone::clone)
    }

    fn assert_tenant(
        &self,
        record_tenant: vibefront_core::types::StorefrontId,
    ) -> Result<(), DataAccessError> {
        if record_tenant == self.ctx.storefront_id() {
            Ok(())
        } else {
            Err(DataAccessError::TenantScopeViolation {
                expected: self.ctx.storefront_id(),
            })
        }
    }

    fn matches(product: &ProductRecord, filters: &ProductFilters) -> bool {
        if filters.available_only && !product.available {
            return false;
        }
        if let Some(handle) = &filters.collection {
            if !product.collections.iter().any(|c| c == handle) {
                return false;
            }
        }
        if let Some(tag) = &filters.tag {
            if !product.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        true
    }
}

fn product_view(product: &ProductRecord) -> Json {
    json!({
        "id": product.id,
        "title": product.title,
        "handle": product.handle,
        "description": product.description,
        "price": product.price.amount.to_f64().unwrap_or(0.0),
        "priceFormatted": product.price.display(),
        "currency": product.price.currency_code.code(),
        "imageUrl": product.image_url,
        "tags": product.tags,
        "available": product.available,
        "collections": product.collections,
    })
}

fn collection_view(collection: &CollectionRecord) -> Json {
    json!({
        "id": collection.id,
        "title": collection.title,
        "handle": collection.handle,
        "description": collection.description,
        "imageUrl": collection.image_url,
    })
}

fn cart_view(cart: &Cart) -> Json {
    json!({
        "itemCount": cart.item_count(),
        "lines": cart.lines.iter().map(|line| json!({
            "title": line.title,
            "quantity": line.quantity,
            "unitPrice": line.unit_price.amount.to_f64().unwrap_or(0.0),
            "unitPriceFormatted": line.unit_price.display(),
        })).collect::<Vec<_>>(),
    })
}
