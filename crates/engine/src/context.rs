//! Per-request render context.
//!
//! A [`RenderContext`] is built once per page render, owned by that render,
//! and dropped when it completes. It carries the tenant-scoped data
//! snapshot block code may read, the visitor classification used by
//! visibility rules, and the deterministic seed for the random helper.
//! It is never persisted.

use chrono::{DateTime, Utc};
use vibefront_core::catalog::{Cart, CollectionRecord, ProductRecord};
use vibefront_core::error::DataAccessError;
use vibefront_core::storefront::Storefront;
use vibefront_core::types::{DeviceClass, StorefrontId, UserType};

/// The visitor dimensions that feed visibility rules and cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Visitor {
    pub device: DeviceClass,
    pub user_type: UserType,
}

/// Resolved, tenant-scoped data for one render invocation.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub storefront: Storefront,
    pub visitor: Visitor,
    /// Captured once so visibility date rules are stable within a render.
    pub now: DateTime<Utc>,
    /// Seed for `helpers.seededRandom`, derived from the cache key so
    /// cached and fresh renders agree byte-for-byte.
    pub seed: u64,
    /// Catalog snapshot, or the data-access fault that prevented it.
    /// A fault is surfaced per block by the façade, never page-wide.
    pub catalog: Result<CatalogSnapshot, DataAccessError>,
}

/// The catalog data the façade serves to block code.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub products: Vec<ProductRecord>,
    pub collections: Vec<CollectionRecord>,
    pub cart: Option<Cart>,
}

impl RenderContext {
    /// The tenant this render is scoped to.
    #[must_use]
    pub const fn storefront_id(&self) -> StorefrontId {
        self.storefront.id
    }
}
