//! Page Assembler: full-page resolution, rendering, and the render cache.
//!
//! The cache key carries a hash of every block's code version, so saving
//! new code naturally misses the cache without any eager purge. Explicit
//! invalidation handles the rest: a listener on the store's change feed
//! drops affected entries when pages, blocks, or catalog data mutate.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use tokio::time::timeout;
use tracing::{debug, warn};
use vibefront_core::error::{DataAccessError, PageError};
use vibefront_core::page::{Page, SeoMeta};
use vibefront_core::storefront::Storefront;
use vibefront_core::types::{DeviceClass, StorefrontId, StorefrontStatus, UserType};

use crate::context::{CatalogSnapshot, RenderContext, Visitor};
use crate::render::{self, RenderOptions};
use crate::store::{ChangeEvent, DataStore, EntityQuery, QuerySnapshot};

const CACHE_CAPACITY: u64 = 10_000;

/// Identity of one cached render: tenant, page, visitor dimensions, and
/// the combined code-version hash of the page's blocks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub storefront_id: StorefrontId,
    pub slug: String,
    pub device: DeviceClass,
    pub user_type: UserType,
    pub versions_hash: u64,
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{:016x}",
            self.storefront_id, self.slug, self.device, self.user_type, self.versions_hash
        )
    }
}

/// A fully assembled page, as served and as cached.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
    pub title: String,
    pub seo: SeoMeta,
    pub cache_key: String,
    pub rendered_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Combined hash of (block id, code version) for every block on the page,
/// independent of block order.
#[must_use]
pub fn versions_hash(page: &Page) -> u64 {
    let mut entries: Vec<_> = page
        .blocks
        .iter()
        .map(|b| (b.id, b.code_version))
        .collect();
    entries.sort_unstable();
    let mut hasher = std::hash::DefaultHasher::new();
    for (id, version) in entries {
        id.as_uuid().hash(&mut hasher);
        version.hash(&mut hasher);
    }
    hasher.finish()
}

/// Resolves, renders, and caches storefront pages over a [`DataStore`].
pub struct PageAssembler<S> {
    store: S,
    cache: Cache<CacheKey, Arc<RenderedPage>>,
    options: RenderOptions,
}

impl<S: DataStore + Clone> PageAssembler<S> {
    #[must_use]
    pub fn new(store: S, options: RenderOptions) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(options.cache_ttl)
            .support_invalidation_closures()
            .build();
        Self {
            store,
            cache,
            options,
        }
    }

    /// Resolve the storefront serving `host` and render one of its pages.
    ///
    /// # Errors
    ///
    /// [`PageError::NotFound`] for unknown hosts, inactive storefronts, and
    /// unknown or unpublished pages; [`PageError::Suspended`] for suspended
    /// storefronts; [`PageError::InternalError`] for store faults during
    /// resolution.
    pub async fn render_for_host(
        &self,
        host: &str,
        slug: &str,
        visitor: Visitor,
    ) -> Result<Arc<RenderedPage>, PageError> {
        let snapshot = self
            .store
            .query_once(EntityQuery::StorefrontByDomain(host.to_string()))
            .await
            .map_err(internal)?;
        let QuerySnapshot::Storefront(Some(storefront)) = snapshot else {
            return Err(PageError::NotFound);
        };
        self.render_page(storefront, slug, visitor).await
    }

    /// Render a page for an already-resolved storefront.
    ///
    /// # Errors
    ///
    /// Same as [`Self::render_for_host`], minus host resolution.
    pub async fn render_page(
        &self,
        storefront: Storefront,
        slug: &str,
        visitor: Visitor,
    ) -> Result<Arc<RenderedPage>, PageError> {
        match storefront.status {
            StorefrontStatus::Active => {}
            StorefrontStatus::Inactive => return Err(PageError::NotFound),
            StorefrontStatus::Suspended => return Err(PageError::Suspended),
        }

        let snapshot = self
            .store
            .query_once(EntityQuery::PageBySlug {
                storefront_id: storefront.id,
                slug: slug.to_string(),
            })
            .await
            .map_err(internal)?;
        let QuerySnapshot::Page(Some(page)) = snapshot else {
            return Err(PageError::NotFound);
        };
        if !page.published {
            return Err(PageError::NotFound);
        }

        let key = CacheKey {
            storefront_id: storefront.id,
            slug: page.slug.clone(),
            device: visitor.device,
            user_type: visitor.user_type,
            versions_hash: versions_hash(&page),
        };
        if let Some(cached) = self.cache.get(&key).await {
            debug!(cache_key = %key, "render cache hit");
            return Ok(cached);
        }

        let catalog = self.prefetch_catalog(storefront.id).await;
        let ctx = Arc::new(RenderContext {
            storefront,
            visitor,
            now: Utc::now(),
            // tied to the cache key so cached and fresh renders agree
            seed: key.versions_hash,
            catalog,
        });

        let html = render::render_blocks(&ctx, page.blocks, &self.options).await;
        let rendered_at = Utc::now();
        let rendered = Arc::new(RenderedPage {
            html,
            title: page.title,
            seo: page.seo,
            cache_key: key.to_string(),
            rendered_at,
            expires_at: rendered_at
                + chrono::Duration::from_std(self.options.cache_ttl)
                    .unwrap_or_else(|_| chrono::Duration::seconds(300)),
        });
        self.cache.insert(key, Arc::clone(&rendered)).await;
        Ok(rendered)
    }

    /// Resolve the catalog snapshot within the store budget. A fault here
    /// degrades block data access; it never fails the page.
    async fn prefetch_catalog(
        &self,
        storefront_id: StorefrontId,
    ) -> Result<CatalogSnapshot, DataAccessError> {
        let fetch = async {
            let products = match self
                .store
                .query_once(EntityQuery::Products(storefront_id))
                .await?
            {
                QuerySnapshot::Products(products) => products,
                _ => Vec::new(),
            };
            let collections = match self
                .store
                .query_once(EntityQuery::Collections(storefront_id))
                .await?
            {
                QuerySnapshot::Collections(collections) => collections,
                _ => Vec::new(),
            };
            let cart = match self
                .store
                .query_once(EntityQuery::Cart(storefront_id))
                .await?
            {
                QuerySnapshot::Cart(cart) => cart,
                _ => None,
            };
            Ok(CatalogSnapshot {
                products,
                collections,
                cart,
            })
        };
        match timeout(self.options.store_timeout, fetch).await {
            Ok(result) => result,
            Err(_elapsed) => Err(DataAccessError::Timeout),
        }
    }

    /// Drop every cached variant of one page.
    pub fn invalidate_page(&self, storefront_id: StorefrontId, slug: &str) {
        let slug = slug.to_string();
        if let Err(err) = self
            .cache
            .invalidate_entries_if(move |key, _| {
                key.storefront_id == storefront_id && key.slug == slug
            })
        {
            warn!(error = %err, "cache invalidation failed");
        }
    }

    /// Drop every cached page for one storefront.
    pub fn invalidate_storefront(&self, storefront_id: StorefrontId) {
        if let Err(err) = self
            .cache
            .invalidate_entries_if(move |key, _| key.storefront_id == storefront_id)
        {
            warn!(error = %err, "cache invalidation failed");
        }
    }

    /// Consume the store's change feed and invalidate affected entries.
    /// Runs until the feed closes.
    pub fn spawn_invalidation_listener(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let assembler = Arc::clone(self);
        let mut feed = assembler.store.subscribe();
        tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok(ChangeEvent::StorefrontChanged(id)) => {
                        assembler.invalidate_storefront(id);
                    }
                    Ok(
                        ChangeEvent::PageChanged {
                            storefront_id,
                            slug,
                        }
                        | ChangeEvent::BlockChanged {
                            storefront_id,
                            slug,
                            ..
                        },
                    ) => {
                        assembler.invalidate_page(storefront_id, &slug);
                    }
                    Ok(ChangeEvent::CatalogChanged(id)) => {
                        assembler.invalidate_storefront(id);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "change feed lagged; flushing render cache");
                        assembler.cache.invalidate_all();
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Entry count, for diagnostics.
    #[must_use]
    pub fn cached_entries(&self) -> u64 {
        self.cache.entry_count()
    }
}

fn internal(err: DataAccessError) -> PageError {
    PageError::InternalError(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::store::{MemoryStore, Op};
    use crate::validate;
    use vibefront_core::block::{Block, BlockType, Visibility};
    use vibefront_core::types::{BlockId, PageId, fixture_uuid};
    use vibefront_core::validation::ValidationRecord;

    fn storefront() -> Storefront {
        Storefront {
            id: StorefrontId::from_uuid(fixture_uuid(1)),
            name: "Acme".to_string(),
            primary_domain: "acme.test".to_string(),
            custom_domains: vec!["www.acme.test".to_string()],
            status: StorefrontStatus::Active,
            theme: serde_json::json!({}),
        }
    }

    fn vibe_block(n: u64, source: &str) -> Block {
        Block {
            id: BlockId::from_uuid(fixture_uuid(n)),
            block_type: BlockType::VibeCode,
            vibe_code: Some(source.to_string()),
            config: serde_json::json!({}),
            position: i64::try_from(n).unwrap_or(0),
            visibility: Visibility::default(),
            code_version: 1,
            last_code_update: Utc::now(),
            dependencies: vec![],
            last_validation: Some(ValidationRecord {
                code_version: 1,
                result: validate::validate(source),
            }),
        }
    }

    fn home_page(blocks: Vec<Block>) -> Page {
        Page {
            id: PageId::from_uuid(fixture_uuid(50)),
            storefront_id: StorefrontId::from_uuid(fixture_uuid(1)),
            slug: "home".to_string(),
            title: "Home".to_string(),
            blocks,
            published: true,
            published_at: Some(Utc::now()),
            seo: SeoMeta::default(),
        }
    }

    async fn seeded_assembler(blocks: Vec<Block>) -> (Arc<PageAssembler<MemoryStore>>, MemoryStore)
    {
        let store = MemoryStore::new();
        store
            .transact(vec![
                Op::PutStorefront(storefront()),
                Op::PutPage(home_page(blocks)),
            ])
            .await
            .unwrap();
        let assembler = Arc::new(PageAssembler::new(store.clone(), RenderOptions::default()));
        (assembler, store)
    }

    #[tokio::test]
    async fn test_render_and_cache_hit() {
        let (assembler, store) =
            seeded_assembler(vec![vibe_block(1, "(data, helpers) => `<p>v1</p>`")]).await;
        let first = assembler
            .render_for_host("acme.test", "home", Visitor::default())
            .await
            .unwrap();
        assert_eq!(first.html, "<p>v1</p>");

        // mutate the catalog without running the invalidation listener; the
        // cached entry must still be served because the key is unchanged
        store
            .transact(vec![Op::PutProduct(vibefront_core::catalog::ProductRecord {
                id: vibefront_core::types::ProductId::new(),
                storefront_id: StorefrontId::from_uuid(fixture_uuid(1)),
                title: "New".to_string(),
                handle: "new".to_string(),
                description: String::new(),
                price: vibefront_core::types::Price::from_cents(100, Default::default()),
                image_url: None,
                tags: vec![],
                available: true,
                collections: vec![],
            })])
            .await
            .unwrap();
        let second = assembler
            .render_for_host("acme.test", "home", Visitor::default())
            .await
            .unwrap();
        assert_eq!(first.cache_key, second.cache_key);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_code_update_changes_cache_key() {
        let (assembler, store) =
            seeded_assembler(vec![vibe_block(1, "(data, helpers) => `<p>v1</p>`")]).await;
        let first = assembler
            .render_for_host("acme.test", "home", Visitor::default())
            .await
            .unwrap();

        let new_source = "(data, helpers) => `<p>v2</p>`";
        store
            .transact(vec![Op::UpdateBlockCode {
                storefront_id: StorefrontId::from_uuid(fixture_uuid(1)),
                slug: "home".to_string(),
                block_id: BlockId::from_uuid(fixture_uuid(1)),
                source: new_source.to_string(),
                validation: validate::validate(new_source),
            }])
            .await
            .unwrap();

        let second = assembler
            .render_for_host("acme.test", "home", Visitor::default())
            .await
            .unwrap();
        assert_ne!(first.cache_key, second.cache_key);
        assert_eq!(second.html, "<p>v2</p>");
    }

    #[tokio::test]
    async fn test_device_variants_cache_separately() {
        let (assembler, _store) = seeded_assembler(vec![vibe_block(
            1,
            "(data, helpers) => `<p>${data.device}</p>`",
        )])
        .await;
        let desktop = assembler
            .render_for_host("acme.test", "home", Visitor::default())
            .await
            .unwrap();
        let mobile = assembler
            .render_for_host(
                "acme.test",
                "home",
                Visitor {
                    device: DeviceClass::Mobile,
                    ..Visitor::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(desktop.html, "<p>desktop</p>");
        assert_eq!(mobile.html, "<p>mobile</p>");
        assert_ne!(desktop.cache_key, mobile.cache_key);
    }

    #[tokio::test]
    async fn test_suspended_storefront() {
        let (assembler, store) =
            seeded_assembler(vec![vibe_block(1, "(data, helpers) => `x`")]).await;
        store
            .transact(vec![Op::SetStorefrontStatus(
                StorefrontId::from_uuid(fixture_uuid(1)),
                StorefrontStatus::Suspended,
            )])
            .await
            .unwrap();
        let err = assembler
            .render_for_host("acme.test", "home", Visitor::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::Suspended));
    }

    #[tokio::test]
    async fn test_unknown_host_and_unpublished_page() {
        let (assembler, store) =
            seeded_assembler(vec![vibe_block(1, "(data, helpers) => `x`")]).await;
        assert!(matches!(
            assembler
                .render_for_host("other.test", "home", Visitor::default())
                .await
                .unwrap_err(),
            PageError::NotFound
        ));
        store
            .transact(vec![Op::UnpublishPage {
                storefront_id: StorefrontId::from_uuid(fixture_uuid(1)),
                slug: "home".to_string(),
            }])
            .await
            .unwrap();
        assert!(matches!(
            assembler
                .render_for_host("acme.test", "home", Visitor::default())
                .await
                .unwrap_err(),
            PageError::NotFound
        ));
    }

    #[tokio::test]
    async fn test_custom_domain_resolves() {
        let (assembler, _store) =
            seeded_assembler(vec![vibe_block(1, "(data, helpers) => `x`")]).await;
        assert!(
            assembler
                .render_for_host("www.acme.test", "home", Visitor::default())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_invalidation_listener_drops_entry() {
        let (assembler, store) =
            seeded_assembler(vec![vibe_block(1, "(data, helpers) => `x`")]).await;
        let _listener = assembler.spawn_invalidation_listener();
        let first = assembler
            .render_for_host("acme.test", "home", Visitor::default())
            .await
            .unwrap();

        store
            .transact(vec![Op::PutPage(home_page(vec![vibe_block(
                1,
                "(data, helpers) => `x`",
            )]))])
            .await
            .unwrap();
        // let the listener observe the event
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = assembler
            .render_for_host("acme.test", "home", Visitor::default())
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
