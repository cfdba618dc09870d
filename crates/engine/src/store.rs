//! Store abstraction over the external data platform.
//!
//! Reads are snapshot queries: the renderer asks once per render and never
//! holds a live subscription inside block execution. Writes go through
//! [`DataStore::transact`], the single mutation entry point; any transact
//! that changes a block's source bumps its code version there and nowhere
//! else. Mutations publish [`ChangeEvent`]s on a broadcast feed that the
//! page cache subscribes to for invalidation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{RwLock, broadcast};
use vibefront_core::block::Block;
use vibefront_core::catalog::{Cart, CollectionRecord, ProductRecord};
use vibefront_core::error::DataAccessError;
use vibefront_core::page::Page;
use vibefront_core::storefront::Storefront;
use vibefront_core::types::{BlockId, StorefrontId, StorefrontStatus};
use vibefront_core::validation::{ValidationRecord, ValidationResult};

use crate::validate;

/// A single read against the store.
#[derive(Debug, Clone)]
pub enum EntityQuery {
    StorefrontByDomain(String),
    StorefrontById(StorefrontId),
    PageBySlug {
        storefront_id: StorefrontId,
        slug: String,
    },
    Products(StorefrontId),
    Collections(StorefrontId),
    Cart(StorefrontId),
}

/// The result of one [`EntityQuery`], point-in-time.
#[derive(Debug, Clone)]
pub enum QuerySnapshot {
    Storefront(Option<Storefront>),
    Page(Option<Page>),
    Products(Vec<ProductRecord>),
    Collections(Vec<CollectionRecord>),
    Cart(Option<Cart>),
}

/// A single write within a transact call.
#[derive(Debug, Clone)]
pub enum Op {
    PutStorefront(Storefront),
    SetStorefrontStatus(StorefrontId, StorefrontStatus),
    PutPage(Page),
    UnpublishPage {
        storefront_id: StorefrontId,
        slug: String,
    },
    PutBlock {
        storefront_id: StorefrontId,
        slug: String,
        block: Block,
    },
    /// Save new vibe-code source for a block, together with its validation
    /// result. The version bump and the dependency allow-list check happen
    /// here; callers never set versions.
    UpdateBlockCode {
        storefront_id: StorefrontId,
        slug: String,
        block_id: BlockId,
        source: String,
        validation: ValidationResult,
    },
    PutProduct(ProductRecord),
    PutCollection(CollectionRecord),
    PutCart(Cart),
}

/// Published after every committed mutation.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    StorefrontChanged(StorefrontId),
    PageChanged {
        storefront_id: StorefrontId,
        slug: String,
    },
    BlockChanged {
        storefront_id: StorefrontId,
        slug: String,
        block_id: BlockId,
    },
    CatalogChanged(StorefrontId),
}

/// The store seam. Renderer and server code depend on this trait, never on
/// a concrete backend.
pub trait DataStore: Send + Sync + 'static {
    /// One point-in-time read.
    fn query_once(
        &self,
        query: EntityQuery,
    ) -> impl Future<Output = Result<QuerySnapshot, DataAccessError>> + Send;

    /// Apply a batch of writes atomically: a failing op leaves the store
    /// untouched, and change events publish only after the whole batch
    /// commits.
    fn transact(&self, ops: Vec<Op>) -> impl Future<Output = Result<(), DataAccessError>> + Send;

    /// Subscribe to the mutation feed.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

const CHANGE_FEED_CAPACITY: usize = 64;

#[derive(Default, Clone)]
struct MemoryInner {
    storefronts: HashMap<StorefrontId, Storefront>,
    pages: HashMap<(StorefrontId, String), Page>,
    products: HashMap<StorefrontId, Vec<ProductRecord>>,
    collections: HashMap<StorefrontId, Vec<CollectionRecord>>,
    carts: HashMap<StorefrontId, Cart>,
}

/// In-memory [`DataStore`]. The production deployment would swap in a
/// client for the external platform behind the same trait.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
    changes: broadcast::Sender<ChangeEvent>,
    dependency_allow_list: Arc<Vec<String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_dependency_allow_list(Vec::new())
    }

    /// A store that accepts the given block dependencies at save time.
    /// The default allow-list is empty.
    #[must_use]
    pub fn with_dependency_allow_list(allow_list: Vec<String>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(MemoryInner::default())),
            changes,
            dependency_allow_list: Arc::new(allow_list),
        }
    }

    fn publish(&self, event: ChangeEvent) {
        // No subscribers is fine; the feed is best-effort.
        let _ = self.changes.send(event);
    }

    fn apply(
        inner: &mut MemoryInner,
        allow_list: &[String],
        op: Op,
    ) -> Result<ChangeEvent, DataAccessError> {
        match op {
            Op::PutStorefront(storefront) => {
                let id = storefront.id;
                inner.storefronts.insert(id, storefront);
                Ok(ChangeEvent::StorefrontChanged(id))
            }
            Op::SetStorefrontStatus(id, status) => {
                let storefront = inner
                    .storefronts
                    .get_mut(&id)
                    .ok_or_else(|| DataAccessError::Store(format!("unknown storefront {id}")))?;
                storefront.status = status;
                Ok(ChangeEvent::StorefrontChanged(id))
            }
            Op::PutPage(page) => {
                let event = ChangeEvent::PageChanged {
                    storefront_id: page.storefront_id,
                    slug: page.slug.clone(),
                };
                inner
                    .pages
                    .insert((page.storefront_id, page.slug.clone()), page);
                Ok(event)
            }
            Op::UnpublishPage {
                storefront_id,
                slug,
            } => {
                let page = inner
                    .pages
                    .get_mut(&(storefront_id, slug.clone()))
                    .ok_or_else(|| DataAccessError::Store(format!("unknown page '{slug}'")))?;
                page.published = false;
                Ok(ChangeEvent::PageChanged {
                    storefront_id,
                    slug,
                })
            }
            Op::PutBlock {
                storefront_id,
                slug,
                block,
            } => {
                let page = inner
                    .pages
                    .get_mut(&(storefront_id, slug.clone()))
                    .ok_or_else(|| DataAccessError::Store(format!("unknown page '{slug}'")))?;
                let block_id = block.id;
                match page.blocks.iter_mut().find(|b| b.id == block_id) {
                    Some(existing) => *existing = block,
                    None => page.blocks.push(block),
                }
                Ok(ChangeEvent::BlockChanged {
                    storefront_id,
                    slug,
                    block_id,
                })
            }
            Op::UpdateBlockCode {
                storefront_id,
                slug,
                block_id,
                source,
                validation,
            } => {
                let page = inner
                    .pages
                    .get_mut(&(storefront_id, slug.clone()))
                    .ok_or_else(|| DataAccessError::Store(format!("unknown page '{slug}'")))?;
                let block = page
                    .blocks
                    .iter_mut()
                    .find(|b| b.id == block_id)
                    .ok_or_else(|| DataAccessError::Store(format!("unknown block {block_id}")))?;
                if block.vibe_code.as_deref() != Some(source.as_str()) {
                    block.code_version += 1;
                    block.last_code_update = Utc::now();
                    block.vibe_code = Some(source);
                }
                // The allow-list check lives at the save path, not in the
                // caller: a declared dependency off the list makes the
                // stored result non-passing no matter who saved.
                let mut validation = validation;
                for issue in validate::check_dependencies(&block.dependencies, allow_list) {
                    validation.is_valid = false;
                    validation.errors.push(issue);
                }
                block.last_validation = Some(ValidationRecord {
                    code_version: block.code_version,
                    result: validation,
                });
                Ok(ChangeEvent::BlockChanged {
                    storefront_id,
                    slug,
                    block_id,
                })
            }
            Op::PutProduct(product) => {
                let tenant = product.storefront_id;
                let products = inner.products.entry(tenant).or_default();
                match products.iter_mut().find(|p| p.id == product.id) {
                    Some(existing) => *existing = product,
                    None => products.push(product),
                }
                Ok(ChangeEvent::CatalogChanged(tenant))
            }
            Op::PutCollection(collection) => {
                let tenant = collection.storefront_id;
                let collections = inner.collections.entry(tenant).or_default();
                match collections.iter_mut().find(|c| c.id == collection.id) {
                    Some(existing) => *existing = collection,
                    None => collections.push(collection),
                }
                Ok(ChangeEvent::CatalogChanged(tenant))
            }
            Op::PutCart(cart) => {
                let tenant = cart.storefront_id;
                inner.carts.insert(tenant, cart);
                Ok(ChangeEvent::CatalogChanged(tenant))
            }
        }
    }
}

impl DataStore for MemoryStore {
    async fn query_once(&self, query: EntityQuery) -> Result<QuerySnapshot, DataAccessError> {
        let inner = self.inner.read().await;
        let snapshot = match query {
            EntityQuery::StorefrontByDomain(host) => QuerySnapshot::Storefront(
                inner
                    .storefronts
                    .values()
                    .find(|sf| sf.matches_domain(&host))
                    .cloned(),
            ),
            EntityQuery::StorefrontById(id) => {
                QuerySnapshot::Storefront(inner.storefronts.get(&id).cloned())
            }
            EntityQuery::PageBySlug {
                storefront_id,
                slug,
            } => QuerySnapshot::Page(inner.pages.get(&(storefront_id, slug)).cloned()),
            EntityQuery::Products(id) => {
                QuerySnapshot::Products(inner.products.get(&id).cloned().unwrap_or_default())
            }
            EntityQuery::Collections(id) => {
                QuerySnapshot::Collections(inner.collections.get(&id).cloned().unwrap_or_default())
            }
            EntityQuery::Cart(id) => QuerySnapshot::Cart(inner.carts.get(&id).cloned()),
        };
        Ok(snapshot)
    }

    async fn transact(&self, ops: Vec<Op>) -> Result<(), DataAccessError> {
        let mut events = Vec::with_capacity(ops.len());
        {
            // Stage the batch against a copy so a failing op leaves the
            // committed state untouched.
            let mut inner = self.inner.write().await;
            let mut staged = inner.clone();
            for op in ops {
                events.push(Self::apply(&mut staged, &self.dependency_allow_list, op)?);
            }
            *inner = staged;
        }
        for event in events {
            self.publish(event);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibefront_core::block::{BlockType, Visibility};
    use vibefront_core::page::SeoMeta;
    use vibefront_core::types::{PageId, fixture_uuid};

    fn storefront(n: u64) -> Storefront {
        Storefront {
            id: StorefrontId::from_uuid(fixture_uuid(n)),
            name: format!("Shop {n}"),
            primary_domain: format!("shop{n}.test"),
            custom_domains: vec![],
            status: StorefrontStatus::Active,
            theme: serde_json::json!({}),
        }
    }

    fn page_with_block(tenant: StorefrontId, source: &str) -> (Page, BlockId) {
        let block = Block {
            id: BlockId::from_uuid(fixture_uuid(100)),
            block_type: BlockType::VibeCode,
            vibe_code: Some(source.to_string()),
            config: serde_json::json!({}),
            position: 0,
            visibility: Visibility::default(),
            code_version: 1,
            last_code_update: Utc::now(),
            dependencies: vec![],
            last_validation: Some(ValidationRecord {
                code_version: 1,
                result: validate::validate(source),
            }),
        };
        let block_id = block.id;
        let page = Page {
            id: PageId::from_uuid(fixture_uuid(50)),
            storefront_id: tenant,
            slug: "home".to_string(),
            title: "Home".to_string(),
            blocks: vec![block],
            published: true,
            published_at: Some(Utc::now()),
            seo: SeoMeta::default(),
        };
        (page, block_id)
    }

    #[tokio::test]
    async fn test_domain_lookup() {
        let store = MemoryStore::new();
        store
            .transact(vec![Op::PutStorefront(storefront(1))])
            .await
            .unwrap();
        let QuerySnapshot::Storefront(found) = store
            .query_once(EntityQuery::StorefrontByDomain("shop1.test".to_string()))
            .await
            .unwrap()
        else {
            panic!("wrong snapshot variant");
        };
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_code_update_bumps_version_once() {
        let store = MemoryStore::new();
        let sf = storefront(1);
        let tenant = sf.id;
        let (page, block_id) = page_with_block(tenant, "(data, helpers) => `a`");
        store
            .transact(vec![Op::PutStorefront(sf), Op::PutPage(page)])
            .await
            .unwrap();

        let new_source = "(data, helpers) => `b`";
        store
            .transact(vec![Op::UpdateBlockCode {
                storefront_id: tenant,
                slug: "home".to_string(),
                block_id,
                source: new_source.to_string(),
                validation: validate::validate(new_source),
            }])
            .await
            .unwrap();

        let QuerySnapshot::Page(Some(page)) = store
            .query_once(EntityQuery::PageBySlug {
                storefront_id: tenant,
                slug: "home".to_string(),
            })
            .await
            .unwrap()
        else {
            panic!("page missing");
        };
        let block = &page.blocks[0];
        assert_eq!(block.code_version, 2);
        assert!(block.is_executable());

        // re-saving identical source does not bump the version
        store
            .transact(vec![Op::UpdateBlockCode {
                storefront_id: tenant,
                slug: "home".to_string(),
                block_id,
                source: new_source.to_string(),
                validation: validate::validate(new_source),
            }])
            .await
            .unwrap();
        let QuerySnapshot::Page(Some(page)) = store
            .query_once(EntityQuery::PageBySlug {
                storefront_id: tenant,
                slug: "home".to_string(),
            })
            .await
            .unwrap()
        else {
            panic!("page missing");
        };
        assert_eq!(page.blocks[0].code_version, 2);
    }

    #[tokio::test]
    async fn test_mutations_publish_change_events() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe();
        store
            .transact(vec![Op::PutStorefront(storefront(1))])
            .await
            .unwrap();
        assert!(matches!(
            feed.try_recv().unwrap(),
            ChangeEvent::StorefrontChanged(_)
        ));
    }

    #[tokio::test]
    async fn test_failed_op_reports_store_error() {
        let store = MemoryStore::new();
        let err = store
            .transact(vec![Op::UnpublishPage {
                storefront_id: StorefrontId::from_uuid(fixture_uuid(1)),
                slug: "missing".to_string(),
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, DataAccessError::Store(_)));
    }

    #[tokio::test]
    async fn test_failed_batch_commits_nothing() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe();
        let err = store
            .transact(vec![
                Op::PutStorefront(storefront(1)),
                Op::UnpublishPage {
                    storefront_id: StorefrontId::from_uuid(fixture_uuid(1)),
                    slug: "missing".to_string(),
                },
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, DataAccessError::Store(_)));

        // the first op must not have persisted, and nothing may have
        // reached the change feed
        let QuerySnapshot::Storefront(found) = store
            .query_once(EntityQuery::StorefrontByDomain("shop1.test".to_string()))
            .await
            .unwrap()
        else {
            panic!("wrong snapshot variant");
        };
        assert!(found.is_none());
        assert!(feed.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_code_save_enforces_dependency_allow_list() {
        let store = MemoryStore::new();
        let sf = storefront(1);
        let tenant = sf.id;
        let (mut page, block_id) = page_with_block(tenant, "(data, helpers) => `a`");
        page.blocks[0].dependencies = vec!["markdown".to_string()];
        store
            .transact(vec![Op::PutStorefront(sf), Op::PutPage(page)])
            .await
            .unwrap();

        // the caller hands over a passing result; the save path still
        // rejects the off-list dependency
        let new_source = "(data, helpers) => `b`";
        store
            .transact(vec![Op::UpdateBlockCode {
                storefront_id: tenant,
                slug: "home".to_string(),
                block_id,
                source: new_source.to_string(),
                validation: validate::validate(new_source),
            }])
            .await
            .unwrap();
        let QuerySnapshot::Page(Some(page)) = store
            .query_once(EntityQuery::PageBySlug {
                storefront_id: tenant,
                slug: "home".to_string(),
            })
            .await
            .unwrap()
        else {
            panic!("page missing");
        };
        assert!(!page.blocks[0].is_executable());
        let record = page.blocks[0].last_validation.as_ref().unwrap();
        assert!(
            record.result.errors.iter().any(|issue| issue.rule
                == vibefront_core::validation::RuleId::DisallowedDependency)
        );

        // the same save passes on a store whose allow-list carries the entry
        let permissive = MemoryStore::with_dependency_allow_list(vec!["markdown".to_string()]);
        let sf = storefront(1);
        let (mut page, block_id) = page_with_block(tenant, "(data, helpers) => `a`");
        page.blocks[0].dependencies = vec!["markdown".to_string()];
        permissive
            .transact(vec![Op::PutStorefront(sf), Op::PutPage(page)])
            .await
            .unwrap();
        permissive
            .transact(vec![Op::UpdateBlockCode {
                storefront_id: tenant,
                slug: "home".to_string(),
                block_id,
                source: new_source.to_string(),
                validation: validate::validate(new_source),
            }])
            .await
            .unwrap();
        let QuerySnapshot::Page(Some(page)) = permissive
            .query_once(EntityQuery::PageBySlug {
                storefront_id: tenant,
                slug: "home".to_string(),
            })
            .await
            .unwrap()
        else {
            panic!("page missing");
        };
        assert!(page.blocks[0].is_executable());
    }
}
