//! Integration tests for Vibefront.
//!
//! Tests in `tests/` drive the full pipeline in process: store, validator,
//! assembler, sandbox, and cache, with no external services. This crate
//! holds the shared fixtures.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p vibefront-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use chrono::Utc;
use vibefront_core::block::{Block, BlockType, Visibility};
use vibefront_core::page::{Page, SeoMeta};
use vibefront_core::storefront::Storefront;
use vibefront_core::types::{
    BlockId, CurrencyCode, PageId, Price, ProductId, StorefrontId, StorefrontStatus, fixture_uuid,
};
use vibefront_core::validation::ValidationRecord;
use vibefront_core::catalog::ProductRecord;
use vibefront_engine::assembler::PageAssembler;
use vibefront_engine::store::{DataStore, MemoryStore, Op};
use vibefront_engine::{RenderOptions, Visitor};

/// One in-process world: a store and an assembler over it.
pub struct TestWorld {
    pub store: MemoryStore,
    pub assembler: Arc<PageAssembler<MemoryStore>>,
}

impl TestWorld {
    #[must_use]
    pub fn new(options: RenderOptions) -> Self {
        let store = MemoryStore::new();
        let assembler = Arc::new(PageAssembler::new(store.clone(), options));
        Self { store, assembler }
    }

    pub async fn put(&self, ops: Vec<Op>) {
        self.store.transact(ops).await.unwrap();
    }

    pub async fn render(
        &self,
        host: &str,
        slug: &str,
        visitor: Visitor,
    ) -> Result<Arc<vibefront_engine::RenderedPage>, vibefront_core::error::PageError> {
        self.assembler.render_for_host(host, slug, visitor).await
    }
}

/// A storefront whose id and primary domain derive from `n`.
#[must_use]
pub fn storefront(n: u64) -> Storefront {
    Storefront {
        id: StorefrontId::from_uuid(fixture_uuid(n)),
        name: format!("Shop {n}"),
        primary_domain: format!("shop{n}.test"),
        custom_domains: vec![],
        status: StorefrontStatus::Active,
        theme: serde_json::json!({}),
    }
}

/// A validated vibe-code block.
#[must_use]
pub fn vibe_block(n: u64, position: i64, source: &str) -> Block {
    Block {
        id: BlockId::from_uuid(fixture_uuid(1000 + n)),
        block_type: BlockType::VibeCode,
        vibe_code: Some(source.to_string()),
        config: serde_json::json!({}),
        position,
        visibility: Visibility::default(),
        code_version: 1,
        last_code_update: Utc::now(),
        dependencies: vec![],
        last_validation: Some(ValidationRecord {
            code_version: 1,
            result: vibefront_engine::validate(source),
        }),
    }
}

/// A template block with the given config record.
#[must_use]
pub fn template_block(n: u64, position: i64, config: serde_json::Value) -> Block {
    Block {
        id: BlockId::from_uuid(fixture_uuid(1000 + n)),
        block_type: BlockType::Template,
        vibe_code: None,
        config,
        position,
        visibility: Visibility::default(),
        code_version: 1,
        last_code_update: Utc::now(),
        dependencies: vec![],
        last_validation: None,
    }
}

/// A published page on storefront `sf` with the given blocks.
#[must_use]
pub fn page(sf: StorefrontId, slug: &str, blocks: Vec<Block>) -> Page {
    Page {
        id: PageId::new(),
        storefront_id: sf,
        slug: slug.to_string(),
        title: format!("Page {slug}"),
        blocks,
        published: true,
        published_at: Some(Utc::now()),
        seo: SeoMeta::default(),
    }
}

/// A product owned by storefront `sf`.
#[must_use]
pub fn product(sf: StorefrontId, n: u64, title: &str, cents: i64) -> ProductRecord {
    ProductRecord {
        id: ProductId::from_uuid(fixture_uuid(2000 + n)),
        storefront_id: sf,
        title: title.to_string(),
        handle: title.to_lowercase().replace(' ', "-"),
        description: String::new(),
        price: Price::from_cents(cents, CurrencyCode::USD),
        image_url: None,
        tags: vec![],
        available: true,
        collections: vec![],
    }
}
