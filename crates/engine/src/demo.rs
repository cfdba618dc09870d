//! Demo fixtures: a small seeded storefront for local runs and the CLI.

use chrono::Utc;
use vibefront_core::block::{Block, BlockType, Visibility};
use vibefront_core::catalog::ProductRecord;
use vibefront_core::error::DataAccessError;
use vibefront_core::page::{Page, SeoMeta};
use vibefront_core::storefront::Storefront;
use vibefront_core::types::{
    BlockId, CurrencyCode, PageId, Price, ProductId, StorefrontId, StorefrontStatus, fixture_uuid,
};
use vibefront_core::validation::ValidationRecord;

use crate::store::{DataStore, MemoryStore, Op};
use crate::validate;

/// The domain the demo storefront answers on.
pub const DEMO_DOMAIN: &str = "localhost";

const GRID_SOURCE: &str = "\
function renderGrid(data, helpers) {
    const products = data.getProducts({ available: true, limit: 8 });
    let out = `<section class=\"product-grid\"><h2>Featured</h2><ul>`;
    for (const p of products) {
        out += `<li><a href=\"/products/${helpers.urlEncode(p.handle)}\">` +
            `${helpers.escapeHtml(p.title)}</a> ` +
            `<span class=\"price\">${helpers.escapeHtml(p.priceFormatted)}</span></li>`;
    }
    out += `</ul></section>`;
    return out;
}";

const BANNER_SOURCE: &str = "\
(data, helpers) => `<aside class=\"banner\">Welcome to ${helpers.escapeHtml(data.storefront.name)}, ${helpers.escapeHtml(data.user.type)} on ${helpers.escapeHtml(data.device)}</aside>`";

/// Seed the store with one demo storefront, its home page, and a small
/// catalog. Returns the storefront id.
///
/// # Errors
///
/// Propagates store faults.
pub async fn seed_demo_storefront(store: &MemoryStore) -> Result<StorefrontId, DataAccessError> {
    let storefront_id = StorefrontId::from_uuid(fixture_uuid(1));

    let storefront = Storefront {
        id: storefront_id,
        name: "Vibefront Demo".to_string(),
        primary_domain: DEMO_DOMAIN.to_string(),
        custom_domains: vec!["demo.vibefront.test".to_string()],
        status: StorefrontStatus::Active,
        theme: serde_json::json!({ "accent": "#1f6feb" }),
    };

    let mut ops = vec![Op::PutStorefront(storefront)];
    for (n, (title, cents, tags)) in [
        ("Linen Shirt", 4500_i64, vec!["summer"]),
        ("Canvas Tote", 2800, vec!["accessories"]),
        ("Wool Beanie", 1900, vec!["winter"]),
        ("Enamel Mug", 1500, vec!["accessories", "summer"]),
    ]
    .into_iter()
    .enumerate()
    {
        ops.push(Op::PutProduct(ProductRecord {
            id: ProductId::from_uuid(fixture_uuid(100 + n as u64)),
            storefront_id,
            title: title.to_string(),
            handle: title.to_lowercase().replace(' ', "-"),
            description: format!("Our {title}, made to last."),
            price: Price::from_cents(cents, CurrencyCode::USD),
            image_url: None,
            tags: tags.into_iter().map(String::from).collect(),
            available: true,
            collections: vec!["featured".to_string()],
        }));
    }

    ops.push(Op::PutPage(Page {
        id: PageId::from_uuid(fixture_uuid(10)),
        storefront_id,
        slug: "home".to_string(),
        title: "Vibefront Demo".to_string(),
        blocks: vec![
            template_block(20, 10),
            vibe_block(21, 20, BANNER_SOURCE),
            vibe_block(22, 30, GRID_SOURCE),
        ],
        published: true,
        published_at: Some(Utc::now()),
        seo: SeoMeta {
            title: Some("Vibefront Demo".to_string()),
            description: Some("A demo storefront rendered by Vibefront".to_string()),
            ..SeoMeta::default()
        },
    }));

    store.transact(ops).await?;
    Ok(storefront_id)
}

fn template_block(n: u64, position: i64) -> Block {
    Block {
        id: BlockId::from_uuid(fixture_uuid(n)),
        block_type: BlockType::Template,
        vibe_code: None,
        config: serde_json::json!({
            "heading": "Summer drop is live",
            "text": "Fresh pieces, small batches.",
            "ctaText": "Shop now",
            "ctaUrl": "/collections/featured",
        }),
        position,
        visibility: Visibility::default(),
        code_version: 1,
        last_code_update: Utc::now(),
        dependencies: vec![],
        last_validation: None,
    }
}

fn vibe_block(n: u64, position: i64, source: &str) -> Block {
    Block {
        id: BlockId::from_uuid(fixture_uuid(n)),
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
            result: validate::validate(source),
        }),
    }
}
