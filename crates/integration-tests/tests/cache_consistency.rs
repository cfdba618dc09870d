//! Render cache behavior: deterministic output, version-keyed entries,
//! and invalidation driven by the store's change feed.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use vibefront_engine::store::Op;
use vibefront_engine::{RenderOptions, Visitor, validate};
use vibefront_integration_tests::{TestWorld, page, product, storefront, vibe_block};

const SEEDED_SOURCE: &str =
    "(data, helpers) => `<p data-roll=\"${helpers.seededRandom()}\">daily pick</p>`";

fn seeded_world() -> (TestWorld, vibefront_core::types::StorefrontId) {
    let world = TestWorld::new(RenderOptions::default());
    let sf = storefront(1);
    let sf_id = sf.id;
    (world, sf_id)
}

#[tokio::test]
async fn test_identical_inputs_render_identical_bytes() {
    // Two independent worlds with the same fixtures must agree even on
    // the random helper, whose seed derives from the cache key.
    let mut pages = Vec::new();
    for _ in 0..2 {
        let (world, sf_id) = seeded_world();
        world
            .put(vec![
                Op::PutStorefront(storefront(1)),
                Op::PutPage(page(sf_id, "home", vec![vibe_block(1, 10, SEEDED_SOURCE)])),
            ])
            .await;
        pages.push(
            world
                .render("shop1.test", "home", Visitor::default())
                .await
                .unwrap(),
        );
    }
    assert_eq!(pages[0].html, pages[1].html);
    assert_eq!(pages[0].cache_key, pages[1].cache_key);
}

#[tokio::test]
async fn test_repeat_request_is_served_from_cache() {
    let (world, sf_id) = seeded_world();
    world
        .put(vec![
            Op::PutStorefront(storefront(1)),
            Op::PutPage(page(sf_id, "home", vec![vibe_block(1, 10, SEEDED_SOURCE)])),
        ])
        .await;

    let first = world
        .render("shop1.test", "home", Visitor::default())
        .await
        .unwrap();
    let second = world
        .render("shop1.test", "home", Visitor::default())
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_code_update_takes_effect_without_explicit_invalidation() {
    // The cache key folds in every block's code version, so a save is
    // visible on the next request even if no invalidation ran.
    let (world, sf_id) = seeded_world();
    let block = vibe_block(1, 10, "(data, helpers) => `<p>before</p>`");
    let block_id = block.id;
    world
        .put(vec![
            Op::PutStorefront(storefront(1)),
            Op::PutPage(page(sf_id, "home", vec![block])),
        ])
        .await;

    let before = world
        .render("shop1.test", "home", Visitor::default())
        .await
        .unwrap();
    assert_eq!(before.html, "<p>before</p>");

    let new_source = "(data, helpers) => `<p>after</p>`";
    world
        .put(vec![Op::UpdateBlockCode {
            storefront_id: sf_id,
            slug: "home".to_string(),
            block_id,
            source: new_source.to_string(),
            validation: validate(new_source),
        }])
        .await;

    let after = world
        .render("shop1.test", "home", Visitor::default())
        .await
        .unwrap();
    assert_eq!(after.html, "<p>after</p>");
    assert_ne!(before.cache_key, after.cache_key);
}

#[tokio::test]
async fn test_visitor_dimensions_get_separate_entries() {
    let (world, sf_id) = seeded_world();
    world
        .put(vec![
            Op::PutStorefront(storefront(1)),
            Op::PutPage(page(
                sf_id,
                "home",
                vec![vibe_block(
                    1,
                    10,
                    "(data, helpers) => `<p>${data.device}</p>`",
                )],
            )),
        ])
        .await;

    let desktop = world
        .render("shop1.test", "home", Visitor::default())
        .await
        .unwrap();
    let mobile = world
        .render(
            "shop1.test",
            "home",
            Visitor {
                device: vibefront_core::types::DeviceClass::Mobile,
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
async fn test_catalog_change_is_invisible_until_the_feed_invalidates() {
    let (world, sf_id) = seeded_world();
    world
        .put(vec![
            Op::PutStorefront(storefront(1)),
            Op::PutPage(page(
                sf_id,
                "home",
                vec![vibe_block(
                    1,
                    10,
                    "function count(data, helpers) {
                        return `<p>${data.getProducts({}).length} products</p>`;
                    }",
                )],
            )),
        ])
        .await;

    let empty = world
        .render("shop1.test", "home", Visitor::default())
        .await
        .unwrap();
    assert_eq!(empty.html, "<p>0 products</p>");

    // Catalog writes do not change the cache key; without the listener
    // the cached entry keeps serving.
    world
        .put(vec![Op::PutProduct(product(sf_id, 1, "Linen Shirt", 4500))])
        .await;
    let still_cached = world
        .render("shop1.test", "home", Visitor::default())
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&empty, &still_cached));

    let listener = world.assembler.spawn_invalidation_listener();
    world
        .put(vec![Op::PutProduct(product(sf_id, 2, "Wool Beanie", 1900))])
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let fresh = world
        .render("shop1.test", "home", Visitor::default())
        .await
        .unwrap();
    assert_eq!(fresh.html, "<p>2 products</p>");
    listener.abort();
}
