//! Tenant isolation: block code only ever sees data belonging to the
//! storefront it renders on, and routing never crosses tenants.

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use vibefront_core::error::PageError;
use vibefront_engine::store::Op;
use vibefront_engine::{RenderOptions, Visitor};
use vibefront_integration_tests::{TestWorld, page, product, storefront, vibe_block};

const LISTING_SOURCE: &str = "function listing(data, helpers) {
    let out = ``;
    for (const p of data.getProducts({})) {
        out += `<li>${helpers.escapeHtml(p.title)}</li>`;
    }
    return out;
}";

#[tokio::test]
async fn test_block_code_sees_only_its_own_tenants_catalog() {
    let world = TestWorld::new(RenderOptions::default());
    let one = storefront(1);
    let two = storefront(2);
    let (one_id, two_id) = (one.id, two.id);
    world
        .put(vec![
            Op::PutStorefront(one),
            Op::PutStorefront(two),
            Op::PutProduct(product(one_id, 1, "Linen Shirt", 4500)),
            Op::PutProduct(product(two_id, 2, "Cast Iron Pan", 8900)),
            Op::PutPage(page(one_id, "home", vec![vibe_block(1, 10, LISTING_SOURCE)])),
            Op::PutPage(page(two_id, "home", vec![vibe_block(2, 10, LISTING_SOURCE)])),
        ])
        .await;

    let first = world
        .render("shop1.test", "home", Visitor::default())
        .await
        .unwrap();
    assert!(first.html.contains("Linen Shirt"));
    assert!(!first.html.contains("Cast Iron Pan"));

    let second = world
        .render("shop2.test", "home", Visitor::default())
        .await
        .unwrap();
    assert!(second.html.contains("Cast Iron Pan"));
    assert!(!second.html.contains("Linen Shirt"));
}

#[tokio::test]
async fn test_pages_do_not_leak_across_hosts() {
    let world = TestWorld::new(RenderOptions::default());
    let one = storefront(1);
    let two = storefront(2);
    let one_id = one.id;
    world
        .put(vec![
            Op::PutStorefront(one),
            Op::PutStorefront(two),
            Op::PutPage(page(
                one_id,
                "lookbook",
                vec![vibe_block(1, 10, "(data, helpers) => `<p>shop one only</p>`")],
            )),
        ])
        .await;

    assert!(
        world
            .render("shop1.test", "lookbook", Visitor::default())
            .await
            .is_ok()
    );
    assert_matches!(
        world
            .render("shop2.test", "lookbook", Visitor::default())
            .await
            .unwrap_err(),
        PageError::NotFound
    );
}

#[tokio::test]
async fn test_unknown_host_resolves_to_nothing() {
    let world = TestWorld::new(RenderOptions::default());
    let sf = storefront(1);
    let sf_id = sf.id;
    world
        .put(vec![
            Op::PutStorefront(sf),
            Op::PutPage(page(
                sf_id,
                "home",
                vec![vibe_block(1, 10, "(data, helpers) => `<p>hi</p>`")],
            )),
        ])
        .await;

    assert_matches!(
        world
            .render("nobody.example", "home", Visitor::default())
            .await
            .unwrap_err(),
        PageError::NotFound
    );
}

#[tokio::test]
async fn test_custom_domain_reaches_the_same_storefront() {
    let world = TestWorld::new(RenderOptions::default());
    let mut sf = storefront(1);
    sf.custom_domains = vec!["www.shopone.example".to_string()];
    let sf_id = sf.id;
    world
        .put(vec![
            Op::PutStorefront(sf),
            Op::PutPage(page(
                sf_id,
                "home",
                vec![vibe_block(
                    1,
                    10,
                    "(data, helpers) => `<p>${helpers.escapeHtml(data.storefront.name)}</p>`",
                )],
            )),
        ])
        .await;

    let via_primary = world
        .render("shop1.test", "home", Visitor::default())
        .await
        .unwrap();
    let via_custom = world
        .render("www.shopone.example", "home", Visitor::default())
        .await
        .unwrap();
    assert_eq!(via_primary.html, via_custom.html);
    assert!(via_custom.html.contains("Shop 1"));
}
