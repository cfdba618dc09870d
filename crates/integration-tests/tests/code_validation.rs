//! The validator as the execution gate: what it rejects, what it only
//! warns about, and the guarantee that rejected code never runs.

#![allow(clippy::unwrap_used)]

use vibefront_core::validation::{RuleId, ValidationRecord};
use vibefront_engine::store::Op;
use vibefront_engine::{FallbackMode, RenderOptions, Visitor, validate, validate_block};
use vibefront_integration_tests::{TestWorld, page, storefront, vibe_block};

#[test]
fn test_module_import_is_a_security_finding() {
    let result = validate("function evil(data, helpers) { const fs = require(`fs`); return ``; }");
    assert!(!result.is_valid);
    assert!(
        result
            .security_issues
            .iter()
            .any(|issue| issue.rule == RuleId::ModuleImport)
    );
}

#[test]
fn test_host_globals_are_rejected() {
    for source in [
        "(data, helpers) => `${fetch(`/x`)}`",
        "(data, helpers) => `${process.env.HOME}`",
        "(data, helpers) => `${eval(`1`)}`",
    ] {
        let result = validate(source);
        assert!(!result.is_valid, "expected rejection for: {source}");
    }
}

#[test]
fn test_warnings_do_not_block_execution() {
    // Raw interpolation of a data field warns but stays valid.
    let result = validate("(data, helpers) => `<h1>${data.storefront.name}</h1>`");
    assert!(result.is_valid);
    assert_eq!(result.errors.len(), 0);
    assert!(
        result
            .warnings
            .iter()
            .any(|issue| issue.rule == RuleId::UnescapedInterpolation)
    );
}

#[test]
fn test_missing_return_path_is_fatal() {
    let result = validate(
        "function maybe(data, helpers) {
            if (data.config.show) {
                return `<p>yes</p>`;
            }
        }",
    );
    assert!(!result.is_valid);
    assert!(
        result
            .errors
            .iter()
            .any(|issue| issue.rule == RuleId::ReturnPath)
    );
}

#[test]
fn test_dependency_allow_list_is_enforced() {
    let mut block = vibe_block(1, 10, "(data, helpers) => `ok`");
    block.dependencies = vec!["markdown".to_string()];

    let denied = validate_block(&block, &[]);
    assert!(!denied.is_valid);
    assert!(
        denied
            .errors
            .iter()
            .any(|issue| issue.rule == RuleId::DisallowedDependency)
    );

    let allowed = validate_block(&block, &["markdown".to_string()]);
    assert!(allowed.is_valid);
}

#[tokio::test]
async fn test_invalid_code_is_never_executed() {
    let world = TestWorld::new(RenderOptions {
        fallback: FallbackMode::Placeholder,
        ..RenderOptions::default()
    });
    let sf = storefront(1);
    let sf_id = sf.id;

    // The fixture attaches the real validation result, so this block
    // arrives marked invalid and must degrade instead of running.
    let block = vibe_block(1, 10, "(data, helpers) => `${fetch(`/steal`)}`");
    assert!(!block.is_executable());

    world
        .put(vec![
            Op::PutStorefront(sf),
            Op::PutPage(page(sf_id, "home", vec![block])),
        ])
        .await;

    let rendered = world
        .render("shop1.test", "home", Visitor::default())
        .await
        .unwrap();
    assert!(rendered.html.contains("vf-block-unavailable"));
}

#[tokio::test]
async fn test_stale_validation_does_not_authorize_new_code() {
    let world = TestWorld::new(RenderOptions {
        fallback: FallbackMode::Placeholder,
        ..RenderOptions::default()
    });
    let sf = storefront(1);
    let sf_id = sf.id;

    // Valid source, but the record judged an older version of the code.
    let source = "(data, helpers) => `<p>fine</p>`";
    let mut block = vibe_block(1, 10, source);
    block.last_validation = Some(ValidationRecord {
        code_version: block.code_version,
        result: validate(source),
    });
    block.code_version += 1;
    assert!(!block.is_executable());

    world
        .put(vec![
            Op::PutStorefront(sf),
            Op::PutPage(page(sf_id, "home", vec![block])),
        ])
        .await;

    let rendered = world
        .render("shop1.test", "home", Visitor::default())
        .await
        .unwrap();
    assert!(!rendered.html.contains("<p>fine</p>"));
    assert!(rendered.html.contains("vf-block-unavailable"));
}
