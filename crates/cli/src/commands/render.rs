//! Render a local source file against the seeded demo storefront.
//!
//! Goes through the full pipeline (validation, store, assembler, sandbox)
//! so what the author sees matches what the server would serve.

use std::path::Path;

use chrono::Utc;
use tracing::info;
use vibefront_core::block::{Block, BlockType, Visibility};
use vibefront_core::page::{Page, SeoMeta};
use vibefront_core::types::{BlockId, DeviceClass, PageId, UserType};
use vibefront_core::validation::ValidationRecord;
use vibefront_engine::assembler::PageAssembler;
use vibefront_engine::store::{DataStore, Op};
use vibefront_engine::{MemoryStore, RenderOptions, Visitor, demo};

const PREVIEW_SLUG: &str = "preview";

/// Execute a source file in the sandbox and print the resulting fragment.
///
/// # Errors
///
/// Returns an error if the file cannot be read, validation fails, or the
/// render fails page-wide.
#[allow(clippy::print_stdout)] // rendered HTML goes to stdout for piping
pub async fn run(
    file: &Path,
    config: Option<&Path>,
    device: DeviceClass,
    user_type: UserType,
) -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let source = tokio::fs::read_to_string(file).await?;
    let config_value = match config {
        Some(path) => serde_json::from_str(&tokio::fs::read_to_string(path).await?)?,
        None => serde_json::json!({}),
    };

    let validation = vibefront_engine::validate(&source);
    if !validation.is_valid {
        for issue in validation.fatal_issues() {
            tracing::error!("{issue}");
        }
        return Err("source failed validation; fix the findings above".into());
    }

    let store = MemoryStore::new();
    let storefront_id = demo::seed_demo_storefront(&store).await?;

    let block = Block {
        id: BlockId::new(),
        block_type: BlockType::VibeCode,
        vibe_code: Some(source),
        config: config_value,
        position: 0,
        visibility: Visibility::default(),
        code_version: 1,
        last_code_update: Utc::now(),
        dependencies: vec![],
        last_validation: Some(ValidationRecord {
            code_version: 1,
            result: validation,
        }),
    };
    store
        .transact(vec![Op::PutPage(Page {
            id: PageId::new(),
            storefront_id,
            slug: PREVIEW_SLUG.to_string(),
            title: "Preview".to_string(),
            blocks: vec![block],
            published: true,
            published_at: Some(Utc::now()),
            seo: SeoMeta::default(),
        })])
        .await?;

    let assembler = PageAssembler::new(store, RenderOptions::default());
    let visitor = Visitor { device, user_type };
    let rendered = assembler
        .render_for_host(demo::DEMO_DOMAIN, PREVIEW_SLUG, visitor)
        .await?;

    info!(cache_key = %rendered.cache_key, "render complete");
    println!("{}", rendered.html);
    Ok(())
}
