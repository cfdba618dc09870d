//! Block Renderer: turns a page's blocks into ordered HTML fragments.
//!
//! Blocks are independent failure domains. Vibe-code blocks run
//! concurrently, each under its own sandbox limits; a failing block is
//! logged and replaced by its fallback while every other block renders
//! normally. Output order always follows the deterministic block order,
//! not completion order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::warn;
use vibefront_core::block::Block;
use vibefront_core::error::ExecutionFailure;

use crate::context::RenderContext;
use crate::helpers;
use crate::sandbox::{self, ExecLimits};

/// What a failed block's slot becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackMode {
    /// Drop the slot entirely.
    #[default]
    Omit,
    /// Emit a neutral placeholder so page layout stays stable.
    Placeholder,
}

/// Knobs for one render pass.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub limits: ExecLimits,
    pub fallback: FallbackMode,
    /// TTL for assembled pages in the render cache.
    pub cache_ttl: Duration,
    /// Budget for resolving the catalog snapshot before rendering starts.
    pub store_timeout: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            limits: ExecLimits::default(),
            fallback: FallbackMode::Omit,
            cache_ttl: Duration::from_secs(300),
            store_timeout: Duration::from_secs(2),
        }
    }
}

/// Sets the shared cancel flag when the render pass is dropped, so
/// spawned block tasks stop at their next fuel checkpoint instead of
/// running out their full budget for a page nobody is waiting on.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Render all visible blocks and concatenate their fragments in block
/// order. `blocks` may arrive in any order.
///
/// Dropping the returned future (client disconnect, caller timeout)
/// cancels every in-flight block.
pub async fn render_blocks(
    ctx: &Arc<RenderContext>,
    mut blocks: Vec<Block>,
    options: &RenderOptions,
) -> String {
    let cancel = Arc::new(AtomicBool::new(false));
    let _guard = CancelOnDrop(Arc::clone(&cancel));
    blocks.sort_by_key(Block::order_key);
    blocks.retain(|block| {
        block
            .visibility
            .allows(ctx.visitor.device, ctx.visitor.user_type, ctx.now)
    });

    enum Slot {
        Ready(String),
        Running {
            block_id: vibefront_core::types::BlockId,
            handle: tokio::task::JoinHandle<Result<String, ExecutionFailure>>,
        },
    }

    let mut slots = Vec::with_capacity(blocks.len());
    for block in blocks {
        if block.uses_vibe_code() && block.is_executable() {
            let ctx = Arc::clone(ctx);
            let limits = options.limits;
            let block_id = block.id;
            let cancel = Arc::clone(&cancel);
            let handle =
                tokio::spawn(async move { sandbox::execute(&block, ctx, limits, cancel).await });
            slots.push(Slot::Running { block_id, handle });
        } else if block.uses_vibe_code() {
            // vibe-code block whose source never passed validation
            slots.push(Slot::Ready(fallback_fragment(
                &block,
                &ExecutionFailure::RuntimeError {
                    block_id: block.id,
                    message: "code has not passed validation".to_string(),
                },
                ctx,
                options.fallback,
            )));
        } else {
            slots.push(Slot::Ready(render_template(&block)));
        }
    }

    let mut html = String::new();
    for slot in slots {
        match slot {
            Slot::Ready(fragment) => html.push_str(&fragment),
            Slot::Running { block_id, handle } => match handle.await {
                Ok(Ok(fragment)) => html.push_str(&fragment),
                Ok(Err(failure)) => {
                    warn!(
                        block_id = %failure.block_id(),
                        storefront_id = %ctx.storefront_id(),
                        kind = failure.kind(),
                        error = %failure,
                        "block render failed"
                    );
                    html.push_str(&placeholder(block_id, options.fallback));
                }
                Err(join_err) => {
                    warn!(
                        block_id = %block_id,
                        storefront_id = %ctx.storefront_id(),
                        error = %join_err,
                        "block render task failed"
                    );
                    html.push_str(&placeholder(block_id, options.fallback));
                }
            },
        }
    }
    html
}

fn fallback_fragment(
    block: &Block,
    failure: &ExecutionFailure,
    ctx: &RenderContext,
    mode: FallbackMode,
) -> String {
    // hybrid blocks keep their template rendering when the code path is out
    if block.block_type == vibefront_core::block::BlockType::Hybrid {
        return render_template(block);
    }
    warn!(
        block_id = %failure.block_id(),
        storefront_id = %ctx.storefront_id(),
        kind = failure.kind(),
        error = %failure,
        "block render failed"
    );
    placeholder(block.id, mode)
}

fn placeholder(block_id: vibefront_core::types::BlockId, mode: FallbackMode) -> String {
    match mode {
        FallbackMode::Omit => String::new(),
        FallbackMode::Placeholder => format!(
            "<div class=\"vf-block-unavailable\" data-block=\"{block_id}\"></div>"
        ),
    }
}

/// The built-in template path: a fragment assembled from `config` alone.
/// Every interpolated value is escaped.
#[must_use]
pub fn render_template(block: &Block) -> String {
    let config = &block.config;
    let field = |key: &str| {
        config
            .get(key)
            .and_then(|v| v.as_str())
            .map(helpers::escape_html)
    };

    let mut html = format!("<section class=\"vf-block\" data-block=\"{}\">", block.id);
    if let Some(heading) = field("heading") {
        html.push_str(&format!("<h2>{heading}</h2>"));
    }
    if let Some(text) = field("text") {
        html.push_str(&format!("<p>{text}</p>"));
    }
    if let Some(image) = field("imageUrl") {
        let alt = field("imageAlt").unwrap_or_default();
        html.push_str(&format!("<img src=\"{image}\" alt=\"{alt}\">"));
    }
    if let (Some(label), Some(url)) = (field("ctaText"), field("ctaUrl")) {
        html.push_str(&format!("<a class=\"vf-cta\" href=\"{url}\">{label}</a>"));
    }
    html.push_str("</section>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CatalogSnapshot, Visitor};
    use crate::validate;
    use chrono::Utc;
    use vibefront_core::block::{BlockType, Visibility};
    use vibefront_core::storefront::Storefront;
    use vibefront_core::types::{
        BlockId, DeviceClass, StorefrontId, StorefrontStatus, UserType, fixture_uuid,
    };
    use vibefront_core::validation::ValidationRecord;

    fn ctx() -> Arc<RenderContext> {
        Arc::new(RenderContext {
            storefront: Storefront {
                id: StorefrontId::from_uuid(fixture_uuid(1)),
                name: "Acme".to_string(),
                primary_domain: "acme.test".to_string(),
                custom_domains: vec![],
                status: StorefrontStatus::Active,
                theme: serde_json::json!({}),
            },
            visitor: Visitor::default(),
            now: Utc::now(),
            seed: 0,
            catalog: Ok(CatalogSnapshot::default()),
        })
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

    fn template_block(n: u64, position: i64, config: serde_json::Value) -> Block {
        Block {
            id: BlockId::from_uuid(fixture_uuid(n)),
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

    #[tokio::test]
    async fn test_order_follows_position_not_completion() {
        // the first block by position busy-loops briefly so it finishes last
        let slow = vibe_block(
            1,
            10,
            "function f(data, helpers) {
                let i = 0;
                while (i < 50000) { i = i + 1; }
                return `<p>slow</p>`;
            }",
        );
        let fast = vibe_block(2, 20, "(data, helpers) => `<p>fast</p>`");
        let html = render_blocks(&ctx(), vec![fast, slow], &RenderOptions::default()).await;
        assert_eq!(html, "<p>slow</p><p>fast</p>");
    }

    #[tokio::test]
    async fn test_failing_block_is_isolated() {
        let good = vibe_block(1, 10, "(data, helpers) => `<p>ok</p>`");
        let bad = vibe_block(2, 20, "(data, helpers) => `${data.nope.deep}`");
        let options = RenderOptions {
            fallback: FallbackMode::Placeholder,
            ..RenderOptions::default()
        };
        let html = render_blocks(&ctx(), vec![good, bad], &options).await;
        assert!(html.starts_with("<p>ok</p>"));
        assert!(html.contains("vf-block-unavailable"));
    }

    #[tokio::test]
    async fn test_omit_mode_drops_failed_slot() {
        let bad = vibe_block(1, 10, "(data, helpers) => `${data.nope.deep}`");
        let html = render_blocks(&ctx(), vec![bad], &RenderOptions::default()).await;
        assert_eq!(html, "");
    }

    #[tokio::test]
    async fn test_visibility_skips_before_execution() {
        let mut mobile_only = vibe_block(1, 10, "(data, helpers) => `<p>m</p>`");
        mobile_only.visibility.devices = vec![DeviceClass::Mobile];
        let everyone = template_block(2, 20, serde_json::json!({"heading": "Hi"}));
        // default visitor is desktop guest
        let html = render_blocks(&ctx(), vec![mobile_only, everyone], &RenderOptions::default())
            .await;
        assert!(!html.contains("<p>m</p>"));
        assert!(html.contains("<h2>Hi</h2>"));
    }

    #[tokio::test]
    async fn test_customer_only_block_hidden_from_guests() {
        let mut customers = vibe_block(1, 10, "(data, helpers) => `<p>vip</p>`");
        customers.visibility.user_types = vec![UserType::Customer];
        let html = render_blocks(&ctx(), vec![customers], &RenderOptions::default()).await;
        assert_eq!(html, "");
    }

    #[test]
    fn test_cancel_guard_sets_flag_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));
        let guard = CancelOnDrop(Arc::clone(&flag));
        assert!(!flag.load(Ordering::Relaxed));
        drop(guard);
        assert!(flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_dropped_render_cancels_running_blocks() {
        // A render abandoned mid-flight must not leave its block tasks
        // burning their full wall-clock budget. Runtime shutdown waits
        // for the blocking pool, so an uncancelled loop would hold this
        // test for the whole 5s budget.
        let start = std::time::Instant::now();
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let looping =
                vibe_block(1, 10, "function f(data, helpers) { while (true) {} return ``; }");
            let options = RenderOptions {
                limits: ExecLimits {
                    max_duration: Duration::from_secs(5),
                    ..ExecLimits::default()
                },
                ..RenderOptions::default()
            };
            let context = ctx();
            let render =
                tokio::spawn(async move { render_blocks(&context, vec![looping], &options).await });
            // give the block task time to start, then abandon the render
            tokio::time::sleep(Duration::from_millis(50)).await;
            render.abort();
            let _ = render.await;
        });
        drop(rt);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_hybrid_falls_back_to_template_when_code_invalid() {
        let mut block = template_block(1, 10, serde_json::json!({"heading": "Layout"}));
        block.block_type = BlockType::Hybrid;
        block.vibe_code = Some("(data, helpers) => fetch('x')".to_string());
        block.last_validation = Some(ValidationRecord {
            code_version: 1,
            result: validate::validate("(data, helpers) => fetch('x')"),
        });
        let html = render_blocks(&ctx(), vec![block], &RenderOptions::default()).await;
        assert!(html.contains("<h2>Layout</h2>"));
    }

    #[test]
    fn test_template_path_escapes_config() {
        let block = template_block(
            1,
            0,
            serde_json::json!({"heading": "<script>x</script>", "text": "a & b"}),
        );
        let html = render_template(&block);
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("a &amp; b"));
        assert!(!html.contains("<script>"));
    }
}
