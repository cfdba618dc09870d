//! Sandbox executor: runs one block's vibe code under hard resource limits.
//!
//! The interpreter is synchronous and runs on the blocking pool so a hot
//! loop never starves the async runtime. Two timeout layers back each
//! other up: the interpreter's own fuel/deadline checks, and an async
//! watchdog that flips the cooperative cancel flag if the blocking task
//! overruns its wall-clock budget.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::warn;
use vibefront_core::block::Block;
use vibefront_core::error::ExecutionFailure;
use vibefront_core::types::BlockId;

use crate::context::RenderContext;
use crate::facade::Facade;
use crate::lang::interp::InterpError;
use crate::lang::{self, parser::ParseError};

/// Watchdog slack past the interpreter's own deadline. The interpreter
/// normally notices the deadline first; the watchdog covers the case
/// where the blocking thread is wedged between fuel checks.
const WATCHDOG_GRACE: Duration = Duration::from_millis(200);

/// Per-block execution limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecLimits {
    /// Wall-clock budget for one block.
    pub max_duration: Duration,
    /// Accounted allocation budget.
    pub max_memory_bytes: u64,
    /// Maximum size of the returned HTML fragment.
    pub max_output_bytes: u64,
    /// Evaluation step budget; the CPU bound that holds even if the
    /// clock misbehaves.
    pub max_fuel: u64,
}

impl Default for ExecLimits {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(1),
            max_memory_bytes: 128 * 1024 * 1024,
            max_output_bytes: 1024 * 1024,
            max_fuel: 5_000_000,
        }
    }
}

/// Execute a block's vibe code and return its HTML fragment.
///
/// The block must be executable: validated, with the validation record
/// matching the current code version. A stale or missing validation is a
/// runtime failure for this block only, never a page failure.
///
/// `cancel` is shared with the caller: the renderer flips it when the
/// page render is abandoned, and the watchdog flips it on overrun. The
/// interpreter observes it at its next fuel checkpoint either way.
///
/// # Errors
///
/// Returns [`ExecutionFailure`] scoped to this block; the caller decides
/// whether to omit or placeholder the slot.
pub async fn execute(
    block: &Block,
    ctx: Arc<RenderContext>,
    limits: ExecLimits,
    cancel: Arc<AtomicBool>,
) -> Result<String, ExecutionFailure> {
    let block_id = block.id;
    let Some(source) = block.vibe_code.clone() else {
        return Err(ExecutionFailure::RuntimeError {
            block_id,
            message: "block has no vibe code".to_string(),
        });
    };
    if !block.is_executable() {
        return Err(ExecutionFailure::RuntimeError {
            block_id,
            message: "code has not passed validation for its current version".to_string(),
        });
    }

    let config = block.config.clone();
    let task_cancel = Arc::clone(&cancel);
    let seed = ctx.seed;

    let handle = tokio::task::spawn_blocking(move || {
        let function = lang::parse(&source).map_err(|e: ParseError| InterpError::Runtime(
            format!("parse error at {}:{}: {}", e.line, e.column, e.message),
        ))?;
        let facade = Facade::new(&ctx);
        lang::run(&function, &config, facade, seed, &limits, &task_cancel)
    });

    let budget = limits.max_duration + WATCHDOG_GRACE;
    let outcome = match tokio::time::timeout(budget, handle).await {
        Ok(joined) => joined,
        Err(_elapsed) => {
            // The blocking task keeps the cancel flag and will observe it
            // at its next fuel check; we stop waiting for it now.
            cancel.store(true, Ordering::Relaxed);
            warn!(block_id = %block_id, "block execution overran its watchdog budget");
            return Err(ExecutionFailure::Timeout { block_id });
        }
    };

    match outcome {
        Ok(Ok(html)) => Ok(html),
        Ok(Err(err)) => Err(failure_for(block_id, err)),
        Err(join_err) => {
            warn!(block_id = %block_id, error = %join_err, "block execution task failed");
            Err(ExecutionFailure::RuntimeError {
                block_id,
                message: "execution task failed".to_string(),
            })
        }
    }
}

fn failure_for(block_id: BlockId, err: InterpError) -> ExecutionFailure {
    match err {
        InterpError::Timeout => ExecutionFailure::Timeout { block_id },
        InterpError::Memory => ExecutionFailure::MemoryExceeded { block_id },
        InterpError::Output => ExecutionFailure::OutputTooLarge { block_id },
        InterpError::Runtime(message) => ExecutionFailure::RuntimeError { block_id, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CatalogSnapshot, Visitor};
    use crate::validate;
    use chrono::Utc;
    use vibefront_core::block::{Block, BlockType, Visibility};
    use vibefront_core::storefront::Storefront;
    use vibefront_core::types::{StorefrontId, StorefrontStatus, fixture_uuid};
    use vibefront_core::validation::ValidationRecord;

    fn test_ctx() -> Arc<RenderContext> {
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
            seed: 1,
            catalog: Ok(CatalogSnapshot::default()),
        })
    }

    fn validated_block(source: &str) -> Block {
        let mut block = Block {
            id: vibefront_core::types::BlockId::new(),
            block_type: BlockType::VibeCode,
            vibe_code: Some(source.to_string()),
            config: serde_json::json!({}),
            position: 0,
            visibility: Visibility::default(),
            code_version: 1,
            last_code_update: Utc::now(),
            dependencies: vec![],
            last_validation: None,
        };
        block.last_validation = Some(ValidationRecord {
            code_version: block.code_version,
            result: validate::validate(source),
        });
        block
    }

    fn no_cancel() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[tokio::test]
    async fn test_successful_execution() {
        let block = validated_block("(data, helpers) => `<p>hi</p>`");
        let html = execute(&block, test_ctx(), ExecLimits::default(), no_cancel())
            .await
            .unwrap();
        assert_eq!(html, "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_stale_validation_is_rejected() {
        let mut block = validated_block("(data, helpers) => `<p>hi</p>`");
        // author updated the code after the last validation run
        block.code_version += 1;
        let err = execute(&block, test_ctx(), ExecLimits::default(), no_cancel())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionFailure::RuntimeError { .. }));
    }

    #[tokio::test]
    async fn test_infinite_loop_times_out() {
        let block = validated_block("function f(data, helpers) { while (true) {} return ``; }");
        let limits = ExecLimits {
            max_duration: Duration::from_millis(50),
            ..ExecLimits::default()
        };
        let err = execute(&block, test_ctx(), limits, no_cancel())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionFailure::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_cancel_flag_stops_a_running_block() {
        // A generous wall-clock budget: only the external cancel flag can
        // stop this loop early.
        let block = validated_block("function f(data, helpers) { while (true) {} return ``; }");
        let limits = ExecLimits {
            max_duration: Duration::from_secs(5),
            ..ExecLimits::default()
        };
        let cancel = no_cancel();
        cancel.store(true, Ordering::Relaxed);
        let start = std::time::Instant::now();
        let err = execute(&block, test_ctx(), limits, cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionFailure::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_runtime_error_carries_block_id() {
        let block = validated_block("(data, helpers) => `${data.nope.deep}`");
        let id = block.id;
        let err = execute(&block, test_ctx(), ExecLimits::default(), no_cancel())
            .await
            .unwrap_err();
        assert_eq!(err.block_id(), id);
        assert_eq!(err.kind(), "runtime_error");
    }
}
