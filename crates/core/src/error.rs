//! The failure taxonomy shared between the engine and the serving boundary.
//!
//! `ExecutionFailure` is block-local and degrades to a fallback fragment;
//! `PageError` aborts the whole response; `DataAccessError` is folded into
//! a per-block `RuntimeError` by the façade.

use thiserror::Error;

use crate::types::{BlockId, StorefrontId};

/// A typed failure from one block's sandboxed execution.
///
/// Caught by the Block Renderer and never propagated past the page-render
/// boundary. Messages never contain block source or tenant data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionFailure {
    /// Wall-clock or step budget exhausted; also produced by cooperative
    /// cancellation. Never yields a partial fragment.
    #[error("block {block_id} exceeded its execution time limit")]
    Timeout { block_id: BlockId },

    /// Interpreter allocation accounting exceeded the memory limit.
    #[error("block {block_id} exceeded its memory limit")]
    MemoryExceeded { block_id: BlockId },

    /// The returned fragment exceeded the output size limit.
    #[error("block {block_id} produced output over the size limit")]
    OutputTooLarge { block_id: BlockId },

    /// A fault inside the block's function, including data-access failures.
    #[error("block {block_id} failed at runtime: {message}")]
    RuntimeError { block_id: BlockId, message: String },
}

impl ExecutionFailure {
    /// The failing block.
    #[must_use]
    pub const fn block_id(&self) -> BlockId {
        match self {
            Self::Timeout { block_id }
            | Self::MemoryExceeded { block_id }
            | Self::OutputTooLarge { block_id }
            | Self::RuntimeError { block_id, .. } => *block_id,
        }
    }

    /// Stable kind label for logs and observability.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::MemoryExceeded { .. } => "memory_exceeded",
            Self::OutputTooLarge { .. } => "output_too_large",
            Self::RuntimeError { .. } => "runtime_error",
        }
    }
}

/// Whole-page resolution failure. The only error class that aborts the
/// entire response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    /// No published page matches the route for this storefront.
    #[error("page not found")]
    NotFound,

    /// The storefront has been suspended.
    #[error("storefront is suspended")]
    Suspended,

    /// An infrastructure fault unrelated to any single block.
    #[error("internal error: {0}")]
    InternalError(String),
}

/// A façade call to the external data store failed.
///
/// Treated as `ExecutionFailure::RuntimeError` for the calling block so a
/// stalled or broken store interaction stays isolated per block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataAccessError {
    /// The store did not answer within the render deadline.
    #[error("data store timed out")]
    Timeout,

    /// A returned record belonged to a different tenant. Correctness
    /// critical: the record is dropped and the call fails.
    #[error("tenant scope violation: expected {expected}")]
    TenantScopeViolation { expected: StorefrontId },

    /// Any other store fault.
    #[error("data store error: {0}")]
    Store(String),
}

impl DataAccessError {
    /// Fold into the per-block failure the renderer isolates.
    #[must_use]
    pub fn into_execution_failure(self, block_id: BlockId) -> ExecutionFailure {
        ExecutionFailure::RuntimeError {
            block_id,
            message: self.to_string(),
        }
    }
}
