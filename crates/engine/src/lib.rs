//! Vibefront rendering engine.
//!
//! Everything between a stored page and its HTML lives here: static
//! validation of block code ([`validate`]), the sandboxed vibe-code
//! interpreter ([`lang`], [`sandbox`]), the tenant-scoped data façade
//! ([`facade`]), per-block rendering with failure isolation ([`render`]),
//! and full-page assembly with the render cache ([`assembler`]). The
//! [`store`] module defines the seam to the external data platform and an
//! in-memory implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod assembler;
pub mod context;
pub mod demo;
pub mod facade;
pub mod helpers;
pub mod lang;
pub mod render;
pub mod sandbox;
pub mod store;
pub mod validate;

pub use assembler::{CacheKey, PageAssembler, RenderedPage, versions_hash};
pub use context::{CatalogSnapshot, RenderContext, Visitor};
pub use facade::{Facade, ProductFilters};
pub use render::{FallbackMode, RenderOptions};
pub use sandbox::ExecLimits;
pub use store::{ChangeEvent, DataStore, EntityQuery, MemoryStore, Op, QuerySnapshot};
pub use validate::{validate, validate_block};
