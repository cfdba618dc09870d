//! Vibefront Core - Shared types library.
//!
//! This crate provides common types used across all Vibefront components:
//! - `engine` - Block validation, sandboxed execution, and page rendering
//! - `server` - Public-facing multi-tenant storefront server
//! - `cli` - Command-line tools for block authors
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, and statuses
//! - [`block`] - Content blocks, visibility rules, and render order
//! - [`page`] - Pages and SEO metadata
//! - [`storefront`] - Tenant storefronts
//! - [`catalog`] - Product, collection, and cart records
//! - [`validation`] - Validator output attached to blocks at save time
//! - [`error`] - The execution/page/data-access failure taxonomy

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod block;
pub mod catalog;
pub mod error;
pub mod page;
pub mod storefront;
pub mod types;
pub mod validation;

pub use block::{Block, BlockType, DateRange, Visibility};
pub use catalog::{Cart, CartLine, CollectionRecord, ProductRecord};
pub use error::{DataAccessError, ExecutionFailure, PageError};
pub use page::{Page, SeoMeta};
pub use storefront::Storefront;
pub use types::*;
pub use validation::{RuleId, ValidationIssue, ValidationRecord, ValidationResult};
