//! Route registration.

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

pub mod internal;
pub mod pages;

/// All application routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::home))
        .route("/{slug}", get(pages::page))
        .route("/internal/invalidate", post(internal::invalidate))
}
