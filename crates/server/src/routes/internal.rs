//! Internal endpoints, guarded by the admin bearer token.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use serde::Deserialize;
use vibefront_core::types::StorefrontId;

use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateRequest {
    pub storefront_id: StorefrontId,
    /// When present, only this page's variants are dropped; otherwise the
    /// whole storefront's cache entries go.
    #[serde(default)]
    pub slug: Option<String>,
}

/// `POST /internal/invalidate` - drop cached renders explicitly.
///
/// Normal invalidation rides the store's change feed; this endpoint covers
/// operational cases (support tooling, emergency flushes).
pub async fn invalidate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<InvalidateRequest>,
) -> Result<StatusCode> {
    authorize(&state, &headers)?;

    match request.slug {
        Some(slug) => state
            .assembler()
            .invalidate_page(request.storefront_id, &slug),
        None => state.assembler().invalidate_storefront(request.storefront_id),
    }
    Ok(StatusCode::NO_CONTENT)
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
    if state.config().admin_token_matches(token) {
        Ok(())
    } else {
        Err(AppError::Unauthorized("invalid bearer token".to_string()))
    }
}
