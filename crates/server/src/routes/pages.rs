//! Public page routes: tenant resolution by Host header, visitor
//! classification, and page rendering through the assembler.

use askama::Template;
use askama_web::WebTemplate;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::http::header::{COOKIE, HOST, USER_AGENT};
use vibefront_core::types::{DeviceClass, UserType};
use vibefront_engine::Visitor;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Cookie whose presence marks an authenticated customer session.
pub const SESSION_COOKIE: &str = "vf_session";

/// The HTML shell around assembled block content.
#[derive(Template, WebTemplate)]
#[template(path = "page.html")]
pub struct PageShell {
    title: String,
    description: Option<String>,
    canonical: Option<String>,
    body: String,
}

/// `GET /` - the storefront home page.
pub async fn home(State(state): State<AppState>, headers: HeaderMap) -> Result<PageShell> {
    render(&state, &headers, "home").await
}

/// `GET /{slug}` - any other published page.
pub async fn page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<PageShell> {
    render(&state, &headers, &slug).await
}

async fn render(state: &AppState, headers: &HeaderMap, slug: &str) -> Result<PageShell> {
    let host = request_host(headers)
        .ok_or_else(|| AppError::BadRequest("missing Host header".to_string()))?;
    let visitor = classify_visitor(headers);

    let rendered = state
        .assembler()
        .render_for_host(&host, slug, visitor)
        .await?;

    Ok(PageShell {
        title: rendered
            .seo
            .title
            .clone()
            .unwrap_or_else(|| rendered.title.clone()),
        description: rendered.seo.description.clone(),
        canonical: rendered.seo.canonical.clone(),
        body: rendered.html.clone(),
    })
}

/// The request's host, without any port suffix.
fn request_host(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(HOST)?.to_str().ok()?;
    let host = raw.rsplit_once(':').map_or(raw, |(name, port)| {
        // strip only a numeric port, not part of an IPv6 literal
        if port.chars().all(|c| c.is_ascii_digit()) {
            name
        } else {
            raw
        }
    });
    Some(host.to_ascii_lowercase())
}

/// Classify the visitor from request headers.
fn classify_visitor(headers: &HeaderMap) -> Visitor {
    Visitor {
        device: device_class(headers),
        user_type: user_type(headers),
    }
}

fn device_class(headers: &HeaderMap) -> DeviceClass {
    let Some(ua) = headers.get(USER_AGENT).and_then(|h| h.to_str().ok()) else {
        return DeviceClass::Desktop;
    };
    if ua.contains("iPad") || ua.contains("Tablet") {
        DeviceClass::Tablet
    } else if ua.contains("Mobi") || ua.contains("Android") {
        DeviceClass::Mobile
    } else {
        DeviceClass::Desktop
    }
}

fn user_type(headers: &HeaderMap) -> UserType {
    let has_session = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .any(|cookie| {
            cookie
                .trim()
                .split_once('=')
                .is_some_and(|(name, value)| name == SESSION_COOKIE && !value.is_empty())
        });
    if has_session {
        UserType::Customer
    } else {
        UserType::Guest
    }
}
