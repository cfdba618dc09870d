//! Template helpers: pure functions available to block code as the
//! `helpers` namespace and reusable from Rust.
//!
//! Every helper is deterministic and side-effect-free. The only source of
//! randomness anywhere in block execution is [`seeded_rng`], which is
//! seeded from the render context so cached and fresh renders agree.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use vibefront_core::types::CurrencyCode;

/// Escape `& < > " '` for safe interpolation into HTML.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Format an amount in the currency's standard unit, e.g. `$19.99`.
///
/// Unknown currency codes fall back to USD formatting; block authors get a
/// price either way.
#[must_use]
pub fn format_price(amount: f64, currency: &str) -> String {
    let code: CurrencyCode = currency.parse().unwrap_or_default();
    let cents = (amount * 100.0).round();
    // Out-of-range amounts degrade to a plain formatted float.
    if !cents.is_finite() || cents.abs() >= 9e18 {
        return format!("{}{amount:.2}", code.symbol());
    }
    #[allow(clippy::cast_possible_truncation)]
    let decimal = Decimal::new(cents as i64, 2);
    format!("{}{decimal:.2}", code.symbol())
}

/// Format an ISO-8601 date or datetime with a strftime pattern.
///
/// Accepts RFC 3339 datetimes and bare `YYYY-MM-DD` dates. Returns the
/// input unchanged when it does not parse; a bad date in block code should
/// degrade, not fail the fragment.
#[must_use]
pub fn format_date(iso: &str, pattern: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(iso) {
        return dt.with_timezone(&Utc).format(pattern).to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(iso, "%Y-%m-%d") {
        return date.format(pattern).to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S") {
        return dt.format(pattern).to_string();
    }
    iso.to_string()
}

/// Default date pattern used when block code omits one.
pub const DEFAULT_DATE_PATTERN: &str = "%B %-d, %Y";

/// Lowercase, alphanumeric, dash-separated slug.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = true; // suppress leading dashes
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Truncate to `max_chars` characters, appending an ellipsis when cut.
#[must_use]
pub fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let mut out: String = input.chars().take(max_chars).collect();
    out.push('\u{2026}');
    out
}

/// Percent-encode for URL components.
#[must_use]
pub fn url_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

/// A deterministic RNG for the `seededRandom` helper, seeded per render.
#[must_use]
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
