//! Tenant storefronts.

use serde::{Deserialize, Serialize};

use crate::types::{StorefrontId, StorefrontStatus};

/// One tenant's storefront. Created at signup, mutated by owner settings
/// changes, never hard-deleted (status change only) so historical domain
/// mappings stay resolvable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storefront {
    pub id: StorefrontId,
    pub name: String,
    /// The canonical serving domain.
    pub primary_domain: String,
    /// Additional owner-provisioned domains that resolve to this tenant.
    #[serde(default)]
    pub custom_domains: Vec<String>,
    pub status: StorefrontStatus,
    /// Free-form theme/settings blob, passed through to block config.
    #[serde(default)]
    pub theme: serde_json::Value,
}

impl Storefront {
    /// Whether `host` resolves to this storefront.
    #[must_use]
    pub fn matches_domain(&self, host: &str) -> bool {
        self.primary_domain.eq_ignore_ascii_case(host)
            || self
                .custom_domains
                .iter()
                .any(|d| d.eq_ignore_ascii_case(host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixture_uuid;

    #[test]
    fn test_matches_domain_case_insensitive() {
        let sf = Storefront {
            id: StorefrontId::from_uuid(fixture_uuid(1)),
            name: "Acme".to_string(),
            primary_domain: "acme.example.com".to_string(),
            custom_domains: vec!["shop.acme.com".to_string()],
            status: StorefrontStatus::Active,
            theme: serde_json::json!({}),
        };
        assert!(sf.matches_domain("ACME.example.com"));
        assert!(sf.matches_domain("shop.acme.com"));
        assert!(!sf.matches_domain("other.example.com"));
    }
}
