//! Status and classification enums for storefronts and visitors.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a tenant storefront.
///
/// Storefronts are never hard-deleted; deactivation is a status change so
/// that historical domain mappings stay resolvable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorefrontStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

/// Device classification for the visiting client.
///
/// Derived from the User-Agent at the serving boundary and used both for
/// block visibility rules and as a render cache key dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[default]
    Desktop,
    Tablet,
    Mobile,
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Desktop => write!(f, "desktop"),
            Self::Tablet => write!(f, "tablet"),
            Self::Mobile => write!(f, "mobile"),
        }
    }
}

/// Visitor classification for block visibility and cache keying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Guest,
    Customer,
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Guest => write!(f, "guest"),
            Self::Customer => write!(f, "customer"),
        }
    }
}
