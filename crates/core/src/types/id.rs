//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. Tenant and content
//! identifiers are UUIDs because they must be unique across all tenants,
//! not just within one database.

use uuid::Uuid;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around [`Uuid`] with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Ord`, `Hash`
/// - Conversion methods: `new()`, `from_uuid()`, `as_uuid()`
/// - `From<Uuid>` and `Into<Uuid>` implementations
///
/// # Example
///
/// ```rust
/// # use vibefront_core::define_id;
/// define_id!(StorefrontId);
/// define_id!(BlockId);
///
/// let storefront = StorefrontId::new();
/// let block = BlockId::new();
///
/// // These are different types, so this won't compile:
/// // let _: StorefrontId = block;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Generate a new random ID.
            #[must_use]
            pub fn new() -> Self {
                Self(::uuid::Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(id: ::uuid::Uuid) -> Self {
                Self(id)
            }

            /// Get the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> ::uuid::Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(id: ::uuid::Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(StorefrontId);
define_id!(PageId);
define_id!(BlockId);
define_id!(ProductId);
define_id!(CollectionId);
define_id!(CartId);

/// Deterministic ID construction for tests and fixtures.
///
/// Produces a UUID whose last eight bytes encode `n`, so fixtures can refer
/// to "storefront 1" without random values leaking into assertions.
#[must_use]
pub fn fixture_uuid(n: u64) -> Uuid {
    let mut bytes = [0u8; 16];
    bytes[8..].copy_from_slice(&n.to_be_bytes());
    Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types_with_stable_serde() {
        let id = BlockId::from_uuid(fixture_uuid(7));
        let json = serde_json::to_string(&id).unwrap();
        let back: BlockId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
        // transparent serde: serializes as a bare UUID string
        assert!(json.starts_with('"'));
    }

    #[test]
    fn fixture_uuid_is_deterministic() {
        assert_eq!(fixture_uuid(42), fixture_uuid(42));
        assert_ne!(fixture_uuid(1), fixture_uuid(2));
    }
}
