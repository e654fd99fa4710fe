//! Newtype identifiers for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.
//!
//! Cart items carry two further identifiers with different lifecycles:
//! [`ClientRef`], minted locally the moment an item is created, and
//! [`ServerId`], assigned by the remote cart service once a create call
//! succeeds. Both wrap strings because the remote store's identifiers are
//! opaque.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
///
/// # Example
///
/// ```rust
/// # use trolley_core::define_id;
/// define_id!(ProductId);
/// define_id!(CampaignId);
///
/// let product_id = ProductId::new(1);
/// let campaign_id = CampaignId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: ProductId = campaign_id;
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
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(ProductId);

/// Identifier assigned locally when a cart item is created, before any
/// remote confirmation exists.
///
/// Client references are UUIDv4 strings, so they are never reused within a
/// session and remain stable for the item's lifetime. They are the key that
/// in-flight propagation tasks use to find their item again once the remote
/// call completes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientRef(String);

impl ClientRef {
    /// Mint a fresh client reference.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientRef {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for ClientRef {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Identifier assigned by the remote cart service upon successful creation.
///
/// Opaque to us; once assigned to an item it never changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    /// Wrap a remote-assigned identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ServerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_client_refs_are_unique() {
        let a = ClientRef::generate();
        let b = ClientRef::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_client_ref_serde_is_transparent() {
        let client_ref = ClientRef::generate();
        let json = serde_json::to_string(&client_ref).unwrap();
        assert_eq!(json, format!("\"{client_ref}\""));

        let back: ClientRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, client_ref);
    }

    #[test]
    fn test_server_id_display() {
        let id = ServerId::new("a1b2");
        assert_eq!(id.to_string(), "a1b2");
        assert_eq!(id.as_str(), "a1b2");
    }

    #[test]
    fn test_product_id_round_trip() {
        let id = ProductId::new(7);
        assert_eq!(id.as_i64(), 7);
        assert_eq!(i64::from(id), 7);
        assert_eq!(ProductId::from(7), id);
        assert_eq!(id.to_string(), "7");
    }
}
