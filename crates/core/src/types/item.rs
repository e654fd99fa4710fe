//! Cart items and their synchronization state.
//!
//! A [`CartItem`] is one line in the cart. It carries denormalized catalog
//! data (`name`, `image`, `price`) frozen at add-time, so later catalog
//! changes never rewrite what the user put in their cart.
//!
//! Serialized field names are camelCase to match the wire and cache formats
//! used by the rest of the system.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ClientRef, ProductId, ServerId};
use super::reference::CartRef;

/// Synchronization state of a single cart item against the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// A mutation has been applied in memory and remote confirmation is
    /// still outstanding.
    #[default]
    Pending,
    /// The remote store has acknowledged the current value.
    Synced,
    /// The last propagation attempt errored. The item stays fully usable
    /// locally; the next mutation on it retries.
    Failed,
}

/// The catalog view of a product, as handed to an add operation.
///
/// Copies of these fields are frozen onto the [`CartItem`] at add-time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub price: Decimal,
}

/// One line in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Locally-minted identifier, stable for the item's lifetime in this
    /// session and never reused.
    pub client_ref: ClientRef,
    /// Remote store identifier. `None` until a create succeeds; once set it
    /// never changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<ServerId>,
    /// Catalog entry this line represents. Immutable after creation.
    pub product_id: ProductId,
    /// Product name at add-time.
    pub name: String,
    /// Product image URL at add-time.
    pub image: String,
    /// Unit price at add-time. Live catalog price changes are not tracked.
    pub price: Decimal,
    /// Always at least 1; an item whose quantity would drop to zero is
    /// removed from the cart instead.
    pub quantity: u32,
    /// Free-text annotation, mutable independently of quantity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Where this item stands against the remote store.
    pub sync_state: SyncState,
    /// Session-local mutation counter, bumped on every change to this item.
    /// In-flight propagation completions compare it against the value they
    /// captured at dispatch to detect that the item changed while the call
    /// was on the wire. Not persisted.
    #[serde(skip)]
    pub revision: u64,
}

impl CartItem {
    /// Create a fresh cart line for `product`.
    ///
    /// The item starts with a newly minted client reference, no server
    /// identifier, and [`SyncState::Pending`].
    #[must_use]
    pub fn new(product: ProductInfo, quantity: u32, notes: Option<String>) -> Self {
        Self {
            client_ref: ClientRef::generate(),
            server_id: None,
            product_id: product.product_id,
            name: product.name,
            image: product.image,
            price: product.price,
            quantity,
            notes,
            sync_state: SyncState::Pending,
            revision: 0,
        }
    }

    /// Whether `item_ref` refers to this item, by either identifier.
    ///
    /// This is the single place that knows the match-by-either-identifier
    /// rule. Callers resolve through it (via the engine's resolver) instead
    /// of comparing identifier fields themselves, so an item found by one
    /// scheme can never be "not found" by the other.
    #[must_use]
    pub fn matches(&self, item_ref: &CartRef) -> bool {
        match item_ref {
            CartRef::Client(client_ref) => self.client_ref == *client_ref,
            CartRef::Server(server_id) => self.server_id.as_ref() == Some(server_id),
        }
    }

    /// Price of this line: unit price times quantity, saturating at the
    /// `Decimal` range limits rather than overflowing.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product() -> ProductInfo {
        ProductInfo {
            product_id: ProductId::new(7),
            name: "Espresso Beans".to_string(),
            image: "/images/espresso.jpg".to_string(),
            price: Decimal::new(1250, 2),
        }
    }

    #[test]
    fn test_new_item_starts_pending_without_server_id() {
        let item = CartItem::new(product(), 2, None);
        assert_eq!(item.sync_state, SyncState::Pending);
        assert!(item.server_id.is_none());
        assert_eq!(item.quantity, 2);
        assert_eq!(item.revision, 0);
    }

    #[test]
    fn test_matches_by_client_ref() {
        let item = CartItem::new(product(), 1, None);
        assert!(item.matches(&CartRef::Client(item.client_ref.clone())));
        assert!(!item.matches(&CartRef::Client(ClientRef::generate())));
    }

    #[test]
    fn test_matches_by_server_id_only_once_assigned() {
        let mut item = CartItem::new(product(), 1, None);
        let server_ref = CartRef::Server(ServerId::new("42"));
        assert!(!item.matches(&server_ref));

        item.server_id = Some(ServerId::new("42"));
        assert!(item.matches(&server_ref));
        assert!(!item.matches(&CartRef::Server(ServerId::new("43"))));
    }

    #[test]
    fn test_line_total() {
        let mut item = CartItem::new(product(), 3, None);
        assert_eq!(item.line_total(), Decimal::new(3750, 2));

        item.quantity = 1;
        assert_eq!(item.line_total(), Decimal::new(1250, 2));
    }

    #[test]
    fn test_line_total_saturates_instead_of_overflowing() {
        let mut item = CartItem::new(product(), 2, None);
        item.price = Decimal::MAX;
        assert_eq!(item.line_total(), Decimal::MAX);

        item.price = Decimal::MIN;
        assert_eq!(item.line_total(), Decimal::MIN);
    }

    #[test]
    fn test_serde_uses_camel_case_and_omits_empty_fields() {
        let item = CartItem::new(product(), 1, None);
        let json = serde_json::to_value(&item).unwrap();

        assert!(json.get("clientRef").is_some());
        assert_eq!(json.get("productId"), Some(&serde_json::json!(7)));
        assert_eq!(json.get("syncState"), Some(&serde_json::json!("pending")));
        // Unset optional fields and the session-local revision stay off the wire
        assert!(json.get("serverId").is_none());
        assert!(json.get("notes").is_none());
        assert!(json.get("revision").is_none());
    }

    #[test]
    fn test_serde_round_trip_keeps_notes_and_server_id() {
        let mut item = CartItem::new(product(), 2, Some("no onions".to_string()));
        item.server_id = Some(ServerId::new("srv-9"));
        item.sync_state = SyncState::Synced;
        item.revision = 5;

        let json = serde_json::to_string(&item).unwrap();
        let back: CartItem = serde_json::from_str(&json).unwrap();

        assert_eq!(back.notes.as_deref(), Some("no onions"));
        assert_eq!(back.server_id, Some(ServerId::new("srv-9")));
        assert_eq!(back.sync_state, SyncState::Synced);
        // revision is session-local and resets on a round trip
        assert_eq!(back.revision, 0);
    }
}
