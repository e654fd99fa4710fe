//! Read-only cart view.
//!
//! A [`CartSnapshot`] is a point-in-time copy of the cart, detached from
//! live state: holding one never blocks mutations, and no snapshot changes
//! after it is taken. Derived figures (unit count, total price) are computed
//! on the snapshot so every consumer sees numbers consistent with the items
//! it is looking at.

use rust_decimal::Decimal;
use serde::Serialize;

use trolley_core::CartItem;

/// Point-in-time view of the cart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    /// Cart lines in insertion order. Order is stable across mutations;
    /// updating an item does not move it.
    pub items: Vec<CartItem>,
    /// Whether startup reconciliation has completed. Consumers can render a
    /// loading state off this instead of mistaking "still starting" for an
    /// empty cart.
    pub is_ready: bool,
}

impl CartSnapshot {
    /// Total units across all lines; a line with quantity 3 counts 3.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of line totals (unit price times quantity, per line), saturating
    /// at the `Decimal` range limits.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(CartItem::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use trolley_core::{ProductId, ProductInfo};

    fn item(price: Decimal, quantity: u32) -> CartItem {
        CartItem::new(
            ProductInfo {
                product_id: ProductId::new(1),
                name: "Espresso Beans".to_string(),
                image: "/images/espresso.jpg".to_string(),
                price,
            },
            quantity,
            None,
        )
    }

    #[test]
    fn test_empty_snapshot_has_zero_totals() {
        let snapshot = CartSnapshot {
            items: Vec::new(),
            is_ready: true,
        };

        assert_eq!(snapshot.item_count(), 0);
        assert_eq!(snapshot.total(), Decimal::ZERO);
    }

    #[test]
    fn test_item_count_sums_quantities() {
        let snapshot = CartSnapshot {
            items: vec![item(Decimal::ONE, 2), item(Decimal::ONE, 3)],
            is_ready: true,
        };

        assert_eq!(snapshot.item_count(), 5);
    }

    #[test]
    fn test_total_is_exact_decimal_arithmetic() {
        let snapshot = CartSnapshot {
            items: vec![
                item(Decimal::new(1250, 2), 2),
                item(Decimal::new(250, 2), 3),
            ],
            is_ready: true,
        };

        assert_eq!(snapshot.total(), Decimal::new(3250, 2));
    }

    #[test]
    fn test_total_saturates_instead_of_overflowing() {
        // One line already at the ceiling, another on top of it
        let snapshot = CartSnapshot {
            items: vec![item(Decimal::MAX, 2), item(Decimal::new(1250, 2), 1)],
            is_ready: true,
        };

        assert_eq!(snapshot.total(), Decimal::MAX);
    }

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let snapshot = CartSnapshot {
            items: vec![item(Decimal::new(1250, 2), 1)],
            is_ready: false,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json.get("isReady"), Some(&serde_json::json!(false)));
        assert_eq!(json["items"].as_array().unwrap().len(), 1);
    }
}
