//! Item lookup across the dual identifier scheme.
//!
//! Every cart item answers to its session-local client reference, and - once
//! the remote store has confirmed it - to its server identifier as well.
//! Consumers address items by whichever identifier they hold; these lookups
//! accept either, via [`CartItem::matches`], so the two schemes can never
//! disagree about whether an item exists.
//!
//! Carts are small (a session's worth of lines), so a linear scan is the
//! right data structure.

use trolley_core::{CartItem, CartRef};

/// Find the item `item_ref` points at.
#[must_use]
pub fn resolve<'a>(items: &'a [CartItem], item_ref: &CartRef) -> Option<&'a CartItem> {
    items.iter().find(|item| item.matches(item_ref))
}

/// Find the item `item_ref` points at, mutably.
#[must_use]
pub fn resolve_mut<'a>(items: &'a mut [CartItem], item_ref: &CartRef) -> Option<&'a mut CartItem> {
    items.iter_mut().find(|item| item.matches(item_ref))
}

/// Index of the item `item_ref` points at.
#[must_use]
pub fn position(items: &[CartItem], item_ref: &CartRef) -> Option<usize> {
    items.iter().position(|item| item.matches(item_ref))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use trolley_core::{ProductId, ProductInfo, ServerId};

    fn items() -> Vec<CartItem> {
        let mut first = CartItem::new(
            ProductInfo {
                product_id: ProductId::new(1),
                name: "Espresso Beans".to_string(),
                image: "/images/espresso.jpg".to_string(),
                price: Decimal::new(1250, 2),
            },
            2,
            None,
        );
        first.server_id = Some(ServerId::new("srv-1"));

        let second = CartItem::new(
            ProductInfo {
                product_id: ProductId::new(2),
                name: "Filter Paper".to_string(),
                image: "/images/filter.jpg".to_string(),
                price: Decimal::new(250, 2),
            },
            1,
            None,
        );

        vec![first, second]
    }

    #[test]
    fn test_resolves_by_client_ref() {
        let items = items();
        let target = CartRef::Client(items[1].client_ref.clone());

        let found = resolve(&items, &target).unwrap();
        assert_eq!(found.product_id, ProductId::new(2));
        assert_eq!(position(&items, &target), Some(1));
    }

    #[test]
    fn test_resolves_by_server_id() {
        let items = items();
        let target = CartRef::Server(ServerId::new("srv-1"));

        let found = resolve(&items, &target).unwrap();
        assert_eq!(found.product_id, ProductId::new(1));
        assert_eq!(position(&items, &target), Some(0));
    }

    #[test]
    fn test_unknown_ref_resolves_to_none() {
        let items = items();
        let target = CartRef::Server(ServerId::new("srv-404"));

        assert!(resolve(&items, &target).is_none());
        assert!(position(&items, &target).is_none());
    }

    #[test]
    fn test_resolve_mut_edits_the_right_item() {
        let mut items = items();
        let target = CartRef::Client(items[1].client_ref.clone());

        resolve_mut(&mut items, &target).unwrap().quantity = 9;

        assert_eq!(items[1].quantity, 9);
        assert_eq!(items[0].quantity, 2);
    }
}
