//! Caller-facing cart errors.
//!
//! These are the only errors a mutation entry point can return. Remote and
//! cache failures never appear here: the engine absorbs them and degrades the
//! affected item instead (see the engine crate). There is deliberately no
//! fatal variant - losing every backend still leaves a working in-memory
//! cart.

use thiserror::Error;

use crate::types::CartRef;

/// Errors returned from cart mutation entry points.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// The referenced item is not in the cart. Non-fatal: callers may treat
    /// the mutation as a no-op.
    #[error("cart item not found: {0}")]
    ItemNotFound(CartRef),

    /// A zero quantity was passed to an add. An add of nothing cannot
    /// degrade to a removal, so it is rejected outright. (An explicit
    /// quantity update to zero is the removal path, not an error.)
    #[error("quantity must be at least 1")]
    InvalidQuantity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServerId;

    #[test]
    fn test_cart_error_display() {
        let err = CartError::ItemNotFound(CartRef::from(ServerId::new("42")));
        assert_eq!(err.to_string(), "cart item not found: 42");

        let err = CartError::InvalidQuantity;
        assert_eq!(err.to_string(), "quantity must be at least 1");
    }
}
