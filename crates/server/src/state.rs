//! Application state shared across handlers.

use std::sync::Arc;

use trolley_engine::CartService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; every handler sees the same cart service.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cart: CartService,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(cart: CartService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { cart }),
        }
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }
}
