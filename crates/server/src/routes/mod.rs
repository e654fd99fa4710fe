//! HTTP route handlers for the trolley server.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health            - Liveness check
//! GET    /health/ready      - Readiness check (cart bootstrap completed)
//!
//! # Cart (JSON)
//! GET    /cart              - Current cart snapshot
//! DELETE /cart              - Clear the cart
//! GET    /cart/total        - Item count and total price
//! POST   /cart/items        - Add an item
//! PATCH  /cart/items/{ref}  - Update quantity and/or notes
//! DELETE /cart/items/{ref}  - Remove an item
//! ```
//!
//! `{ref}` accepts either a client reference (UUID) or a server-assigned
//! identifier; the cart resolves whichever it is handed.

pub mod cart;

use axum::Router;

use crate::state::AppState;

/// Create all routes for the trolley server.
pub fn routes() -> Router<AppState> {
    Router::new().nest("/cart", cart::routes())
}
