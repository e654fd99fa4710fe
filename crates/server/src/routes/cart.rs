//! Cart route handlers.
//!
//! Every mutation responds from in-memory state as soon as the engine has
//! applied it; remote propagation happens behind the response. Clients can
//! read each item's `syncState` to render pending/failed indicators, but no
//! remote outcome ever changes a status code here.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Router;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use trolley_core::{CartItem, CartRef, ProductId, ProductInfo};
use trolley_engine::CartSnapshot;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the cart routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(show).delete(clear))
        .route("/total", get(total))
        .route("/items", post(add_item))
        .route("/items/{item_ref}", patch(update_item).delete(remove_item))
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub price: Decimal,
    /// Defaults to 1 when omitted.
    pub quantity: Option<u32>,
    pub notes: Option<String>,
}

/// Item update request body. At least one field must be present.
///
/// An empty-string `notes` clears the annotation; an omitted (or null)
/// `notes` leaves it untouched.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub quantity: Option<u32>,
    pub notes: Option<String>,
}

/// Full cart view returned by reads and item updates.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub items: Vec<CartItem>,
    pub item_count: u64,
    pub total: Decimal,
    pub is_ready: bool,
}

impl From<CartSnapshot> for CartResponse {
    fn from(snapshot: CartSnapshot) -> Self {
        Self {
            item_count: snapshot.item_count(),
            total: snapshot.total(),
            is_ready: snapshot.is_ready,
            items: snapshot.items,
        }
    }
}

/// Totals-only view for `GET /cart/total`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalResponse {
    pub item_count: u64,
    pub total: Decimal,
}

// =============================================================================
// Handlers
// =============================================================================

/// Current cart snapshot.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>) -> Json<CartResponse> {
    Json(state.cart().snapshot().into())
}

/// Item count and total price, recomputed from the current cart.
#[instrument(skip(state))]
pub async fn total(State(state): State<AppState>) -> Json<TotalResponse> {
    Json(TotalResponse {
        item_count: state.cart().item_count(),
        total: state.cart().total(),
    })
}

/// Add an item (or merge quantity into an existing line for the same
/// product). Returns the affected line as `201 Created`.
#[instrument(skip(state, request), fields(product_id = %request.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    Json(request): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartItem>)> {
    if request.price.is_sign_negative() {
        return Err(AppError::BadRequest("price must not be negative".to_string()));
    }

    let product = ProductInfo {
        product_id: request.product_id,
        name: request.name,
        image: request.image,
        price: request.price,
    };
    let quantity = request.quantity.unwrap_or(1);

    let item = state.cart().add_item(product, quantity, request.notes)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Update the quantity and/or notes of one item. Returns the full cart, so
/// clients see merged totals without a second round trip.
#[instrument(skip(state, request), fields(item_ref = %item_ref))]
pub async fn update_item(
    State(state): State<AppState>,
    Path(item_ref): Path<String>,
    Json(request): Json<UpdateItemRequest>,
) -> Result<Json<CartResponse>> {
    if request.quantity.is_none() && request.notes.is_none() {
        return Err(AppError::BadRequest(
            "nothing to update: provide quantity and/or notes".to_string(),
        ));
    }

    let item_ref = CartRef::parse(&item_ref);

    // Notes first: a quantity of zero removes the item.
    if let Some(notes) = request.notes {
        let notes = if notes.is_empty() { None } else { Some(notes) };
        state.cart().set_notes(&item_ref, notes)?;
    }
    if let Some(quantity) = request.quantity {
        state.cart().set_quantity(&item_ref, quantity)?;
    }

    Ok(Json(state.cart().snapshot().into()))
}

/// Remove one item.
#[instrument(skip(state), fields(item_ref = %item_ref))]
pub async fn remove_item(
    State(state): State<AppState>,
    Path(item_ref): Path<String>,
) -> Result<StatusCode> {
    let item_ref = CartRef::parse(&item_ref);
    state.cart().remove_item(&item_ref)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Empty the cart.
#[instrument(skip(state))]
pub async fn clear(State(state): State<AppState>) -> StatusCode {
    state.cart().clear();
    StatusCode::NO_CONTENT
}
