//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Cart, CartItemId, ProductId, UserId};
use serde::{Deserialize, Serialize};
use store::Stores;

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub user_id: String,
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub id: String,
    pub user_id: String,
    pub items: Vec<CartItemResponse>,
    pub total_cents: i64,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            id: cart.id.to_string(),
            user_id: cart.user_id.to_string(),
            total_cents: cart.total.cents(),
            items: cart
                .items
                .into_iter()
                .map(|item| CartItemResponse {
                    id: item.id.to_string(),
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    subtotal_cents: item.subtotal.cents(),
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// GET /cart/:user_id — return the user's cart, creating it on first access.
#[tracing::instrument(skip(state))]
pub async fn get<S: Stores>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get_or_create(&UserId::new(user_id)).await?;
    Ok(Json(cart.into()))
}

/// POST /cart/items — add a quantity of a product to the user's cart.
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: Stores>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartResponse>), ApiError> {
    if req.quantity == 0 {
        return Err(ApiError::BadRequest("quantity must be at least 1".to_string()));
    }

    let cart = state
        .carts
        .add_item(
            &UserId::new(req.user_id),
            &ProductId::new(req.product_id),
            req.quantity,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(cart.into())))
}

/// PATCH /cart/items/:item_id — set the quantity of an existing line.
#[tracing::instrument(skip(state, req))]
pub async fn update_item<S: Stores>(
    State(state): State<Arc<AppState<S>>>,
    Path(item_id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    if req.quantity == 0 {
        return Err(ApiError::BadRequest("quantity must be at least 1".to_string()));
    }

    let cart = state
        .carts
        .update_item(&CartItemId::new(item_id), req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart/items/:item_id — remove a line from its cart.
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Stores>(
    State(state): State<Arc<AppState<S>>>,
    Path(item_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.remove_item(&CartItemId::new(item_id)).await?;
    Ok(Json(cart.into()))
}

/// DELETE /cart/:user_id — empty the user's cart.
#[tracing::instrument(skip(state))]
pub async fn clear<S: Stores>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.clear(&UserId::new(user_id)).await?;
    Ok(Json(cart.into()))
}
