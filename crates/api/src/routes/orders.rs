//! Checkout and order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::CheckoutRequest;
use common::{Order, OrderId, OrderStatus, UserId};
use domain::OrderUpdate;
use serde::{Deserialize, Serialize};
use store::Stores;

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            status: order.status.to_string(),
            total_cents: order.total.cents(),
            shipping_address: order.shipping_address,
            notes: order.notes,
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    id: item.id.to_string(),
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name,
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    subtotal_cents: item.subtotal.cents(),
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// POST /orders — check out the user's cart into a new pending order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Stores>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .checkout
        .checkout(
            &UserId::new(req.user_id),
            CheckoutRequest {
                shipping_address: req.shipping_address,
                notes: req.notes,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders — list all orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Stores>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list().await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /orders/:id — load an order by id.
#[tracing::instrument(skip(state))]
pub async fn get<S: Stores>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.get(&OrderId::new(id)).await?;
    Ok(Json(order.into()))
}

/// GET /orders/user/:user_id — list a user's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_by_user<S: Stores>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_by_user(&UserId::new(user_id)).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// PATCH /orders/:id — update an order's status, address, or notes.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Stores>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let status = req
        .status
        .as_deref()
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let order = state
        .orders
        .update(
            &OrderId::new(id),
            OrderUpdate {
                status,
                shipping_address: req.shipping_address,
                notes: req.notes,
            },
        )
        .await?;
    Ok(Json(order.into()))
}

/// DELETE /orders/:id — cancel a pending order, restoring stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Stores>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.orders.cancel(&OrderId::new(id)).await?;
    Ok(Json(order.into()))
}
