//! HTTP API server with observability for the retail backend.
//!
//! Provides REST endpoints for carts, checkout, and order management,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post};
use checkout::CheckoutOrchestrator;
use common::{IdGenerator, RandomIds};
use domain::{CartService, OrderService, UserDirectory};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Stores;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Stores> {
    pub users: UserDirectory<S>,
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
    pub checkout: CheckoutOrchestrator<S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Stores>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart/{user_id}", get(routes::cart::get::<S>))
        .route("/cart/{user_id}", delete(routes::cart::clear::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route("/cart/items/{item_id}", patch(routes::cart::update_item::<S>))
        .route("/cart/items/{item_id}", delete(routes::cart::remove_item::<S>))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}", patch(routes::orders::update::<S>))
        .route("/orders/{id}", delete(routes::orders::cancel::<S>))
        .route("/orders/user/{user_id}", get(routes::orders::list_by_user::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state over the given store.
pub fn create_default_state<S: Stores>(store: S) -> Arc<AppState<S>> {
    let ids: Arc<dyn IdGenerator> = Arc::new(RandomIds);

    Arc::new(AppState {
        users: UserDirectory::new(store.clone(), ids.clone()),
        carts: CartService::new(store.clone(), ids.clone()),
        orders: OrderService::new(store.clone()),
        checkout: CheckoutOrchestrator::new(store, ids),
    })
}
