//! API server entry point.

use api::config::Config;
use common::{Money, Product, ProductId};
use store::{InMemoryStore, PostgresStore, ProductStore, Stores};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Seeds a demo user and a few products for local exploration.
async fn seed_demo_data<S: Stores>(state: &api::AppState<S>, store: &S) {
    let user = state
        .users
        .register("Demo User", "demo@example.com")
        .await
        .expect("failed to seed demo user");
    tracing::info!(user_id = %user.id, "seeded demo user");

    for (id, name, price_cents, stock) in [
        ("product-keyboard", "Mechanical Keyboard", 12_900_i64, 25_u32),
        ("product-mouse", "Wireless Mouse", 4_900, 40),
        ("product-monitor", "27\" Monitor", 32_900, 10),
    ] {
        store
            .insert_product(Product::new(
                ProductId::new(id),
                name,
                Money::from_cents(price_cents),
                stock,
            ))
            .await
            .expect("failed to seed demo product");
    }
    tracing::info!("seeded demo catalog");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Build the application over the configured store
    let app = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            tracing::info!("serving from PostgreSQL");
            let state = api::create_default_state(store);
            api::create_app(state, metrics_handle)
        }
        None => {
            let store = InMemoryStore::new();
            let state = api::create_default_state(store.clone());
            seed_demo_data(&state, &store).await;
            tracing::info!("serving from the in-memory store");
            api::create_app(state, metrics_handle)
        }
    };

    // 4. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
