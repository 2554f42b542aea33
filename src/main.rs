use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trackitall::config::AppConfig;
use trackitall::domain::repositories::product_source::ProductSource;
use trackitall::domain::services::aggregator::SearchAggregator;
use trackitall::domain::value_objects::price::Price;
use trackitall::infrastructure::shopify_client::ShopifyClient;
use trackitall::persistence::repository::{AlertRepository, PriceLedger};
use trackitall::persistence::{init_database, DatabaseConfig, DbPool};

/// Shared state for all handlers
struct AppState {
    aggregator: SearchAggregator,
    ledger: PriceLedger,
    alerts: AlertRepository,
    pool: DbPool,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message})),
    )
}

fn internal_error(e: impl std::fmt::Display) -> ApiError {
    error!("Request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": e.to_string()})),
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackitall=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    info!(
        "TrackItAll price tracker starting with {} stores",
        config.stores.len()
    );

    let pool = init_database(&DatabaseConfig::from_env()).await?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()?;

    let sources: Vec<Arc<dyn ProductSource>> = config
        .stores
        .iter()
        .map(|store| {
            info!("Configured store: {} ({})", store.name, store.url);
            Arc::new(ShopifyClient::new(store.clone(), http_client.clone()))
                as Arc<dyn ProductSource>
        })
        .collect();

    let state = Arc::new(AppState {
        aggregator: SearchAggregator::new(sources),
        ledger: PriceLedger::new(pool.clone()),
        alerts: AlertRepository::new(pool.clone()),
        pool,
    });

    let app = Router::new()
        .route("/", get(|| async { "TrackItAll price tracker is running!" }))
        .route("/health", get(health_check))
        .route("/search", get(search_products))
        .route("/track", post(track_product))
        .route("/history", get(get_history))
        .route("/alerts", post(set_alert))
        .route("/alerts/check", get(check_alerts))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let database_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

    Json(serde_json::json!({
        "status": "running",
        "stores": state.aggregator.store_count(),
        "database": database_ok,
    }))
}

/// Search all configured stores, sorted by price ascending
///
/// Store failures never fail the request; they only reduce the result count.
/// Products already tracked are enriched with their price statistics.
async fn search_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let query = params
        .get("query")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("Please provide a search query."))?;

    let snapshots = state.aggregator.search(query).await;

    if snapshots.is_empty() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"message": "No products found."})),
        ));
    }

    let mut products = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        let mut item = serde_json::json!({
            "source": snapshot.source,
            "product_title": snapshot.title,
            "price": snapshot.price,
            "currency": snapshot.currency,
            "product_url": snapshot.product_url,
        });

        if let Some(product) = state
            .ledger
            .find_by_url(&snapshot.product_url)
            .await
            .map_err(internal_error)?
        {
            let stats = state.ledger.stats(product.id).await.map_err(internal_error)?;
            item["lowest_price"] = serde_json::json!(stats.lowest);
            item["highest_price"] = serde_json::json!(stats.highest);
            item["average_price"] = serde_json::json!(stats.average);
        }

        products.push(item);
    }

    Ok((StatusCode::OK, Json(serde_json::json!(products))))
}

/// Register a product for tracking and record one price observation
async fn track_product(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let product_url = payload["product_url"]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("Missing product_url field"))?;

    let product_title = payload["product_title"]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("Missing product_title field"))?;

    let price = payload["price"]
        .as_f64()
        .ok_or_else(|| bad_request("Missing or invalid price field"))?;
    let price = Price::new(price).map_err(|e| bad_request(&e))?;

    state
        .ledger
        .track(product_title, product_url, price.value())
        .await
        .map_err(internal_error)?;

    Ok(Json(serde_json::json!({
        "success": format!("Successfully tracked price for {}", product_title)
    })))
}

/// Price history for one product, oldest observation first
async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let product_url = params
        .get("product_url")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("Product URL is required."))?;

    let history = state.ledger.history(product_url).await.map_err(internal_error)?;

    Ok(Json(serde_json::json!(history)))
}

/// Register a target price alert for an already-tracked product
async fn set_alert(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let product_url = payload["product_url"]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| bad_request("Missing product_url field"))?;

    let target_price = payload["target_price"]
        .as_f64()
        .ok_or_else(|| bad_request("Missing or invalid target_price field"))?;
    let target_price = Price::new(target_price).map_err(|e| bad_request(&e))?;

    let product = state
        .ledger
        .find_by_url(product_url)
        .await
        .map_err(internal_error)?
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Product not tracked yet."})),
        ))?;

    state
        .alerts
        .create(product.id, target_price.value())
        .await
        .map_err(internal_error)?;

    Ok(Json(serde_json::json!({
        "success": format!(
            "Alert set for {} at target price of {}",
            product.title,
            target_price.value()
        )
    })))
}

/// Evaluate all alerts against the latest observed prices
async fn check_alerts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let triggered = state.alerts.check_alerts().await.map_err(internal_error)?;
    Ok(Json(serde_json::json!(triggered)))
}
