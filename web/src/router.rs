//! Router composition.

use crate::handlers::{health, orders};
use crate::state::AppState;
use axum::{
    Router,
    http::{Method, header},
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the service router.
///
/// # Routes
///
/// - `POST /v1/order` - Capture an order
/// - `GET /v1/order` - Count stored orders
/// - `GET /healthz` - Liveness
/// - `GET /metrics` - Prometheus scrape output
///
/// Every route allows cross-origin calls from any origin.
///
/// # Example
///
/// ```rust,ignore
/// let app = router(AppState::new(ingestion));
/// axum::serve(listener, app).await?;
/// ```
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/order", get(orders::order_count).post(orders::create_order))
        .route("/healthz", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer()),
        )
        .with_state(state)
}

/// Permissive CORS.
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::AUTHORIZATION,
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
        ])
        .expose_headers([header::CONTENT_LENGTH, header::ACCESS_CONTROL_ALLOW_ORIGIN])
}
