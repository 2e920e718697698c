//! Order capture and count endpoints.

use crate::WebResult;
use crate::error::AppError;
use crate::state::AppState;
use axum::{Json, extract::State, extract::rejection::JsonRejection};
use capture_order_core::order::NewOrder;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Body returned for a captured order.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    /// Identifier assigned at persist time
    pub order_id: String,
}

/// Body returned by the count endpoint.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderCount {
    /// Number of stored orders, as a decimal string
    pub order_count: String,
    /// Time of the query, RFC 3339
    pub timestamp: String,
}

/// Capture an order: persist it, then forward it to the broker.
///
/// The order is reported as captured once persisted, whether or not the
/// broker took it.
///
/// # Endpoint
///
/// ```text
/// POST /v1/order
/// {"emailAddress": "...", "product": "...", "total": 12.5}
/// ```
///
/// # Errors
///
/// - `400` for a malformed body
/// - `500` when the order could not be persisted
pub async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> WebResult<Json<CreatedOrder>> {
    let Json(new_order) = payload?;

    let order_id = state
        .ingestion
        .ingest(new_order)
        .await
        .map_err(AppError::order_not_added)?;

    tracing::info!(order_id = %order_id, "Order captured");
    Ok(Json(CreatedOrder {
        order_id: order_id.into_inner(),
    }))
}

/// Count stored orders.
///
/// # Endpoint
///
/// ```text
/// GET /v1/order
/// ```
///
/// # Errors
///
/// `500` when the store cannot be queried.
pub async fn order_count(State(state): State<AppState>) -> WebResult<Json<OrderCount>> {
    let count = state
        .ingestion
        .count_orders()
        .await
        .map_err(AppError::count_failed)?;

    Ok(Json(OrderCount {
        order_count: count.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}
