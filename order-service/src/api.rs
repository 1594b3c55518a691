use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::assembler::{FullOrder, OrderAssembler};
use crate::checkout::{CartLine, CheckoutService};
use crate::error::ApiError;
use crate::store::OrderStore;
use shared::*;

#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<CheckoutService>,
    pub assembler: OrderAssembler,
    pub store: Arc<dyn OrderStore>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub customer: CustomerDetails,
    pub items: Vec<CheckoutItem>,
    /// Client-side grand total. Logged when it disagrees with the computed
    /// total, never stored.
    #[serde(default)]
    pub total_price: Option<f64>,
}

/// Cart lines arrive with the client's display fields attached; only the id,
/// price and quantity participate in checkout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub id: Uuid,
    pub price: f64,
    pub quantity: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub order_number: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResendRequest {
    /// Alternate recipient for this dispatch only.
    #[serde(default)]
    pub customer: Option<CustomerDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub status: String,
    #[serde(default)]
    pub payment_reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdateResponse {
    pub success: bool,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_status))
        .route("/orders/:id/resend", post(resend_notification))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let items: Vec<CartLine> = request
        .items
        .into_iter()
        .map(|item| CartLine {
            product_id: item.id,
            price: item.price,
            quantity: item.quantity,
        })
        .collect();

    let receipt = state
        .checkout
        .checkout(request.customer, items, request.total_price)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            success: true,
            order_number: receipt.order_number,
        }),
    ))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<FullOrder>, ApiError> {
    Ok(Json(state.assembler.hydrate(order_id).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<StatusUpdateResponse>, ApiError> {
    let status = OrderStatus::from_str(&request.status).map_err(ApiError::Validation)?;
    state
        .store
        .update_status(order_id, status, request.payment_reference)
        .await?;
    Ok(Json(StatusUpdateResponse { success: true }))
}

pub async fn resend_notification(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    body: Option<Json<ResendRequest>>,
) -> Result<Json<NotificationResult>, ApiError> {
    let recipient_override = body.and_then(|Json(request)| request.customer);
    let result = state.checkout.resend(order_id, recipient_override).await?;
    Ok(Json(result))
}

pub async fn health_check() -> &'static str {
    "OK"
}
