use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    handlers::{common::created_response, AppState},
    services::{CheckoutCartInput, CreateOrderInput, OrderConfirmation},
    ApiResponse,
};

/// Checkout routes, nested under `/api/v1/checkout`
pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/cart/:cart_id", post(checkout_cart))
}

/// Create an order from an explicit item list
#[utoipa::path(
    post,
    path = "/api/v1/checkout/orders",
    summary = "Create order",
    description = "Create an order from an explicit item list, charging the mock gateway when payment info is supplied",
    request_body = CreateOrderInput,
    responses(
        (status = 201, description = "Order created successfully", body = ApiResponse<OrderConfirmation>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product or variant not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateOrderInput>,
) -> Result<(StatusCode, Json<ApiResponse<OrderConfirmation>>), ServiceError> {
    let confirmation = state.services.checkout.create_order(input).await?;
    Ok(created_response(confirmation))
}

/// Convert a cart into an order
#[utoipa::path(
    post,
    path = "/api/v1/checkout/cart/{cart_id}",
    summary = "Checkout cart",
    description = "Create an order from the cart's lines at current prices, then clear the cart when configured to",
    params(("cart_id" = Uuid, Path, description = "Cart ID")),
    request_body = CheckoutCartInput,
    responses(
        (status = 201, description = "Order created successfully", body = ApiResponse<OrderConfirmation>),
        (status = 400, description = "Empty cart or invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    )
)]
pub async fn checkout_cart(
    State(state): State<Arc<AppState>>,
    Path(cart_id): Path<Uuid>,
    Json(input): Json<CheckoutCartInput>,
) -> Result<(StatusCode, Json<ApiResponse<OrderConfirmation>>), ServiceError> {
    let confirmation = state.services.checkout.checkout_cart(cart_id, input).await?;
    Ok(created_response(confirmation))
}
