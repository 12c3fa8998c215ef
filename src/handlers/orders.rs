use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    entities::{OrderItemModel, OrderModel},
    handlers::{
        common::{PaginatedResponse, PaginationParams},
        AppState,
    },
    services::{
        OrderDetail, OrderTracking, RefundInput, TransactionView, UpdateOrderInput,
        UpdateOrderStatusInput,
    },
    ApiResponse, ApiResult,
};

/// Order routes, nested under `/api/v1/orders`
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order).put(update_order))
        .route("/by-number/:order_number", get(get_order_by_number))
        .route("/:id/items", get(get_order_items))
        .route("/:id/tracking", get(get_order_tracking))
        .route("/:id/status", put(update_order_status))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/refund", post(refund_order))
}

/// Optional filters for the order listing
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct OrderListFilter {
    /// Limit results to one customer
    pub customer_id: Option<Uuid>,
}

/// List orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Get a page of orders, newest first, optionally scoped to one customer",
    params(OrderListFilter, PaginationParams),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<PaginatedResponse<OrderModel>>),
    )
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<OrderListFilter>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<OrderModel>> {
    let (page, per_page) = pagination.resolve(&state.config);
    let (orders, total) = state
        .services
        .orders
        .list_orders(filter.customer_id, page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        orders, page, per_page, total,
    ))))
}

/// Get order detail
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    description = "Get an order with its items and payment transactions",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderDetail>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderDetail> {
    let detail = state.services.orders.get_order_detail(id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Get order detail by public order number
#[utoipa::path(
    get,
    path = "/api/v1/orders/by-number/{order_number}",
    summary = "Get order by number",
    description = "Retrieve an order by its public order number (e.g. ORD-1A2B3C4D)",
    params(("order_number" = String, Path, description = "Public order number")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderDetail>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_order_by_number(
    State(state): State<Arc<AppState>>,
    Path(order_number): Path<String>,
) -> ApiResult<OrderDetail> {
    let detail = state
        .services
        .orders
        .get_order_detail_by_number(&order_number)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// List an order's items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/items",
    summary = "Get order items",
    description = "List the order's line items with frozen prices",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Items retrieved successfully", body = ApiResponse<Vec<OrderItemModel>>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_order_items(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<OrderItemModel>> {
    let items = state.services.orders.get_order_items(id).await?;
    Ok(Json(ApiResponse::success(items)))
}

/// Get the tracking view for an order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/tracking",
    summary = "Track order",
    description = "Shipment fields plus status history and delivery events in chronological order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Tracking view retrieved successfully", body = ApiResponse<OrderTracking>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_order_tracking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderTracking> {
    let tracking = state.services.orders.get_tracking(id).await?;
    Ok(Json(ApiResponse::success(tracking)))
}

/// Administrative order update
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    summary = "Update order",
    description = "Update shipment fields and optionally advance the status; moving to shipped or delivered stamps timestamps",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderInput,
    responses(
        (status = 200, description = "Order updated successfully", body = ApiResponse<OrderModel>),
        (status = 400, description = "Invalid status transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateOrderInput>,
) -> ApiResult<OrderModel> {
    let order = state.services.orders.update_order(id, input).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Advance an order's status
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    description = "Move the order one step along pending → confirmed → processing → shipped → delivered",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusInput,
    responses(
        (status = 200, description = "Status updated successfully", body = ApiResponse<OrderModel>),
        (status = 400, description = "Invalid status transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateOrderStatusInput>,
) -> ApiResult<OrderModel> {
    let order = state.services.orders.update_order_status(id, input).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Request body for cancelling an order
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

/// Cancel an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    summary = "Cancel order",
    description = "Cancel a pending or confirmed order; later states are refused",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderModel>),
        (status = 400, description = "Order can no longer be cancelled", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelOrderRequest>>,
) -> ApiResult<OrderModel> {
    let reason = body.and_then(|Json(b)| b.reason);
    let order = state.services.orders.cancel_order(id, reason).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Refund an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/refund",
    summary = "Refund order",
    description = "Refund a shipped or delivered order through the mock gateway; omitting the amount refunds the full total",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = RefundInput,
    responses(
        (status = 200, description = "Refund recorded", body = ApiResponse<TransactionView>),
        (status = 400, description = "Order not refundable or amount invalid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn refund_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Option<Json<RefundInput>>,
) -> ApiResult<TransactionView> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let refund = state.services.payments.refund_order(id, input).await?;
    Ok(Json(ApiResponse::success(TransactionView::from(refund))))
}
