use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    handlers::AppState,
    services::{AddItemInput, CartView, ReorderOutcome},
    ApiResponse, ApiResult,
};

/// Cart routes, nested under `/api/v1/carts`
pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_cart))
        .route("/:id", get(get_cart))
        .route("/:id/items", post(add_item))
        .route("/:id/items/:item_id", put(update_item).delete(remove_item))
        .route("/:id/clear", post(clear_cart))
        .route("/:id/reorder", post(reorder))
}

/// Get or create the active cart for a customer
#[utoipa::path(
    post,
    path = "/api/v1/carts",
    summary = "Get or create cart",
    description = "Return the customer's cart, creating an empty one on first contact",
    request_body = CreateCartRequest,
    responses(
        (status = 200, description = "Cart retrieved or created", body = ApiResponse<CartView>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_cart(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateCartRequest>,
) -> ApiResult<CartView> {
    let cart = state
        .services
        .carts
        .get_or_create_cart(input.customer_id)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Get a cart snapshot
#[utoipa::path(
    get,
    path = "/api/v1/carts/{id}",
    summary = "Get cart",
    description = "Get a cart with line detail and current prices",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Cart retrieved successfully", body = ApiResponse<CartView>),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<CartView> {
    let cart = state.services.carts.get_cart(id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Add an item to a cart
#[utoipa::path(
    post,
    path = "/api/v1/carts/{id}/items",
    summary = "Add cart item",
    description = "Add a product (optionally a variant) to the cart; re-adding an existing line increments its quantity",
    params(("id" = Uuid, Path, description = "Cart ID")),
    request_body = AddItemInput,
    responses(
        (status = 200, description = "Item added, updated cart returned", body = ApiResponse<CartView>),
        (status = 400, description = "Invalid quantity or product", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    )
)]
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(input): Json<AddItemInput>,
) -> ApiResult<CartView> {
    let cart = state.services.carts.add_item(id, input).await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Change a cart line's quantity
#[utoipa::path(
    put,
    path = "/api/v1/carts/{id}/items/{item_id}",
    summary = "Update cart item",
    description = "Set a cart line to an absolute quantity",
    params(
        ("id" = Uuid, Path, description = "Cart ID"),
        ("item_id" = Uuid, Path, description = "Cart item ID"),
    ),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Quantity updated, cart returned", body = ApiResponse<CartView>),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart or item not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<UpdateItemRequest>,
) -> ApiResult<CartView> {
    let cart = state
        .services
        .carts
        .update_item_quantity(id, item_id, input.quantity)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Remove a cart line
#[utoipa::path(
    delete,
    path = "/api/v1/carts/{id}/items/{item_id}",
    summary = "Remove cart item",
    description = "Delete one line from the cart and return the updated snapshot",
    params(
        ("id" = Uuid, Path, description = "Cart ID"),
        ("item_id" = Uuid, Path, description = "Cart item ID"),
    ),
    responses(
        (status = 200, description = "Item removed, cart returned", body = ApiResponse<CartView>),
        (status = 404, description = "Cart or item not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<CartView> {
    let cart = state.services.carts.remove_item(id, item_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Empty a cart
#[utoipa::path(
    post,
    path = "/api/v1/carts/{id}/clear",
    summary = "Clear cart",
    description = "Remove every line from the cart",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Cart cleared", body = ApiResponse<CartView>),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<CartView> {
    let cart = state.services.carts.clear_cart(id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Rebuild a cart from a past order
#[utoipa::path(
    post,
    path = "/api/v1/carts/{id}/reorder",
    summary = "Reorder",
    description = "Re-add a past order's items to the cart at current prices; unavailable lines are skipped and reported",
    params(("id" = Uuid, Path, description = "Cart ID")),
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Reorder outcome with skipped lines", body = ApiResponse<ReorderOutcome>),
        (status = 404, description = "Cart or order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn reorder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(input): Json<ReorderRequest>,
) -> ApiResult<ReorderOutcome> {
    let outcome = state.services.carts.reorder(id, input.order_id).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Request body for cart creation
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCartRequest {
    pub customer_id: Uuid,
}

/// Request body for updating a cart line
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

/// Request body for reordering
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReorderRequest {
    pub order_id: Uuid,
}
