use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{ProductModel, ProductVariantModel},
    errors::ServiceError,
    handlers::{common::created_response, AppState},
    services::{CreateProductInput, CreateVariantInput},
    ApiResponse, ApiResult,
};

/// Catalog administration routes, nested under `/api/v1/products`
pub fn products_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_product))
        .route("/:id", get(get_product))
        .route("/:id/variants", post(create_variant))
}

/// A product together with its variants
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetail {
    pub product: ProductModel,
    pub variants: Vec<ProductVariantModel>,
}

/// Create a new product
#[utoipa::path(
    post,
    path = "/api/v1/products",
    summary = "Create product",
    description = "Create a catalog product; the SKU is generated when omitted",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created successfully", body = ApiResponse<ProductModel>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already in use", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateProductInput>,
) -> Result<(StatusCode, Json<ApiResponse<ProductModel>>), ServiceError> {
    let product = state.services.catalog.create_product(input).await?;
    Ok(created_response(product))
}

/// Get a product with its variants
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get product",
    description = "Get a product and its variants by product ID",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product retrieved successfully", body = ApiResponse<ProductDetail>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductDetail> {
    let product = state.services.catalog.get_product(id).await?;
    let variants = state.services.catalog.get_product_variants(id).await?;
    Ok(Json(ApiResponse::success(ProductDetail {
        product,
        variants,
    })))
}

/// Create a variant for a product
#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/variants",
    summary = "Create product variant",
    description = "Add a variant to an existing product; the variant SKU extends the parent SKU when omitted",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = CreateVariantInput,
    responses(
        (status = 201, description = "Variant created successfully", body = ApiResponse<ProductVariantModel>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_variant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(input): Json<CreateVariantInput>,
) -> Result<(StatusCode, Json<ApiResponse<ProductVariantModel>>), ServiceError> {
    let variant = state.services.catalog.create_variant(id, input).await?;
    Ok(created_response(variant))
}
