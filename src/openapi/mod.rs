use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront Commerce API

Cart, checkout, and order management for a small storefront.

## Features

- **Catalog**: Products with optional variants and per-variant pricing
- **Carts**: One active cart per customer with price snapshots on every line
- **Checkout**: Order creation from a cart or an explicit item list, with
  stock decrement and mock payment capture in one transaction
- **Orders**: Status lifecycle, tracking view, cancellation, and refunds

## Error Handling

Errors use a consistent response format with appropriate HTTP status codes:

```json
{
  "error": "Not Found",
  "message": "Order 550e8400-e29b-41d4-a716-446655440000 not found",
  "timestamp": "2025-06-10T10:30:00.000Z"
}
```

## Pagination

List endpoints accept the following query parameters:
- `page`: 1-based page number (default: 1)
- `per_page`: Items per page (default and ceiling are configurable)
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "products", description = "Catalog administration endpoints"),
        (name = "carts", description = "Cart management endpoints"),
        (name = "checkout", description = "Order creation endpoints"),
        (name = "orders", description = "Order lifecycle and tracking endpoints")
    ),
    paths(
        // Products
        crate::handlers::products::create_product,
        crate::handlers::products::get_product,
        crate::handlers::products::create_variant,

        // Carts
        crate::handlers::carts::create_cart,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::clear_cart,
        crate::handlers::carts::reorder,

        // Checkout
        crate::handlers::checkout::create_order,
        crate::handlers::checkout::checkout_cart,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::get_order_items,
        crate::handlers::orders::get_order_tracking,
        crate::handlers::orders::update_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::refund_order,

        // Status and health intentionally omitted from OpenAPI paths
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::handlers::common::PaginatedResponse<serde_json::Value>,

            // Catalog types
            crate::services::catalog::CreateProductInput,
            crate::services::catalog::CreateVariantInput,
            crate::handlers::products::ProductDetail,
            crate::entities::product::Model,
            crate::entities::product_variant::Model,

            // Cart types
            crate::handlers::carts::CreateCartRequest,
            crate::handlers::carts::UpdateItemRequest,
            crate::handlers::carts::ReorderRequest,
            crate::services::carts::AddItemInput,
            crate::services::carts::CartView,
            crate::services::carts::CartItemView,
            crate::services::carts::ReorderOutcome,
            crate::services::carts::SkippedLine,

            // Checkout types
            crate::services::checkout::CreateOrderInput,
            crate::services::checkout::CheckoutCartInput,
            crate::services::checkout::OrderItemInput,
            crate::services::checkout::PaymentInfoInput,
            crate::services::checkout::OrderConfirmation,

            // Order types
            crate::entities::order::Model,
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentStatus,
            crate::entities::order::ShippingMethod,
            crate::entities::order_item::Model,
            crate::entities::order_status_history::Model,
            crate::entities::delivery_event::Model,
            crate::entities::delivery_event::DeliveryEventType,
            crate::handlers::orders::CancelOrderRequest,
            crate::services::orders::UpdateOrderInput,
            crate::services::orders::UpdateOrderStatusInput,
            crate::services::orders::OrderDetail,
            crate::services::orders::OrderTracking,

            // Payment types
            crate::entities::transaction::Model,
            crate::entities::transaction::PaymentMethod,
            crate::entities::transaction::TransactionStatus,
            crate::entities::transaction::TransactionType,
            crate::services::payments::RefundInput,
            crate::services::payments::TransactionView,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
