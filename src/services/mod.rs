// Core services
pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod inventory;
pub mod orders;
pub mod payments;

// Re-export services for convenience
pub use carts::{AddItemInput, CartItemView, CartService, CartView, ReorderOutcome};
pub use catalog::{CreateProductInput, CreateVariantInput, ProductCatalogService};
pub use checkout::{
    CheckoutCartInput, CheckoutService, CreateOrderInput, OrderConfirmation, OrderItemInput,
    PaymentInfoInput,
};
pub use inventory::InventoryService;
pub use orders::{
    OrderDetail, OrderService, OrderTracking, UpdateOrderInput, UpdateOrderStatusInput,
};
pub use payments::{PaymentService, RefundInput, TransactionView};
