/// Database entities for the storefront domain
pub mod cart;
pub mod cart_item;
pub mod delivery_event;
pub mod order;
pub mod order_item;
pub mod order_status_history;
pub mod product;
pub mod product_variant;
pub mod transaction;

// Re-export entities
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use delivery_event::{DeliveryEventType, Entity as DeliveryEvent, Model as DeliveryEventModel};
pub use order::{Entity as Order, Model as OrderModel, OrderStatus, PaymentStatus, ShippingMethod};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use order_status_history::{Entity as OrderStatusHistory, Model as OrderStatusHistoryModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use product_variant::{Entity as ProductVariant, Model as ProductVariantModel};
pub use transaction::{
    Entity as Transaction, Model as TransactionModel, PaymentMethod, TransactionStatus,
    TransactionType,
};
