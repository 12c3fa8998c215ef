pub mod carts;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod products;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{
    CartService, CheckoutService, InventoryService, OrderService, PaymentService,
    ProductCatalogService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<ProductCatalogService>,
    pub carts: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub inventory: Arc<InventoryService>,
}

impl AppServices {
    /// Wires every service onto the shared connection, event channel, and config.
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender, config: AppConfig) -> Self {
        let event_sender = Arc::new(event_sender);
        let config = Arc::new(config);

        let inventory = Arc::new(InventoryService::new());
        let payments = Arc::new(PaymentService::new(db.clone(), event_sender.clone()));
        let catalog = Arc::new(ProductCatalogService::new(db.clone(), event_sender.clone()));
        let carts = Arc::new(CartService::new(
            db.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let checkout = Arc::new(CheckoutService::new(
            db.clone(),
            event_sender.clone(),
            config.clone(),
            inventory.clone(),
            payments.clone(),
        ));
        let orders = Arc::new(OrderService::new(db, event_sender));

        Self {
            catalog,
            carts,
            checkout,
            orders,
            payments,
            inventory,
        }
    }
}
