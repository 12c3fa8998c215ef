pub use sea_orm_migration::prelude::*;

mod m20250610_000001_create_products_table;
mod m20250610_000002_create_product_variants_table;
mod m20250610_000003_create_carts_table;
mod m20250610_000004_create_cart_items_table;
mod m20250610_000005_create_orders_table;
mod m20250610_000006_create_order_items_table;
mod m20250610_000007_create_transactions_table;
mod m20250610_000008_create_order_status_history_table;
mod m20250610_000009_create_delivery_events_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250610_000001_create_products_table::Migration),
            Box::new(m20250610_000002_create_product_variants_table::Migration),
            Box::new(m20250610_000003_create_carts_table::Migration),
            Box::new(m20250610_000004_create_cart_items_table::Migration),
            Box::new(m20250610_000005_create_orders_table::Migration),
            Box::new(m20250610_000006_create_order_items_table::Migration),
            Box::new(m20250610_000007_create_transactions_table::Migration),
            Box::new(m20250610_000008_create_order_status_history_table::Migration),
            Box::new(m20250610_000009_create_delivery_events_table::Migration),
        ]
    }
}
