use crate::{
    entities::{
        product, product_variant, Product, ProductModel, ProductVariant, ProductVariantModel,
    },
    errors::ServiceError,
};
use metrics::counter;
use sea_orm::{sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::{instrument, warn};

/// Stock ledger service
///
/// Stock lives on the variant when one is involved, otherwise on the product.
/// Products with `track_quantity` disabled sell without any stock accounting.
/// Every operation runs on the caller's connection so checks and decrements
/// stay inside the caller's transaction.
#[derive(Clone, Default)]
pub struct InventoryService;

impl InventoryService {
    pub fn new() -> Self {
        Self
    }

    /// Units currently available for sale, `None` when stock is untracked
    pub fn available_quantity(
        product: &ProductModel,
        variant: Option<&ProductVariantModel>,
    ) -> Option<i32> {
        if !product.track_quantity {
            return None;
        }
        Some(match variant {
            Some(v) => v.quantity,
            None => product.quantity,
        })
    }

    /// Fails with `InsufficientStock` when fewer than `requested` units remain
    pub fn ensure_available(
        product: &ProductModel,
        variant: Option<&ProductVariantModel>,
        requested: i32,
    ) -> Result<(), ServiceError> {
        match Self::available_quantity(product, variant) {
            Some(available) if available < requested => {
                Err(ServiceError::InsufficientStock(format!(
                    "Insufficient stock for {}: requested {}, available {}",
                    product.name, requested, available
                )))
            }
            _ => Ok(()),
        }
    }

    /// Atomically take `quantity` units of stock, or fail without taking any.
    ///
    /// Issues a single conditional UPDATE (`quantity = quantity - N` guarded by
    /// `quantity >= N`) so concurrent checkouts cannot oversell. Zero affected
    /// rows means another buyer got there first.
    #[instrument(skip(self, conn, product, variant), fields(product_id = %product.id))]
    pub async fn decrement_stock<C: ConnectionTrait>(
        &self,
        conn: &C,
        product: &ProductModel,
        variant: Option<&ProductVariantModel>,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        if !product.track_quantity {
            return Ok(());
        }

        let rows_affected = match variant {
            Some(variant) => {
                ProductVariant::update_many()
                    .col_expr(
                        product_variant::Column::Quantity,
                        Expr::col(product_variant::Column::Quantity).sub(quantity),
                    )
                    .filter(product_variant::Column::Id.eq(variant.id))
                    .filter(product_variant::Column::Quantity.gte(quantity))
                    .exec(conn)
                    .await?
                    .rows_affected
            }
            None => {
                Product::update_many()
                    .col_expr(
                        product::Column::Quantity,
                        Expr::col(product::Column::Quantity).sub(quantity),
                    )
                    .filter(product::Column::Id.eq(product.id))
                    .filter(product::Column::Quantity.gte(quantity))
                    .exec(conn)
                    .await?
                    .rows_affected
            }
        };

        if rows_affected == 0 {
            counter!("storefront_inventory.insufficient_stock", 1);
            return Err(ServiceError::InsufficientStock(format!(
                "Insufficient stock for {}: requested {}",
                product.name, quantity
            )));
        }

        self.warn_if_low(conn, product, variant).await?;
        Ok(())
    }

    /// Logs when remaining stock drops to or below the product's threshold
    async fn warn_if_low<C: ConnectionTrait>(
        &self,
        conn: &C,
        product: &ProductModel,
        variant: Option<&ProductVariantModel>,
    ) -> Result<(), ServiceError> {
        let remaining = match variant {
            Some(variant) => ProductVariant::find_by_id(variant.id)
                .one(conn)
                .await?
                .map(|v| v.quantity),
            None => Product::find_by_id(product.id)
                .one(conn)
                .await?
                .map(|p| p.quantity),
        };

        if let Some(remaining) = remaining {
            if remaining <= product.low_stock_threshold {
                warn!(
                    product_id = %product.id,
                    remaining,
                    threshold = product.low_stock_threshold,
                    "Low stock for {}",
                    product.name
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn product(quantity: i32, track_quantity: bool) -> ProductModel {
        ProductModel {
            id: Uuid::new_v4(),
            name: "Test Product".to_string(),
            description: None,
            sku: "PRD-TEST0001".to_string(),
            price: dec!(19.99),
            compare_price: None,
            cost_price: None,
            currency: "USD".to_string(),
            quantity,
            track_quantity,
            low_stock_threshold: 5,
            is_active: true,
            featured: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn variant(product_id: Uuid, quantity: i32) -> ProductVariantModel {
        ProductVariantModel {
            id: Uuid::new_v4(),
            product_id,
            name: "Large".to_string(),
            sku: "PRD-TEST0001-AB12".to_string(),
            price: Some(dec!(21.99)),
            quantity,
            position: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn untracked_products_report_no_quantity() {
        let p = product(0, false);
        assert_eq!(InventoryService::available_quantity(&p, None), None);
    }

    #[test]
    fn untracked_products_always_pass_availability() {
        let p = product(0, false);
        assert!(InventoryService::ensure_available(&p, None, 1_000).is_ok());
    }

    #[test]
    fn variant_quantity_wins_when_variant_present() {
        let p = product(100, true);
        let v = variant(p.id, 3);
        assert_eq!(InventoryService::available_quantity(&p, Some(&v)), Some(3));
    }

    #[test]
    fn exact_stock_level_is_sufficient() {
        let p = product(4, true);
        assert!(InventoryService::ensure_available(&p, None, 4).is_ok());
    }

    #[test]
    fn shortfall_reports_available_count() {
        let p = product(2, true);
        let err = InventoryService::ensure_available(&p, None, 5).unwrap_err();
        match err {
            ServiceError::InsufficientStock(msg) => {
                assert!(msg.contains("requested 5"));
                assert!(msg.contains("available 2"));
            }
            other => panic!("expected InsufficientStock, got {:?}", other),
        }
    }

    #[test]
    fn variant_shortfall_checks_variant_stock() {
        let p = product(100, true);
        let v = variant(p.id, 1);
        assert!(InventoryService::ensure_available(&p, Some(&v), 2).is_err());
    }
}
