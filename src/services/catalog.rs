use crate::{
    entities::{product, product_variant, Product, ProductModel, ProductVariant},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

/// Product catalog service for managing products and variants
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Create a new product
    ///
    /// When no SKU is supplied one is generated in the `PRD-XXXXXXXX` form.
    /// A supplied SKU must not collide with an existing product.
    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        input.validate()?;

        let sku = match input.sku {
            Some(sku) => {
                self.ensure_unique_sku(&sku).await?;
                sku
            }
            None => format!("PRD-{}", short_hex(8)),
        };

        let product_id = Uuid::new_v4();
        let now = Utc::now();

        let product = product::ActiveModel {
            id: Set(product_id),
            name: Set(input.name),
            description: Set(input.description),
            sku: Set(sku),
            price: Set(input.price),
            compare_price: Set(input.compare_price),
            cost_price: Set(input.cost_price),
            currency: Set(input
                .currency
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())),
            quantity: Set(input.quantity.unwrap_or(0)),
            track_quantity: Set(input.track_quantity.unwrap_or(true)),
            low_stock_threshold: Set(input
                .low_stock_threshold
                .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD)),
            is_active: Set(input.is_active.unwrap_or(true)),
            featured: Set(input.featured.unwrap_or(false)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let product = product.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;

        info!("Created product {} with SKU {}", product_id, product.sku);
        Ok(product)
    }

    /// Get a product by ID
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Create a variant for a product
    ///
    /// Variant SKUs extend the parent SKU with a short suffix when not supplied.
    #[instrument(skip(self))]
    pub async fn create_variant(
        &self,
        product_id: Uuid,
        input: CreateVariantInput,
    ) -> Result<product_variant::Model, ServiceError> {
        input.validate()?;

        let product = self.get_product(product_id).await?;

        let sku = input
            .sku
            .unwrap_or_else(|| format!("{}-{}", product.sku, short_hex(4)));

        let variant_id = Uuid::new_v4();
        let now = Utc::now();

        let variant = product_variant::ActiveModel {
            id: Set(variant_id),
            product_id: Set(product_id),
            name: Set(input.name),
            sku: Set(sku),
            price: Set(input.price),
            quantity: Set(input.quantity.unwrap_or(0)),
            position: Set(input.position.unwrap_or(0)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let variant = variant.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::VariantCreated {
                product_id,
                variant_id,
            })
            .await;

        info!("Created variant {} for product {}", variant_id, product_id);
        Ok(variant)
    }

    /// Get all variants of a product ordered by position
    #[instrument(skip(self))]
    pub async fn get_product_variants(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<product_variant::Model>, ServiceError> {
        ProductVariant::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .order_by_asc(product_variant::Column::Position)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    async fn ensure_unique_sku(&self, sku: &str) -> Result<(), ServiceError> {
        let existing = Product::find()
            .filter(product::Column::Sku.eq(sku))
            .one(&*self.db)
            .await?;

        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A product with SKU {} already exists",
                sku
            )));
        }
        Ok(())
    }
}

/// Uppercase hex fragment used for generated SKUs
fn short_hex(len: usize) -> String {
    Uuid::new_v4().simple().to_string()[..len].to_uppercase()
}

fn validate_decimal_min_zero(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("decimal_min_zero"));
    }
    Ok(())
}

/// Input for creating a product
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub sku: Option<String>,
    #[validate(custom = "validate_decimal_min_zero")]
    pub price: Decimal,
    #[validate(custom = "validate_decimal_min_zero")]
    pub compare_price: Option<Decimal>,
    #[validate(custom = "validate_decimal_min_zero")]
    pub cost_price: Option<Decimal>,
    #[validate(length(min = 3, max = 3))]
    pub currency: Option<String>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    pub track_quantity: Option<bool>,
    #[validate(range(min = 0))]
    pub low_stock_threshold: Option<i32>,
    pub is_active: Option<bool>,
    pub featured: Option<bool>,
}

/// Input for creating a product variant
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateVariantInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub sku: Option<String>,
    #[validate(custom = "validate_decimal_min_zero")]
    pub price: Option<Decimal>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    pub position: Option<i32>,
}
