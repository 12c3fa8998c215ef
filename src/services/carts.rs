use crate::{
    config::AppConfig,
    entities::{
        cart, cart_item, order_item, product, product_variant, Cart, CartItem, CartModel, Order,
        OrderItem, Product, ProductModel, ProductVariant, ProductVariantModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::InventoryService,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Minimum quantity a cart line may hold
pub const MIN_QUANTITY: i32 = 1;
/// Maximum quantity a cart line may hold
pub const MAX_QUANTITY: i32 = 99;

/// Shopping cart service for managing per-customer shopping carts.
///
/// The `CartService` provides the full cart lifecycle:
/// - Get-or-create semantics (at most one cart per customer)
/// - Adding, updating, and removing cart items with stock validation
/// - Price snapshotting at add time with change detection against the
///   current catalog price
/// - Rebuilding a cart from a previous order
///
/// Every mutating call enforces the 1..=99 quantity bounds and, for tracked
/// products, the available stock; violations fail the whole call without
/// committing anything.
///
/// # Examples
///
/// ```ignore
/// use storefront_api::services::{AddItemInput, CartService};
///
/// let cart_service = CartService::new(db, event_sender, config);
///
/// let cart = cart_service.get_or_create_cart(customer_id).await?;
/// let cart = cart_service
///     .add_item(
///         cart.id,
///         AddItemInput {
///             product_id,
///             variant_id: None,
///             quantity: 2,
///         },
///     )
///     .await?;
/// ```
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl CartService {
    /// Creates a new `CartService` instance.
    ///
    /// # Arguments
    ///
    /// * `db` - Database connection pool
    /// * `event_sender` - Event sender for publishing cart events
    /// * `config` - Application configuration (currency default)
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Returns the customer's cart, creating an empty one if none exists.
    ///
    /// `customer_id` is unique across carts, so repeated calls always land on
    /// the same row. A concurrent first call may win the insert; the loser
    /// falls back to the row the winner created.
    ///
    /// # Returns
    ///
    /// * `Ok(CartView)` - The cart snapshot, empty on first contact
    /// * `Err(ServiceError)` - Database error
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, customer_id: Uuid) -> Result<CartView, ServiceError> {
        if let Some(cart) = Cart::find()
            .filter(cart::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
        {
            return self.build_cart_view(&*self.db, cart).await;
        }

        let now = Utc::now();
        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let cart = match cart.insert(&*self.db).await {
            Ok(cart) => {
                self.event_sender
                    .send_or_log(Event::CartCreated(cart.id))
                    .await;
                info!("Created cart {} for customer {}", cart.id, customer_id);
                cart
            }
            // Unique customer_id: a concurrent request slipped in between the
            // lookup and the insert, so use the row it created.
            Err(insert_err) => Cart::find()
                .filter(cart::Column::CustomerId.eq(customer_id))
                .one(&*self.db)
                .await?
                .ok_or(ServiceError::DatabaseError(insert_err))?,
        };

        self.build_cart_view(&*self.db, cart).await
    }

    /// Returns the cart snapshot with per-line pricing detail.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, cart_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        self.build_cart_view(&*self.db, cart).await
    }

    /// Adds an item to the cart or increments the existing line.
    ///
    /// A cart holds at most one line per (product, variant) combination, so
    /// re-adding the same selection increments its quantity. The combined
    /// quantity must stay within the 1..=99 bounds and, for tracked products,
    /// within the available stock. `price_when_added` is frozen when the line
    /// is first created and never touched by later increments.
    ///
    /// # Arguments
    ///
    /// * `cart_id` - UUID of the target cart
    /// * `input` - Product, optional variant, and quantity to add
    ///
    /// # Returns
    ///
    /// * `Ok(CartView)` - Updated cart snapshot
    /// * `Err(ServiceError::NotFound)` - Cart or variant not found
    /// * `Err(ServiceError::ValidationError)` - Inactive product, variant from
    ///   another product, or quantity out of bounds
    /// * `Err(ServiceError::InsufficientStock)` - Combined quantity exceeds stock
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let cart = cart_service
    ///     .add_item(cart_id, AddItemInput {
    ///         product_id,
    ///         variant_id: Some(variant_id),
    ///         quantity: 1,
    ///     })
    ///     .await?;
    /// ```
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        cart_id: Uuid,
        input: AddItemInput,
    ) -> Result<CartView, ServiceError> {
        validate_quantity(input.quantity)?;

        let txn = self.db.begin().await?;

        let cart = Cart::find_by_id(cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        // Inactive products are indistinguishable from missing ones.
        let product = match Product::find_by_id(input.product_id).one(&txn).await? {
            Some(product) if product.is_active => product,
            _ => {
                return Err(ServiceError::ValidationError(
                    "Product not found or not available".to_string(),
                ))
            }
        };

        let variant = match input.variant_id {
            Some(variant_id) => {
                let variant = ProductVariant::find_by_id(variant_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Product variant {} not found", variant_id))
                    })?;
                if variant.product_id != product.id {
                    return Err(ServiceError::ValidationError(
                        "Selected variant does not belong to this product".to_string(),
                    ));
                }
                Some(variant)
            }
            None => None,
        };

        // One line per (product, variant); a missing variant matches NULL.
        let mut existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::ProductId.eq(input.product_id));
        existing = match input.variant_id {
            Some(variant_id) => existing.filter(cart_item::Column::VariantId.eq(variant_id)),
            None => existing.filter(cart_item::Column::VariantId.is_null()),
        };
        let existing = existing.one(&txn).await?;

        let combined = existing.as_ref().map(|item| item.quantity).unwrap_or(0) + input.quantity;
        if combined > MAX_QUANTITY {
            return Err(ServiceError::ValidationError(format!(
                "Maximum quantity allowed is {}",
                MAX_QUANTITY
            )));
        }
        InventoryService::ensure_available(&product, variant.as_ref(), combined)?;

        let now = Utc::now();
        let item_id = match existing {
            Some(item) => {
                let item_id = item.id;
                let mut item: cart_item::ActiveModel = item.into();
                item.quantity = Set(combined);
                item.updated_at = Set(now);
                item.update(&txn).await?;
                item_id
            }
            None => {
                let item_id = Uuid::new_v4();
                let price_when_added = variant
                    .as_ref()
                    .map(|v| v.effective_price(product.price))
                    .unwrap_or(product.price);

                cart_item::ActiveModel {
                    id: Set(item_id),
                    cart_id: Set(cart_id),
                    product_id: Set(product.id),
                    variant_id: Set(input.variant_id),
                    quantity: Set(input.quantity),
                    price_when_added: Set(price_when_added),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(&txn)
                .await?;
                item_id
            }
        };

        Self::touch_cart(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id,
                product_id: product.id,
            })
            .await;

        info!(
            "Added product {} to cart {} (item {}, quantity now {})",
            product.id, cart_id, item_id, combined
        );
        self.get_cart(cart_id).await
    }

    /// Sets the quantity of an existing cart line.
    ///
    /// The new quantity replaces the old one; removal is a separate call, so
    /// zero is rejected here. Stock is re-checked against the current catalog
    /// state, not the state at add time.
    ///
    /// # Returns
    ///
    /// * `Ok(CartView)` - Updated cart snapshot
    /// * `Err(ServiceError::NotFound)` - Cart missing, or the item does not
    ///   belong to this cart
    /// * `Err(ServiceError::ValidationError)` - Quantity out of bounds
    /// * `Err(ServiceError::InsufficientStock)` - Quantity exceeds stock
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        validate_quantity(quantity)?;

        let txn = self.db.begin().await?;

        let cart = Cart::find_by_id(cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        // An item id from another customer's cart reads as missing.
        let item = CartItem::find_by_id(item_id)
            .one(&txn)
            .await?
            .filter(|item| item.cart_id == cart_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        let product = Product::find_by_id(item.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", item.product_id))
            })?;
        let variant = match item.variant_id {
            Some(variant_id) => ProductVariant::find_by_id(variant_id).one(&txn).await?,
            None => None,
        };

        InventoryService::ensure_available(&product, variant.as_ref(), quantity)?;

        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(quantity);
        item.updated_at = Set(Utc::now());
        item.update(&txn).await?;

        Self::touch_cart(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated { cart_id, item_id })
            .await;

        info!(
            "Updated cart {} item {} to quantity {}",
            cart_id, item_id, quantity
        );
        self.get_cart(cart_id).await
    }

    /// Removes a line from the cart.
    ///
    /// # Returns
    ///
    /// * `Ok(CartView)` - Updated cart snapshot
    /// * `Err(ServiceError::NotFound)` - Cart missing, or the item does not
    ///   belong to this cart
    #[instrument(skip(self))]
    pub async fn remove_item(&self, cart_id: Uuid, item_id: Uuid) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = Cart::find_by_id(cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        let item = CartItem::find_by_id(item_id)
            .one(&txn)
            .await?
            .filter(|item| item.cart_id == cart_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

        item.delete(&txn).await?;
        Self::touch_cart(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved { cart_id, item_id })
            .await;

        info!("Removed item {} from cart {}", item_id, cart_id);
        self.get_cart(cart_id).await
    }

    /// Removes every line from the cart. The cart row itself survives.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, cart_id: Uuid) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = Cart::find_by_id(cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        let deleted = CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .exec(&txn)
            .await?;

        Self::touch_cart(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartCleared(cart_id))
            .await;

        info!(
            "Cleared {} items from cart {}",
            deleted.rows_affected, cart_id
        );
        self.get_cart(cart_id).await
    }

    /// Repopulates the cart from a previous order.
    ///
    /// Each order line goes through the normal add-item path at the current
    /// effective price, so stock and quantity rules apply as usual. Lines
    /// whose product is gone, inactive, or out of stock are skipped and
    /// reported back rather than failing the whole call.
    ///
    /// # Returns
    ///
    /// * `Ok(ReorderOutcome)` - Cart snapshot plus added/skipped line counts
    /// * `Err(ServiceError::NotFound)` - Cart missing, or the order does not
    ///   belong to the cart's customer
    #[instrument(skip(self))]
    pub async fn reorder(&self, cart_id: Uuid, order_id: Uuid) -> Result<ReorderOutcome, ServiceError> {
        let cart = Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .filter(|order| order.customer_id == cart.customer_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let lines = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut added_items = 0_usize;
        let mut skipped_items = Vec::new();

        for line in lines {
            let result = self
                .add_item(
                    cart_id,
                    AddItemInput {
                        product_id: line.product_id,
                        variant_id: line.variant_id,
                        quantity: line.quantity,
                    },
                )
                .await;

            match result {
                Ok(_) => added_items += 1,
                Err(
                    err @ (ServiceError::NotFound(_)
                    | ServiceError::ValidationError(_)
                    | ServiceError::InsufficientStock(_)),
                ) => {
                    warn!(
                        order_id = %order.id,
                        product_id = %line.product_id,
                        "Skipped reorder line for {}: {}",
                        line.product_name,
                        err
                    );
                    skipped_items.push(SkippedLine {
                        product_name: line.product_name,
                        reason: err.response_message(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            "Rebuilt cart {} from order {}: {} added, {} skipped",
            cart_id,
            order.order_number,
            added_items,
            skipped_items.len()
        );

        let cart = self.get_cart(cart_id).await?;
        Ok(ReorderOutcome {
            cart,
            added_items,
            skipped_items,
        })
    }

    async fn touch_cart<C: ConnectionTrait>(conn: &C, cart: CartModel) -> Result<(), ServiceError> {
        let mut cart: cart::ActiveModel = cart.into();
        cart.updated_at = Set(Utc::now());
        cart.update(conn).await?;
        Ok(())
    }

    /// Assembles the cart snapshot: lines with pricing detail plus totals.
    ///
    /// Line subtotals use the price frozen at add time; the current effective
    /// price rides along so clients can show a price-changed notice.
    async fn build_cart_view<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart: CartModel,
    ) -> Result<CartView, ServiceError> {
        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(conn)
            .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
        let products: HashMap<Uuid, ProductModel> = if product_ids.is_empty() {
            HashMap::new()
        } else {
            Product::find()
                .filter(product::Column::Id.is_in(product_ids))
                .all(conn)
                .await?
                .into_iter()
                .map(|product| (product.id, product))
                .collect()
        };

        let variant_ids: Vec<Uuid> = items.iter().filter_map(|item| item.variant_id).collect();
        let variants: HashMap<Uuid, ProductVariantModel> = if variant_ids.is_empty() {
            HashMap::new()
        } else {
            ProductVariant::find()
                .filter(product_variant::Column::Id.is_in(variant_ids))
                .all(conn)
                .await?
                .into_iter()
                .map(|variant| (variant.id, variant))
                .collect()
        };

        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            let product = products.get(&item.product_id).ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", item.product_id))
            })?;
            let variant = item.variant_id.and_then(|id| variants.get(&id));
            lines.push(Self::line_view(item, product, variant));
        }

        let total_items = lines.iter().map(|line| line.quantity).sum();
        let item_count = lines.len();
        let total_price = lines.iter().map(|line| line.subtotal).sum();

        Ok(CartView {
            id: cart.id,
            customer_id: cart.customer_id,
            items: lines,
            total_items,
            item_count,
            total_price,
            currency: self.config.default_currency.clone(),
            created_at: cart.created_at,
            updated_at: cart.updated_at,
        })
    }

    fn line_view(
        item: &cart_item::Model,
        product: &ProductModel,
        variant: Option<&ProductVariantModel>,
    ) -> CartItemView {
        let current_price = variant
            .map(|v| v.effective_price(product.price))
            .unwrap_or(product.price);

        CartItemView {
            id: item.id,
            product_id: item.product_id,
            variant_id: item.variant_id,
            product_name: product.name.clone(),
            variant_name: variant.map(|v| v.name.clone()),
            sku: variant
                .map(|v| v.sku.clone())
                .unwrap_or_else(|| product.sku.clone()),
            quantity: item.quantity,
            price_when_added: item.price_when_added,
            current_price,
            price_changed: item.price_when_added != current_price,
            subtotal: item.price_when_added * Decimal::from(item.quantity),
        }
    }
}

fn validate_quantity(quantity: i32) -> Result<(), ServiceError> {
    if quantity < MIN_QUANTITY {
        return Err(ServiceError::ValidationError(
            "Quantity must be greater than 0".to_string(),
        ));
    }
    if quantity > MAX_QUANTITY {
        return Err(ServiceError::ValidationError(format!(
            "Maximum quantity allowed is {}",
            MAX_QUANTITY
        )));
    }
    Ok(())
}

/// Input for adding an item to a cart
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddItemInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

/// Cart snapshot returned by every cart operation
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub items: Vec<CartItemView>,
    /// Sum of line quantities
    pub total_items: i32,
    /// Number of distinct lines
    pub item_count: usize,
    /// Sum of line subtotals at their frozen prices
    pub total_price: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One cart line with pricing detail
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub sku: String,
    pub quantity: i32,
    /// Effective price frozen when the line was created
    pub price_when_added: Decimal,
    /// Effective price right now
    pub current_price: Decimal,
    pub price_changed: bool,
    /// price_when_added x quantity
    pub subtotal: Decimal,
}

/// Result of rebuilding a cart from a previous order
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReorderOutcome {
    pub cart: CartView,
    pub added_items: usize,
    pub skipped_items: Vec<SkippedLine>,
}

/// An order line that could not be re-added
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SkippedLine {
    pub product_name: String,
    pub reason: String,
}
