use crate::{
    config::AppConfig,
    entities::{
        cart_item, delivery_event, order, order_item, order_status_history, Cart, CartItem,
        DeliveryEventType, OrderItemModel, OrderModel, OrderStatus, PaymentMethod, PaymentStatus,
        Product, ProductModel, ProductVariant, ProductVariantModel, ShippingMethod,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        inventory::InventoryService,
        payments::{PaymentService, TransactionView},
    },
};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Flat-rate shipping cost per method; standard ships free.
const EXPRESS_COST: Decimal = dec!(15.99);
const OVERNIGHT_COST: Decimal = dec!(29.99);

/// A single order line as submitted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    /// Overrides the catalog price for this line when present
    pub unit_price: Option<Decimal>,
}

/// Payment details for capturing payment during checkout.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentInfoInput {
    #[serde(default = "default_payment_method")]
    pub method: PaymentMethod,
    /// Only the last four digits are ever stored
    pub card_number: Option<String>,
}

fn default_payment_method() -> PaymentMethod {
    PaymentMethod::CreditCard
}

/// Request payload for creating an order directly from an item list.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderInput {
    pub customer_id: Uuid,
    pub customer_name: Option<String>,
    #[validate(email(message = "A valid customer email is required"))]
    pub customer_email: String,
    pub customer_phone: Option<String>,
    #[validate(length(min = 1, message = "Shipping address is required"))]
    pub shipping_address: String,
    pub billing_address: Option<String>,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemInput>,
    /// Accepts codes ("express") and display names ("Express Shipping");
    /// unrecognized values fall back to standard
    pub shipping_method: Option<String>,
    /// Free-form date like "Jun 20" or "06/20"; unparseable values fall back
    /// to the method's computed date
    pub estimated_delivery: Option<String>,
    pub subtotal: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub payment: Option<PaymentInfoInput>,
    pub notes: Option<String>,
}

/// Request payload for checking out an existing cart.
///
/// Same shape as [`CreateOrderInput`] minus the fields the cart supplies:
/// the customer comes from the cart row and the items from its lines.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutCartInput {
    pub customer_name: Option<String>,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub shipping_address: String,
    pub billing_address: Option<String>,
    pub shipping_method: Option<String>,
    pub estimated_delivery: Option<String>,
    pub subtotal: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub payment: Option<PaymentInfoInput>,
    pub notes: Option<String>,
}

impl CheckoutCartInput {
    fn into_order_input(self, customer_id: Uuid, items: Vec<OrderItemInput>) -> CreateOrderInput {
        CreateOrderInput {
            customer_id,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            shipping_address: self.shipping_address,
            billing_address: self.billing_address,
            items,
            shipping_method: self.shipping_method,
            estimated_delivery: self.estimated_delivery,
            subtotal: self.subtotal,
            shipping_cost: self.shipping_cost,
            tax_amount: self.tax_amount,
            total_amount: self.total_amount,
            payment: self.payment,
            notes: self.notes,
        }
    }
}

/// Order snapshot returned to the caller after a successful checkout.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderConfirmation {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
    /// Present when payment was captured during checkout
    pub transaction: Option<TransactionView>,
    pub is_free_shipping: bool,
    /// Transit window like "2-3 business days"
    pub shipping_duration: String,
    /// Long-form delivery date like "Friday, June 20, 2026"
    pub estimated_delivery_formatted: Option<String>,
}

/// An order line resolved against the catalog, price locked in.
struct ResolvedLine {
    product: ProductModel,
    variant: Option<ProductVariantModel>,
    quantity: i32,
    unit_price: Decimal,
}

impl ResolvedLine {
    fn total_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Checkout service that turns item lists and carts into orders.
///
/// Checkout is the only write path that creates orders. It validates every
/// line against the live catalog, computes the money breakdown, freezes
/// product name/SKU/price snapshots into order items, decrements tracked
/// stock, and optionally captures payment, all within a single database
/// transaction. Nothing is persisted when any step fails.
///
/// # Examples
///
/// ```ignore
/// use storefront_api::services::{CheckoutService, CreateOrderInput, OrderItemInput};
///
/// let checkout = CheckoutService::new(db, event_sender, config, inventory, payments);
///
/// let confirmation = checkout
///     .create_order(CreateOrderInput {
///         customer_id,
///         customer_email: "ada@example.com".into(),
///         shipping_address: "1 Analytical Way".into(),
///         items: vec![OrderItemInput {
///             product_id,
///             variant_id: None,
///             quantity: 2,
///             unit_price: None,
///         }],
///         shipping_method: Some("express".into()),
///         ..Default::default()
///     })
///     .await?;
/// assert_eq!(confirmation.shipping_duration, "2-3 business days");
/// ```
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
    inventory: Arc<InventoryService>,
    payments: Arc<PaymentService>,
}

impl CheckoutService {
    /// Creates a new `CheckoutService` instance.
    ///
    /// # Arguments
    ///
    /// * `db` - Database connection pool
    /// * `event_sender` - Event sender for publishing order events
    /// * `config` - Application configuration (tax rate, shipping threshold)
    /// * `inventory` - Inventory service for atomic stock decrements
    /// * `payments` - Payment service for capturing payment in-transaction
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
        inventory: Arc<InventoryService>,
        payments: Arc<PaymentService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
            inventory,
            payments,
        }
    }

    /// Creates an order from an explicit item list.
    ///
    /// Each line is validated against the catalog (product active, variant
    /// belongs to product, stock suffices), then the money breakdown is
    /// computed with caller overrides taking precedence:
    ///
    /// * subtotal: sum of line totals unless overridden
    /// * shipping: flat rate per method, standard free above the threshold
    /// * tax: subtotal times the configured rate unless overridden
    /// * total: subtotal + shipping + tax unless overridden
    ///
    /// Order items freeze the product name, SKU (the variant's when one is
    /// selected), and unit price, so later catalog edits never rewrite an
    /// order. Tracked stock is decremented atomically per line; a concurrent
    /// checkout draining the shelf fails this one without partial writes.
    /// When payment details are present the payment is captured in the same
    /// transaction and the order's payment status becomes `completed`.
    ///
    /// # Arguments
    ///
    /// * `input` - Customer contact, address, lines, and optional overrides
    ///
    /// # Returns
    ///
    /// * `Ok(OrderConfirmation)` - The persisted order with derived display fields
    /// * `Err(ServiceError::ValidationError)` - Empty order, bad email, inactive
    ///   product, variant/product mismatch, or negative money override
    /// * `Err(ServiceError::InsufficientStock)` - A tracked line exceeds stock
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id))]
    pub async fn create_order(
        &self,
        input: CreateOrderInput,
    ) -> Result<OrderConfirmation, ServiceError> {
        let result = self.create_order_inner(input).await;
        if result.is_err() {
            counter!("storefront_checkout.failures", 1);
        }
        result
    }

    async fn create_order_inner(
        &self,
        input: CreateOrderInput,
    ) -> Result<OrderConfirmation, ServiceError> {
        input.validate()?;
        validate_money_overrides(&input)?;

        let shipping_method = resolve_shipping_method(input.shipping_method.as_deref());

        let txn = self.db.begin().await?;

        let mut lines: Vec<ResolvedLine> = Vec::with_capacity(input.items.len());
        for item in &input.items {
            if item.quantity < 1 {
                return Err(ServiceError::ValidationError(
                    "Quantity must be greater than 0".to_string(),
                ));
            }

            let product = match Product::find_by_id(item.product_id).one(&txn).await? {
                Some(product) if product.is_active => product,
                _ => {
                    return Err(ServiceError::ValidationError(format!(
                        "Product {} not found or not available",
                        item.product_id
                    )))
                }
            };

            let variant = match item.variant_id {
                Some(variant_id) => {
                    let variant = ProductVariant::find_by_id(variant_id)
                        .one(&txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Product variant {} not found",
                                variant_id
                            ))
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

            InventoryService::ensure_available(&product, variant.as_ref(), item.quantity)?;

            let unit_price = item.unit_price.unwrap_or_else(|| {
                variant
                    .as_ref()
                    .map(|v| v.effective_price(product.price))
                    .unwrap_or(product.price)
            });

            lines.push(ResolvedLine {
                product,
                variant,
                quantity: item.quantity,
                unit_price,
            });
        }

        let subtotal = input.subtotal.unwrap_or_else(|| order_subtotal(&lines));
        let shipping_cost = input.shipping_cost.unwrap_or_else(|| {
            shipping_cost_for(shipping_method, subtotal, self.config.free_shipping_threshold())
        });
        let tax_amount = input
            .tax_amount
            .unwrap_or_else(|| (subtotal * self.config.tax_rate()).round_dp(2));
        let total_amount = input
            .total_amount
            .unwrap_or(subtotal + shipping_cost + tax_amount);

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let delivery_date = estimated_delivery_date(
            shipping_method,
            input.estimated_delivery.as_deref(),
            now.date_naive(),
        );

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            customer_id: Set(input.customer_id),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            shipping_method: Set(shipping_method),
            currency: Set(self.config.default_currency.clone()),
            subtotal: Set(subtotal),
            shipping_cost: Set(shipping_cost),
            tax_amount: Set(tax_amount),
            total_amount: Set(total_amount),
            customer_name: Set(input.customer_name.clone()),
            customer_email: Set(input.customer_email.clone()),
            customer_phone: Set(input.customer_phone.clone()),
            shipping_address: Set(input.shipping_address.clone()),
            billing_address: Set(input.billing_address.clone()),
            tracking_number: Set(None),
            carrier: Set(None),
            estimated_delivery_date: Set(Some(delivery_date)),
            shipped_at: Set(None),
            delivered_at: Set(None),
            notes: Set(input.notes.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let mut order = order.insert(&txn).await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product.id),
                variant_id: Set(line.variant.as_ref().map(|v| v.id)),
                product_name: Set(line.product.name.clone()),
                sku: Set(line
                    .variant
                    .as_ref()
                    .map(|v| v.sku.clone())
                    .unwrap_or_else(|| line.product.sku.clone())),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                total_price: Set(line.total_price()),
                created_at: Set(now),
            };
            items.push(item.insert(&txn).await?);

            self.inventory
                .decrement_stock(&txn, &line.product, line.variant.as_ref(), line.quantity)
                .await?;
        }

        let transaction = match &input.payment {
            Some(payment) => {
                let row = self
                    .payments
                    .record_payment(
                        &txn,
                        order_id,
                        total_amount,
                        &order.currency,
                        payment.method,
                        payment.card_number.as_deref(),
                    )
                    .await?;

                let mut active: order::ActiveModel = order.into();
                active.payment_status = Set(PaymentStatus::Completed);
                active.updated_at = Set(Utc::now());
                order = active.update(&txn).await?;
                Some(row)
            }
            None => None,
        };

        txn.commit().await?;

        counter!("storefront_checkout.orders_created", 1);
        info!(
            "Created order {} with {} lines, total {} {}",
            order.order_number,
            items.len(),
            order.total_amount,
            order.currency
        );

        // The order is committed; trail records must not undo it.
        self.record_checkout_trail(&order).await;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        if transaction.is_some() {
            self.event_sender
                .send_or_log(Event::PaymentCaptured(order_id))
                .await;
        }

        let threshold = self.config.free_shipping_threshold();
        Ok(OrderConfirmation {
            is_free_shipping: is_free_shipping(order.shipping_cost, order.subtotal, threshold),
            shipping_duration: order.shipping_method.duration_text().to_string(),
            estimated_delivery_formatted: order
                .estimated_delivery_date
                .map(|d| d.format("%A, %B %d, %Y").to_string()),
            transaction: transaction.map(TransactionView::from),
            order,
            items,
        })
    }

    /// Checks out an existing cart, deriving the order lines from its rows.
    ///
    /// Lines are priced at the current effective catalog price, not the
    /// price snapshotted when they were added to the cart. After the order
    /// commits the cart is emptied when `clear_cart_after_checkout` is on;
    /// a failure there is logged and does not fail the checkout.
    ///
    /// # Arguments
    ///
    /// * `cart_id` - UUID of the cart to check out
    /// * `input` - Customer contact, address, and optional overrides
    ///
    /// # Returns
    ///
    /// * `Ok(OrderConfirmation)` - The persisted order
    /// * `Err(ServiceError::NotFound)` - No such cart
    /// * `Err(ServiceError::InvalidOperation)` - The cart is empty
    #[instrument(skip(self, input), fields(cart_id = %cart_id))]
    pub async fn checkout_cart(
        &self,
        cart_id: Uuid,
        input: CheckoutCartInput,
    ) -> Result<OrderConfirmation, ServiceError> {
        let cart = Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        let cart_lines = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        if cart_lines.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Cannot check out an empty cart".to_string(),
            ));
        }

        let items = cart_lines
            .iter()
            .map(|line| OrderItemInput {
                product_id: line.product_id,
                variant_id: line.variant_id,
                quantity: line.quantity,
                unit_price: None,
            })
            .collect();

        let confirmation = self
            .create_order(input.into_order_input(cart.customer_id, items))
            .await?;

        if self.config.clear_cart_after_checkout {
            match CartItem::delete_many()
                .filter(cart_item::Column::CartId.eq(cart_id))
                .exec(&*self.db)
                .await
            {
                Ok(result) => {
                    info!(
                        cart_id = %cart_id,
                        rows = result.rows_affected,
                        "Cleared cart after checkout"
                    );
                    self.event_sender.send_or_log(Event::CartCleared(cart_id)).await;
                }
                Err(err) => {
                    error!(cart_id = %cart_id, error = %err, "Failed to clear cart after checkout");
                }
            }
        }

        Ok(confirmation)
    }

    /// Writes the post-checkout trail: the initial status history row and the
    /// pickup delivery event, plus a priority-processing event for express
    /// and overnight orders. Failures are logged, never propagated.
    async fn record_checkout_trail(&self, order: &OrderModel) {
        let history = order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            status: Set(OrderStatus::Pending),
            previous_status: Set(None),
            comment: Set(Some(format!(
                "Order created via checkout with {}",
                order.shipping_method.display_name()
            ))),
            changed_by: Set(None),
            created_at: Set(Utc::now()),
        };
        if let Err(err) = history.insert(&*self.db).await {
            error!(order_id = %order.id, error = %err, "Failed to record initial status history");
        }

        let expected = order
            .estimated_delivery_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "pending".to_string());
        let picked_up = delivery_event::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            event_type: Set(DeliveryEventType::PickedUp),
            location: Set("Processing Center".to_string()),
            description: Set(format!(
                "Order {} has been placed and is being prepared for shipment. Expected delivery: {}",
                order.order_number, expected
            )),
            occurred_at: Set(order.created_at),
            created_at: Set(Utc::now()),
        };
        if let Err(err) = picked_up.insert(&*self.db).await {
            error!(order_id = %order.id, error = %err, "Failed to record pickup delivery event");
        }

        if matches!(
            order.shipping_method,
            ShippingMethod::Express | ShippingMethod::Overnight
        ) {
            let in_transit = delivery_event::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                event_type: Set(DeliveryEventType::InTransit),
                location: Set("Shipping Facility".to_string()),
                description: Set(format!(
                    "Priority shipment for order {} is being expedited via {}",
                    order.order_number,
                    order.shipping_method.display_name()
                )),
                // Scheduled ahead of real time so the timeline reads in order.
                occurred_at: Set(order.created_at + Duration::hours(2)),
                created_at: Set(Utc::now()),
            };
            if let Err(err) = in_transit.insert(&*self.db).await {
                error!(order_id = %order.id, error = %err, "Failed to record priority delivery event");
            }
        }
    }
}

/// Sum of line totals at the resolved unit prices
fn order_subtotal(lines: &[ResolvedLine]) -> Decimal {
    lines.iter().map(ResolvedLine::total_price).sum()
}

/// Flat shipping rate per method; standard is free above the threshold
/// (and carries no base charge below it either).
fn shipping_cost_for(
    method: ShippingMethod,
    subtotal: Decimal,
    free_shipping_threshold: Decimal,
) -> Decimal {
    if method == ShippingMethod::Standard && subtotal >= free_shipping_threshold {
        return Decimal::ZERO;
    }
    match method {
        ShippingMethod::Standard => Decimal::ZERO,
        ShippingMethod::Express => EXPRESS_COST,
        ShippingMethod::Overnight => OVERNIGHT_COST,
    }
}

/// An order qualifies as free shipping only past the threshold; a cheap
/// standard order ships at no cost but is not advertised as free.
fn is_free_shipping(shipping_cost: Decimal, subtotal: Decimal, free_shipping_threshold: Decimal) -> bool {
    shipping_cost.is_zero() && subtotal >= free_shipping_threshold
}

/// Maps caller shipping strings to a method, accepting bare codes and
/// "... Shipping" display names in any case. Unknown values get standard.
fn resolve_shipping_method(raw: Option<&str>) -> ShippingMethod {
    let Some(raw) = raw else {
        return ShippingMethod::Standard;
    };
    let lowered = raw.trim().to_lowercase();
    let code = lowered.strip_suffix(" shipping").unwrap_or(&lowered);
    match ShippingMethod::parse(code) {
        Some(method) => method,
        None => {
            warn!(
                "Unrecognized shipping method {:?}, falling back to standard",
                raw
            );
            ShippingMethod::Standard
        }
    }
}

/// Resolves the estimated delivery date: the caller's requested date when it
/// parses, otherwise `today` plus the method's transit days.
fn estimated_delivery_date(
    method: ShippingMethod,
    requested: Option<&str>,
    today: NaiveDate,
) -> NaiveDate {
    if let Some(raw) = requested {
        match parse_delivery_estimate(raw, today.year()) {
            Some(date) => return date,
            None => warn!(
                "Unparseable delivery estimate {:?}, using the computed date",
                raw
            ),
        }
    }
    today + Duration::days(method.delivery_days())
}

/// Parses loose month/day strings such as "Jun 20", "June 20", "06/20", or
/// "06-20", with an optional leading weekday ("Friday, Jun 20"). The year is
/// always the current one.
fn parse_delivery_estimate(raw: &str, year: i32) -> Option<NaiveDate> {
    let cleaned = raw.trim();
    let cleaned = match cleaned.split_once(',') {
        Some((_, rest)) => rest.trim(),
        None => cleaned,
    };

    for format in ["%b %d", "%B %d", "%m/%d", "%m-%d"] {
        let candidate = format!("{} {}", cleaned, year);
        let format_with_year = format!("{} %Y", format);
        if let Ok(date) = NaiveDate::parse_from_str(&candidate, &format_with_year) {
            return Some(date);
        }
    }
    None
}

/// Money overrides must stay in non-negative territory.
fn validate_money_overrides(input: &CreateOrderInput) -> Result<(), ServiceError> {
    let overrides = [
        ("subtotal", input.subtotal),
        ("shipping_cost", input.shipping_cost),
        ("tax_amount", input.tax_amount),
        ("total_amount", input.total_amount),
    ];
    for (field, value) in overrides {
        if value.is_some_and(|v| v < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(format!(
                "{} cannot be negative",
                field
            )));
        }
    }
    for item in &input.items {
        if item.unit_price.is_some_and(|v| v < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "unit_price cannot be negative".to_string(),
            ));
        }
    }
    Ok(())
}

/// "ORD-" followed by 8 uppercase hex characters
fn generate_order_number() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", id[..8].to_uppercase())
}
