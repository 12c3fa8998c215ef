use crate::{
    entities::{
        delivery_event, order, order_item, order_status_history, transaction, DeliveryEvent,
        DeliveryEventModel, DeliveryEventType, Order, OrderItem, OrderItemModel, OrderModel,
        OrderStatus, OrderStatusHistory, OrderStatusHistoryModel, Transaction,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::payments::TransactionView,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Carrier assigned when an order ships without one on record
const DEFAULT_CARRIER: &str = "Standard Carrier";

/// Request payload for the dedicated status-change endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusInput {
    pub status: String,
    /// Stored as the history comment; defaults to "Status changed from X to Y"
    pub comment: Option<String>,
}

/// Request payload for the admin order update. All fields optional; a status
/// change rides the same state machine as the dedicated endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderInput {
    pub status: Option<String>,
    /// History comment used when `status` changes
    pub status_note: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Order with its line items and payment/refund transactions.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
    pub transactions: Vec<TransactionView>,
}

/// Tracking view: shipment fields plus the full status and delivery trail.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderTracking {
    pub order_number: String,
    pub status: OrderStatus,
    pub can_track: bool,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub history: Vec<OrderStatusHistoryModel>,
    pub events: Vec<DeliveryEventModel>,
}

/// Read and administration paths for orders after checkout has created them.
///
/// Status changes run through a strict machine: `pending → confirmed →
/// processing → shipped → delivered`, with `cancelled` reachable from the
/// first two states only. `refunded` is never reachable here; the refund
/// operation owns that transition.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Fetches a single order by id
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Fetches an order with items and transactions by id
    #[instrument(skip(self))]
    pub async fn get_order_detail(&self, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let order = self.get_order(order_id).await?;
        self.load_detail(order).await
    }

    /// Fetches an order with items and transactions by its order number
    #[instrument(skip(self))]
    pub async fn get_order_detail_by_number(
        &self,
        order_number: &str,
    ) -> Result<OrderDetail, ServiceError> {
        let order = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;
        self.load_detail(order).await
    }

    async fn load_detail(&self, order: OrderModel) -> Result<OrderDetail, ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let transactions = Transaction::find()
            .filter(transaction::Column::OrderId.eq(order.id))
            .order_by_asc(transaction::Column::CreatedAt)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(TransactionView::from)
            .collect();

        Ok(OrderDetail {
            order,
            items,
            transactions,
        })
    }

    /// Fetches the line items of an order
    #[instrument(skip(self))]
    pub async fn get_order_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderItemModel>, ServiceError> {
        // Missing order is a 404, not an empty list.
        self.get_order(order_id).await?;

        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Lists orders newest first, optionally scoped to one customer.
    /// `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        customer_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let mut query = Order::find().order_by_desc(order::Column::CreatedAt);
        if let Some(customer_id) = customer_id {
            query = query.filter(order::Column::CustomerId.eq(customer_id));
        }

        let paginator = query.paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok((orders, total))
    }

    /// Assembles the tracking view: shipment fields, status history in
    /// chronological order, and delivery events by occurrence.
    #[instrument(skip(self))]
    pub async fn get_tracking(&self, order_id: Uuid) -> Result<OrderTracking, ServiceError> {
        let order = self.get_order(order_id).await?;

        let history = OrderStatusHistory::find()
            .filter(order_status_history::Column::OrderId.eq(order_id))
            .order_by_asc(order_status_history::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let events = DeliveryEvent::find()
            .filter(delivery_event::Column::OrderId.eq(order_id))
            .order_by_asc(delivery_event::Column::OccurredAt)
            .all(&*self.db)
            .await?;

        Ok(OrderTracking {
            can_track: order.tracking_number.is_some(),
            order_number: order.order_number,
            status: order.status,
            tracking_number: order.tracking_number,
            carrier: order.carrier,
            estimated_delivery_date: order.estimated_delivery_date,
            shipped_at: order.shipped_at,
            delivered_at: order.delivered_at,
            history,
            events,
        })
    }

    /// Moves an order to a new status through the state machine.
    ///
    /// Entering `shipped` stamps `shipped_at` and fills in the default
    /// carrier when none is set; entering `delivered` stamps `delivered_at`.
    /// `refunded` is refused here regardless of the current state.
    #[instrument(skip(self, input), fields(order_id = %order_id, new_status = %input.status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        input: UpdateOrderStatusInput,
    ) -> Result<OrderModel, ServiceError> {
        let new_status = parse_target_status(&input.status)?;

        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let old_status = order.status;
        ensure_transition(&order, new_status)?;

        let now = Utc::now();
        let carrier_missing = order.carrier.is_none();
        let mut active: order::ActiveModel = order.into();
        apply_status_stamps(&mut active, new_status, carrier_missing, now);
        active.updated_at = Set(now);
        let order = active.update(&txn).await?;

        txn.commit().await?;

        self.record_status_trail(&order, old_status, input.comment, Some("admin".to_string()))
            .await;
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;

        info!(
            "Order {} moved from {} to {}",
            order.order_number, old_status, new_status
        );
        Ok(order)
    }

    /// Admin update of the order's mutable fields.
    ///
    /// Tracking number, carrier, estimated delivery date, and notes apply
    /// directly; a status change goes through the state machine with the
    /// same stamps and history as [`update_order_status`]. Nothing mutates
    /// when the status change is rejected.
    #[instrument(skip(self, input), fields(order_id = %order_id))]
    pub async fn update_order(
        &self,
        order_id: Uuid,
        input: UpdateOrderInput,
    ) -> Result<OrderModel, ServiceError> {
        let new_status = input
            .status
            .as_deref()
            .map(parse_target_status)
            .transpose()?;

        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let old_status = order.status;

        if let Some(target) = new_status {
            ensure_transition(&order, target)?;
        }

        let now = Utc::now();
        let carrier_missing = order.carrier.is_none() && input.carrier.is_none();
        let mut active: order::ActiveModel = order.into();

        if let Some(tracking_number) = input.tracking_number {
            active.tracking_number = Set(Some(tracking_number));
        }
        if let Some(carrier) = input.carrier {
            active.carrier = Set(Some(carrier));
        }
        if let Some(date) = input.estimated_delivery_date {
            active.estimated_delivery_date = Set(Some(date));
        }
        if let Some(notes) = input.notes {
            active.notes = Set(Some(notes));
        }
        if let Some(target) = new_status {
            apply_status_stamps(&mut active, target, carrier_missing, now);
        }
        active.updated_at = Set(now);
        let order = active.update(&txn).await?;

        txn.commit().await?;

        if let Some(target) = new_status {
            self.record_status_trail(&order, old_status, input.status_note, Some("admin".to_string()))
                .await;
            self.event_sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id,
                    old_status: old_status.to_string(),
                    new_status: target.to_string(),
                })
                .await;
        }

        info!("Updated order {}", order.order_number);
        Ok(order)
    }

    /// Cancels an order that has not moved past `confirmed`.
    ///
    /// Appends a customer-attributed history row and a `returned` delivery
    /// event located at "Customer Request". Stock is not returned.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: Option<String>,
    ) -> Result<OrderModel, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Confirmed) {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} cannot be cancelled in current status: {}",
                order.order_number, order.status
            )));
        }

        let old_status = order.status;
        let now = Utc::now();
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Cancelled);
        active.updated_at = Set(now);
        let order = active.update(&txn).await?;

        txn.commit().await?;

        let comment = reason.unwrap_or_else(|| "Order cancelled by customer".to_string());
        self.record_status_trail(&order, old_status, Some(comment), Some("customer".to_string()))
            .await;
        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: OrderStatus::Cancelled.to_string(),
            })
            .await;

        info!("Cancelled order {}", order.order_number);
        Ok(order)
    }

    /// Post-commit history row plus the delivery event matching the new
    /// status. Failures are logged with the order id and swallowed.
    async fn record_status_trail(
        &self,
        order: &OrderModel,
        previous: OrderStatus,
        comment: Option<String>,
        changed_by: Option<String>,
    ) {
        let comment = comment.unwrap_or_else(|| {
            format!("Status changed from {} to {}", previous, order.status)
        });
        let history = order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            status: Set(order.status),
            previous_status: Set(Some(previous)),
            comment: Set(Some(comment)),
            changed_by: Set(changed_by),
            created_at: Set(Utc::now()),
        };
        if let Err(err) = history.insert(&*self.db).await {
            error!(order_id = %order.id, error = %err, "Failed to record status history");
        }

        let event = match order.status {
            OrderStatus::Shipped => Some((
                DeliveryEventType::InTransit,
                "Shipping Facility".to_string(),
                format!(
                    "Order {} shipped via {}",
                    order.order_number,
                    order.carrier.as_deref().unwrap_or(DEFAULT_CARRIER)
                ),
            )),
            OrderStatus::Delivered => Some((
                DeliveryEventType::Delivered,
                "Delivery Address".to_string(),
                format!("Order {} was delivered", order.order_number),
            )),
            OrderStatus::Cancelled => Some((
                DeliveryEventType::Returned,
                "Customer Request".to_string(),
                format!("Order {} was cancelled before shipment", order.order_number),
            )),
            _ => None,
        };

        if let Some((event_type, location, description)) = event {
            let now = Utc::now();
            let delivery = delivery_event::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                event_type: Set(event_type),
                location: Set(location),
                description: Set(description),
                occurred_at: Set(now),
                created_at: Set(now),
            };
            if let Err(err) = delivery.insert(&*self.db).await {
                error!(order_id = %order.id, error = %err, "Failed to record delivery event");
            }
        }
    }
}

fn parse_target_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    let status = OrderStatus::parse(raw)
        .ok_or_else(|| ServiceError::ValidationError(format!("Unknown order status: {}", raw)))?;
    if status == OrderStatus::Refunded {
        return Err(ServiceError::InvalidOperation(
            "Orders are moved to refunded through the refund operation".to_string(),
        ));
    }
    Ok(status)
}

/// Same-status requests and off-machine jumps are both rejected, naming the
/// current state in the message.
fn ensure_transition(order: &OrderModel, target: OrderStatus) -> Result<(), ServiceError> {
    if order.status == target {
        return Err(ServiceError::InvalidStatus(format!(
            "Order {} is already {}",
            order.order_number, target
        )));
    }
    if !is_valid_transition(order.status, target) {
        return Err(ServiceError::InvalidStatus(format!(
            "Order {} cannot move from {} to {}",
            order.order_number, order.status, target
        )));
    }
    Ok(())
}

fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Confirmed, Processing)
            | (Processing, Shipped)
            | (Shipped, Delivered)
            | (Pending, Cancelled)
            | (Confirmed, Cancelled)
    )
}

/// Status write plus the timestamps that come with it. The caller decides
/// whether the carrier slot is still open.
fn apply_status_stamps(
    active: &mut order::ActiveModel,
    new_status: OrderStatus,
    carrier_missing: bool,
    now: DateTime<Utc>,
) {
    active.status = Set(new_status);
    match new_status {
        OrderStatus::Shipped => {
            active.shipped_at = Set(Some(now));
            if carrier_missing {
                active.carrier = Set(Some(DEFAULT_CARRIER.to_string()));
            }
        }
        OrderStatus::Delivered => {
            active.delivered_at = Set(Some(now));
        }
        _ => {}
    }
}
