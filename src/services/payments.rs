use crate::{
    entities::{
        order, order_status_history, transaction, Order, OrderStatus, PaymentMethod,
        PaymentStatus, Transaction, TransactionStatus, TransactionType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

const MOCK_GATEWAY: &str = "mock";

/// Payment recording and refunds against the mock gateway.
///
/// The gateway approves every well-formed charge, so recorded transactions
/// land in `completed` with a synthetic gateway reference. Card numbers are
/// reduced to their last four digits before anything touches the database; a
/// card payment without usable digits is declined up front.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl PaymentService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Records a completed payment transaction for an order.
    ///
    /// Runs on the caller's connection so checkout can include the row in its
    /// transaction; the caller is responsible for committing and for emitting
    /// any post-commit events.
    #[instrument(skip(self, conn, card_number))]
    pub async fn record_payment<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
        amount: Decimal,
        currency: &str,
        method: PaymentMethod,
        card_number: Option<&str>,
    ) -> Result<transaction::Model, ServiceError> {
        let card_last_four = authorize_card(method, card_number)?;
        let now = Utc::now();

        let payment = transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            transaction_number: Set(transaction_number()),
            transaction_type: Set(TransactionType::Payment),
            amount: Set(amount),
            currency: Set(currency.to_string()),
            payment_method: Set(method),
            status: Set(TransactionStatus::Completed),
            gateway: Set(MOCK_GATEWAY.to_string()),
            gateway_transaction_id: Set(Some(gateway_reference())),
            card_last_four: Set(card_last_four),
            processed_at: Set(Some(now)),
            notes: Set(None),
            created_at: Set(now),
        };
        let payment = payment.insert(conn).await?;

        counter!("storefront_payments.captured", 1);
        info!(
            "Recorded payment {} of {} {} for order {}",
            payment.transaction_number, amount, currency, order_id
        );
        Ok(payment)
    }

    /// Refunds an order, in full by default.
    ///
    /// Only shipped or delivered orders can be refunded; anything else fails
    /// with the current status in the message. The refund flips both the
    /// order status and the payment status to `refunded` in one transaction.
    /// Stock is never returned to the shelf.
    ///
    /// # Arguments
    ///
    /// * `order_id` - UUID of the order to refund
    /// * `input` - Optional amount (defaults to the order total) and reason
    ///
    /// # Returns
    ///
    /// * `Ok(transaction::Model)` - The completed refund transaction
    /// * `Err(ServiceError::NotFound)` - Order not found
    /// * `Err(ServiceError::InvalidStatus)` - Order not shipped or delivered
    /// * `Err(ServiceError::ValidationError)` - Amount out of range
    #[instrument(skip(self))]
    pub async fn refund_order(
        &self,
        order_id: Uuid,
        input: RefundInput,
    ) -> Result<transaction::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if !is_refundable(order.status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} cannot be refunded in current status: {}",
                order.order_number, order.status
            )));
        }

        let amount = input.amount.unwrap_or(order.total_amount);
        validate_refund_amount(amount, order.total_amount)?;
        let reason = input
            .reason
            .unwrap_or_else(|| "Customer refund request".to_string());

        // Refund through the instrument the order was paid with, when known.
        let payment_method = Transaction::find()
            .filter(transaction::Column::OrderId.eq(order_id))
            .filter(transaction::Column::TransactionType.eq(TransactionType::Payment))
            .order_by_desc(transaction::Column::CreatedAt)
            .one(&txn)
            .await?
            .map(|payment| payment.payment_method)
            .unwrap_or(PaymentMethod::CreditCard);

        let transaction_type = if amount < order.total_amount {
            TransactionType::PartialRefund
        } else {
            TransactionType::Refund
        };

        let now = Utc::now();
        let refund = transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            transaction_number: Set(transaction_number()),
            transaction_type: Set(transaction_type),
            amount: Set(amount),
            currency: Set(order.currency.clone()),
            payment_method: Set(payment_method),
            status: Set(TransactionStatus::Completed),
            gateway: Set(MOCK_GATEWAY.to_string()),
            gateway_transaction_id: Set(Some(gateway_reference())),
            card_last_four: Set(None),
            processed_at: Set(Some(now)),
            notes: Set(Some(format!("Refund processed: {}", reason))),
            created_at: Set(now),
        };
        let refund = refund.insert(&txn).await?;

        let previous_status = order.status;
        let order_number = order.order_number.clone();
        let mut order: order::ActiveModel = order.into();
        order.status = Set(OrderStatus::Refunded);
        order.payment_status = Set(PaymentStatus::Refunded);
        order.updated_at = Set(now);
        order.update(&txn).await?;

        txn.commit().await?;

        // History is best effort once the refund itself is committed.
        let history = order_status_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            status: Set(OrderStatus::Refunded),
            previous_status: Set(Some(previous_status)),
            comment: Set(Some(format!(
                "Refund processed: ${}. Reason: {}",
                amount, reason
            ))),
            changed_by: Set(Some("admin".to_string())),
            created_at: Set(Utc::now()),
        };
        if let Err(err) = history.insert(&*self.db).await {
            error!(
                order_id = %order_id,
                "Failed to record refund status history: {}", err
            );
        }

        self.event_sender
            .send_or_log(Event::PaymentRefunded(order_id))
            .await;
        counter!("storefront_payments.refunded", 1);

        info!(
            "Refunded {} on order {} ({})",
            amount, order_number, refund.transaction_number
        );
        Ok(refund)
    }
}

fn is_refundable(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::Shipped | OrderStatus::Delivered)
}

fn validate_refund_amount(amount: Decimal, order_total: Decimal) -> Result<(), ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Refund amount must be greater than 0".to_string(),
        ));
    }
    if amount > order_total {
        return Err(ServiceError::ValidationError(
            "Refund amount cannot exceed order total".to_string(),
        ));
    }
    Ok(())
}

fn transaction_number() -> String {
    format!("TXN-{}", random_hex(12))
}

fn gateway_reference() -> String {
    format!("MOCK-{}", random_hex(16))
}

fn random_hex(len: usize) -> String {
    Uuid::new_v4().simple().to_string()[..len].to_uppercase()
}

/// Extracts the last four card digits for card methods, declining card
/// payments whose number carries no usable digits.
fn authorize_card(
    method: PaymentMethod,
    card_number: Option<&str>,
) -> Result<Option<String>, ServiceError> {
    if !method.is_card() {
        return Ok(None);
    }

    let digits: String = card_number
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.len() < 4 {
        counter!("storefront_payments.declined", 1);
        return Err(ServiceError::PaymentFailed(
            "Card number was not accepted by the payment gateway".to_string(),
        ));
    }

    Ok(Some(digits[digits.len() - 4..].to_string()))
}

/// Input for refunding an order
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RefundInput {
    /// Amount to refund; defaults to the order total
    pub amount: Option<Decimal>,
    pub reason: Option<String>,
}

/// Transaction as exposed over the API: the stored last-four becomes a
/// masked display string and the raw column never leaves the service layer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionView {
    pub id: Uuid,
    pub transaction_number: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    pub gateway: String,
    pub gateway_transaction_id: Option<String>,
    /// "**** **** **** 1234" for card payments with a stored last-four
    pub masked_payment_info: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<transaction::Model> for TransactionView {
    fn from(model: transaction::Model) -> Self {
        Self {
            masked_payment_info: model.masked_payment_info(),
            id: model.id,
            transaction_number: model.transaction_number,
            transaction_type: model.transaction_type,
            amount: model.amount,
            currency: model.currency,
            payment_method: model.payment_method,
            status: model.status,
            gateway: model.gateway,
            gateway_transaction_id: model.gateway_transaction_id,
            processed_at: model.processed_at,
            created_at: model.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn transaction_number_has_expected_shape() {
        let number = transaction_number();
        assert!(number.starts_with("TXN-"));
        assert_eq!(number.len(), 16);
        assert!(number[4..]
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn gateway_reference_has_expected_shape() {
        let reference = gateway_reference();
        assert!(reference.starts_with("MOCK-"));
        assert_eq!(reference.len(), 21);
    }

    #[test]
    fn card_numbers_reduce_to_last_four() {
        assert_eq!(
            authorize_card(PaymentMethod::CreditCard, Some("4242 4242 4242 4242")).unwrap(),
            Some("4242".to_string())
        );
        assert_eq!(
            authorize_card(PaymentMethod::DebitCard, Some("5500-0000-0000-0004")).unwrap(),
            Some("0004".to_string())
        );
    }

    #[test]
    fn non_card_methods_store_no_digits() {
        assert_eq!(
            authorize_card(PaymentMethod::Paypal, Some("4242 4242 4242 4242")).unwrap(),
            None
        );
        assert_eq!(
            authorize_card(PaymentMethod::BankTransfer, Some("4242424242424242")).unwrap(),
            None
        );
    }

    #[test]
    fn unusable_card_numbers_are_declined() {
        assert!(matches!(
            authorize_card(PaymentMethod::CreditCard, Some("123")),
            Err(ServiceError::PaymentFailed(_))
        ));
        assert!(matches!(
            authorize_card(PaymentMethod::CreditCard, Some("not-a-card")),
            Err(ServiceError::PaymentFailed(_))
        ));
        assert!(matches!(
            authorize_card(PaymentMethod::DebitCard, None),
            Err(ServiceError::PaymentFailed(_))
        ));
    }

    #[test]
    fn masked_payment_info_formats_last_four() {
        let now = Utc::now();
        let payment = transaction::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            transaction_number: transaction_number(),
            transaction_type: TransactionType::Payment,
            amount: dec!(165.48),
            currency: "USD".to_string(),
            payment_method: PaymentMethod::CreditCard,
            status: TransactionStatus::Completed,
            gateway: MOCK_GATEWAY.to_string(),
            gateway_transaction_id: Some(gateway_reference()),
            card_last_four: Some("4242".to_string()),
            processed_at: Some(now),
            notes: None,
            created_at: now,
        };

        assert_eq!(
            payment.masked_payment_info().as_deref(),
            Some("**** **** **** 4242")
        );
    }

    #[test]
    fn refunds_only_from_shipped_or_delivered() {
        assert!(is_refundable(OrderStatus::Shipped));
        assert!(is_refundable(OrderStatus::Delivered));
        assert!(!is_refundable(OrderStatus::Pending));
        assert!(!is_refundable(OrderStatus::Confirmed));
        assert!(!is_refundable(OrderStatus::Processing));
        assert!(!is_refundable(OrderStatus::Cancelled));
        assert!(!is_refundable(OrderStatus::Refunded));
    }

    #[test]
    fn refund_amount_must_be_positive_and_within_total() {
        assert!(validate_refund_amount(dec!(0.00), dec!(100.00)).is_err());
        assert!(validate_refund_amount(dec!(-5.00), dec!(100.00)).is_err());
        assert!(validate_refund_amount(dec!(100.01), dec!(100.00)).is_err());
        assert!(validate_refund_amount(dec!(100.00), dec!(100.00)).is_ok());
        assert!(validate_refund_amount(dec!(25.00), dec!(100.00)).is_ok());
    }
}
