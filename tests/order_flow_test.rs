//! Integration tests for the post-checkout order lifecycle.
//!
//! Tests cover:
//! - The linear status machine and the shipped/delivered timestamps
//! - Rejected transitions: same-status, off-machine jumps, unknown and
//!   refunded targets
//! - Cancellation from early states only
//! - Admin updates to tracking fields
//! - Full and partial refunds with their recorded transactions
//! - Order reads: by id, by number, line items, tracking, filtered lists

mod common;

use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{decimal, TestApp};

/// Checks out a single-line order and returns its id and order number.
async fn place_order(app: &TestApp, customer_id: Uuid, with_payment: bool) -> (String, String) {
    let product = app.seed_product("Ceramic Teapot", dec!(75.00), 50).await;
    let mut payload = json!({
        "customer_id": customer_id,
        "customer_name": "Dana Brook",
        "customer_email": "dana@example.com",
        "shipping_address": "4 Harbor Lane, Portsmouth",
        "items": [{"product_id": product.id, "quantity": 1}],
    });
    if with_payment {
        payload["payment"] = json!({"method": "credit_card", "card_number": "4000056655665556"});
    }

    let (status, body) = app
        .request_json(Method::POST, "/api/v1/checkout/orders", Some(payload))
        .await;
    assert_eq!(status, StatusCode::CREATED, "checkout failed: {body}");
    (
        body["data"]["order"]["id"].as_str().expect("order id").to_string(),
        body["data"]["order"]["order_number"]
            .as_str()
            .expect("order number")
            .to_string(),
    )
}

async fn set_status(app: &TestApp, order_id: &str, status: &str) -> (StatusCode, Value) {
    app.request_json(
        Method::PUT,
        &format!("/api/v1/orders/{order_id}/status"),
        Some(json!({"status": status})),
    )
    .await
}

// ==================== Status Machine Tests ====================

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn the_happy_path_walks_pending_to_delivered() {
    let app = TestApp::new().await;
    let (order_id, _) = place_order(&app, Uuid::new_v4(), false).await;

    let (status, body) = set_status(&app, &order_id, "confirmed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("confirmed"));

    let (status, _) = set_status(&app, &order_id, "processing").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = set_status(&app, &order_id, "shipped").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["shipped_at"].is_string());
    // No carrier was assigned, so shipping falls back to the default.
    assert_eq!(body["data"]["carrier"], json!("Standard Carrier"));
    assert!(body["data"]["delivered_at"].is_null());

    let (status, body) = set_status(&app, &order_id, "delivered").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("delivered"));
    assert!(body["data"]["delivered_at"].is_string());
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn off_machine_jumps_name_both_states() {
    let app = TestApp::new().await;
    let (order_id, order_number) = place_order(&app, Uuid::new_v4(), false).await;

    let (status, body) = set_status(&app, &order_id, "shipped").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().expect("error message");
    assert_eq!(
        message,
        format!("Invalid status: Order {order_number} cannot move from pending to shipped")
    );
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn repeating_the_current_status_is_rejected() {
    let app = TestApp::new().await;
    let (order_id, order_number) = place_order(&app, Uuid::new_v4(), false).await;

    let (status, body) = set_status(&app, &order_id, "pending").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"].as_str().expect("error message"),
        format!("Invalid status: Order {order_number} is already pending")
    );
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn refunded_is_not_a_valid_transition_target() {
    let app = TestApp::new().await;
    let (order_id, _) = place_order(&app, Uuid::new_v4(), false).await;

    let (status, body) = set_status(&app, &order_id, "refunded").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().expect("error message");
    assert!(
        message.contains("through the refund operation"),
        "unexpected message: {message}"
    );
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn unknown_status_strings_are_rejected() {
    let app = TestApp::new().await;
    let (order_id, _) = place_order(&app, Uuid::new_v4(), false).await;

    let (status, body) = set_status(&app, &order_id, "warehouse").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().expect("error message");
    assert!(
        message.contains("Unknown order status: warehouse"),
        "unexpected message: {message}"
    );
}

// ==================== Cancellation Tests ====================

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn pending_and_confirmed_orders_can_be_cancelled() {
    let app = TestApp::new().await;

    let (first, _) = place_order(&app, Uuid::new_v4(), false).await;
    let (status, body) = app
        .request_json(
            Method::POST,
            &format!("/api/v1/orders/{first}/cancel"),
            Some(json!({"reason": "Ordered the wrong size"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("cancelled"));

    let (second, _) = place_order(&app, Uuid::new_v4(), false).await;
    set_status(&app, &second, "confirmed").await;
    // A missing body is fine; the cancellation reason is optional.
    let (status, body) = app
        .request_json(Method::POST, &format!("/api/v1/orders/{second}/cancel"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("cancelled"));

    // The trail records who cancelled and a returned delivery event.
    let (_, tracking) = app
        .request_json(Method::GET, &format!("/api/v1/orders/{second}/tracking"), None)
        .await;
    let history = tracking["data"]["history"].as_array().expect("history");
    let last = history.last().expect("cancel history row");
    assert_eq!(last["status"], json!("cancelled"));
    assert_eq!(last["changed_by"], json!("customer"));
    let events = tracking["data"]["events"].as_array().expect("events");
    assert_eq!(events.last().expect("cancel event")["event_type"], json!("returned"));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn processing_orders_can_no_longer_be_cancelled() {
    let app = TestApp::new().await;
    let (order_id, order_number) = place_order(&app, Uuid::new_v4(), false).await;
    set_status(&app, &order_id, "confirmed").await;
    set_status(&app, &order_id, "processing").await;

    let (status, body) = app
        .request_json(Method::POST, &format!("/api/v1/orders/{order_id}/cancel"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"].as_str().expect("error message"),
        format!("Invalid status: Order {order_number} cannot be cancelled in current status: processing")
    );
}

// ==================== Admin Update Tests ====================

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn admin_updates_set_tracking_fields() {
    let app = TestApp::new().await;
    let (order_id, _) = place_order(&app, Uuid::new_v4(), false).await;

    let (status, body) = app
        .request_json(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}"),
            Some(json!({
                "tracking_number": "1Z999AA10123456784",
                "carrier": "UPS",
                "notes": "Leave at the side door",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tracking_number"], json!("1Z999AA10123456784"));
    assert_eq!(body["data"]["carrier"], json!("UPS"));
    assert_eq!(body["data"]["notes"], json!("Leave at the side door"));

    // Tracking becomes available once a number is on file.
    let (_, tracking) = app
        .request_json(Method::GET, &format!("/api/v1/orders/{order_id}/tracking"), None)
        .await;
    assert_eq!(tracking["data"]["can_track"], json!(true));

    // A pre-assigned carrier survives the move to shipped.
    set_status(&app, &order_id, "confirmed").await;
    set_status(&app, &order_id, "processing").await;
    let (_, shipped) = set_status(&app, &order_id, "shipped").await;
    assert_eq!(shipped["data"]["carrier"], json!("UPS"));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn admin_updates_ride_the_same_state_machine() {
    let app = TestApp::new().await;
    let (order_id, order_number) = place_order(&app, Uuid::new_v4(), false).await;

    let (status, body) = app
        .request_json(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}"),
            Some(json!({"status": "delivered", "carrier": "UPS"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"].as_str().expect("error message"),
        format!("Invalid status: Order {order_number} cannot move from pending to delivered")
    );

    // The rejected update must not have applied its other fields.
    let (_, detail) = app
        .request_json(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert!(detail["data"]["order"]["carrier"].is_null());
}

// ==================== Refund Tests ====================

/// Walks a paid order to delivered so it becomes refundable.
async fn deliver_order(app: &TestApp, order_id: &str) {
    for step in ["confirmed", "processing", "shipped", "delivered"] {
        let (status, body) = set_status(app, order_id, step).await;
        assert_eq!(status, StatusCode::OK, "transition to {step} failed: {body}");
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn a_full_refund_moves_the_order_to_refunded() {
    let app = TestApp::new().await;
    let (order_id, _) = place_order(&app, Uuid::new_v4(), true).await;
    deliver_order(&app, &order_id).await;

    let (status, body) = app
        .request_json(Method::POST, &format!("/api/v1/orders/{order_id}/refund"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let refund = &body["data"];
    assert_eq!(refund["transaction_type"], json!("refund"));
    assert_eq!(refund["status"], json!("completed"));
    // Defaults to the order total: 75.00 + 6.00 tax, free standard shipping.
    assert_eq!(decimal(&refund["amount"]), dec!(81.00));
    // The refund goes back to the instrument the order was paid with.
    assert_eq!(refund["payment_method"], json!("credit_card"));

    let (_, detail) = app
        .request_json(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(detail["data"]["order"]["status"], json!("refunded"));
    assert_eq!(detail["data"]["order"]["payment_status"], json!("refunded"));
    // Payment plus refund are both on the order's transaction list.
    assert_eq!(detail["data"]["transactions"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn partial_refunds_are_labelled_as_such() {
    let app = TestApp::new().await;
    let (order_id, _) = place_order(&app, Uuid::new_v4(), true).await;
    deliver_order(&app, &order_id).await;

    let (status, body) = app
        .request_json(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/refund"),
            Some(json!({"amount": "20.00", "reason": "Chipped lid on arrival"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["transaction_type"], json!("partial_refund"));
    assert_eq!(decimal(&body["data"]["amount"]), dec!(20.00));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn refunds_cannot_exceed_the_order_total() {
    let app = TestApp::new().await;
    let (order_id, _) = place_order(&app, Uuid::new_v4(), true).await;
    deliver_order(&app, &order_id).await;

    let (status, body) = app
        .request_json(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/refund"),
            Some(json!({"amount": "500.00"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .expect("error message")
        .contains("cannot exceed order total"));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn unshipped_orders_cannot_be_refunded() {
    let app = TestApp::new().await;
    let (order_id, order_number) = place_order(&app, Uuid::new_v4(), true).await;

    let (status, body) = app
        .request_json(Method::POST, &format!("/api/v1/orders/{order_id}/refund"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"].as_str().expect("error message"),
        format!("Invalid status: Order {order_number} cannot be refunded in current status: pending")
    );
}

// ==================== Read Path Tests ====================

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn orders_are_readable_by_id_and_by_number() {
    let app = TestApp::new().await;
    let (order_id, order_number) = place_order(&app, Uuid::new_v4(), false).await;

    let (status, by_id) = app
        .request_json(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_id["data"]["order"]["order_number"], json!(order_number));
    assert_eq!(by_id["data"]["items"].as_array().map(Vec::len), Some(1));

    let (status, by_number) = app
        .request_json(
            Method::GET,
            &format!("/api/v1/orders/by-number/{order_number}"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_number["data"]["order"]["id"], json!(order_id));

    let (status, body) = app
        .request_json(Method::GET, "/api/v1/orders/by-number/ORD-DOESNOTEX", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Not Found"));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn order_items_require_an_existing_order() {
    let app = TestApp::new().await;
    let (order_id, _) = place_order(&app, Uuid::new_v4(), false).await;

    let (status, body) = app
        .request_json(Method::GET, &format!("/api/v1/orders/{order_id}/items"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().expect("order items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_name"], json!("Ceramic Teapot"));

    let (status, _) = app
        .request_json(
            Method::GET,
            &format!("/api/v1/orders/{}/items", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn listing_orders_paginates_and_filters_by_customer() {
    let app = TestApp::new().await;
    let customer = Uuid::new_v4();
    for _ in 0..3 {
        place_order(&app, customer, false).await;
    }
    place_order(&app, Uuid::new_v4(), false).await;

    let (status, page_one) = app
        .request_json(
            Method::GET,
            &format!("/api/v1/orders?customer_id={customer}&page=1&per_page=2"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page_one["data"]["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(page_one["data"]["pagination"]["total"], json!(3));
    assert_eq!(page_one["data"]["pagination"]["total_pages"], json!(2));

    let (_, page_two) = app
        .request_json(
            Method::GET,
            &format!("/api/v1/orders?customer_id={customer}&page=2&per_page=2"),
            None,
        )
        .await;
    assert_eq!(page_two["data"]["data"].as_array().map(Vec::len), Some(1));

    // Unfiltered, all four orders are visible.
    let (_, all) = app.request_json(Method::GET, "/api/v1/orders", None).await;
    assert_eq!(all["data"]["pagination"]["total"], json!(4));

    let (status, _) = app
        .request_json(
            Method::GET,
            &format!("/api/v1/orders/{}/tracking", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
