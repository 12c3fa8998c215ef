//! Integration tests for checkout: explicit orders and cart conversion.
//!
//! Tests cover:
//! - Total derivation (subtotal, shipping by method, rounded tax)
//! - The free-shipping threshold and flat express/overnight rates
//! - Caller-supplied money overrides and their validation
//! - Payment capture and the recorded transaction
//! - Stock decrements and whole-order rollback on failure
//! - Cart checkout at current prices, with and without cart clearing
//! - The post-checkout status history and delivery event trail

mod common;

use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use storefront_api::entities::product;
use uuid::Uuid;

use common::{decimal, TestApp};

/// Builds the canonical three-line order payload: 2 x 29.99 + 5.50 + 100.00.
async fn canonical_items(app: &TestApp) -> (Vec<Value>, Vec<Uuid>) {
    let tea = app.seed_product("Oolong Sampler", dec!(29.99), 20).await;
    let filter = app.seed_product("Paper Filters", dec!(5.50), 20).await;
    let kettle = app.seed_product("Gooseneck Kettle", dec!(100.00), 20).await;
    let items = vec![
        json!({"product_id": tea.id, "quantity": 2}),
        json!({"product_id": filter.id, "quantity": 1}),
        json!({"product_id": kettle.id, "quantity": 1}),
    ];
    (items, vec![tea.id, filter.id, kettle.id])
}

fn order_payload(customer_id: Uuid, items: Vec<Value>) -> Value {
    json!({
        "customer_id": customer_id,
        "customer_name": "Dana Brook",
        "customer_email": "dana@example.com",
        "shipping_address": "4 Harbor Lane, Portsmouth",
        "items": items,
    })
}

async fn place_order(app: &TestApp, payload: Value) -> (StatusCode, Value) {
    app.request_json(Method::POST, "/api/v1/checkout/orders", Some(payload))
        .await
}

// ==================== Total Derivation Tests ====================

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn explicit_checkout_computes_the_canonical_totals() {
    let app = TestApp::new().await;
    let (items, _) = canonical_items(&app).await;

    let (status, body) = place_order(&app, order_payload(Uuid::new_v4(), items)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));

    let order = &body["data"]["order"];
    assert_eq!(decimal(&order["subtotal"]), dec!(165.48));
    assert_eq!(decimal(&order["shipping_cost"]), Decimal::ZERO);
    assert_eq!(decimal(&order["tax_amount"]), dec!(13.24));
    assert_eq!(decimal(&order["total_amount"]), dec!(178.72));
    assert_eq!(order["status"], json!("pending"));
    assert_eq!(order["payment_status"], json!("pending"));
    assert_eq!(order["shipping_method"], json!("standard"));

    let number = order["order_number"].as_str().expect("order number");
    assert!(number.starts_with("ORD-"), "unexpected number {number}");
    assert_eq!(number.len(), 12);

    assert_eq!(body["data"]["is_free_shipping"], json!(true));
    assert_eq!(body["data"]["shipping_duration"], json!("5-7 business days"));
    assert!(body["data"]["estimated_delivery_formatted"].is_string());
    // No payment block submitted, so no transaction was captured.
    assert!(body["data"]["transaction"].is_null());

    let lines = body["data"]["items"].as_array().expect("order lines");
    assert_eq!(lines.len(), 3);
    let tea_line = lines
        .iter()
        .find(|line| line["product_name"] == json!("Oolong Sampler"))
        .expect("tea line");
    assert_eq!(tea_line["quantity"], json!(2));
    assert_eq!(decimal(&tea_line["unit_price"]), dec!(29.99));
    assert_eq!(decimal(&tea_line["total_price"]), dec!(59.98));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn cheap_standard_orders_ship_at_no_cost_but_are_not_free() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Travel Mug", dec!(20.00), 5).await;

    let payload = order_payload(Uuid::new_v4(), vec![json!({"product_id": mug.id, "quantity": 1})]);
    let (status, body) = place_order(&app, payload).await;
    assert_eq!(status, StatusCode::CREATED);

    // Standard carries no base charge below the threshold, but the order
    // does not qualify for the free-shipping badge.
    assert_eq!(decimal(&body["data"]["order"]["shipping_cost"]), Decimal::ZERO);
    assert_eq!(body["data"]["is_free_shipping"], json!(false));
    assert_eq!(decimal(&body["data"]["order"]["tax_amount"]), dec!(1.60));
    assert_eq!(decimal(&body["data"]["order"]["total_amount"]), dec!(21.60));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn express_shipping_keeps_its_flat_rate_above_the_threshold() {
    let app = TestApp::new().await;
    let (items, _) = canonical_items(&app).await;

    let mut payload = order_payload(Uuid::new_v4(), items);
    // Display names are accepted alongside the bare method codes.
    payload["shipping_method"] = json!("Express Shipping");

    let (status, body) = place_order(&app, payload).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["order"]["shipping_method"], json!("express"));
    assert_eq!(decimal(&body["data"]["order"]["shipping_cost"]), dec!(15.99));
    assert_eq!(decimal(&body["data"]["order"]["total_amount"]), dec!(194.71));
    assert_eq!(body["data"]["is_free_shipping"], json!(false));
    assert_eq!(body["data"]["shipping_duration"], json!("2-3 business days"));
}

// ==================== Money Override Tests ====================

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn caller_money_overrides_are_stored_verbatim() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Travel Mug", dec!(20.00), 5).await;

    let mut payload = order_payload(Uuid::new_v4(), vec![json!({"product_id": mug.id, "quantity": 1})]);
    payload["subtotal"] = json!("18.00");
    payload["shipping_cost"] = json!("4.00");
    payload["tax_amount"] = json!("1.44");
    payload["total_amount"] = json!("23.44");

    let (status, body) = place_order(&app, payload).await;
    assert_eq!(status, StatusCode::CREATED);
    let order = &body["data"]["order"];
    assert_eq!(decimal(&order["subtotal"]), dec!(18.00));
    assert_eq!(decimal(&order["shipping_cost"]), dec!(4.00));
    assert_eq!(decimal(&order["tax_amount"]), dec!(1.44));
    assert_eq!(decimal(&order["total_amount"]), dec!(23.44));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn negative_money_overrides_are_rejected() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Travel Mug", dec!(20.00), 5).await;

    let mut payload = order_payload(Uuid::new_v4(), vec![json!({"product_id": mug.id, "quantity": 1})]);
    payload["subtotal"] = json!("-1.00");

    let (status, body) = place_order(&app, payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().expect("error message");
    assert!(
        message.contains("subtotal cannot be negative"),
        "unexpected message: {message}"
    );
}

// ==================== Payment Capture Tests ====================

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn payment_capture_records_a_completed_transaction() {
    let app = TestApp::new().await;
    let (items, _) = canonical_items(&app).await;

    let mut payload = order_payload(Uuid::new_v4(), items);
    payload["payment"] = json!({"method": "credit_card", "card_number": "4242424242424242"});

    let (status, body) = place_order(&app, payload).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["order"]["payment_status"], json!("completed"));

    let transaction = &body["data"]["transaction"];
    assert_eq!(transaction["transaction_type"], json!("payment"));
    assert_eq!(transaction["status"], json!("completed"));
    assert_eq!(transaction["payment_method"], json!("credit_card"));
    assert_eq!(decimal(&transaction["amount"]), dec!(178.72));
    // Only the last four digits of the card survive.
    assert_eq!(transaction["masked_payment_info"], json!("**** **** **** 4242"));
    let number = transaction["transaction_number"].as_str().expect("txn number");
    assert!(number.starts_with("TXN-"), "unexpected number {number}");
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn a_declined_card_rolls_back_the_whole_checkout() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Travel Mug", dec!(20.00), 10).await;
    let customer_id = Uuid::new_v4();

    let mut payload =
        order_payload(customer_id, vec![json!({"product_id": mug.id, "quantity": 2})]);
    payload["payment"] = json!({"method": "credit_card", "card_number": "not-a-card"});

    let (status, body) = place_order(&app, payload).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    let message = body["message"].as_str().expect("error message");
    assert!(
        message.contains("not accepted by the payment gateway"),
        "unexpected message: {message}"
    );

    // Nothing survives the failed payment: no order, no stock movement.
    let (_, detail) = app
        .request_json(Method::GET, &format!("/api/v1/products/{}", mug.id), None)
        .await;
    assert_eq!(detail["data"]["product"]["quantity"], json!(10));

    let (_, orders) = app
        .request_json(
            Method::GET,
            &format!("/api/v1/orders?customer_id={customer_id}"),
            None,
        )
        .await;
    assert_eq!(orders["data"]["pagination"]["total"], json!(0));
}

// ==================== Stock Adjustment Tests ====================

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn checkout_decrements_tracked_stock() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Travel Mug", dec!(20.00), 10).await;

    let payload = order_payload(Uuid::new_v4(), vec![json!({"product_id": mug.id, "quantity": 3})]);
    let (status, _) = place_order(&app, payload).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .request_json(Method::GET, &format!("/api/v1/products/{}", mug.id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["product"]["quantity"], json!(7));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn untracked_products_keep_their_quantity() {
    let app = TestApp::new().await;
    let download = app.seed_untracked_product("Brewing Guide PDF", dec!(9.00)).await;

    let payload =
        order_payload(Uuid::new_v4(), vec![json!({"product_id": download.id, "quantity": 4})]);
    let (status, _) = place_order(&app, payload).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app
        .request_json(Method::GET, &format!("/api/v1/products/{}", download.id), None)
        .await;
    assert_eq!(body["data"]["product"]["quantity"], json!(0));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn variant_lines_freeze_the_variant_and_decrement_its_stock() {
    let app = TestApp::new().await;
    let shirt = app.seed_product("Logo Shirt", dec!(18.00), 50).await;
    let large = app
        .seed_variant(shirt.id, "Large", Some(dec!(21.00)), 6)
        .await;

    let payload = order_payload(
        Uuid::new_v4(),
        vec![json!({"product_id": shirt.id, "variant_id": large.id, "quantity": 2})],
    );
    let (status, body) = place_order(&app, payload).await;
    assert_eq!(status, StatusCode::CREATED);

    let line = &body["data"]["items"][0];
    assert_eq!(decimal(&line["unit_price"]), dec!(21.00));
    assert_eq!(line["sku"], json!(large.sku));

    let (_, detail) = app
        .request_json(Method::GET, &format!("/api/v1/products/{}", shirt.id), None)
        .await;
    // The variant's stock moves; the parent product's does not.
    assert_eq!(detail["data"]["product"]["quantity"], json!(50));
    assert_eq!(detail["data"]["variants"][0]["quantity"], json!(4));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn a_failing_line_rolls_back_the_whole_order() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Travel Mug", dec!(20.00), 10).await;
    let scarce = app.seed_product("Limited Teapot", dec!(80.00), 1).await;
    let customer_id = Uuid::new_v4();

    let payload = order_payload(
        customer_id,
        vec![
            json!({"product_id": mug.id, "quantity": 2}),
            json!({"product_id": scarce.id, "quantity": 5}),
        ],
    );
    let (status, body) = place_order(&app, payload).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let message = body["message"].as_str().expect("error message");
    assert!(
        message.contains("requested 5, available 1"),
        "unexpected message: {message}"
    );

    // The first line's decrement must not survive the rollback.
    let (_, detail) = app
        .request_json(Method::GET, &format!("/api/v1/products/{}", mug.id), None)
        .await;
    assert_eq!(detail["data"]["product"]["quantity"], json!(10));

    let (_, orders) = app
        .request_json(
            Method::GET,
            &format!("/api/v1/orders?customer_id={customer_id}"),
            None,
        )
        .await;
    assert_eq!(orders["data"]["pagination"]["total"], json!(0));
    assert_eq!(orders["data"]["data"].as_array().map(Vec::len), Some(0));
}

// ==================== Cart Checkout Tests ====================

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn cart_checkout_charges_current_catalog_prices() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Travel Mug", dec!(20.00), 10).await;

    let (_, cart) = app
        .request_json(
            Method::POST,
            "/api/v1/carts",
            Some(json!({"customer_id": Uuid::new_v4()})),
        )
        .await;
    let cart_id = cart["data"]["id"].as_str().expect("cart id").to_string();
    app.request_json(
        Method::POST,
        &format!("/api/v1/carts/{cart_id}/items"),
        Some(json!({"product_id": mug.id, "quantity": 2})),
    )
    .await;

    // Reprice after the line was added; checkout bills the current price.
    let mut active: product::ActiveModel = mug.into();
    active.price = Set(dec!(25.00));
    active
        .update(&*app.state.db)
        .await
        .expect("reprice product");

    let (status, body) = app
        .request_json(
            Method::POST,
            &format!("/api/v1/checkout/cart/{cart_id}"),
            Some(json!({
                "customer_name": "Dana Brook",
                "customer_email": "dana@example.com",
                "shipping_address": "4 Harbor Lane, Portsmouth",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(decimal(&body["data"]["items"][0]["unit_price"]), dec!(25.00));
    assert_eq!(decimal(&body["data"]["order"]["subtotal"]), dec!(50.00));

    // Clearing is off by default, so the cart still holds its line.
    let (_, cart) = app
        .request_json(Method::GET, &format!("/api/v1/carts/{cart_id}"), None)
        .await;
    assert_eq!(cart["data"]["item_count"], json!(2));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn cart_checkout_can_clear_the_cart_when_configured() {
    let app = TestApp::new_with(|cfg| cfg.clear_cart_after_checkout = true).await;
    let mug = app.seed_product("Travel Mug", dec!(20.00), 10).await;

    let (_, cart) = app
        .request_json(
            Method::POST,
            "/api/v1/carts",
            Some(json!({"customer_id": Uuid::new_v4()})),
        )
        .await;
    let cart_id = cart["data"]["id"].as_str().expect("cart id").to_string();
    app.request_json(
        Method::POST,
        &format!("/api/v1/carts/{cart_id}/items"),
        Some(json!({"product_id": mug.id, "quantity": 1})),
    )
    .await;

    let (status, _) = app
        .request_json(
            Method::POST,
            &format!("/api/v1/checkout/cart/{cart_id}"),
            Some(json!({
                "customer_name": "Dana Brook",
                "customer_email": "dana@example.com",
                "shipping_address": "4 Harbor Lane, Portsmouth",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, cart) = app
        .request_json(Method::GET, &format!("/api/v1/carts/{cart_id}"), None)
        .await;
    assert_eq!(cart["data"]["item_count"], json!(0));
    assert_eq!(decimal(&cart["data"]["total_price"]), Decimal::ZERO);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn an_empty_cart_cannot_be_checked_out() {
    let app = TestApp::new().await;

    let (_, cart) = app
        .request_json(
            Method::POST,
            "/api/v1/carts",
            Some(json!({"customer_id": Uuid::new_v4()})),
        )
        .await;
    let cart_id = cart["data"]["id"].as_str().expect("cart id");

    let (status, body) = app
        .request_json(
            Method::POST,
            &format!("/api/v1/checkout/cart/{cart_id}"),
            Some(json!({
                "customer_name": "Dana Brook",
                "customer_email": "dana@example.com",
                "shipping_address": "4 Harbor Lane, Portsmouth",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().expect("error message");
    assert!(
        message.contains("Cannot check out an empty cart"),
        "unexpected message: {message}"
    );
}

// ==================== Validation Tests ====================

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn malformed_orders_are_rejected_up_front() {
    let app = TestApp::new().await;
    let mug = app.seed_product("Travel Mug", dec!(20.00), 5).await;

    let mut bad_email = order_payload(Uuid::new_v4(), vec![json!({"product_id": mug.id, "quantity": 1})]);
    bad_email["customer_email"] = json!("not-an-email");
    let (status, _) = place_order(&app, bad_email).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let no_items = order_payload(Uuid::new_v4(), vec![]);
    let (status, _) = place_order(&app, no_items).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ==================== Checkout Trail Tests ====================

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn checkout_writes_the_initial_history_and_delivery_trail() {
    let app = TestApp::new().await;
    let (items, _) = canonical_items(&app).await;

    let (_, body) = place_order(&app, order_payload(Uuid::new_v4(), items)).await;
    let order_id = body["data"]["order"]["id"].as_str().expect("order id").to_string();

    let (status, tracking) = app
        .request_json(Method::GET, &format!("/api/v1/orders/{order_id}/tracking"), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let history = tracking["data"]["history"].as_array().expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], json!("pending"));
    let comment = history[0]["comment"].as_str().expect("history comment");
    assert!(comment.contains("Standard Shipping"), "unexpected comment: {comment}");

    let events = tracking["data"]["events"].as_array().expect("events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_type"], json!("picked_up"));
    assert_eq!(events[0]["location"], json!("Processing Center"));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore = "requires the mock-tests sqlite environment")]
async fn priority_shipments_get_an_extra_transit_event() {
    let app = TestApp::new().await;
    let (items, _) = canonical_items(&app).await;

    let mut payload = order_payload(Uuid::new_v4(), items);
    payload["shipping_method"] = json!("overnight");
    let (_, body) = place_order(&app, payload).await;
    let order_id = body["data"]["order"]["id"].as_str().expect("order id").to_string();

    let (_, tracking) = app
        .request_json(Method::GET, &format!("/api/v1/orders/{order_id}/tracking"), None)
        .await;
    let events = tracking["data"]["events"].as_array().expect("events");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event_type"], json!("picked_up"));
    assert_eq!(events[1]["event_type"], json!("in_transit"));
    assert_eq!(events[1]["location"], json!("Shipping Facility"));
    assert_eq!(decimal(&body["data"]["order"]["shipping_cost"]), dec!(29.99));
}
