//! Integration tests for cart flows and the atomic checkout engine.
//!
//! Requires a running server + database; tests skip themselves otherwise.
//! See the crate docs for the environment variables involved.

use bookstall_core::OrderStatus;
use bookstall_integration_tests::{TestEnv, decimal_field};
use rust_decimal::Decimal;
use serde_json::json;

macro_rules! require_stack {
    () => {
        match TestEnv::try_new().await {
            Some(env) => env,
            None => return,
        }
    };
}

#[tokio::test]
async fn cart_requires_authentication() {
    let env = require_stack!();

    let anon = env.fresh_client();
    let resp = anon
        .get(format!("{}/cart", env.base))
        .send()
        .await
        .expect("request failed");
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn empty_cart_has_empty_shape() {
    let env = require_stack!();
    env.login_fresh_user(&env.client).await;

    let cart = env.get_cart(&env.client).await;
    assert!(cart["id"].is_null());
    assert_eq!(cart["items"], json!([]));
    assert_eq!(cart["summary"]["total_qty"], 0);
}

#[tokio::test]
async fn add_update_remove_line() {
    let env = require_stack!();
    env.login_fresh_user(&env.client).await;

    let book = env.seed_book(Decimal::new(1250, 2), 10).await;

    let resp = env.add_to_cart(&env.client, book, 1).await;
    assert_eq!(resp.status(), 201);

    let cart = env.get_cart(&env.client).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    let line_id = cart["items"][0]["id"].as_i64().expect("line id");
    assert_eq!(decimal_field(&cart["items"][0], "unit_price"), Decimal::new(1250, 2));

    // Adding the same book again merges quantities
    let resp = env.add_to_cart(&env.client, book, 2).await;
    assert_eq!(resp.status(), 201);
    let cart = env.get_cart(&env.client).await;
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(cart["summary"]["total_qty"], 3);

    // Set the quantity outright
    let resp = env
        .client
        .patch(format!("{}/cart/items/{line_id}", env.base))
        .json(&json!({ "quantity": 5 }))
        .send()
        .await
        .expect("update request failed");
    assert_eq!(resp.status(), 200);
    let cart = env.get_cart(&env.client).await;
    assert_eq!(cart["summary"]["total_qty"], 5);
    assert_eq!(decimal_field(&cart["summary"], "total_price"), Decimal::new(6250, 2));

    // Remove, then remove again
    let resp = env
        .client
        .delete(format!("{}/cart/items/{line_id}", env.base))
        .send()
        .await
        .expect("remove request failed");
    assert_eq!(resp.status(), 200);

    let resp = env
        .client
        .delete(format!("{}/cart/items/{line_id}", env.base))
        .send()
        .await
        .expect("second remove request failed");
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn add_beyond_stock_is_rejected_and_cart_unchanged() {
    let env = require_stack!();
    env.login_fresh_user(&env.client).await;

    let book = env.seed_book(Decimal::new(900, 2), 3).await;

    let resp = env.add_to_cart(&env.client, book, 5).await;
    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.expect("error body");
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["available"], 3);
    assert_eq!(body["book_id"], book);

    let cart = env.get_cart(&env.client).await;
    assert_eq!(cart["items"], json!([]));
}

#[tokio::test]
async fn clear_cart_is_idempotent() {
    let env = require_stack!();
    env.login_fresh_user(&env.client).await;

    // Clearing before a cart even exists succeeds
    let resp = env
        .client
        .delete(format!("{}/cart", env.base))
        .send()
        .await
        .expect("clear request failed");
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.expect("body");
    assert_eq!(body["message"], "Cart is already empty");

    let book = env.seed_book(Decimal::new(500, 2), 5).await;
    env.add_to_cart(&env.client, book, 1).await;

    let resp = env
        .client
        .delete(format!("{}/cart", env.base))
        .send()
        .await
        .expect("clear request failed");
    let body: serde_json::Value = resp.json().await.expect("body");
    assert_eq!(body["message"], "Cart cleared");

    let resp = env
        .client
        .delete(format!("{}/cart", env.base))
        .send()
        .await
        .expect("clear request failed");
    let body: serde_json::Value = resp.json().await.expect("body");
    assert_eq!(body["message"], "Cart is already empty");
}

#[tokio::test]
async fn checkout_freezes_prices_and_decrements_stock() {
    let env = require_stack!();
    env.login_fresh_user(&env.client).await;
    let payment = env.payment_method_id().await;

    // A: qty 2 @ 10.00, stock 5. B: qty 1 @ 20.00, stock 1.
    let book_a = env.seed_book(Decimal::new(1000, 2), 5).await;
    let book_b = env.seed_book(Decimal::new(2000, 2), 1).await;
    env.add_to_cart(&env.client, book_a, 2).await;
    env.add_to_cart(&env.client, book_b, 1).await;

    let resp = env.checkout(&env.client, payment).await;
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.expect("checkout body");
    assert_eq!(
        body["status"],
        serde_json::to_value(OrderStatus::AwaitingPayment).expect("status json")
    );
    let order_id = body["order_id"].as_i64().expect("order id");
    assert!(body["order_code"].as_str().expect("code").starts_with("BK-"));

    assert_eq!(env.book_stock(book_a).await, 3);
    assert_eq!(env.book_stock(book_b).await, 0);

    // Cart is cleared by the post-commit cleanup
    let cart = env.get_cart(&env.client).await;
    assert_eq!(cart["items"], json!([]));

    // Lines total 40.00; grand total = lines + shipping_cost
    let detail: serde_json::Value = env
        .client
        .get(format!("{}/orders/{order_id}", env.base))
        .send()
        .await
        .expect("detail request failed")
        .json()
        .await
        .expect("detail body");
    let lines_total: Decimal = detail["lines"]
        .as_array()
        .expect("lines")
        .iter()
        .map(|l| decimal_field(l, "subtotal"))
        .sum();
    assert_eq!(lines_total, Decimal::new(4000, 2));
    assert_eq!(
        decimal_field(&detail, "total_price"),
        lines_total + decimal_field(&detail, "shipping_cost")
    );
    assert_eq!(decimal_field(&detail, "total_price"), decimal_field(&body, "total"));

    // Price freeze: a later catalog change must not touch the order
    sqlx::query("UPDATE book SET price = 99.99 WHERE id = $1")
        .bind(book_a)
        .execute(&env.pool)
        .await
        .expect("price update failed");

    let detail: serde_json::Value = env
        .client
        .get(format!("{}/orders/{order_id}", env.base))
        .send()
        .await
        .expect("detail request failed")
        .json()
        .await
        .expect("detail body");
    let line_a = detail["lines"]
        .as_array()
        .expect("lines")
        .iter()
        .find(|l| l["book_id"] == book_a)
        .expect("line for book A");
    assert_eq!(decimal_field(line_a, "unit_price"), Decimal::new(1000, 2));
}

#[tokio::test]
async fn checkout_aborts_entirely_when_any_line_lacks_stock() {
    let env = require_stack!();
    env.login_fresh_user(&env.client).await;
    let payment = env.payment_method_id().await;

    let book_a = env.seed_book(Decimal::new(1000, 2), 5).await;
    let book_b = env.seed_book(Decimal::new(2000, 2), 1).await;
    env.add_to_cart(&env.client, book_a, 2).await;
    env.add_to_cart(&env.client, book_b, 1).await;

    // B sells out between add and checkout
    sqlx::query("UPDATE book SET stock = 0 WHERE id = $1")
        .bind(book_b)
        .execute(&env.pool)
        .await
        .expect("stock update failed");

    let resp = env.checkout(&env.client, payment).await;
    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.expect("error body");
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["book_id"], book_b);
    assert_eq!(body["available"], 0);

    // No partial decrement survives the rollback
    assert_eq!(env.book_stock(book_a).await, 5);

    // And no order was created
    let orders: serde_json::Value = env
        .client
        .get(format!("{}/orders", env.base))
        .send()
        .await
        .expect("list request failed")
        .json()
        .await
        .expect("list body");
    assert_eq!(orders, json!([]));
}

#[tokio::test]
async fn checkout_with_empty_cart_is_rejected() {
    let env = require_stack!();
    env.login_fresh_user(&env.client).await;
    let payment = env.payment_method_id().await;

    let resp = env.checkout(&env.client, payment).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.expect("error body");
    assert_eq!(body["error"], "invalid_state");
}

#[tokio::test]
async fn concurrent_checkouts_for_last_unit_yield_one_winner() {
    let env = require_stack!();
    let payment = env.payment_method_id().await;

    let book = env.seed_book(Decimal::new(1500, 2), 1).await;

    let first = env.fresh_client();
    let second = env.fresh_client();
    env.login_fresh_user(&first).await;
    env.login_fresh_user(&second).await;

    // Both adds pass the advisory check against stock 1
    assert_eq!(env.add_to_cart(&first, book, 1).await.status(), 201);
    assert_eq!(env.add_to_cart(&second, book, 1).await.status(), 201);

    let (a, b) = tokio::join!(
        env.checkout(&first, payment),
        env.checkout(&second, payment)
    );
    let statuses = [a.status().as_u16(), b.status().as_u16()];

    assert_eq!(
        statuses.iter().filter(|s| **s == 201).count(),
        1,
        "exactly one checkout must win: {statuses:?}"
    );
    assert_eq!(
        statuses.iter().filter(|s| **s == 409).count(),
        1,
        "the loser must see insufficient stock: {statuses:?}"
    );
    assert_eq!(env.book_stock(book).await, 0);
}
