//! Integration tests for order listing, archive/delete and staff updates.
//!
//! Requires a running server + database; tests skip themselves otherwise.

use bookstall_integration_tests::TestEnv;
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

/// POST /orders directly, returning the response.
async fn direct_order(
    env: &TestEnv,
    client: &reqwest::Client,
    payment: i32,
    items: serde_json::Value,
) -> reqwest::Response {
    client
        .post(format!("{}/orders", env.base))
        .json(&json!({
            "shipping_address": "2 Integration Way",
            "payment_method_id": payment,
            "items": items,
        }))
        .send()
        .await
        .expect("direct order request failed")
}

#[tokio::test]
async fn direct_order_merges_duplicate_books() {
    let env = require_stack!();
    env.login_fresh_user(&env.client).await;
    let payment = env.payment_method_id().await;

    let book = env.seed_book(Decimal::new(800, 2), 10).await;

    let resp = direct_order(
        &env,
        &env.client,
        payment,
        json!([
            { "book_id": book, "quantity": 1 },
            { "book_id": book, "quantity": 2 },
        ]),
    )
    .await;
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.expect("body");
    let order_id = body["order_id"].as_i64().expect("order id");

    let detail: serde_json::Value = env
        .client
        .get(format!("{}/orders/{order_id}", env.base))
        .send()
        .await
        .expect("detail request failed")
        .json()
        .await
        .expect("detail body");
    let lines = detail["lines"].as_array().expect("lines");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"], 3);

    assert_eq!(env.book_stock(book).await, 7);
}

#[tokio::test]
async fn direct_order_validates_payload() {
    let env = require_stack!();
    env.login_fresh_user(&env.client).await;
    let payment = env.payment_method_id().await;

    let resp = direct_order(&env, &env.client, payment, json!([])).await;
    assert_eq!(resp.status(), 422);

    let book = env.seed_book(Decimal::new(800, 2), 10).await;
    let resp = direct_order(
        &env,
        &env.client,
        payment,
        json!([{ "book_id": book, "quantity": 0 }]),
    )
    .await;
    assert_eq!(resp.status(), 422);
}

#[tokio::test]
async fn direct_order_clears_active_cart() {
    let env = require_stack!();
    env.login_fresh_user(&env.client).await;
    let payment = env.payment_method_id().await;

    let in_cart = env.seed_book(Decimal::new(500, 2), 5).await;
    let ordered = env.seed_book(Decimal::new(700, 2), 5).await;
    env.add_to_cart(&env.client, in_cart, 1).await;

    let resp = direct_order(
        &env,
        &env.client,
        payment,
        json!([{ "book_id": ordered, "quantity": 1 }]),
    )
    .await;
    assert_eq!(resp.status(), 201);

    let cart = env.get_cart(&env.client).await;
    assert_eq!(cart["items"], json!([]));
}

#[tokio::test]
async fn unknown_book_fails_the_whole_order() {
    let env = require_stack!();
    env.login_fresh_user(&env.client).await;
    let payment = env.payment_method_id().await;

    let book = env.seed_book(Decimal::new(800, 2), 10).await;
    let resp = direct_order(
        &env,
        &env.client,
        payment,
        json!([
            { "book_id": book, "quantity": 1 },
            { "book_id": 0, "quantity": 1 },
        ]),
    )
    .await;
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.expect("error body");
    assert_eq!(body["error"], "not_found");

    assert_eq!(env.book_stock(book).await, 10);
}

#[tokio::test]
async fn listing_hides_archived_orders_by_default() {
    let env = require_stack!();
    env.login_fresh_user(&env.client).await;
    let payment = env.payment_method_id().await;

    let book = env.seed_book(Decimal::new(600, 2), 10).await;
    let mut order_ids = Vec::new();
    for _ in 0..2 {
        let resp = direct_order(
            &env,
            &env.client,
            payment,
            json!([{ "book_id": book, "quantity": 1 }]),
        )
        .await;
        let body: serde_json::Value = resp.json().await.expect("body");
        order_ids.push(body["order_id"].as_i64().expect("order id"));
    }

    let resp = env
        .client
        .patch(format!("{}/orders/{}/archive", env.base, order_ids[0]))
        .send()
        .await
        .expect("archive request failed");
    assert_eq!(resp.status(), 204);

    // Archiving again succeeds (idempotent)
    let resp = env
        .client
        .patch(format!("{}/orders/{}/archive", env.base, order_ids[0]))
        .send()
        .await
        .expect("second archive request failed");
    assert_eq!(resp.status(), 204);

    let visible: serde_json::Value = env
        .client
        .get(format!("{}/orders", env.base))
        .send()
        .await
        .expect("list request failed")
        .json()
        .await
        .expect("list body");
    let ids: Vec<i64> = visible
        .as_array()
        .expect("array")
        .iter()
        .map(|o| o["id"].as_i64().expect("id"))
        .collect();
    assert!(!ids.contains(&order_ids[0]));
    assert!(ids.contains(&order_ids[1]));

    let all: serde_json::Value = env
        .client
        .get(format!("{}/orders?include_archived=true", env.base))
        .send()
        .await
        .expect("list request failed")
        .json()
        .await
        .expect("list body");
    let ids: Vec<i64> = all
        .as_array()
        .expect("array")
        .iter()
        .map(|o| o["id"].as_i64().expect("id"))
        .collect();
    assert!(ids.contains(&order_ids[0]));
    assert!(ids.contains(&order_ids[1]));
}

#[tokio::test]
async fn orders_are_scoped_to_their_owner() {
    let env = require_stack!();
    let payment = env.payment_method_id().await;

    let owner = env.fresh_client();
    env.login_fresh_user(&owner).await;
    let book = env.seed_book(Decimal::new(600, 2), 10).await;
    let resp = direct_order(&env, &owner, payment, json!([{ "book_id": book, "quantity": 1 }])).await;
    let body: serde_json::Value = resp.json().await.expect("body");
    let order_id = body["order_id"].as_i64().expect("order id");

    let stranger = env.fresh_client();
    env.login_fresh_user(&stranger).await;
    let resp = stranger
        .get(format!("{}/orders/{order_id}", env.base))
        .send()
        .await
        .expect("detail request failed");
    assert_eq!(resp.status(), 404);

    let resp = stranger
        .patch(format!("{}/orders/{order_id}/archive", env.base))
        .send()
        .await
        .expect("archive request failed");
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn hard_delete_removes_order_from_history() {
    let env = require_stack!();
    env.login_fresh_user(&env.client).await;
    let payment = env.payment_method_id().await;

    let book = env.seed_book(Decimal::new(600, 2), 10).await;
    let resp = direct_order(
        &env,
        &env.client,
        payment,
        json!([{ "book_id": book, "quantity": 1 }]),
    )
    .await;
    let body: serde_json::Value = resp.json().await.expect("body");
    let order_id = body["order_id"].as_i64().expect("order id");

    let resp = env
        .client
        .delete(format!("{}/orders/{order_id}", env.base))
        .send()
        .await
        .expect("delete request failed");
    assert_eq!(resp.status(), 204);

    let resp = env
        .client
        .get(format!("{}/orders/{order_id}", env.base))
        .send()
        .await
        .expect("detail request failed");
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn status_updates_are_staff_only_and_partial() {
    let env = require_stack!();
    let payment = env.payment_method_id().await;

    let customer = env.fresh_client();
    let email = env.login_fresh_user(&customer).await;
    let book = env.seed_book(Decimal::new(600, 2), 10).await;
    let resp = direct_order(&env, &customer, payment, json!([{ "book_id": book, "quantity": 1 }])).await;
    let body: serde_json::Value = resp.json().await.expect("body");
    let order_id = body["order_id"].as_i64().expect("order id");

    // Customers cannot touch statuses
    let resp = customer
        .patch(format!("{}/orders/{order_id}/status", env.base))
        .json(&json!({ "order_status": "processing" }))
        .send()
        .await
        .expect("status request failed");
    assert_eq!(resp.status(), 403);

    env.promote_to_seller(&customer, &email).await;

    // Both fields omitted is a validation error
    let resp = customer
        .patch(format!("{}/orders/{order_id}/status", env.base))
        .json(&json!({}))
        .send()
        .await
        .expect("status request failed");
    assert_eq!(resp.status(), 422);

    // Unknown status values are rejected at the boundary
    let resp = customer
        .patch(format!("{}/orders/{order_id}/status", env.base))
        .json(&json!({ "order_status": "teleported" }))
        .send()
        .await
        .expect("status request failed");
    assert_eq!(resp.status(), 422);

    // Partial update applies
    let resp = customer
        .patch(format!("{}/orders/{order_id}/status", env.base))
        .json(&json!({ "order_status": "processing", "payment_status": "paid" }))
        .send()
        .await
        .expect("status request failed");
    assert_eq!(resp.status(), 200);

    let detail: serde_json::Value = customer
        .get(format!("{}/orders/{order_id}", env.base))
        .send()
        .await
        .expect("detail request failed")
        .json()
        .await
        .expect("detail body");
    assert_eq!(detail["order_status"], "processing");
    assert_eq!(detail["payment_status"], "paid");

    // Missing order is a 404, not a silent no-op
    let resp = customer
        .patch(format!("{}/orders/2147483646/status", env.base))
        .json(&json!({ "order_status": "processing" }))
        .send()
        .await
        .expect("status request failed");
    assert_eq!(resp.status(), 404);
}
