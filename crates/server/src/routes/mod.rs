//! HTTP route handlers for the Bookstall API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                 - Liveness check
//! GET    /health/ready           - Readiness check (database ping)
//! GET    /payment-methods        - Active payment methods (public)
//!
//! # Auth
//! POST   /auth/register          - Create account
//! POST   /auth/login             - Session login
//! POST   /auth/logout            - Session logout
//!
//! # Cart (requires auth)
//! GET    /cart                   - Cart snapshot with summary
//! POST   /cart/items             - Add line (merges by book)
//! PATCH  /cart/items/{id}        - Set line quantity
//! DELETE /cart/items/{id}        - Remove line
//! DELETE /cart                   - Clear cart (idempotent)
//! POST   /cart/checkout          - Atomic cart-to-order conversion
//!
//! # Orders (requires auth)
//! POST   /orders                 - Direct order from an explicit item list
//! GET    /orders                 - Own orders, newest first (?include_archived=true)
//! GET    /orders/{id}            - Order detail
//! PATCH  /orders/{id}/archive    - Soft delete
//! DELETE /orders/{id}            - Hard delete, archive fallback on FK block
//!
//! # Staff only
//! PATCH  /orders/{id}/status     - Partial order/payment status update
//! ```

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;

use axum::{
    Router,
    routing::{get, patch, post},
};
use serde::Serialize;

use crate::state::AppState;

/// Simple message payload returned by mutations that have nothing better
/// to say.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub(crate) const fn new(message: &'static str) -> Self {
        Self { message }
    }
}

/// Create the full application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payment-methods", get(catalog::payment_methods))
        .nest("/auth", auth_routes())
        .nest("/cart", cart_routes())
        .merge(order_routes())
}

/// Create the auth routes router.
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create the cart routes router.
fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add_item))
        .route(
            "/items/{id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/checkout", post(cart::checkout))
}

/// Create the order routes router.
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(orders::create).get(orders::list))
        .route("/orders/{id}", get(orders::detail).delete(orders::delete))
        .route("/orders/{id}/archive", patch(orders::archive))
        .route("/orders/{id}/status", patch(orders::update_status))
}
