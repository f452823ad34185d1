//! Order models.
//!
//! Orders are append-mostly: everything except the status fields and the
//! archive flag is frozen at creation time.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bookstall_core::{
    BookId, OrderCode, OrderId, OrderLineId, OrderStatus, PaymentMethodId, PaymentStatus, UserId,
};

/// A (book, quantity) pair fed into the checkout engine: re-read from the
/// cart at checkout, or supplied explicitly via `POST /orders`.
#[derive(Debug, Clone, Copy, Deserialize, sqlx::FromRow)]
pub struct OrderItemInput {
    pub book_id: BookId,
    pub quantity: i32,
}

/// Order header.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub order_code: OrderCode,
    pub user_id: UserId,
    pub shipping_address: String,
    pub note: Option<String>,
    /// Grand total frozen at checkout: line subtotals plus shipping.
    pub total_price: Decimal,
    pub shipping_cost: Decimal,
    pub payment_method_id: PaymentMethodId,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line in an order. `unit_price` is frozen at order creation and never
/// recomputed, whatever later happens to the catalog price.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub book_id: BookId,
    pub book_title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// Order header plus its lines, as returned by list and detail endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithLines {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
}

/// What the checkout engine hands back on success.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSummary {
    pub order_id: OrderId,
    pub order_code: OrderCode,
    pub total: Decimal,
    pub status: OrderStatus,
}

/// Outcome of a hard-delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Order and lines removed.
    Deleted,
    /// Blocked by referential integrity; archived instead.
    Archived,
}
