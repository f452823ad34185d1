//! Cart models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use bookstall_core::{BookId, CartId, CartLineId, CartStatus};

/// Cart header row.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub id: CartId,
    pub status: CartStatus,
    pub created_at: DateTime<Utc>,
}

/// A line in the cart.
///
/// `unit_price` is a live snapshot: it is re-read from the catalog on every
/// mutation, so the displayed total tracks current pricing until checkout
/// freezes it.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub book_id: BookId,
    pub book_title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Totals over a cart's lines.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CartSummary {
    pub total_qty: i64,
    pub total_price: Decimal,
}

impl CartSummary {
    /// Compute totals from a set of lines.
    #[must_use]
    pub fn of(lines: &[CartLine]) -> Self {
        Self {
            total_qty: lines.iter().map(|l| i64::from(l.quantity)).sum(),
            total_price: lines.iter().map(|l| l.subtotal).sum(),
        }
    }
}

/// Full cart snapshot returned by `GET /cart`.
///
/// A user with no active cart gets the empty shape (no id, zero totals)
/// rather than an error.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub id: Option<CartId>,
    pub status: Option<CartStatus>,
    pub created_at: Option<DateTime<Utc>>,
    pub summary: CartSummary,
    pub items: Vec<CartLine>,
}

impl CartView {
    /// The shape returned when the user has no active cart.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            id: None,
            status: None,
            created_at: None,
            summary: CartSummary::default(),
            items: Vec::new(),
        }
    }

    /// Build a view from a cart header and its lines.
    #[must_use]
    pub fn from_parts(cart: &Cart, items: Vec<CartLine>) -> Self {
        Self {
            id: Some(cart.id),
            status: Some(cart.status),
            created_at: Some(cart.created_at),
            summary: CartSummary::of(&items),
            items,
        }
    }
}
