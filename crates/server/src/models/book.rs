//! Catalog read models.

use rust_decimal::Decimal;
use serde::Serialize;

use bookstall_core::{BookId, PaymentMethodId};

/// Live catalog state for a single book, as seen by cart validation.
///
/// This is a point-in-time read: price and stock may change between the
/// snapshot and checkout, which is why checkout re-validates transactionally.
#[derive(Debug, Clone, Serialize)]
pub struct BookSnapshot {
    pub id: BookId,
    pub title: String,
    pub price: Decimal,
    pub stock: i32,
    pub active: bool,
}

/// Payment method reference data.
///
/// The `active` flag gates whether the method is selectable at checkout.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
}
