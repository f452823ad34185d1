//! Order storage and the atomic checkout engine.
//!
//! `create_order_atomic` is the single enforcement point for the stock
//! invariant: every decrement happens inside one transaction as a conditional
//! `stock = stock - qty WHERE stock >= qty`, checked for an affected row.
//! Cart-level stock checks elsewhere are advisory only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use bookstall_core::{
    BookId, OrderCode, OrderId, OrderLineId, OrderStatus, PaymentMethodId, PaymentStatus, UserId,
};

use super::RepositoryError;
use crate::models::order::{
    CheckoutSummary, DeleteOutcome, Order, OrderItemInput, OrderLine, OrderWithLines,
};

/// Attempts at generating a unique order code before giving up.
const ORDER_CODE_MAX_ATTEMPTS: u32 = 5;

/// Reasons a checkout can be rejected or fail.
///
/// Everything except `Repository` and `CodeSpaceExhausted` is a client-facing
/// rejection carrying enough detail to adjust and retry.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no lines (or the explicit item list was empty).
    #[error("cart is empty")]
    EmptyCart,

    /// Payment method missing or not active.
    #[error("payment method missing or inactive")]
    PaymentMethodUnavailable,

    /// A referenced book does not exist.
    #[error("book {0} not found")]
    BookNotFound(BookId),

    /// A referenced book exists but is not active.
    #[error("book {0} is not active")]
    BookInactive(BookId),

    /// Requested quantity exceeds the stock at commit time.
    #[error("insufficient stock for book {book_id}: {available} available")]
    InsufficientStock { book_id: BookId, available: i32 },

    /// Could not find a free order code within the retry limit.
    #[error("order code space exhausted after {ORDER_CODE_MAX_ATTEMPTS} attempts")]
    CodeSpaceExhausted,

    /// Storage failure; the transaction was rolled back.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Merge duplicate book ids and sort ascending.
///
/// Sorting gives every checkout the same per-book locking order, so two
/// transactions touching overlapping books cannot deadlock on each other.
fn merge_items(items: &[OrderItemInput]) -> Vec<OrderItemInput> {
    let mut merged: std::collections::BTreeMap<BookId, i32> = std::collections::BTreeMap::new();
    for item in items {
        *merged.entry(item.book_id).or_insert(0) += item.quantity;
    }

    merged
        .into_iter()
        .map(|(book_id, quantity)| OrderItemInput { book_id, quantity })
        .collect()
}

/// Internal row type for order headers.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_code: String,
    user_id: UserId,
    shipping_address: String,
    note: Option<String>,
    total_price: Decimal,
    shipping_cost: Decimal,
    payment_method_id: PaymentMethodId,
    order_status: OrderStatus,
    payment_status: PaymentStatus,
    is_archived: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            order_code: OrderCode::from_string(row.order_code),
            user_id: row.user_id,
            shipping_address: row.shipping_address,
            note: row.note,
            total_price: row.total_price,
            shipping_cost: row.shipping_cost,
            payment_method_id: row.payment_method_id,
            order_status: row.order_status,
            payment_status: row.payment_status,
            is_archived: row.is_archived,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for order lines.
#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    id: OrderLineId,
    order_id: OrderId,
    book_id: BookId,
    book_title: String,
    quantity: i32,
    unit_price: Decimal,
    subtotal: Decimal,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            book_id: row.book_id,
            book_title: row.book_title,
            quantity: row.quantity,
            unit_price: row.unit_price,
            subtotal: row.subtotal,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookDiagRow {
    stock: i32,
    active: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct InsertedOrderRow {
    id: OrderId,
    order_status: OrderStatus,
}

/// Repository for order creation, listing and lifecycle updates.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Atomically convert an item list into an order.
    ///
    /// All steps run in one transaction: payment method validation, per-book
    /// conditional stock decrement, total computation at commit-time prices,
    /// order + line insertion with a unique order code. Any rejection rolls
    /// the whole thing back; no partial decrement or partial order survives.
    ///
    /// # Errors
    ///
    /// Returns the specific [`CheckoutError`] for the first violating item,
    /// or `CheckoutError::Repository` on storage failure.
    pub async fn create_order_atomic(
        &self,
        user_id: UserId,
        shipping_address: &str,
        note: Option<&str>,
        payment_method_id: PaymentMethodId,
        items: &[OrderItemInput],
        shipping_cost: Decimal,
    ) -> Result<CheckoutSummary, CheckoutError> {
        let items = merge_items(items);
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut tx = self.pool.begin().await?;

        // Payment method must exist and be selectable.
        let pm_active: Option<bool> =
            sqlx::query_scalar("SELECT active FROM payment_method WHERE id = $1")
                .bind(payment_method_id)
                .fetch_optional(&mut *tx)
                .await?;
        if pm_active != Some(true) {
            return Err(CheckoutError::PaymentMethodUnavailable);
        }

        // Decrement stock per book, ascending id. The WHERE clause is the
        // oversell guard: zero affected rows means the book is gone, inactive,
        // or short on stock, and the diagnosis query tells us which.
        let mut lines_total = Decimal::ZERO;
        let mut priced_items: Vec<(OrderItemInput, Decimal)> = Vec::with_capacity(items.len());

        for item in &items {
            let price: Option<Decimal> = sqlx::query_scalar(
                r"
                UPDATE book
                SET stock = stock - $2, updated_at = now()
                WHERE id = $1 AND active AND stock >= $2
                RETURNING price
                ",
            )
            .bind(item.book_id)
            .bind(item.quantity)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(price) = price else {
                let diag = sqlx::query_as::<_, BookDiagRow>(
                    "SELECT stock, active FROM book WHERE id = $1",
                )
                .bind(item.book_id)
                .fetch_optional(&mut *tx)
                .await?;

                return Err(match diag {
                    None => CheckoutError::BookNotFound(item.book_id),
                    Some(d) if !d.active => CheckoutError::BookInactive(item.book_id),
                    Some(d) => CheckoutError::InsufficientStock {
                        book_id: item.book_id,
                        available: d.stock,
                    },
                });
            };

            lines_total += price * Decimal::from(item.quantity);
            priced_items.push((*item, price));
        }

        let total_price = lines_total + shipping_cost;

        // Insert the order header, regenerating the code on a collision.
        let mut attempt = 0;
        let (order_id, order_code, order_status) = loop {
            attempt += 1;
            let code = OrderCode::generate(Utc::now());

            let inserted = sqlx::query_as::<_, InsertedOrderRow>(
                r"
                INSERT INTO orders (
                    order_code, user_id, shipping_address, note,
                    total_price, shipping_cost, payment_method_id
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, order_status
                ",
            )
            .bind(code.as_str())
            .bind(user_id)
            .bind(shipping_address)
            .bind(note)
            .bind(total_price)
            .bind(shipping_cost)
            .bind(payment_method_id)
            .fetch_one(&mut *tx)
            .await;

            match inserted {
                Ok(row) => break (row.id, code, row.order_status),
                Err(sqlx::Error::Database(db_err))
                    if db_err.is_unique_violation()
                        && db_err.constraint() == Some("orders_order_code_key") =>
                {
                    if attempt >= ORDER_CODE_MAX_ATTEMPTS {
                        return Err(CheckoutError::CodeSpaceExhausted);
                    }
                    tracing::debug!(attempt, "order code collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        };

        // Freeze line prices and titles as they stand right now.
        for (item, price) in &priced_items {
            sqlx::query(
                r"
                INSERT INTO order_line (
                    order_id, book_id, book_title, quantity, unit_price, subtotal
                )
                SELECT $1, b.id, b.title, $3, $4, $3 * $4
                FROM book b
                WHERE b.id = $2
                ",
            )
            .bind(order_id)
            .bind(item.book_id)
            .bind(item.quantity)
            .bind(price)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(CheckoutSummary {
            order_id,
            order_code,
            total: total_price,
            status: order_status,
        })
    }

    /// List a user's orders, newest first.
    ///
    /// Archived orders are hidden unless `include_archived`; rows predating
    /// the archive column (NULL) count as not archived.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        include_archived: bool,
    ) -> Result<Vec<OrderWithLines>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, order_code, user_id, shipping_address, note,
                   total_price, shipping_cost, payment_method_id,
                   order_status, payment_status,
                   COALESCE(is_archived, FALSE) AS is_archived,
                   created_at, updated_at
            FROM orders
            WHERE user_id = $1
              AND ($2 OR COALESCE(is_archived, FALSE) = FALSE)
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id)
        .bind(include_archived)
        .fetch_all(self.pool)
        .await?;

        let orders: Vec<Order> = rows.into_iter().map(Order::from).collect();
        self.attach_lines(orders).await
    }

    /// Fetch one of the user's orders with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<OrderWithLines>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT id, order_code, user_id, shipping_address, note,
                   total_price, shipping_cost, payment_method_id,
                   order_status, payment_status,
                   COALESCE(is_archived, FALSE) AS is_archived,
                   created_at, updated_at
            FROM orders
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => {
                let mut with_lines = self.attach_lines(vec![Order::from(r)]).await?;
                Ok(with_lines.pop())
            }
            None => Ok(None),
        }
    }

    /// Staff partial status update. Returns `false` if the order is missing.
    ///
    /// At least one of the two statuses must be provided; callers enforce
    /// that before reaching the repository.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn update_status(
        &self,
        order_id: OrderId,
        order_status: Option<OrderStatus>,
        payment_status: Option<PaymentStatus>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders
            SET order_status   = COALESCE($2, order_status),
                payment_status = COALESCE($3, payment_status),
                updated_at     = now()
            WHERE id = $1
            ",
        )
        .bind(order_id)
        .bind(order_status)
        .bind(payment_status)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete one of the user's orders. Idempotent: archiving an
    /// already-archived order succeeds and keeps the original `archived_at`.
    /// Returns `false` if the order is missing or not owned by the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn archive(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders
            SET is_archived = TRUE,
                archived_at = COALESCE(archived_at, now()),
                updated_at  = now()
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(order_id)
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Hard-delete one of the user's orders and its lines.
    ///
    /// If the delete is blocked by a foreign-key reference from elsewhere,
    /// the order is archived instead of failing the request.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order is missing or not
    /// owned by the user, `RepositoryError::Database` on other failures.
    pub async fn delete(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<DeleteOutcome, RepositoryError> {
        let owned: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM orders WHERE id = $1 AND user_id = $2")
                .bind(order_id)
                .bind(user_id)
                .fetch_optional(self.pool)
                .await?;
        if owned.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let deleted = self.try_hard_delete(order_id).await;
        match deleted {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                tracing::info!(
                    order_id = %order_id,
                    "hard delete blocked by foreign key, archiving instead"
                );
                self.archive(user_id, order_id).await?;
                Ok(DeleteOutcome::Archived)
            }
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    /// Delete lines then the order inside one transaction.
    async fn try_hard_delete(&self, order_id: OrderId) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM order_line WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await
    }

    /// Load lines for a batch of orders and zip them together.
    async fn attach_lines(
        &self,
        orders: Vec<Order>,
    ) -> Result<Vec<OrderWithLines>, RepositoryError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = orders.iter().map(|o| o.id.as_i32()).collect();
        let rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT id, order_id, book_id, book_title, quantity, unit_price, subtotal
            FROM order_line
            WHERE order_id = ANY($1)
            ORDER BY order_id, id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: std::collections::HashMap<OrderId, Vec<OrderLine>> =
            std::collections::HashMap::new();
        for row in rows {
            by_order
                .entry(row.order_id)
                .or_default()
                .push(OrderLine::from(row));
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let lines = by_order.remove(&order.id).unwrap_or_default();
                OrderWithLines { order, lines }
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(book: i32, qty: i32) -> OrderItemInput {
        OrderItemInput {
            book_id: BookId::new(book),
            quantity: qty,
        }
    }

    #[test]
    fn test_merge_items_combines_duplicates() {
        let merged = merge_items(&[item(2, 1), item(1, 2), item(2, 3)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].book_id, BookId::new(1));
        assert_eq!(merged[0].quantity, 2);
        assert_eq!(merged[1].book_id, BookId::new(2));
        assert_eq!(merged[1].quantity, 4);
    }

    #[test]
    fn test_merge_items_sorts_ascending() {
        let merged = merge_items(&[item(9, 1), item(3, 1), item(7, 1)]);
        let ids: Vec<i32> = merged.iter().map(|i| i.book_id.as_i32()).collect();
        assert_eq!(ids, vec![3, 7, 9]);
    }

    #[test]
    fn test_merge_items_empty() {
        assert!(merge_items(&[]).is_empty());
    }

    #[test]
    fn test_checkout_error_messages() {
        let err = CheckoutError::InsufficientStock {
            book_id: BookId::new(5),
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for book 5: 2 available"
        );
        assert_eq!(
            CheckoutError::BookNotFound(BookId::new(5)).to_string(),
            "book 5 not found"
        );
    }
}
