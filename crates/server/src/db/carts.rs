//! Cart storage: one active cart per user, lines keyed by book.
//!
//! Stock checks do not live here. The cart layer stores whatever quantities
//! the route handlers validated against the live catalog; the checkout
//! transaction re-validates with transactional strength.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bookstall_core::{BookId, CartId, CartLineId, CartStatus, UserId};

use super::RepositoryError;
use crate::models::cart::{Cart, CartLine};
use crate::models::order::OrderItemInput;

/// Internal row type for cart headers.
#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: CartId,
    status: CartStatus,
    created_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for cart lines joined with the book title.
#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: CartLineId,
    book_id: BookId,
    book_title: String,
    quantity: i32,
    unit_price: Decimal,
    subtotal: Decimal,
    created_at: DateTime<Utc>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            id: row.id,
            book_id: row.book_id,
            book_title: row.book_title,
            quantity: row.quantity,
            unit_price: row.unit_price,
            subtotal: row.subtotal,
            created_at: row.created_at,
        }
    }
}

/// A line located inside a specific cart, for mutation checks.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct LineRef {
    pub id: CartLineId,
    pub book_id: BookId,
    pub quantity: i32,
}

/// Repository for cart operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's active cart, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT id, status, created_at
            FROM cart
            WHERE user_id = $1 AND status = 'active'
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Cart::from))
    }

    /// Get the user's active cart id, creating the cart if none exists.
    ///
    /// The upsert targets the partial unique index on `(user_id) WHERE
    /// status = 'active'`, so two concurrent first-adds resolve to the same
    /// cart instead of each inserting their own.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn get_or_create_active(&self, user_id: UserId) -> Result<CartId, RepositoryError> {
        let id: CartId = sqlx::query_scalar(
            r"
            INSERT INTO cart (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) WHERE status = 'active'
            DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// All lines of a cart, oldest first, with book titles for display.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, cart_id: CartId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT cl.id, cl.book_id, b.title AS book_title,
                   cl.quantity, cl.unit_price, cl.subtotal, cl.created_at
            FROM cart_line cl
            JOIN book b ON b.id = cl.book_id
            WHERE cl.cart_id = $1
            ORDER BY cl.created_at, cl.id
            ",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    /// The (book, quantity) pairs checkout needs, ignoring display columns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn checkout_items(
        &self,
        cart_id: CartId,
    ) -> Result<Vec<OrderItemInput>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderItemInput>(
            r"
            SELECT book_id, quantity
            FROM cart_line
            WHERE cart_id = $1
            ",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Locate a line by id within a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn line(
        &self,
        cart_id: CartId,
        line_id: CartLineId,
    ) -> Result<Option<LineRef>, RepositoryError> {
        let row = sqlx::query_as::<_, LineRef>(
            r"
            SELECT id, book_id, quantity
            FROM cart_line
            WHERE cart_id = $1 AND id = $2
            ",
        )
        .bind(cart_id)
        .bind(line_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Locate a line by book within a cart (merge target for add-to-cart).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn line_for_book(
        &self,
        cart_id: CartId,
        book_id: BookId,
    ) -> Result<Option<LineRef>, RepositoryError> {
        let row = sqlx::query_as::<_, LineRef>(
            r"
            SELECT id, book_id, quantity
            FROM cart_line
            WHERE cart_id = $1 AND book_id = $2
            ",
        )
        .bind(cart_id)
        .bind(book_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Insert a new line with a fresh price snapshot.
    ///
    /// The `ON CONFLICT` arm is a backstop for two adds of the same book
    /// racing past the merge lookup: quantities merge instead of erroring on
    /// the `(cart_id, book_id)` unique constraint.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_line(
        &self,
        cart_id: CartId,
        book_id: BookId,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO cart_line (cart_id, book_id, quantity, unit_price, subtotal)
            VALUES ($1, $2, $3, $4, $3 * $4)
            ON CONFLICT (cart_id, book_id) DO UPDATE SET
                quantity   = cart_line.quantity + EXCLUDED.quantity,
                unit_price = EXCLUDED.unit_price,
                subtotal   = (cart_line.quantity + EXCLUDED.quantity) * EXCLUDED.unit_price
            ",
        )
        .bind(cart_id)
        .bind(book_id)
        .bind(quantity)
        .bind(unit_price)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Set a line's quantity, re-snapshotting the unit price.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_line_quantity(
        &self,
        line_id: CartLineId,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE cart_line
            SET quantity = $2, unit_price = $3, subtotal = $2 * $3
            WHERE id = $1
            ",
        )
        .bind(line_id)
        .bind(quantity)
        .bind(unit_price)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete a line from a cart. Returns `false` if no such line existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_line(
        &self,
        cart_id: CartId,
        line_id: CartLineId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM cart_line
            WHERE cart_id = $1 AND id = $2
            ",
        )
        .bind(cart_id)
        .bind(line_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove every line from a cart. Clearing an empty cart is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear(&self, cart_id: CartId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM cart_line
            WHERE cart_id = $1
            ",
        )
        .bind(cart_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Transition a cart to `checked_out` after its order was created.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_checked_out(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE cart
            SET status = 'checked_out'
            WHERE id = $1
            ",
        )
        .bind(cart_id)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
