//! Catalog reads for cart validation and checkout.
//!
//! Read-only: the only writer of `book.stock` outside admin tooling is the
//! checkout transaction in [`crate::db::orders`].

use rust_decimal::Decimal;
use sqlx::PgPool;

use bookstall_core::BookId;

use super::RepositoryError;
use crate::models::book::BookSnapshot;

/// Internal row type for catalog lookups.
#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    id: BookId,
    title: String,
    price: Decimal,
    stock: i32,
    active: bool,
}

impl From<BookRow> for BookSnapshot {
    fn from(row: BookRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            price: row.price,
            stock: row.stock,
            active: row.active,
        }
    }
}

/// Repository for read-only catalog lookups.
pub struct BookRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> BookRepository<'a> {
    /// Create a new book repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the live state of a book.
    ///
    /// Returns `None` for an unknown id; mapping that to NotFound is the
    /// caller's job.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn snapshot(&self, id: BookId) -> Result<Option<BookSnapshot>, RepositoryError> {
        let row = sqlx::query_as::<_, BookRow>(
            r"
            SELECT id, title, price, stock, active
            FROM book
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(BookSnapshot::from))
    }
}
