//! Payment method reference data.

use sqlx::PgPool;

use bookstall_core::PaymentMethodId;

use super::RepositoryError;
use crate::models::book::PaymentMethod;

#[derive(Debug, sqlx::FromRow)]
struct PaymentMethodRow {
    id: PaymentMethodId,
    name: String,
    description: Option<String>,
    active: bool,
}

impl From<PaymentMethodRow> for PaymentMethod {
    fn from(row: PaymentMethodRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            active: row.active,
        }
    }
}

/// Repository for payment method lookups.
pub struct PaymentMethodRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentMethodRepository<'a> {
    /// Create a new payment method repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch a payment method by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        id: PaymentMethodId,
    ) -> Result<Option<PaymentMethod>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentMethodRow>(
            r"
            SELECT id, name, description, active
            FROM payment_method
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(PaymentMethod::from))
    }

    /// All methods currently selectable at checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<PaymentMethod>, RepositoryError> {
        let rows = sqlx::query_as::<_, PaymentMethodRow>(
            r"
            SELECT id, name, description, active
            FROM payment_method
            WHERE active
            ORDER BY id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(PaymentMethod::from).collect())
    }
}
