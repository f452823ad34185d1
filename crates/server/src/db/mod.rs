//! Database operations for the Bookstall `PostgreSQL` store.
//!
//! # Tables
//!
//! - `users` - Accounts and roles
//! - `payment_method` - Reference data gating checkout
//! - `book` - Catalog: price, stock, active flag
//! - `cart` / `cart_line` - One active cart per user (partial unique index)
//! - `orders` / `order_line` - Immutable order records with frozen prices
//!
//! Repositories own all SQL. Queries use the runtime `query_as` API with
//! `FromRow` row structs that convert into the domain models.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p bookstall-cli -- migrate
//! ```

pub mod books;
pub mod carts;
pub mod orders;
pub mod payment_methods;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors surfaced by the repository layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
