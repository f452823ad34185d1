//! Seed reference data and demo records.
//!
//! Inserts the payment methods checkout depends on, plus (optionally) a
//! handful of demo books and two demo accounts. Idempotent: re-running
//! skips rows that already exist.
//!
//! # Environment Variables
//!
//! - `BOOKSTALL_DATABASE_URL` - `PostgreSQL` connection string

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use tracing::info;

use bookstall_core::UserRole;

/// Payment methods checkout can be exercised against.
const PAYMENT_METHODS: &[(&str, &str)] = &[
    ("bank_transfer", "Manual bank transfer"),
    ("credit_card", "Card payment"),
    ("cash_on_delivery", "Pay the courier on delivery"),
];

/// Demo catalog rows: title, genre, author, price, stock.
const DEMO_BOOKS: &[(&str, &str, &str, i64, i32)] = &[
    ("The Salt Road", "Fiction", "A. Karim", 1999, 12),
    ("Practical Beekeeping", "Hobby", "R. Moeller", 3450, 5),
    ("Rust for Rivermen", "Technical", "P. Osei", 4200, 8),
    ("A Short History of Shelves", "History", "L. Tran", 1550, 20),
];

/// Errors that can occur while seeding.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hashing error")]
    PasswordHash,
}

/// Run the seed.
///
/// # Errors
///
/// Returns `SeedError` if the database is unreachable or an insert fails.
pub async fn run(demo_data: bool) -> Result<(), SeedError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("BOOKSTALL_DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| SeedError::MissingEnvVar("BOOKSTALL_DATABASE_URL"))?;

    let pool = PgPool::connect(database_url.expose_secret()).await?;

    seed_payment_methods(&pool).await?;

    if demo_data {
        seed_books(&pool).await?;
        seed_accounts(&pool).await?;
    }

    info!("Seed complete");
    Ok(())
}

async fn seed_payment_methods(pool: &PgPool) -> Result<(), SeedError> {
    for (name, description) in PAYMENT_METHODS {
        sqlx::query(
            r"
            INSERT INTO payment_method (name, description)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            ",
        )
        .bind(name)
        .bind(description)
        .execute(pool)
        .await?;
    }

    info!(count = PAYMENT_METHODS.len(), "payment methods seeded");
    Ok(())
}

async fn seed_books(pool: &PgPool) -> Result<(), SeedError> {
    for (title, genre, author, price_cents, stock) in DEMO_BOOKS {
        // No unique key on title; only insert when absent to stay idempotent
        sqlx::query(
            r"
            INSERT INTO book (title, genre, author, price, stock)
            SELECT $1, $2, $3, $4, $5
            WHERE NOT EXISTS (SELECT 1 FROM book WHERE title = $1)
            ",
        )
        .bind(title)
        .bind(genre)
        .bind(author)
        .bind(Decimal::new(*price_cents, 2))
        .bind(stock)
        .execute(pool)
        .await?;
    }

    info!(count = DEMO_BOOKS.len(), "demo books seeded");
    Ok(())
}

async fn seed_accounts(pool: &PgPool) -> Result<(), SeedError> {
    let accounts = [
        ("Demo Customer", "customer@bookstall.test", UserRole::Customer),
        ("Demo Seller", "seller@bookstall.test", UserRole::Seller),
    ];

    for (name, email, role) in accounts {
        let hash = hash_password("demo-password-1")?;
        sqlx::query(
            r"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            ",
        )
        .bind(name)
        .bind(email)
        .bind(hash)
        .bind(role)
        .execute(pool)
        .await?;
    }

    info!("demo accounts seeded (password: demo-password-1)");
    Ok(())
}

fn hash_password(password: &str) -> Result<String, SeedError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| SeedError::PasswordHash)
}
