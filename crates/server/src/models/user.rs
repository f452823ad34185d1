//! User models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bookstall_core::{Email, UserId, UserRole};

/// A registered account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
    /// Deactivated accounts cannot log in.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
