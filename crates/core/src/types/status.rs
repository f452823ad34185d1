//! Status enums for carts, orders and users.
//!
//! These are closed enumerations validated at the boundary: the wire form is a
//! snake_case string, the storage form a Postgres enum type. There is no
//! runtime lookup table to consult and no ad-hoc string matching at call time.

use serde::{Deserialize, Serialize};

/// Cart lifecycle status.
///
/// A user has at most one `Active` cart; it becomes `CheckedOut` when an order
/// is created from it, and a fresh cart is created lazily on the next add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "cart_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum CartStatus {
    #[default]
    Active,
    CheckedOut,
}

/// Order fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Initial status assigned at checkout.
    #[default]
    AwaitingPayment,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

/// Order payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
    Failed,
}

/// User role with different permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular shopper.
    #[default]
    Customer,
    /// Can manage orders (status updates).
    Seller,
    /// Full access.
    Admin,
}

impl UserRole {
    /// Whether this role may use staff-only endpoints.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Seller | Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Seller => write!(f, "seller"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "seller" => Ok(Self::Seller),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_roles() {
        assert!(!UserRole::Customer.is_staff());
        assert!(UserRole::Seller.is_staff());
        assert!(UserRole::Admin.is_staff());
    }

    #[test]
    fn test_role_roundtrip() {
        for role in [UserRole::Customer, UserRole::Seller, UserRole::Admin] {
            let parsed: UserRole = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("superuser".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_status_wire_form() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::AwaitingPayment).unwrap(),
            "\"awaiting_payment\""
        );
        assert_eq!(
            serde_json::to_string(&CartStatus::CheckedOut).unwrap(),
            "\"checked_out\""
        );

        let status: PaymentStatus = serde_json::from_str("\"paid\"").unwrap();
        assert_eq!(status, PaymentStatus::Paid);
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(serde_json::from_str::<OrderStatus>("\"teleported\"").is_err());
    }

    #[test]
    fn test_defaults_are_initial() {
        assert_eq!(OrderStatus::default(), OrderStatus::AwaitingPayment);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
        assert_eq!(CartStatus::default(), CartStatus::Active);
    }
}
