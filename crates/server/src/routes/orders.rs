//! Order route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use bookstall_core::{OrderId, OrderStatus, PaymentMethodId, PaymentStatus};

use crate::db::carts::CartRepository;
use crate::db::orders::OrderRepository;
use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAuth, RequireStaff};
use crate::models::order::{OrderItemInput, OrderWithLines};
use crate::routes::MessageResponse;
use crate::routes::cart::CheckoutResponse;
use crate::state::AppState;

/// Direct order creation payload: an explicit item list bypassing the
/// persisted cart.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub shipping_address: String,
    pub payment_method_id: PaymentMethodId,
    #[serde(default)]
    pub note: Option<String>,
    pub items: Vec<OrderItemInput>,
}

/// Query flag for including archived orders in listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub include_archived: bool,
}

/// Staff status update payload. At least one field must be present.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub order_status: Option<OrderStatus>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

/// Create an order directly from an item list.
///
/// Runs through the same atomic engine as cart checkout. The active cart,
/// if any, is cleared best-effort afterwards so the two entry points leave
/// the same state behind.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    if body.shipping_address.trim().is_empty() {
        return Err(AppError::Validation(
            "shipping_address is required".to_owned(),
        ));
    }
    if body.items.is_empty() {
        return Err(AppError::Validation("items must not be empty".to_owned()));
    }
    if body.items.iter().any(|i| i.quantity < 1) {
        return Err(AppError::Validation(
            "item quantity must be at least 1".to_owned(),
        ));
    }

    crate::routes::cart::ensure_payment_method(&state, body.payment_method_id).await?;

    let orders = OrderRepository::new(state.pool());
    let summary = orders
        .create_order_atomic(
            user.id,
            body.shipping_address.trim(),
            body.note.as_deref(),
            body.payment_method_id,
            &body.items,
            state.config().shipping_flat_rate,
        )
        .await?;

    // Best-effort: a direct order usually supersedes whatever sits in the
    // cart. Failure here never fails the order.
    let carts = CartRepository::new(state.pool());
    match carts.get_active(user.id).await {
        Ok(Some(cart)) => {
            if let Err(e) = carts.clear(cart.id).await {
                tracing::warn!(cart_id = %cart.id, error = %e, "post-order cart clear failed");
            }
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(error = %e, "post-order cart lookup failed");
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            message: "Order created",
            summary,
        }),
    ))
}

/// List the user's orders, newest first. Archived orders are hidden unless
/// `?include_archived=true`.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderWithLines>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id, query.include_archived)
        .await?;

    Ok(Json(orders))
}

/// Fetch one of the user's orders.
#[instrument(skip(state, user), fields(user_id = %user.id, order_id = %order_id))]
pub async fn detail(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<OrderId>,
) -> Result<Json<OrderWithLines>> {
    let order = OrderRepository::new(state.pool())
        .get_for_user(user.id, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_owned()))?;

    Ok(Json(order))
}

/// Archive (soft-delete) one of the user's orders.
#[instrument(skip(state, user), fields(user_id = %user.id, order_id = %order_id))]
pub async fn archive(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<OrderId>,
) -> Result<StatusCode> {
    let archived = OrderRepository::new(state.pool())
        .archive(user.id, order_id)
        .await?;

    if !archived {
        return Err(AppError::NotFound("Order not found".to_owned()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Hard-delete one of the user's orders, archiving instead when blocked by
/// referential integrity.
#[instrument(skip(state, user), fields(user_id = %user.id, order_id = %order_id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<OrderId>,
) -> Result<StatusCode> {
    let outcome = OrderRepository::new(state.pool())
        .delete(user.id, order_id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Order not found".to_owned()),
            other => AppError::Database(other),
        })?;

    tracing::debug!(?outcome, "order delete finished");
    Ok(StatusCode::NO_CONTENT)
}

/// Staff-only partial update of order/payment status.
#[instrument(skip(state, staff, body), fields(staff_id = %staff.id, order_id = %order_id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Path(order_id): Path<OrderId>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<MessageResponse>> {
    if body.order_status.is_none() && body.payment_status.is_none() {
        return Err(AppError::Validation(
            "at least one of order_status, payment_status is required".to_owned(),
        ));
    }

    let updated = OrderRepository::new(state.pool())
        .update_status(order_id, body.order_status, body.payment_status)
        .await?;

    if !updated {
        return Err(AppError::NotFound("Order not found".to_owned()));
    }

    Ok(Json(MessageResponse::new("Order status updated")))
}
