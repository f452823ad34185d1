//! Cart route handlers.
//!
//! Every mutation re-reads the book's live state first: price snapshots are
//! refreshed on each write and stock checks run against current inventory.
//! These checks are advisory; the checkout transaction re-validates with
//! transactional strength and is the sole oversell enforcement point.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bookstall_core::{BookId, CartLineId, PaymentMethodId};

use crate::db::books::BookRepository;
use crate::db::carts::CartRepository;
use crate::db::orders::OrderRepository;
use crate::db::payment_methods::PaymentMethodRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::book::BookSnapshot;
use crate::models::cart::CartView;
use crate::models::order::CheckoutSummary;
use crate::routes::MessageResponse;
use crate::state::AppState;

/// Add-to-cart payload.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub book_id: BookId,
    pub quantity: i32,
}

/// Set-quantity payload.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

/// Checkout payload.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    pub payment_method_id: PaymentMethodId,
    #[serde(default)]
    pub note: Option<String>,
}

/// Checkout result returned to the client.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub summary: CheckoutSummary,
}

/// Reject non-positive quantities before they reach the store.
fn validate_quantity(quantity: i32) -> Result<()> {
    if quantity < 1 {
        return Err(AppError::Validation(
            "quantity must be at least 1".to_owned(),
        ));
    }
    Ok(())
}

/// Fetch a book's live state, rejecting unknown and inactive books and
/// quantities beyond current stock.
async fn validated_snapshot(
    books: &BookRepository<'_>,
    book_id: BookId,
    requested_qty: i32,
) -> Result<BookSnapshot> {
    let snapshot = books
        .snapshot(book_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book {book_id} not found")))?;

    if !snapshot.active {
        return Err(AppError::InvalidState(format!(
            "Book {book_id} is not active"
        )));
    }

    if requested_qty > snapshot.stock {
        return Err(AppError::InsufficientStock {
            book_id,
            available: snapshot.stock,
        });
    }

    Ok(snapshot)
}

/// Return the user's cart snapshot. Never errors on a missing cart: users
/// without one get the empty shape.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    let carts = CartRepository::new(state.pool());

    let Some(cart) = carts.get_active(user.id).await? else {
        return Ok(Json(CartView::empty()));
    };

    let lines = carts.lines(cart.id).await?;
    Ok(Json(CartView::from_parts(&cart, lines)))
}

/// Add a book to the cart, merging into an existing line for the same book.
///
/// The unit price is re-snapshotted from the current catalog price on every
/// add; price drift between calls is accepted (last write wins).
#[instrument(skip(state, user, body), fields(user_id = %user.id, book_id = %body.book_id))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    validate_quantity(body.quantity)?;

    let books = BookRepository::new(state.pool());
    let carts = CartRepository::new(state.pool());

    let snapshot = validated_snapshot(&books, body.book_id, body.quantity).await?;
    let cart_id = carts.get_or_create_active(user.id).await?;

    let message = match carts.line_for_book(cart_id, body.book_id).await? {
        Some(line) => {
            let merged = line.quantity + body.quantity;
            if merged > snapshot.stock {
                return Err(AppError::InsufficientStock {
                    book_id: body.book_id,
                    available: snapshot.stock,
                });
            }
            carts
                .set_line_quantity(line.id, merged, snapshot.price)
                .await?;
            "Quantity updated"
        }
        None => {
            carts
                .insert_line(cart_id, body.book_id, body.quantity, snapshot.price)
                .await?;
            "Added to cart"
        }
    };

    Ok((StatusCode::CREATED, Json(MessageResponse::new(message))))
}

/// Set a cart line's quantity, re-validating against live stock.
#[instrument(skip(state, user, body), fields(user_id = %user.id, line_id = %line_id))]
pub async fn update_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(line_id): Path<CartLineId>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<Json<MessageResponse>> {
    validate_quantity(body.quantity)?;

    let books = BookRepository::new(state.pool());
    let carts = CartRepository::new(state.pool());

    let cart = carts
        .get_active(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".to_owned()))?;

    let line = carts
        .line(cart.id, line_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart line not found".to_owned()))?;

    let snapshot = validated_snapshot(&books, line.book_id, body.quantity).await?;

    carts
        .set_line_quantity(line.id, body.quantity, snapshot.price)
        .await?;

    Ok(Json(MessageResponse::new("Cart line updated")))
}

/// Remove a line from the cart.
#[instrument(skip(state, user), fields(user_id = %user.id, line_id = %line_id))]
pub async fn remove_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(line_id): Path<CartLineId>,
) -> Result<Json<MessageResponse>> {
    let carts = CartRepository::new(state.pool());

    let cart = carts
        .get_active(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".to_owned()))?;

    if !carts.delete_line(cart.id, line_id).await? {
        return Err(AppError::NotFound("Cart line not found".to_owned()));
    }

    Ok(Json(MessageResponse::new("Cart line removed")))
}

/// Empty the cart. Clearing an already-empty (or absent) cart succeeds.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<MessageResponse>> {
    let carts = CartRepository::new(state.pool());

    let Some(cart) = carts.get_active(user.id).await? else {
        return Ok(Json(MessageResponse::new("Cart is already empty")));
    };

    let removed = carts.clear(cart.id).await?;
    let message = if removed == 0 {
        "Cart is already empty"
    } else {
        "Cart cleared"
    };

    Ok(Json(MessageResponse::new(message)))
}

/// Convert the active cart into an order.
///
/// The cart's lines are re-read server-side at the instant of the
/// transaction; any client-supplied line data is ignored. On success the
/// cart is cleared and marked checked-out; failure of that cleanup is
/// logged, not fatal - the order stands.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    if body.shipping_address.trim().is_empty() {
        return Err(AppError::Validation(
            "shipping_address is required".to_owned(),
        ));
    }

    let carts = CartRepository::new(state.pool());
    let orders = OrderRepository::new(state.pool());

    // Fail fast on an unusable payment method; the transaction re-checks
    // authoritatively.
    ensure_payment_method(&state, body.payment_method_id).await?;

    let cart = carts
        .get_active(user.id)
        .await?
        .ok_or(AppError::InvalidState("Shopping cart is empty".to_owned()))?;

    let items = carts.checkout_items(cart.id).await?;

    let summary = orders
        .create_order_atomic(
            user.id,
            body.shipping_address.trim(),
            body.note.as_deref(),
            body.payment_method_id,
            &items,
            state.config().shipping_flat_rate,
        )
        .await?;

    // The order is committed; cart cleanup must not undo that.
    if let Err(e) = cleanup_cart(&carts, cart.id).await {
        tracing::warn!(
            cart_id = %cart.id,
            order_id = %summary.order_id,
            error = %e,
            "post-checkout cart cleanup failed"
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            message: "Checkout complete",
            summary,
        }),
    ))
}

/// Reject missing or inactive payment methods before opening a transaction.
pub(crate) async fn ensure_payment_method(
    state: &AppState,
    id: PaymentMethodId,
) -> Result<()> {
    let method = PaymentMethodRepository::new(state.pool()).get(id).await?;
    match method {
        Some(m) if m.active => Ok(()),
        _ => Err(AppError::InvalidState(
            "Payment method is not available".to_owned(),
        )),
    }
}

/// Delete the cart's lines and retire it.
async fn cleanup_cart(
    carts: &CartRepository<'_>,
    cart_id: bookstall_core::CartId,
) -> std::result::Result<(), crate::db::RepositoryError> {
    carts.clear(cart_id).await?;
    carts.mark_checked_out(cart_id).await?;
    Ok(())
}
