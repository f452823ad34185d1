//! Catalog reference-data handlers.

use axum::{Json, extract::State};
use tracing::instrument;

use crate::db::payment_methods::PaymentMethodRepository;
use crate::error::Result;
use crate::models::book::PaymentMethod;
use crate::state::AppState;

/// List the payment methods selectable at checkout. Public: checkout UIs
/// need this before the user logs in.
#[instrument(skip(state))]
pub async fn payment_methods(State(state): State<AppState>) -> Result<Json<Vec<PaymentMethod>>> {
    let methods = PaymentMethodRepository::new(state.pool())
        .list_active()
        .await?;

    Ok(Json(methods))
}
