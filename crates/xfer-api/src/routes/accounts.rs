//! # Accounts API
//!
//! Read-only account lookup for reconciliation tooling: after a partial
//! success, operators compare the reported balances with the ledger.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use xfer_core::AccountId;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountResponse {
    pub id: i64,
    pub organization_id: i64,
    pub reference: String,
    /// Decimal string with two fractional digits.
    #[schema(example = "800.00")]
    pub balance: String,
    /// Optimistic-lock version, bumped on every balance write.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/accounts/:id", get(get_account))
}

#[utoipa::path(
    get,
    path = "/v1/accounts/{id}",
    params(("id" = i64, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account found", body = AccountResponse),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed account id", body = crate::error::ErrorBody),
    ),
    tag = "accounts"
)]
pub(crate) async fn get_account(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<AccountResponse>, AppError> {
    let id = raw_id
        .parse::<i64>()
        .ok()
        .and_then(|n| AccountId::new(n).ok())
        .ok_or_else(|| AppError::BadRequest(format!("invalid account id: {raw_id:?}")))?;

    let account = state
        .orchestrator
        .store()
        .get_account(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {id} not found")))?;

    Ok(Json(AccountResponse {
        id: account.id.get(),
        organization_id: account.organization_id.get(),
        reference: account.reference.as_str().to_string(),
        balance: account.balance.to_string(),
        version: account.version,
        updated_at: account.updated_at,
    }))
}
