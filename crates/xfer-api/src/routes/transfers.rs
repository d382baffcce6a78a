//! # Transfers API
//!
//! `POST /v1/transfers` runs one transfer to completion and returns the
//! transfer envelope. The HTTP status follows the outcome:
//!
//! | Outcome | Status |
//! |---------|--------|
//! | success, partial success | 200 |
//! | `INVALID_INPUT`, `MEMO_TOO_LONG` | 400 |
//! | `USER_NOT_FOUND`, `ORGANIZATION_NOT_FOUND` | 404 |
//! | `NULLIFIER_ALREADY_USED`, `CONCURRENT_MODIFICATION` | 409 |
//! | `INSUFFICIENT_BALANCE`, `INSUFFICIENT_ALLOWANCE` | 422 |
//! | `PROOF_GENERATION_FAILED`, `BLOCKCHAIN_TRANSFER_FAILED` | 502 |
//! | `DATABASE_ERROR`, `INTERNAL_ERROR` | 500 |
//!
//! A partial success is 200 because the chain settlement it reports is
//! final; clients must inspect `warning`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use utoipa::ToSchema;
use xfer_core::{ErrorKind, TransferRequestInput};
use xfer_engine::{TransferResponse, TransferType};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::state::AppState;

/// Documented shape of the request body. The handler accepts any JSON
/// object and reports wrong field types as `INVALID_INPUT`.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct TransferRequestSchema {
    /// Sending account id, a positive integer.
    #[schema(example = 1)]
    sender_id: i64,
    /// Receiving account reference.
    #[schema(example = "0x8ba1f109551bd432803012645ac136ddd64dba72-4f1c2a9e0b7d3e65")]
    receiver_reference: String,
    /// Amount in major units, at most two decimals.
    #[schema(example = 200.0)]
    amount: f64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/transfers", post(create_transfer))
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput | ErrorKind::MemoTooLong => StatusCode::BAD_REQUEST,
        ErrorKind::UserNotFound | ErrorKind::OrganizationNotFound => StatusCode::NOT_FOUND,
        ErrorKind::NullifierAlreadyUsed | ErrorKind::ConcurrentModification => {
            StatusCode::CONFLICT
        }
        ErrorKind::InsufficientBalance | ErrorKind::InsufficientAllowance => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::ProofGenerationFailed | ErrorKind::BlockchainTransferFailed => {
            StatusCode::BAD_GATEWAY
        }
        ErrorKind::DatabaseError | ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Execute a transfer.
///
/// Same-organization transfers update the ledger only. Cross-organization
/// transfers settle on chain first; if the ledger update then fails the
/// response is still `success: true` with
/// `warning: "BLOCKCHAIN_SUCCEEDED_DATABASE_FAILED"`.
#[utoipa::path(
    post,
    path = "/v1/transfers",
    request_body = TransferRequestSchema,
    responses(
        (status = 200, description = "Transfer completed, or chain-settled with a ledger warning", body = TransferResponse),
        (status = 400, description = "Invalid input or memo too long", body = TransferResponse),
        (status = 404, description = "Sender, receiver or organization not found", body = TransferResponse),
        (status = 409, description = "Nullifier already used", body = TransferResponse),
        (status = 422, description = "Insufficient balance or allowance, or malformed body", body = TransferResponse),
        (status = 500, description = "Ledger failure before any settlement", body = TransferResponse),
        (status = 502, description = "Proof service or chain gateway failure", body = TransferResponse),
    ),
    tag = "transfers"
)]
pub(crate) async fn create_transfer(
    State(state): State<AppState>,
    body: Result<Json<TransferRequestInput>, JsonRejection>,
) -> Result<(StatusCode, Json<TransferResponse>), AppError> {
    let input = extract_json(body)?;
    let outcome = state.orchestrator.execute(&input).await;

    state.metrics.record_transfer(
        outcome.label(),
        outcome
            .transfer_type()
            .map(TransferType::as_str)
            .unwrap_or("unknown"),
    );

    let status = outcome
        .error()
        .map(|e| status_for(e.kind))
        .unwrap_or(StatusCode::OK);
    Ok((status, Json(outcome.to_response())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_status() {
        let cases = [
            (ErrorKind::InvalidInput, 400),
            (ErrorKind::MemoTooLong, 400),
            (ErrorKind::UserNotFound, 404),
            (ErrorKind::OrganizationNotFound, 404),
            (ErrorKind::NullifierAlreadyUsed, 409),
            (ErrorKind::ConcurrentModification, 409),
            (ErrorKind::InsufficientBalance, 422),
            (ErrorKind::InsufficientAllowance, 422),
            (ErrorKind::ProofGenerationFailed, 502),
            (ErrorKind::BlockchainTransferFailed, 502),
            (ErrorKind::DatabaseError, 500),
            (ErrorKind::InternalError, 500),
        ];
        for (kind, code) in cases {
            assert_eq!(status_for(kind).as_u16(), code, "{kind}");
        }
    }
}
