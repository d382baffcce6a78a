//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into one OpenAPI spec served at
//! `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Static bearer token. Set via AUTH_TOKEN env var."))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Transfer Orchestration API",
        description = "Balance transfers between accounts.\n\nSame-organization transfers update the ledger directly. Cross-organization transfers are proven, settled on chain and then applied to the ledger. A ledger failure after the chain settled is reported as `success: true` with `warning: \"BLOCKCHAIN_SUCCEEDED_DATABASE_FAILED\"`.\n\nAuthentication: `Authorization: Bearer <token>` on all `/v1/*` endpoints when `AUTH_TOKEN` is set. Health probes and `/metrics` are unauthenticated."
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        crate::routes::transfers::create_transfer,
        crate::routes::accounts::get_account,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::routes::transfers::TransferRequestSchema,
            crate::routes::accounts::AccountResponse,
            xfer_engine::TransferResponse,
            xfer_engine::TransferType,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "transfers", description = "Transfer orchestration"),
        (name = "accounts", description = "Account balance queries"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
