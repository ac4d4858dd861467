//! `POST /register_fcm_token`, `POST /api/register-fcm-token`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use relay_core::text::truncate_str;
use relay_core::{AckResponse, ChatDomain, PrincipalId};
use relay_store::StoreError;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::context::ChatContext;

/// Registration body.
#[derive(Debug, Deserialize)]
pub struct RegisterTokenRequest {
    /// Account to attach the token to.
    pub user_id: PrincipalId,
    /// Provider device token.
    pub fcm_token: String,
}

/// Store a push token on the principal's account.
pub async fn register_token<D: ChatDomain>(
    State(ctx): State<ChatContext<D>>,
    body: Result<Json<RegisterTokenRequest>, JsonRejection>,
) -> (StatusCode, Json<AckResponse>) {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(domain = D::NAME, error = %rejection, "malformed token registration");
            return (
                StatusCode::BAD_REQUEST,
                Json(AckResponse::failed("Invalid request body")),
            );
        }
    };

    let token = request.fcm_token.trim();
    if token.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(AckResponse::failed("fcm_token is required")),
        );
    }

    match ctx
        .store
        .set_push_token(request.user_id, token.to_string())
        .await
    {
        Ok(()) => {
            info!(
                domain = D::NAME,
                principal = %request.user_id,
                token_prefix = truncate_str(token, 8),
                "push token registered"
            );
            (StatusCode::OK, Json(AckResponse::ok()))
        }
        Err(StoreError::PrincipalNotFound(principal)) => {
            warn!(domain = D::NAME, %principal, "push token for unknown principal");
            (
                StatusCode::NOT_FOUND,
                Json(AckResponse::failed(format!("{} not found", D::PRINCIPAL))),
            )
        }
        Err(e) => {
            error!(domain = D::NAME, principal = %request.user_id, error = %e, "push token not stored");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AckResponse::failed("Failed to register token")),
            )
        }
    }
}
