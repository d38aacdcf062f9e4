use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::app::services::{AppServices, LoginError};
use crate::app::{dto, errors};
use crate::middleware::extract_bearer;

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::LoginRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match dto::json_body(body) {
        Ok(b) => b,
        Err(res) => return res,
    };

    match services.login(body.username.trim(), &body.password).await {
        Ok(grant) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "token": grant.token,
                "token_type": "Bearer",
                "expires_in": grant.expires_in_seconds,
                "username": grant.username,
            })),
        )
            .into_response(),
        Err(LoginError::InvalidCredentials) => errors::json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "invalid username or password",
        ),
        Err(e) => {
            tracing::error!(error = %e, "login failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

/// Whether the caller holds a valid token. Never fails with 401.
pub async fn session(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let claims = extract_bearer(&headers).and_then(|token| services.session(token));
    let body = match claims {
        Some(c) => serde_json::json!({ "authenticated": true, "username": c.username }),
        None => serde_json::json!({ "authenticated": false, "username": null }),
    };
    (StatusCode::OK, Json(body)).into_response()
}
