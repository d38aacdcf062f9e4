use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_inventory::StockDirection;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new()
        .route("/in", post(stock_in))
        .route("/out", post(stock_out))
        .route("/adjust", post(adjust_stock))
        .route("/history", get(recent_history))
        .route("/history/:product_id", get(product_history))
}

pub async fn stock_in(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    body: Result<Json<dto::StockRequest>, JsonRejection>,
) -> axum::response::Response {
    match dto::json_body(body) {
        Ok(body) => apply(&services, &user, Some(StockDirection::In), body).await,
        Err(res) => res,
    }
}

pub async fn stock_out(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    body: Result<Json<dto::StockRequest>, JsonRejection>,
) -> axum::response::Response {
    match dto::json_body(body) {
        Ok(body) => apply(&services, &user, Some(StockDirection::Out), body).await,
        Err(res) => res,
    }
}

/// Direction comes from the body.
pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    body: Result<Json<dto::StockRequest>, JsonRejection>,
) -> axum::response::Response {
    match dto::json_body(body) {
        Ok(body) => apply(&services, &user, None, body).await,
        Err(res) => res,
    }
}

async fn apply(
    services: &AppServices,
    user: &UserContext,
    fixed: Option<StockDirection>,
    body: dto::StockRequest,
) -> axum::response::Response {
    let direction = match fixed {
        Some(d) => d,
        None => match dto::parse_direction(body.direction.as_deref()) {
            Ok(d) => d,
            Err(res) => return res,
        },
    };
    let product_id = match dto::parse_product_id(&body.product_id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let quantity = match dto::parse_quantity(&body.quantity) {
        Ok(q) => q,
        Err(res) => return res,
    };

    tracing::debug!(user = user.username(), "stock adjustment requested");

    match services
        .stock
        .adjust_stock(product_id, direction, quantity, body.notes)
        .await
    {
        Ok(receipt) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "transaction_id": receipt.transaction_id.to_string(),
                "new_stock": receipt.new_stock,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn recent_history(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::HistoryQuery>,
) -> axum::response::Response {
    match services.stock.recent_history(query.limit).await {
        Ok(entries) => {
            let items = entries.iter().map(dto::history_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn product_history(
    Extension(services): Extension<Arc<AppServices>>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product_id = match dto::parse_product_id(&product_id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.stock.product_history(product_id).await {
        Ok(entries) => (StatusCode::OK, Json(serde_json::json!({ "items": entries }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
