use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Products at or below their minimum, most critical shortage first.
pub async fn low_stock_alerts(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.stock.low_stock_alerts().await {
        Ok(products) => {
            let items = products.iter().map(dto::product_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn export_csv(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.stock.export_csv().await {
        Ok(csv) => {
            let disposition = format!(
                "attachment; filename=\"inventory-{}.csv\"",
                Utc::now().timestamp_millis()
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                csv,
            )
                .into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
