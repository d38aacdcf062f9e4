use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use stockledger_core::ProductId;
use stockledger_infra::HistoryEntry;
use stockledger_inventory::StockDirection;
use stockledger_products::{DEFAULT_MIN_STOCK, Product, ProductDetails};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub current_stock: Option<i64>,
    pub min_stock: Option<i64>,
}

impl CreateProductRequest {
    pub fn into_details(self) -> ProductDetails {
        ProductDetails {
            sku: self.sku,
            name: self.name,
            description: self.description.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            current_stock: self.current_stock.unwrap_or(0),
            min_stock: self.min_stock.unwrap_or(DEFAULT_MIN_STOCK),
        }
    }
}

/// Partial update: omitted fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub current_stock: Option<i64>,
    pub min_stock: Option<i64>,
}

impl UpdateProductRequest {
    pub fn merge_into(self, current: ProductDetails) -> ProductDetails {
        ProductDetails {
            sku: self.sku.unwrap_or(current.sku),
            name: self.name.unwrap_or(current.name),
            description: self.description.unwrap_or(current.description),
            category: self.category.unwrap_or(current.category),
            current_stock: self.current_stock.unwrap_or(current.current_stock),
            min_stock: self.min_stock.unwrap_or(current.min_stock),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub product_id: String,
    pub quantity: serde_json::Number,
    pub notes: Option<String>,
    /// Only read by the generic adjust endpoint.
    pub direction: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

// -------------------------
// Request parsing helpers
// -------------------------

/// Unwrap a JSON body, turning extractor rejections into our error shape.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(v)| v).map_err(|rejection| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            rejection.body_text(),
        )
    })
}

pub fn parse_product_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse()
        .map_err(errors::domain_error_to_response)
}

pub fn parse_direction(raw: Option<&str>) -> Result<StockDirection, axum::response::Response> {
    let Some(raw) = raw else {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "direction is required",
        ));
    };
    raw.parse().map_err(errors::domain_error_to_response)
}

/// Quantity as a whole number (`2` or `2.0`); range checks happen in the service.
pub fn parse_quantity(raw: &serde_json::Number) -> Result<i64, axum::response::Response> {
    let integral_float = || {
        raw.as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    };
    raw.as_i64().or_else(integral_float).ok_or_else(|| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("quantity must be a whole number, got {raw}"),
        )
    })
}

// -------------------------
// Response mapping
// -------------------------

pub fn product_to_json(p: &Product) -> serde_json::Value {
    serde_json::json!({
        "id": p.id_typed().to_string(),
        "sku": p.sku(),
        "name": p.name(),
        "description": p.description(),
        "category": p.category(),
        "current_stock": p.current_stock(),
        "min_stock": p.min_stock(),
        "low_stock": p.is_low_stock(),
        "created_at": p.created_at().to_rfc3339(),
    })
}

pub fn history_to_json(h: &HistoryEntry) -> serde_json::Value {
    serde_json::json!({
        "id": h.entry.id_typed().to_string(),
        "product_id": h.entry.product_id().to_string(),
        "sku": h.sku,
        "product_name": h.product_name,
        "type": h.entry.direction().as_str(),
        "quantity": h.entry.quantity().get(),
        "notes": h.entry.notes(),
        "created_at": h.entry.created_at().to_rfc3339(),
    })
}
