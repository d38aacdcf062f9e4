use axum::{
    Router,
    routing::{get, post},
};

pub mod auth;
pub mod products;
pub mod reports;
pub mod stock;
pub mod system;

/// Routes reachable without a token.
pub fn public_router() -> Router {
    Router::new()
        .route("/login", post(auth::login))
        .route("/session", get(auth::session))
}

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/stock", stock::router())
        .route("/alerts", get(reports::low_stock_alerts))
        .route("/export", get(reports::export_csv))
}
