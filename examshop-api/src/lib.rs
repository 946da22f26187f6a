use axum::{
    http::{header, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod downloads;
pub mod error;
pub mod session;
pub mod state;
pub mod webhooks;

pub use error::AppError;
pub use state::{AppState, ShopSettings, DEFAULT_SESSION_COOKIE};

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::USER_AGENT]);

    // Browser-facing routes share the cookie session; gateway callbacks do not.
    let storefront = Router::new()
        .merge(catalog::routes())
        .merge(cart::routes())
        .merge(checkout::routes())
        .merge(downloads::routes())
        .layer(axum::middleware::from_fn_with_state(state.clone(), session::session_middleware));

    Router::new()
        .merge(storefront)
        .merge(webhooks::routes())
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
