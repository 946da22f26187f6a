use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use examshop_cart::CartError;
use examshop_catalog::CatalogError;
use examshop_core::ValidationErrors;
use examshop_order::{OrderError, RepositoryError};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    NotFoundError(String),
    ValidationError(ValidationErrors),
    BadRequest(String),
    Unauthorized(String),
    /// The order exists and awaits payment; only the gateway call failed.
    GatewayError { reference: String, message: String },
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": "Validation failed", "fields": errors }),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::GatewayError { reference, message } => {
                tracing::error!("Payment gateway failure for order {}: {}", reference, message);
                (
                    StatusCode::BAD_GATEWAY,
                    json!({ "error": "Payment gateway unavailable", "reference": reference }),
                )
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::ValidationError(errors)
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(what) => AppError::NotFoundError(what),
            other => AppError::Anyhow(other.into()),
        }
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::Catalog(inner) => inner.into(),
            other => AppError::Anyhow(other.into()),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFoundError(what),
            other => AppError::Anyhow(other.into()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(what) => AppError::NotFoundError(format!("Not found: {}", what)),
            OrderError::EmptyCart => AppError::BadRequest("Your cart is empty".to_string()),
            OrderError::Gateway { reference, source } => AppError::GatewayError {
                reference,
                message: source.to_string(),
            },
            OrderError::Repository(inner) => inner.into(),
            OrderError::Catalog(inner) => inner.into(),
            OrderError::Cart(inner) => inner.into(),
            other => AppError::Anyhow(other.into()),
        }
    }
}
