use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
    Extension, Json, Router,
};
use examshop_cart::CartSession;
use examshop_core::{CheckoutForm, PaymentStatus, SessionId};
use examshop_order::{CheckoutOutcome, Confirmation, DispatchReport, OrderStatus, Purchase};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the caller's identity, set by the authenticating proxy.
pub const USER_ID_HEADER: &str = "x-user-id";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/order/callback", get(payment_callback))
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub reference: String,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment: Option<DispatchReport>,
}

impl From<CheckoutOutcome> for CheckoutResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        match outcome {
            CheckoutOutcome::Completed { order, report } => Self {
                reference: order.reference,
                status: order.status,
                total_amount: order.total_amount,
                authorization_url: None,
                fulfillment: Some(report),
            },
            CheckoutOutcome::PaymentRequired {
                order,
                authorization_url,
            } => Self {
                reference: order.reference,
                status: order.status,
                total_amount: order.total_amount,
                authorization_url: Some(authorization_url),
                fulfillment: None,
            },
        }
    }
}

/// POST /checkout
/// Creates the order from the session cart. Paid orders come back with the
/// gateway URL to send the customer to.
async fn checkout(
    State(state): State<AppState>,
    Extension(session): Extension<SessionId>,
    headers: HeaderMap,
    Json(form): Json<CheckoutForm>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let contact = form.validate()?;
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let mut cart = CartSession::load(state.sessions.clone(), session).await?;
    let outcome = state.checkout.checkout(&mut cart, contact, user_id).await?;

    Ok(Json(CheckoutResponse::from(outcome)))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackResult {
    Verified,
    AlreadyVerified,
    NotPaid,
    AmountMismatch,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub reference: String,
    pub result: CallbackResult,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
}

/// GET /order/callback?reference=...
/// Landing point after the hosted checkout. Safe to hit repeatedly.
async fn payment_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackResponse>, AppError> {
    let reference = query
        .reference
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::BadRequest("No payment reference provided".to_string()))?;

    let confirmation = state.reconciler.confirm_redirect(&reference).await?;
    let (result, payment_status, purchase) = match confirmation {
        Confirmation::Verified { purchase, .. } => (CallbackResult::Verified, None, purchase),
        Confirmation::AlreadyVerified { purchase } => (CallbackResult::AlreadyVerified, None, purchase),
        Confirmation::NotPaid { purchase, status } => (CallbackResult::NotPaid, Some(status), purchase),
        Confirmation::AmountMismatch { purchase, .. } => (CallbackResult::AmountMismatch, None, purchase),
        Confirmation::Ignored { event } => {
            return Err(AppError::InternalServerError(format!(
                "Redirect confirmation for {} returned ignored event {}",
                reference, event
            )))
        }
    };

    let (kind, amount) = match &purchase {
        Purchase::Order(order) => ("order", Some(order.total_amount)),
        Purchase::Payment(record) => ("payment", record.amount_paid),
    };

    Ok(Json(CallbackResponse {
        reference: purchase.reference().to_string(),
        result,
        verified: purchase.verified(),
        payment_status,
        kind,
        amount,
    }))
}
