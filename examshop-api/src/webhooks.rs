use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use examshop_order::{Confirmation, OrderError, WebhookEvent};
use examshop_store::{verify_signature, SIGNATURE_HEADER};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/paystack", post(handle_paystack_webhook))
}

/// POST /webhooks/paystack
/// Receive transaction events pushed by Paystack. The raw body must carry
/// a valid HMAC-SHA512 signature made with the Paystack secret key.
pub async fn handle_paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    if state.paystack_secret.is_empty() {
        tracing::error!("Rejected webhook: no Paystack secret key configured");
        return Err(AppError::Unauthorized("Webhook signature cannot be checked".to_string()));
    }
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing webhook signature".to_string()))?;
    if !verify_signature(&state.paystack_secret, &body, signature) {
        tracing::warn!("Rejected webhook with invalid signature");
        return Err(AppError::Unauthorized("Invalid webhook signature".to_string()));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Malformed webhook payload: {}", e)))?;
    tracing::info!("Received webhook: {} for reference {}", event.event, event.data.reference);

    match state.reconciler.confirm_webhook(&event).await {
        Ok(Confirmation::Verified { purchase, report }) => {
            tracing::info!(
                "{} verified via webhook, {} of {} deliveries sent",
                purchase.reference(),
                report.delivered(),
                report.deliveries.len()
            );
        }
        Ok(Confirmation::AlreadyVerified { purchase }) => {
            tracing::debug!("{} was already verified", purchase.reference());
        }
        Ok(Confirmation::NotPaid { purchase, status }) => {
            tracing::info!("{} not paid yet ({:?})", purchase.reference(), status);
        }
        Ok(Confirmation::AmountMismatch {
            purchase,
            expected,
            received,
        }) => {
            tracing::warn!(
                "{} not verified: webhook amount {} does not match {}",
                purchase.reference(),
                received,
                expected
            );
        }
        Ok(Confirmation::Ignored { event }) => {
            tracing::debug!("Ignoring webhook event {}", event);
        }
        // Unknown references are acknowledged, not retried.
        Err(OrderError::NotFound(reference)) => {
            tracing::warn!("Webhook for unknown reference {}", reference);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(StatusCode::OK)
}
