use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which path confirmed a payment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmationChannel {
    FreeCheckout,
    Redirect,
    Webhook,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderVerifiedEvent {
    pub order_id: Uuid,
    pub reference: String,
    pub channel: ConfirmationChannel,
    pub transaction_id: Option<String>,
    pub total_amount: Decimal,
    pub items_delivered: usize,
    pub items_failed: usize,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PaperDownloadedEvent {
    pub paper_id: i64,
    pub order_reference: Option<String>,
    pub timestamp: i64,
}
