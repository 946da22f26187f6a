use chrono::{DateTime, Utc};
use examshop_catalog::{Paper, PaperId};
use examshop_shared::{to_minor_units, Masked, MoneyError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// Order status in the payment lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Created,
    AwaitingPayment,
    Verified,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::AwaitingPayment => "AWAITING_PAYMENT",
            OrderStatus::Verified => "VERIFIED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CREATED" => Some(OrderStatus::Created),
            "AWAITING_PAYMENT" => Some(OrderStatus::AwaitingPayment),
            "VERIFIED" => Some(OrderStatus::Verified),
            _ => None,
        }
    }

    /// Forward-only transitions. VERIFIED is terminal.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Created, OrderStatus::AwaitingPayment)
                | (OrderStatus::Created, OrderStatus::Verified)
                | (OrderStatus::AwaitingPayment, OrderStatus::Verified)
        )
    }
}

/// A customer's purchase of the papers that were in their cart
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub reference: String,
    pub user_id: Option<String>,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub transaction_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn verified(&self) -> bool {
        self.status == OrderStatus::Verified
    }

    pub fn is_free(&self) -> bool {
        self.total_amount.is_zero()
    }

    pub fn amount_minor(&self) -> Result<i64, MoneyError> {
        to_minor_units(self.total_amount)
    }

    pub fn paper_ids(&self) -> Vec<PaperId> {
        self.items.iter().map(|item| item.paper_id).collect()
    }
}

/// One paper within an order. Title and price are copied from the catalog
/// when the order is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub paper_id: PaperId,
    pub title: String,
    pub price: Decimal,
    pub quantity: u32,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub reference: String,
    pub user_id: Option<String>,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    pub total_amount: Decimal,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub paper_id: PaperId,
    pub title: String,
    pub price: Decimal,
    pub quantity: u32,
}

pub const DEFAULT_PAYMENT_METHOD: &str = "paystack";

/// Per-paper purchase from before multi-item orders existed. Confirmed
/// through the same channels as orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub reference: String,
    pub paper_id: PaperId,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    pub amount_paid: Option<Decimal>,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Charge in minor units: the recorded amount, else the paper's price.
    pub fn amount_minor(&self, paper: &Paper) -> Result<i64, MoneyError> {
        to_minor_units(self.amount_paid.unwrap_or(paper.price))
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentRecord {
    pub reference: String,
    pub paper_id: PaperId,
    pub email: Masked<String>,
    pub phone: Masked<String>,
    pub amount_paid: Option<Decimal>,
    pub payment_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub id: Uuid,
    pub paper_id: PaperId,
    pub order_reference: Option<String>,
    pub payment_reference: Option<String>,
    pub email: Option<Masked<String>>,
    pub ip_address: Option<IpAddr>,
    pub user_agent: String,
    pub downloaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDownload {
    pub paper_id: PaperId,
    pub order_reference: Option<String>,
    pub payment_reference: Option<String>,
    pub email: Option<Masked<String>>,
    pub ip_address: Option<IpAddr>,
    pub user_agent: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(OrderStatus::Created.can_transition_to(OrderStatus::AwaitingPayment));
        assert!(OrderStatus::Created.can_transition_to(OrderStatus::Verified));
        assert!(OrderStatus::AwaitingPayment.can_transition_to(OrderStatus::Verified));
        assert!(!OrderStatus::Verified.can_transition_to(OrderStatus::AwaitingPayment));
        assert!(!OrderStatus::AwaitingPayment.can_transition_to(OrderStatus::Created));
    }

    #[test]
    fn test_status_strings() {
        for status in [OrderStatus::Created, OrderStatus::AwaitingPayment, OrderStatus::Verified] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(
            serde_json::to_string(&OrderStatus::AwaitingPayment).unwrap(),
            "\"AWAITING_PAYMENT\""
        );
    }
}
