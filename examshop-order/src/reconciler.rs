use chrono::Utc;
use examshop_core::{PaymentGateway, PaymentStatus};
use examshop_shared::from_minor_units;
use examshop_shared::models::events::{ConfirmationChannel, OrderVerifiedEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::OrderError;
use crate::fulfillment::{DispatchReport, FulfillmentDispatcher};
use crate::models::{Order, PaymentRecord};
use crate::repository::OrderRepository;

pub const CHARGE_SUCCESS: &str = "charge.success";

/// Gateway push notification, `{event, data: {reference, id}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub reference: String,
    /// The gateway sends a numeric id; strings are accepted as well.
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub amount: Option<i64>,
}

impl WebhookData {
    pub fn transaction_id(&self) -> Option<String> {
        match self.id.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// What a confirmation applied to: a cart order, or a legacy single-paper
/// payment record.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Purchase {
    Order(Order),
    Payment(PaymentRecord),
}

impl Purchase {
    pub fn reference(&self) -> &str {
        match self {
            Purchase::Order(order) => &order.reference,
            Purchase::Payment(record) => &record.reference,
        }
    }

    pub fn verified(&self) -> bool {
        match self {
            Purchase::Order(order) => order.verified(),
            Purchase::Payment(record) => record.verified,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Confirmation {
    /// This call performed the transition and ran fulfillment.
    Verified { purchase: Purchase, report: DispatchReport },
    /// Another signal got there first.
    AlreadyVerified { purchase: Purchase },
    /// The gateway does not report the payment as successful.
    NotPaid { purchase: Purchase, status: PaymentStatus },
    /// The confirmed amount, in minor units, differs from the order total.
    AmountMismatch {
        purchase: Purchase,
        expected: i64,
        received: i64,
    },
    /// The webhook event does not confirm a payment.
    Ignored { event: String },
}

impl Confirmation {
    pub fn purchase(&self) -> Option<&Purchase> {
        match self {
            Confirmation::Verified { purchase, .. }
            | Confirmation::AlreadyVerified { purchase }
            | Confirmation::NotPaid { purchase, .. }
            | Confirmation::AmountMismatch { purchase, .. } => Some(purchase),
            Confirmation::Ignored { .. } => None,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.purchase().is_some_and(Purchase::verified)
    }
}

/// Converges the redirect callback, the webhook and the free-checkout path
/// onto one conditional update, and fulfils only on the winning update.
pub struct PaymentReconciler {
    orders: Arc<dyn OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
    fulfillment: FulfillmentDispatcher,
}

impl PaymentReconciler {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        gateway: Arc<dyn PaymentGateway>,
        fulfillment: FulfillmentDispatcher,
    ) -> Self {
        Self {
            orders,
            gateway,
            fulfillment,
        }
    }

    /// Customer returned from the hosted checkout. The gateway is asked for
    /// the transaction status before anything is trusted.
    pub async fn confirm_redirect(&self, reference: &str) -> Result<Confirmation, OrderError> {
        let purchase = self
            .find(reference)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {}", reference)))?;

        if purchase.verified() {
            return Ok(Confirmation::AlreadyVerified { purchase });
        }

        if let Purchase::Order(order) = &purchase {
            if order.is_free() {
                return self.apply(reference, None, None, ConfirmationChannel::FreeCheckout).await;
            }
        }

        let verification = self
            .gateway
            .verify(reference)
            .await
            .map_err(|source| OrderError::Gateway {
                reference: reference.to_string(),
                source,
            })?;

        if !verification.status.is_success() {
            tracing::info!(
                "Payment {} not successful yet ({:?})",
                reference,
                verification.status
            );
            return Ok(Confirmation::NotPaid {
                purchase,
                status: verification.status,
            });
        }

        self.apply(
            reference,
            verification.transaction_id.as_deref(),
            verification.amount_minor,
            ConfirmationChannel::Redirect,
        )
        .await
    }

    /// Gateway push. Only `charge.success` confirms a payment; other events
    /// are acknowledged and ignored.
    pub async fn confirm_webhook(&self, event: &WebhookEvent) -> Result<Confirmation, OrderError> {
        if event.event != CHARGE_SUCCESS {
            tracing::debug!("Ignoring webhook event {}", event.event);
            return Ok(Confirmation::Ignored {
                event: event.event.clone(),
            });
        }

        let transaction_id = event.data.transaction_id();
        self.apply(
            &event.data.reference,
            transaction_id.as_deref(),
            event.data.amount,
            ConfirmationChannel::Webhook,
        )
        .await
    }

    /// Zero-total orders are verified at creation without the gateway.
    pub async fn confirm_free_order(&self, reference: &str) -> Result<Confirmation, OrderError> {
        self.apply(reference, None, None, ConfirmationChannel::FreeCheckout).await
    }

    async fn find(&self, reference: &str) -> Result<Option<Purchase>, OrderError> {
        if let Some(order) = self.orders.find_order(reference).await? {
            return Ok(Some(Purchase::Order(order)));
        }
        Ok(self
            .orders
            .find_payment_record(reference)
            .await?
            .map(Purchase::Payment))
    }

    async fn apply(
        &self,
        reference: &str,
        transaction_id: Option<&str>,
        amount_minor: Option<i64>,
        channel: ConfirmationChannel,
    ) -> Result<Confirmation, OrderError> {
        if let Some(received) = amount_minor {
            if let Some(order) = self.orders.find_order(reference).await? {
                let expected = order.amount_minor()?;
                if !order.verified() && received != expected {
                    tracing::warn!(
                        "Refusing {:?} confirmation for order {}: paid {} but order total is {}",
                        channel,
                        reference,
                        received,
                        expected
                    );
                    return Ok(Confirmation::AmountMismatch {
                        purchase: Purchase::Order(order),
                        expected,
                        received,
                    });
                }
            }
        }

        if let Some(order) = self.orders.mark_verified(reference, transaction_id).await? {
            tracing::info!("Order {} verified via {:?}", reference, channel);
            let report = self.fulfillment.dispatch_order(&order).await;
            publish(&order, channel, &report);
            return Ok(Confirmation::Verified {
                purchase: Purchase::Order(order),
                report,
            });
        }

        if let Some(order) = self.orders.find_order(reference).await? {
            tracing::info!("Duplicate {:?} confirmation for order {}", channel, reference);
            return Ok(Confirmation::AlreadyVerified {
                purchase: Purchase::Order(order),
            });
        }

        if let Some(record) = self
            .orders
            .mark_payment_verified(reference, transaction_id, amount_minor.map(from_minor_units))
            .await?
        {
            tracing::info!("Payment {} verified via {:?}", reference, channel);
            let report = self.fulfillment.dispatch_payment(&record).await;
            return Ok(Confirmation::Verified {
                purchase: Purchase::Payment(record),
                report,
            });
        }

        match self.orders.find_payment_record(reference).await? {
            Some(record) => {
                tracing::info!("Duplicate {:?} confirmation for payment {}", channel, reference);
                Ok(Confirmation::AlreadyVerified {
                    purchase: Purchase::Payment(record),
                })
            }
            None => Err(OrderError::NotFound(format!("order {}", reference))),
        }
    }
}

fn publish(order: &Order, channel: ConfirmationChannel, report: &DispatchReport) {
    let event = OrderVerifiedEvent {
        order_id: order.id,
        reference: order.reference.clone(),
        channel,
        transaction_id: order.transaction_id.clone(),
        total_amount: order.total_amount,
        items_delivered: report.delivered(),
        items_failed: report.failed(),
        timestamp: Utc::now().timestamp(),
    };
    match serde_json::to_string(&event) {
        Ok(payload) => tracing::info!(target: "examshop::audit", "{}", payload),
        Err(e) => tracing::warn!("Failed to serialize verification event: {}", e),
    }
}
