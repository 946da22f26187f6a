use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Transaction status as reported by the payment gateway.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Abandoned,
    Reversed,
}

impl PaymentStatus {
    /// Maps the gateway's lowercase status strings. Anything unknown is
    /// treated as still pending.
    pub fn from_gateway(status: &str) -> Self {
        match status {
            "success" => PaymentStatus::Succeeded,
            "failed" => PaymentStatus::Failed,
            "abandoned" => PaymentStatus::Abandoned,
            "reversed" => PaymentStatus::Reversed,
            _ => PaymentStatus::Pending,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == PaymentStatus::Succeeded
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InitializeRequest {
    pub reference: String,
    pub email: String,
    /// Amount in the gateway's minor units (pesewas).
    pub amount_minor: i64,
    pub callback_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Authorization {
    pub authorization_url: String,
    pub access_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Verification {
    pub reference: String,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub amount_minor: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway rejected the request: {0}")]
    Rejected(String),
    #[error("Gateway call timed out")]
    Timeout,
    #[error("Gateway transport failure: {0}")]
    Transport(String),
    #[error("Malformed gateway response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Start a hosted checkout and return the URL the customer is sent to.
    async fn initialize(&self, request: &InitializeRequest) -> Result<Authorization, GatewayError>;

    /// Ask the gateway for the authoritative status of a transaction.
    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError>;
}

/// In-process gateway used by tests and local runs.
pub struct MockPaymentGateway {
    reject_initialize: AtomicBool,
    verify_status: Mutex<PaymentStatus>,
    initialized: Mutex<Vec<InitializeRequest>>,
    verify_calls: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self {
            reject_initialize: AtomicBool::new(false),
            verify_status: Mutex::new(PaymentStatus::Succeeded),
            initialized: Mutex::new(Vec::new()),
            verify_calls: AtomicUsize::new(0),
        }
    }

    pub fn reject_initialize(&self, reject: bool) {
        self.reject_initialize.store(reject, Ordering::SeqCst);
    }

    pub async fn set_verify_status(&self, status: PaymentStatus) {
        *self.verify_status.lock().await = status;
    }

    pub async fn initialized(&self) -> Vec<InitializeRequest> {
        self.initialized.lock().await.clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn initialize(&self, request: &InitializeRequest) -> Result<Authorization, GatewayError> {
        if self.reject_initialize.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected("Simulated gateway rejection".to_string()));
        }

        self.initialized.lock().await.push(request.clone());

        Ok(Authorization {
            authorization_url: format!("https://checkout.mock/{}", request.reference),
            access_code: Some(format!("mock_access_{}", request.reference.to_lowercase())),
        })
    }

    async fn verify(&self, reference: &str) -> Result<Verification, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let status = *self.verify_status.lock().await;

        let amount_minor = self
            .initialized
            .lock()
            .await
            .iter()
            .find(|r| r.reference == reference)
            .map(|r| r.amount_minor);

        Ok(Verification {
            reference: reference.to_string(),
            status,
            transaction_id: status.is_success().then(|| format!("mock_txn_{}", reference)),
            amount_minor,
        })
    }
}
