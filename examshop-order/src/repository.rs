use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{
    DownloadRecord, NewDownload, NewOrder, NewPaymentRecord, Order, OrderStatus, PaymentRecord,
};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Reference already in use: {0}")]
    DuplicateReference(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition for {reference}: {from:?} -> {to:?}")]
    InvalidTransition {
        reference: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Storage failure: {0}")]
    Backend(String),
}

/// Durable store for orders and legacy payment records. References are
/// unique across both.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn reference_exists(&self, reference: &str) -> Result<bool, RepositoryError>;

    /// Persists the order and its items together, in state CREATED.
    /// Fails with `DuplicateReference` if the reference is taken.
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    async fn find_order(&self, reference: &str) -> Result<Option<Order>, RepositoryError>;

    /// CREATED -> AWAITING_PAYMENT. An order already awaiting payment is
    /// returned unchanged.
    async fn mark_awaiting_payment(&self, reference: &str) -> Result<Order, RepositoryError>;

    /// Atomically moves an unverified order to VERIFIED. Returns the order
    /// only to the caller whose update performed the transition; `None`
    /// when the order is already verified or does not exist.
    async fn mark_verified(
        &self,
        reference: &str,
        transaction_id: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError>;

    async fn create_payment_record(&self, record: NewPaymentRecord) -> Result<PaymentRecord, RepositoryError>;

    async fn find_payment_record(&self, reference: &str) -> Result<Option<PaymentRecord>, RepositoryError>;

    /// Same contract as `mark_verified`, for legacy payment records.
    async fn mark_payment_verified(
        &self,
        reference: &str,
        transaction_id: Option<&str>,
        amount_paid: Option<Decimal>,
    ) -> Result<Option<PaymentRecord>, RepositoryError>;
}

#[async_trait]
pub trait DownloadRepository: Send + Sync {
    async fn record_download(&self, download: NewDownload) -> Result<DownloadRecord, RepositoryError>;

    async fn count_downloads(&self) -> Result<i64, RepositoryError>;
}
