use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    DownloadRecord, NewDownload, NewOrder, NewPaymentRecord, Order, OrderItem, OrderStatus, PaymentRecord,
};
use crate::repository::{DownloadRepository, OrderRepository, RepositoryError};

#[derive(Default)]
struct Ledger {
    orders: HashMap<String, Order>,
    payments: HashMap<String, PaymentRecord>,
    downloads: Vec<DownloadRecord>,
}

impl Ledger {
    fn taken(&self, reference: &str) -> bool {
        self.orders.contains_key(reference) || self.payments.contains_key(reference)
    }
}

/// Order store held behind one mutex; every check-and-set runs under the
/// lock.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    ledger: Mutex<Ledger>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn downloads(&self) -> Vec<DownloadRecord> {
        self.ledger.lock().await.downloads.clone()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn reference_exists(&self, reference: &str) -> Result<bool, RepositoryError> {
        Ok(self.ledger.lock().await.taken(reference))
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut ledger = self.ledger.lock().await;
        if ledger.taken(&order.reference) {
            return Err(RepositoryError::DuplicateReference(order.reference));
        }

        let id = Uuid::new_v4();
        let items = order
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: Uuid::new_v4(),
                order_id: id,
                paper_id: item.paper_id,
                title: item.title,
                price: item.price,
                quantity: item.quantity,
            })
            .collect();

        let created = Order {
            id,
            reference: order.reference,
            user_id: order.user_id,
            email: order.email,
            phone: order.phone,
            total_amount: order.total_amount,
            status: OrderStatus::Created,
            transaction_id: None,
            items,
            created_at: Utc::now(),
            verified_at: None,
        };
        ledger.orders.insert(created.reference.clone(), created.clone());
        Ok(created)
    }

    async fn find_order(&self, reference: &str) -> Result<Option<Order>, RepositoryError> {
        Ok(self.ledger.lock().await.orders.get(reference).cloned())
    }

    async fn mark_awaiting_payment(&self, reference: &str) -> Result<Order, RepositoryError> {
        let mut ledger = self.ledger.lock().await;
        let order = ledger
            .orders
            .get_mut(reference)
            .ok_or_else(|| RepositoryError::NotFound(reference.to_string()))?;

        match order.status {
            OrderStatus::AwaitingPayment => {}
            status if status.can_transition_to(OrderStatus::AwaitingPayment) => {
                order.status = OrderStatus::AwaitingPayment;
            }
            from => {
                return Err(RepositoryError::InvalidTransition {
                    reference: reference.to_string(),
                    from,
                    to: OrderStatus::AwaitingPayment,
                })
            }
        }
        Ok(order.clone())
    }

    async fn mark_verified(
        &self,
        reference: &str,
        transaction_id: Option<&str>,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut ledger = self.ledger.lock().await;
        let Some(order) = ledger.orders.get_mut(reference) else {
            return Ok(None);
        };
        if order.verified() {
            return Ok(None);
        }

        order.status = OrderStatus::Verified;
        order.verified_at = Some(Utc::now());
        if let Some(txn) = transaction_id {
            order.transaction_id = Some(txn.to_string());
        }
        Ok(Some(order.clone()))
    }

    async fn create_payment_record(&self, record: NewPaymentRecord) -> Result<PaymentRecord, RepositoryError> {
        let mut ledger = self.ledger.lock().await;
        if ledger.taken(&record.reference) {
            return Err(RepositoryError::DuplicateReference(record.reference));
        }

        let created = PaymentRecord {
            id: Uuid::new_v4(),
            reference: record.reference,
            paper_id: record.paper_id,
            email: record.email,
            phone: record.phone,
            amount_paid: record.amount_paid,
            payment_method: record.payment_method,
            transaction_id: None,
            verified: false,
            created_at: Utc::now(),
        };
        ledger.payments.insert(created.reference.clone(), created.clone());
        Ok(created)
    }

    async fn find_payment_record(&self, reference: &str) -> Result<Option<PaymentRecord>, RepositoryError> {
        Ok(self.ledger.lock().await.payments.get(reference).cloned())
    }

    async fn mark_payment_verified(
        &self,
        reference: &str,
        transaction_id: Option<&str>,
        amount_paid: Option<Decimal>,
    ) -> Result<Option<PaymentRecord>, RepositoryError> {
        let mut ledger = self.ledger.lock().await;
        let Some(record) = ledger.payments.get_mut(reference) else {
            return Ok(None);
        };
        if record.verified {
            return Ok(None);
        }

        record.verified = true;
        if let Some(txn) = transaction_id {
            record.transaction_id = Some(txn.to_string());
        }
        if amount_paid.is_some() {
            record.amount_paid = amount_paid;
        }
        Ok(Some(record.clone()))
    }
}

#[async_trait]
impl DownloadRepository for InMemoryOrderRepository {
    async fn record_download(&self, download: NewDownload) -> Result<DownloadRecord, RepositoryError> {
        let record = DownloadRecord {
            id: Uuid::new_v4(),
            paper_id: download.paper_id,
            order_reference: download.order_reference,
            payment_reference: download.payment_reference,
            email: download.email,
            ip_address: download.ip_address,
            user_agent: download.user_agent,
            downloaded_at: Utc::now(),
        };
        self.ledger.lock().await.downloads.push(record.clone());
        Ok(record)
    }

    async fn count_downloads(&self) -> Result<i64, RepositoryError> {
        let count = self.ledger.lock().await.downloads.len();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewOrderItem, DEFAULT_PAYMENT_METHOD};
    use examshop_catalog::PaperId;
    use examshop_shared::Masked;
    use std::sync::Arc;

    fn new_order(reference: &str) -> NewOrder {
        NewOrder {
            reference: reference.to_string(),
            user_id: Some("user-1".to_string()),
            email: Masked("buyer@example.com".to_string()),
            phone: Masked("0241234567".to_string()),
            total_amount: Decimal::new(1500, 2),
            items: vec![NewOrderItem {
                paper_id: PaperId(4),
                title: "Maths".to_string(),
                price: Decimal::new(1500, 2),
                quantity: 1,
            }],
        }
    }

    #[tokio::test]
    async fn test_create_order_with_items() {
        let repo = InMemoryOrderRepository::new();
        let order = repo.create_order(new_order("REF000000001")).await.unwrap();

        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].order_id, order.id);
        assert!(repo.reference_exists("REF000000001").await.unwrap());
    }

    #[tokio::test]
    async fn test_references_are_shared_with_payment_records() {
        let repo = InMemoryOrderRepository::new();
        repo.create_payment_record(NewPaymentRecord {
            reference: "REF000000002".to_string(),
            paper_id: PaperId(1),
            email: Masked("a@example.com".to_string()),
            phone: Masked("0241234567".to_string()),
            amount_paid: None,
            payment_method: DEFAULT_PAYMENT_METHOD.to_string(),
        })
        .await
        .unwrap();

        let result = repo.create_order(new_order("REF000000002")).await;
        assert!(matches!(result, Err(RepositoryError::DuplicateReference(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_order_and_payment_claim_one_reference() {
        for round in 0..20 {
            let repo = Arc::new(InMemoryOrderRepository::new());
            let reference = format!("CLAIM{:07}", round);

            let order = {
                let repo = repo.clone();
                let reference = reference.clone();
                tokio::spawn(async move { repo.create_order(new_order(&reference)).await.is_ok() })
            };
            let payment = {
                let repo = repo.clone();
                let reference = reference.clone();
                tokio::spawn(async move {
                    repo.create_payment_record(NewPaymentRecord {
                        reference,
                        paper_id: PaperId(1),
                        email: Masked("a@example.com".to_string()),
                        phone: Masked("0241234567".to_string()),
                        amount_paid: None,
                        payment_method: DEFAULT_PAYMENT_METHOD.to_string(),
                    })
                    .await
                    .is_ok()
                })
            };

            let created = [order.await.unwrap(), payment.await.unwrap()];
            assert_eq!(created.iter().filter(|ok| **ok).count(), 1);
            let in_orders = repo.find_order(&reference).await.unwrap().is_some();
            let in_payments = repo.find_payment_record(&reference).await.unwrap().is_some();
            assert!(in_orders ^ in_payments);
        }
    }

    #[tokio::test]
    async fn test_mark_verified_is_one_shot() {
        let repo = InMemoryOrderRepository::new();
        repo.create_order(new_order("REF000000003")).await.unwrap();
        repo.mark_awaiting_payment("REF000000003").await.unwrap();

        let first = repo.mark_verified("REF000000003", Some("txn-1")).await.unwrap();
        let second = repo.mark_verified("REF000000003", Some("txn-2")).await.unwrap();

        let verified = first.unwrap();
        assert!(verified.verified());
        assert!(verified.verified_at.is_some());
        assert!(second.is_none());

        let stored = repo.find_order("REF000000003").await.unwrap().unwrap();
        assert_eq!(stored.transaction_id.as_deref(), Some("txn-1"));
    }

    #[tokio::test]
    async fn test_verified_order_cannot_await_payment() {
        let repo = InMemoryOrderRepository::new();
        repo.create_order(new_order("REF000000004")).await.unwrap();
        repo.mark_verified("REF000000004", None).await.unwrap();

        let result = repo.mark_awaiting_payment("REF000000004").await;
        assert!(matches!(result, Err(RepositoryError::InvalidTransition { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_verification_has_one_winner() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        repo.create_order(new_order("REF000000005")).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.mark_verified("REF000000005", None).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_download_count() {
        let repo = InMemoryOrderRepository::new();
        for _ in 0..3 {
            repo.record_download(NewDownload {
                paper_id: PaperId(1),
                order_reference: None,
                payment_reference: None,
                email: None,
                ip_address: None,
                user_agent: "test".to_string(),
            })
            .await
            .unwrap();
        }
        assert_eq!(repo.count_downloads().await.unwrap(), 3);
    }
}
