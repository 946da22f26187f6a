use examshop_catalog::{CatalogStore, Paper, PaperId};
use examshop_core::phone::{normalize_msisdn, DEFAULT_COUNTRY_CODE};
use examshop_core::Notifier;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{Order, PaymentRecord};

pub fn access_message(title: &str, password: &str) -> String {
    format!(
        "Your password for {} is: {}. Thank you for your purchase!",
        title, password
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Failed { reason: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDelivery {
    pub paper_id: PaperId,
    #[serde(flatten)]
    pub status: DeliveryStatus,
}

/// Outcome of one dispatch. Informational only; nothing downstream
/// depends on every item being delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub deliveries: Vec<ItemDelivery>,
}

impl DispatchReport {
    fn push(&mut self, paper_id: PaperId, status: DeliveryStatus) {
        self.deliveries.push(ItemDelivery { paper_id, status });
    }

    pub fn delivered(&self) -> usize {
        self.count(|s| matches!(s, DeliveryStatus::Delivered))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, DeliveryStatus::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, DeliveryStatus::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&DeliveryStatus) -> bool) -> usize {
        self.deliveries.iter().filter(|d| pred(&d.status)).count()
    }
}

/// Sends each purchased paper's access password to the buyer's phone.
pub struct FulfillmentDispatcher {
    catalog: Arc<dyn CatalogStore>,
    notifier: Arc<dyn Notifier>,
    country_code: String,
}

impl FulfillmentDispatcher {
    pub fn new(catalog: Arc<dyn CatalogStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            catalog,
            notifier,
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
        }
    }

    pub fn with_country_code(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = country_code.into();
        self
    }

    pub async fn dispatch_order(&self, order: &Order) -> DispatchReport {
        let report = self.dispatch(order.phone.expose(), &order.paper_ids()).await;
        tracing::info!(
            "Fulfillment for order {}: {} delivered, {} failed, {} skipped",
            order.reference,
            report.delivered(),
            report.failed(),
            report.skipped()
        );
        report
    }

    pub async fn dispatch_payment(&self, record: &PaymentRecord) -> DispatchReport {
        let report = self.dispatch(record.phone.expose(), &[record.paper_id]).await;
        tracing::info!(
            "Fulfillment for payment {}: {} delivered, {} failed, {} skipped",
            record.reference,
            report.delivered(),
            report.failed(),
            report.skipped()
        );
        report
    }

    async fn dispatch(&self, phone: &str, paper_ids: &[PaperId]) -> DispatchReport {
        let mut report = DispatchReport::default();
        let destination = normalize_msisdn(phone, &self.country_code);

        let papers: HashMap<PaperId, Paper> = match self.catalog.papers_by_ids(paper_ids).await {
            Ok(papers) => papers.into_iter().map(|p| (p.id, p)).collect(),
            Err(e) => {
                tracing::error!("Catalog lookup failed during fulfillment: {}", e);
                for id in paper_ids {
                    report.push(*id, DeliveryStatus::Failed { reason: e.to_string() });
                }
                return report;
            }
        };

        for id in paper_ids {
            let Some(paper) = papers.get(id) else {
                tracing::warn!("Paper {} no longer exists, skipping delivery", id);
                report.push(*id, DeliveryStatus::Skipped { reason: "paper not found".to_string() });
                continue;
            };
            let Some(password) = paper.password.as_deref().filter(|p| !p.is_empty()) else {
                tracing::warn!("Paper {} has no access password, skipping delivery", id);
                report.push(*id, DeliveryStatus::Skipped { reason: "no password".to_string() });
                continue;
            };

            let message = access_message(&paper.title, password);
            match self.notifier.notify(&destination, &message).await {
                Ok(()) => report.push(*id, DeliveryStatus::Delivered),
                Err(e) => {
                    tracing::error!("Failed to deliver password for paper {}: {}", id, e);
                    report.push(*id, DeliveryStatus::Failed { reason: e.to_string() });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderItem, OrderStatus};
    use chrono::Utc;
    use examshop_catalog::{create_paper, CatalogSettings, ExamType, InMemoryCatalog, NewPaper};
    use examshop_core::RecordingNotifier;
    use examshop_shared::Masked;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    async fn catalog_with(titles: &[&str]) -> (Arc<InMemoryCatalog>, Vec<Paper>) {
        let catalog = InMemoryCatalog::new();
        let class_level = catalog.add_class("JHS 1", "jhs-1").await;
        let term = catalog.add_term(class_level.id, "Term 2", "term-2").await;
        let subject = catalog.add_subject("Science", "science").await;

        let mut papers = Vec::new();
        for title in titles {
            let paper = create_paper(
                &catalog,
                NewPaper {
                    title: title.to_string(),
                    description: String::new(),
                    class_id: class_level.id,
                    term_id: term.id,
                    subject_id: subject.id,
                    year: 2024,
                    exam_type: ExamType::Endterm,
                    price: Decimal::new(1000, 2),
                    pdf_url: "https://cdn.example.com/s.pdf".to_string(),
                    password: Some(format!("PW_{}", title.to_uppercase())),
                    is_paid: true,
                    is_available: true,
                    pages: 1,
                },
                &CatalogSettings::default(),
            )
            .await
            .unwrap();
            papers.push(paper);
        }
        (Arc::new(catalog), papers)
    }

    fn order_for(papers: &[PaperId]) -> Order {
        let id = Uuid::new_v4();
        Order {
            id,
            reference: "FULFIL000001".to_string(),
            user_id: None,
            email: Masked("buyer@example.com".to_string()),
            phone: Masked("0241234567".to_string()),
            total_amount: Decimal::new(1000, 2),
            status: OrderStatus::Verified,
            transaction_id: None,
            items: papers
                .iter()
                .map(|paper_id| OrderItem {
                    id: Uuid::new_v4(),
                    order_id: id,
                    paper_id: *paper_id,
                    title: "snapshot".to_string(),
                    price: Decimal::new(1000, 2),
                    quantity: 1,
                })
                .collect(),
            created_at: Utc::now(),
            verified_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_one_message_per_item() {
        let (catalog, papers) = catalog_with(&["Biology", "Physics"]).await;
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = FulfillmentDispatcher::new(catalog, notifier.clone());

        let report = dispatcher.dispatch_order(&order_for(&[papers[0].id, papers[1].id])).await;

        assert_eq!(report.delivered(), 2);
        let sent = notifier.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].destination, "+233241234567");
        assert_eq!(
            sent[0].message,
            "Your password for Biology is: PW_BIOLOGY. Thank you for your purchase!"
        );
    }

    #[tokio::test]
    async fn test_missing_paper_and_password_are_skipped() {
        let (catalog, papers) = catalog_with(&["Biology", "Physics"]).await;
        catalog.remove_paper(papers[1].id).await;
        let notifier = Arc::new(RecordingNotifier::new());
        let dispatcher = FulfillmentDispatcher::new(catalog.clone(), notifier.clone());

        let report = dispatcher
            .dispatch_order(&order_for(&[papers[0].id, papers[1].id, PaperId(777)]))
            .await;

        assert_eq!(report.delivered(), 1);
        assert_eq!(report.skipped(), 2);
        assert_eq!(notifier.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_notifier_failure_is_reported_not_raised() {
        let (catalog, papers) = catalog_with(&["Biology"]).await;
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.set_failing(true);
        let dispatcher = FulfillmentDispatcher::new(catalog, notifier);

        let report = dispatcher.dispatch_order(&order_for(&[papers[0].id])).await;

        assert_eq!(report.failed(), 1);
        assert_eq!(report.delivered(), 0);
    }

    #[test]
    fn test_report_serializes_per_item_status() {
        let mut report = DispatchReport::default();
        report.push(PaperId(3), DeliveryStatus::Skipped { reason: "no password".to_string() });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["deliveries"][0]["paper_id"], 3);
        assert_eq!(json["deliveries"][0]["status"], "skipped");
    }
}
