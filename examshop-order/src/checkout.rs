use examshop_cart::CartSession;
use examshop_catalog::CatalogStore;
use examshop_core::{ContactDetails, InitializeRequest, PaymentGateway};
use examshop_shared::Masked;
use std::sync::Arc;

use crate::error::OrderError;
use crate::fulfillment::DispatchReport;
use crate::models::{NewOrder, NewOrderItem, Order};
use crate::reconciler::{Confirmation, PaymentReconciler};
use crate::reference::ReferenceGenerator;
use crate::repository::OrderRepository;

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Where the gateway sends the customer back, e.g.
    /// `https://shop.example.com/order/callback`.
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// Zero-total order, verified and fulfilled on the spot.
    Completed { order: Order, report: DispatchReport },
    /// The customer must complete payment at `authorization_url`.
    PaymentRequired { order: Order, authorization_url: String },
}

impl CheckoutOutcome {
    pub fn order(&self) -> &Order {
        match self {
            CheckoutOutcome::Completed { order, .. } | CheckoutOutcome::PaymentRequired { order, .. } => order,
        }
    }
}

/// Turns a session cart into an order and starts payment for it.
pub struct CheckoutService {
    orders: Arc<dyn OrderRepository>,
    catalog: Arc<dyn CatalogStore>,
    gateway: Arc<dyn PaymentGateway>,
    reconciler: Arc<PaymentReconciler>,
    references: ReferenceGenerator,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        catalog: Arc<dyn CatalogStore>,
        gateway: Arc<dyn PaymentGateway>,
        reconciler: Arc<PaymentReconciler>,
        references: ReferenceGenerator,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            orders,
            catalog,
            gateway,
            reconciler,
            references,
            settings,
        }
    }

    /// Persists the order with snapshot items and empties the cart before
    /// the gateway is contacted. A gateway failure leaves the order
    /// AWAITING_PAYMENT and reports its reference.
    pub async fn checkout(
        &self,
        cart: &mut CartSession,
        contact: ContactDetails,
        user_id: Option<String>,
    ) -> Result<CheckoutOutcome, OrderError> {
        let resolved = cart.cart().resolve(self.catalog.as_ref()).await?;
        if resolved.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        if !resolved.missing().is_empty() {
            tracing::warn!(
                "Checkout for session {} dropped {} unavailable papers",
                cart.session_id(),
                resolved.missing().len()
            );
        }

        let total_amount = resolved.total_price();
        let items: Vec<NewOrderItem> = resolved
            .iter()
            .map(|item| NewOrderItem {
                paper_id: item.paper.id,
                title: item.paper.title.clone(),
                price: item.unit_price,
                quantity: item.quantity,
            })
            .collect();

        let draft = NewOrder {
            reference: String::new(),
            user_id,
            email: Masked(contact.email),
            phone: Masked(contact.phone),
            total_amount,
            items,
        };
        let orders = self.orders.as_ref();
        let order = self
            .references
            .allocate(orders, move |reference| {
                let order = NewOrder {
                    reference,
                    ..draft.clone()
                };
                orders.create_order(order)
            })
            .await?;
        tracing::info!(
            "Created order {} with {} items, total {}",
            order.reference,
            order.items.len(),
            order.total_amount
        );

        if let Err(e) = cart.clear().await {
            tracing::warn!("Order {} created but cart was not cleared: {}", order.reference, e);
        }

        if order.is_free() {
            let report = match self.reconciler.confirm_free_order(&order.reference).await? {
                Confirmation::Verified { report, .. } => report,
                _ => DispatchReport::default(),
            };
            let order = self.reload(&order.reference).await?;
            return Ok(CheckoutOutcome::Completed { order, report });
        }

        let order = self.orders.mark_awaiting_payment(&order.reference).await?;
        let request = InitializeRequest {
            reference: order.reference.clone(),
            email: order.email.expose().clone(),
            amount_minor: order.amount_minor()?,
            callback_url: self.settings.callback_url.clone(),
        };

        match self.gateway.initialize(&request).await {
            Ok(authorization) => {
                tracing::info!("Payment initialized for order {}", order.reference);
                Ok(CheckoutOutcome::PaymentRequired {
                    order,
                    authorization_url: authorization.authorization_url,
                })
            }
            Err(source) => {
                tracing::error!("Gateway initialize failed for order {}: {}", order.reference, source);
                Err(OrderError::Gateway {
                    reference: order.reference,
                    source,
                })
            }
        }
    }

    async fn reload(&self, reference: &str) -> Result<Order, OrderError> {
        self.orders
            .find_order(reference)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {}", reference)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fulfillment::FulfillmentDispatcher;
    use crate::memory::InMemoryOrderRepository;
    use crate::models::OrderStatus;
    use crate::reference::{random_reference, ReferenceSource};
    use examshop_catalog::{create_paper, CatalogSettings, ExamType, InMemoryCatalog, NewPaper, Paper};
    use examshop_core::{InMemorySessionStore, MockPaymentGateway, Quantity, RecordingNotifier, SessionId, SessionStore};
    use rust_decimal::Decimal;
    use std::collections::HashSet;

    struct Shop {
        catalog: Arc<InMemoryCatalog>,
        sessions: Arc<dyn SessionStore>,
        repo: Arc<InMemoryOrderRepository>,
        gateway: Arc<MockPaymentGateway>,
        notifier: Arc<RecordingNotifier>,
        service: Arc<CheckoutService>,
        branch: (i64, i64, i64),
    }

    async fn shop_with(references: ReferenceGenerator) -> Shop {
        let catalog = Arc::new(InMemoryCatalog::new());
        let class_level = catalog.add_class("JHS 1", "jhs-1").await;
        let term = catalog.add_term(class_level.id, "Term 1", "term-1").await;
        let subject = catalog.add_subject("English", "english").await;
        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let repo = Arc::new(InMemoryOrderRepository::new());
        let gateway = Arc::new(MockPaymentGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let fulfillment = FulfillmentDispatcher::new(catalog.clone(), notifier.clone());
        let reconciler = Arc::new(PaymentReconciler::new(repo.clone(), gateway.clone(), fulfillment));
        let service = Arc::new(CheckoutService::new(
            repo.clone(),
            catalog.clone(),
            gateway.clone(),
            reconciler,
            references,
            CheckoutSettings {
                callback_url: "http://localhost:3000/order/callback".to_string(),
            },
        ));

        Shop {
            catalog,
            sessions,
            repo,
            gateway,
            notifier,
            service,
            branch: (class_level.id, term.id, subject.id),
        }
    }

    async fn shop() -> Shop {
        shop_with(ReferenceGenerator::default()).await
    }

    async fn add_paper(shop: &Shop, title: &str, price_minor: i64) -> Paper {
        let (class_id, term_id, subject_id) = shop.branch;
        create_paper(
            shop.catalog.as_ref(),
            NewPaper {
                title: title.to_string(),
                description: String::new(),
                class_id,
                term_id,
                subject_id,
                year: 2024,
                exam_type: ExamType::Endterm,
                price: Decimal::new(price_minor, 2),
                pdf_url: format!("https://cdn.example.com/{}.pdf", title),
                password: None,
                is_paid: price_minor > 0,
                is_available: true,
                pages: 2,
            },
            &CatalogSettings::default(),
        )
        .await
        .unwrap()
    }

    async fn cart(shop: &Shop) -> CartSession {
        CartSession::load(shop.sessions.clone(), SessionId::generate()).await.unwrap()
    }

    fn contact() -> ContactDetails {
        ContactDetails {
            email: "buyer@example.com".to_string(),
            phone: "0241234567".to_string(),
        }
    }

    #[tokio::test]
    async fn test_order_snapshots_cart_prices() {
        let shop = shop().await;
        let a = add_paper(&shop, "A", 1000).await;
        let b = add_paper(&shop, "B", 500).await;

        let mut session = cart(&shop).await;
        session.add(&a, Quantity::new(2).unwrap(), false).await.unwrap();
        session.add(&b, Quantity::ONE, false).await.unwrap();

        let outcome = shop.service.checkout(&mut session, contact(), None).await.unwrap();
        let reference = outcome.order().reference.clone();

        shop.catalog.set_price(a.id, Decimal::new(9900, 2)).await.unwrap();
        shop.catalog.set_price(b.id, Decimal::ZERO).await.unwrap();

        let order = shop.repo.find_order(&reference).await.unwrap().unwrap();
        assert_eq!(order.total_amount, Decimal::new(2500, 2));
        assert_eq!(order.items.len(), 2);
        let prices: Vec<Decimal> = order.items.iter().map(|i| i.price).collect();
        assert!(prices.contains(&Decimal::new(1000, 2)));
        assert!(prices.contains(&Decimal::new(500, 2)));
        assert!(session.cart().is_empty());
    }

    #[tokio::test]
    async fn test_paid_checkout_initializes_gateway() {
        let shop = shop().await;
        let paper = add_paper(&shop, "Paid", 50000).await;
        let mut session = cart(&shop).await;
        session.add(&paper, Quantity::ONE, false).await.unwrap();

        let outcome = shop.service.checkout(&mut session, contact(), Some("user-9".to_string())).await.unwrap();

        let CheckoutOutcome::PaymentRequired { order, authorization_url } = outcome else {
            panic!("expected a payment redirect");
        };
        assert_eq!(order.status, OrderStatus::AwaitingPayment);
        assert_eq!(order.user_id.as_deref(), Some("user-9"));
        assert!(authorization_url.ends_with(&order.reference));

        let requests = shop.gateway.initialized().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].amount_minor, 50000);
        assert_eq!(requests[0].email, "buyer@example.com");
        assert!(shop.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_total_order_is_verified_without_gateway() {
        let shop = shop().await;
        let paper = add_paper(&shop, "Free", 0).await;
        let mut session = cart(&shop).await;
        session.add(&paper, Quantity::ONE, false).await.unwrap();

        let outcome = shop.service.checkout(&mut session, contact(), None).await.unwrap();

        let CheckoutOutcome::Completed { order, report } = outcome else {
            panic!("expected an immediate completion");
        };
        assert!(order.verified());
        assert!(shop.gateway.initialized().await.is_empty());
        // Free papers carry no password, so there is nothing to deliver.
        assert_eq!(report.deliveries.len(), 1);
        assert_eq!(report.skipped(), 1);
    }

    #[tokio::test]
    async fn test_gateway_rejection_keeps_order_awaiting_payment() {
        let shop = shop().await;
        let paper = add_paper(&shop, "Paid", 1000).await;
        let mut session = cart(&shop).await;
        session.add(&paper, Quantity::ONE, false).await.unwrap();
        shop.gateway.reject_initialize(true);

        let result = shop.service.checkout(&mut session, contact(), None).await;

        let Err(OrderError::Gateway { reference, .. }) = result else {
            panic!("expected a gateway failure");
        };
        let order = shop.repo.find_order(&reference).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::AwaitingPayment);
        assert!(session.cart().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let shop = shop().await;
        let mut session = cart(&shop).await;

        let result = shop.service.checkout(&mut session, contact(), None).await;
        assert!(matches!(result, Err(OrderError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_cart_of_removed_papers_is_empty() {
        let shop = shop().await;
        let paper = add_paper(&shop, "Gone", 1000).await;
        let mut session = cart(&shop).await;
        session.add(&paper, Quantity::ONE, false).await.unwrap();
        shop.catalog.remove_paper(paper.id).await;

        let result = shop.service.checkout(&mut session, contact(), None).await;
        assert!(matches!(result, Err(OrderError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_reference_exhaustion_surfaces() {
        let fixed: ReferenceSource = Arc::new(|| "FIXEDREF0001".to_string());
        let shop = shop_with(ReferenceGenerator::with_source(fixed, 3)).await;
        let paper = add_paper(&shop, "Paid", 1000).await;

        let mut first = cart(&shop).await;
        first.add(&paper, Quantity::ONE, false).await.unwrap();
        shop.service.checkout(&mut first, contact(), None).await.unwrap();

        let mut second = cart(&shop).await;
        second.add(&paper, Quantity::ONE, false).await.unwrap();
        let result = shop.service.checkout(&mut second, contact(), None).await;

        assert!(matches!(result, Err(OrderError::ReferenceExhausted { attempts: 3 })));
        assert!(!second.cart().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_get_unique_references() {
        // Only sixteen distinct references, so collisions are frequent.
        let narrow: ReferenceSource = Arc::new(|| random_reference()[..1].repeat(12));
        let shop = Arc::new(shop_with(ReferenceGenerator::with_source(narrow, 64)).await);
        let paper = add_paper(&shop, "Paid", 1000).await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shop = shop.clone();
                let paper = paper.clone();
                tokio::spawn(async move {
                    let mut session = cart(&shop).await;
                    session.add(&paper, Quantity::ONE, false).await.unwrap();
                    shop.service.checkout(&mut session, contact(), None).await
                })
            })
            .collect();

        let mut references = HashSet::new();
        for handle in handles {
            if let Ok(outcome) = handle.await.unwrap() {
                assert!(references.insert(outcome.order().reference.clone()));
            }
        }
        assert!(!references.is_empty());
    }
}
