use examshop_catalog::CatalogStore;
use examshop_core::{Notifier, PaymentGateway, SessionStore};
use examshop_order::{
    CheckoutService, CheckoutSettings, DownloadRepository, FulfillmentDispatcher, OrderRepository, PaymentReconciler,
    ReferenceGenerator,
};
use std::sync::Arc;

pub const DEFAULT_SESSION_COOKIE: &str = "sessionid";

#[derive(Debug, Clone)]
pub struct ShopSettings {
    pub callback_url: String,
    pub reference_attempts: u32,
    pub country_code: String,
    /// Paystack secret key; webhooks are rejected while it is empty.
    pub paystack_secret: String,
    pub session_cookie: String,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub downloads: Arc<dyn DownloadRepository>,
    pub checkout: Arc<CheckoutService>,
    pub reconciler: Arc<PaymentReconciler>,
    pub paystack_secret: String,
    pub session_cookie: String,
}

impl AppState {
    /// Wires the checkout and reconciliation services over the given
    /// adapters.
    pub fn build(
        catalog: Arc<dyn CatalogStore>,
        sessions: Arc<dyn SessionStore>,
        orders: Arc<dyn OrderRepository>,
        downloads: Arc<dyn DownloadRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        settings: ShopSettings,
    ) -> Self {
        let fulfillment =
            FulfillmentDispatcher::new(catalog.clone(), notifier).with_country_code(settings.country_code.clone());
        let reconciler = Arc::new(PaymentReconciler::new(orders.clone(), gateway.clone(), fulfillment));
        let checkout = Arc::new(CheckoutService::new(
            orders.clone(),
            catalog.clone(),
            gateway,
            reconciler.clone(),
            ReferenceGenerator::new(settings.reference_attempts),
            CheckoutSettings {
                callback_url: settings.callback_url,
            },
        ));

        Self {
            catalog,
            sessions,
            downloads,
            checkout,
            reconciler,
            paystack_secret: settings.paystack_secret,
            session_cookie: settings.session_cookie,
        }
    }
}
