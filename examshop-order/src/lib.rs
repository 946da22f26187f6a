pub mod checkout;
pub mod downloads;
pub mod error;
pub mod fulfillment;
pub mod memory;
pub mod models;
pub mod reconciler;
pub mod reference;
pub mod repository;

pub use checkout::{CheckoutOutcome, CheckoutService, CheckoutSettings};
pub use downloads::{client_ip, log_download, DownloadContext};
pub use error::OrderError;
pub use fulfillment::{DeliveryStatus, DispatchReport, FulfillmentDispatcher, ItemDelivery};
pub use memory::InMemoryOrderRepository;
pub use models::{
    DownloadRecord, NewDownload, NewOrder, NewOrderItem, NewPaymentRecord, Order, OrderItem, OrderStatus,
    PaymentRecord, DEFAULT_PAYMENT_METHOD,
};
pub use reconciler::{Confirmation, PaymentReconciler, Purchase, WebhookData, WebhookEvent, CHARGE_SUCCESS};
pub use reference::{random_reference, ReferenceGenerator, ReferenceSource, DEFAULT_REFERENCE_ATTEMPTS};
pub use repository::{DownloadRepository, OrderRepository, RepositoryError};
