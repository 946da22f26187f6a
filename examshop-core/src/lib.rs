pub mod notify;
pub mod payment;
pub mod phone;
pub mod session;
pub mod validation;

pub use notify::{Notifier, NotifyError, RecordingNotifier};
pub use payment::{
    Authorization, GatewayError, InitializeRequest, MockPaymentGateway, PaymentGateway,
    PaymentStatus, Verification,
};
pub use session::{InMemorySessionStore, SessionError, SessionId, SessionStore};
pub use validation::{CartAddForm, CartAddition, CheckoutForm, ContactDetails, Quantity, ValidationError, ValidationErrors};
