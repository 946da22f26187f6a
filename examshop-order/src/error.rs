use examshop_cart::CartError;
use examshop_catalog::CatalogError;
use examshop_core::GatewayError;
use examshop_shared::MoneyError;

use crate::repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Could not allocate a unique reference after {attempts} attempts")]
    ReferenceExhausted { attempts: u32 },

    #[error("Payment gateway failed for order {reference}: {source}")]
    Gateway {
        reference: String,
        #[source]
        source: GatewayError,
    },

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Cart(#[from] CartError),
}
